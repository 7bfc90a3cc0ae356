//! Region capture through the `xcap` crate

use anyhow::Context;
use image::RgbaImage;
use xcap::Monitor;

use super::Grabber;
use crate::geometry::Rect;

/// Captures the monitor under the region and crops it
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapGrabber;

fn monitor_rect(monitor: &Monitor) -> anyhow::Result<Rect> {
    let x = monitor.x().context("Failed to read monitor position")?;
    let y = monitor.y().context("Failed to read monitor position")?;
    let width = monitor.width().context("Failed to read monitor size")?;
    let height = monitor.height().context("Failed to read monitor size")?;
    Ok(Rect::new(x, y, x + width as i32, y + height as i32))
}

impl Grabber for XcapGrabber {
    fn grab(&self, region: Rect) -> anyhow::Result<RgbaImage> {
        if region.is_empty() {
            anyhow::bail!("capture region {} is empty", region);
        }

        let monitors = Monitor::all().context("Failed to enumerate monitors")?;
        let (monitor, bounds) = monitors
            .into_iter()
            .filter_map(|monitor| {
                let bounds = monitor_rect(&monitor).ok()?;
                bounds.contains_point(region.left, region.top).then_some((monitor, bounds))
            })
            .next()
            .with_context(|| format!("No monitor contains the capture region {}", region))?;

        let visible = bounds
            .intersect(region)
            .with_context(|| format!("Capture region {} is off screen", region))?
            .translate(-bounds.left, -bounds.top);

        let screen = monitor.capture_image().context("Screen capture failed")?;
        let image = image::imageops::crop_imm(
            &screen,
            visible.left as u32,
            visible.top as u32,
            visible.width() as u32,
            visible.height() as u32,
        )
        .to_image();

        log::debug!(
            "Captured {}x{} from monitor at {}",
            image.width(),
            image.height(),
            bounds
        );
        Ok(image)
    }
}
