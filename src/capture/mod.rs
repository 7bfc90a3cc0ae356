//! Pixel capture and the capture stage
//!
//! The stage grabs one frame from the current region every cadence interval
//! and pushes it onto the frame queue. Grabs run as background tasks so a
//! slow compositor never stalls the tick.

#[cfg(feature = "xcap")]
mod xcap_backend;

use image::RgbaImage;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::control::Control;
use crate::error::SessionError;
use crate::geometry::Rect;
use crate::queue::RingQueue;
use crate::session::Env;
use crate::task::Task;

/// Longest display time of a single animated frame, in hundredths of a second
pub const MAX_FRAME_DELAY_CS: u16 = 500;

/// A captured image plus how long it should be shown
#[derive(Debug)]
pub struct Frame {
    pub image: RgbaImage,
    /// Hundredths of a second since the previous capture, 0 for the first
    pub delay_cs: u16,
}

/// Grabs the pixels of a screen region
pub trait Grabber: Send + Sync {
    fn grab(&self, region: Rect) -> anyhow::Result<RgbaImage>;
}

/// Used when the crate is built without a capture backend
#[cfg(any(test, not(feature = "xcap")))]
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBackend;

#[cfg(any(test, not(feature = "xcap")))]
impl Grabber for NoBackend {
    fn grab(&self, _region: Rect) -> anyhow::Result<RgbaImage> {
        anyhow::bail!("no capture backend compiled in")
    }
}

/// The grabber for this build
pub fn default_grabber() -> Arc<dyn Grabber> {
    #[cfg(feature = "xcap")]
    {
        Arc::new(xcap_backend::XcapGrabber)
    }
    #[cfg(not(feature = "xcap"))]
    {
        log::warn!("Built without the xcap feature; every capture will fail");
        Arc::new(NoBackend)
    }
}

/// Elapsed time as a frame delay, clamped to [`MAX_FRAME_DELAY_CS`]
pub fn delay_hundredths(elapsed: Duration) -> u16 {
    let cs = elapsed.as_millis() / 10;
    cs.min(u128::from(MAX_FRAME_DELAY_CS)) as u16
}

/// Run one grab as a background task and wait for it
pub async fn grab(ctrl: &Control, env: &Env, region: Rect) -> anyhow::Result<RgbaImage> {
    let grabber = env.grabber.clone();
    let task = Task::start_on(env.executor.as_ref(), "grab", move || grabber.grab(region));
    ctrl.wait_for(&task).await;
    task.result()
}

/// Capture frames at `cadence` until cancelled or a grab fails
pub async fn capture_stage(
    ctrl: Control,
    env: Rc<Env>,
    queue: Arc<RingQueue<Frame>>,
    cadence: Duration,
) {
    let mut last_shot: Option<Instant> = None;

    while !ctrl.is_cancelled() {
        let region = env.region.get();
        let image = match grab(&ctrl, &env, region).await {
            Ok(image) => image,
            Err(e) => {
                env.session.fail(SessionError::Capture(e));
                break;
            }
        };

        let now = ctrl.now();
        let delay_cs = last_shot.map_or(0, |previous| delay_hundredths(now - previous));
        last_shot = Some(now);

        queue.push(Frame { image, delay_cs });
        let count = env.session.frame_captured();
        log::debug!("Captured frame {} of {} (delay {}cs)", count, region, delay_cs);

        ctrl.sleep(cadence).await;
    }
}
