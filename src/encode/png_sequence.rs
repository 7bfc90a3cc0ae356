//! Still image output

use anyhow::Context;
use image::RgbaImage;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::FrameEncoder;
use crate::capture::Frame;
use crate::filename::{increment_filename, replace_incremented_filename};

/// Write one RGBA image as a PNG file
pub fn encode_still_frame(path: &Path, image: &RgbaImage) -> anyhow::Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_png(&mut writer, image)
        .with_context(|| format!("Failed to encode {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::debug!("Saved {}", path.display());
    Ok(())
}

fn write_png<W: io::Write>(w: W, image: &RgbaImage) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(w, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(image.as_raw())?;
    writer.finish()
}

/// Numbered PNG files, one per frame: `capture-0.png`, `capture-1.png`, ...
pub struct PngSequence {
    /// Path of the next frame
    next: String,
    written: usize,
}

impl PngSequence {
    /// Start numbering at `first`; the target directory must exist
    pub fn open(pattern: &Path, first: u64) -> anyhow::Result<Self> {
        let dir = match pattern.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        if !dir.is_dir() {
            anyhow::bail!("Directory {} does not exist", dir.display());
        }

        let next = replace_incremented_filename(&pattern.to_string_lossy(), first);
        log::info!("Writing PNG frames to {} onwards", next);
        Ok(Self { next, written: 0 })
    }

    /// File the next frame will be written to
    pub fn next_path(&self) -> PathBuf {
        PathBuf::from(&self.next)
    }
}

impl FrameEncoder for PngSequence {
    fn encode(&mut self, frame: Frame) -> anyhow::Result<()> {
        let path = self.next_path();
        encode_still_frame(&path, &frame.image)?;
        self.next = increment_filename(&self.next);
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        log::info!("Wrote {} PNG frames", self.written);
        Ok(())
    }
}
