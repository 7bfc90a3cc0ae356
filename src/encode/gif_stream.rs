//! Streaming animated GIF output
//!
//! Frames are quantized and written one at a time, so memory use does not
//! grow with the length of the recording.

use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::FrameEncoder;
use crate::capture::Frame;

/// Quantizer speed passed to `gif`, 1 (best) to 30 (fastest)
const QUANTIZE_SPEED: i32 = 10;

enum State {
    /// File created, header not written until the first frame fixes the size
    Pending(BufWriter<File>),
    Writing(gif::Encoder<BufWriter<File>>),
    Closed,
}

/// Animated GIF written frame by frame
pub struct GifStream {
    path: PathBuf,
    state: State,
    size: Option<(u16, u16)>,
    frames: usize,
}

impl GifStream {
    /// Create (or truncate) the output file
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        log::info!("Writing GIF to {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            state: State::Pending(BufWriter::new(file)),
            size: None,
            frames: 0,
        })
    }

    fn frame_size(&mut self, frame: &Frame) -> anyhow::Result<(u16, u16)> {
        let (width, height) = frame.image.dimensions();
        let size = (
            u16::try_from(width).context("Frame is too wide for GIF")?,
            u16::try_from(height).context("Frame is too tall for GIF")?,
        );
        if size.0 == 0 || size.1 == 0 {
            anyhow::bail!("Frame is empty ({}x{})", width, height);
        }

        match self.size {
            None => self.size = Some(size),
            Some(first) if first != size => anyhow::bail!(
                "Frame size {}x{} differs from the first frame {}x{}",
                size.0,
                size.1,
                first.0,
                first.1
            ),
            Some(_) => {}
        }
        Ok(size)
    }
}

impl FrameEncoder for GifStream {
    fn encode(&mut self, frame: Frame) -> anyhow::Result<()> {
        let (width, height) = self.frame_size(&frame)?;

        let delay = frame.delay_cs;
        let mut pixels = frame.image.into_raw();
        let mut gif_frame = gif::Frame::from_rgba_speed(width, height, &mut pixels, QUANTIZE_SPEED);
        gif_frame.delay = delay;

        let mut encoder = match std::mem::replace(&mut self.state, State::Closed) {
            State::Pending(writer) => {
                let mut encoder = gif::Encoder::new(writer, width, height, &[])
                    .context("Failed to write GIF header")?;
                encoder
                    .set_repeat(gif::Repeat::Infinite)
                    .context("Failed to write GIF header")?;
                encoder
            }
            State::Writing(encoder) => encoder,
            State::Closed => anyhow::bail!("{} is already closed", self.path.display()),
        };

        encoder
            .write_frame(&gif_frame)
            .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        self.state = State::Writing(encoder);
        self.frames += 1;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Pending(writer) => {
                drop(writer);
                log::warn!(
                    "No frames were recorded, removing {}",
                    self.path.display()
                );
                std::fs::remove_file(&self.path)
                    .with_context(|| format!("Failed to remove {}", self.path.display()))
            }
            State::Writing(encoder) => {
                let mut writer = encoder
                    .into_inner()
                    .with_context(|| format!("Failed to finish {}", self.path.display()))?;
                writer
                    .flush()
                    .with_context(|| format!("Failed to flush {}", self.path.display()))?;
                log::info!("Wrote {} frames to {}", self.frames, self.path.display());
                Ok(())
            }
            State::Closed => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn frame(width: u32, height: u32, color: [u8; 4], delay_cs: u16) -> Frame {
        Frame {
            image: RgbaImage::from_pixel(width, height, Rgba(color)),
            delay_cs,
        }
    }

    #[test]
    fn test_writes_decodable_animation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.gif");

        let mut stream = GifStream::create(&path).unwrap();
        stream.encode(frame(4, 3, [255, 0, 0, 255], 0)).unwrap();
        stream.encode(frame(4, 3, [0, 0, 255, 255], 20)).unwrap();
        stream.close().unwrap();
        stream.close().unwrap();

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(File::open(&path).unwrap()).unwrap();
        assert_eq!((decoder.width(), decoder.height()), (4, 3));

        let mut delays = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            delays.push(frame.delay);
        }
        assert_eq!(delays, vec![0, 20]);
    }

    #[test]
    fn test_rejects_size_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = GifStream::create(&dir.path().join("out.gif")).unwrap();
        stream.encode(frame(4, 4, [0, 0, 0, 255], 0)).unwrap();
        let err = stream.encode(frame(5, 4, [0, 0, 0, 255], 5)).unwrap_err();
        assert!(err.to_string().contains("differs from the first frame"));
    }

    #[test]
    fn test_closing_empty_stream_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.gif");
        let mut stream = GifStream::create(&path).unwrap();
        assert!(path.exists());
        stream.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.gif");
        assert!(GifStream::create(&path).is_err());
    }
}
