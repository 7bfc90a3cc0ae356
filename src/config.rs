//! Settings persisted between runs

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::framerate::FrameRate;
use crate::geometry::Rect;

/// Directory name used under the platform config directory
pub const APP_DIR: &str = "screencage";

const SETTINGS_FILE: &str = "settings.json";

/// What a session writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputType {
    /// One animated image per session
    #[default]
    Gif,
    /// One still image per captured frame
    Png,
}

impl OutputType {
    /// Get the next output type in the cycle
    pub fn next(self) -> Self {
        match self {
            OutputType::Gif => OutputType::Png,
            OutputType::Png => OutputType::Gif,
        }
    }

    /// Get file extension for this output type
    pub fn extension(self) -> &'static str {
        match self {
            OutputType::Gif => "gif",
            OutputType::Png => "png",
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// What happens when the output file already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputMethod {
    Overwrite,
    #[default]
    NewFile,
}

impl OutputMethod {
    pub fn next(self) -> Self {
        match self {
            OutputMethod::Overwrite => OutputMethod::NewFile,
            OutputMethod::NewFile => OutputMethod::Overwrite,
        }
    }
}

impl fmt::Display for OutputMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMethod::Overwrite => f.write_str("overwrite existing file"),
            OutputMethod::NewFile => f.write_str("new file"),
        }
    }
}

/// Position and size of the capture window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Default for WindowRect {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            w: 640,
            h: 480,
        }
    }
}

impl WindowRect {
    pub fn to_rect(self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.w, self.y + self.h)
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub output_filename: PathBuf,
    pub output_type: OutputType,
    pub output_method: OutputMethod,
    pub frame_rate: FrameRate,
    pub window_rect: WindowRect,
    pub window_title: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_filename: default_output_path(OutputType::default()),
            output_type: OutputType::default(),
            output_method: OutputMethod::default(),
            frame_rate: FrameRate::default(),
            window_rect: WindowRect::default(),
            window_title: "screencage".to_string(),
        }
    }
}

/// `<config_dir>/screencage/settings.json`, or the working directory when
/// the platform has no config directory
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_default()
        .join(SETTINGS_FILE)
}

/// `<pictures_dir>/capture.<ext>`, or the working directory as fallback
pub fn default_output_path(output_type: OutputType) -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_default()
        .join(format!("capture.{}", output_type.extension()))
}

impl Settings {
    /// Load settings from disk, or return defaults if unavailable
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No settings at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                log::warn!("Could not read settings {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Self>(&text) {
            Ok(mut settings) => {
                if settings.output_filename.as_os_str().is_empty() {
                    settings.output_filename = default_output_path(settings.output_type);
                }
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Error loading settings, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let result = self.write(path);
        match &result {
            Ok(()) => log::info!("Saved settings to {}", path.display()),
            Err(e) => log::error!("Failed to save settings: {:#}", e),
        }
        result
    }

    fn write(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
    }
}
