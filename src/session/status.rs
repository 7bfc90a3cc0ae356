//! What the host shows for a session

use std::path::PathBuf;

use super::{Outcome, Phase};

/// Border colors of the capture window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Idle,
    Recording,
}

impl Theme {
    pub fn for_phase(phase: Phase) -> Self {
        if phase.is_active() {
            Theme::Recording
        } else {
            Theme::Idle
        }
    }

    /// Border color
    pub fn light(self) -> [u8; 3] {
        match self {
            Theme::Idle => [0, 255, 255],
            Theme::Recording => [255, 0, 0],
        }
    }
}

/// Published every tick; compare with the previous one to detect changes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Status {
    pub phase: Phase,
    pub filename: PathBuf,
    pub frames_captured: usize,
    pub frames_encoded: usize,
    pub error: Option<String>,
    pub running: bool,
    pub border_only: bool,
    pub theme: Theme,
}

impl Status {
    /// Human-readable text, headline first
    pub fn lines(&self) -> Vec<String> {
        match self.phase {
            Phase::Idle => vec!["Ready".to_string()],
            Phase::Opening => vec![format!("Opening {}", self.filename.display())],
            Phase::Recording => vec![
                "Recording".to_string(),
                format!("number of images: {}", self.frames_captured),
            ],
            Phase::Flushing => vec![
                format!("Saving to {}", self.filename.display()),
                format!(
                    "Please wait: {} / {}",
                    self.frames_encoded, self.frames_captured
                ),
            ],
            Phase::Settled(Outcome::Done) => vec!["Done!".to_string()],
            Phase::Settled(Outcome::Error) => vec![
                "Ruh-oh, something broke".to_string(),
                self.error.clone().unwrap_or_default(),
            ],
        }
    }
}
