//! Session failures

use std::path::PathBuf;

/// Why a recording session ended in the error state
///
/// The wrapped `anyhow::Error` carries the context chain of the failing
/// primitive and is rendered in full by `Display`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to open {}: {cause:#}", .path.display())]
    Open { path: PathBuf, cause: anyhow::Error },

    #[error("Screen capture failed: {0:#}")]
    Capture(anyhow::Error),

    #[error("Failed to encode frame {frame}: {cause:#}")]
    Encode { frame: usize, cause: anyhow::Error },

    #[error("Failed to finish {}: {cause:#}", .path.display())]
    Close { path: PathBuf, cause: anyhow::Error },
}

impl SessionError {
    /// Short name of the failing stage, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Open { .. } => "open",
            SessionError::Capture(_) => "capture",
            SessionError::Encode { .. } => "encode",
            SessionError::Close { .. } => "close",
        }
    }
}
