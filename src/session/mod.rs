//! Recording session state and the controller that drives it
//!
//! A [`Session`] is the per-recording state shared by the controller and its
//! two stages. It lives on the scheduler thread, so every field is a plain
//! `Cell`/`RefCell`: the stages only ever touch it between suspension points.

pub mod controller;
mod status;

pub use status::{Status, Theme};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::capture::Grabber;
use crate::error::SessionError;
use crate::geometry::Rect;
use crate::input::Input;
use crate::task::Executor;

/// How a settled session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Error,
}

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Opening,
    Recording,
    Flushing,
    Settled(Outcome),
}

impl Phase {
    /// True between the start trigger and the result screen
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Opening | Phase::Recording | Phase::Flushing)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Opening => "opening",
            Phase::Recording => "recording",
            Phase::Flushing => "flushing",
            Phase::Settled(Outcome::Done) => "done",
            Phase::Settled(Outcome::Error) => "error",
        };
        f.write_str(name)
    }
}

/// State of the current recording
#[derive(Default)]
pub struct Session {
    phase: Cell<Phase>,
    filename: RefCell<PathBuf>,
    frames_captured: Cell<usize>,
    frames_encoded: Cell<usize>,
    /// First error of the session; later ones are logged and dropped
    error: RefCell<Option<SessionError>>,
    running: Cell<bool>,
    border_only: Cell<bool>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn set_phase(&self, phase: Phase) {
        let previous = self.phase.replace(phase);
        if previous != phase {
            log::info!("Session {} -> {}", previous, phase);
        }
    }

    /// Back to idle with every per-recording field cleared
    pub fn reset(&self) {
        self.set_phase(Phase::Idle);
        self.filename.borrow_mut().clear();
        self.frames_captured.set(0);
        self.frames_encoded.set(0);
        self.error.borrow_mut().take();
        self.running.set(false);
        self.border_only.set(false);
    }

    /// Record a fatal error unless an earlier one is already stored
    pub fn fail(&self, error: SessionError) {
        let mut slot = self.error.borrow_mut();
        if let Some(first) = slot.as_ref() {
            log::warn!(
                "Ignoring {} error after earlier {} error: {}",
                error.kind(),
                first.kind(),
                error
            );
            return;
        }
        log::error!("Recording failed ({}): {}", error.kind(), error);
        *slot = Some(error);
    }

    pub fn has_error(&self) -> bool {
        self.error.borrow().is_some()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.borrow().as_ref().map(ToString::to_string)
    }

    pub fn clear_error(&self) {
        self.error.borrow_mut().take();
    }

    pub fn filename(&self) -> PathBuf {
        self.filename.borrow().clone()
    }

    pub fn set_filename(&self, path: &Path) {
        *self.filename.borrow_mut() = path.to_path_buf();
    }

    pub fn frames_captured(&self) -> usize {
        self.frames_captured.get()
    }

    pub fn frames_encoded(&self) -> usize {
        self.frames_encoded.get()
    }

    pub fn frame_captured(&self) -> usize {
        let count = self.frames_captured.get() + 1;
        self.frames_captured.set(count);
        count
    }

    pub fn frame_encoded(&self) -> usize {
        let count = self.frames_encoded.get() + 1;
        self.frames_encoded.set(count);
        count
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn set_running(&self, running: bool) {
        self.running.set(running);
    }

    pub fn border_only(&self) -> bool {
        self.border_only.get()
    }

    pub fn set_border_only(&self, border_only: bool) {
        self.border_only.set(border_only);
    }

    /// Snapshot for the host to render
    pub fn status(&self) -> Status {
        let phase = self.phase();
        Status {
            phase,
            filename: self.filename(),
            frames_captured: self.frames_captured(),
            frames_encoded: self.frames_encoded(),
            error: self.error_message(),
            running: self.is_running(),
            border_only: self.border_only(),
            theme: Theme::for_phase(phase),
        }
    }
}

/// Everything a session's routines read from the outside world
///
/// The owning capturer refreshes `input`, `region` and `presented` before
/// every tick; routines only read them.
pub struct Env {
    pub session: Session,
    /// Events of the current tick
    pub input: Cell<Input>,
    /// Screen area to capture
    pub region: Cell<Rect>,
    /// Count of host frames presented so far
    pub presented: Cell<u64>,
    pub grabber: Arc<dyn Grabber>,
    pub executor: Arc<dyn Executor>,
}

impl Env {
    pub fn new(grabber: Arc<dyn Grabber>, executor: Arc<dyn Executor>) -> Self {
        Self {
            session: Session::new(),
            input: Cell::new(Input::default()),
            region: Cell::new(Rect::default()),
            presented: Cell::new(0),
            grabber,
            executor,
        }
    }
}
