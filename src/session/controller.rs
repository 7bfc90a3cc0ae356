//! The recording lifecycle
//!
//! `Idle -> Opening -> Recording -> Flushing -> Settled(Done | Error) -> Idle`
//!
//! Each phase is a suspension point of the calling routine, so a session
//! advances by at most one step per tick and never blocks the host. Stage
//! failures reach the controller through the session's error slot, which it
//! polls every tick.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use super::{Env, Outcome, Phase};
use crate::capture::{Grabber, capture_stage};
use crate::control::Control;
use crate::encode::{self, FrameEncoder, encode_stage, encode_still_frame};
use crate::error::SessionError;
use crate::geometry::Rect;
use crate::queue::RingQueue;
use crate::task::Task;

/// Shortest time the saving screen stays up after a successful recording
pub const MIN_SAVING_DISPLAY: Duration = Duration::from_secs(2);

/// How long the success screen waits for a confirm before going idle
pub const DONE_TIMEOUT: Duration = Duration::from_secs(2);

/// Pending frames above which queue growth is logged as a warning
const QUEUE_SOFT_LIMIT: usize = 1024;

/// Opens the output; runs on a background task
pub type OpenOutput = Box<dyn FnOnce() -> anyhow::Result<Box<dyn FrameEncoder>> + Send>;

/// One continuous recording
pub struct Recording {
    /// Shown to the user and used in error messages
    pub path: PathBuf,
    /// Wait between two captures
    pub cadence: Duration,
    pub open: OpenOutput,
    /// Let the host draw one frame without its UI before the first capture
    pub wait_for_presentation: bool,
}

/// Run one recording from the start trigger back to idle
pub async fn record(ctrl: &Control, env: &Rc<Env>, recording: Recording) {
    let session = &env.session;
    let Recording {
        path,
        cadence,
        open,
        wait_for_presentation,
    } = recording;

    session.set_filename(&path);
    session.set_running(true);
    session.set_phase(Phase::Opening);

    let opening = Task::start_on(env.executor.as_ref(), "open-output", open);
    ctrl.wait_for(&opening).await;
    let encoder = match opening.result() {
        Ok(encoder) => encode::share(encoder),
        Err(cause) => {
            session.fail(SessionError::Open { path, cause });
            settle(ctrl, env).await;
            return;
        }
    };

    session.set_border_only(true);
    session.set_phase(Phase::Recording);
    if wait_for_presentation {
        await_presented(ctrl, env).await;
    }

    let queue = Arc::new(RingQueue::new().with_soft_limit(QUEUE_SOFT_LIMIT));
    let capture = ctrl.start_async({
        let env = env.clone();
        let queue = queue.clone();
        move |c| capture_stage(c, env, queue, cadence)
    });
    let encode = ctrl.start_async({
        let env = env.clone();
        let queue = queue.clone();
        let capture = capture.clone();
        let encoder = encoder.clone();
        move |c| encode_stage(c, env, queue, capture, encoder)
    });

    // The trigger that started the session is still set during this tick
    ctrl.yield_now().await;
    ctrl.yield_until(|| env.input.get().dismiss() || session.has_error())
        .await;

    capture.cancel();
    ctrl.yield_until(|| capture.is_done()).await;

    session.set_border_only(false);
    session.set_phase(Phase::Flushing);
    let flushing_since = ctrl.now();
    let min_display = if session.has_error() {
        Duration::ZERO
    } else {
        MIN_SAVING_DISPLAY
    };
    ctrl.yield_until(|| {
        encode.is_done() && ctrl.now().duration_since(flushing_since) >= min_display
    })
    .await;

    if !queue.is_empty() {
        log::warn!("Discarding {} frames that were never encoded", queue.len());
        queue.clear();
    }

    let closing = Task::start_on(env.executor.as_ref(), "close-output", move || {
        encode::lock(&encoder).close()
    });
    ctrl.wait_for(&closing).await;
    if let Err(cause) = closing.result() {
        session.fail(SessionError::Close { path, cause });
    }

    settle(ctrl, env).await;
}

/// End a session that could not get an output file, without recording
pub async fn refuse(ctrl: &Control, env: &Rc<Env>, path: PathBuf, cause: anyhow::Error) {
    let session = &env.session;
    session.set_filename(&path);
    session.set_running(true);
    session.fail(SessionError::Open { path, cause });
    settle(ctrl, env).await;
}

/// Take one still image of the region and write it to `path`
pub async fn snapshot(ctrl: &Control, env: &Rc<Env>, path: PathBuf) {
    let session = &env.session;
    session.set_filename(&path);
    session.set_running(true);
    session.set_border_only(true);
    session.set_phase(Phase::Recording);

    await_presented(ctrl, env).await;

    let region = env.region.get();
    let grabber = env.grabber.clone();
    let target = path.clone();
    let shot = Task::start_on(env.executor.as_ref(), "snapshot", move || {
        Ok(take_still(grabber.as_ref(), region, &target))
    });
    ctrl.wait_for(&shot).await;
    session.set_border_only(false);

    match shot.result() {
        Ok(Ok(())) => {
            session.frame_captured();
            session.frame_encoded();
            log::info!("Saved screenshot to {}", path.display());
        }
        Ok(Err(e)) => session.fail(e),
        Err(cause) => session.fail(SessionError::Capture(cause)),
    }

    settle(ctrl, env).await;
}

fn take_still(grabber: &dyn Grabber, region: Rect, path: &Path) -> Result<(), SessionError> {
    let image = grabber.grab(region).map_err(SessionError::Capture)?;
    encode_still_frame(path, &image).map_err(|cause| SessionError::Encode { frame: 1, cause })
}

/// Show the result, wait for the user (or the timeout), then go idle
async fn settle(ctrl: &Control, env: &Env) {
    let session = &env.session;
    session.set_border_only(false);

    if session.has_error() {
        session.set_phase(Phase::Settled(Outcome::Error));
        ctrl.yield_now().await;
        ctrl.yield_until(|| env.input.get().dismiss()).await;
        session.clear_error();
    } else {
        session.set_phase(Phase::Settled(Outcome::Done));
        let shown_at = ctrl.now();
        ctrl.yield_now().await;
        ctrl.yield_until(|| {
            env.input.get().dismiss() || ctrl.now().duration_since(shown_at) >= DONE_TIMEOUT
        })
        .await;
    }

    session.reset();
}

/// Suspend until the host has presented at least one more frame, plus one
/// tick so that frame is on screen
pub async fn await_presented(ctrl: &Control, env: &Env) {
    let seen = env.presented.get();
    ctrl.yield_now().await;
    ctrl.yield_until(|| env.presented.get() > seen).await;
    ctrl.yield_now().await;
}
