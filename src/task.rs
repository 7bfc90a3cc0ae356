//! One-shot background work with a pollable completion flag
//!
//! A [`Task`] is started by whoever needs a bounded piece of blocking work done
//! (grab one screenshot, encode one frame, close a stream) and then polled from
//! the cooperative scheduler with [`Task::is_done`]. The outcome is written
//! exactly once, before the done flag is released, so a reader that observes
//! `is_done() == true` also observes the outcome.
//!
//! There is no cancellation: a caller that no longer cares simply drops its
//! handle and the work runs to completion unobserved.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Runs background jobs
pub trait Executor: Send + Sync {
    fn execute(&self, name: &str, job: Box<dyn FnOnce() + Send>);
}

/// Runs every job on its own named OS thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn execute(&self, name: &str, job: Box<dyn FnOnce() + Send>) {
        // If spawning fails the job is dropped, which completes its task with an error
        if let Err(e) = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(job)
        {
            log::error!("Failed to spawn background thread '{}': {}", name, e);
        }
    }
}

/// Runs every job immediately on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, _name: &str, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

struct TaskState<T> {
    outcome: Mutex<Option<anyhow::Result<T>>>,
    done: AtomicBool,
}

impl<T> TaskState<T> {
    /// Store the outcome unless one was already stored
    fn finish(&self, outcome: anyhow::Result<T>) {
        let mut slot = self
            .outcome
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.done.load(Ordering::Acquire) {
            return;
        }
        *slot = Some(outcome);
        self.done.store(true, Ordering::Release);
    }
}

/// Handle to a piece of background work
pub struct Task<T> {
    state: Arc<TaskState<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

/// Write side of a task, owned by the job
struct Completion<T> {
    state: Arc<TaskState<T>>,
    name: String,
}

impl<T> Completion<T> {
    fn complete(self, outcome: anyhow::Result<T>) {
        self.state.finish(outcome);
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        // Reached without a result when the job panicked or never ran.
        // Release builds abort on panic, so there only the never-ran case
        // gets here.
        if !self.state.done.load(Ordering::Acquire) {
            self.state.finish(Err(anyhow::anyhow!(
                "background task '{}' ended without a result",
                self.name
            )));
        }
    }
}

impl<T: Send + 'static> Task<T> {
    /// Start `work` on the given executor
    pub fn start_on<F>(executor: &dyn Executor, name: &str, work: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let state = Arc::new(TaskState {
            outcome: Mutex::new(None),
            done: AtomicBool::new(false),
        });
        let completion = Completion {
            state: state.clone(),
            name: name.to_string(),
        };

        executor.execute(
            name,
            Box::new(move || {
                let outcome = work();
                completion.complete(outcome);
            }),
        );

        Self { state }
    }
}

impl<T> Task<T> {
    /// Non-blocking; safe to call every tick
    pub fn is_done(&self) -> bool {
        self.state.done.load(Ordering::Acquire)
    }

    /// Move the outcome out of a finished task
    ///
    /// Returns `None` while the task is still running, and on every call after
    /// the first successful one.
    pub fn take(&self) -> Option<anyhow::Result<T>> {
        if !self.is_done() {
            return None;
        }
        self.state
            .outcome
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Like [`take`](Self::take), but a missing outcome is an error
    pub fn result(&self) -> anyhow::Result<T> {
        self.take()
            .unwrap_or_else(|| Err(anyhow::anyhow!("task result is missing or was already taken")))
    }
}
