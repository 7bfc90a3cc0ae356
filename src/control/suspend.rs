//! Suspension points
//!
//! Every future here is only ever polled by [`Script::update`](super::Script::update)
//! with a no-op waker, once per tick, so "pending" simply means "ask me again
//! next tick".

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use super::clock::Clock;

/// Resumes on the tick after the one it was first polled on
#[must_use = "suspension points do nothing unless awaited"]
#[derive(Debug, Default)]
pub struct NextTick {
    suspended: bool,
}

impl Future for NextTick {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.suspended {
            Poll::Ready(())
        } else {
            self.suspended = true;
            Poll::Pending
        }
    }
}

/// Resumes on the first poll at which the predicate holds, including the
/// very first one
#[must_use = "suspension points do nothing unless awaited"]
pub struct Until<P> {
    predicate: P,
}

impl<P: FnMut() -> bool> Until<P> {
    pub(super) fn new(predicate: P) -> Self {
        Self { predicate }
    }
}

// The predicate is never pinned-projected
impl<P> Unpin for Until<P> {}

impl<P: FnMut() -> bool> Future for Until<P> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if (self.predicate)() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

/// Resumes on the first tick at which at least `duration` has elapsed on the
/// scheduler clock since the first poll; always suspends at least once
#[must_use = "suspension points do nothing unless awaited"]
pub struct Sleep {
    clock: Rc<dyn Clock>,
    duration: Duration,
    deadline: Option<Instant>,
}

impl Sleep {
    pub(super) fn new(clock: Rc<dyn Clock>, duration: Duration) -> Self {
        Self {
            clock,
            duration,
            deadline: None,
        }
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let now = self.clock.now();
        match self.deadline {
            None => {
                self.deadline = Some(now + self.duration);
                Poll::Pending
            }
            Some(deadline) if now >= deadline => Poll::Ready(()),
            Some(_) => Poll::Pending,
        }
    }
}
