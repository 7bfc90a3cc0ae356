//! Tick-driven cooperative scheduler
//!
//! A [`Script`] owns a root routine plus every routine spawned from it. The
//! host calls [`Script::update`] once per rendered frame; each call resumes
//! every live routine exactly once, in spawn order, and then returns. Routines
//! are plain `async` blocks whose only suspension points are the ones handed
//! out by [`Control`]: [`Control::yield_now`], [`Control::yield_until`] and
//! [`Control::sleep`].
//!
//! Everything runs on the thread that calls `update`, so state shared between
//! routines lives in `Rc`/`Cell` and needs no locking. Blocking work belongs in
//! a [`Task`](crate::task::Task) which a routine polls with
//! [`Control::wait_for`].
//!
//! Cancellation is cooperative. [`SubControl::cancel`] only raises a flag; the
//! routine is dropped the next time it would be resumed, i.e. at the
//! suspension point it is parked on. Whatever it was doing before that point
//! has already completed.

mod clock;
mod suspend;

#[cfg(test)]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};
pub use suspend::{NextTick, Sleep, Until};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use futures::task::noop_waker;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use crate::task::Task;

#[derive(Debug, Default)]
struct Flags {
    cancelled: Cell<bool>,
    done: Cell<bool>,
}

struct Routine {
    flags: Rc<Flags>,
    /// Taken out while being polled so spawning from inside can borrow the list
    body: Option<LocalBoxFuture<'static, ()>>,
}

struct Runtime {
    clock: Rc<dyn Clock>,
    ticks: Cell<u64>,
    routines: RefCell<Vec<Routine>>,
}

impl Runtime {
    fn spawn<F, Fut>(self: &Rc<Self>, body: F) -> Rc<Flags>
    where
        F: FnOnce(Control) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        let flags = Rc::new(Flags::default());
        let control = Control {
            runtime: self.clone(),
            flags: flags.clone(),
        };
        let body = body(control).boxed_local();
        self.routines.borrow_mut().push(Routine {
            flags: flags.clone(),
            body: Some(body),
        });
        flags
    }
}

/// The driver side of the scheduler, owned by the host
pub struct Script {
    runtime: Rc<Runtime>,
    root: Rc<Flags>,
}

impl Script {
    /// Create a script driven by wall-clock time
    ///
    /// Nothing runs until the first [`update`](Self::update).
    #[cfg(test)]
    pub fn start<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Control) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        Self::with_clock(Rc::new(SystemClock), body)
    }

    pub fn with_clock<F, Fut>(clock: Rc<dyn Clock>, body: F) -> Self
    where
        F: FnOnce(Control) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        let runtime = Rc::new(Runtime {
            clock,
            ticks: Cell::new(0),
            routines: RefCell::new(Vec::new()),
        });
        let root = runtime.spawn(body);
        Self { runtime, root }
    }

    /// Run one tick: resume every live routine once, in spawn order
    ///
    /// Routines spawned during this tick are appended and get their first
    /// step in this same tick.
    pub fn update(&self) {
        let runtime = &self.runtime;
        runtime.ticks.set(runtime.ticks.get() + 1);

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut index = 0;
        loop {
            let (flags, body) = {
                let mut routines = runtime.routines.borrow_mut();
                let Some(routine) = routines.get_mut(index) else {
                    break;
                };
                (routine.flags.clone(), routine.body.take())
            };
            index += 1;

            let Some(mut body) = body else {
                continue;
            };

            if flags.cancelled.get() {
                drop(body);
                flags.done.set(true);
                continue;
            }

            match body.as_mut().poll(&mut cx) {
                Poll::Ready(()) => flags.done.set(true),
                Poll::Pending => {
                    runtime.routines.borrow_mut()[index - 1].body = Some(body);
                }
            }
        }

        runtime
            .routines
            .borrow_mut()
            .retain(|routine| routine.body.is_some());
    }

    /// True once the root routine has returned
    pub fn is_done(&self) -> bool {
        self.root.done.get()
    }

    /// Number of completed [`update`](Self::update) calls
    #[cfg(test)]
    pub fn ticks(&self) -> u64 {
        self.runtime.ticks.get()
    }

    /// Routines still alive, the root included
    #[cfg(test)]
    pub fn live_routines(&self) -> usize {
        self.runtime.routines.borrow().len()
    }
}

/// The routine side of the scheduler, handed to every routine body
#[derive(Clone)]
pub struct Control {
    runtime: Rc<Runtime>,
    flags: Rc<Flags>,
}

impl Control {
    /// Suspend until the next tick
    pub fn yield_now(&self) -> NextTick {
        NextTick::default()
    }

    /// Suspend until `predicate` holds; checked now and then once per tick
    ///
    /// The predicate should be cheap and free of side effects.
    pub fn yield_until<P: FnMut() -> bool>(&self, predicate: P) -> Until<P> {
        Until::new(predicate)
    }

    /// Suspend for at least `duration`, rounded up to the next tick
    pub fn sleep(&self, duration: Duration) -> Sleep {
        Sleep::new(self.runtime.clock.clone(), duration)
    }

    /// Suspend until a background task has finished
    pub fn wait_for<'a, T>(&self, task: &'a Task<T>) -> Until<impl FnMut() -> bool + 'a> {
        Until::new(move || task.is_done())
    }

    /// Spawn a child routine that runs alongside this one, one step per tick
    pub fn start_async<F, Fut>(&self, body: F) -> SubControl
    where
        F: FnOnce(Control) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        SubControl {
            flags: self.runtime.spawn(body),
        }
    }

    /// Whether this routine has been asked to stop
    pub fn is_cancelled(&self) -> bool {
        self.flags.cancelled.get()
    }

    /// Current time on the scheduler clock
    pub fn now(&self) -> Instant {
        self.runtime.clock.now()
    }

    /// Ticks since the script started
    #[cfg(test)]
    pub fn ticks(&self) -> u64 {
        self.runtime.ticks.get()
    }
}

/// Handle to a spawned child routine
#[derive(Clone)]
pub struct SubControl {
    flags: Rc<Flags>,
}

impl SubControl {
    /// Ask the routine to stop at its current suspension point
    pub fn cancel(&self) {
        self.flags.cancelled.set(true);
    }

    /// True once the routine has returned or been dropped after cancellation
    pub fn is_done(&self) -> bool {
        self.flags.done.get()
    }
}
