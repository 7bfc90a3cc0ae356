//! Output encoders and the encode stage
//!
//! The stage drains the frame queue strictly in order: it submits one frame
//! to a background encode task and waits for it before popping the next, so
//! the encoder sees frames in capture order no matter how long each takes.

mod gif_stream;
mod png_sequence;

pub use gif_stream::GifStream;
pub use png_sequence::{PngSequence, encode_still_frame};

use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::capture::Frame;
use crate::control::{Control, SubControl};
use crate::error::SessionError;
use crate::queue::RingQueue;
use crate::session::Env;
use crate::task::Task;

/// A sequential sink for captured frames
///
/// Frames must be written in the order they are given. `close` finalizes
/// the output; calling it twice is harmless.
pub trait FrameEncoder: Send {
    fn encode(&mut self, frame: Frame) -> anyhow::Result<()>;
    fn close(&mut self) -> anyhow::Result<()>;
}

/// Encoder shared between the controller and background encode tasks
pub type SharedEncoder = Arc<Mutex<Box<dyn FrameEncoder>>>;

pub fn share(encoder: Box<dyn FrameEncoder>) -> SharedEncoder {
    Arc::new(Mutex::new(encoder))
}

pub fn lock(encoder: &SharedEncoder) -> MutexGuard<'_, Box<dyn FrameEncoder>> {
    encoder
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Encode queued frames until the queue is empty and capture has finished,
/// or until an encode fails
pub async fn encode_stage(
    ctrl: Control,
    env: Rc<Env>,
    queue: Arc<RingQueue<Frame>>,
    capture: SubControl,
    encoder: SharedEncoder,
) {
    loop {
        // Read before popping: a frame pushed in between is still seen next round
        let capture_finished = capture.is_done();
        let Some(frame) = queue.pop() else {
            if capture_finished {
                break;
            }
            ctrl.yield_now().await;
            continue;
        };

        let number = env.session.frames_encoded() + 1;
        let task = {
            let encoder = encoder.clone();
            Task::start_on(env.executor.as_ref(), "encode", move || {
                lock(&encoder).encode(frame)
            })
        };
        ctrl.wait_for(&task).await;

        match task.result() {
            Ok(()) => {
                env.session.frame_encoded();
                log::debug!("Encoded frame {} ({} queued)", number, queue.len());
            }
            Err(cause) => {
                env.session.fail(SessionError::Encode {
                    frame: number,
                    cause,
                });
                break;
            }
        }
    }

    log::debug!(
        "Encode stage finished after {} frames",
        env.session.frames_encoded()
    );
}


#[cfg(test)]
mod tests {
    use super::testing::{Recorded, RecordingEncoder};
    use super::*;
    use crate::capture::testing::CountingGrabber;
    use crate::control::Script;
    use crate::task::testing::QueuedExecutor;
    use crate::task::{Executor, InlineExecutor, ThreadExecutor};
    use image::RgbaImage;
    use std::cell::RefCell;
    use std::time::{Duration, Instant};

    fn frame(id: u8) -> Frame {
        Frame {
            image: RgbaImage::from_pixel(1, 1, image::Rgba([id, 0, 0, 255])),
            delay_cs: u16::from(id),
        }
    }

    fn env_on(executor: Arc<dyn Executor>) -> Rc<Env> {
        Rc::new(Env::new(Arc::new(CountingGrabber::default()), executor))
    }

    /// Root routine that runs an encode stage over `queue` next to an idle
    /// stand-in for the capture stage, which it cancels once `stop` is set
    fn drain_script(
        env: Rc<Env>,
        queue: Arc<RingQueue<Frame>>,
        encoder: SharedEncoder,
        stop: Rc<RefCell<bool>>,
        stage: Rc<RefCell<Option<SubControl>>>,
    ) -> Script {
        Script::start(move |ctrl| async move {
            let capture = ctrl.start_async(|c| async move {
                while !c.is_cancelled() {
                    c.yield_now().await;
                }
            });
            let encode = ctrl.start_async({
                let capture = capture.clone();
                move |c| encode_stage(c, env, queue, capture, encoder)
            });
            *stage.borrow_mut() = Some(encode.clone());
            ctrl.yield_until(|| *stop.borrow()).await;
            capture.cancel();
            ctrl.yield_until(|| encode.is_done()).await;
        })
    }

    #[test]
    fn test_drains_queue_after_capture_is_cancelled() {
        let executor = Arc::new(QueuedExecutor::default());
        let env = env_on(executor.clone());
        let queue = Arc::new(RingQueue::new());
        for id in 1..=5 {
            queue.push(frame(id));
        }
        let recorded = Arc::new(Recorded::default());
        let encoder = share(Box::new(RecordingEncoder::new(recorded.clone())));
        let stop = Rc::new(RefCell::new(false));
        let stage = Rc::new(RefCell::new(None));

        let script = drain_script(env.clone(), queue.clone(), encoder, stop.clone(), stage.clone());

        script.update();
        assert_eq!(executor.pending(), 1);

        *stop.borrow_mut() = true;
        script.update();

        // Capture is gone but four frames are still queued and one is in flight
        let encode = stage.borrow().clone().unwrap();
        let mut ticks = 0;
        while !encode.is_done() {
            assert!(!script.is_done());
            executor.run_next();
            script.update();
            ticks += 1;
            assert!(ticks < 20, "encode stage never finished");
        }

        assert_eq!(recorded.ids(), vec![1, 2, 3, 4, 5]);
        assert_eq!(env.session.frames_encoded(), 5);
        assert!(queue.is_empty());
        script.update();
        assert!(script.is_done());
    }

    #[test]
    fn test_keeps_polling_while_capture_runs() {
        let env = env_on(Arc::new(InlineExecutor));
        let queue = Arc::new(RingQueue::new());
        let recorded = Arc::new(Recorded::default());
        let encoder = share(Box::new(RecordingEncoder::new(recorded.clone())));
        let stop = Rc::new(RefCell::new(false));
        let stage = Rc::new(RefCell::new(None));

        let script = drain_script(env, queue.clone(), encoder, stop.clone(), stage.clone());
        for _ in 0..5 {
            script.update();
        }
        let encode = stage.borrow().clone().unwrap();
        assert!(!encode.is_done(), "stopped on an empty queue while capture was live");

        queue.push(frame(9));
        script.update();
        assert_eq!(recorded.ids(), vec![9]);

        *stop.borrow_mut() = true;
        script.update();
        script.update();
        assert!(encode.is_done());
    }

    #[test]
    fn test_encode_error_stops_stage() {
        let env = env_on(Arc::new(InlineExecutor));
        let queue = Arc::new(RingQueue::new());
        for id in 1..=4 {
            queue.push(frame(id));
        }
        let recorded = Arc::new(Recorded::default());
        let encoder = share(Box::new(RecordingEncoder {
            fail_at: Some(3),
            ..RecordingEncoder::new(recorded.clone())
        }));
        let stop = Rc::new(RefCell::new(false));
        let stage = Rc::new(RefCell::new(None));

        let script = drain_script(env.clone(), queue.clone(), encoder, stop, stage.clone());
        script.update();

        assert!(stage.borrow().as_ref().unwrap().is_done());
        assert_eq!(recorded.ids(), vec![1, 2]);
        assert_eq!(queue.len(), 1);
        assert_eq!(
            env.session.error_message().as_deref(),
            Some("Failed to encode frame 3: disk full")
        );
    }

    #[test]
    fn test_order_preserved_with_threaded_encodes() {
        let env = env_on(Arc::new(ThreadExecutor));
        let queue = Arc::new(RingQueue::with_capacity(4));
        for id in 1..=40 {
            queue.push(frame(id));
        }
        let recorded = Arc::new(Recorded::default());
        let encoder = share(Box::new(RecordingEncoder {
            jitter: true,
            ..RecordingEncoder::new(recorded.clone())
        }));
        let stop = Rc::new(RefCell::new(true));
        let stage = Rc::new(RefCell::new(None));

        let script = drain_script(env, queue, encoder, stop, stage);
        let deadline = Instant::now() + Duration::from_secs(10);
        while !script.is_done() {
            assert!(Instant::now() < deadline, "encoding never finished");
            script.update();
            std::thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(recorded.ids(), (1..=40).collect::<Vec<u8>>());
    }
}
