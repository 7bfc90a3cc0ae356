//! GIF and PNG capturers
//!
//! A capturer owns one scheduler script whose root routine loops over
//! sessions for a single output format. The host feeds it input, the capture
//! region and the current output settings once per tick.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use crate::capture::{self, Grabber};
use crate::config::{OutputMethod, OutputType};
use crate::control::{Clock, Control, Script, SystemClock};
use crate::encode::{FrameEncoder, GifStream, PngSequence};
use crate::filename::{next_latest_incremented_filename, next_output, replace_incremented_filename};
use crate::framerate::{FrameRate, RateUnit};
use crate::geometry::Rect;
use crate::input::Input;
use crate::session::controller::{self, Recording};
use crate::session::{Env, Status};
use crate::task::{Executor, ThreadExecutor};

/// Output settings a session reads when it starts
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub output: PathBuf,
    pub method: OutputMethod,
    pub frame_rate: FrameRate,
}

/// Where pixels, background work and time come from
#[derive(Clone)]
pub struct Backend {
    pub grabber: Arc<dyn Grabber>,
    pub executor: Arc<dyn Executor>,
    pub clock: Rc<dyn Clock>,
}

impl Backend {
    /// Screen capture, one thread per background task, wall-clock time
    pub fn system() -> Self {
        Self {
            grabber: capture::default_grabber(),
            executor: Arc::new(ThreadExecutor),
            clock: Rc::new(SystemClock),
        }
    }
}

/// Bring a frame rate into the range an output type supports
///
/// GIF delays are per-second only, so any other unit falls back to the
/// default rate.
pub fn normalize_rate(kind: OutputType, rate: &mut FrameRate) {
    match (kind, rate.unit) {
        (OutputType::Gif, RateUnit::Second) => rate.clamp(1, 30),
        (OutputType::Gif, _) => *rate = FrameRate::default(),
        (OutputType::Png, RateUnit::Second) => rate.clamp(1, 30),
        (OutputType::Png, _) => rate.clamp(1, 60),
    }
}

/// Apply rate input for an output type; returns whether the rate changed
pub fn adjust_rate(kind: OutputType, rate: &mut FrameRate, input: &Input) -> bool {
    let before = *rate;
    let step = if kind == OutputType::Png && input.large_step {
        10
    } else {
        1
    };

    if input.rate_up {
        rate.increment_by(step);
    } else if input.rate_down {
        rate.decrement_by(step);
    }
    if kind == OutputType::Png && input.cycle_rate_unit {
        rate.next_unit();
    }
    normalize_rate(kind, rate);

    *rate != before
}

pub struct Capturer {
    env: Rc<Env>,
    config: Rc<RefCell<CaptureConfig>>,
    script: Script,
}

impl Capturer {
    pub fn new(kind: OutputType, backend: Backend, config: CaptureConfig) -> Self {
        let env = Rc::new(Env::new(backend.grabber, backend.executor));
        let config = Rc::new(RefCell::new(config));
        let script = Script::with_clock(backend.clock, {
            let env = env.clone();
            let config = config.clone();
            move |ctrl| async move {
                match kind {
                    OutputType::Gif => gif_sessions(ctrl, env, config).await,
                    OutputType::Png => png_sessions(ctrl, env, config).await,
                }
            }
        });

        Self {
            env,
            config,
            script,
        }
    }

    /// Run one tick
    pub fn update(&self, input: Input, region: Rect, config: CaptureConfig) {
        self.env.input.set(input);
        self.env.region.set(region);
        *self.config.borrow_mut() = config;

        self.script.update();

        self.env.input.set(Input::default());
    }

    /// Tell the capturer the host has put a new frame on screen
    pub fn frame_presented(&self) {
        self.env.presented.set(self.env.presented.get() + 1);
    }

    pub fn status(&self) -> Status {
        self.env.session.status()
    }

    pub fn is_running(&self) -> bool {
        self.env.session.is_running()
    }
}

/// Wait for the next confirm, skipping the tick the previous session ended on
async fn await_trigger(ctrl: &Control, env: &Env, accept: impl Fn(Input) -> bool) {
    ctrl.yield_now().await;
    ctrl.yield_until(|| accept(env.input.get())).await;
}

async fn gif_sessions(ctrl: Control, env: Rc<Env>, config: Rc<RefCell<CaptureConfig>>) {
    loop {
        env.session.reset();
        await_trigger(&ctrl, &env, |input| input.confirm).await;

        let recording = gif_recording(&config.borrow());
        match recording {
            Ok(recording) => controller::record(&ctrl, &env, recording).await,
            Err(cause) => {
                let output = config.borrow().output.clone();
                controller::refuse(&ctrl, &env, output, cause).await;
            }
        }
    }
}

fn gif_recording(config: &CaptureConfig) -> anyhow::Result<Recording> {
    let (path, _) = next_output(&config.output, config.method)?;
    let mut rate = config.frame_rate;
    normalize_rate(OutputType::Gif, &mut rate);

    let target = path.clone();
    Ok(Recording {
        path,
        cadence: rate.duration(),
        open: Box::new(move || -> anyhow::Result<Box<dyn FrameEncoder>> {
            Ok(Box::new(GifStream::create(&target)?))
        }),
        wait_for_presentation: false,
    })
}

async fn png_sessions(ctrl: Control, env: Rc<Env>, config: Rc<RefCell<CaptureConfig>>) {
    loop {
        env.session.reset();
        await_trigger(&ctrl, &env, |input| input.snapshot || input.confirm).await;

        let output = config.borrow().output.clone();
        if env.input.get().snapshot {
            let path = {
                let config = config.borrow();
                next_output(&config.output, config.method)
            };
            match path {
                Ok((path, _)) => controller::snapshot(&ctrl, &env, path).await,
                Err(cause) => controller::refuse(&ctrl, &env, output, cause).await,
            }
        } else {
            let recording = png_recording(&config.borrow());
            match recording {
                Ok(recording) => controller::record(&ctrl, &env, recording).await,
                Err(cause) => controller::refuse(&ctrl, &env, output, cause).await,
            }
        }
    }
}

fn png_recording(config: &CaptureConfig) -> anyhow::Result<Recording> {
    let pattern = config.output.clone();
    let first = match config.method {
        OutputMethod::Overwrite => 0,
        OutputMethod::NewFile => next_latest_incremented_filename(&pattern.to_string_lossy())?.1,
    };
    let mut rate = config.frame_rate;
    normalize_rate(OutputType::Png, &mut rate);

    Ok(Recording {
        path: PathBuf::from(replace_incremented_filename(&pattern.to_string_lossy(), first)),
        cadence: rate.duration(),
        open: Box::new(move || -> anyhow::Result<Box<dyn FrameEncoder>> {
            Ok(Box::new(PngSequence::open(&pattern, first)?))
        }),
        wait_for_presentation: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::CountingGrabber;
    use crate::control::ManualClock;
    use crate::session::{Outcome, Phase};
    use crate::task::InlineExecutor;
    use std::time::Duration;

    struct Rig {
        clock: Rc<ManualClock>,
        capturer: Capturer,
        config: CaptureConfig,
    }

    impl Rig {
        fn new(kind: OutputType, output: PathBuf) -> Self {
            let clock = Rc::new(ManualClock::new());
            let backend = Backend {
                grabber: Arc::new(CountingGrabber::default()),
                executor: Arc::new(InlineExecutor),
                clock: clock.clone(),
            };
            let config = CaptureConfig {
                output,
                method: OutputMethod::NewFile,
                frame_rate: FrameRate::per_second(5),
            };
            let capturer = Capturer::new(kind, backend, config.clone());
            Self {
                clock,
                capturer,
                config,
            }
        }

        fn tick(&self, input: Input) {
            self.clock.advance(Duration::from_millis(200));
            self.capturer
                .update(input, Rect::new(0, 0, 1, 1), self.config.clone());
            self.capturer.frame_presented();
        }

        fn phase(&self) -> Phase {
            self.capturer.status().phase
        }

        fn run_until(&self, phase: Phase) {
            for _ in 0..40 {
                if self.phase() == phase {
                    return;
                }
                self.tick(Input::default());
            }
            panic!("never reached {phase}, stuck in {}", self.phase());
        }
    }

    #[test]
    fn test_gif_rate_policy() {
        let mut rate = FrameRate::new(10, RateUnit::Minute);
        normalize_rate(OutputType::Gif, &mut rate);
        assert_eq!(rate, FrameRate::default());

        let mut rate = FrameRate::per_second(30);
        let up_ten = Input {
            rate_up: true,
            large_step: true,
            ..Input::default()
        };
        assert!(!adjust_rate(OutputType::Gif, &mut rate, &up_ten));
        assert_eq!(rate.value, 30);

        let mut rate = FrameRate::per_second(5);
        assert!(adjust_rate(OutputType::Gif, &mut rate, &up_ten));
        assert_eq!(rate.value, 6);
    }

    #[test]
    fn test_png_rate_policy() {
        let mut rate = FrameRate::per_second(25);
        let up_ten = Input {
            rate_up: true,
            large_step: true,
            ..Input::default()
        };
        adjust_rate(OutputType::Png, &mut rate, &up_ten);
        assert_eq!(rate.value, 30);

        let cycle = Input {
            cycle_rate_unit: true,
            ..Input::default()
        };
        adjust_rate(OutputType::Png, &mut rate, &cycle);
        assert_eq!(rate.unit, RateUnit::Minute);
        adjust_rate(OutputType::Png, &mut rate, &up_ten);
        adjust_rate(OutputType::Png, &mut rate, &up_ten);
        adjust_rate(OutputType::Png, &mut rate, &up_ten);
        assert_eq!(rate, FrameRate::new(60, RateUnit::Minute));
    }

    #[test]
    fn test_gif_sessions_write_numbered_files() {
        let dir = tempfile::tempdir().unwrap();
        let rig = Rig::new(OutputType::Gif, dir.path().join("capture.gif"));

        for _ in 0..2 {
            rig.tick(Input::default());
            rig.tick(Input::confirm());
            assert_eq!(rig.phase(), Phase::Recording);
            assert!(rig.capturer.is_running());
            rig.tick(Input::default());
            rig.tick(Input::default());
            rig.tick(Input::confirm());
            rig.run_until(Phase::Settled(Outcome::Done));
            rig.tick(Input::confirm());
            assert_eq!(rig.phase(), Phase::Idle);
        }

        let first = dir.path().join("capture.gif");
        let second = dir.path().join("capture-1.gif");
        for path in [&first, &second] {
            let mut options = gif::DecodeOptions::new();
            options.set_color_output(gif::ColorOutput::RGBA);
            let mut decoder = options
                .read_info(std::fs::File::open(path).unwrap())
                .unwrap();
            let mut frames = 0;
            while decoder.read_next_frame().unwrap().is_some() {
                frames += 1;
            }
            assert_eq!(frames, 3, "{}", path.display());
        }
    }

    #[test]
    fn test_png_snapshot_then_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let rig = Rig::new(OutputType::Png, dir.path().join("capture.png"));

        rig.tick(Input::default());
        rig.tick(Input::snapshot());
        assert!(rig.capturer.status().border_only);
        rig.run_until(Phase::Settled(Outcome::Done));
        assert!(dir.path().join("capture.png").exists());
        rig.tick(Input::confirm());
        assert_eq!(rig.phase(), Phase::Idle);

        rig.tick(Input::default());
        rig.tick(Input::confirm());
        assert_eq!(rig.phase(), Phase::Recording);
        for _ in 0..4 {
            rig.tick(Input::default());
        }
        rig.tick(Input::confirm());
        rig.run_until(Phase::Settled(Outcome::Done));

        let status = rig.capturer.status();
        assert_eq!(status.frames_encoded, status.frames_captured);
        assert!(status.frames_captured >= 2);
        assert!(dir.path().join("capture-1.png").exists());
        assert!(dir.path().join("capture-2.png").exists());
        assert!(!dir.path().join("capture-0.png").exists());
    }

    #[test]
    fn test_exhausted_file_number_settles_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("capture.gif"), b"").unwrap();
        std::fs::write(dir.path().join("capture-18446744073709551615.gif"), b"").unwrap();
        let rig = Rig::new(OutputType::Gif, dir.path().join("capture.gif"));

        rig.tick(Input::default());
        rig.tick(Input::confirm());

        let status = rig.capturer.status();
        assert_eq!(status.phase, Phase::Settled(Outcome::Error));
        assert!(status.error.unwrap().contains("No file number left"));
        assert_eq!(status.frames_captured, 0);

        rig.tick(Input::default());
        rig.tick(Input::confirm());
        assert_eq!(rig.phase(), Phase::Idle);
    }

    #[test]
    fn test_png_ignores_confirm_tick_it_settled_on() {
        let dir = tempfile::tempdir().unwrap();
        let rig = Rig::new(OutputType::Png, dir.path().join("capture.png"));

        rig.tick(Input::default());
        rig.tick(Input::snapshot());
        rig.run_until(Phase::Settled(Outcome::Done));
        rig.tick(Input::confirm());
        assert_eq!(rig.phase(), Phase::Idle);
        rig.tick(Input::default());
        assert_eq!(rig.phase(), Phase::Idle);
    }
}
