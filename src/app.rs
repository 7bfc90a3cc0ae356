//! Host-facing application state
//!
//! Owns the persisted settings and one capturer per output type. Only the
//! capturer for the selected type is ticked; the other one sits idle.

use std::path::PathBuf;

use crate::capturer::{self, Backend, CaptureConfig, Capturer};
use crate::config::{OutputType, Settings};
use crate::filename::with_extension;
use crate::input::Input;
use crate::session::{Phase, Status};

/// Capture region inset from the window edge, so the border is not recorded
pub const BORDER_WIDTH: i32 = 3;

/// Ticks between two saves of changed settings
const SAVE_INTERVAL_TICKS: u64 = 50;

#[derive(Debug, Clone, Copy, Default)]
pub struct AppOptions {
    /// Start a session as soon as the capturer accepts one
    pub autostart: bool,
    /// Quit once a session has finished and the capturer is idle again
    pub exit_on_finish: bool,
}

pub struct App {
    settings: Settings,
    settings_path: PathBuf,
    dirty: bool,
    tick: u64,
    gif: Capturer,
    png: Capturer,
    options: AppOptions,
    /// A session has started since launch
    started: bool,
    finished: bool,
}

impl App {
    pub fn new(
        mut settings: Settings,
        settings_path: PathBuf,
        backend: Backend,
        options: AppOptions,
    ) -> Self {
        capturer::normalize_rate(settings.output_type, &mut settings.frame_rate);
        let config = capture_config(&settings);
        Self {
            gif: Capturer::new(OutputType::Gif, backend.clone(), config.clone()),
            png: Capturer::new(OutputType::Png, backend, config),
            settings,
            settings_path,
            dirty: false,
            tick: 0,
            options,
            started: false,
            finished: false,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn capturer(&self) -> &Capturer {
        match self.settings.output_type {
            OutputType::Gif => &self.gif,
            OutputType::Png => &self.png,
        }
    }

    /// Run one tick with the events collected since the last one
    pub fn update(&mut self, mut input: Input) {
        self.tick += 1;
        if self.dirty && self.tick % SAVE_INTERVAL_TICKS == 0 {
            self.save_settings();
        }

        if !self.capturer().is_running() {
            self.apply_settings_input(&input);
        }

        if self.options.autostart && !self.started {
            input.confirm = true;
        }

        let region = self.settings.window_rect.to_rect().inset(BORDER_WIDTH);
        let config = capture_config(&self.settings);
        self.capturer().update(input, region, config);

        let phase = self.capturer().status().phase;
        if phase.is_active() {
            self.started = true;
        } else if self.started && phase == Phase::Idle {
            self.finished = true;
        }
    }

    fn apply_settings_input(&mut self, input: &Input) {
        if input.cycle_output_type {
            self.set_output_type(self.settings.output_type.next());
        }
        if input.cycle_output_method {
            self.settings.output_method = self.settings.output_method.next();
            log::info!("Output method: {}", self.settings.output_method);
            self.dirty = true;
        }
        if capturer::adjust_rate(self.settings.output_type, &mut self.settings.frame_rate, input) {
            log::debug!("Frame rate: {}", self.settings.frame_rate);
            self.dirty = true;
        }
    }

    /// Switch output type; the filename extension and frame rate follow
    pub fn set_output_type(&mut self, output_type: OutputType) {
        let settings = &mut self.settings;
        settings.output_type = output_type;
        settings.output_filename = PathBuf::from(with_extension(
            &settings.output_filename.to_string_lossy(),
            output_type.extension(),
        ));
        capturer::normalize_rate(output_type, &mut settings.frame_rate);
        log::info!(
            "Output type: {} ({})",
            output_type,
            settings.output_filename.display()
        );
        self.dirty = true;
    }

    /// Tell the active capturer the host has drawn a new frame
    pub fn frame_presented(&self) {
        self.capturer().frame_presented();
    }

    pub fn status(&self) -> Status {
        self.capturer().status()
    }

    /// One-line description of what the next session will do
    pub fn summary(&self) -> String {
        let settings = &self.settings;
        format!(
            "{} at {}, {} ({})",
            settings.output_type.extension().to_uppercase(),
            settings.frame_rate,
            settings.output_filename.display(),
            settings.output_method
        )
    }

    pub fn should_quit(&self) -> bool {
        self.options.exit_on_finish && self.finished
    }

    fn save_settings(&mut self) {
        if self.settings.save(&self.settings_path).is_ok() {
            self.dirty = false;
        }
    }

    /// Persist pending setting changes before exit
    pub fn shutdown(&mut self) {
        if self.dirty {
            self.save_settings();
        }
    }
}

fn capture_config(settings: &Settings) -> CaptureConfig {
    CaptureConfig {
        output: settings.output_filename.clone(),
        method: settings.output_method,
        frame_rate: settings.frame_rate,
    }
}
