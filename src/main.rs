//! screencage
//!
//! Records a screen region to an animated GIF or a numbered PNG sequence.
//! Commands are read from stdin one per line; an empty line starts or
//! stops a recording.

mod app;
mod capture;
mod capturer;
mod colors;
mod config;
mod control;
mod encode;
mod error;
mod filename;
mod framerate;
mod geometry;
mod input;
mod queue;
mod session;
mod task;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;

use app::{App, AppOptions};
use capturer::Backend;
use config::{OutputMethod, OutputType, Settings, WindowRect};
use framerate::RateUnit;
use input::{Command, Input};
use session::{Phase, Status};

/// Record a screen region to GIF or PNG
#[derive(Parser, Debug)]
#[command(name = "screencage")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Commands on stdin: <enter>/start/stop, shot, esc, up, down, up10, down10, unit, type, method, quit")]
struct Args {
    /// Settings file (default: platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// What to do when the output file already exists
    #[arg(short, long, value_enum)]
    method: Option<Method>,

    /// Capture window as x,y,width,height
    #[arg(long, value_parser = parse_region)]
    region: Option<WindowRect>,

    /// Frames per time unit
    #[arg(short, long)]
    rate: Option<i32>,

    /// Time unit of the frame rate
    #[arg(long, value_enum)]
    unit: Option<Unit>,

    /// Scheduler ticks per second
    #[arg(long, default_value_t = 30)]
    tps: u32,

    /// Start recording immediately
    #[arg(long)]
    autostart: bool,

    /// Quit after the first session finishes
    #[arg(long)]
    exit_on_finish: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Format {
    Gif,
    Png,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Method {
    Overwrite,
    NewFile,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Unit {
    Second,
    Minute,
    Hour,
}

fn parse_region(value: &str) -> Result<WindowRect, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid region {value:?}: {e}"))?;
    match parts.as_slice() {
        &[x, y, w, h] if w > 2 * app::BORDER_WIDTH && h > 2 * app::BORDER_WIDTH => {
            Ok(WindowRect { x, y, w, h })
        }
        &[_, _, _, _] => Err(format!("region {value:?} is too small to capture")),
        _ => Err(format!("expected x,y,width,height, got {value:?}")),
    }
}

impl Args {
    fn output_type(&self) -> Option<OutputType> {
        self.format.map(|format| match format {
            Format::Gif => OutputType::Gif,
            Format::Png => OutputType::Png,
        })
    }
}

/// Headline prefixed with the window title, if one is set
fn titled(title: &str, headline: &str) -> String {
    if title.is_empty() {
        headline.to_string()
    } else {
        format!("[{title}] {headline}")
    }
}

fn print_status(status: &Status, app: &App) {
    let lines = status.lines();
    let Some((headline, details)) = lines.split_first() else {
        return;
    };
    let headline = titled(&app.settings().window_title, headline);
    println!("{}", colors::headline(&headline, status.theme));
    for line in details {
        println!("{}", colors::detail(line));
    }
    if status.phase == Phase::Idle {
        println!("{}", colors::detail(&app.summary()));
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let settings_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_settings_path);
    let mut settings = Settings::load(&settings_path);
    apply_overrides(&args, &mut settings);

    let mut app = App::new(
        settings,
        settings_path,
        Backend::system(),
        AppOptions {
            autostart: args.autostart,
            exit_on_finish: args.exit_on_finish,
        },
    );
    let tick_length = Duration::from_secs(1) / args.tps.max(1);
    let mut ticker = tokio::time::interval(tick_length);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut pending = Input::default();
    let mut shown: Option<Status> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                app.update(std::mem::take(&mut pending));

                let status = app.status();
                if shown.as_ref() != Some(&status) {
                    print_status(&status, &app);
                    shown = Some(status);
                }
                app.frame_presented();

                if app.should_quit() {
                    break;
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(Command::Input(input)) => pending = pending.merge(input),
                    Ok(Command::Quit) => break,
                    Err(e) => eprintln!("{}", colors::error(&e.to_string())),
                },
                Ok(None) => {
                    log::debug!("stdin closed");
                    stdin_open = false;
                }
                Err(e) => {
                    log::error!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    app.shutdown();
    Ok(())
}

/// Command-line values override the stored settings for this run
fn apply_overrides(args: &Args, settings: &mut Settings) {
    if let Some(output) = &args.output {
        settings.output_filename = output.clone();
    }
    if let Some(output_type) = args.output_type() {
        settings.output_type = output_type;
        settings.output_filename = PathBuf::from(filename::with_extension(
            &settings.output_filename.to_string_lossy(),
            output_type.extension(),
        ));
    }
    if let Some(method) = args.method {
        settings.output_method = match method {
            Method::Overwrite => OutputMethod::Overwrite,
            Method::NewFile => OutputMethod::NewFile,
        };
    }
    if let Some(region) = args.region {
        settings.window_rect = region;
    }
    if let Some(rate) = args.rate {
        settings.frame_rate.value = rate;
    }
    if let Some(unit) = args.unit {
        settings.frame_rate.unit = match unit {
            Unit::Second => RateUnit::Second,
            Unit::Minute => RateUnit::Minute,
            Unit::Hour => RateUnit::Hour,
        };
    }
}
