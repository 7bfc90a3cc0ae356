//! Per-tick trigger events from the host

use std::str::FromStr;

/// Events that happened during one tick
///
/// Each flag is a "just happened" edge, not a held state; the host clears
/// the whole set after every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Input {
    /// Start, stop or continue, depending on the current phase
    pub confirm: bool,
    /// Take one still image
    pub snapshot: bool,
    /// Leave the current screen without starting anything
    pub cancel: bool,
    pub rate_up: bool,
    pub rate_down: bool,
    /// Apply rate changes in steps of ten where supported
    pub large_step: bool,
    pub cycle_rate_unit: bool,
    pub cycle_output_type: bool,
    pub cycle_output_method: bool,
}

impl Input {
    pub fn confirm() -> Self {
        Self {
            confirm: true,
            ..Self::default()
        }
    }

    pub fn snapshot() -> Self {
        Self {
            snapshot: true,
            ..Self::default()
        }
    }

    /// Confirm or cancel, the two ways to leave a settled screen
    pub fn dismiss(&self) -> bool {
        self.confirm || self.cancel
    }

    /// Events from both sets, for hosts that collect several per tick
    pub fn merge(self, other: Input) -> Self {
        Self {
            confirm: self.confirm || other.confirm,
            snapshot: self.snapshot || other.snapshot,
            cancel: self.cancel || other.cancel,
            rate_up: self.rate_up || other.rate_up,
            rate_down: self.rate_down || other.rate_down,
            large_step: self.large_step || other.large_step,
            cycle_rate_unit: self.cycle_rate_unit || other.cycle_rate_unit,
            cycle_output_type: self.cycle_output_type || other.cycle_output_type,
            cycle_output_method: self.cycle_output_method || other.cycle_output_method,
        }
    }
}

/// One line of host input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Input(Input),
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let mut input = Input::default();
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "start" | "stop" | "ok" => input.confirm = true,
            "shot" => input.snapshot = true,
            "esc" => input.cancel = true,
            "up" => input.rate_up = true,
            "down" => input.rate_down = true,
            "up10" => {
                input.rate_up = true;
                input.large_step = true;
            }
            "down10" => {
                input.rate_down = true;
                input.large_step = true;
            }
            "unit" => input.cycle_rate_unit = true,
            "type" => input.cycle_output_type = true,
            "method" => input.cycle_output_method = true,
            "quit" | "q" => return Ok(Command::Quit),
            other => anyhow::bail!("unknown command: {other}"),
        }
        Ok(Command::Input(input))
    }
}
