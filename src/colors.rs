//! Terminal styling for status output
//!
//! Colors are only emitted when the stream is a terminal.

use owo_colors::OwoColorize;
use std::io::IsTerminal;

use crate::session::Theme;

pub fn is_interactive() -> bool {
    std::io::stdout().is_terminal()
}

pub fn is_stderr_interactive() -> bool {
    std::io::stderr().is_terminal()
}

/// Status headline in the theme's border color
pub fn headline(msg: &str, theme: Theme) -> String {
    if is_interactive() {
        let [r, g, b] = theme.light();
        format!("{}", msg.truecolor(r, g, b).bold())
    } else {
        msg.to_string()
    }
}

/// Secondary status line
pub fn detail(msg: &str) -> String {
    if is_interactive() {
        format!("  {}", msg.dimmed())
    } else {
        format!("  {msg}")
    }
}

pub fn error(msg: &str) -> String {
    if is_stderr_interactive() {
        format!("{} {}", "error:".red().bold(), msg)
    } else {
        format!("error: {msg}")
    }
}
