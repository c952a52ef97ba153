//! Terminal capability detection and colouring

use std::sync::LazyLock;

use owo_colors::{OwoColorize, Style, colors::css};

/// Whether stdout accepts colour, detected once per process.
static COLOR: LazyLock<bool> =
    LazyLock::new(|| supports_color::on(supports_color::Stream::Stdout).is_some());

/// Detects terminal width, returning None if not available
fn terminal_width() -> Option<u16> {
    terminal_size::terminal_size().map(|(w, _)| w.0)
}

/// Check if terminal is too narrow for the wide tables (< 100 columns)
pub fn is_narrow() -> bool {
    terminal_width().is_some_and(|w| w < 100)
}

/// Extension trait for colouring output
pub trait Colorize {
    /// Colour as success (green)
    fn success(&self) -> String;
    /// Colour as warning (amber)
    fn warning(&self) -> String;
    /// Colour as info (blue)
    fn info(&self) -> String;
    /// Dim the text
    fn dim(&self) -> String;
}

fn paint(text: &str, style: Style) -> String {
    if *COLOR {
        text.style(style).to_string()
    } else {
        text.to_string()
    }
}

impl Colorize for str {
    fn success(&self) -> String {
        paint(self, Style::new().fg::<css::Green>())
    }

    fn warning(&self) -> String {
        paint(self, Style::new().fg::<css::Orange>())
    }

    fn info(&self) -> String {
        paint(self, Style::new().fg::<css::LightBlue>().bold())
    }

    fn dim(&self) -> String {
        paint(self, Style::new().dimmed())
    }
}

impl Colorize for String {
    fn success(&self) -> String {
        self.as_str().success()
    }

    fn warning(&self) -> String {
        self.as_str().warning()
    }

    fn info(&self) -> String {
        self.as_str().info()
    }

    fn dim(&self) -> String {
        self.as_str().dim()
    }
}
