//! ANSI palette for rendered spans

use crossterm::style::Stylize;
use spanboard_core::Palette;

/// Colours the dashboard with plain ANSI attributes
///
/// | Role   | Style        |
/// |--------|--------------|
/// | header | bold cyan    |
/// | done   | green        |
/// | active | bold yellow  |
/// | logs   | magenta      |
#[derive(Clone, Copy, Debug, Default)]
pub struct AnsiPalette;

impl Palette for AnsiPalette {
    fn header(&self, text: &str) -> String {
        text.bold().cyan().to_string()
    }

    fn done(&self, text: &str) -> String {
        text.green().to_string()
    }

    fn active(&self, text: &str) -> String {
        text.bold().yellow().to_string()
    }

    fn logs(&self, text: &str) -> String {
        text.magenta().to_string()
    }
}
