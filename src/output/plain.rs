//! Plain text output formatter.
//!
//! Emits `"<state_code> <kg>.<tenths>"`, e.g. `2 68.0` for a stable 68 kg
//! reading. State codes: 1 = active, 2 = stable, 3 = idle.

use crate::output::OutputFormatter;
use crate::reading::WeightReading;

/// Formatter producing the human-readable one-line format.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainFormatter;

impl PlainFormatter {
    pub fn new() -> Self {
        PlainFormatter
    }
}

impl OutputFormatter for PlainFormatter {
    fn format(&self, reading: &WeightReading) -> String {
        format!(
            "{} {}.{}",
            reading.state.code(),
            reading.kilograms(),
            reading.tenths()
        )
    }
}
