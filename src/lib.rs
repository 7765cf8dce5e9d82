//! `miscale-listener` library.
//!
//! The binary (`src/main.rs`) is responsible for CLI parsing, logging setup
//! and process exit codes. The core logic lives in [`crate::app`] where it can
//! be tested deterministically with an injected scanner + injected output
//! stream; the EIR decoder in [`crate::eir`] is pure and testable on raw
//! bytes.

pub mod app;
pub mod eir;
pub mod mac_address;
pub mod output;
pub mod reading;
pub mod scanner;
pub mod throttle;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use eir::{EirField, EirFields, decode_readings};
pub use mac_address::MacAddress;
pub use output::OutputFormatter;
pub use output::plain::PlainFormatter;
pub use reading::{MeasureState, WeightReading, WeightUnit};
pub use scanner::{ReadingResult, ScanConfig, ScanError};
pub use throttle::{Throttle, parse_duration};
