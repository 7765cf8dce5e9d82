//! BLE scanner for the Mi Scale.
//!
//! The scanner runs a scan session against the local adapter and delivers
//! decoded weight readings over a channel. Parsing anomalies (truncated EIR
//! data, unknown status codes, frames from other devices) are not errors and
//! never show up on the channel; only session-fatal conditions do, after the
//! session has already cleaned up the socket filter.

pub mod hci;

use crate::mac_address::MacAddress;
use crate::reading::WeightReading;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for scanner operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Adapter or socket setup failure
    #[error("bluetooth error: {0}")]
    Bluetooth(String),
    /// Unrecoverable failure reading from the HCI socket
    #[error("read error: {0}")]
    Read(#[from] std::io::Error),
    /// The HCI socket reached end of stream (adapter went away)
    #[error("HCI socket closed")]
    Closed,
}

/// Items delivered over the reading channel: decoded readings while the
/// session is healthy, a single terminal error if it dies.
pub type ReadingResult = Result<WeightReading, ScanError>;

/// Channel buffer size for readings.
pub const READING_CHANNEL_BUFFER_SIZE: usize = 100;

/// Scan session configuration, supplied at session start.
#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    /// HCI device index to bind (0 for hci0)
    pub device: u16,
    /// Hardware address of the scale; frames from any other device are ignored
    pub address: MacAddress,
}

/// Start a scan session for the configured scale.
///
/// Opens the adapter, installs the event filter and begins listening in a
/// background task. The returned receiver yields readings until the session
/// ends: it closes cleanly on SIGINT, or yields one final `Err` if the socket
/// fails. The previously-installed socket filter is restored on every exit
/// path before the channel closes.
pub async fn start_scan(config: ScanConfig) -> Result<mpsc::Receiver<ReadingResult>, ScanError> {
    hci::start_scan(config).await
}
