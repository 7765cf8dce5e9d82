//! Core application runner for `miscale-listener`.
//!
//! Decoupled from CLI parsing and process exit codes so the loop can be
//! tested deterministically with an injected scanner and output stream.

use crate::mac_address::MacAddress;
use crate::output::OutputFormatter;
use crate::output::plain::PlainFormatter;
use crate::scanner::{ReadingResult, ScanConfig, ScanError};
use crate::throttle::Throttle;
use clap::Parser;
use std::future::Future;
use std::io;
use std::io::Write;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Configuration for the core run loop.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Bluetooth address of the scale, e.g. C8:47:8C:12:34:56
    #[arg(long)]
    pub address: MacAddress,

    /// HCI device index to scan on (0 for hci0)
    #[arg(long, default_value_t = 0)]
    pub device: u16,

    /// Emit at most one reading per measurement state per interval.
    /// Accepts duration with suffix: 3s, 1m, 500ms, 2h.
    /// Without suffix, value is interpreted as seconds.
    #[arg(long, value_parser = crate::throttle::parse_duration)]
    pub throttle: Option<Duration>,

    /// Verbose logging (skipped frames, session lifecycle)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Errors returned by the core run loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Scanner abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Scanner: Send + Sync {
    fn start_scan(
        &self,
        config: ScanConfig,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<ReadingResult>, ScanError>> + Send + '_>>;
}

/// Real scanner implementation backed by the raw HCI socket session.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn start_scan(
        &self,
        config: ScanConfig,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<ReadingResult>, ScanError>> + Send + '_>>
    {
        Box::pin(async move { crate::scanner::start_scan(config).await })
    }
}

/// Run the core processing loop, writing formatted readings to `out`.
///
/// Readings are throttled (if an interval is configured), formatted and
/// written one per line. The loop ends when the reading channel closes: a
/// clean close (interrupt-triggered shutdown) returns `Ok`, a terminal
/// `ScanError` on the channel is propagated.
pub async fn run_with_io(
    options: Options,
    scanner: &dyn Scanner,
    out: &mut dyn Write,
) -> Result<(), RunError> {
    let formatter = PlainFormatter::new();
    let mut throttle = options.throttle.map(Throttle::new);

    let config = ScanConfig {
        device: options.device,
        address: options.address,
    };
    let mut readings = scanner.start_scan(config).await?;

    while let Some(result) = readings.recv().await {
        let reading = result?;

        let should_emit = throttle
            .as_mut()
            .is_none_or(|t: &mut Throttle| t.should_emit(reading.state));

        if should_emit {
            writeln!(out, "{}", formatter.format(&reading))?;
        }
    }

    Ok(())
}
