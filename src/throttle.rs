//! Rate limiting for weight readings.
//!
//! The scale rebroadcasts the same reading many times per second, so without a
//! limit a single weigh-in floods stdout with identical Stable and Idle lines.
//! Throttling is tracked per measurement state: Active readings keep flowing
//! while the value settles, and each of Stable/Idle is capped independently.

use crate::reading::MeasureState;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Limits readings to at most one per measurement state per interval.
///
/// The first reading in each state is always allowed. A blocked reading does
/// not reset the timer, so a steady broadcast stream still yields one line per
/// interval.
#[derive(Debug)]
pub struct Throttle {
    /// Minimum time between emitted readings for each state
    interval: Duration,
    /// Last emit time per state
    last_emit: HashMap<MeasureState, Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Throttle {
            interval,
            last_emit: HashMap::new(),
        }
    }

    /// Check whether a reading in `state` should be emitted now.
    ///
    /// Returns `true` and resets the state's timer if the interval has passed
    /// since the last emitted reading in that state (or none was emitted yet).
    pub fn should_emit(&mut self, state: MeasureState) -> bool {
        let now = Instant::now();

        match self.last_emit.get(&state) {
            Some(last) if now.duration_since(*last) < self.interval => false,
            _ => {
                self.last_emit.insert(state, now);
                true
            }
        }
    }
}

/// Parse a duration from a human-readable string.
///
/// The number may carry an `ms`, `s`, `m` or `h` suffix; a bare number is
/// taken as seconds.
///
/// # Examples
/// ```
/// use miscale_listener::throttle::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();
    let split = src
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(src.len());
    let (digits, suffix) = src.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration: {src}"))?;

    match suffix.trim_start() {
        "ms" => Ok(Duration::from_millis(value)),
        "" | "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        other => Err(format!("unknown duration suffix: {other}")),
    }
}
