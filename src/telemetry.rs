//! Integration telemetry events and sinks.
//!
//! The GitHub client reports operational signals (a nearly exhausted rate
//! limit budget, bounded waits, transport retries) through a
//! [`TelemetrySink`] so that the hosting application can forward them to its
//! own metrics pipeline. Nothing here is transmitted anywhere by default.

use std::io;

use serde::{Deserialize, Serialize};

/// A structured telemetry event emitted by the GitHub client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// Fewer calls than the low-water mark remain in the current window.
    RateLimitLow {
        /// Calls left in the window.
        remaining: u32,
        /// Unix timestamp when the window resets.
        reset_at: u64,
    },
    /// A rate-limited call is waiting for the window to reset.
    RateLimitBackoff {
        /// Seconds the worker sleeps before retrying.
        wait_seconds: u64,
    },
    /// A transport failure is being retried.
    TransientRetry {
        /// Retry number (1-based).
        attempt: u32,
        /// Retries permitted per call.
        max_retries: u32,
    },
}

/// A sink that can record telemetry events.
pub trait TelemetrySink: Send + Sync {
    /// Records a telemetry event.
    fn record(&self, event: TelemetryEvent);
}

/// Telemetry sink that drops all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetrySink;

impl TelemetrySink for NoopTelemetrySink {
    fn record(&self, _event: TelemetryEvent) {}
}

/// Records telemetry events to stderr as JSON lines (JSONL).
#[derive(Debug, Default)]
pub struct StderrJsonlTelemetrySink;

impl TelemetrySink for StderrJsonlTelemetrySink {
    fn record(&self, event: TelemetryEvent) {
        let Ok(serialised) = serde_json::to_string(&event) else {
            return;
        };

        let _ignored = writeln_stderr(&serialised);
    }
}

fn writeln_stderr(message: &str) -> io::Result<()> {
    use io::Write;

    let mut stderr = io::stderr().lock();
    writeln!(stderr, "{message}")
}
