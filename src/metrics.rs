//! Metrics instrumentation for gate-zones.
//!
//! All metrics are prefixed with `gate_zones.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

use crate::error::WatchdogError;

/// Record one regeneration attempt.
pub fn record_regeneration(result: RegenerationResult, duration: std::time::Duration) {
    let result_str = match result {
        RegenerationResult::Success => "success",
        RegenerationResult::ParseError => "parse_error",
        RegenerationResult::PatternError => "pattern_error",
        RegenerationResult::FilesystemError => "filesystem_error",
    };

    counter!("gate_zones.regeneration.count", "result" => result_str).increment(1);
    histogram!("gate_zones.regeneration.duration.seconds").record(duration.as_secs_f64());
}

/// Outcome of a regeneration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenerationResult {
    /// Zone set written.
    Success,
    /// The specification document could not be parsed.
    ParseError,
    /// A pattern was unbounded or too large.
    PatternError,
    /// Writing the output failed.
    FilesystemError,
}

impl From<&WatchdogError> for RegenerationResult {
    fn from(err: &WatchdogError) -> Self {
        match err {
            WatchdogError::ConfigParse(_)
            | WatchdogError::RemoteFetch(_)
            | WatchdogError::Reqwest(_)
            | WatchdogError::Config(_) => RegenerationResult::ParseError,
            WatchdogError::PatternExpansion { .. } => RegenerationResult::PatternError,
            WatchdogError::Filesystem { .. }
            | WatchdogError::ReloadTrigger(_)
            | WatchdogError::Watch(_) => RegenerationResult::FilesystemError,
        }
    }
}

/// Record a failed regeneration attempt, classified by its error.
pub fn record_regeneration_error(err: &WatchdogError, duration: std::time::Duration) {
    record_regeneration(RegenerationResult::from(err), duration);
}

/// Record the size of the last written zone set.
pub fn record_zone_set(zones: usize, blocked: usize, a_records: usize, aaaa_records: usize) {
    gauge!("gate_zones.zones.count").set(zones as f64);
    gauge!("gate_zones.zones.blocked").set(blocked as f64);
    gauge!("gate_zones.records.a").set(a_records as f64);
    gauge!("gate_zones.records.aaaa").set(aaaa_records as f64);
}

/// Record how the watcher handled a filesystem event.
pub fn record_watch_event(outcome: WatchEventOutcome) {
    let outcome_str = match outcome {
        WatchEventOutcome::Accepted => "accepted",
        WatchEventOutcome::Debounced => "debounced",
        WatchEventOutcome::Ignored => "ignored",
    };

    counter!("gate_zones.watch.event.count", "outcome" => outcome_str).increment(1);
}

/// Watch event handling outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventOutcome {
    /// Event started a regeneration cycle.
    Accepted,
    /// Event arrived inside the cooldown window.
    Debounced,
    /// Event was for a different path or kind.
    Ignored,
}

/// Record a nameserver reload attempt.
pub fn record_reload(success: bool) {
    let result_str = if success { "success" } else { "error" };
    counter!("gate_zones.reload.count", "result" => result_str).increment(1);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
