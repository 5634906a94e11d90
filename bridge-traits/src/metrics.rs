//! Metrics Sink
//!
//! Counter and timer recording. Names are dotted (`sync.requests`) and every
//! record carries a set of `(key, value)` tags.

use std::time::Duration;

/// Tag pairs attached to a metric record.
pub type Tags<'a> = &'a [(&'a str, &'a str)];

/// Destination for counters and timers.
///
/// Recording never fails from the caller's point of view; sinks that talk to
/// a remote collector should buffer or drop.
pub trait MetricsSink: Send + Sync {
    /// Add `value` to the counter `name`.
    fn increment_counter(&self, name: &str, value: u64, tags: Tags<'_>);

    /// Record one observation of the timer `name`.
    fn record_duration(&self, name: &str, duration: Duration, tags: Tags<'_>);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn increment_counter(&self, _name: &str, _value: u64, _tags: Tags<'_>) {}

    fn record_duration(&self, _name: &str, _duration: Duration, _tags: Tags<'_>) {}
}
