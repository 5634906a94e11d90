//! # Prometheus Metrics Registry
//!
//! A [`MetricsSink`] backed by a [`prometheus::Registry`].
//!
//! ## Overview
//!
//! Dotted sink names map onto Prometheus families: the counter
//! `sync.requests` becomes the `IntCounterVec` `sync_requests_total` and the
//! timer `sync.duration` becomes the `HistogramVec` `sync_duration_seconds`.
//! Tag keys become label names, fixed by the first record of each name.
//! Families are created and registered lazily on first use.
//!
//! Every record is also mirrored to `tracing` at debug level under the
//! `metrics` target. Readers use [`MetricsRegistry::counter`],
//! [`MetricsRegistry::timer_count`] or the text exposition from
//! [`MetricsRegistry::render`].

use bridge_traits::metrics::{MetricsSink, Tags};
use prometheus::core::Collector;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Buckets for run durations; a reconciliation takes seconds to minutes.
const DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0];

struct Family<T> {
    labels: Vec<String>,
    vec: T,
}

/// Thread-safe registry of sync counters and timers.
pub struct MetricsRegistry {
    registry: Registry,
    counters: Mutex<HashMap<String, Family<IntCounterVec>>>,
    timers: Mutex<HashMap<String, Family<HistogramVec>>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            counters: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying registry, for mounting on an exporter.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Sum of the counter `name` across all label sets.
    pub fn counter(&self, name: &str) -> u64 {
        let counters = lock(&self.counters);
        counters.get(name).map_or(0, |family| {
            family
                .vec
                .collect()
                .iter()
                .flat_map(|mf| mf.get_metric())
                .map(|m| m.get_counter().get_value() as u64)
                .sum()
        })
    }

    /// Value of the counter `name` for exactly this tag set.
    pub fn counter_with_tags(&self, name: &str, tags: Tags<'_>) -> u64 {
        let (_, values) = split_tags(tags);
        let counters = lock(&self.counters);
        counters
            .get(name)
            .and_then(|family| family.vec.get_metric_with_label_values(&values).ok())
            .map_or(0, |counter| counter.get())
    }

    /// Number of observations of the timer `name` across all label sets.
    pub fn timer_count(&self, name: &str) -> u64 {
        let timers = lock(&self.timers);
        timers.get(name).map_or(0, |family| {
            family
                .vec
                .collect()
                .iter()
                .flat_map(|mf| mf.get_metric())
                .map(|m| m.get_histogram().get_sample_count())
                .sum()
        })
    }

    /// Text exposition of every registered family.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    fn counter_family<'m>(
        &self,
        counters: &'m mut HashMap<String, Family<IntCounterVec>>,
        name: &str,
        labels: &[&str],
    ) -> Option<&'m Family<IntCounterVec>> {
        if !counters.contains_key(name) {
            let opts = Opts::new(family_name(name, "_total"), format!("Counter {name}"));
            let vec = IntCounterVec::new(opts, labels)
                .and_then(|vec| self.registry.register(Box::new(vec.clone())).map(|_| vec))
                .map_err(|e| warn!(metric = name, error = %e, "Failed to register counter"))
                .ok()?;
            counters.insert(name.to_string(), Family::new(labels, vec));
        }
        counters.get(name)
    }

    fn timer_family<'m>(
        &self,
        timers: &'m mut HashMap<String, Family<HistogramVec>>,
        name: &str,
        labels: &[&str],
    ) -> Option<&'m Family<HistogramVec>> {
        if !timers.contains_key(name) {
            let opts = HistogramOpts::new(family_name(name, "_seconds"), format!("Timer {name}"))
                .buckets(DURATION_BUCKETS.to_vec());
            let vec = HistogramVec::new(opts, labels)
                .and_then(|vec| self.registry.register(Box::new(vec.clone())).map(|_| vec))
                .map_err(|e| warn!(metric = name, error = %e, "Failed to register timer"))
                .ok()?;
            timers.insert(name.to_string(), Family::new(labels, vec));
        }
        timers.get(name)
    }
}

impl<T> Family<T> {
    fn new(labels: &[&str], vec: T) -> Self {
        Self {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            vec,
        }
    }

    fn accepts(&self, name: &str, labels: &[&str]) -> bool {
        let same = self.labels.iter().map(String::as_str).eq(labels.iter().copied());
        if !same {
            warn!(
                metric = name,
                expected = ?self.labels,
                got = ?labels,
                "Dropping record with mismatched tag keys"
            );
        }
        same
    }
}

impl MetricsSink for MetricsRegistry {
    fn increment_counter(&self, name: &str, value: u64, tags: Tags<'_>) {
        let (labels, values) = split_tags(tags);
        let mut counters = lock(&self.counters);
        let Some(family) = self.counter_family(&mut counters, name, &labels) else {
            return;
        };
        if !family.accepts(name, &labels) {
            return;
        }
        match family.vec.get_metric_with_label_values(&values) {
            Ok(counter) => {
                counter.inc_by(value);
                debug!(target: "metrics", metric = name, tags = ?tags, value, total = counter.get(), "counter");
            }
            Err(e) => warn!(metric = name, error = %e, "Failed to record counter"),
        }
    }

    fn record_duration(&self, name: &str, duration: Duration, tags: Tags<'_>) {
        let (labels, values) = split_tags(tags);
        let mut timers = lock(&self.timers);
        let Some(family) = self.timer_family(&mut timers, name, &labels) else {
            return;
        };
        if !family.accepts(name, &labels) {
            return;
        }
        match family.vec.get_metric_with_label_values(&values) {
            Ok(histogram) => {
                histogram.observe(duration.as_secs_f64());
                debug!(
                    target: "metrics",
                    metric = name,
                    tags = ?tags,
                    duration_ms = duration.as_millis() as u64,
                    "timer"
                );
            }
            Err(e) => warn!(metric = name, error = %e, "Failed to record timer"),
        }
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counters: Vec<String> = lock(&self.counters).keys().cloned().collect();
        let timers: Vec<String> = lock(&self.timers).keys().cloned().collect();
        f.debug_struct("MetricsRegistry")
            .field("counters", &counters)
            .field("timers", &timers)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

/// Label names and values, ordered by name.
fn split_tags<'a>(tags: Tags<'a>) -> (Vec<&'a str>, Vec<&'a str>) {
    let mut sorted: Vec<(&str, &str)> = tags.to_vec();
    sorted.sort_unstable();
    sorted.into_iter().unzip()
}

/// `sync.requests` -> `sync_requests_total`
fn family_name(name: &str, suffix: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out.push_str(suffix);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULER: &[(&str, &str)] = &[("source", "scheduler")];

    #[test]
    fn test_counters_accumulate_per_tag_set() {
        let registry = MetricsRegistry::new();

        registry.increment_counter("sync.requests", 1, SCHEDULER);
        registry.increment_counter("sync.requests", 1, SCHEDULER);
        registry.increment_counter("sync.requests", 5, &[("source", "manual")]);

        assert_eq!(registry.counter("sync.requests"), 7);
        assert_eq!(registry.counter_with_tags("sync.requests", SCHEDULER), 2);
        assert_eq!(registry.counter("sync.errors"), 0);
    }

    #[test]
    fn test_tag_order_does_not_matter() {
        let registry = MetricsRegistry::new();

        registry.increment_counter("x", 1, &[("a", "1"), ("b", "2")]);
        registry.increment_counter("x", 1, &[("b", "2"), ("a", "1")]);

        assert_eq!(registry.counter_with_tags("x", &[("a", "1"), ("b", "2")]), 2);
    }

    #[test]
    fn test_mismatched_tag_keys_are_dropped() {
        let registry = MetricsRegistry::new();

        registry.increment_counter("sync.requests", 1, SCHEDULER);
        registry.increment_counter("sync.requests", 1, &[("origin", "manual")]);

        assert_eq!(registry.counter("sync.requests"), 1);
    }

    #[test]
    fn test_timer_observations() {
        let registry = MetricsRegistry::new();

        registry.record_duration("sync.duration", Duration::from_millis(40), SCHEDULER);
        registry.record_duration("sync.duration", Duration::from_millis(10), SCHEDULER);

        assert_eq!(registry.timer_count("sync.duration"), 2);
        assert_eq!(registry.timer_count("sync.other"), 0);
    }

    #[test]
    fn test_render_text_exposition() {
        let registry = MetricsRegistry::new();

        registry.increment_counter("sync.success", 3, SCHEDULER);
        registry.record_duration("sync.duration", Duration::from_millis(40), SCHEDULER);

        let text = registry.render().unwrap();
        assert!(text.contains("# TYPE sync_success_total counter"));
        assert!(text.contains("sync_success_total{source=\"scheduler\"} 3"));
        assert!(text.contains("# TYPE sync_duration_seconds histogram"));
        assert!(text.contains("sync_duration_seconds_count{source=\"scheduler\"} 1"));
    }

    #[test]
    fn test_family_names() {
        assert_eq!(family_name("sync.requests", "_total"), "sync_requests_total");
        assert_eq!(family_name("sync.duration", "_seconds"), "sync_duration_seconds");
        assert_eq!(family_name("9lives", "_total"), "_9lives_total");
    }
}
