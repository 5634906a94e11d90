//! Fetch window computation
//!
//! The window starts a little before the end of the last successful window
//! and never spans more than the configured cap. Whatever lies beyond the cap
//! is picked up by the next run, which is why settings reject an interval
//! longer than the cap minus the safety buffer.

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use core_library::models::SyncMetadata;
use core_runtime::config::WindowSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Half-open time range sent to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl FetchWindow {
    /// Compute the window for a run starting at `now`.
    pub fn compute(
        metadata: Option<&SyncMetadata>,
        now: DateTime<Utc>,
        settings: &WindowSettings,
    ) -> Self {
        let Some(metadata) = metadata else {
            return Self {
                from: now - chrono_duration(settings.default_window),
                to: now,
            };
        };

        let from = metadata.last_successful_to - chrono_duration(settings.safety_buffer);
        if from >= now {
            return Self { from: now, to: now };
        }

        let to = from
            .checked_add_signed(chrono_duration(settings.cap))
            .map_or(now, |end| end.min(now));

        Self { from, to }
    }

    pub fn length(&self) -> ChronoDuration {
        self.to - self.from
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]",
            self.from.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.to.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

fn chrono_duration(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn settings() -> WindowSettings {
        WindowSettings {
            cap: Duration::from_secs(3_600),
            safety_buffer: Duration::from_secs(300),
            default_window: Duration::from_secs(3_600),
        }
    }

    fn metadata(last_to: DateTime<Utc>) -> SyncMetadata {
        SyncMetadata {
            last_successful_from: last_to - ChronoDuration::hours(1),
            last_successful_to: last_to,
            updated_at: last_to,
        }
    }

    #[test]
    fn test_first_run_uses_default_window() {
        let window = FetchWindow::compute(None, now(), &settings());

        assert_eq!(window.to, now());
        assert_eq!(window.length(), ChronoDuration::hours(1));
    }

    #[test]
    fn test_recent_watermark_overlaps_by_safety_buffer() {
        let last_to = now() - ChronoDuration::minutes(20);
        let window = FetchWindow::compute(Some(&metadata(last_to)), now(), &settings());

        assert_eq!(window.from, last_to - ChronoDuration::minutes(5));
        assert_eq!(window.to, now());
    }

    #[test]
    fn test_old_watermark_is_capped() {
        let last_to = now() - ChronoDuration::hours(3);
        let window = FetchWindow::compute(Some(&metadata(last_to)), now(), &settings());

        assert_eq!(window.from, now() - ChronoDuration::minutes(185));
        assert_eq!(window.to, now() - ChronoDuration::minutes(125));
        assert_eq!(window.length(), ChronoDuration::hours(1));
    }

    #[test]
    fn test_future_watermark_collapses_to_now() {
        let last_to = now() + ChronoDuration::hours(2);
        let window = FetchWindow::compute(Some(&metadata(last_to)), now(), &settings());

        assert_eq!(window.from, now());
        assert_eq!(window.to, now());
    }

    /// Successive runs `interval` apart, each storing its window end.
    fn lag_after_runs(interval: ChronoDuration, runs: usize) -> ChronoDuration {
        let mut now = now();
        let mut last_to = now - ChronoDuration::hours(3);
        for _ in 0..runs {
            last_to = FetchWindow::compute(Some(&metadata(last_to)), now, &settings()).to;
            now += interval;
        }
        now - interval - last_to
    }

    #[test]
    fn test_watermark_catches_up_when_interval_fits_the_cap() {
        assert_eq!(
            lag_after_runs(ChronoDuration::minutes(30), 8),
            ChronoDuration::zero()
        );
    }

    #[test]
    fn test_watermark_falls_behind_when_interval_exceeds_the_cap() {
        let first = lag_after_runs(ChronoDuration::days(1), 1);
        let third = lag_after_runs(ChronoDuration::days(1), 3);

        assert!(third > first);
    }

    #[test]
    fn test_display_is_rfc3339() {
        let window = FetchWindow::compute(None, now(), &settings());

        assert_eq!(
            window.to_string(),
            "[2026-03-10T11:00:00Z, 2026-03-10T12:00:00Z]"
        );
    }
}
