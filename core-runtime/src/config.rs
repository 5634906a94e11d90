//! # Service Configuration
//!
//! Settings for the firm sync service: where the database lives, how to reach
//! the provider, how often to sync and how the lease lock behaves.
//!
//! ## Overview
//!
//! [`SyncSettings`] is built either with [`SyncSettings::builder()`] or from
//! the process environment with [`SyncSettings::from_env()`]. Both paths end
//! in [`SyncSettings::validate()`], so an inconsistent configuration fails at
//! startup with an actionable message instead of at the first tick.
//!
//! ## Environment
//!
//! | Variable | Default |
//! |----------|---------|
//! | `FIRM_SYNC_DATABASE_URL` | required |
//! | `FIRM_SYNC_PROVIDER_BASE_URL` | required unless a local file is set |
//! | `FIRM_SYNC_PROVIDER_API_KEY` | empty |
//! | `FIRM_SYNC_PROVIDER_LOCAL_FILE` | unset |
//! | `FIRM_SYNC_PROVIDER_TIMEOUT_SECS` | 30 |
//! | `FIRM_SYNC_SCHEDULER_ENABLED` | true |
//! | `FIRM_SYNC_INTERVAL_SECS` | 86400 |
//! | `FIRM_SYNC_RUN_ON_STARTUP` | false |
//! | `FIRM_SYNC_LEASE_TIMEOUT_SECS` | 600 |
//! | `FIRM_SYNC_LEASE_RENEWAL_SECS` | lease timeout / 3 |
//! | `FIRM_SYNC_WINDOW_CAP_SECS` | 90000 |
//! | `FIRM_SYNC_SAFETY_BUFFER_SECS` | 300 |
//! | `FIRM_SYNC_DEFAULT_WINDOW_SECS` | 3600 |
//! | `FIRM_SYNC_LOCK_KEY` | `pda-sync` |
//! | `FIRM_SYNC_LOG_LEVEL` | info |
//! | `FIRM_SYNC_LOG_FORMAT` | pretty |
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::SyncSettings;
//! use std::time::Duration;
//!
//! let settings = SyncSettings::builder()
//!     .database_url("sqlite://firm-sync.db")
//!     .provider_base_url("https://pda.example.com")
//!     .provider_api_key("key")
//!     .interval(Duration::from_secs(3600))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::{LogFormat, LogLevel, LoggingConfig};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LOCK_KEY: &str = "pda-sync";
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(86_400);
pub const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(600);
/// Interval plus the safety buffer, rounded up to 25 hours.
pub const DEFAULT_WINDOW_CAP: Duration = Duration::from_secs(90_000);
pub const DEFAULT_SAFETY_BUFFER: Duration = Duration::from_secs(300);
pub const DEFAULT_FIRST_RUN_WINDOW: Duration = Duration::from_secs(3_600);

const ENV_PREFIX: &str = "FIRM_SYNC_";

// ============================================================================
// Settings
// ============================================================================

/// How the provider dataset is obtained.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Base URL of the provider API, e.g. `https://pda.example.com`
    pub base_url: Option<String>,
    /// Value of the `x-authorization` header
    pub api_key: String,
    /// Read the snapshot from this file instead of calling the API
    pub local_file: Option<PathBuf>,
    /// Read and connect timeout
    pub timeout: Duration,
}

impl ProviderSettings {
    pub fn use_local_file(&self) -> bool {
        self.local_file.is_some()
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &crate::logging::redact_if_sensitive("api_key", &self.api_key),
            )
            .field("local_file", &self.local_file)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// When the scheduler fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub interval: Duration,
    pub run_on_startup: bool,
}

/// Lease lock parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSettings {
    pub key: String,
    pub lease_timeout: Duration,
    /// How often held leases are pushed forward while work runs
    pub renewal_interval: Duration,
}

/// Fetch window parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
    /// A single run never covers more than this
    pub cap: Duration,
    /// Overlap with the previous successful window
    pub safety_buffer: Duration,
    /// Window length when no run has ever succeeded
    pub default_window: Duration,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            cap: DEFAULT_WINDOW_CAP,
            safety_buffer: DEFAULT_SAFETY_BUFFER,
            default_window: DEFAULT_FIRST_RUN_WINDOW,
        }
    }
}

/// Complete service configuration.
#[derive(Clone)]
pub struct SyncSettings {
    /// SQLite database location (`sqlite://path` or a plain path)
    pub database_url: String,
    pub provider: ProviderSettings,
    pub scheduler: SchedulerSettings,
    pub lock: LockSettings,
    pub window: WindowSettings,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSettings")
            .field(
                "database_url",
                &crate::logging::strip_path(&self.database_url),
            )
            .field("provider", &self.provider)
            .field("scheduler", &self.scheduler)
            .field("lock", &self.lock)
            .field("window", &self.window)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl SyncSettings {
    /// Creates a new builder for constructing `SyncSettings`.
    pub fn builder() -> SyncSettingsBuilder {
        SyncSettingsBuilder::default()
    }

    /// Load settings from `FIRM_SYNC_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required variable is missing, a value
    /// does not parse, or the combination fails validation.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let mut builder = SyncSettings::builder();

        if let Some(url) = env.string("DATABASE_URL") {
            builder = builder.database_url(url);
        }
        if let Some(url) = env.string("PROVIDER_BASE_URL") {
            builder = builder.provider_base_url(url);
        }
        if let Some(key) = env.raw("PROVIDER_API_KEY") {
            builder = builder.provider_api_key(key);
        }
        if let Some(path) = env.string("PROVIDER_LOCAL_FILE") {
            builder = builder.provider_local_file(path);
        }
        if let Some(timeout) = env.seconds("PROVIDER_TIMEOUT_SECS")? {
            builder = builder.provider_timeout(timeout);
        }
        if let Some(enabled) = env.flag("SCHEDULER_ENABLED")? {
            builder = builder.scheduler_enabled(enabled);
        }
        if let Some(interval) = env.seconds("INTERVAL_SECS")? {
            builder = builder.interval(interval);
        }
        if let Some(run) = env.flag("RUN_ON_STARTUP")? {
            builder = builder.run_on_startup(run);
        }
        if let Some(lease) = env.seconds("LEASE_TIMEOUT_SECS")? {
            builder = builder.lease_timeout(lease);
        }
        if let Some(renewal) = env.seconds("LEASE_RENEWAL_SECS")? {
            builder = builder.lease_renewal_interval(renewal);
        }
        if let Some(cap) = env.seconds("WINDOW_CAP_SECS")? {
            builder = builder.window_cap(cap);
        }
        if let Some(buffer) = env.seconds("SAFETY_BUFFER_SECS")? {
            builder = builder.safety_buffer(buffer);
        }
        if let Some(window) = env.seconds("DEFAULT_WINDOW_SECS")? {
            builder = builder.default_window(window);
        }
        if let Some(key) = env.string("LOCK_KEY") {
            builder = builder.lock_key(key);
        }
        if let Some(level) = env.string("LOG_LEVEL") {
            builder = builder.log_level(level.parse()?);
        }
        if let Some(format) = env.string("LOG_FORMAT") {
            builder = builder.log_format(format.parse()?);
        }

        builder.build()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config("Database URL cannot be empty".to_string()));
        }

        if self.provider.local_file.is_none()
            && self
                .provider
                .base_url
                .as_deref()
                .map_or(true, |url| url.trim().is_empty())
        {
            return Err(Error::Config(
                "Provider base URL is required unless a local snapshot file is configured. \
                 Set FIRM_SYNC_PROVIDER_BASE_URL or FIRM_SYNC_PROVIDER_LOCAL_FILE."
                    .to_string(),
            ));
        }

        if self.provider.timeout.is_zero() {
            return Err(Error::Config(
                "Provider timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.scheduler.interval.is_zero() {
            return Err(Error::Config(
                "Sync interval must be greater than 0 seconds".to_string(),
            ));
        }

        if self.lock.key.trim().is_empty() {
            return Err(Error::Config("Lock key cannot be empty".to_string()));
        }

        if self.lock.lease_timeout.is_zero() {
            return Err(Error::Config(
                "Lease timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.lock.renewal_interval.is_zero()
            || self.lock.renewal_interval >= self.lock.lease_timeout
        {
            return Err(Error::Config(format!(
                "Lease renewal interval ({}s) must be greater than 0 and shorter than the lease timeout ({}s)",
                self.lock.renewal_interval.as_secs(),
                self.lock.lease_timeout.as_secs()
            )));
        }

        if self.window.cap.is_zero() {
            return Err(Error::Config(
                "Window cap must be greater than 0 seconds".to_string(),
            ));
        }

        if self.window.safety_buffer >= self.window.cap {
            return Err(Error::Config(format!(
                "Safety buffer ({}s) must be shorter than the window cap ({}s), \
                 otherwise a run can never move the window forward",
                self.window.safety_buffer.as_secs(),
                self.window.cap.as_secs()
            )));
        }

        // Each run moves the watermark by at most cap - buffer.
        let advance = self.window.cap - self.window.safety_buffer;
        if self.scheduler.interval > advance {
            return Err(Error::Config(format!(
                "Sync interval ({}s) exceeds window cap minus safety buffer ({}s); \
                 the watermark would fall further behind on every run. \
                 Raise FIRM_SYNC_WINDOW_CAP_SECS or shorten FIRM_SYNC_INTERVAL_SECS.",
                self.scheduler.interval.as_secs(),
                advance.as_secs()
            )));
        }

        if self.window.default_window.is_zero() {
            return Err(Error::Config(
                "Default window must be greater than 0 seconds".to_string(),
            ));
        }

        Ok(())
    }

    /// Logging configuration derived from these settings.
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::default()
            .with_level(self.log_level)
            .with_format(self.log_format)
    }
}

// ============================================================================
// Environment parsing
// ============================================================================

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{}{}", ENV_PREFIX, name))
    }

    /// Present and not blank.
    fn string(&self, name: &str) -> Option<String> {
        self.raw(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn seconds(&self, name: &str) -> Result<Option<Duration>> {
        match self.string(name) {
            None => Ok(None),
            Some(value) => value.parse::<u64>().map(|s| Some(Duration::from_secs(s))).map_err(|_| {
                Error::Config(format!(
                    "{}{} must be a whole number of seconds, got '{}'",
                    ENV_PREFIX, name, value
                ))
            }),
        }
    }

    fn flag(&self, name: &str) -> Result<Option<bool>> {
        match self.string(name) {
            None => Ok(None),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(Error::Config(format!(
                    "{}{} must be true or false, got '{}'",
                    ENV_PREFIX, name, value
                ))),
            },
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SyncSettings`].
///
/// Only the database URL and a provider source are required; everything
/// else has a default.
#[derive(Debug, Default)]
pub struct SyncSettingsBuilder {
    database_url: Option<String>,
    provider_base_url: Option<String>,
    provider_api_key: Option<String>,
    provider_local_file: Option<PathBuf>,
    provider_timeout: Option<Duration>,
    scheduler_enabled: Option<bool>,
    interval: Option<Duration>,
    run_on_startup: Option<bool>,
    lock_key: Option<String>,
    lease_timeout: Option<Duration>,
    lease_renewal_interval: Option<Duration>,
    window_cap: Option<Duration>,
    safety_buffer: Option<Duration>,
    default_window: Option<Duration>,
    log_level: Option<LogLevel>,
    log_format: Option<LogFormat>,
}

impl SyncSettingsBuilder {
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn provider_base_url(mut self, url: impl Into<String>) -> Self {
        self.provider_base_url = Some(url.into());
        self
    }

    pub fn provider_api_key(mut self, key: impl Into<String>) -> Self {
        self.provider_api_key = Some(key.into());
        self
    }

    /// Read the provider snapshot from a local JSON file.
    pub fn provider_local_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.provider_local_file = Some(path.into());
        self
    }

    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = Some(timeout);
        self
    }

    pub fn scheduler_enabled(mut self, enabled: bool) -> Self {
        self.scheduler_enabled = Some(enabled);
        self
    }

    /// Period between scheduled runs.
    ///
    /// Default: 24 hours
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn run_on_startup(mut self, run: bool) -> Self {
        self.run_on_startup = Some(run);
        self
    }

    pub fn lock_key(mut self, key: impl Into<String>) -> Self {
        self.lock_key = Some(key.into());
        self
    }

    /// Default: 10 minutes
    pub fn lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = Some(timeout);
        self
    }

    /// Default: a third of the lease timeout
    pub fn lease_renewal_interval(mut self, interval: Duration) -> Self {
        self.lease_renewal_interval = Some(interval);
        self
    }

    pub fn window_cap(mut self, cap: Duration) -> Self {
        self.window_cap = Some(cap);
        self
    }

    pub fn safety_buffer(mut self, buffer: Duration) -> Self {
        self.safety_buffer = Some(buffer);
        self
    }

    pub fn default_window(mut self, window: Duration) -> Self {
        self.default_window = Some(window);
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = Some(format);
        self
    }

    /// Builds and validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the database URL is missing or
    /// [`SyncSettings::validate`] rejects the combination.
    pub fn build(self) -> Result<SyncSettings> {
        let database_url = self.database_url.ok_or_else(|| {
            Error::Config("Database URL is required. Use .database_url() to set it.".to_string())
        })?;

        let lease_timeout = self.lease_timeout.unwrap_or(DEFAULT_LEASE_TIMEOUT);
        let renewal_interval = self
            .lease_renewal_interval
            .unwrap_or_else(|| lease_timeout / 3);

        let settings = SyncSettings {
            database_url,
            provider: ProviderSettings {
                base_url: self.provider_base_url,
                api_key: self.provider_api_key.unwrap_or_default(),
                local_file: self.provider_local_file,
                timeout: self.provider_timeout.unwrap_or(DEFAULT_PROVIDER_TIMEOUT),
            },
            scheduler: SchedulerSettings {
                enabled: self.scheduler_enabled.unwrap_or(true),
                interval: self.interval.unwrap_or(DEFAULT_INTERVAL),
                run_on_startup: self.run_on_startup.unwrap_or(false),
            },
            lock: LockSettings {
                key: self
                    .lock_key
                    .unwrap_or_else(|| DEFAULT_LOCK_KEY.to_string()),
                lease_timeout,
                renewal_interval,
            },
            window: WindowSettings {
                cap: self.window_cap.unwrap_or(DEFAULT_WINDOW_CAP),
                safety_buffer: self.safety_buffer.unwrap_or(DEFAULT_SAFETY_BUFFER),
                default_window: self.default_window.unwrap_or(DEFAULT_FIRST_RUN_WINDOW),
            },
            log_level: self.log_level.unwrap_or(LogLevel::Info),
            log_format: self.log_format.unwrap_or(LogFormat::Pretty),
        };

        settings.validate()?;

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn minimal() -> SyncSettingsBuilder {
        SyncSettings::builder()
            .database_url("sqlite::memory:")
            .provider_base_url("https://pda.example.com")
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_builder_defaults() {
        let settings = minimal().build().unwrap();

        assert_eq!(settings.lock.key, "pda-sync");
        assert_eq!(settings.lock.lease_timeout, Duration::from_secs(600));
        assert_eq!(settings.lock.renewal_interval, Duration::from_secs(200));
        assert_eq!(settings.scheduler.interval, Duration::from_secs(86_400));
        assert!(settings.scheduler.enabled);
        assert!(!settings.scheduler.run_on_startup);
        assert_eq!(settings.window, WindowSettings::default());
        assert_eq!(settings.provider.timeout, Duration::from_secs(30));
        assert!(!settings.provider.use_local_file());
    }

    #[test]
    fn test_builder_requires_database_url() {
        let err = SyncSettings::builder()
            .provider_base_url("https://pda.example.com")
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::Config(msg) if msg.contains(".database_url()")));
    }

    #[test]
    fn test_builder_requires_provider_source() {
        let err = SyncSettings::builder()
            .database_url("sqlite::memory:")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("Provider base URL")));

        let local = SyncSettings::builder()
            .database_url("sqlite::memory:")
            .provider_local_file("/tmp/snapshot.json")
            .build()
            .unwrap();
        assert!(local.provider.use_local_file());
    }

    #[test]
    fn test_validation_rejects_inconsistent_windows() {
        let err = minimal()
            .window_cap(Duration::from_secs(60))
            .safety_buffer(Duration::from_secs(60))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("Safety buffer")));

        assert!(minimal().window_cap(Duration::ZERO).build().is_err());
        assert!(minimal().interval(Duration::ZERO).build().is_err());
        assert!(minimal().lease_timeout(Duration::ZERO).build().is_err());
    }

    #[test]
    fn test_validation_rejects_interval_the_window_cannot_keep_up_with() {
        let err = minimal()
            .interval(Duration::from_secs(86_400))
            .window_cap(Duration::from_secs(3_600))
            .safety_buffer(Duration::from_secs(300))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("exceeds window cap")));

        let hourly = minimal()
            .interval(Duration::from_secs(3_300))
            .window_cap(Duration::from_secs(3_600))
            .safety_buffer(Duration::from_secs(300))
            .build();
        assert!(hourly.is_ok());
    }

    #[test]
    fn test_default_window_cap_covers_default_interval() {
        let settings = minimal().build().unwrap();

        assert!(
            settings.window.cap - settings.window.safety_buffer >= settings.scheduler.interval
        );
    }

    #[test]
    fn test_validation_rejects_renewal_longer_than_lease() {
        let err = minimal()
            .lease_timeout(Duration::from_secs(30))
            .lease_renewal_interval(Duration::from_secs(30))
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::Config(msg) if msg.contains("renewal")));
    }

    #[test]
    fn test_from_lookup_reads_all_variables() {
        let settings = SyncSettings::from_lookup(lookup_from(&[
            ("FIRM_SYNC_DATABASE_URL", "sqlite://sync.db"),
            ("FIRM_SYNC_PROVIDER_BASE_URL", "https://pda.example.com"),
            ("FIRM_SYNC_PROVIDER_API_KEY", "abc"),
            ("FIRM_SYNC_PROVIDER_TIMEOUT_SECS", "10"),
            ("FIRM_SYNC_SCHEDULER_ENABLED", "false"),
            ("FIRM_SYNC_INTERVAL_SECS", "120"),
            ("FIRM_SYNC_RUN_ON_STARTUP", "yes"),
            ("FIRM_SYNC_LEASE_TIMEOUT_SECS", "90"),
            ("FIRM_SYNC_LEASE_RENEWAL_SECS", "20"),
            ("FIRM_SYNC_WINDOW_CAP_SECS", "1800"),
            ("FIRM_SYNC_SAFETY_BUFFER_SECS", "60"),
            ("FIRM_SYNC_DEFAULT_WINDOW_SECS", "900"),
            ("FIRM_SYNC_LOCK_KEY", "custom-key"),
            ("FIRM_SYNC_LOG_LEVEL", "debug"),
            ("FIRM_SYNC_LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(settings.database_url, "sqlite://sync.db");
        assert_eq!(settings.provider.api_key, "abc");
        assert_eq!(settings.provider.timeout, Duration::from_secs(10));
        assert!(!settings.scheduler.enabled);
        assert_eq!(settings.scheduler.interval, Duration::from_secs(120));
        assert!(settings.scheduler.run_on_startup);
        assert_eq!(settings.lock.lease_timeout, Duration::from_secs(90));
        assert_eq!(settings.lock.renewal_interval, Duration::from_secs(20));
        assert_eq!(settings.lock.key, "custom-key");
        assert_eq!(settings.window.cap, Duration::from_secs(1800));
        assert_eq!(settings.window.safety_buffer, Duration::from_secs(60));
        assert_eq!(settings.window.default_window, Duration::from_secs(900));
        assert_eq!(settings.log_level, LogLevel::Debug);
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_from_lookup_reports_bad_numbers() {
        let err = SyncSettings::from_lookup(lookup_from(&[
            ("FIRM_SYNC_DATABASE_URL", "sqlite://sync.db"),
            ("FIRM_SYNC_PROVIDER_BASE_URL", "https://pda.example.com"),
            ("FIRM_SYNC_INTERVAL_SECS", "daily"),
        ]))
        .unwrap_err();

        assert!(matches!(err, Error::Config(msg) if msg.contains("FIRM_SYNC_INTERVAL_SECS")));
    }

    #[test]
    fn test_debug_output_redacts_api_key() {
        let settings = minimal().provider_api_key("super-secret").build().unwrap();
        let rendered = format!("{:?}", settings);

        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
