//! Integration tests for logging and settings wiring

use core_runtime::config::SyncSettings;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LogLevel, LoggingConfig,
};

#[test]
fn test_logging_initialization_only_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    assert!(init_logging(config.clone()).is_ok());
    // A global subscriber is now installed; a second attempt must fail cleanly.
    assert!(init_logging(config).is_err());
}

#[test]
fn test_invalid_custom_filter_is_config_error() {
    let config = LoggingConfig::default().with_filter("core_sync=[[[");
    let err = init_logging(config).unwrap_err();

    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_settings_produce_logging_config() {
    let settings = SyncSettings::builder()
        .database_url("sqlite::memory:")
        .provider_local_file("/srv/firm-sync/snapshot.json")
        .log_level(LogLevel::Warn)
        .log_format(LogFormat::Json)
        .build()
        .unwrap();

    let config = settings.logging_config();

    assert_eq!(config.level, LogLevel::Warn);
    assert_eq!(config.format, LogFormat::Json);
}

#[test]
fn test_secret_redaction() {
    assert_eq!(redact_if_sensitive("api_key", "abc123"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("x-authorization", "abc123"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("office_code", "0A123B"), "0A123B");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/srv/firm-sync/snapshot.json"), "snapshot.json");
    assert_eq!(strip_path("D:\\data\\snapshot.json"), "snapshot.json");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
