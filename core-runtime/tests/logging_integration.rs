//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, redact_url_query, LogFormat, LoggingConfig};

#[test]
fn test_logging_initialization_only_once() {
    // A process can install one global subscriber; the second call must
    // report an error instead of panicking.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn);

    let first = init_logging(config.clone());
    let second = init_logging(config);

    assert!(first.is_ok());
    assert!(second.is_err());
}

#[test]
fn test_relay_urls_are_shortened() {
    let relay = "https://api.allorigins.win/get?url=https%3A%2F%2Fitunes.apple.com%2Flookup%3Fid%3D1";
    let redacted = redact_url_query(relay);

    assert_eq!(redacted, "https://api.allorigins.win/get?…");
    assert!(!redacted.contains("itunes"));
}

#[test]
fn test_format_selection() {
    let expected = if cfg!(debug_assertions) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    };
    assert_eq!(LoggingConfig::default().format, expected);
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_filter("core_catalog=debug,core_cache=trace")
        .with_spans(false)
        .with_target(false);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert_eq!(
        config.filter.as_deref(),
        Some("core_catalog=debug,core_cache=trace")
    );
    assert!(!config.enable_spans);
    assert!(!config.display_target);
}
