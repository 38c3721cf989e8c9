//! Integration tests for logging configuration and redaction helpers

use bridge_traits::time::LogLevel;
use core_runtime::logging::{redact_if_sensitive, strip_path, LogFormat, LoggingConfig};

#[test]
fn test_config_builder() {
    // Only one subscriber per process, so exercise the builder rather than init
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug)
        .with_pii_redaction(true)
        .with_spans(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Debug);
    assert!(config.redact_pii);
    assert!(config.enable_spans);
}

#[test]
fn test_request_headers_redacted() {
    assert_eq!(redact_if_sensitive("Authorization", "Bearer abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("Cookie", "session=1"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("X-Api-Key", "k"), "[REDACTED]");
}

#[test]
fn test_plain_headers_pass_through() {
    assert_eq!(redact_if_sensitive("Accept", "image/*"), "image/*");
    assert_eq!(
        redact_if_sensitive("Referer", "https://user@example.com/a.png"),
        "https://user@example.com/a.png"
    );
}

#[test]
fn test_email_values_masked() {
    let redacted = redact_if_sensitive("X-Owner", "jo@example.com");
    assert!(redacted.starts_with('j'));
    assert!(redacted.contains("[REDACTED]"));
    assert!(!redacted.contains("example.com"));
}

#[test]
fn test_record_paths_stripped() {
    assert_eq!(
        strip_path("/home/jo/.cache/images/0cc175b9c0f1b6a831c399e269772661.bin"),
        "0cc175b9c0f1b6a831c399e269772661.bin"
    );
    assert_eq!(strip_path("C:\\cache\\images\\a.bin.tmp"), "a.bin.tmp");
    assert_eq!(strip_path("a.bin"), "a.bin");
    assert_eq!(strip_path("/var/cache/"), "");
}

#[test]
fn test_filter_configuration() {
    let config = LoggingConfig::default().with_filter("core_image_cache=trace");
    assert_eq!(config.filter.as_deref(), Some("core_image_cache=trace"));
}
