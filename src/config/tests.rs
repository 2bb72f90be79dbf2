//! Tests for config functionality.

use crate::config::Config;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.max_wait_ms, 300_000);
    assert_eq!(config.stale_ms, 30_000);
    assert_eq!(config.refresh_ms, 10_000);
    assert_eq!(config.poll_interval_ms, 500);
    assert_eq!(config.waiting_notify_interval_ms, 10_000);
    assert_eq!(config.store_retry_attempts, 8);
    assert!(config.event_log);
    assert!(config.exempt_globs.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_empty_yaml_uses_defaults() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config.max_wait_ms, 300_000);
    assert_eq!(config.stale_ms, 30_000);
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
max_wait_ms: 60000
poll_interval_ms: 250
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.max_wait_ms, 60_000);
    assert_eq!(config.poll_interval_ms, 250);

    // Unspecified values should use defaults
    assert_eq!(config.stale_ms, 30_000);
    assert!(config.event_log);
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
max_wait_ms: 120000
poll_interval_ms: 200
waiting_notify_interval_ms: 5000
stale_ms: 20000
refresh_ms: 5000
store_retry_attempts: 4
store_retry_base_ms: 10
event_log: false
exempt_globs:
  - "**/*.log"
  - "tmp/**"
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.max_wait_ms, 120_000);
    assert_eq!(config.poll_interval_ms, 200);
    assert_eq!(config.waiting_notify_interval_ms, 5_000);
    assert_eq!(config.stale_ms, 20_000);
    assert_eq!(config.refresh_ms, 5_000);
    assert_eq!(config.store_retry_attempts, 4);
    assert_eq!(config.store_retry_base_ms, 10);
    assert!(!config.event_log);
    assert_eq!(config.exempt_globs.len(), 2);
}

#[test]
fn test_unknown_fields_ignored() {
    let yaml = r#"
max_wait_ms: 90000
future_option: true
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.max_wait_ms, 90_000);
}

#[test]
fn test_stale_must_be_at_most_half_of_max_wait() {
    let yaml = r#"
max_wait_ms: 50000
stale_ms: 30000
"#;
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("at most half of max_wait_ms"));

    // Exactly half is accepted.
    let yaml = r#"
max_wait_ms: 60000
stale_ms: 30000
"#;
    assert!(Config::from_yaml(yaml).is_ok());
}

#[test]
fn test_refresh_must_be_below_stale() {
    let yaml = r#"
stale_ms: 10000
refresh_ms: 10000
"#;
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("refresh_ms"));
}

#[test]
fn test_zero_values_rejected() {
    let err = Config::from_yaml("poll_interval_ms: 0").unwrap_err();
    assert!(err.to_string().contains("poll_interval_ms must be greater than 0"));

    let err = Config::from_yaml("store_retry_attempts: 0").unwrap_err();
    assert!(err.to_string().contains("store_retry_attempts"));
}

#[test]
fn test_invalid_exempt_glob_rejected() {
    let yaml = r#"
exempt_globs:
  - "src/[unclosed"
"#;
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("invalid exempt glob"));
}

#[test]
fn test_exempt_matcher_matches() {
    let config = Config {
        exempt_globs: vec!["**/*.log".to_string()],
        ..Config::default()
    };
    let matcher = config.exempt_matcher().unwrap();
    assert!(matcher.is_match("/repo/build/out.log"));
    assert!(!matcher.is_match("/repo/src/main.rs"));
}

#[test]
fn test_coordinator_options_conversion() {
    let config = Config::default();
    let options = config.coordinator_options();

    assert_eq!(options.max_wait, Duration::from_secs(300));
    assert_eq!(options.poll_interval, Duration::from_millis(500));
    assert_eq!(options.file_lock.stale_threshold, Duration::from_secs(30));
    assert_eq!(options.file_lock.refresh_interval, Duration::from_secs(10));
    assert_eq!(options.retry.attempts, 8);
    assert_eq!(options.retry.base_delay, Duration::from_millis(20));
}

#[test]
fn test_yaml_roundtrip_preserves_values() {
    let config = Config {
        max_wait_ms: 80_000,
        exempt_globs: vec!["*.tmp".to_string()],
        ..Config::default()
    };
    let yaml = config.to_yaml().unwrap();
    let parsed = Config::from_yaml(&yaml).unwrap();
    assert_eq!(parsed.max_wait_ms, 80_000);
    assert_eq!(parsed.exempt_globs, vec!["*.tmp".to_string()]);
}

#[test]
fn test_load_or_default_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::load_or_default(temp_dir.path().join("config.yaml")).unwrap();
    assert_eq!(config.max_wait_ms, 300_000);
}

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    std::fs::write(&path, "poll_interval_ms: 100\n").unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.poll_interval_ms, 100);
}

#[test]
fn test_load_invalid_yaml_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    std::fs::write(&path, "max_wait_ms: [not, a, number]\n").unwrap();

    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("failed to parse config YAML"));
}
