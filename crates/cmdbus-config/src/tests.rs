//! Unit tests for bus configuration.

use std::str::FromStr;
use std::time::Duration;

use rstest::rstest;

use super::*;

#[test]
fn defaults_match_reference_limits() {
    let config = Config::default();
    assert_eq!(config.max_listeners(), 10);
    assert_eq!(config.max_line_bytes(), 1024);
    assert_eq!(config.call_timeout(), Duration::from_secs(2));
    assert_eq!(config.on_fatal(), FatalPolicy::Abort);
    assert_eq!(config.log_filter(), "info");
    assert_eq!(config.log_format(), LogFormat::Json);
    config.validate().expect("defaults should validate");
}

#[test]
fn partial_documents_fall_back_to_defaults() {
    let config: Config =
        serde_json::from_str(r#"{"max_listeners": 4, "on_fatal": "stop"}"#).expect("parse");
    assert_eq!(config.max_listeners(), 4);
    assert_eq!(config.on_fatal(), FatalPolicy::Stop);
    assert_eq!(config.max_line_bytes(), DEFAULT_MAX_LINE_BYTES);
    assert_eq!(config.call_timeout(), default_call_timeout());
}

#[test]
fn timeout_is_read_in_milliseconds() {
    let config: Config = serde_json::from_str(r#"{"call_timeout_ms": 250}"#).expect("parse");
    assert_eq!(config.call_timeout(), Duration::from_millis(250));
}

#[test]
fn builder_overrides_every_field() {
    let config = Config::default()
        .with_max_listeners(3)
        .with_max_line_bytes(64)
        .with_call_timeout(Duration::from_millis(1500))
        .with_on_fatal(FatalPolicy::Stop)
        .with_log_filter("cmdbus=debug")
        .with_log_format(LogFormat::Compact);
    assert_eq!(config.max_listeners(), 3);
    assert_eq!(config.max_line_bytes(), 64);
    assert_eq!(config.call_timeout(), Duration::from_millis(1500));
    assert_eq!(config.on_fatal(), FatalPolicy::Stop);
    assert_eq!(config.log_filter(), "cmdbus=debug");
    assert_eq!(config.log_format(), LogFormat::Compact);
}

#[rstest]
#[case(Config::default().with_max_listeners(0), ConfigError::ZeroListeners)]
#[case(
    Config::default().with_max_line_bytes(1),
    ConfigError::LineLimitTooSmall { minimum: 2, actual: 1 }
)]
#[case(Config::default().with_call_timeout(Duration::ZERO), ConfigError::ZeroTimeout)]
fn validate_rejects_unusable_limits(#[case] config: Config, #[case] expected: ConfigError) {
    assert_eq!(config.validate(), Err(expected));
}

#[rstest]
#[case("abort", FatalPolicy::Abort)]
#[case("STOP", FatalPolicy::Stop)]
fn fatal_policy_parses_case_insensitively(#[case] text: &str, #[case] expected: FatalPolicy) {
    assert_eq!(FatalPolicy::from_str(text).expect("parse policy"), expected);
}

#[rstest]
#[case("json", LogFormat::Json, true)]
#[case("Compact", LogFormat::Compact, false)]
fn log_format_parses_and_reports_structure(
    #[case] text: &str,
    #[case] expected: LogFormat,
    #[case] structured: bool,
) {
    let format = LogFormat::from_str(text).expect("parse format");
    assert_eq!(format, expected);
    assert_eq!(format.is_structured(), structured);
}

#[test]
fn unknown_policy_is_rejected() {
    assert!(FatalPolicy::from_str("ignore").is_err());
}
