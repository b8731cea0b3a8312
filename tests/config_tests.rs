use chrono::Offset;
use choreboard::clock::Clock;
use choreboard::config::{Config, DuePolicy};
use choreboard::recurrence::DEFAULT_MAX_LOOKAHEAD_DAYS;

#[test]
fn test_partial_file_keeps_defaults() {
    let config = Config::from_toml_str(
        r#"
family = "smiths"
due_policy = "undated"
utc_offset_minutes = -300
"#,
    )
    .unwrap();
    assert_eq!(config.family, "smiths");
    assert_eq!(config.due_policy, DuePolicy::Undated);
    assert_eq!(config.utc_offset_minutes, Some(-300));
    assert_eq!(config.max_lookahead_days, DEFAULT_MAX_LOOKAHEAD_DAYS);
    assert_eq!(config.data_dir, Config::default().data_dir);
    assert_eq!(config.clock().offset().fix().local_minus_utc(), -300 * 60);
}

#[test]
fn test_empty_file_is_default() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.due_policy, DuePolicy::EndOfDay);
    assert_eq!(config.family, "home");
}

#[test]
fn test_invalid_file_is_an_error() {
    assert!(Config::from_toml_str("due_policy = \"sometimes\"").is_err());
    assert!(Config::from_toml_str("max_lookahead_days = -1").is_err());
}
