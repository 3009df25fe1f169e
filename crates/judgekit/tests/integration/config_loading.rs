use judgekit::config::Config;

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert!(config.languages["python"].has_runtime());
    assert!(!config.languages["go"].has_runtime());
    assert_eq!(config.languages["go"].judge_id, Some(60));
    assert_eq!(config.default_limits.wall_time_limit, Some(2.0));
    assert_eq!(config.execution.default_test_case_limit, 3);
    assert_eq!(config.judge.url, "http://localhost:2358");
    assert_eq!(config.judge.max_poll_attempts, 8);

    let runtime = config.languages["python"].runtime.as_ref().unwrap();
    let limits = config.effective_limits(runtime.limits.as_ref());
    assert_eq!(limits.wall_time_limit, Some(1.0));
    assert_eq!(limits.max_output, Some(64));
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert!(config.languages.contains_key("python"));
    assert!(config.resource_root.is_none());
}

#[test]
fn test_load_without_file_uses_embedded_config() {
    let config = Config::load(None).expect("Failed to load config");
    assert!(config.languages.contains_key("python"));
    assert!(config.languages.contains_key("rust"));
}

#[test]
fn test_load_invalid_configs() {
    for name in [
        "invalid_empty_name",
        "invalid_missing_placeholder",
        "invalid_zero_slots",
        "invalid_extension",
    ] {
        let path = format!("{FIXTURES_PATH}/configs/{name}.toml");
        assert!(Config::from_file(&path).is_err(), "{name} should be rejected");
    }
}

#[test]
fn test_load_missing_file() {
    let result = Config::from_file("/nonexistent/judgekit.toml");
    assert!(result.is_err());
}
