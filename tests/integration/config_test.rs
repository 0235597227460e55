use std::fs;

use hostfacts::core::config::Config;
use hostfacts::core::fleet::ProbeKind;
use tempfile::TempDir;

#[test]
fn test_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load_from(&dir.path().join("config.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hostfacts").join("config.json");

    let mut config = Config::default();
    config.set_key("workers", "16").unwrap();
    config.set_key("probe", "tcp").unwrap();
    config.set_key("console_sessions", "true").unwrap();
    config.set_key("activity_log", "activity.csv").unwrap();
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.probe, ProbeKind::Tcp);
}

#[test]
fn test_corrupt_or_empty_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    fs::write(&path, "{ not json").unwrap();
    assert_eq!(Config::load_from(&path).unwrap(), Config::default());

    fs::write(&path, "").unwrap();
    assert_eq!(Config::load_from(&path).unwrap(), Config::default());
}

#[test]
fn test_partial_file_fills_in_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "workers": 2, "json_depth": 6 }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.workers, 2);
    assert_eq!(config.json_depth, 6);
    assert_eq!(config.tcp_probe_port, 5985);
    assert_eq!(config.public_ip_services.len(), 3);
}
