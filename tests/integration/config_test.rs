use gravity::core::sampler::EnvironmentKind;
use gravity::SamplerConfig;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_config_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");

    let config = SamplerConfig {
        cycle_interval_ms: 500,
        top_process_count: 10,
        environment_override: Some(EnvironmentKind::TranslationLayer),
        ..Default::default()
    };
    config.save_to(&path).unwrap();

    let loaded = SamplerConfig::load_from(&path).unwrap();
    assert_eq!(loaded, config);

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"translation_layer\""));
}

#[test]
fn test_config_missing_file_is_default() {
    let temp_dir = TempDir::new().unwrap();
    let loaded = SamplerConfig::load_from(&temp_dir.path().join("absent.json")).unwrap();
    assert_eq!(loaded, SamplerConfig::default());
}

#[test]
fn test_config_empty_file_is_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "  \n").unwrap();

    assert_eq!(SamplerConfig::load_from(&path).unwrap(), SamplerConfig::default());
}

#[test]
fn test_alert_thresholds_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{"alerts": {"disk_percent": 80}}"#).unwrap();

    let config = SamplerConfig::load_from(&path).unwrap();
    assert_eq!(config.alerts.disk_percent, 80.0);
    assert_eq!(config.alerts.memory_percent, 90.0);
}
