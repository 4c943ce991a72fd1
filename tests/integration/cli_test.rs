use gravity::commands::{self, config};
use gravity::core::sampler::EnvironmentKind;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_cli_definition_is_consistent() {
    commands::cli().debug_assert();
}

#[test]
fn test_global_flags_override_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{"cycle_interval_ms": 250, "cadences": {"gpu": 3}}"#).unwrap();
    let path = path.to_string_lossy().to_string();

    let matches = commands::cli()
        .try_get_matches_from(["gravity", "snapshot", "--config", path.as_str(), "--interval-ms", "750", "--env", "wsl"])
        .unwrap();
    let (name, sub_matches) = matches.subcommand().unwrap();
    assert_eq!(name, "snapshot");

    let resolved = config::resolve(sub_matches).unwrap();
    assert_eq!(resolved.cycle_interval_ms, 750);
    assert_eq!(resolved.cadences.gpu, 3);
    assert_eq!(resolved.environment_override, Some(EnvironmentKind::TranslationLayer));
}

#[test]
fn test_invalid_overrides_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    let path = path.to_string_lossy().to_string();

    let matches = commands::cli()
        .try_get_matches_from(["gravity", "env", "--config", path.as_str(), "--env", "plan9"])
        .unwrap();
    let (_, sub_matches) = matches.subcommand().unwrap();
    assert!(config::resolve(sub_matches).is_err());

    let matches = commands::cli()
        .try_get_matches_from(["gravity", "run", "--config", path.as_str(), "--interval-ms", "0"])
        .unwrap();
    let (_, sub_matches) = matches.subcommand().unwrap();
    assert!(config::resolve(sub_matches).is_err());
}

#[test]
fn test_subcommand_required() {
    assert!(commands::cli().try_get_matches_from(["gravity"]).is_err());
}
