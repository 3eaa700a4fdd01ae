//! Configuration resolution and graceful degradation tests
//!
//! Uses serial_test because the tests mutate process environment variables.

use curio_common::config::{
    resolve_config_path, resolve_root_folder, TomlConfig, CONFIG_ENV_VAR, ROOT_FOLDER_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
#[serial]
fn test_cli_argument_wins_over_environment() {
    env::set_var(ROOT_FOLDER_ENV_VAR, "/tmp/from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/tmp/from-cli")), &config);
    assert_eq!(resolved, PathBuf::from("/tmp/from-cli"));

    env::remove_var(ROOT_FOLDER_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_wins_over_toml() {
    env::set_var(ROOT_FOLDER_ENV_VAR, "/tmp/from-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/tmp/from-env"));

    env::remove_var(ROOT_FOLDER_ENV_VAR);
}

#[test]
#[serial]
fn test_toml_root_folder_used_without_overrides() {
    env::remove_var(ROOT_FOLDER_ENV_VAR);
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/from-toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/tmp/from-toml"));
}

#[test]
#[serial]
fn test_default_root_folder_is_non_empty() {
    env::remove_var(ROOT_FOLDER_ENV_VAR);
    let resolved = resolve_root_folder(None, &TomlConfig::default());
    assert!(!resolved.as_os_str().is_empty());
}

#[test]
#[serial]
fn test_config_env_var_names_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    assert_eq!(resolve_config_path(None), Some(path.clone()));

    let config = TomlConfig::load_or_default(None);
    assert_eq!(config.server.port, 9000);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_unreadable_config_falls_back_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "this is = = not toml").unwrap();

    let config = TomlConfig::load_or_default(Some(&path));
    assert_eq!(config.server.port, 5780);
    assert_eq!(config.generation.default_backend, "anthropic");
}
