//! API key resolution tiers
//!
//! Environment-variable tests share process state and run serially.

use curio_ai::config::{CredentialStore, SettingsCredentialStore};
use curio_ai::db::settings::{set_api_key, set_owner_api_key};
use curio_common::config::TomlConfig;
use serial_test::serial;
use std::env;

const ENV_VAR: &str = "GEMINI_API_KEY";

fn toml_with_key(key: &str) -> TomlConfig {
    TomlConfig::from_toml_str(&format!("[api_keys]\ngemini = \"{}\"\n", key)).unwrap()
}

#[tokio::test]
#[serial]
async fn test_toml_key_is_last_resort() {
    env::remove_var(ENV_VAR);
    let pool = curio_common::db::init_memory_database().await.unwrap();
    let store = SettingsCredentialStore::new(pool, &toml_with_key("toml-key"));

    assert_eq!(store.api_key("alice", "gemini").await.unwrap().as_deref(), Some("toml-key"));
    assert_eq!(store.api_key("alice", "openai").await.unwrap(), None);
}

#[tokio::test]
#[serial]
async fn test_env_beats_toml_and_settings_beat_env() {
    env::set_var(ENV_VAR, "env-key");
    let pool = curio_common::db::init_memory_database().await.unwrap();
    let store = SettingsCredentialStore::new(pool.clone(), &toml_with_key("toml-key"));

    assert_eq!(store.api_key("alice", "gemini").await.unwrap().as_deref(), Some("env-key"));

    set_api_key(&pool, "gemini", "shared-key").await.unwrap();
    assert_eq!(store.api_key("alice", "gemini").await.unwrap().as_deref(), Some("shared-key"));

    set_owner_api_key(&pool, "alice", "gemini", "alice-key").await.unwrap();
    assert_eq!(store.api_key("alice", "gemini").await.unwrap().as_deref(), Some("alice-key"));
    assert_eq!(store.api_key("bob", "gemini").await.unwrap().as_deref(), Some("shared-key"));

    env::remove_var(ENV_VAR);
}

#[tokio::test]
#[serial]
async fn test_blank_keys_are_skipped() {
    env::set_var(ENV_VAR, "   ");
    let pool = curio_common::db::init_memory_database().await.unwrap();
    set_api_key(&pool, "gemini", "").await.unwrap();
    let store = SettingsCredentialStore::new(pool, &TomlConfig::default());

    assert_eq!(store.api_key("alice", "gemini").await.unwrap(), None);

    env::remove_var(ENV_VAR);
}
