// Settings precedence: defaults, Settings.toml in the secrets dir, then environment
use std::fs;

use appleauth::apple::AppleConfig;
use appleauth::AppleAuthSettings;
use serial_test::serial;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "APPLEAUTH_SECRETS_DIR",
    "APPLE_CLIENT_ID",
    "APPLE_TEAM_ID",
    "APPLE_KEY_ID",
    "APPLE_PRIVATE_KEY",
    "APPLE_PRIVATE_KEY_PATH",
    "APPLE_TOKEN_TTL",
    "APPLE_VERIFY_ID_TOKEN",
    "APPLE_REDIRECT_URL",
    "PORT",
];

fn clean_env_vars() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

fn write_settings(dir: &TempDir, key_path: &str) {
    let toml = format!(
        r#"
[application]
port = 9090

[apple]
client_id = "com.example.web"
team_id = "TEAM123456"
key_id = "KEY789XYZ"
private_key_path = "{key_path}"
redirect_url = "https://api.example/apple/token"
token_callback_url = "https://fe.example/apple/error"
scope = ["email"]
token_ttl_seconds = 3600

[jwt_validation]
enabled = false
"#
    );
    fs::write(dir.path().join("Settings.toml"), toml).expect("Failed to write Settings.toml");
}

fn write_key(dir: &TempDir) -> String {
    let path = dir.path().join("AuthKey_KEY789XYZ.p8");
    fs::write(&path, appleauth::testing::fixtures::TEST_PRIVATE_KEY)
        .expect("Failed to write key file");
    path.display().to_string()
}

#[test]
#[serial]
fn test_secrets_dir_settings_are_loaded() {
    clean_env_vars();
    let dir = TempDir::new().unwrap();
    let key_path = write_key(&dir);
    write_settings(&dir, &key_path);
    std::env::set_var("APPLEAUTH_SECRETS_DIR", dir.path());

    let settings = AppleAuthSettings::load_settings().unwrap();
    assert_eq!(settings.application.port, 9090);
    assert_eq!(settings.apple.client_id, "com.example.web");
    assert_eq!(settings.apple.scope, vec!["email".to_string()]);
    assert_eq!(settings.apple.token_ttl_seconds, 3600);
    // Unset values keep their defaults
    assert_eq!(settings.apple.fe_redirect_url_param, "fe_redirect_url");

    let config = AppleConfig::from_settings(&settings).unwrap();
    assert_eq!(config.token_ttl, 3600);
    assert!(config.private_key.contains("BEGIN PRIVATE KEY"));

    clean_env_vars();
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clean_env_vars();
    let dir = TempDir::new().unwrap();
    let key_path = write_key(&dir);
    write_settings(&dir, &key_path);
    std::env::set_var("APPLEAUTH_SECRETS_DIR", dir.path());
    std::env::set_var("APPLE_CLIENT_ID", "com.example.other");
    std::env::set_var("APPLE_VERIFY_ID_TOKEN", "true");
    std::env::set_var("PORT", "7070");

    let settings = AppleAuthSettings::load_settings().unwrap();
    assert_eq!(settings.apple.client_id, "com.example.other");
    assert_eq!(settings.application.port, 7070);
    assert!(settings.jwt_validation.enabled);

    let config = AppleConfig::from_settings(&settings).unwrap();
    assert!(config.jwt_validation.is_some());

    clean_env_vars();
}

#[test]
#[serial]
fn test_missing_secrets_fail_config() {
    clean_env_vars();
    let dir = TempDir::new().unwrap();
    std::env::set_var("APPLEAUTH_SECRETS_DIR", dir.path());

    let settings = AppleAuthSettings::load_settings().unwrap();
    let err = AppleConfig::from_settings(&settings).unwrap_err();
    assert!(err.to_string().contains("client_id"));

    clean_env_vars();
}

#[test]
#[serial]
fn test_invalid_toml_is_an_error() {
    clean_env_vars();
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Settings.toml"), "[apple\nclient_id = ").unwrap();
    std::env::set_var("APPLEAUTH_SECRETS_DIR", dir.path());

    assert!(AppleAuthSettings::load_settings().is_err());

    clean_env_vars();
}
