//! Integration tests for configuration loading and resolution
//!
//! Note: tests that set ZDM_* environment variables are marked #[serial]
//! so they never run in parallel with each other.

use serial_test::serial;
use std::path::Path;
use tempfile::TempDir;
use zdm_common::config::{
    resolve_config_path, Config, ENV_CONFIG_PATH, ENV_ZOOM_CLIENT_SECRET,
};

const MINIMAL: &str = r#"
[zoom]
account_id = "acct"
client_id = "client"
client_secret = "secret"
"#;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("zdm.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_minimal_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load(&write_config(&dir, MINIMAL)).unwrap();

    assert_eq!(config.migration.daily_limit_gb, 500.0);
    assert_eq!(config.drive.max_retries, 3);
    assert_eq!(config.drive.retry_delay, 5);
    assert_eq!(config.drive.root_folder_name, "zoom-recording-downloader");
    assert_eq!(config.storage.ledger_file, Path::new("progress_log.json"));
    assert_eq!(config.zoom.rate_limit_ms, 100);
    assert!(config.shared_drive_id().is_none());
    assert!(config.recordings.start_date.is_none());
}

#[test]
#[serial]
fn test_full_config() {
    let dir = TempDir::new().unwrap();
    let content = format!(
        "{}\n{}",
        MINIMAL,
        r#"
[recordings]
start_date = "2023-01-01"
end_date = "2024-12-31"
manifest_timezone = "America/Sao_Paulo"
folder = "{year}/{month}/{topic}"

[drive]
shared_drive_id = "0ABCdrive"
max_retries = 5

[migration]
daily_limit_gb = 250.5
"#
    );
    let config = Config::load(&write_config(&dir, &content)).unwrap();

    assert_eq!(config.migration.daily_limit_gb, 250.5);
    assert_eq!(config.shared_drive_id(), Some("0ABCdrive"));
    assert_eq!(config.drive.max_retries, 5);
    assert_eq!(config.manifest_timezone().unwrap(), chrono_tz::America::Sao_Paulo);
    assert_eq!(
        config.recordings.start_date,
        chrono::NaiveDate::from_ymd_opt(2023, 1, 1)
    );
}

#[test]
#[serial]
fn test_blank_shared_drive_id_means_my_drive() {
    let dir = TempDir::new().unwrap();
    let content = format!("{}\n[drive]\nshared_drive_id = \"\"\n", MINIMAL);
    let config = Config::load(&write_config(&dir, &content)).unwrap();
    assert!(config.shared_drive_id().is_none());
}

#[test]
#[serial]
fn test_missing_credentials_rejected() {
    let dir = TempDir::new().unwrap();
    let content = "[zoom]\naccount_id = \"acct\"\nclient_id = \"client\"\n";
    let err = Config::load(&write_config(&dir, content)).unwrap_err();
    assert!(err.to_string().contains("zoom.client_secret"));
}

#[test]
#[serial]
fn test_env_overrides_secret() {
    let dir = TempDir::new().unwrap();
    let content = "[zoom]\naccount_id = \"acct\"\nclient_id = \"client\"\n";
    std::env::set_var(ENV_ZOOM_CLIENT_SECRET, "from-env");

    let result = Config::load(&write_config(&dir, content));

    std::env::remove_var(ENV_ZOOM_CLIENT_SECRET);
    assert_eq!(result.unwrap().zoom.client_secret, "from-env");
}

#[test]
#[serial]
fn test_invalid_values_rejected() {
    let dir = TempDir::new().unwrap();
    let cases = [
        "[migration]\ndaily_limit_gb = 0\n",
        "[drive]\nmax_retries = 0\n",
        "[recordings]\nmanifest_timezone = \"Mars/Olympus\"\n",
        "[recordings]\nfilename = \"{nope}.mp4\"\n",
        "[recordings]\nstart_date = \"2024-02-01\"\nend_date = \"2024-01-01\"\n",
    ];
    for case in cases {
        let content = format!("{}\n{}", MINIMAL, case);
        assert!(
            Config::load(&write_config(&dir, &content)).is_err(),
            "accepted invalid config: {}",
            case
        );
    }
}

#[test]
#[serial]
fn test_resolve_prefers_cli_then_env() {
    let dir = TempDir::new().unwrap();
    let cli = dir.path().join("cli.toml");
    let env = dir.path().join("env.toml");

    std::env::set_var(ENV_CONFIG_PATH, &env);
    let from_cli = resolve_config_path(Some(cli.as_path())).unwrap();
    let from_env = resolve_config_path(None).unwrap();
    std::env::remove_var(ENV_CONFIG_PATH);

    assert_eq!(from_cli, cli);
    assert_eq!(from_env, env);
}
