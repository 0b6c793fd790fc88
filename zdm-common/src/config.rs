//! Configuration loading and resolution
//!
//! Configuration is read once at startup into an immutable [`Config`] and
//! passed by reference to every pass and client.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `ZDM_CONFIG` environment variable
//! 3. `./zdm.toml` in the working directory
//! 4. `<user config dir>/zdm/config.toml`

use crate::naming::{
    NamingTemplate, DEFAULT_FILENAME_TEMPLATE, DEFAULT_FOLDER_TEMPLATE, DEFAULT_STRFTIME,
};
use crate::{Error, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ENV_CONFIG_PATH: &str = "ZDM_CONFIG";
pub const ENV_ZOOM_ACCOUNT_ID: &str = "ZDM_ZOOM_ACCOUNT_ID";
pub const ENV_ZOOM_CLIENT_ID: &str = "ZDM_ZOOM_CLIENT_ID";
pub const ENV_ZOOM_CLIENT_SECRET: &str = "ZDM_ZOOM_CLIENT_SECRET";

const LOCAL_CONFIG_FILE: &str = "zdm.toml";

/// Complete migrator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub zoom: ZoomConfig,
    #[serde(default)]
    pub recordings: RecordingsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Zoom server-to-server OAuth app credentials and API endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ZoomConfig {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_zoom_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_zoom_oauth_url")]
    pub oauth_url: String,
    /// Minimum spacing between Zoom API calls
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
}

/// Recording window, manifest timezone and naming templates
#[derive(Debug, Clone, Deserialize)]
pub struct RecordingsConfig {
    /// Inclusive lower bound on manifest row UTC dates (`"YYYY-MM-DD"`)
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound on manifest row UTC dates
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Timezone the manifest's naive start times are expressed in
    #[serde(default = "default_timezone")]
    pub manifest_timezone: String,
    /// Timezone used when rendering names
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_strftime")]
    pub strftime: String,
    #[serde(default = "default_filename")]
    pub filename: String,
    #[serde(default = "default_folder")]
    pub folder: String,
}

/// Local scratch and state files
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Append-only activity log
    #[serde(default = "default_completed_log")]
    pub completed_log: PathBuf,
    #[serde(default = "default_ledger_file")]
    pub ledger_file: PathBuf,
}

/// Google Drive destination
#[derive(Debug, Clone, Deserialize)]
pub struct DriveConfig {
    /// Authorized-user credentials (client_id, client_secret, refresh_token)
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    #[serde(default = "default_root_folder_name")]
    pub root_folder_name: String,
    #[serde(default)]
    pub shared_drive_id: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Seconds between upload attempts
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    #[serde(default = "default_failed_log")]
    pub failed_log: PathBuf,
    #[serde(default = "default_drive_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_drive_upload_url")]
    pub upload_url: String,
    #[serde(default = "default_google_token_url")]
    pub token_url: String,
}

/// Batch limits
#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    #[serde(default = "default_daily_limit_gb")]
    pub daily_limit_gb: f64,
}

fn default_zoom_api_base_url() -> String {
    "https://api.zoom.us/v2".to_string()
}
fn default_zoom_oauth_url() -> String {
    "https://zoom.us/oauth/token".to_string()
}
fn default_rate_limit_ms() -> u64 {
    100
}
fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_strftime() -> String {
    DEFAULT_STRFTIME.to_string()
}
fn default_filename() -> String {
    DEFAULT_FILENAME_TEMPLATE.to_string()
}
fn default_folder() -> String {
    DEFAULT_FOLDER_TEMPLATE.to_string()
}
fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}
fn default_completed_log() -> PathBuf {
    PathBuf::from("completed-downloads.log")
}
fn default_ledger_file() -> PathBuf {
    PathBuf::from("progress_log.json")
}
fn default_token_file() -> PathBuf {
    PathBuf::from("token.json")
}
fn default_root_folder_name() -> String {
    "zoom-recording-downloader".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    5
}
fn default_failed_log() -> PathBuf {
    PathBuf::from("failed-uploads.log")
}
fn default_drive_api_base_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}
fn default_drive_upload_url() -> String {
    "https://www.googleapis.com/upload/drive/v3".to_string()
}
fn default_google_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}
fn default_daily_limit_gb() -> f64 {
    500.0
}

impl Default for RecordingsConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            manifest_timezone: default_timezone(),
            timezone: default_timezone(),
            strftime: default_strftime(),
            filename: default_filename(),
            folder: default_folder(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            completed_log: default_completed_log(),
            ledger_file: default_ledger_file(),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            token_file: default_token_file(),
            root_folder_name: default_root_folder_name(),
            shared_drive_id: None,
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            failed_log: default_failed_log(),
            api_base_url: default_drive_api_base_url(),
            upload_url: default_drive_upload_url(),
            token_url: default_google_token_url(),
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            daily_limit_gb: default_daily_limit_gb(),
        }
    }
}

impl Config {
    /// Parse TOML text without validating
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Read, apply environment overrides, and validate
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read {} failed: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;

        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Credentials from the environment take priority over the file
    pub fn apply_env_overrides(&mut self) {
        let overrides = [
            (ENV_ZOOM_ACCOUNT_ID, &mut self.zoom.account_id),
            (ENV_ZOOM_CLIENT_ID, &mut self.zoom.client_id),
            (ENV_ZOOM_CLIENT_SECRET, &mut self.zoom.client_secret),
        ];
        for (var, slot) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    debug!(var, "Zoom credential taken from environment");
                    *slot = value;
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let credentials = [
            ("zoom.account_id", &self.zoom.account_id),
            ("zoom.client_id", &self.zoom.client_id),
            ("zoom.client_secret", &self.zoom.client_secret),
        ];
        for (key, value) in credentials {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("No value provided for {}", key)));
            }
        }

        if !(self.migration.daily_limit_gb > 0.0) {
            return Err(Error::Config(
                "migration.daily_limit_gb must be positive".to_string(),
            ));
        }
        if self.drive.max_retries == 0 {
            return Err(Error::Config("drive.max_retries must be at least 1".to_string()));
        }
        if let (Some(start), Some(end)) = (self.recordings.start_date, self.recordings.end_date) {
            if start > end {
                return Err(Error::Config(format!(
                    "recordings.start_date {} is after end_date {}",
                    start, end
                )));
            }
        }

        self.manifest_timezone()?;
        self.naming_template()?;
        Ok(())
    }

    pub fn manifest_timezone(&self) -> Result<Tz> {
        parse_timezone(&self.recordings.manifest_timezone)
    }

    pub fn naming_template(&self) -> Result<NamingTemplate> {
        NamingTemplate::new(
            &self.recordings.filename,
            &self.recordings.folder,
            &self.recordings.strftime,
            parse_timezone(&self.recordings.timezone)?,
        )
    }

    pub fn shared_drive_id(&self) -> Option<&str> {
        self.drive
            .shared_drive_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| Error::Config(format!("unknown timezone '{}': {}", name, e)))
}

/// Locate the configuration file
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: Working directory
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    // Priority 4: Per-user config directory
    if let Some(user) = dirs::config_dir().map(|d| d.join("zdm").join("config.toml")) {
        if user.exists() {
            return Ok(user);
        }
    }

    Err(Error::Config(format!(
        "No configuration file found. Provide one of:\n\
         1. --config <path>\n\
         2. Environment: {}=<path>\n\
         3. ./{}\n\
         4. ~/.config/zdm/config.toml",
        ENV_CONFIG_PATH, LOCAL_CONFIG_FILE
    )))
}
