//! Google Drive API client
//!
//! Uses an authorized-user token file (client id, client secret, refresh
//! token). The access token is refreshed at startup and once more on a 401.
//! Folder ids are cached per run, keyed by their path below the root folder.

use super::DestinationStore;
use crate::utils::{retry_fixed, SideLog};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::io::ReaderStream;
use zdm_common::config::Config;
use zdm_common::time;

const USER_AGENT: &str = concat!("zdm/", env!("CARGO_PKG_VERSION"));
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Drive client errors
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Contents of the authorized-user token file
#[derive(Debug, Clone, Deserialize)]
struct AuthorizedUser {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Google Drive API client rooted at one named folder
pub struct DriveClient {
    http_client: reqwest::Client,
    api_base_url: String,
    upload_url: String,
    token_url: String,
    credentials: AuthorizedUser,
    access_token: Mutex<String>,
    shared_drive_id: Option<String>,
    /// `None` when the root folder does not exist and was not created
    root_id: Option<String>,
    folder_cache: Mutex<HashMap<Vec<String>, String>>,
    max_retries: u32,
    retry_delay: Duration,
    failed_log: SideLog,
}

impl DriveClient {
    /// Authenticate and resolve the root folder.
    ///
    /// With `create_root` the root folder is created when missing; otherwise a
    /// missing root leaves the client able to answer "nothing exists" only.
    pub async fn connect(config: &Config, create_root: bool) -> Result<Self, DriveError> {
        let raw = tokio::fs::read_to_string(&config.drive.token_file)
            .await
            .map_err(|e| {
                DriveError::Auth(format!(
                    "Read token file {} failed: {}",
                    config.drive.token_file.display(),
                    e
                ))
            })?;
        let credentials: AuthorizedUser = serde_json::from_str(&raw)
            .map_err(|e| DriveError::Auth(format!("Invalid token file: {}", e)))?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DriveError::Network(e.to_string()))?;

        let token_url = credentials
            .token_uri
            .clone()
            .filter(|uri| !uri.is_empty())
            .unwrap_or_else(|| {
                if config.drive.token_url.is_empty() {
                    DEFAULT_TOKEN_URI.to_string()
                } else {
                    config.drive.token_url.clone()
                }
            });

        let mut client = Self {
            http_client,
            api_base_url: config.drive.api_base_url.trim_end_matches('/').to_string(),
            upload_url: config.drive.upload_url.trim_end_matches('/').to_string(),
            token_url,
            credentials,
            access_token: Mutex::new(String::new()),
            shared_drive_id: config.shared_drive_id().map(str::to_string),
            root_id: None,
            folder_cache: Mutex::new(HashMap::new()),
            max_retries: config.drive.max_retries,
            retry_delay: time::secs_to_duration(config.drive.retry_delay),
            failed_log: SideLog::new(&config.drive.failed_log),
        };

        client.refresh_token().await?;

        let root_name = &config.drive.root_folder_name;
        let parent = client.top_level_parent();
        client.root_id = match client.query_folder(root_name, &parent).await? {
            Some(id) => {
                tracing::info!(folder = %root_name, id = %id, "Using existing Drive root folder");
                Some(id)
            }
            None if create_root => {
                let id = client.create_folder(root_name, &parent).await?;
                tracing::info!(folder = %root_name, id = %id, "Created Drive root folder");
                Some(id)
            }
            None => {
                tracing::warn!(folder = %root_name, "Drive root folder not found");
                None
            }
        };

        Ok(client)
    }

    pub fn root_id(&self) -> Option<&str> {
        self.root_id.as_deref()
    }

    async fn refresh_token(&self) -> Result<String, DriveError> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DriveError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::Auth(format!("{} {}", status.as_u16(), body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DriveError::Auth(e.to_string()))?;
        *self.access_token.lock().await = token.access_token.clone();
        tracing::debug!("Drive access token refreshed");
        Ok(token.access_token)
    }

    /// Send a request built by `build`; on 401 refresh once and resend
    async fn send_authorized<F>(&self, build: F) -> Result<Response, DriveError>
    where
        F: Fn(&reqwest::Client, &str) -> RequestBuilder,
    {
        let token = self.access_token.lock().await.clone();
        let response = build(&self.http_client, &token)
            .send()
            .await
            .map_err(|e| DriveError::Network(e.to_string()))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!("Drive access token rejected, refreshing and retrying once");
        let token = self.refresh_token().await?;
        build(&self.http_client, &token)
            .send()
            .await
            .map_err(|e| DriveError::Network(e.to_string()))
    }

    fn top_level_parent(&self) -> String {
        self.shared_drive_id
            .clone()
            .unwrap_or_else(|| "root".to_string())
    }

    async fn list_files(&self, query: &str) -> Result<Vec<DriveFile>, DriveError> {
        let url = format!("{}/files", self.api_base_url);
        let mut params = list_params(self.shared_drive_id.as_deref());
        params.push(("q", query.to_string()));
        params.push(("fields", "files(id, name)".to_string()));
        params.push(("pageSize", "10".to_string()));

        let response = self
            .send_authorized(|client, token| client.get(&url).bearer_auth(token).query(&params))
            .await?;
        let list: FileList = parse_json(response).await?;
        Ok(list.files)
    }

    async fn query_folder(&self, name: &str, parent_id: &str) -> Result<Option<String>, DriveError> {
        let files = self.list_files(&folder_query(name, parent_id)).await?;
        Ok(files.into_iter().next().map(|f| f.id))
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String, DriveError> {
        let url = format!("{}/files", self.api_base_url);
        let metadata = json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id],
        });

        let response = self
            .send_authorized(|client, token| {
                client
                    .post(&url)
                    .bearer_auth(token)
                    .query(&[("supportsAllDrives", "true"), ("fields", "id")])
                    .json(&metadata)
            })
            .await?;
        let created: DriveFile = parse_json(response).await?;
        tracing::debug!(folder = %name, id = %created.id, "Created Drive folder");
        Ok(created.id)
    }

    /// Resolve `path` below the root folder without creating anything
    pub async fn find_folder(&self, path: &[String]) -> Result<Option<String>, DriveError> {
        self.walk_folders(path, false).await
    }

    /// Resolve `path` below the root folder, creating missing components
    pub async fn ensure_folder(&self, path: &[String]) -> Result<String, DriveError> {
        self.walk_folders(path, true)
            .await?
            .ok_or_else(|| DriveError::Parse("Drive root folder is not available".to_string()))
    }

    async fn walk_folders(&self, path: &[String], create: bool) -> Result<Option<String>, DriveError> {
        let Some(mut current) = self.root_id.clone() else {
            return Ok(None);
        };

        for depth in 0..path.len() {
            let key = path[..=depth].to_vec();
            if let Some(id) = self.folder_cache.lock().await.get(&key).cloned() {
                current = id;
                continue;
            }

            let name = &path[depth];
            let id = match self.query_folder(name, &current).await? {
                Some(id) => id,
                None if create => self.create_folder(name, &current).await?,
                None => return Ok(None),
            };
            self.folder_cache.lock().await.insert(key, id.clone());
            current = id;
        }

        Ok(Some(current))
    }

    /// True iff a non-trashed file named `name` sits directly in `folder`
    pub async fn exists_in(&self, folder: &[String], name: &str) -> Result<bool, DriveError> {
        let Some(folder_id) = self.find_folder(folder).await? else {
            return Ok(false);
        };
        let files = self.list_files(&file_query(name, &folder_id)).await?;
        Ok(!files.is_empty())
    }

    /// One resumable upload attempt: open a session, then stream the bytes
    async fn upload_once(&self, local: &Path, folder: &[String], name: &str) -> Result<String, DriveError> {
        let folder_id = self.ensure_folder(folder).await?;
        let size = tokio::fs::metadata(local).await?.len();

        let session_url = format!("{}/files", self.upload_url);
        let metadata = json!({ "name": name, "parents": [folder_id] });
        let response = self
            .send_authorized(|client, token| {
                client
                    .post(&session_url)
                    .bearer_auth(token)
                    .query(&[("uploadType", "resumable"), ("supportsAllDrives", "true")])
                    .header("X-Upload-Content-Length", size)
                    .json(&metadata)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::Api(status.as_u16(), body));
        }
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DriveError::Parse("resumable session has no Location header".to_string()))?;

        let file = tokio::fs::File::open(local).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let token = self.access_token.lock().await.clone();
        let response = self
            .http_client
            .put(&location)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(body)
            .send()
            .await
            .map_err(|e| DriveError::Network(e.to_string()))?;

        let uploaded: DriveFile = parse_json(response).await?;
        Ok(uploaded.id)
    }

    /// Upload with fixed-delay retries; exhausted retries are written to the
    /// failed-upload log and reported as `false`
    pub async fn upload(&self, local: &Path, folder: &[String], name: &str) -> bool {
        let result = retry_fixed("drive_upload", self.max_retries, self.retry_delay, |_| {
            self.upload_once(local, folder, name)
        })
        .await;

        match result {
            Ok(id) => {
                tracing::debug!(file = %name, id = %id, "Uploaded to Drive");
                true
            }
            Err(e) => {
                tracing::error!(file = %name, folder = %folder.join("/"), error = %e, "Upload failed");
                self.failed_log.record(&format!(
                    "{} -> {}/{} ({})",
                    local.display(),
                    folder.join("/"),
                    name,
                    e
                ));
                false
            }
        }
    }
}

#[async_trait]
impl DestinationStore for DriveClient {
    async fn file_exists(&self, folder: &[String], name: &str) -> anyhow::Result<bool> {
        Ok(self.exists_in(folder, name).await?)
    }

    async fn upload_file(&self, local: &Path, folder: &[String], name: &str) -> anyhow::Result<bool> {
        Ok(self.upload(local, folder, name).await)
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, DriveError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::Api(status.as_u16(), body));
    }
    response
        .json()
        .await
        .map_err(|e| DriveError::Parse(e.to_string()))
}

/// Escape a value for a single-quoted Drive query string
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn folder_query(name: &str, parent_id: &str) -> String {
    format!(
        "name = '{}' and mimeType = '{}' and '{}' in parents and trashed = false",
        escape_query_value(name),
        FOLDER_MIME_TYPE,
        escape_query_value(parent_id)
    )
}

fn file_query(name: &str, parent_id: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and trashed = false",
        escape_query_value(name),
        escape_query_value(parent_id)
    )
}

/// Query parameters every `files.list` call carries
fn list_params(shared_drive_id: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("supportsAllDrives", "true".to_string()),
        ("includeItemsFromAllDrives", "true".to_string()),
    ];
    if let Some(drive_id) = shared_drive_id {
        params.push(("corpora", "drive".to_string()));
        params.push(("driveId", drive_id.to_string()));
    }
    params
}
