//! Zoom API client
//!
//! Server-to-server OAuth client for the cloud recording endpoints.
//! The client owns its access token; a single 401 response triggers exactly
//! one token refresh and one retry of the same request.

use super::{DeleteOutcome, RecordingSource};
use crate::utils::RequestPacer;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration as ChronoDuration, NaiveDate};
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use zdm_common::config::ZoomConfig;
use zdm_common::time;
use zdm_common::{ProviderRecording, RecordingFile};

const USER_AGENT: &str = concat!("zdm/", env!("CARGO_PKG_VERSION"));
const PAGE_SIZE: u32 = 300;
/// Zoom rejects listing ranges longer than a month
const LISTING_CHUNK_DAYS: i64 = 30;
/// Pause after a 429 that carries no usable `Retry-After`
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;
/// RFC 3986 unreserved characters stay literal in encoded meeting UUIDs
const UUID_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Zoom client errors
#[derive(Debug, Error)]
pub enum ZoomError {
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

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// One page of `GET /users/{userId}/recordings`
#[derive(Debug, Deserialize)]
struct RecordingsPage {
    #[serde(default)]
    meetings: Vec<ProviderRecording>,
    #[serde(default)]
    next_page_token: String,
}

/// Zoom API client
pub struct ZoomClient {
    http_client: reqwest::Client,
    pacer: RequestPacer,
    config: ZoomConfig,
    access_token: Mutex<String>,
}

impl ZoomClient {
    /// Build the client and fetch an initial access token
    pub async fn connect(config: &ZoomConfig) -> Result<Self, ZoomError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ZoomError::Network(e.to_string()))?;

        let client = Self {
            http_client,
            pacer: RequestPacer::new(time::millis_to_duration(config.rate_limit_ms)),
            config: config.clone(),
            access_token: Mutex::new(String::new()),
        };
        client.refresh_token().await?;
        tracing::info!("Zoom access token acquired");
        Ok(client)
    }

    /// Fetch a fresh account-credentials token and store it
    pub async fn refresh_token(&self) -> Result<String, ZoomError> {
        let credentials = BASE64.encode(format!(
            "{}:{}",
            self.config.client_id, self.config.client_secret
        ));

        let response = self
            .http_client
            .post(&self.config.oauth_url)
            .query(&[
                ("grant_type", "account_credentials"),
                ("account_id", self.config.account_id.as_str()),
            ])
            .header("Authorization", format!("Basic {}", credentials))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(|e| ZoomError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZoomError::Auth(format!("{} {}", status.as_u16(), body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ZoomError::Auth(format!("'access_token' missing from response: {}", e)))?;

        *self.access_token.lock().await = token.access_token.clone();
        Ok(token.access_token)
    }

    /// Send a request built by `build`; on 401 refresh the token once and resend.
    ///
    /// The second response is returned whatever its status.
    async fn send_authorized<F>(&self, build: F) -> Result<Response, ZoomError>
    where
        F: Fn(&reqwest::Client, &str) -> RequestBuilder,
    {
        let token = self.access_token.lock().await.clone();
        let response = self.send_paced(build(&self.http_client, &token)).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!("Zoom access token rejected, refreshing and retrying once");
        let token = self.refresh_token().await?;
        self.send_paced(build(&self.http_client, &token)).await
    }

    /// Send once the pacer allows it. A 429 answer is handed back unchanged,
    /// but its `Retry-After` holds off every later request.
    async fn send_paced(&self, request: RequestBuilder) -> Result<Response, ZoomError> {
        self.pacer.pace().await;
        let response = request
            .send()
            .await
            .map_err(|e| ZoomError::Network(e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            tracing::warn!(retry_after_secs = secs, "Zoom rate limit hit, holding off");
            self.pacer.hold_off(time::secs_to_duration(secs)).await;
        }
        Ok(response)
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url, ZoomError> {
        let mut url = Url::parse(&self.config.api_base_url)
            .map_err(|e| ZoomError::Parse(format!("api_base_url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ZoomError::Parse("api_base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn list_chunk(
        &self,
        host: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ProviderRecording>, ZoomError> {
        let url = self.api_url(&["users", host, "recordings"])?;
        let from_param = from.format("%Y-%m-%d").to_string();
        let to_param = to.format("%Y-%m-%d").to_string();
        let page_size = PAGE_SIZE.to_string();
        let mut next_page_token = String::new();
        let mut meetings = Vec::new();

        loop {
            let mut params = vec![
                ("page_size", page_size.as_str()),
                ("from", from_param.as_str()),
                ("to", to_param.as_str()),
            ];
            if !next_page_token.is_empty() {
                params.push(("next_page_token", next_page_token.as_str()));
            }

            tracing::debug!(host = %host, from = %from_param, to = %to_param, "Requesting recordings");

            let response = self
                .send_authorized(|client, token| {
                    client.get(url.clone()).bearer_auth(token).query(&params)
                })
                .await?;

            let page: RecordingsPage = parse_json(response).await?;
            meetings.extend(page.meetings);

            if page.next_page_token.is_empty() {
                break;
            }
            next_page_token = page.next_page_token;
        }

        Ok(meetings)
    }

    /// List recordings for `host` from `from` to `to`, split into month-sized requests
    pub async fn list_user_recordings(
        &self,
        host: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ProviderRecording>, ZoomError> {
        let mut recordings = Vec::new();
        for (start, end) in date_chunks(from, to, LISTING_CHUNK_DAYS) {
            let chunk = self.list_chunk(host, start, end).await?;
            tracing::debug!(host = %host, from = %start, to = %end, found = chunk.len(), "Recordings in range");
            recordings.extend(chunk);
        }
        Ok(recordings)
    }

    /// Stream one recording file to `dest` via a `.part` file
    pub async fn download(&self, file: &RecordingFile, dest: &Path) -> Result<u64, ZoomError> {
        if file.download_url.is_empty() {
            return Err(ZoomError::Parse(format!("file {} has no download URL", file.id)));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self
            .send_authorized(|client, token| client.get(&file.download_url).bearer_auth(token))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ZoomError::Api(status.as_u16(), body));
        }

        let partial = part_path(dest);
        let written = match write_body(response, &partial).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %partial.display(), error = %cleanup, "Partial download not removed");
                    }
                }
                return Err(e);
            }
        };

        tokio::fs::rename(&partial, dest).await?;

        tracing::debug!(file_id = %file.id, bytes = written, dest = %dest.display(), "Download complete");
        Ok(written)
    }

    /// `DELETE /meetings/{uuid}/recordings`
    pub async fn delete_meeting_recordings(
        &self,
        meeting_uuid: &str,
        trash: bool,
    ) -> Result<DeleteOutcome, ZoomError> {
        let url = self.api_url(&["meetings", &encode_meeting_uuid(meeting_uuid), "recordings"])?;
        let action = if trash { "trash" } else { "delete" };

        let response = self
            .send_authorized(|client, token| {
                client
                    .delete(url.clone())
                    .bearer_auth(token)
                    .query(&[("action", action)])
            })
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(DeleteOutcome::Deleted)
        } else if status == StatusCode::NOT_FOUND {
            Ok(DeleteOutcome::NotFound)
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(uuid = %meeting_uuid, status = status.as_u16(), body = %body, "Zoom deletion rejected");
            Ok(DeleteOutcome::Rejected(status.as_u16()))
        }
    }
}

#[async_trait]
impl RecordingSource for ZoomClient {
    async fn list_recordings(
        &self,
        host: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<ProviderRecording>> {
        Ok(self.list_user_recordings(host, from, to).await?)
    }

    async fn download_file(&self, file: &RecordingFile, dest: &Path) -> anyhow::Result<u64> {
        Ok(self.download(file, dest).await?)
    }

    async fn delete_recording(&self, meeting_uuid: &str, trash: bool) -> anyhow::Result<DeleteOutcome> {
        Ok(self.delete_meeting_recordings(meeting_uuid, trash).await?)
    }
}

/// Sibling of `dest` that holds the bytes until the download completes
pub fn part_path(dest: &Path) -> PathBuf {
    dest.with_extension(match dest.extension() {
        Some(ext) => format!("{}.part", ext.to_string_lossy()),
        None => "part".to_string(),
    })
}

async fn write_body(response: Response, path: &Path) -> Result<u64, ZoomError> {
    let mut out = tokio::fs::File::create(path).await?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ZoomError::Network(e.to_string()))?;
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    out.flush().await?;
    Ok(written)
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ZoomError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ZoomError::Api(status.as_u16(), body));
    }
    response
        .json()
        .await
        .map_err(|e| ZoomError::Parse(e.to_string()))
}

/// Split `[from, to]` into consecutive ranges of at most `days` days.
///
/// Consecutive ranges share their boundary date, matching how the listing
/// endpoint treats both ends as inclusive.
pub fn date_chunks(from: NaiveDate, to: NaiveDate, days: i64) -> Vec<(NaiveDate, NaiveDate)> {
    let mut chunks = Vec::new();
    if from > to {
        return chunks;
    }
    if from == to {
        chunks.push((from, to));
        return chunks;
    }

    let mut current = from;
    while current < to {
        let end = (current + ChronoDuration::days(days)).min(to);
        chunks.push((current, end));
        current = end;
    }
    chunks
}

/// Session UUIDs that start with `/` or contain `//` must be double-encoded.
///
/// The returned segment is encoded once here; the URL path encoder encodes the
/// `%` signs again.
pub fn encode_meeting_uuid(uuid: &str) -> String {
    if uuid.starts_with('/') || uuid.contains("//") {
        utf8_percent_encode(uuid, UUID_ENCODE_SET).to_string()
    } else {
        uuid.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_chunks_short_window() {
        let chunks = date_chunks(date(2024, 1, 4), date(2024, 1, 6), 30);
        assert_eq!(chunks, vec![(date(2024, 1, 4), date(2024, 1, 6))]);
    }

    #[test]
    fn test_date_chunks_long_window() {
        let chunks = date_chunks(date(2024, 1, 1), date(2024, 3, 1), 30);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], (date(2024, 1, 1), date(2024, 1, 31)));
        assert_eq!(chunks[2].1, date(2024, 3, 1));
    }

    #[test]
    fn test_date_chunks_single_day_and_inverted() {
        assert_eq!(
            date_chunks(date(2024, 1, 1), date(2024, 1, 1), 30),
            vec![(date(2024, 1, 1), date(2024, 1, 1))]
        );
        assert!(date_chunks(date(2024, 2, 1), date(2024, 1, 1), 30).is_empty());
    }

    #[test]
    fn test_encode_meeting_uuid() {
        assert_eq!(encode_meeting_uuid("abc+def=="), "abc+def==");
        assert_eq!(encode_meeting_uuid("/abc=="), "%2Fabc%3D%3D");
        assert_eq!(encode_meeting_uuid("ab//c"), "ab%2F%2Fc");
        assert_eq!(encode_meeting_uuid("/a-b_c.d~e+f"), "%2Fa-b_c.d~e%2Bf");
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/tmp/rec/Standup.mp4")),
            PathBuf::from("/tmp/rec/Standup.mp4.part")
        );
        assert_eq!(part_path(Path::new("/tmp/rec/notes")), PathBuf::from("/tmp/rec/notes.part"));
    }

    fn client(base: &str) -> ZoomClient {
        ZoomClient {
            http_client: reqwest::Client::new(),
            pacer: RequestPacer::new(Duration::ZERO),
            config: ZoomConfig {
                account_id: "acct".to_string(),
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                api_base_url: base.to_string(),
                oauth_url: "https://zoom.us/oauth/token".to_string(),
                rate_limit_ms: 0,
            },
            access_token: Mutex::new(String::new()),
        }
    }

    #[test]
    fn test_api_url_double_encodes_slash_uuids() {
        let zoom = client("https://api.zoom.us/v2");
        let url = zoom
            .api_url(&["meetings", &encode_meeting_uuid("/abc"), "recordings"])
            .unwrap();
        assert_eq!(url.as_str(), "https://api.zoom.us/v2/meetings/%252Fabc/recordings");
    }

    #[test]
    fn test_api_url_encodes_host() {
        let zoom = client("https://api.zoom.us/v2/");
        let url = zoom.api_url(&["users", "alice@example.com", "recordings"]).unwrap();
        assert_eq!(url.as_str(), "https://api.zoom.us/v2/users/alice@example.com/recordings");
    }
}
