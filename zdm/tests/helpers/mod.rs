//! Test Helper Utilities
//!
//! In-memory source and destination collaborators plus builders for
//! configuration, manifests and provider recordings.

#![allow(dead_code)]

pub mod http_stub;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;
use zdm::services::{DeleteOutcome, DestinationStore, RecordingSource};
use zdm_common::config::{parse_timezone, Config};
use zdm_common::{Manifest, ProviderRecording, RecordingFile};

pub const GB: u64 = 1024 * 1024 * 1024;

/// Recording source backed by a fixed list of recordings per host
#[derive(Default)]
pub struct FakeSource {
    recordings: Vec<(String, ProviderRecording)>,
    failing_hosts: HashSet<String>,
    failing_downloads: HashSet<String>,
    partial_downloads: HashSet<String>,
    delete_outcomes: HashMap<String, DeleteOutcome>,
    unreachable_deletes: HashSet<String>,
    pub list_calls: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
    pub downloads: Mutex<Vec<String>>,
    pub deletes: Mutex<Vec<(String, bool)>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recording(mut self, host: &str, recording: ProviderRecording) -> Self {
        self.recordings.push((host.to_string(), recording));
        self
    }

    pub fn failing_listing_for(mut self, host: &str) -> Self {
        self.failing_hosts.insert(host.to_string());
        self
    }

    pub fn failing_download_of(mut self, file_id: &str) -> Self {
        self.failing_downloads.insert(file_id.to_string());
        self
    }

    /// Write part of the file to the destination before failing
    pub fn partial_download_of(mut self, file_id: &str) -> Self {
        self.partial_downloads.insert(file_id.to_string());
        self
    }

    pub fn delete_answer(mut self, uuid: &str, outcome: DeleteOutcome) -> Self {
        self.delete_outcomes.insert(uuid.to_string(), outcome);
        self
    }

    pub fn unreachable_delete(mut self, uuid: &str) -> Self {
        self.unreachable_deletes.insert(uuid.to_string());
        self
    }

    pub fn list_call_count(&self) -> usize {
        self.list_calls.lock().unwrap().len()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }
}

#[async_trait]
impl RecordingSource for FakeSource {
    async fn list_recordings(
        &self,
        host: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ProviderRecording>> {
        self.list_calls
            .lock()
            .unwrap()
            .push((host.to_string(), from, to));

        if self.failing_hosts.contains(host) {
            return Err(anyhow!("API error 500: listing unavailable"));
        }

        Ok(self
            .recordings
            .iter()
            .filter(|(h, r)| {
                let date = r.start_time.date_naive();
                h == host && date >= from && date <= to
            })
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn download_file(&self, file: &RecordingFile, dest: &Path) -> Result<u64> {
        if self.failing_downloads.contains(&file.id) {
            return Err(anyhow!("connection reset"));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if self.partial_downloads.contains(&file.id) {
            std::fs::write(dest, b"half")?;
            return Err(anyhow!("connection reset mid-transfer"));
        }
        std::fs::write(dest, file.id.as_bytes())?;
        self.downloads.lock().unwrap().push(file.id.clone());
        Ok(file.file_size)
    }

    async fn delete_recording(&self, meeting_uuid: &str, trash: bool) -> Result<DeleteOutcome> {
        self.deletes
            .lock()
            .unwrap()
            .push((meeting_uuid.to_string(), trash));
        if self.unreachable_deletes.contains(meeting_uuid) {
            return Err(anyhow!("Network error: connection refused"));
        }
        Ok(self
            .delete_outcomes
            .get(meeting_uuid)
            .copied()
            .unwrap_or(DeleteOutcome::Deleted))
    }
}

/// Destination holding (folder path, file name) pairs in memory
#[derive(Default)]
pub struct FakeDestination {
    files: Mutex<HashSet<(String, String)>>,
    failing_uploads: HashSet<String>,
    pub upload_attempts: Mutex<usize>,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting_upload_of(mut self, name: &str) -> Self {
        self.failing_uploads.insert(name.to_string());
        self
    }

    pub fn insert(&self, folder: &[String], name: &str) {
        self.files
            .lock()
            .unwrap()
            .insert((folder.join("/"), name.to_string()));
    }

    pub fn contains(&self, folder: &[String], name: &str) -> bool {
        self.files
            .lock()
            .unwrap()
            .contains(&(folder.join("/"), name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl DestinationStore for FakeDestination {
    async fn file_exists(&self, folder: &[String], name: &str) -> Result<bool> {
        Ok(self.contains(folder, name))
    }

    async fn upload_file(&self, local: &Path, folder: &[String], name: &str) -> Result<bool> {
        *self.upload_attempts.lock().unwrap() += 1;
        if !local.exists() {
            return Err(anyhow!("scratch file {} missing", local.display()));
        }
        if self.failing_uploads.contains(name) {
            return Ok(false);
        }
        self.insert(folder, name);
        Ok(true)
    }
}

/// Workspace with scratch, ledger and log paths inside a temp dir
pub struct TestEnv {
    pub dir: TempDir,
    pub config: Config,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_limit(500.0)
    }

    pub fn with_limit(daily_limit_gb: f64) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let toml = format!(
            r#"
[zoom]
account_id = "acct"
client_id = "client"
client_secret = "secret"

[storage]
download_dir = "{downloads}"
completed_log = "{activity}"
ledger_file = "{ledger}"

[drive]
failed_log = "{failed}"
retry_delay = 0

[migration]
daily_limit_gb = {limit:.1}
"#,
            downloads = root.join("downloads").display(),
            activity = root.join("completed-downloads.log").display(),
            ledger = root.join("progress_log.json").display(),
            failed = root.join("failed-uploads.log").display(),
            limit = daily_limit_gb,
        );
        let config = Config::from_toml_str(&toml).unwrap();
        config.validate().unwrap();
        Self { dir, config }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.config.storage.ledger_file.clone()
    }

    pub fn download_dir(&self) -> PathBuf {
        self.config.storage.download_dir.clone()
    }
}

/// Manifest from CSV text with UTC start times
pub fn manifest(csv: &str) -> Manifest {
    Manifest::from_reader(csv.as_bytes(), parse_timezone("UTC").unwrap()).unwrap()
}

pub const MANIFEST_HEADER: &str = "Host,Topic,ID,Start Time,File Size,File Count\n";

/// One manifest line; `start` like `Jan 05, 2024 09:00:00 AM`
pub fn manifest_line(host: &str, topic: &str, start: &str) -> String {
    format!("{},{},111,\"{}\",1 GB,1\n", host, topic, start)
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn file(id: &str, file_type: &str, recording_type: &str, size: u64) -> RecordingFile {
    RecordingFile {
        id: id.to_string(),
        file_type: file_type.to_string(),
        file_extension: file_type.to_string(),
        file_size: size,
        download_url: format!("https://zoom.example/rec/{}", id),
        recording_type: Some(recording_type.to_string()),
        status: Some("completed".to_string()),
    }
}

pub fn recording(
    uuid: &str,
    topic: &str,
    start: DateTime<Utc>,
    files: Vec<RecordingFile>,
) -> ProviderRecording {
    ProviderRecording {
        uuid: uuid.to_string(),
        id: 123,
        topic: topic.to_string(),
        start_time: start,
        duration: 30,
        recording_files: files,
    }
}
