//! Provider-side data model
//!
//! Field names follow the Zoom cloud recording API so that listing responses
//! deserialize straight into these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bytes per gigabyte used for all budget and ledger accounting
pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// File type Zoom uses for the chat/timeline JSON artifact
pub const TIMELINE_FILE_TYPE: &str = "TIMELINE";

/// Convert a provider-reported byte size to gigabytes
pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

/// One recorded meeting instance as the provider reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecording {
    /// Stable session identifier (distinct per meeting instance)
    pub uuid: String,
    /// Recurring meeting identifier
    #[serde(default)]
    pub id: u64,
    pub topic: String,
    /// Session start (UTC)
    pub start_time: DateTime<Utc>,
    /// Duration in minutes
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub recording_files: Vec<RecordingFile>,
}

/// One downloadable artifact of a session; the unit of transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingFile {
    /// Provider-wide unique file identifier
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub file_extension: String,
    #[serde(default)]
    pub file_size: u64,
    /// Short-lived download locator, must be used with an access token
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub recording_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl RecordingFile {
    pub fn size_gb(&self) -> f64 {
        bytes_to_gb(self.file_size)
    }

    /// Human-readable type label used in destination names.
    ///
    /// Empty file type means the provider never finished processing the file.
    /// The timeline artifact has no recording type of its own.
    pub fn type_label(&self) -> String {
        if self.file_type.is_empty() {
            "incomplete".to_string()
        } else if self.file_type != TIMELINE_FILE_TYPE {
            self.recording_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| self.file_type.clone())
        } else {
            self.file_type.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(file_type: &str, recording_type: Option<&str>) -> RecordingFile {
        RecordingFile {
            id: "f1".to_string(),
            file_type: file_type.to_string(),
            file_extension: "MP4".to_string(),
            file_size: 0,
            download_url: String::new(),
            recording_type: recording_type.map(str::to_string),
            status: None,
        }
    }

    #[test]
    fn test_bytes_to_gb() {
        assert_eq!(bytes_to_gb(1024 * 1024 * 1024), 1.0);
        assert_eq!(bytes_to_gb(4 * 1024 * 1024 * 1024), 4.0);
        assert_eq!(bytes_to_gb(0), 0.0);
    }

    #[test]
    fn test_type_label_precedence() {
        assert_eq!(file("", Some("shared_screen")).type_label(), "incomplete");
        assert_eq!(
            file("MP4", Some("shared_screen_with_speaker_view")).type_label(),
            "shared_screen_with_speaker_view"
        );
        assert_eq!(file("TIMELINE", Some("timeline")).type_label(), "TIMELINE");
        // Missing recording type falls back to the file type
        assert_eq!(file("M4A", None).type_label(), "M4A");
    }

    #[test]
    fn test_deserialize_zoom_meeting() {
        let json = r#"{
            "uuid": "abc==",
            "id": 123456789,
            "topic": "Standup",
            "start_time": "2024-01-05T12:00:00Z",
            "duration": 30,
            "recording_files": [
                {"id": "f1", "file_type": "MP4", "file_extension": "MP4",
                 "file_size": 1024, "download_url": "https://zoom.us/rec/download/x",
                 "recording_type": "active_speaker", "status": "completed"},
                {"id": "f2", "file_type": "TIMELINE", "download_url": "https://zoom.us/rec/download/y"}
            ]
        }"#;
        let rec: ProviderRecording = serde_json::from_str(json).unwrap();
        assert_eq!(rec.uuid, "abc==");
        assert_eq!(rec.recording_files.len(), 2);
        assert_eq!(rec.recording_files[1].file_size, 0);
        assert_eq!(rec.recording_files[1].recording_type, None);
    }
}
