//! Verification Pass
//!
//! Re-derives, for every manifest row, whether each file the provider lists
//! for the matched session exists at the destination. The ledger is not
//! consulted; the destination's live contents are the only evidence.

use crate::lookup::RecordingLookup;
use crate::reports::{extend_record, pad_record, ReportTable, VERIFICATION_COLUMNS};
use crate::services::{DestinationStore, RecordingSource};
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};
use zdm_common::naming::NamingTemplate;
use zdm_common::{Manifest, ManifestRow};

/// Per-row verification status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Every provider file exists at the destination
    Complete,
    Incomplete,
    NoFilesOnZoom,
    NoMatchOnZoom,
    Error(String),
}

impl VerificationStatus {
    /// Only complete rows may be deleted at the source
    pub fn is_complete(&self) -> bool {
        matches!(self, VerificationStatus::Complete)
    }

    /// Label used to group the summary counts
    fn summary_key(&self) -> &'static str {
        match self {
            VerificationStatus::Complete => "COMPLETE",
            VerificationStatus::Incomplete => "INCOMPLETE",
            VerificationStatus::NoFilesOnZoom => "NO_FILES_ON_ZOOM",
            VerificationStatus::NoMatchOnZoom => "NO_MATCH_ON_ZOOM",
            VerificationStatus::Error(_) => "ERROR",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Error(detail) => write!(f, "ERROR: {}", detail),
            other => f.write_str(other.summary_key()),
        }
    }
}

/// Status from the provider's file count and how many of those were found
pub fn classify(zoom_file_count: usize, drive_file_count: usize) -> VerificationStatus {
    if zoom_file_count == 0 {
        VerificationStatus::NoFilesOnZoom
    } else if drive_file_count == zoom_file_count {
        VerificationStatus::Complete
    } else {
        VerificationStatus::Incomplete
    }
}

/// Verification result for one manifest row
#[derive(Debug, Clone, PartialEq)]
pub struct RowVerification {
    pub status: VerificationStatus,
    /// `-1` when the row errored
    pub zoom_file_count: i64,
    pub drive_file_count: i64,
    pub meeting_uuid: Option<String>,
}

impl RowVerification {
    fn errored(detail: String) -> Self {
        Self {
            status: VerificationStatus::Error(detail),
            zoom_file_count: -1,
            drive_file_count: -1,
            meeting_uuid: None,
        }
    }

    /// Appended report columns, in [`VERIFICATION_COLUMNS`] order
    pub fn report_fields(&self) -> [String; 4] {
        [
            self.status.to_string(),
            self.zoom_file_count.to_string(),
            self.drive_file_count.to_string(),
            self.meeting_uuid.clone().unwrap_or_default(),
        ]
    }
}

/// Verifies manifest rows against a source and a destination
pub struct Verifier<'a> {
    source: &'a dyn RecordingSource,
    destination: &'a dyn DestinationStore,
    naming: NamingTemplate,
    lookup: RecordingLookup,
}

impl<'a> Verifier<'a> {
    pub fn new(
        source: &'a dyn RecordingSource,
        destination: &'a dyn DestinationStore,
        naming: NamingTemplate,
    ) -> Self {
        Self {
            source,
            destination,
            naming,
            lookup: RecordingLookup::new(),
        }
    }

    async fn check_row(&mut self, row: &ManifestRow) -> Result<RowVerification> {
        let Some(recording) = self.lookup.resolve(self.source, row).await? else {
            return Ok(RowVerification {
                status: VerificationStatus::NoMatchOnZoom,
                zoom_file_count: 0,
                drive_file_count: 0,
                meeting_uuid: None,
            });
        };

        let zoom_file_count = recording.recording_files.len();
        let mut drive_file_count = 0;
        for file in &recording.recording_files {
            let expected = self.naming.render(&recording, file);
            if self
                .destination
                .file_exists(&expected.folder, &expected.filename)
                .await?
            {
                drive_file_count += 1;
            } else {
                tracing::debug!(
                    uuid = %recording.uuid,
                    folder = %expected.folder_path(),
                    name = %expected.filename,
                    "Missing at destination"
                );
            }
        }

        Ok(RowVerification {
            status: classify(zoom_file_count, drive_file_count),
            zoom_file_count: zoom_file_count as i64,
            drive_file_count: drive_file_count as i64,
            meeting_uuid: Some(recording.uuid.clone()),
        })
    }

    /// Verify one row; failures become an `ERROR` status instead of propagating
    pub async fn verify_row(&mut self, row: &ManifestRow) -> RowVerification {
        match self.check_row(row).await {
            Ok(result) => result,
            Err(e) => {
                let detail = format!("{:#}", e);
                warn!(row = row.index + 1, error = %detail, "Verification failed for row");
                RowVerification::errored(detail)
            }
        }
    }

    /// Verify every row in manifest order and build the report table.
    ///
    /// Rows rejected at load keep their file position and are reported as
    /// errors without contacting either side.
    pub async fn verify_manifest(&mut self, manifest: &Manifest) -> ReportTable {
        let width = manifest.headers.len();
        let mut report = ReportTable::new(extend_record(&manifest.headers, VERIFICATION_COLUMNS));
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();

        let mut rows = manifest.rows.iter().peekable();
        let mut rejected = manifest.rejected.iter().peekable();
        loop {
            let take_rejected = match (rows.peek(), rejected.peek()) {
                (None, None) => break,
                (Some(row), Some(bad)) => bad.index < row.index,
                (None, Some(_)) => true,
                (Some(_), None) => false,
            };

            let (record, result) = if take_rejected {
                let Some(bad) = rejected.next() else { break };
                warn!(row = bad.index + 1, error = %bad.reason, "Row could not be verified");
                (&bad.record, RowVerification::errored(bad.reason.clone()))
            } else {
                let Some(row) = rows.next() else { break };
                (&row.record, self.verify_row(row).await)
            };
            *counts.entry(result.status.summary_key()).or_default() += 1;

            let fields = result.report_fields();
            report.rows.push(extend_record(
                &pad_record(record, width),
                fields.iter().map(String::as_str),
            ));
        }

        for (status, count) in &counts {
            info!(status = %status, count, "Verification summary");
        }
        report
    }
}
