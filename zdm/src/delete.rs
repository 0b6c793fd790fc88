//! Deletion Pass
//!
//! Removes source recordings for rows a verification report marked
//! `COMPLETE`. Every other row is ineligible and left out of the output.

use crate::reports::{
    extend_record, ReportTable, COL_DELETION_STATUS, COL_VERIFICATION_STATUS,
    COL_ZOOM_MEETING_UUID,
};
use crate::services::{DeleteOutcome, RecordingSource};
use anyhow::{bail, Result};
use std::fmt;
use std::io::{BufRead, Write};
use tracing::{info, warn};

/// Text the operator must type to confirm
pub const CONFIRMATION_WORD: &str = "DELETE";

const COMPLETE: &str = "COMPLETE";

/// Per-row deletion result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionStatus {
    Deleted,
    AlreadyDeletedOrNotFound,
    /// Provider answered with another HTTP status
    Error(u16),
    /// No HTTP answer at all
    NetworkError,
    SkippedNoUuid,
    DryRunSkipped,
}

impl fmt::Display for DeletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionStatus::Deleted => f.write_str("DELETED"),
            DeletionStatus::AlreadyDeletedOrNotFound => f.write_str("ALREADY_DELETED_OR_NOT_FOUND"),
            DeletionStatus::Error(code) => write!(f, "ERROR_{}", code),
            DeletionStatus::NetworkError => f.write_str("ERROR_NETWORK"),
            DeletionStatus::SkippedNoUuid => f.write_str("SKIPPED_NO_UUID"),
            DeletionStatus::DryRunSkipped => f.write_str("DRY_RUN_SKIPPED"),
        }
    }
}

impl From<DeleteOutcome> for DeletionStatus {
    fn from(outcome: DeleteOutcome) -> Self {
        match outcome {
            DeleteOutcome::Deleted => DeletionStatus::Deleted,
            DeleteOutcome::NotFound => DeletionStatus::AlreadyDeletedOrNotFound,
            DeleteOutcome::Rejected(code) => DeletionStatus::Error(code),
        }
    }
}

/// Rows of a verification report eligible for deletion
#[derive(Debug, Clone)]
pub struct DeletionCandidates {
    pub table: ReportTable,
    uuid_column: usize,
}

impl DeletionCandidates {
    /// Keep only `COMPLETE` rows of `report`.
    ///
    /// A report without the status or UUID column is not a verification report.
    pub fn from_report(report: ReportTable) -> Result<Self> {
        let Some(status_column) = report.column(COL_VERIFICATION_STATUS) else {
            bail!("Report has no '{}' column", COL_VERIFICATION_STATUS);
        };
        let Some(uuid_column) = report.column(COL_ZOOM_MEETING_UUID) else {
            bail!("Report has no '{}' column", COL_ZOOM_MEETING_UUID);
        };

        let ReportTable { headers, rows } = report;
        let rows = rows
            .into_iter()
            .filter(|row| row.get(status_column).map(str::trim) == Some(COMPLETE))
            .collect();

        Ok(Self {
            table: ReportTable { headers, rows },
            uuid_column,
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn uuid(&self, index: usize) -> Option<&str> {
        self.table.rows[index]
            .get(self.uuid_column)
            .map(str::trim)
            .filter(|uuid| !uuid.is_empty())
    }
}

/// Ask the operator to type [`CONFIRMATION_WORD`]. Anything else declines.
pub fn confirm<R: BufRead, W: Write>(
    count: usize,
    trash: bool,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    if trash {
        writeln!(output, "You are about to move {} recording(s) to the Zoom trash.", count)?;
    } else {
        writeln!(
            output,
            "You are about to permanently delete {} recording(s) from Zoom Cloud.\n\
             This action cannot be undone.",
            count
        )?;
    }
    write!(output, "Type '{}' to confirm: ", CONFIRMATION_WORD)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim_end_matches(['\r', '\n']) == CONFIRMATION_WORD)
}

/// How the deletion pass treats eligible rows
#[derive(Clone, Copy)]
pub enum DeletionMode<'a> {
    /// Label every row `DRY_RUN_SKIPPED` without contacting the provider
    DryRun,
    /// Delete through `source`; `trash` moves recordings to the provider's
    /// trash instead of removing them for good
    Live {
        source: &'a dyn RecordingSource,
        trash: bool,
    },
}

/// Delete every candidate's recordings and return the deletion report
pub async fn delete_recordings(candidates: &DeletionCandidates, mode: DeletionMode<'_>) -> ReportTable {
    let mut report = ReportTable::new(extend_record(
        &candidates.table.headers,
        [COL_DELETION_STATUS],
    ));
    let mut deleted = 0;

    for (index, row) in candidates.table.rows.iter().enumerate() {
        let status = match (mode, candidates.uuid(index)) {
            (DeletionMode::DryRun, _) => DeletionStatus::DryRunSkipped,
            (DeletionMode::Live { .. }, None) => {
                warn!(row = index + 1, "Skipping deletion: no meeting UUID");
                DeletionStatus::SkippedNoUuid
            }
            (DeletionMode::Live { source, trash }, Some(uuid)) => {
                match source.delete_recording(uuid, trash).await {
                    Ok(outcome) => DeletionStatus::from(outcome),
                    Err(e) => {
                        warn!(uuid = %uuid, error = %e, "Deletion request failed");
                        DeletionStatus::NetworkError
                    }
                }
            }
        };

        if status == DeletionStatus::Deleted {
            deleted += 1;
        }
        info!(row = index + 1, status = %status, "Deletion");

        let status = status.to_string();
        report.rows.push(extend_record(row, [status.as_str()]));
    }

    let (dry_run, trash) = match mode {
        DeletionMode::DryRun => (true, false),
        DeletionMode::Live { trash, .. } => (false, trash),
    };
    info!(eligible = candidates.len(), deleted, dry_run, trash, "Deletion pass finished");
    report
}
