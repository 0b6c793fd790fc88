//! CSV reports produced by the verification and deletion passes
//!
//! Both reports carry every manifest column untouched, followed by the
//! columns each pass appends.

use anyhow::{Context, Result};
use csv::StringRecord;
use std::path::Path;

pub const COL_VERIFICATION_STATUS: &str = "verification_status";
pub const COL_ZOOM_FILE_COUNT: &str = "zoom_file_count";
pub const COL_DRIVE_FILE_COUNT: &str = "drive_file_count";
pub const COL_ZOOM_MEETING_UUID: &str = "zoom_meeting_uuid";
pub const COL_DELETION_STATUS: &str = "deletion_status";

/// Columns the verification pass appends, in order
pub const VERIFICATION_COLUMNS: [&str; 4] = [
    COL_VERIFICATION_STATUS,
    COL_ZOOM_FILE_COUNT,
    COL_DRIVE_FILE_COUNT,
    COL_ZOOM_MEETING_UUID,
];

/// A header row plus records, all as raw text
#[derive(Debug, Clone, Default)]
pub struct ReportTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl ReportTable {
    pub fn new(headers: StringRecord) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Read a report CSV written by a previous pass
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Open report {} failed", path.display()))?;

        let headers = reader.headers()?.clone();
        let rows = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Read report {} failed", path.display()))?;

        Ok(Self { headers, rows })
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write headers and rows to `path`, replacing any existing file
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Create report {} failed", path.display()))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;

        tracing::info!(path = %path.display(), rows = self.rows.len(), "Report written");
        Ok(())
    }
}

/// `base` with `extra` appended
pub fn extend_record<'a, I>(base: &StringRecord, extra: I) -> StringRecord
where
    I: IntoIterator<Item = &'a str>,
{
    let mut record = base.clone();
    for field in extra {
        record.push_field(field);
    }
    record
}

/// Manifest rows can be shorter than the header line; pad to `width`
pub fn pad_record(record: &StringRecord, width: usize) -> StringRecord {
    let mut padded = record.clone();
    while padded.len() < width {
        padded.push_field("");
    }
    padded
}
