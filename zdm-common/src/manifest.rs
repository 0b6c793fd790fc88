//! Manifest (CSV) loading
//!
//! The manifest is the operator's export of expected recording sessions.
//! Rows are immutable once loaded; the original record is kept so report
//! writers can pass every column through untouched.

use crate::matcher::normalize_topic;
use crate::{Error, Result};
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use csv::StringRecord;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

pub const COL_HOST: &str = "Host";
pub const COL_TOPIC: &str = "Topic";
pub const COL_START_TIME: &str = "Start Time";
pub const COL_FILE_SIZE: &str = "File Size";
pub const COL_FILE_COUNT: &str = "File Count";
pub const COL_ID: &str = "ID";

/// Local start-time format used by the manifest export, e.g. `Jan 05, 2024 09:00:00 AM`
pub const START_TIME_FORMAT: &str = "%b %d, %Y %I:%M:%S %p";

/// One expected recording session
#[derive(Debug, Clone)]
pub struct ManifestRow {
    /// Zero-based position in the source file (data rows only)
    pub index: usize,
    pub host: String,
    /// Topic exactly as exported
    pub topic: String,
    /// Topic with the known export artifact removed
    pub normalized_topic: String,
    pub local_start: NaiveDateTime,
    pub utc_start: DateTime<Utc>,
    /// Informational only
    pub declared_file_count: Option<u32>,
    /// Informational only
    pub declared_file_size: String,
    /// Stable hash over host, topic, meeting id, start time and file count
    pub row_hash: String,
    /// Original record, aligned with `Manifest::headers`
    pub record: StringRecord,
}

/// A data row that could not be turned into a [`ManifestRow`]
#[derive(Debug, Clone)]
pub struct RejectedRow {
    /// Zero-based position in the source file (data rows only)
    pub index: usize,
    pub record: StringRecord,
    pub reason: String,
}

/// Loaded manifest with its header row
#[derive(Debug, Clone)]
pub struct Manifest {
    pub headers: StringRecord,
    pub rows: Vec<ManifestRow>,
    /// Rows whose host or start time could not be resolved, in file order.
    /// Migration skips them; verification reports them as errors.
    pub rejected: Vec<RejectedRow>,
}

struct Columns {
    host: usize,
    topic: usize,
    start_time: usize,
    file_size: usize,
    file_count: Option<usize>,
    id: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                Error::Manifest(format!("required column '{}' not found", name))
            })
        };

        Ok(Self {
            host: require(COL_HOST)?,
            topic: require(COL_TOPIC)?,
            start_time: require(COL_START_TIME)?,
            file_size: require(COL_FILE_SIZE)?,
            file_count: find(COL_FILE_COUNT),
            id: find(COL_ID).or_else(|| find("id")),
        })
    }
}

impl Manifest {
    /// Load a manifest file, localizing start times in `timezone`
    pub fn load(path: &Path, timezone: Tz) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            Error::Manifest(format!("cannot open {}: {}", path.display(), e))
        })?;
        let manifest = Self::from_reader(file, timezone)?;

        info!(
            path = %path.display(),
            rows = manifest.rows.len(),
            invalid = manifest.rejected.len(),
            "Manifest loaded"
        );
        Ok(manifest)
    }

    pub fn from_reader<R: Read>(reader: R, timezone: Tz) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let columns = Columns::resolve(&headers)?;

        let mut rows = Vec::new();
        let mut rejected = Vec::new();

        for (index, record) in csv_reader.records().enumerate() {
            let record = record?;
            match parse_row(index, &record, &columns, timezone) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!(row = index + 1, error = %e, "Skipping manifest row");
                    rejected.push(RejectedRow {
                        index,
                        record,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(Self {
            headers,
            rows,
            rejected,
        })
    }

    /// Order rows by UTC start time. Stable, so equal start times keep file order.
    pub fn sort_chronologically(&mut self) {
        self.rows.sort_by_key(|row| row.utc_start);
    }

    /// Keep only rows whose UTC start date falls inside the (inclusive) window
    pub fn retain_date_window(&mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) {
        let before = self.rows.len();
        self.rows.retain(|row| {
            let date = row.utc_start.date_naive();
            from.map_or(true, |f| date >= f) && to.map_or(true, |t| date <= t)
        });
        if self.rows.len() != before {
            info!(
                kept = self.rows.len(),
                dropped = before - self.rows.len(),
                "Manifest rows outside the recording date window dropped"
            );
        }
    }

    /// Drop rows whose hash was already seen, keeping the first occurrence
    pub fn dedup_by_hash(&mut self) -> usize {
        let mut seen = HashSet::new();
        let before = self.rows.len();
        self.rows.retain(|row| {
            let fresh = seen.insert(row.row_hash.clone());
            if !fresh {
                debug!(row = row.index + 1, hash = %row.row_hash, "Duplicate manifest row");
            }
            fresh
        });
        before - self.rows.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn field<'a>(record: &'a StringRecord, index: usize) -> &'a str {
    record.get(index).unwrap_or("").trim()
}

fn parse_row(
    index: usize,
    record: &StringRecord,
    columns: &Columns,
    timezone: Tz,
) -> Result<ManifestRow> {
    let host = field(record, columns.host).to_string();
    if host.is_empty() {
        return Err(Error::InvalidInput("empty host".to_string()));
    }

    let topic = record.get(columns.topic).unwrap_or("").to_string();
    let start_raw = field(record, columns.start_time);
    let local_start = NaiveDateTime::parse_from_str(start_raw, START_TIME_FORMAT)
        .map_err(|e| Error::InvalidInput(format!("start time '{}': {}", start_raw, e)))?;
    let utc_start = localize(local_start, timezone)?;

    let file_count_raw = columns.file_count.map(|i| field(record, i)).unwrap_or("");
    let id_raw = columns.id.map(|i| field(record, i)).unwrap_or("");

    let row_hash = row_hash(&host, &topic, id_raw, start_raw, file_count_raw);

    Ok(ManifestRow {
        index,
        normalized_topic: normalize_topic(&topic),
        declared_file_count: file_count_raw.parse().ok(),
        declared_file_size: field(record, columns.file_size).to_string(),
        host,
        topic,
        local_start,
        utc_start,
        row_hash,
        record: record.clone(),
    })
}

/// Resolve a naive manifest time in the manifest timezone.
///
/// Ambiguous wall-clock times (DST fall-back) take the earlier instant;
/// times inside a DST gap do not exist and are rejected.
pub fn localize(local: NaiveDateTime, timezone: Tz) -> Result<DateTime<Utc>> {
    match timezone.from_local_datetime(&local) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(Error::InvalidInput(format!(
            "{} does not exist in {}",
            local,
            timezone.name()
        ))),
    }
}

/// Stable row identity used for de-duplication
pub fn row_hash(host: &str, topic: &str, id: &str, start_time: &str, file_count: &str) -> String {
    let unique = format!("{}-{}-{}-{}-{}", host, topic, id, start_time, file_count);
    format!("{:x}", Sha256::digest(unique.as_bytes()))
}
