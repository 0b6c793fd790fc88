//! Progress Ledger
//!
//! Durable record of which recording files have completed transfer.
//!
//! # Layout
//! - `total_completed_recordings`: all-time map, file id → size (GB). Never cleared.
//!   Membership here is the only definition of "complete".
//! - `daily_completed_recordings`: same-day map, always a subset of the all-time
//!   map. Exists only to compute the volume consumed against today's budget.
//! - `total_completed_gb`: derived, recomputed from the all-time map on every save.
//!
//! Every mutation is written through to disk immediately, so a crash loses at
//! most the file that was in flight.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Persisted ledger document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerData {
    /// Timestamp of the last save (UTC, RFC 3339)
    #[serde(default)]
    pub last_run_utc: Option<String>,
    #[serde(default)]
    pub total_completed_recordings: BTreeMap<String, f64>,
    #[serde(default)]
    pub daily_completed_recordings: BTreeMap<String, f64>,
    #[serde(default)]
    pub run_counter: u64,
    #[serde(default)]
    pub total_completed_gb: f64,
}

/// File-backed progress ledger
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    data: LedgerData,
}

impl Ledger {
    /// Load the ledger at `path` and count this run.
    ///
    /// A missing file or unparseable content yields a fresh, empty ledger.
    /// The incremented run counter is only in memory until the next save.
    pub fn load(path: &Path) -> Result<Self> {
        let mut data = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<LedgerData>(&content) {
                Ok(data) => data,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Ledger file unreadable, starting with an empty ledger"
                    );
                    LedgerData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No ledger found, creating a new one");
                LedgerData::default()
            }
            Err(e) => return Err(Error::Io(e)),
        };

        data.run_counter += 1;

        debug!(
            path = %path.display(),
            run = data.run_counter,
            completed = data.total_completed_recordings.len(),
            "Ledger loaded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    /// True iff the file id has ever been recorded as transferred
    pub fn is_complete(&self, file_id: &str) -> bool {
        self.data.total_completed_recordings.contains_key(file_id)
    }

    /// Record a transferred file. Idempotent; persists immediately on first insert.
    pub fn record_complete(&mut self, file_id: &str, size_gb: f64) -> Result<()> {
        if self.is_complete(file_id) {
            return Ok(());
        }

        self.data
            .total_completed_recordings
            .insert(file_id.to_string(), size_gb);
        self.data
            .daily_completed_recordings
            .insert(file_id.to_string(), size_gb);
        self.save()
    }

    /// Volume consumed against today's budget
    pub fn current_day_usage_gb(&self) -> f64 {
        self.data.daily_completed_recordings.values().sum()
    }

    /// Clear the same-day map and persist
    pub fn reset_day_usage(&mut self) -> Result<()> {
        self.data.daily_completed_recordings.clear();
        self.save()
    }

    /// Date (UTC) of the last save, if the ledger has ever been saved
    pub fn last_run_date(&self) -> Option<NaiveDate> {
        let raw = self.data.last_run_utc.as_deref()?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => Some(dt.with_timezone(&Utc).date_naive()),
            Err(_) => {
                // Older writers emitted timestamps without an offset
                let date = raw.get(..10).and_then(|d| d.parse::<NaiveDate>().ok());
                if date.is_none() {
                    warn!(value = %raw, "Unparseable last_run_utc in ledger");
                }
                date
            }
        }
    }

    /// Stamp, recompute the derived total, and write the whole ledger to disk
    pub fn save(&mut self) -> Result<()> {
        self.data.last_run_utc = Some(crate::time::now().to_rfc3339_opts(SecondsFormat::Micros, true));
        self.data.total_completed_gb = self.data.total_completed_recordings.values().sum();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;

        debug!(
            path = %self.path.display(),
            total_gb = self.data.total_completed_gb,
            "Ledger saved"
        );
        Ok(())
    }

    pub fn run_counter(&self) -> u64 {
        self.data.run_counter
    }

    /// All-time total as of the last save
    pub fn total_completed_gb(&self) -> f64 {
        self.data.total_completed_gb
    }

    pub fn completed_count(&self) -> usize {
        self.data.total_completed_recordings.len()
    }

    pub fn day_completed_count(&self) -> usize {
        self.data.daily_completed_recordings.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &LedgerData {
        &self.data
    }
}
