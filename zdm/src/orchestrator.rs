//! Migration Orchestrator
//!
//! Walks the manifest in chronological order and, for every row, resolves the
//! provider recording, skips files already in the ledger, admits each
//! remaining file against the daily budget, then transfers and records it.
//!
//! Termination:
//! - manifest exhausted
//! - budget exhausted (a normal outcome, never an error)
//! - setup error before the loop starts
//!
//! Errors inside a row are logged and the row is skipped. Errors for a single
//! file are logged and the next file is tried; the file stays incomplete and
//! is picked up again by a later run.

use crate::lookup::RecordingLookup;
use crate::services::{DestinationStore, RecordingSource};
use crate::utils::scratch::remove_and_prune;
use crate::utils::SideLog;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use zdm_common::budget::{self, BudgetController, DayRollover};
use zdm_common::config::Config;
use zdm_common::naming::{DestinationName, NamingTemplate};
use zdm_common::{Ledger, Manifest, ManifestRow, ProviderRecording, RecordingFile};

/// Per-invocation switches layered over the configuration
#[derive(Debug, Clone, Copy)]
pub struct MigrationOptions {
    /// List and plan only: nothing is downloaded, uploaded, created or persisted
    pub dry_run: bool,
    pub daily_limit_gb: f64,
}

/// What the loop does after a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFlow {
    Continue,
    /// Budget would be exceeded by the next file; stop the whole run
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunOutcome {
    #[default]
    ManifestExhausted,
    BudgetExhausted,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub rows_processed: usize,
    pub rows_unmatched: usize,
    pub rows_failed: usize,
    pub duplicate_rows: usize,
    pub files_transferred: usize,
    pub files_already_complete: usize,
    pub files_failed: usize,
    pub gb_transferred: f64,
    pub outcome: RunOutcome,
}

/// One migration run over a manifest
pub struct Migrator<'a> {
    source: &'a dyn RecordingSource,
    destination: &'a dyn DestinationStore,
    naming: NamingTemplate,
    budget: BudgetController,
    download_dir: PathBuf,
    date_window: (Option<NaiveDate>, Option<NaiveDate>),
    activity_log: SideLog,
    dry_run: bool,
    lookup: RecordingLookup,
    /// Same-day usage as it would be if the dry run had transferred
    projected_usage_gb: f64,
}

impl<'a> Migrator<'a> {
    pub fn new(
        source: &'a dyn RecordingSource,
        destination: &'a dyn DestinationStore,
        config: &Config,
        options: MigrationOptions,
    ) -> Result<Self> {
        Ok(Self {
            source,
            destination,
            naming: config.naming_template()?,
            budget: BudgetController::new(options.daily_limit_gb),
            download_dir: config.storage.download_dir.clone(),
            date_window: (config.recordings.start_date, config.recordings.end_date),
            activity_log: SideLog::new(&config.storage.completed_log),
            dry_run: options.dry_run,
            lookup: RecordingLookup::new(),
            projected_usage_gb: 0.0,
        })
    }

    /// Run the migration over `manifest`, treating `today` as the current UTC day.
    ///
    /// Returns `Err` only for failures before the row loop or when the final
    /// ledger save fails.
    pub async fn run(
        &mut self,
        mut manifest: Manifest,
        ledger: &mut Ledger,
        today: NaiveDate,
    ) -> Result<RunSummary> {
        self.start_day(ledger, today)?;

        let mut summary = RunSummary::default();
        manifest.retain_date_window(self.date_window.0, self.date_window.1);
        manifest.sort_chronologically();
        summary.duplicate_rows = manifest.dedup_by_hash();

        info!(
            rows = manifest.len(),
            duplicates = summary.duplicate_rows,
            run = ledger.run_counter(),
            daily_limit_gb = self.budget.daily_limit_gb(),
            used_today_gb = self.day_usage_gb(ledger),
            dry_run = self.dry_run,
            "Starting migration"
        );
        if !self.dry_run {
            self.activity_log.record(&format!(
                "Run {} started: {} manifest rows, {:.3} of {:.3} GB used today",
                ledger.run_counter(),
                manifest.len(),
                ledger.current_day_usage_gb(),
                self.budget.daily_limit_gb()
            ));
        }

        for row in &manifest.rows {
            summary.rows_processed += 1;
            match self.process_row(row, ledger, &mut summary).await {
                Ok(RowFlow::Continue) => {}
                Ok(RowFlow::Halt) => {
                    summary.outcome = RunOutcome::BudgetExhausted;
                    break;
                }
                Err(e) => {
                    summary.rows_failed += 1;
                    let detail = format!("{:#}", e);
                    error!(row = row.index + 1, topic = %row.topic, error = %detail, "Row failed, skipping");
                }
            }
        }

        if !self.dry_run {
            ledger.save().context("Final ledger save failed")?;
        }

        info!(
            outcome = ?summary.outcome,
            rows = summary.rows_processed,
            unmatched = summary.rows_unmatched,
            failed_rows = summary.rows_failed,
            transferred = summary.files_transferred,
            already_complete = summary.files_already_complete,
            failed_files = summary.files_failed,
            gb = summary.gb_transferred,
            listings = self.lookup.fetch_count(),
            "Migration finished"
        );
        Ok(summary)
    }

    /// Day bookkeeping. A dry run computes the rollover without persisting.
    fn start_day(&mut self, ledger: &mut Ledger, today: NaiveDate) -> Result<()> {
        if self.dry_run {
            self.projected_usage_gb = if budget::is_new_day(ledger, today) {
                0.0
            } else {
                ledger.current_day_usage_gb()
            };
            return Ok(());
        }

        let rollover = self
            .budget
            .begin_run(ledger, today)
            .context("Ledger could not be saved at run start")?;
        if rollover == DayRollover::Reset {
            info!(today = %today, "Daily usage reset for a new day");
        }
        Ok(())
    }

    fn day_usage_gb(&self, ledger: &Ledger) -> f64 {
        if self.dry_run {
            self.projected_usage_gb
        } else {
            ledger.current_day_usage_gb()
        }
    }

    async fn process_row(
        &mut self,
        row: &ManifestRow,
        ledger: &mut Ledger,
        summary: &mut RunSummary,
    ) -> Result<RowFlow> {
        let Some(recording) = self.lookup.resolve(self.source, row).await? else {
            info!(
                row = row.index + 1,
                host = %row.host,
                topic = %row.topic,
                start = %row.utc_start,
                "No matching recording found"
            );
            summary.rows_unmatched += 1;
            return Ok(RowFlow::Continue);
        };

        if recording.recording_files.is_empty() {
            info!(uuid = %recording.uuid, topic = %recording.topic, "Recording has no files");
            return Ok(RowFlow::Continue);
        }

        debug!(
            row = row.index + 1,
            uuid = %recording.uuid,
            files = recording.recording_files.len(),
            "Matched recording"
        );

        for file in &recording.recording_files {
            if file.id.is_empty() {
                warn!(uuid = %recording.uuid, file_type = %file.file_type, "File has no id, skipping");
                continue;
            }

            if ledger.is_complete(&file.id) {
                debug!(file_id = %file.id, "Already transferred");
                summary.files_already_complete += 1;
                continue;
            }

            let size_gb = file.size_gb();
            let usage_gb = self.day_usage_gb(ledger);
            if budget::exceeds(usage_gb, size_gb, self.budget.daily_limit_gb()) {
                warn!(
                    file_id = %file.id,
                    size_gb,
                    used_gb = usage_gb,
                    limit_gb = self.budget.daily_limit_gb(),
                    "Daily limit reached, stopping"
                );
                return Ok(RowFlow::Halt);
            }

            let destination = self.naming.render(&recording, file);

            if self.dry_run {
                info!(
                    file_id = %file.id,
                    size_gb,
                    folder = %destination.folder_path(),
                    name = %destination.filename,
                    "Dry run: would transfer"
                );
                self.projected_usage_gb += size_gb;
                summary.files_transferred += 1;
                summary.gb_transferred += size_gb;
                continue;
            }

            match self.transfer(&recording, file, &destination).await {
                Ok(true) => {
                    ledger
                        .record_complete(&file.id, size_gb)
                        .context("Ledger update failed")?;
                    summary.files_transferred += 1;
                    summary.gb_transferred += size_gb;
                    info!(
                        file_id = %file.id,
                        size_gb,
                        used_today_gb = ledger.current_day_usage_gb(),
                        name = %destination.filename,
                        "Transferred"
                    );
                    self.activity_log.record(&format!(
                        "{}/{} ({:.3} GB)",
                        destination.folder_path(),
                        destination.filename,
                        size_gb
                    ));
                }
                Ok(false) => {
                    summary.files_failed += 1;
                    warn!(file_id = %file.id, name = %destination.filename, "Upload failed, file left incomplete");
                }
                Err(e) => {
                    summary.files_failed += 1;
                    let detail = format!("{:#}", e);
                    warn!(file_id = %file.id, error = %detail, "Transfer failed, file left incomplete");
                }
            }
        }

        Ok(RowFlow::Continue)
    }

    /// Download to scratch, upload, then drop the scratch copy
    async fn transfer(
        &self,
        recording: &ProviderRecording,
        file: &RecordingFile,
        destination: &DestinationName,
    ) -> Result<bool> {
        let local = destination.local_path(&self.download_dir);

        let bytes = match self.source.download_file(file, &local).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.clear_scratch(&local);
                return Err(e)
                    .with_context(|| format!("Download of {} ({}) failed", file.id, recording.topic));
            }
        };
        debug!(file_id = %file.id, bytes, path = %local.display(), "Downloaded");

        let uploaded = self
            .destination
            .upload_file(&local, &destination.folder, &destination.filename)
            .await;

        self.clear_scratch(&local);
        uploaded.with_context(|| format!("Upload of {} failed", destination.filename))
    }

    fn clear_scratch(&self, local: &Path) {
        if let Err(e) = remove_and_prune(local, &self.download_dir) {
            warn!(path = %local.display(), error = %e, "Scratch cleanup failed");
        }
    }
}
