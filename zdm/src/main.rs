//! zdm - Zoom to Google Drive recording migrator
//!
//! One subcommand per phase:
//! - `migrate`: transfer recordings listed in a manifest, bounded by a daily budget
//! - `verify`: check every manifest row against the destination and write a report
//! - `delete`: remove source recordings a verification report marked complete
//! - `status`: print the progress ledger without touching the network

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zdm::delete::{self, DeletionCandidates, DeletionMode};
use zdm::reports::ReportTable;
use zdm::services::{DriveClient, ZoomClient};
use zdm::{MigrationOptions, Migrator, RunOutcome, Verifier};
use zdm_common::config::{resolve_config_path, Config};
use zdm_common::{time, Ledger, Manifest};

const DEFAULT_LOG_FILTER: &str = "zdm=info,zdm_common=info";

/// Command-line arguments for zdm
#[derive(Parser, Debug)]
#[command(name = "zdm")]
#[command(about = "Migrate Zoom cloud recordings to Google Drive in daily batches")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level for zdm crates (overrides RUST_LOG)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transfer recordings listed in a manifest
    Migrate {
        /// Manifest CSV exported from Zoom
        manifest: PathBuf,

        /// List and plan only; nothing is transferred or persisted
        #[arg(long)]
        dry_run: bool,

        /// Daily transfer limit in GB (overrides migration.daily_limit_gb)
        #[arg(long, value_name = "GB")]
        batch_limit_gb: Option<f64>,

        /// Progress ledger file (overrides storage.ledger_file)
        #[arg(long, value_name = "PATH")]
        ledger: Option<PathBuf>,
    },

    /// Check every manifest row against Google Drive
    Verify {
        manifest: PathBuf,

        /// Print the summary without writing the report
        #[arg(long)]
        dry_run: bool,

        #[arg(long, value_name = "PATH", default_value = "verification_report.csv")]
        output_csv: PathBuf,
    },

    /// Delete Zoom recordings a verification report marked COMPLETE
    Delete {
        /// Verification report CSV
        report: PathBuf,

        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,

        /// Skip the typed confirmation
        #[arg(long)]
        force: bool,

        /// Move recordings to the Zoom trash instead of deleting permanently
        #[arg(long)]
        trash: bool,

        #[arg(long, value_name = "PATH", default_value = "deletion_report.csv")]
        output_csv: PathBuf,
    },

    /// Print progress ledger totals
    Status {
        #[arg(long, value_name = "PATH")]
        ledger: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    tokio::select! {
        result = run(args) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{:#}", e);
                ExitCode::FAILURE
            }
        },
        _ = shutdown_signal() => {
            eprintln!("\nInterrupted. Files recorded in the ledger are kept; the current file will be retried next run.");
            ExitCode::SUCCESS
        }
    }
}

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => tracing_subscriber::EnvFilter::new(format!("zdm={0},zdm_common={0}", level)),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = resolve_config_path(path)?;
    Config::load(&path).with_context(|| format!("Invalid configuration in {}", path.display()))
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Migrate {
            manifest,
            dry_run,
            batch_limit_gb,
            ledger,
        } => {
            let config = load_config(args.config.as_deref())?;
            migrate(&config, &manifest, dry_run, batch_limit_gb, ledger).await
        }
        Command::Verify {
            manifest,
            dry_run,
            output_csv,
        } => {
            let config = load_config(args.config.as_deref())?;
            verify(&config, &manifest, dry_run, &output_csv).await
        }
        Command::Delete {
            report,
            dry_run,
            force,
            trash,
            output_csv,
        } => {
            let config = load_config(args.config.as_deref())?;
            delete(&config, &report, dry_run, force, trash, &output_csv).await
        }
        Command::Status { ledger } => {
            let path = match ledger {
                Some(path) => path,
                None => load_config(args.config.as_deref())?.storage.ledger_file,
            };
            status(&path)
        }
    }
}

async fn migrate(
    config: &Config,
    manifest_path: &Path,
    dry_run: bool,
    batch_limit_gb: Option<f64>,
    ledger_path: Option<PathBuf>,
) -> Result<()> {
    let daily_limit_gb = batch_limit_gb.unwrap_or(config.migration.daily_limit_gb);
    if !(daily_limit_gb > 0.0) {
        bail!("Daily limit must be positive, got {}", daily_limit_gb);
    }

    let manifest = Manifest::load(manifest_path, config.manifest_timezone()?)
        .with_context(|| format!("Cannot load manifest {}", manifest_path.display()))?;
    let ledger_path = ledger_path.unwrap_or_else(|| config.storage.ledger_file.clone());
    let mut ledger = Ledger::load(&ledger_path)
        .with_context(|| format!("Cannot read ledger {}", ledger_path.display()))?;

    let zoom = ZoomClient::connect(&config.zoom)
        .await
        .context("Zoom authentication failed")?;
    let drive = DriveClient::connect(config, !dry_run)
        .await
        .context("Google Drive setup failed")?;

    let options = MigrationOptions {
        dry_run,
        daily_limit_gb,
    };
    let mut migrator = Migrator::new(&zoom, &drive, config, options)?;
    let summary = migrator.run(manifest, &mut ledger, time::today_utc()).await?;

    match summary.outcome {
        RunOutcome::BudgetExhausted => println!(
            "Daily limit of {:.1} GB reached after {} file(s). Run again tomorrow to continue.",
            daily_limit_gb, summary.files_transferred
        ),
        RunOutcome::ManifestExhausted => println!(
            "Manifest finished: {} file(s) transferred, {} already complete, {} failed.",
            summary.files_transferred, summary.files_already_complete, summary.files_failed
        ),
    }
    if dry_run {
        println!("Dry run: nothing was transferred and the ledger was not changed.");
    }
    Ok(())
}

async fn verify(config: &Config, manifest_path: &Path, dry_run: bool, output_csv: &Path) -> Result<()> {
    let manifest = Manifest::load(manifest_path, config.manifest_timezone()?)
        .with_context(|| format!("Cannot load manifest {}", manifest_path.display()))?;

    let zoom = ZoomClient::connect(&config.zoom)
        .await
        .context("Zoom authentication failed")?;
    let drive = DriveClient::connect(config, false)
        .await
        .context("Google Drive setup failed")?;

    info!(rows = manifest.len(), "Verifying migration");
    let mut verifier = Verifier::new(&zoom, &drive, config.naming_template()?);
    let report = verifier.verify_manifest(&manifest).await;

    if dry_run {
        println!("Dry run: {} row(s) verified, report not written.", report.len());
    } else {
        report.write(output_csv)?;
        println!("Verification report saved to {}", output_csv.display());
    }
    Ok(())
}

async fn delete(
    config: &Config,
    report_path: &Path,
    dry_run: bool,
    force: bool,
    trash: bool,
    output_csv: &Path,
) -> Result<()> {
    let report = ReportTable::read(report_path)?;
    let candidates = DeletionCandidates::from_report(report)
        .with_context(|| format!("{} is not a verification report", report_path.display()))?;

    if candidates.is_empty() {
        println!("No recordings marked as 'COMPLETE' found. Nothing to delete.");
        return Ok(());
    }
    println!(
        "Found {} recording(s) marked as 'COMPLETE' and eligible for deletion.",
        candidates.len()
    );

    if dry_run {
        println!("*** DRY RUN: no recordings will be deleted ***");
    } else if !force {
        let stdin = std::io::stdin();
        let confirmed = delete::confirm(
            candidates.len(),
            trash,
            &mut stdin.lock(),
            &mut std::io::stdout(),
        )?;
        if !confirmed {
            println!("Confirmation not received. Aborting.");
            return Ok(());
        }
    }

    let zoom;
    let mode = if dry_run {
        DeletionMode::DryRun
    } else {
        zoom = ZoomClient::connect(&config.zoom)
            .await
            .context("Zoom authentication failed")?;
        DeletionMode::Live {
            source: &zoom,
            trash,
        }
    };

    let output = delete::delete_recordings(&candidates, mode).await;
    output.write(output_csv)?;
    println!("Deletion report saved to {}", output_csv.display());
    Ok(())
}

fn status(ledger_path: &Path) -> Result<()> {
    let ledger = Ledger::load(ledger_path)
        .with_context(|| format!("Cannot read ledger {}", ledger_path.display()))?;
    let data = ledger.data();

    println!("Ledger:            {}", ledger_path.display());
    println!(
        "Last run (UTC):    {}",
        data.last_run_utc.as_deref().unwrap_or("never")
    );
    println!("Runs recorded:     {}", ledger.run_counter().saturating_sub(1));
    println!(
        "Files completed:   {} ({:.3} GB)",
        ledger.completed_count(),
        data.total_completed_recordings.values().sum::<f64>()
    );
    println!(
        "Completed on last run day: {} ({:.3} GB)",
        ledger.day_completed_count(),
        ledger.current_day_usage_gb()
    );
    Ok(())
}

/// Resolves when the operator asks the process to stop
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
