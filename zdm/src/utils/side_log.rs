//! Append-only plain-text side logs (activity log, failed uploads)

use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One append-only log file, opened per write
#[derive(Debug, Clone)]
pub struct SideLog {
    path: PathBuf,
}

impl SideLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `message` as one line
    pub fn append(&self, message: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", message.trim_end())?;
        file.flush()
    }

    /// Append with a local timestamp prefix
    pub fn append_timestamped(&self, message: &str) -> std::io::Result<()> {
        self.append(&format!("{}: {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message))
    }

    /// Best-effort append; a failing side log never fails the caller
    pub fn record(&self, message: &str) {
        if let Err(e) = self.append_timestamped(message) {
            tracing::warn!(path = %self.path.display(), error = %e, "Side log write failed");
        }
    }
}
