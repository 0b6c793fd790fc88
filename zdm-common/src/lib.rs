//! # ZDM Common Library
//!
//! Shared code for the Zoom → Google Drive recording migrator:
//! - Data model for manifest rows and provider recordings
//! - Manifest (CSV) loading
//! - Progress ledger and daily budget accounting
//! - Manifest-to-recording matching
//! - Destination naming templates
//! - Configuration loading

pub mod budget;
pub mod config;
pub mod error;
pub mod ledger;
pub mod manifest;
pub mod matcher;
pub mod models;
pub mod naming;
pub mod time;

pub use error::{Error, Result};
pub use ledger::Ledger;
pub use manifest::{Manifest, ManifestRow};
pub use models::{ProviderRecording, RecordingFile};
