//! zdm library interface
//!
//! Exposes the migration, verification and deletion passes together with the
//! provider clients, so the binary and the integration tests share one
//! implementation.

pub mod delete;
pub mod lookup;
pub mod orchestrator;
pub mod reports;
pub mod services;
pub mod utils;
pub mod verify;

pub use orchestrator::{MigrationOptions, Migrator, RunOutcome, RunSummary};
pub use services::{DestinationStore, RecordingSource};
pub use verify::{Verifier, VerificationStatus};
