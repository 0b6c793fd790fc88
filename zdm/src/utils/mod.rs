//! Utility modules for the migrator passes

pub mod pacer;
pub mod retry;
pub mod scratch;
pub mod side_log;

pub use pacer::RequestPacer;
pub use retry::retry_fixed;
pub use side_log::SideLog;
