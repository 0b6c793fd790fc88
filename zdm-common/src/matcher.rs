//! Recording Matcher
//!
//! Reconciles a manifest row against the provider recordings listed for the
//! row's host around its start time.
//!
//! **Known ambiguity:** the first candidate (in provider order) with an equal
//! topic inside the time tolerance wins. Two sessions of the same topic that
//! start within five minutes of each other are not told apart.

use crate::manifest::ManifestRow;
use crate::models::ProviderRecording;
use chrono::{Duration, NaiveDate};

/// Start times must differ by strictly less than this to match
pub const MATCH_TOLERANCE_MINUTES: i64 = 5;

/// Days listed on either side of the row's UTC start date
pub const SEARCH_WINDOW_DAYS: i64 = 1;

/// Structured key for one provider listing: host plus inclusive date range
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchWindow {
    pub host: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl SearchWindow {
    /// Window covering the day before through the day after the row's UTC start
    pub fn for_row(row: &ManifestRow) -> Self {
        let date = row.utc_start.date_naive();
        Self {
            host: row.host.clone(),
            from: date - Duration::days(SEARCH_WINDOW_DAYS),
            to: date + Duration::days(SEARCH_WINDOW_DAYS),
        }
    }
}

/// Remove the manifest export artifact: a leading `'` directly before a `-`
pub fn normalize_topic(topic: &str) -> String {
    match topic.strip_prefix('\'') {
        Some(rest) if rest.starts_with('-') => rest.to_string(),
        _ => topic.to_string(),
    }
}

fn is_match(row: &ManifestRow, candidate: &ProviderRecording) -> bool {
    if candidate.topic != row.normalized_topic {
        return false;
    }
    let delta = (candidate.start_time - row.utc_start).num_seconds().abs();
    delta < MATCH_TOLERANCE_MINUTES * 60
}

/// First candidate with the row's normalized topic starting within tolerance.
///
/// `None` means "not found on the provider", not an error.
pub fn find_match<'a>(
    row: &ManifestRow,
    candidates: &'a [ProviderRecording],
) -> Option<&'a ProviderRecording> {
    candidates.iter().find(|candidate| is_match(row, candidate))
}

/// Number of candidates that would match; more than one means `find_match` picked arbitrarily
pub fn count_matches(row: &ManifestRow, candidates: &[ProviderRecording]) -> usize {
    candidates.iter().filter(|c| is_match(row, c)).count()
}
