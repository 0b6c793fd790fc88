//! Window-cached recording lookup
//!
//! Each distinct (host, date window) is listed from the source at most once
//! per run; every row that falls in the same window reuses the listing.

use crate::services::RecordingSource;
use anyhow::{Context, Result};
use std::collections::HashMap;
use zdm_common::manifest::ManifestRow;
use zdm_common::matcher::{count_matches, find_match, SearchWindow};
use zdm_common::ProviderRecording;

/// Per-run listing cache plus matching
#[derive(Debug, Default)]
pub struct RecordingLookup {
    cache: HashMap<SearchWindow, Vec<ProviderRecording>>,
    fetches: usize,
}

impl RecordingLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listing for `window`, fetched on first use
    pub async fn candidates(
        &mut self,
        source: &dyn RecordingSource,
        window: &SearchWindow,
    ) -> Result<&[ProviderRecording]> {
        if !self.cache.contains_key(window) {
            let listed = source
                .list_recordings(&window.host, window.from, window.to)
                .await
                .with_context(|| {
                    format!(
                        "List recordings for {} from {} to {} failed",
                        window.host, window.from, window.to
                    )
                })?;
            tracing::debug!(
                host = %window.host,
                from = %window.from,
                to = %window.to,
                count = listed.len(),
                "Cached provider listing"
            );
            self.fetches += 1;
            self.cache.insert(window.clone(), listed);
        }
        Ok(self.cache.get(window).map(Vec::as_slice).unwrap_or_default())
    }

    /// Matching provider recording for `row`, or `None` when the provider has none.
    ///
    /// Listing failures propagate so the caller can treat the row as errored.
    pub async fn resolve(
        &mut self,
        source: &dyn RecordingSource,
        row: &ManifestRow,
    ) -> Result<Option<ProviderRecording>> {
        let window = SearchWindow::for_row(row);
        let candidates = self.candidates(source, &window).await?;

        let matches = count_matches(row, candidates);
        if matches > 1 {
            tracing::warn!(
                row = row.index,
                topic = %row.normalized_topic,
                matches,
                "Several recordings match this row; using the first"
            );
        }
        Ok(find_match(row, candidates).cloned())
    }

    /// Number of listings actually requested from the source
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }
}
