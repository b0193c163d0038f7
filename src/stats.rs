use crate::models::EntityKind;
use serde::Serialize;

/// Counters for one ingestion run.
///
/// Reconstruction counts what the pipeline produced; `committed` counts what the
/// batch writer handed to the store. Seasons are counted once per episode that
/// derived them, so `seasons` is not a distinct-season count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub rows_read: u64,
    pub rows_skipped: u64,
    pub movies: u64,
    pub series: u64,
    pub seasons: u64,
    pub episodes: u64,
    pub unplaced_episodes: u64,
    pub ignored_titles: u64,
    pub committed: u64,
    pub linkage_entries: usize,
}

impl IngestStats {
    pub fn record(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Movie => self.movies += 1,
            EntityKind::Series => self.series += 1,
            EntityKind::Season => self.seasons += 1,
            EntityKind::Episode => self.episodes += 1,
        }
    }

    pub fn reconstructed(&self) -> u64 {
        self.movies + self.series + self.seasons + self.episodes
    }
}
