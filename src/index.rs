use crate::config::INDEX_TICK_INTERVAL;
use crate::error::IngestError;
use crate::models::{EpisodeLink, LinkageRecord};
use crate::parser::parse_linkage;
use indicatif::ProgressBar;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

/// Episode id → (series id, season, episode), built from one pass over
/// `title.episode`.
///
/// This is the one structure allowed to grow with the dataset: it is bounded by
/// the number of episode rows and saves a second pass over the far larger
/// primary table. Read-only once built.
pub struct LinkageIndex {
    links: FxHashMap<String, EpisodeLink>,
}

impl LinkageIndex {
    /// Consumes every line. The first read error aborts the build; a partial
    /// index would quietly misfile episodes.
    pub fn build<I>(lines: I) -> Result<Self, IngestError>
    where
        I: IntoIterator<Item = Result<String, IngestError>>,
    {
        let mut index = Self {
            links: FxHashMap::default(),
        };
        let pb = ProgressBar::new_spinner();
        let mut rows = 0u64;
        let mut skipped = 0u64;

        for line in lines {
            let line = line?;
            rows += 1;
            match parse_linkage(&line) {
                Some(record) => index.insert(record),
                None => skipped += 1,
            }
            if rows % INDEX_TICK_INTERVAL == 0 {
                pb.set_message(format!("{rows} linkage rows"));
                pb.tick();
            }
        }

        pb.finish_and_clear();

        info!(
            rows,
            skipped,
            episodes = index.len(),
            "Linkage index built"
        );

        Ok(index)
    }

    /// Later rows for the same child replace earlier ones.
    pub fn insert(&mut self, record: LinkageRecord) {
        let link = EpisodeLink {
            parent_id: record.parent_id,
            season_number: record.season_number,
            episode_number: record.episode_number,
        };
        if let Some(previous) = self.links.insert(record.child_id, link) {
            debug!(parent = %previous.parent_id, "Duplicate linkage row replaced");
        }
    }

    pub fn get(&self, child_id: &str) -> Option<&EpisodeLink> {
        self.links.get(child_id)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn from_map(links: FxHashMap<String, EpisodeLink>) -> Self {
        Self { links }
    }

    pub fn map(&self) -> &FxHashMap<String, EpisodeLink> {
        &self.links
    }
}
