//! The ingestion run as one schedulable task.
//!
//! A run walks `Provisioning → IndexBuilding → Streaming → Flushing → Validating →
//! Done` and lands in `Failed` from wherever an error surfaces. Everything happens
//! on the caller's task; the only suspension points are store calls, downloads and
//! the container poll. The linkage index pass runs through `block_in_place` on a
//! multi-threaded runtime.

use crate::batch::{BatchWriter, Libraries};
use crate::cache;
use crate::config::IngestConfig;
use crate::download::{ensure_dataset, Dataset, Transport};
use crate::error::IngestError;
use crate::index::LinkageIndex;
use crate::models::{EntityKind, TitleKind};
use crate::parser::parse_primary;
use crate::progress::{percent_of, ProgressSink};
use crate::provision::{Clock, Provisioner};
use crate::reader::DatasetReader;
use crate::reconstruct::{reconstruct, Parents};
use crate::stats::IngestStats;
use crate::store::CatalogStore;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Provisioning,
    IndexBuilding,
    Streaming,
    Flushing,
    Validating,
    Done,
    Failed,
}

/// How the task presents itself to a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInfo {
    pub name: &'static str,
    pub key: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    /// Empty: the task only runs when triggered by hand.
    pub default_triggers: &'static [&'static str],
}

pub const TASK_INFO: TaskInfo = TaskInfo {
    name: "External Media: Sync catalog",
    key: "ExternalMediaSync",
    description: "Downloads the public title datasets and registers movies, series, seasons and episodes as virtual catalog items",
    category: "External Media",
    default_triggers: &[],
};

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub stats: IngestStats,
    pub elapsed: Duration,
}

pub struct IngestTask {
    store: Arc<dyn CatalogStore>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    config: IngestConfig,
    stage: Stage,
}

impl IngestTask {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        config: IngestConfig,
    ) -> Self {
        Self {
            store,
            transport,
            clock,
            config,
            stage: Stage::Idle,
        }
    }

    pub fn info(&self) -> TaskInfo {
        TASK_INFO
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Runs the whole pipeline once.
    ///
    /// On error the stage is left at `Failed`, progress stays at whatever was last
    /// reported and batches already written remain in the store. Cancellation
    /// surfaces as [`IngestError::Cancelled`] without flushing partial buffers.
    pub async fn execute(
        &mut self,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, IngestError> {
        let start = Instant::now();
        match self.run(progress, cancel).await {
            Ok(stats) => {
                self.enter(Stage::Done);
                let elapsed = start.elapsed();
                info!(
                    committed = stats.committed,
                    duration_secs = elapsed.as_secs_f64(),
                    "Ingestion complete"
                );
                Ok(IngestReport { stats, elapsed })
            }
            Err(e) => {
                let failed_in = self.stage;
                self.enter(Stage::Failed);
                if matches!(e, IngestError::Cancelled) {
                    warn!(stage = ?failed_in, "Ingestion cancelled");
                } else {
                    error!(stage = ?failed_in, kind = e.kind(), error = %e, "Ingestion failed");
                }
                Err(e)
            }
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!(from = ?self.stage, to = ?stage, "Stage transition");
        self.stage = stage;
    }

    async fn run(
        &mut self,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<IngestStats, IngestError> {
        let mut stats = IngestStats::default();

        self.enter(Stage::Provisioning);
        let libraries = self.provision().await?;
        check(cancel)?;

        self.enter(Stage::IndexBuilding);
        let basics = Dataset::title_basics(&self.config.base_url);
        let episodes = Dataset::title_episode(&self.config.base_url);
        let basics_path =
            ensure_dataset(self.transport.as_ref(), &basics, &self.config.cache_dir).await?;
        check(cancel)?;
        let episodes_path =
            ensure_dataset(self.transport.as_ref(), &episodes, &self.config.cache_dir).await?;
        check(cancel)?;
        let index = blocking(|| self.load_or_build_index(&episodes_path, cancel))?;
        stats.linkage_entries = index.len();

        self.enter(Stage::Streaming);
        let store = Arc::clone(&self.store);
        let mut writer = BatchWriter::new(
            store.as_ref(),
            &libraries,
            self.config.batch_size,
            cancel.clone(),
        );
        self.stream(&basics_path, &index, &libraries, &mut writer, &mut stats, progress, cancel)
            .await?;

        self.enter(Stage::Flushing);
        writer.flush_all().await?;
        stats.committed = writer.total_committed();
        info!(
            committed = stats.committed,
            writes = writer.writes(),
            "All buffers flushed"
        );

        self.enter(Stage::Validating);
        self.store
            .trigger_validation()
            .await
            .map_err(IngestError::Store)?;

        progress.report(100.0);
        Ok(stats)
    }

    async fn provision(&self) -> Result<Libraries, IngestError> {
        let provisioner = Provisioner::new(
            self.store.as_ref(),
            self.clock.as_ref(),
            self.config.poll_interval,
            self.config.materialize_timeout,
        );
        let movies = provisioner.ensure_container(&self.config.movies).await?;
        let shows = provisioner.ensure_container(&self.config.shows).await?;
        Ok(Libraries { movies, shows })
    }

    /// Reuses the cached index when it still matches the dataset. A bad cache is
    /// rebuilt, never fatal.
    fn load_or_build_index(
        &self,
        episodes_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<LinkageIndex, IngestError> {
        let cache_file = cache::cache_path(episodes_path);

        if self.config.use_index_cache {
            match cache::try_load_index(&cache_file, episodes_path) {
                Ok(Some(index)) => return Ok(index),
                Ok(None) => info!("Building linkage index (cache miss or stale)"),
                Err(e) => warn!(error = %e, "Failed to read index cache, rebuilding"),
            }
        } else {
            info!("Index cache disabled, building fresh linkage index");
        }

        let reader = DatasetReader::open(episodes_path)?;
        let index = LinkageIndex::build(reader.map(|line| {
            if cancel.is_cancelled() {
                Err(IngestError::Cancelled)
            } else {
                line
            }
        }))?;

        if let Err(e) = cache::save_index(&index, episodes_path) {
            warn!(error = %e, "Failed to save index cache");
        }
        Ok(index)
    }

    #[allow(clippy::too_many_arguments)]
    async fn stream<S: CatalogStore + ?Sized>(
        &self,
        basics_path: &Path,
        index: &LinkageIndex,
        libraries: &Libraries,
        writer: &mut BatchWriter<'_, S>,
        stats: &mut IngestStats,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), IngestError> {
        let parents = Parents {
            movies: libraries.movies.id,
            shows: libraries.shows.id,
        };
        let interval = self.config.progress_interval.max(1);
        let mut next_report = interval;

        info!(path = ?basics_path, "Streaming primary dataset");
        for line in DatasetReader::open(basics_path)? {
            check(cancel)?;
            if let Some(limit) = self.config.row_limit {
                if stats.rows_read >= limit {
                    info!(limit, "Row limit reached");
                    break;
                }
            }

            let line = line?;
            stats.rows_read += 1;

            let Some(record) = parse_primary(&line) else {
                stats.rows_skipped += 1;
                continue;
            };
            let title_kind = record.kind;

            let Some(item) = reconstruct(record, index, &parents, Utc::now()) else {
                if title_kind == TitleKind::TvEpisode {
                    stats.unplaced_episodes += 1;
                } else {
                    stats.ignored_titles += 1;
                }
                continue;
            };

            // Buffer everything the row produced before any flush, so a season
            // never trails the episode batch that references it.
            let entities = item.into_entities();
            let kinds: Vec<EntityKind> = entities.iter().map(|e| e.kind()).collect();
            for entity in entities {
                stats.record(entity.kind());
                writer.push(entity);
            }
            for kind in kinds {
                writer.flush_if_full(kind).await?;
            }

            let committed = writer.total_committed();
            if committed >= next_report {
                let percent = percent_of(committed, self.config.estimated_total);
                progress.report(percent);
                info!(
                    rows = stats.rows_read,
                    committed,
                    percent = %format!("{percent:.1}"),
                    "Progress"
                );
                next_report = (committed / interval + 1) * interval;
            }
        }

        info!(
            rows = stats.rows_read,
            skipped = stats.rows_skipped,
            unplaced = stats.unplaced_episodes,
            ignored = stats.ignored_titles,
            "Primary dataset consumed"
        );
        Ok(())
    }
}

/// Runs `f` without stalling other tasks on the worker. `block_in_place` panics on
/// a current-thread runtime, where `f` simply runs inline.
fn blocking<R>(f: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}

fn check(cancel: &CancellationToken) -> Result<(), IngestError> {
    if cancel.is_cancelled() {
        Err(IngestError::Cancelled)
    } else {
        Ok(())
    }
}
