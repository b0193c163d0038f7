//! The catalog store seen from the pipeline.
//!
//! The store owns persistence, lookups and identity collisions. The pipeline only
//! creates libraries, waits for them and hands over batches.

use crate::config::CollectionKind;
use crate::error::StoreError;
use crate::models::Entity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// A store-side grouping node, e.g. the root folder of a movies library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: Uuid,
    pub name: String,
    pub path: PathBuf,
    pub kind: CollectionKind,
    /// Physical directories the container was created from.
    pub locations: Vec<PathBuf>,
}

impl Container {
    /// Whether the container already covers `path`. Case is ignored, matching
    /// how media servers compare library locations.
    pub fn covers(&self, path: &Path) -> bool {
        let wanted = path.to_string_lossy();
        self.locations
            .iter()
            .any(|loc| loc.to_string_lossy().eq_ignore_ascii_case(&wanted))
    }
}

/// Per-library switches sent with a creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryOptions {
    pub enable_realtime_monitor: bool,
    pub save_local_metadata: bool,
    pub enable_internet_providers: bool,
    pub paths: Vec<PathBuf>,
}

impl LibraryOptions {
    /// Everything off: the pipeline brings its own metadata and must not kick off
    /// external enrichment for millions of items.
    pub fn passive(path: &Path) -> Self {
        Self {
            enable_realtime_monitor: false,
            save_local_metadata: false,
            enable_internet_providers: false,
            paths: vec![path.to_path_buf()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub kind: CollectionKind,
    pub options: LibraryOptions,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_container_by_path(&self, path: &Path) -> StoreResult<Option<Container>>;

    async fn list_top_level_containers(&self) -> StoreResult<Vec<Container>>;

    /// Requests a new library. It shows up in lookups only after a later
    /// validation pass has materialized it.
    async fn create_container(&self, spec: ContainerSpec) -> StoreResult<()>;

    /// Writes one batch under `parent`. Writing an id the store already holds is
    /// a no-op, never a duplicate.
    async fn create_entities(&self, batch: &[Entity], parent: &Container) -> StoreResult<()>;

    /// Rescans libraries, materializing pending containers.
    async fn trigger_validation(&self) -> StoreResult<()>;
}
