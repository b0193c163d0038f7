use crate::error::StoreError;
use crate::identity::container_id;
use crate::models::{Entity, EntityKind};
use crate::store::{CatalogStore, Container, ContainerSpec, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

const CATALOG_FILE: &str = "catalog.json";
const ITEMS_DIR: &str = "items";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogState {
    containers: Vec<Container>,
    pending: Vec<ContainerSpec>,
}

/// One CSV row per item. Fields that do not apply to a kind stay empty.
#[derive(Debug, Serialize)]
struct ItemRow<'a> {
    id: Uuid,
    parent_id: Uuid,
    container_id: Uuid,
    name: &'a str,
    path: &'a str,
    is_virtual: bool,
    provider: &'a str,
    external_id: &'a str,
    series_id: Option<Uuid>,
    index_number: Option<i32>,
    parent_index_number: Option<i32>,
    original_title: Option<&'a str>,
    is_adult: Option<bool>,
    production_year: Option<i32>,
    end_year: Option<i32>,
    runtime_minutes: Option<u32>,
    genres: String,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl<'a> ItemRow<'a> {
    fn new(entity: &'a Entity, container: Uuid) -> Self {
        let meta = entity.meta();
        let mut row = ItemRow {
            id: meta.id,
            parent_id: meta.parent_id,
            container_id: container,
            name: &meta.name,
            path: &meta.path,
            is_virtual: meta.is_virtual,
            provider: meta.provider.provider,
            external_id: &meta.provider.external_id,
            series_id: None,
            index_number: None,
            parent_index_number: None,
            original_title: None,
            is_adult: None,
            production_year: None,
            end_year: None,
            runtime_minutes: None,
            genres: String::new(),
            created_at: meta.created_at,
            modified_at: meta.modified_at,
        };

        match entity {
            Entity::Movie(m) => {
                row.original_title = Some(&m.original_title);
                row.is_adult = Some(m.is_adult);
                row.production_year = m.production_year;
                row.runtime_minutes = m.runtime_minutes;
                row.genres = m.genres.join("|");
            }
            Entity::Series(s) => {
                row.original_title = Some(&s.original_title);
                row.is_adult = Some(s.is_adult);
                row.production_year = s.production_year;
                row.end_year = s.end_year;
                row.genres = s.genres.join("|");
            }
            Entity::Season(s) => {
                row.series_id = Some(s.meta.parent_id);
                row.index_number = Some(s.index_number);
            }
            Entity::Episode(e) => {
                row.series_id = Some(e.series_id);
                row.index_number = Some(e.index_number);
                row.parent_index_number = Some(e.parent_index_number);
                row.runtime_minutes = e.runtime_minutes;
                row.genres = e.genres.join("|");
            }
        }
        row
    }
}

struct Inner {
    state: CatalogState,
    seen: [FxHashSet<Uuid>; 4],
}

/// Catalog kept in a local directory: `catalog.json` for libraries and one CSV
/// per item kind under `items/`.
///
/// Libraries follow the media-server lifecycle: a creation request stays pending
/// until [`CatalogStore::trigger_validation`] finds its directory present and
/// non-empty. Item ids already on disk are skipped, so re-running an ingestion
/// appends nothing new.
pub struct FsCatalogStore {
    root: PathBuf,
    inner: Mutex<Inner>,
}

impl FsCatalogStore {
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(ITEMS_DIR))?;

        let catalog_path = root.join(CATALOG_FILE);
        let state = if catalog_path.exists() {
            serde_json::from_reader(BufReader::new(File::open(&catalog_path)?))?
        } else {
            CatalogState::default()
        };

        let mut seen: [FxHashSet<Uuid>; 4] = Default::default();
        for kind in EntityKind::FLUSH_ORDER {
            seen[kind.index()] = load_ids(&items_path(&root, kind))?;
        }

        info!(
            root = ?root,
            containers = state.containers.len(),
            pending = state.pending.len(),
            items = seen.iter().map(|s| s.len()).sum::<usize>(),
            "Opened catalog"
        );

        Ok(Self {
            root,
            inner: Mutex::new(Inner { state, seen }),
        })
    }

    pub fn items_path(&self, kind: EntityKind) -> PathBuf {
        items_path(&self.root, kind)
    }

    /// Number of distinct items of `kind` held by the catalog.
    pub fn item_count(&self, kind: EntityKind) -> usize {
        self.lock()
            .map(|inner| inner.seen[kind.index()].len())
            .unwrap_or(0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("catalog lock poisoned".to_string()))
    }

    fn save_state(&self, state: &CatalogState) -> StoreResult<()> {
        let path = self.root.join(CATALOG_FILE);
        let tmp_path = path.with_extension("json.tmp");
        let writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer_pretty(writer, state)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

fn items_path(root: &Path, kind: EntityKind) -> PathBuf {
    let file = match kind {
        EntityKind::Movie => "movies.csv",
        EntityKind::Series => "series.csv",
        EntityKind::Season => "seasons.csv",
        EntityKind::Episode => "episodes.csv",
    };
    root.join(ITEMS_DIR).join(file)
}

fn load_ids(path: &Path) -> StoreResult<FxHashSet<Uuid>> {
    let mut ids = FxHashSet::default();
    if !path.exists() {
        return Ok(ids);
    }

    let mut reader = csv::Reader::from_path(path)?;
    for record in reader.records() {
        let record = record?;
        match record.get(0).map(Uuid::parse_str) {
            Some(Ok(id)) => {
                ids.insert(id);
            }
            _ => warn!(path = ?path, "Skipping catalog row without a valid id"),
        }
    }
    Ok(ids)
}

fn dir_has_entries(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[async_trait]
impl CatalogStore for FsCatalogStore {
    async fn find_container_by_path(&self, path: &Path) -> StoreResult<Option<Container>> {
        let inner = self.lock()?;
        Ok(inner
            .state
            .containers
            .iter()
            .find(|c| c.covers(path))
            .cloned())
    }

    async fn list_top_level_containers(&self) -> StoreResult<Vec<Container>> {
        Ok(self.lock()?.state.containers.clone())
    }

    async fn create_container(&self, spec: ContainerSpec) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if inner.state.pending.iter().any(|p| p.options.paths == spec.options.paths) {
            debug!(name = %spec.name, "Library creation already pending");
            return Ok(());
        }
        info!(name = %spec.name, paths = ?spec.options.paths, "Library creation requested");
        inner.state.pending.push(spec);
        self.save_state(&inner.state)
    }

    async fn create_entities(&self, batch: &[Entity], parent: &Container) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if !inner.state.containers.iter().any(|c| c.id == parent.id) {
            return Err(StoreError::UnknownParent(parent.id));
        }

        for kind in EntityKind::FLUSH_ORDER {
            let mut fresh: Vec<&Entity> = Vec::new();
            let mut fresh_ids = FxHashSet::default();
            for entity in batch.iter().filter(|e| e.kind() == kind) {
                let id = entity.id();
                if !inner.seen[kind.index()].contains(&id) && fresh_ids.insert(id) {
                    fresh.push(entity);
                }
            }
            if fresh.is_empty() {
                continue;
            }

            let path = items_path(&self.root, kind);
            let needs_header = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let mut writer = csv::WriterBuilder::new()
                .has_headers(needs_header)
                .from_writer(BufWriter::new(file));
            for entity in &fresh {
                writer.serialize(ItemRow::new(entity, parent.id))?;
            }
            writer.flush()?;

            debug!(
                kind = kind.as_str(),
                written = fresh.len(),
                skipped = batch.len() - fresh.len(),
                "Catalog batch stored"
            );
            inner.seen[kind.index()].extend(fresh_ids);
        }
        Ok(())
    }

    async fn trigger_validation(&self) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let pending = std::mem::take(&mut inner.state.pending);
        let mut still_pending = Vec::new();

        for spec in pending {
            let ready = !spec.options.paths.is_empty()
                && spec.options.paths.iter().all(|p| dir_has_entries(p));
            let Some(path) = spec.options.paths.first().filter(|_| ready).cloned() else {
                warn!(name = %spec.name, "Library directory missing or empty, leaving pending");
                still_pending.push(spec);
                continue;
            };

            let container = Container {
                id: container_id(&path),
                name: spec.name.clone(),
                path,
                kind: spec.kind,
                locations: spec.options.paths.clone(),
            };
            info!(name = %container.name, id = %container.id, "Library materialized");
            inner.state.containers.push(container);
        }

        inner.state.pending = still_pending;
        self.save_state(&inner.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CollectionKind, PROVIDER_KEY};
    use crate::models::{ItemMeta, Movie, ProviderRef};
    use crate::store::LibraryOptions;
    use tempfile::TempDir;

    fn movie(external_id: &str, parent: Uuid) -> Entity {
        let now = Utc::now();
        Entity::Movie(Movie {
            meta: ItemMeta {
                id: crate::identity::movie_id(external_id),
                name: format!("Movie {external_id}"),
                parent_id: parent,
                path: format!("stremio://movie/{external_id}"),
                is_virtual: true,
                provider: ProviderRef {
                    provider: PROVIDER_KEY,
                    external_id: external_id.to_string(),
                },
                created_at: now,
                modified_at: now,
            },
            original_title: String::new(),
            is_adult: false,
            production_year: Some(1999),
            runtime_minutes: Some(136),
            genres: vec!["Action".to_string(), "Sci-Fi".to_string()],
        })
    }

    async fn materialized(store: &FsCatalogStore, dir: &Path) -> Container {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("stub.txt"), b"").unwrap();
        store
            .create_container(ContainerSpec {
                name: "External Movies".to_string(),
                kind: CollectionKind::Movies,
                options: LibraryOptions::passive(dir),
            })
            .await
            .unwrap();
        store.trigger_validation().await.unwrap();
        store.find_container_by_path(dir).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn container_materializes_only_after_validation() {
        let tmp = TempDir::new().unwrap();
        let store = FsCatalogStore::open(tmp.path().join("catalog")).unwrap();
        let lib = tmp.path().join("movies");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join("stub.txt"), b"").unwrap();

        store
            .create_container(ContainerSpec {
                name: "External Movies".to_string(),
                kind: CollectionKind::Movies,
                options: LibraryOptions::passive(&lib),
            })
            .await
            .unwrap();
        assert!(store.find_container_by_path(&lib).await.unwrap().is_none());

        store.trigger_validation().await.unwrap();
        let found = store.find_container_by_path(&lib).await.unwrap().unwrap();
        assert_eq!(found.id, container_id(&lib));
        assert!(found.covers(&lib));
    }

    #[tokio::test]
    async fn empty_directory_stays_pending() {
        let tmp = TempDir::new().unwrap();
        let store = FsCatalogStore::open(tmp.path().join("catalog")).unwrap();
        let lib = tmp.path().join("shows");
        fs::create_dir_all(&lib).unwrap();

        store
            .create_container(ContainerSpec {
                name: "External Shows".to_string(),
                kind: CollectionKind::TvShows,
                options: LibraryOptions::passive(&lib),
            })
            .await
            .unwrap();
        store.trigger_validation().await.unwrap();
        assert!(store.find_container_by_path(&lib).await.unwrap().is_none());

        fs::write(lib.join("stub.txt"), b"").unwrap();
        store.trigger_validation().await.unwrap();
        assert!(store.find_container_by_path(&lib).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn repeated_ids_are_written_once() {
        let tmp = TempDir::new().unwrap();
        let store = FsCatalogStore::open(tmp.path().join("catalog")).unwrap();
        let parent = materialized(&store, &tmp.path().join("movies")).await;

        let batch = vec![movie("tt1", parent.id), movie("tt2", parent.id), movie("tt1", parent.id)];
        store.create_entities(&batch, &parent).await.unwrap();
        store.create_entities(&batch, &parent).await.unwrap();

        assert_eq!(store.item_count(EntityKind::Movie), 2);
        let content = fs::read_to_string(store.items_path(EntityKind::Movie)).unwrap();
        assert_eq!(content.trim().lines().count(), 3);
        assert!(content.lines().next().unwrap().starts_with("id,parent_id"));
        assert!(content.contains("Action|Sci-Fi"));
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("catalog");
        let lib = tmp.path().join("movies");
        {
            let store = FsCatalogStore::open(&root).unwrap();
            let parent = materialized(&store, &lib).await;
            store
                .create_entities(&[movie("tt1", parent.id)], &parent)
                .await
                .unwrap();
        }

        let store = FsCatalogStore::open(&root).unwrap();
        let parent = store.find_container_by_path(&lib).await.unwrap().unwrap();
        assert_eq!(store.item_count(EntityKind::Movie), 1);

        store
            .create_entities(&[movie("tt1", parent.id), movie("tt3", parent.id)], &parent)
            .await
            .unwrap();
        assert_eq!(store.item_count(EntityKind::Movie), 2);
        let content = fs::read_to_string(store.items_path(EntityKind::Movie)).unwrap();
        assert_eq!(content.trim().lines().count(), 3);
    }

    #[tokio::test]
    async fn lookup_ignores_path_case() {
        let tmp = TempDir::new().unwrap();
        let store = FsCatalogStore::open(tmp.path().join("catalog")).unwrap();
        let lib = tmp.path().join("Movies");
        let created = materialized(&store, &lib).await;

        let found = store
            .find_container_by_path(&tmp.path().join("movies"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn unknown_parent_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = FsCatalogStore::open(tmp.path()).unwrap();
        let ghost = Container {
            id: Uuid::nil(),
            name: "Ghost".to_string(),
            path: PathBuf::from("/nowhere"),
            kind: CollectionKind::Movies,
            locations: vec![],
        };

        let err = store
            .create_entities(&[movie("tt1", ghost.id)], &ghost)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownParent(_)));
    }

    #[tokio::test]
    async fn duplicate_creation_request_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let store = FsCatalogStore::open(tmp.path().join("catalog")).unwrap();
        let lib = tmp.path().join("movies");
        let spec = ContainerSpec {
            name: "External Movies".to_string(),
            kind: CollectionKind::Movies,
            options: LibraryOptions::passive(&lib),
        };

        store.create_container(spec.clone()).await.unwrap();
        store.create_container(spec).await.unwrap();
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join("stub.txt"), b"").unwrap();
        store.trigger_validation().await.unwrap();

        assert_eq!(store.list_top_level_containers().await.unwrap().len(), 1);
    }
}
