use crate::config::{LibrarySpec, SEED_FILE_NAME};
use crate::error::IngestError;
use crate::store::{CatalogStore, Container, ContainerSpec, LibraryOptions};
use async_trait::async_trait;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Time source for the materialization poll. Tests swap in a virtual clock so a
/// 60 second timeout costs nothing.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Makes sure library containers exist before items are parented to them.
pub struct Provisioner<'a, S: ?Sized, C: ?Sized> {
    store: &'a S,
    clock: &'a C,
    poll_interval: Duration,
    timeout: Duration,
}

impl<'a, S, C> Provisioner<'a, S, C>
where
    S: CatalogStore + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(store: &'a S, clock: &'a C, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            store,
            clock,
            poll_interval,
            timeout,
        }
    }

    /// Returns the materialized container for `library.path`, creating the
    /// library if no existing one covers the path.
    ///
    /// Creation is asynchronous on the store side, so after requesting it and
    /// triggering a rescan this polls by path until the container appears or the
    /// timeout runs out. At most `timeout / poll_interval` lookups are issued.
    pub async fn ensure_container(&self, library: &LibrarySpec) -> Result<Container, IngestError> {
        let path = library.path.as_path();
        seed_directory(path).await?;

        let existing = self
            .store
            .list_top_level_containers()
            .await
            .map_err(IngestError::Store)?;
        for container in &existing {
            debug!(name = %container.name, kind = ?container.kind, "Existing library");
        }

        if !existing.iter().any(|c| c.covers(path)) {
            info!(path = ?path, name = %library.name, "No library covers path, creating one");
            self.store
                .create_container(ContainerSpec {
                    name: library.name.clone(),
                    kind: library.kind,
                    options: LibraryOptions::passive(path),
                })
                .await
                .map_err(IngestError::Store)?;
        }

        info!(path = ?path, "Validating catalog to materialize library");
        self.store
            .trigger_validation()
            .await
            .map_err(IngestError::Store)?;

        self.wait_for(path).await
    }

    async fn wait_for(&self, path: &Path) -> Result<Container, IngestError> {
        let max_polls = self.max_polls();
        let deadline = self.clock.now() + self.timeout;

        for poll in 1..=max_polls {
            if let Some(container) = self
                .store
                .find_container_by_path(path)
                .await
                .map_err(IngestError::Store)?
            {
                info!(
                    path = ?path,
                    name = %container.name,
                    id = %container.id,
                    polls = poll,
                    "Resolved library container"
                );
                return Ok(container);
            }

            if poll == max_polls || self.clock.now() + self.poll_interval > deadline {
                break;
            }
            self.clock.sleep(self.poll_interval).await;
        }

        Err(IngestError::ContainerNotMaterialized {
            path: path.to_path_buf(),
            timeout: self.timeout,
        })
    }

    fn max_polls(&self) -> u32 {
        if self.poll_interval.is_zero() {
            return 1;
        }
        let polls = self.timeout.as_millis() / self.poll_interval.as_millis().max(1);
        u32::try_from(polls).unwrap_or(u32::MAX).max(1)
    }
}

/// The store's scan ignores empty directories, so drop a placeholder in.
async fn seed_directory(path: &Path) -> Result<(), IngestError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| IngestError::io(path, e))?;

    let seed = path.join(SEED_FILE_NAME);
    if !seed.exists() {
        tokio::fs::write(&seed, b"")
            .await
            .map_err(|e| IngestError::io(&seed, e))?;
        debug!(path = ?seed, "Seeded library directory");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionKind;
    use crate::error::StoreError;
    use crate::models::Entity;
    use crate::store::StoreResult;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use uuid::Uuid;

    /// Advances virtual time on sleep instead of waiting.
    struct FakeClock {
        start: Instant,
        elapsed: Mutex<Duration>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                start: Instant::now(),
                elapsed: Mutex::new(Duration::ZERO),
            }
        }

        fn elapsed(&self) -> Duration {
            *self.elapsed.lock().unwrap()
        }
    }

    #[async_trait]
    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.start + self.elapsed()
        }

        async fn sleep(&self, duration: Duration) {
            *self.elapsed.lock().unwrap() += duration;
        }
    }

    /// Materializes a requested container after `appear_after` lookups, or never.
    struct SlowStore {
        existing: Vec<Container>,
        appear_after: Option<u32>,
        lookups: AtomicU32,
        created: Mutex<Vec<ContainerSpec>>,
        validations: AtomicU32,
    }

    impl SlowStore {
        fn new(appear_after: Option<u32>) -> Self {
            Self {
                existing: Vec::new(),
                appear_after,
                lookups: AtomicU32::new(0),
                created: Mutex::new(Vec::new()),
                validations: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl CatalogStore for SlowStore {
        async fn find_container_by_path(&self, path: &Path) -> StoreResult<Option<Container>> {
            let n = self.lookups.fetch_add(1, Ordering::SeqCst) + 1;
            match self.appear_after {
                Some(after) if n >= after => Ok(Some(Container {
                    id: Uuid::from_u128(7),
                    name: "External Movies".to_string(),
                    path: path.to_path_buf(),
                    kind: CollectionKind::Movies,
                    locations: vec![path.to_path_buf()],
                })),
                _ => Ok(None),
            }
        }

        async fn list_top_level_containers(&self) -> StoreResult<Vec<Container>> {
            Ok(self.existing.clone())
        }

        async fn create_container(&self, spec: ContainerSpec) -> StoreResult<()> {
            self.created.lock().unwrap().push(spec);
            Ok(())
        }

        async fn create_entities(&self, _batch: &[Entity], _parent: &Container) -> StoreResult<()> {
            Err(StoreError::Backend("not used".to_string()))
        }

        async fn trigger_validation(&self) -> StoreResult<()> {
            self.validations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn library(dir: &TempDir) -> LibrarySpec {
        LibrarySpec {
            path: dir.path().join("movies"),
            name: "External Movies".to_string(),
            kind: CollectionKind::Movies,
        }
    }

    fn provisioner<'a>(store: &'a SlowStore, clock: &'a FakeClock) -> Provisioner<'a, SlowStore, FakeClock> {
        Provisioner::new(store, clock, Duration::from_secs(1), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn creates_missing_library_and_waits_for_it() {
        let dir = TempDir::new().unwrap();
        let store = SlowStore::new(Some(3));
        let clock = FakeClock::new();
        let lib = library(&dir);

        let container = provisioner(&store, &clock).ensure_container(&lib).await.unwrap();
        assert_eq!(container.path, lib.path);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 3);
        assert_eq!(clock.elapsed(), Duration::from_secs(2));
        assert_eq!(store.validations.load(Ordering::SeqCst), 1);

        let created = store.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "External Movies");
        assert!(!created[0].options.enable_realtime_monitor);
        assert!(!created[0].options.save_local_metadata);
        assert!(!created[0].options.enable_internet_providers);
    }

    #[tokio::test]
    async fn seeds_placeholder_file() {
        let dir = TempDir::new().unwrap();
        let store = SlowStore::new(Some(1));
        let clock = FakeClock::new();
        let lib = library(&dir);

        provisioner(&store, &clock).ensure_container(&lib).await.unwrap();
        assert!(lib.path.join(SEED_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn existing_library_is_not_recreated() {
        let dir = TempDir::new().unwrap();
        let lib = library(&dir);
        let mut store = SlowStore::new(Some(1));
        store.existing.push(Container {
            id: Uuid::from_u128(9),
            name: "Movies".to_string(),
            path: PathBuf::from("/elsewhere"),
            kind: CollectionKind::Movies,
            locations: vec![lib.path.clone()],
        });
        let clock = FakeClock::new();

        provisioner(&store, &clock).ensure_container(&lib).await.unwrap();
        assert!(store.created.lock().unwrap().is_empty());
        assert_eq!(store.validations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn never_materializing_times_out_within_poll_budget() {
        let dir = TempDir::new().unwrap();
        let store = SlowStore::new(None);
        let clock = FakeClock::new();

        let err = provisioner(&store, &clock)
            .ensure_container(&library(&dir))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "ContainerNotMaterialized");
        let lookups = store.lookups.load(Ordering::SeqCst);
        assert!(lookups <= 60, "issued {lookups} polls");
        assert!(lookups >= 59, "gave up after {lookups} polls");
        assert!(clock.elapsed() <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn short_timeout_polls_once() {
        let dir = TempDir::new().unwrap();
        let store = SlowStore::new(None);
        let clock = FakeClock::new();
        let p = Provisioner::new(&store, &clock, Duration::from_secs(5), Duration::from_secs(1));

        assert!(p.ensure_container(&library(&dir)).await.is_err());
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }
}
