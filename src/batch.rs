use crate::error::IngestError;
use crate::models::{Entity, EntityKind};
use crate::store::{CatalogStore, Container};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Both library roots, resolved once per run.
#[derive(Debug, Clone)]
pub struct Libraries {
    pub movies: Container,
    pub shows: Container,
}

impl Libraries {
    /// Movies go under the movies root, everything else under the shows root.
    pub fn parent_for(&self, kind: EntityKind) -> &Container {
        match kind {
            EntityKind::Movie => &self.movies,
            EntityKind::Series | EntityKind::Season | EntityKind::Episode => &self.shows,
        }
    }
}

/// Per-kind write buffers in front of the catalog store.
///
/// A buffer that reaches `capacity` is written as one batch and cleared. Nothing
/// here retries; a failed write ends the run, and batches written before it stay
/// committed.
pub struct BatchWriter<'a, S: CatalogStore + ?Sized> {
    store: &'a S,
    libraries: &'a Libraries,
    capacity: usize,
    buffers: [Vec<Entity>; 4],
    cancel: CancellationToken,
    committed: [u64; 4],
    writes: u64,
}

impl<'a, S: CatalogStore + ?Sized> BatchWriter<'a, S> {
    pub fn new(
        store: &'a S,
        libraries: &'a Libraries,
        capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            store,
            libraries,
            capacity,
            buffers: std::array::from_fn(|_| Vec::with_capacity(capacity)),
            cancel,
            committed: [0; 4],
            writes: 0,
        }
    }

    /// Buffers `entity` and flushes its kind if that fills the buffer. Returns how
    /// many entities this call committed.
    pub async fn add(&mut self, entity: Entity) -> Result<usize, IngestError> {
        let kind = entity.kind();
        self.push(entity);
        self.flush_if_full(kind).await
    }

    /// Buffers without checking fullness. Used when several related entities must
    /// all be buffered before any flush happens.
    pub fn push(&mut self, entity: Entity) {
        self.buffers[entity.kind().index()].push(entity);
    }

    pub async fn flush_if_full(&mut self, kind: EntityKind) -> Result<usize, IngestError> {
        if self.buffers[kind.index()].len() >= self.capacity {
            self.flush(kind).await
        } else {
            Ok(0)
        }
    }

    /// Flushes every non-empty buffer, parents before children.
    pub async fn flush_all(&mut self) -> Result<usize, IngestError> {
        let mut total = 0;
        for kind in EntityKind::FLUSH_ORDER {
            if !self.buffers[kind.index()].is_empty() {
                total += self.flush(kind).await?;
            }
        }
        Ok(total)
    }

    async fn flush(&mut self, kind: EntityKind) -> Result<usize, IngestError> {
        if self.cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        let batch = std::mem::take(&mut self.buffers[kind.index()]);
        let parent = self.libraries.parent_for(kind);
        self.store
            .create_entities(&batch, parent)
            .await
            .map_err(IngestError::StoreWriteFailure)?;

        self.writes += 1;
        self.committed[kind.index()] += batch.len() as u64;
        debug!(kind = kind.as_str(), count = batch.len(), "Batch committed");

        self.buffers[kind.index()] = Vec::with_capacity(self.capacity);
        Ok(batch.len())
    }

    pub fn pending(&self, kind: EntityKind) -> usize {
        self.buffers[kind.index()].len()
    }

    pub fn committed(&self, kind: EntityKind) -> u64 {
        self.committed[kind.index()]
    }

    pub fn total_committed(&self) -> u64 {
        self.committed.iter().sum()
    }

    /// Number of store write calls issued so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}
