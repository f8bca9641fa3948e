//! Store access for engine-initiated reads and writes.

use crate::entity::{Entity, EntityType};
use crate::error::SyncResult;
use crate::store::{EntityStore, WriteOrigin};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Wraps the host store so every engine write carries the skip-sync marker.
#[derive(Debug)]
pub struct SaveCoordinator<S> {
    store: S,
    writes: AtomicUsize,
}

impl<S: EntityStore> SaveCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fresh listing of every document of `entity_type`.
    pub async fn list(&self, entity_type: EntityType) -> SyncResult<Vec<Entity>> {
        Ok(self.store.list(entity_type).await?)
    }

    /// Persist a mirror-edge write.
    pub async fn save(&self, entity: Entity) -> SyncResult<()> {
        tracing::debug!("writing {} '{}'", entity.entity_type(), entity.key());
        self.store.save(entity, WriteOrigin::Propagated).await?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Number of writes made through this coordinator.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}
