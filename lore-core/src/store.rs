//! The persistence collaborator consumed by the sync engine.
//!
//! The engine never owns documents; it lists them by type and writes back the
//! ones it changed. Hosts implement [`EntityStore`] over whatever storage they
//! use. [`MemoryStore`] is an in-process implementation for tests and
//! embedders that keep documents in memory.

use crate::entity::{Entity, EntityType};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Who initiated a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOrigin {
    /// An ordinary edit saved by the host. The host runs sync afterwards.
    Host,
    /// A mirror-edge write made by the sync engine. The host must not
    /// re-invoke sync for it.
    Propagated,
}

impl WriteOrigin {
    /// Whether the host should skip its post-save sync hook.
    pub fn skip_sync(&self) -> bool {
        matches!(self, WriteOrigin::Propagated)
    }
}

/// List/save access to every document type.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Every persisted document of `entity_type`, fully populated.
    async fn list(&self, entity_type: EntityType) -> StoreResult<Vec<Entity>>;

    /// Persist one document, replacing the stored document it is the same
    /// entity as, or adding it.
    async fn save(&self, entity: Entity, origin: WriteOrigin) -> StoreResult<()>;
}

#[async_trait]
impl<T: EntityStore + ?Sized> EntityStore for Arc<T> {
    async fn list(&self, entity_type: EntityType) -> StoreResult<Vec<Entity>> {
        (**self).list(entity_type).await
    }

    async fn save(&self, entity: Entity, origin: WriteOrigin) -> StoreResult<()> {
        (**self).save(entity, origin).await
    }
}

/// A recorded write.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub entity_type: EntityType,
    pub key: String,
    pub origin: WriteOrigin,
}

/// An in-memory [`EntityStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: RwLock<HashMap<EntityType, Vec<Entity>>>,
    writes: RwLock<Vec<WriteRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entities`, without recording writes.
    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let mut by_type: HashMap<EntityType, Vec<Entity>> = HashMap::new();
        for entity in entities {
            by_type.entry(entity.entity_type()).or_default().push(entity);
        }
        Self {
            entities: RwLock::new(by_type),
            writes: RwLock::new(Vec::new()),
        }
    }

    /// Find a stored document by id or name.
    pub async fn get(&self, entity_type: EntityType, key: &str) -> Option<Entity> {
        let entities = self.entities.read().await;
        entities
            .get(&entity_type)?
            .iter()
            .find(|e| e.is_referenced_by(key))
            .cloned()
    }

    /// Remove a stored document. Returns the removed document.
    pub async fn remove(&self, entity_type: EntityType, key: &str) -> StoreResult<Entity> {
        let mut entities = self.entities.write().await;
        let list = entities.entry(entity_type).or_default();
        let index = list
            .iter()
            .position(|e| e.is_referenced_by(key))
            .ok_or_else(|| StoreError::NotFound {
                entity_type,
                key: key.to_string(),
            })?;
        Ok(list.remove(index))
    }

    /// Every write made so far, in order.
    pub async fn writes(&self) -> Vec<WriteRecord> {
        self.writes.read().await.clone()
    }

    /// Forget recorded writes.
    pub async fn clear_writes(&self) {
        self.writes.write().await.clear();
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn list(&self, entity_type: EntityType) -> StoreResult<Vec<Entity>> {
        let entities = self.entities.read().await;
        Ok(entities.get(&entity_type).cloned().unwrap_or_default())
    }

    async fn save(&self, entity: Entity, origin: WriteOrigin) -> StoreResult<()> {
        let record = WriteRecord {
            entity_type: entity.entity_type(),
            key: entity.key().to_string(),
            origin,
        };

        {
            let mut entities = self.entities.write().await;
            let list = entities.entry(entity.entity_type()).or_default();
            match list.iter_mut().find(|existing| existing.is_same(&entity)) {
                Some(existing) => *existing = entity,
                None => list.push(entity),
            }
        }

        self.writes.write().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Character, Location};

    #[tokio::test]
    async fn test_save_replaces_same_entity() {
        let store = MemoryStore::new();
        store
            .save(Character::new("Alice").with_id("c-1").into(), WriteOrigin::Host)
            .await
            .unwrap();
        store
            .save(Character::new("Alicia").with_id("c-1").into(), WriteOrigin::Propagated)
            .await
            .unwrap();

        let characters = store.list(EntityType::Character).await.unwrap();
        assert_eq!(characters.len(), 1);
        assert_eq!(characters[0].name(), "Alicia");

        let writes = store.writes().await;
        assert_eq!(writes.len(), 2);
        assert!(writes[1].origin.skip_sync());
    }

    #[tokio::test]
    async fn test_get_and_remove() {
        let store = MemoryStore::with_entities([Location::new("Harbor").with_id("l-1").into()]);
        assert!(store.get(EntityType::Location, "harbor").await.is_some());

        store.remove(EntityType::Location, "l-1").await.unwrap();
        assert!(store.get(EntityType::Location, "l-1").await.is_none());
        assert!(matches!(
            store.remove(EntityType::Location, "l-1").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_seeding_records_no_writes() {
        let store = MemoryStore::with_entities([Character::new("Bob").into()]);
        assert!(store.writes().await.is_empty());
    }
}
