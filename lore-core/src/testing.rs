//! Testing utilities.
//!
//! [`TestWorld`] pairs a [`MemoryStore`] with a [`SyncEngine`] and plays the
//! host's part: every save persists the document and then runs sync against
//! the previous version, and every delete runs the cascade first.

use crate::entity::{
    Chapter, Character, Culture, Economy, Entity, EntityType, Event, Group, Item, Location,
    MagicSystem, Scene,
};
use crate::error::StoreResult;
use crate::store::{EntityStore, MemoryStore, WriteOrigin};
use crate::sync::{CascadeReport, SyncEngine, SyncReport};
use crate::SyncConfig;
use std::sync::Arc;

/// An in-memory world with a sync engine attached.
pub struct TestWorld {
    store: Arc<MemoryStore>,
    engine: SyncEngine<Arc<MemoryStore>>,
}

macro_rules! typed_getter {
    ($($method:ident => $variant:ident),* $(,)?) => {
        $(
            #[doc = concat!("The stored ", stringify!($method), " `key` refers to.")]
            pub async fn $method(&self, key: &str) -> Option<$variant> {
                match self.store.get(EntityType::$variant, key).await? {
                    Entity::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        )*
    };
}

impl TestWorld {
    /// Seed a world. Seeding does not run sync.
    pub fn new(entities: impl IntoIterator<Item = Entity>) -> Self {
        Self::with_config(entities, SyncConfig::default())
    }

    pub fn with_config(entities: impl IntoIterator<Item = Entity>, config: SyncConfig) -> Self {
        let store = Arc::new(MemoryStore::with_entities(entities));
        let engine = SyncEngine::new(Arc::clone(&store)).with_config(config);
        Self { store, engine }
    }

    pub fn engine(&self) -> &SyncEngine<Arc<MemoryStore>> {
        &self.engine
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Save as the host does: persist, then sync against the stored version.
    pub async fn save(&self, entity: impl Into<Entity>) -> StoreResult<SyncReport> {
        let entity = entity.into();
        let previous = self
            .store
            .list(entity.entity_type())
            .await?
            .into_iter()
            .find(|stored| stored.is_same(&entity));
        self.store.save(entity.clone(), WriteOrigin::Host).await?;
        Ok(self.engine.sync_entity(&entity, previous.as_ref()).await)
    }

    /// Save `entity` in place of the stored document `key` refers to, as the
    /// host does when a document is renamed.
    pub async fn replace(&self, key: &str, entity: impl Into<Entity>) -> StoreResult<SyncReport> {
        let entity = entity.into();
        let previous = self.store.remove(entity.entity_type(), key).await?;
        self.store.save(entity.clone(), WriteOrigin::Host).await?;
        Ok(self.engine.sync_entity(&entity, Some(&previous)).await)
    }

    /// Delete as the host does: cascade, then remove the document.
    pub async fn delete(&self, entity_type: EntityType, key: &str) -> StoreResult<CascadeReport> {
        let report = self.engine.handle_deletion(entity_type, key).await;
        self.store.remove(entity_type, key).await?;
        Ok(report)
    }

    /// Whether the location `location` holds a ref to `entity_id`.
    pub async fn holds(&self, location: &str, entity_type: EntityType, entity_id: &str) -> bool {
        self.location(location)
            .await
            .is_some_and(|l| l.holds(entity_type, entity_id))
    }

    typed_getter!(
        character => Character,
        location => Location,
        event => Event,
        item => Item,
        group => Group,
        culture => Culture,
        economy => Economy,
        magic_system => MagicSystem,
        scene => Scene,
        chapter => Chapter,
    );
}
