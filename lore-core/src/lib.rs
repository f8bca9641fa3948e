//! Relationship consistency engine for worldbuilding documents.
//!
//! Characters, locations, events, items, groups, cultures, economies, magic
//! systems, scenes and chapters are saved as independent documents that
//! reference each other. This crate keeps both ends of every relationship in
//! step:
//!
//! - a declarative [`Registry`] of bidirectional edges
//! - tiered entity resolution by id or name ([`Resolver`])
//! - diff-and-apply sync on every save, with location ancestor propagation
//! - a deletion cascade that strips dangling references
//!
//! Storage stays with the host, behind [`EntityStore`].
//!
//! # Quick Start
//!
//! ```ignore
//! use lore_core::{Character, EntityStore, MemoryStore, SyncEngine, WriteOrigin};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = SyncEngine::new(MemoryStore::new());
//!
//!     let alice = Character {
//!         current_location_id: Some("loc-1".into()),
//!         ..Character::new("Alice")
//!     }
//!     .into();
//!     engine.store().save(alice.clone(), WriteOrigin::Host).await?;
//!
//!     let report = engine.sync_entity(&alice, None).await;
//!     println!("{} mirror writes", report.writes);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod persist;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod sync;
pub mod testing;

// Primary public API
pub use config::SyncConfig;
pub use entity::{
    Chapter, Character, Culture, Economy, Entity, EntityRef, EntityType, Event, Field, Group,
    Item, Location, MagicSystem, Relation, Scene,
};
pub use error::{ConfigError, RegistryError, StoreError, SyncError};
pub use persist::JsonDirStore;
pub use registry::{Registry, RelationshipMapping, Transform};
pub use resolver::{RefStyle, Resolver};
pub use store::{EntityStore, MemoryStore, WriteOrigin};
pub use sync::{CascadeReport, Inconsistency, SyncEngine, SyncReport};
pub use testing::TestWorld;
