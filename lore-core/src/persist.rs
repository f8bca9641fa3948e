//! A directory-of-JSON-documents store.
//!
//! Each entity is one pretty-printed JSON file at
//! `<root>/<entity_type>/<slug>.json`, mirroring how the editor keeps one
//! document per entity.

use crate::entity::{Entity, EntityType};
use crate::error::{StoreError, StoreResult};
use crate::store::{EntityStore, WriteOrigin};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// An [`EntityStore`] backed by JSON files on disk.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Use `root` as the store directory. Nothing is created until the first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn type_dir(&self, entity_type: EntityType) -> PathBuf {
        self.root.join(entity_type.as_str())
    }

    /// Every document of `entity_type` along with the file it lives in.
    async fn load_all(&self, entity_type: EntityType) -> StoreResult<Vec<(PathBuf, Entity)>> {
        let dir = self.type_dir(entity_type);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut documents = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let content = fs::read_to_string(&path).await?;
                let entity: Entity = serde_json::from_str(&content)?;
                if entity.entity_type() != entity_type {
                    return Err(StoreError::Backend(format!(
                        "{} holds a {} document",
                        path.display(),
                        entity.entity_type()
                    )));
                }
                documents.push((path, entity));
            }
        }

        // Stable listing order regardless of directory iteration order
        documents.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(documents)
    }

    /// Delete the document `key` refers to.
    pub async fn delete(&self, entity_type: EntityType, key: &str) -> StoreResult<()> {
        let documents = self.load_all(entity_type).await?;
        let (path, _) = documents
            .into_iter()
            .find(|(_, entity)| entity.is_referenced_by(key))
            .ok_or_else(|| StoreError::NotFound {
                entity_type,
                key: key.to_string(),
            })?;
        fs::remove_file(path).await?;
        Ok(())
    }

    fn fresh_path(&self, entity: &Entity, taken: &[PathBuf]) -> PathBuf {
        let dir = self.type_dir(entity.entity_type());
        let slug = slug(entity.key());
        let mut candidate = dir.join(format!("{slug}.json"));
        let mut suffix = 2;
        while taken.contains(&candidate) {
            candidate = dir.join(format!("{slug}_{suffix}.json"));
            suffix += 1;
        }
        candidate
    }
}

#[async_trait]
impl EntityStore for JsonDirStore {
    async fn list(&self, entity_type: EntityType) -> StoreResult<Vec<Entity>> {
        Ok(self
            .load_all(entity_type)
            .await?
            .into_iter()
            .map(|(_, entity)| entity)
            .collect())
    }

    async fn save(&self, entity: Entity, origin: WriteOrigin) -> StoreResult<()> {
        let documents = self.load_all(entity.entity_type()).await?;
        let path = match documents.iter().find(|(_, stored)| stored.is_same(&entity)) {
            Some((path, _)) => path.clone(),
            None => {
                let taken: Vec<PathBuf> = documents.into_iter().map(|(path, _)| path).collect();
                self.fresh_path(&entity, &taken)
            }
        };

        fs::create_dir_all(self.type_dir(entity.entity_type())).await?;
        let content = serde_json::to_string_pretty(&entity)?;
        fs::write(&path, content).await?;
        tracing::debug!(
            path = %path.display(),
            propagated = origin.skip_sync(),
            "saved {} '{}'",
            entity.entity_type(),
            entity.key()
        );
        Ok(())
    }
}

/// File-name-safe form of an entity key.
fn slug(key: &str) -> String {
    let slug: String = key
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if slug.is_empty() {
        "unnamed".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slug("The Old Mill"), "the_old_mill");
        assert_eq!(slug("   "), "unnamed");
        assert_eq!(slug("loc-1"), "loc_1");
    }
}
