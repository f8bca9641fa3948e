//! Reference cleanup when an entity is deleted.

use super::report::{CascadeReport, SyncFailure};
use super::SyncEngine;
use crate::entity::{tokens_match, Entity, EntityType, Field, FieldMut};
use crate::registry::Role;
use crate::store::EntityStore;

impl<S: EntityStore> SyncEngine<S> {
    /// Strip every reference to a deleted entity from every other document.
    ///
    /// Call before removing the document so its name can still be looked
    /// up; after removal only `id` is matched. Never fails: each document
    /// that cannot be cleaned is reported and skipped.
    pub async fn handle_deletion(&self, entity_type: EntityType, id: &str) -> CascadeReport {
        let writes_before = self.store.write_count();
        let mut failures = Vec::new();

        let deleted = match self.store.list(entity_type).await {
            Ok(entities) => entities.into_iter().find(|e| e.is_referenced_by(id)),
            Err(error) => {
                tracing::warn!(error = %error, "cannot look up deleted {entity_type} '{id}'");
                None
            }
        };

        let mut candidates = vec![id.trim().to_string()];
        if let Some(entity) = &deleted {
            candidates.push(entity.name().to_string());
            candidates.extend(entity.id().map(str::to_string));
        }
        let mut identifiers: Vec<String> = Vec::new();
        for candidate in candidates {
            if !candidate.is_empty() && !identifiers.iter().any(|i| tokens_match(i, &candidate)) {
                identifiers.push(candidate);
            }
        }

        let mut visited: Vec<(EntityType, Field)> = Vec::new();
        for (mapping, role) in self.registry.touching(entity_type) {
            if mapping.is_self_mirrored() {
                continue;
            }
            let other = match role {
                Role::Source => (mapping.target_type, mapping.target_field),
                Role::Target => (mapping.source_type, mapping.source_field),
            };
            if visited.contains(&other) {
                continue;
            }
            visited.push(other);
            self.strip_references(entity_type, &identifiers, deleted.as_ref(), other, &mut failures)
                .await;
        }

        if entity_type == EntityType::Character {
            self.remove_character_from_relationships(&identifiers, deleted.as_ref(), &mut failures)
                .await;
        }

        // Copies a deleted location pushed up its ancestor chain
        if let Some(location) = deleted.as_ref().filter(|_| self.config.propagate_hierarchy) {
            self.retract_deleted_location(location, &mut failures).await;
        }

        let report = CascadeReport {
            entity_type,
            key: id.to_string(),
            entities_updated: self.store.write_count() - writes_before,
            failures,
        };
        tracing::info!(
            entity_type = %entity_type,
            id,
            updated = report.entities_updated,
            failures = report.failures.len(),
            "deletion cascade complete"
        );
        report
    }

    /// Remove references matching `identifiers` from `field` on every
    /// document of `other_type`.
    async fn strip_references(
        &self,
        deleted_type: EntityType,
        identifiers: &[String],
        deleted: Option<&Entity>,
        (other_type, field): (EntityType, Field),
        failures: &mut Vec<SyncFailure>,
    ) {
        let label = format!("{other_type}.{field}");
        let entities = match self.store.list(other_type).await {
            Ok(entities) => entities,
            Err(error) => {
                tracing::warn!(error = %error, "cascade: cannot list {other_type}");
                failures.push(SyncFailure {
                    mapping: label,
                    reference: identifiers.join(", "),
                    error,
                });
                return;
            }
        };

        for mut entity in entities {
            if is_deleted(&entity, deleted_type, identifiers, deleted) {
                continue;
            }
            if !strip_identifiers(&mut entity, field, deleted_type, identifiers) {
                continue;
            }
            let key = entity.key().to_string();
            tracing::debug!("cascade: cleared {label} on '{key}'");
            if let Err(error) = self.store.save(entity).await {
                tracing::warn!(error = %error, "cascade: cannot save '{key}'");
                failures.push(SyncFailure {
                    mapping: label.clone(),
                    reference: key,
                    error,
                });
            }
        }
    }

    /// Remove a deleted character from every other character's relationship
    /// list, whether stored as a bare name or a typed record.
    pub(crate) async fn remove_character_from_relationships(
        &self,
        identifiers: &[String],
        deleted: Option<&Entity>,
        failures: &mut Vec<SyncFailure>,
    ) {
        self.strip_references(
            EntityType::Character,
            identifiers,
            deleted,
            (EntityType::Character, Field::Relationships),
            failures,
        )
        .await;
    }

    async fn retract_deleted_location(&self, deleted: &Entity, failures: &mut Vec<SyncFailure>) {
        let Some(location) = deleted.as_location() else {
            return;
        };
        let parent = location.parent();
        for entity_ref in &location.entity_refs {
            if let Err(error) = self.retract_from(parent, deleted, entity_ref).await {
                tracing::warn!(error = %error, "cascade: retraction of '{}' failed", entity_ref.entity_id);
                failures.push(SyncFailure {
                    mapping: "location hierarchy".to_string(),
                    reference: entity_ref.entity_id.clone(),
                    error,
                });
            }
        }
    }
}

fn is_deleted(
    entity: &Entity,
    deleted_type: EntityType,
    identifiers: &[String],
    deleted: Option<&Entity>,
) -> bool {
    match deleted {
        Some(deleted) => deleted.is_same(entity),
        None => {
            entity.entity_type() == deleted_type
                && identifiers.iter().any(|i| entity.is_referenced_by(i))
        }
    }
}

/// Drop every entry of `field` naming one of `identifiers`. Returns whether
/// the document changed.
fn strip_identifiers(
    entity: &mut Entity,
    field: Field,
    deleted_type: EntityType,
    identifiers: &[String],
) -> bool {
    let matches = |token: &str| identifiers.iter().any(|i| tokens_match(i, token));
    match entity.field_mut(field) {
        Some(FieldMut::Scalar(slot)) => {
            let matched = slot.as_deref().is_some_and(matches);
            if matched {
                *slot = None;
            }
            matched
        }
        Some(FieldMut::List(list)) => {
            let before = list.len();
            list.retain(|entry| !matches(entry));
            list.len() != before
        }
        Some(FieldMut::Refs(refs)) => {
            let before = refs.len();
            refs.retain(|r| {
                !(r.entity_type == deleted_type && identifiers.iter().any(|i| r.points_at(i)))
            });
            refs.len() != before
        }
        Some(FieldMut::Relations(relations)) => {
            let before = relations.len();
            relations.retain(|r| !matches(r.target()));
            relations.len() != before
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Character, EntityRef, Event, Location, Relation};

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_strip_list_and_relations() {
        let mut festival: Entity = Event {
            characters: ids(&["Bob", "Alice", "bob "]),
            ..Event::new("Festival")
        }
        .into();
        assert!(strip_identifiers(&mut festival, Field::Characters, EntityType::Character, &ids(&["Bob"])));
        let Entity::Event(festival) = festival else { unreachable!() };
        assert_eq!(festival.characters, ids(&["Alice"]));

        let mut carol: Entity = Character {
            relationships: vec![Relation::typed("c-bob", "rival"), Relation::from("Dana")],
            ..Character::new("Carol")
        }
        .into();
        assert!(strip_identifiers(
            &mut carol,
            Field::Relationships,
            EntityType::Character,
            &ids(&["Bob", "c-bob"])
        ));
        assert!(!strip_identifiers(
            &mut carol,
            Field::Relationships,
            EntityType::Character,
            &ids(&["Bob", "c-bob"])
        ));
    }

    #[test]
    fn test_strip_refs_respects_type() {
        let mut harbor: Entity = Location {
            entity_refs: vec![
                EntityRef::new("Bob", EntityType::Character),
                EntityRef::new("Bob", EntityType::Item),
            ],
            ..Location::new("Harbor")
        }
        .into();
        assert!(strip_identifiers(&mut harbor, Field::EntityRefs, EntityType::Character, &ids(&["bob"])));
        assert_eq!(harbor.as_location().unwrap().entity_refs.len(), 1);
    }
}
