//! Rewriting mirror entries after an entity's key or name changes.
//!
//! Mirrors hold the key (or name) the entity had when they were written. A
//! renamed entity without an id would stop resolving from them, so entries
//! naming the previous identity are pointed at the current one, and display
//! names captured in location refs are refreshed.

use super::diff::Subject;
use super::report::SyncFailure;
use super::SyncEngine;
use crate::entity::{Entity, EntityType, Field, FieldMut, Relation};
use crate::registry::Role;
use crate::resolver::RefStyle;
use crate::store::EntityStore;

impl<S: EntityStore> SyncEngine<S> {
    /// Rewrite every entry on other documents that names `subject` by its
    /// previous identity. Does nothing unless the key or name changed.
    pub(crate) async fn rekey_mirrors(&self, subject: Subject<'_>) -> Vec<SyncFailure> {
        let mut failures = Vec::new();
        let Some(previous) = subject.previous else {
            return failures;
        };
        let current = subject.current;
        if previous.key() == current.key() && previous.name() == current.name() {
            return failures;
        }

        let mut visited: Vec<(EntityType, Field)> = Vec::new();
        for (mapping, role) in self.registry.touching(subject.entity_type()) {
            let (other_type, field, style) = match role {
                Role::Source => (mapping.target_type, mapping.target_field, mapping.target_style()),
                Role::Target => (mapping.source_type, mapping.source_field, mapping.source_style()),
            };
            if visited.contains(&(other_type, field)) {
                continue;
            }
            visited.push((other_type, field));

            let label = format!("{other_type}.{field}");
            let entities = match self.store.list(other_type).await {
                Ok(entities) => entities,
                Err(error) => {
                    tracing::warn!(error = %error, "rename: cannot list {other_type}");
                    failures.push(SyncFailure {
                        mapping: label,
                        reference: previous.key().to_string(),
                        error,
                    });
                    continue;
                }
            };

            for mut entity in entities {
                if subject.is(&entity) || !rekey_field(&mut entity, field, subject, style) {
                    continue;
                }
                let key = entity.key().to_string();
                tracing::debug!(
                    "rename: '{}' -> '{}' in {label} on '{key}'",
                    previous.key(),
                    current.key()
                );
                if let Err(error) = self.store.save(entity).await {
                    tracing::warn!(error = %error, "rename: cannot save '{key}'");
                    failures.push(SyncFailure {
                        mapping: label.clone(),
                        reference: key,
                        error,
                    });
                }
            }
        }
        failures
    }
}

/// Point entries of `field` that name only the previous identity of
/// `subject` at its current one, rendered in `style`. Refs also get their
/// captured display name refreshed. Returns whether the entity changed.
fn rekey_field(entity: &mut Entity, field: Field, subject: Subject<'_>, style: RefStyle) -> bool {
    let Some(previous) = subject.previous else {
        return false;
    };
    let current = subject.current;
    let stale = |token: &str| previous.is_referenced_by(token) && !current.is_referenced_by(token);

    let mut changed = false;
    match entity.field_mut(field) {
        Some(FieldMut::Scalar(slot)) => {
            if slot.as_deref().is_some_and(stale) {
                *slot = Some(style.render(current));
                changed = true;
            }
        }
        Some(FieldMut::List(list)) => {
            for entry in list.iter_mut() {
                if stale(entry.as_str()) {
                    *entry = style.render(current);
                    changed = true;
                }
            }
        }
        Some(FieldMut::Refs(refs)) => {
            for entity_ref in refs
                .iter_mut()
                .filter(|r| r.entity_type == current.entity_type() && subject.refers(&r.entity_id))
            {
                if stale(entity_ref.entity_id.as_str()) {
                    entity_ref.entity_id = current.key().to_string();
                    changed = true;
                }
                if entity_ref
                    .entity_name
                    .as_deref()
                    .is_some_and(|name| name != current.name())
                {
                    entity_ref.entity_name = Some(current.name().to_string());
                    changed = true;
                }
            }
        }
        Some(FieldMut::Relations(relations)) => {
            for relation in relations.iter_mut() {
                let target = match relation {
                    Relation::Plain(target) => target,
                    Relation::Typed(typed) => &mut typed.target,
                };
                if stale(target.as_str()) {
                    *target = current.key().to_string();
                    changed = true;
                }
            }
        }
        None => {}
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Character, EntityRef, Event, Location};

    #[test]
    fn test_rekey_list_entries_by_old_name() {
        let old: Entity = Character::new("Alice").into();
        let new: Entity = Character::new("Alicia").into();
        let subject = Subject::new(&new, Some(&old));
        let mut festival: Entity = Event {
            characters: vec!["alice".into(), "Bob".into()],
            ..Event::new("Festival")
        }
        .into();

        assert!(rekey_field(&mut festival, Field::Characters, subject, RefStyle::Key));
        let Entity::Event(festival) = festival else { unreachable!() };
        assert_eq!(festival.characters, vec!["Alicia".to_string(), "Bob".to_string()]);
    }

    #[test]
    fn test_refs_keep_id_and_refresh_name() {
        let old: Entity = Character::new("Alice").with_id("c-1").into();
        let new: Entity = Character::new("Alicia").with_id("c-1").into();
        let subject = Subject::new(&new, Some(&old));
        let mut village: Entity = Location {
            entity_refs: vec![
                EntityRef::new("c-1", EntityType::Character).with_name("Alice"),
                EntityRef::new("c-1", EntityType::Item).with_name("Alice"),
            ],
            ..Location::new("Village")
        }
        .into();

        assert!(rekey_field(&mut village, Field::EntityRefs, subject, RefStyle::Key));
        let refs = &village.as_location().unwrap().entity_refs;
        assert_eq!(refs[0].entity_id, "c-1");
        assert_eq!(refs[0].entity_name.as_deref(), Some("Alicia"));
        assert_eq!(refs[1].entity_name.as_deref(), Some("Alice"));

        assert!(!rekey_field(&mut village, Field::EntityRefs, subject, RefStyle::Key));
    }

    #[test]
    fn test_typed_relation_keeps_kind() {
        let old: Entity = Character::new("Alice").into();
        let new: Entity = Character::new("Alicia").into();
        let subject = Subject::new(&new, Some(&old));
        let mut bob: Entity = Character {
            relationships: vec![Relation::typed("Alice", "rival")],
            ..Character::new("Bob")
        }
        .into();

        assert!(rekey_field(&mut bob, Field::Relationships, subject, RefStyle::Key));
        let Entity::Character(bob) = bob else { unreachable!() };
        assert_eq!(bob.relationships, vec![Relation::typed("Alicia", "rival")]);
    }
}
