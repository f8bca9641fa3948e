//! Applying one mapping's diff: forward from the source field onto targets,
//! and in reverse from a target field back onto sources.

use super::diff::{diff_tokens, field_tokens, scalar_change, Subject};
use super::report::SyncFailure;
use super::SyncEngine;
use crate::entity::{
    clean_token, tokens_match, Entity, EntityRef, EntityType, Field, FieldMut, Location, Relation,
};
use crate::error::{SyncError, SyncResult};
use crate::registry::{Mirror, RelationshipMapping, Transformer};
use crate::resolver::RefStyle;
use crate::store::EntityStore;
use std::collections::HashSet;

impl<S: EntityStore> SyncEngine<S> {
    /// Diff `mapping.source_field` across the edit and apply additions and
    /// removals to the targets.
    pub(crate) async fn sync_relationship(
        &self,
        mapping: &RelationshipMapping,
        subject: Subject<'_>,
    ) -> Vec<SyncFailure> {
        let old = field_tokens(subject.previous, mapping.source_field, None);
        let new = field_tokens(Some(subject.current), mapping.source_field, None);
        let mut failures = Vec::new();

        let (removed, added) = if mapping.is_array() {
            let diff = diff_tokens(&old, &new);
            (diff.removed, diff.added)
        } else {
            match scalar_change(&old, &new) {
                Some((old_value, new_value)) => (
                    old_value.into_iter().collect(),
                    new_value.into_iter().collect(),
                ),
                None => return failures,
            }
        };

        for value in &removed {
            if let Err(error) = self.remove_from_target(mapping, value, subject).await {
                self.contain(mapping, value, error, Some(subject), &mut failures)
                    .await;
            }
        }
        for value in &added {
            if let Err(error) = self.add_to_target(mapping, value, subject).await {
                self.contain(mapping, value, error, Some(subject), &mut failures)
                    .await;
            }
        }
        failures
    }

    /// Write the mirror of `value` onto the target it resolves to.
    pub(crate) async fn add_to_target(
        &self,
        mapping: &RelationshipMapping,
        value: &str,
        subject: Subject<'_>,
    ) -> SyncResult<()> {
        let mut targets = self.store.list(mapping.target_type).await?;
        let index = self.locate(&targets, mapping.target_type, value, mapping.source_style())?;
        let mut target = targets.swap_remove(index);
        if mapping.source_type == mapping.target_type && subject.is(&target) {
            tracing::debug!(mapping = %mapping, "ignoring self-reference '{value}'");
            return Ok(());
        }

        let mirror = mapping.transform.to_target(value, subject.current);
        if insert_mirror(&mut target, mapping.target_field, &mirror, subject)? {
            tracing::debug!(mapping = %mapping, "linked '{}' -> '{}'", subject.current.key(), target.key());
            self.store.save(target.clone()).await?;
        }

        if let Mirror::Ref(entity_ref) = &mirror {
            if self.config.propagate_hierarchy {
                self.propagate_up(&target, entity_ref).await?;
            }
        }
        Ok(())
    }

    /// Strip the mirror of `subject` from the target `value` resolves to.
    pub(crate) async fn remove_from_target(
        &self,
        mapping: &RelationshipMapping,
        value: &str,
        subject: Subject<'_>,
    ) -> SyncResult<()> {
        let mut targets = self.store.list(mapping.target_type).await?;
        let index = self.locate(&targets, mapping.target_type, value, mapping.source_style())?;
        let mut target = targets.swap_remove(index);
        if mapping.source_type == mapping.target_type && subject.is(&target) {
            return Ok(());
        }

        let (changed, removed_refs) = strip_mirror(&mut target, mapping.target_field, subject)?;
        if !changed {
            return Ok(());
        }
        tracing::debug!(mapping = %mapping, "unlinked '{}' -> '{}'", subject.current.key(), target.key());
        self.store.save(target.clone()).await?;

        if self.config.propagate_hierarchy {
            let parent = target.as_location().and_then(Location::parent);
            for entity_ref in &removed_refs {
                self.retract_from(parent, &target, entity_ref).await?;
            }
        }
        Ok(())
    }

    /// Reconcile a target-side edit back onto the source documents.
    pub(crate) async fn reconcile_reverse(
        &self,
        mapping: &RelationshipMapping,
        target: Subject<'_>,
    ) -> Vec<SyncFailure> {
        let ref_type = mapping
            .targets_entity_refs()
            .then_some(mapping.source_type);
        let old = field_tokens(target.previous, mapping.target_field, ref_type);
        let new = field_tokens(Some(target.current), mapping.target_field, ref_type);
        let diff = diff_tokens(&old, &new);
        let mut failures = Vec::new();

        for token in &diff.removed {
            if let Err(error) = self.detach_source(mapping, token, target).await {
                self.contain(mapping, token, error, None, &mut failures).await;
            }
        }
        for token in &diff.added {
            if let Err(error) = self.attach_source(mapping, token, target).await {
                self.contain(mapping, token, error, None, &mut failures).await;
            }
        }
        failures
    }

    /// Point the source named by `token` at `target`.
    async fn attach_source(
        &self,
        mapping: &RelationshipMapping,
        token: &str,
        target: Subject<'_>,
    ) -> SyncResult<()> {
        let mut sources = self.store.list(mapping.source_type).await?;
        let index = self.locate(&sources, mapping.source_type, token, RefStyle::Key)?;
        let mut source = sources.swap_remove(index);
        if mapping.source_type == mapping.target_type && target.is(&source) {
            return Ok(());
        }
        if mapping.targets_entity_refs() && self.is_aggregated_ref(mapping, &source, target.current).await? {
            tracing::debug!(mapping = %mapping, "'{token}' is held through a descendant, not written back");
            return Ok(());
        }

        let value = mapping.transform.to_source(token, target.current);
        let source_type = source.entity_type();
        let displaced = match source.field_mut(mapping.source_field) {
            Some(FieldMut::Scalar(slot)) => {
                if slot.as_deref().is_some_and(|current| target.refers(current)) {
                    return Ok(());
                }
                slot.replace(value)
            }
            Some(FieldMut::List(list)) => {
                if list.iter().any(|entry| target.refers(entry)) {
                    return Ok(());
                }
                list.push(value);
                None
            }
            Some(FieldMut::Relations(relations)) => {
                if relations.iter().any(|r| target.refers(r.target())) {
                    return Ok(());
                }
                relations.push(Relation::Plain(value));
                None
            }
            _ => {
                return Err(SyncError::UnsupportedField {
                    entity_type: source_type,
                    field: mapping.source_field,
                })
            }
        };

        tracing::debug!(mapping = %mapping, "back-linked '{}' -> '{}'", source.key(), target.current.key());
        self.store.save(source.clone()).await?;

        // A scalar can only point one way: drop the mirror on the old target
        let displaced = displaced.as_deref().and_then(clean_token);
        if let Some(old_value) = displaced {
            self.remove_from_target(mapping, old_value, Subject::new(&source, None))
                .await?;
        }
        if is_parent_field(mapping, source_type) {
            self.rehome(&source, displaced).await?;
        }
        Ok(())
    }

    /// Stop the source named by `token` pointing at `target`.
    async fn detach_source(
        &self,
        mapping: &RelationshipMapping,
        token: &str,
        target: Subject<'_>,
    ) -> SyncResult<()> {
        let mut sources = self.store.list(mapping.source_type).await?;
        let index = self.locate(&sources, mapping.source_type, token, RefStyle::Key)?;
        let mut source = sources.swap_remove(index);
        if mapping.source_type == mapping.target_type && target.is(&source) {
            return Ok(());
        }

        let source_type = source.entity_type();
        let (changed, old_parent) = match source.field_mut(mapping.source_field) {
            Some(FieldMut::Scalar(slot)) => {
                if slot.as_deref().is_some_and(|current| target.refers(current)) {
                    (true, slot.take())
                } else {
                    (false, None)
                }
            }
            Some(FieldMut::List(list)) => {
                let before = list.len();
                list.retain(|entry| !target.refers(entry));
                (list.len() != before, None)
            }
            Some(FieldMut::Relations(relations)) => {
                let before = relations.len();
                relations.retain(|r| !target.refers(r.target()));
                (relations.len() != before, None)
            }
            _ => {
                return Err(SyncError::UnsupportedField {
                    entity_type: source_type,
                    field: mapping.source_field,
                })
            }
        };
        if !changed {
            return Ok(());
        }

        tracing::debug!(mapping = %mapping, "detached '{}' from '{}'", source.key(), target.current.key());
        self.store.save(source.clone()).await?;
        if is_parent_field(mapping, source_type) {
            self.rehome(&source, old_parent.as_deref()).await?;
        }
        Ok(())
    }

    /// Whether a ref to `source` on `location` is an aggregated copy: the
    /// source already points at `location` or one of its descendants.
    async fn is_aggregated_ref(
        &self,
        mapping: &RelationshipMapping,
        source: &Entity,
        location: &Entity,
    ) -> SyncResult<bool> {
        let tokens = field_tokens(Some(source), mapping.source_field, None);
        if tokens.is_empty() {
            return Ok(false);
        }
        let locations = self.store.list(EntityType::Location).await?;
        Ok(tokens.iter().any(|token| {
            self.resolver
                .position(&locations, token, mapping.source_style())
                .is_some_and(|start| {
                    self.ancestry(&locations, start)
                        .into_iter()
                        .any(|i| locations[i].is_same(location))
                })
        }))
    }

    /// Remove refs to `subject` from every location it no longer points at
    /// (directly or through a descendant). Returns the number of locations
    /// cleaned.
    pub(crate) async fn sweep_stale_refs(
        &self,
        mapping: &RelationshipMapping,
        subject: Subject<'_>,
    ) -> SyncResult<usize> {
        let locations = self.store.list(EntityType::Location).await?;
        let mut keep = HashSet::new();
        for token in field_tokens(Some(subject.current), mapping.source_field, None) {
            if let Some(start) = self.resolver.position(&locations, &token, mapping.source_style()) {
                keep.extend(self.ancestry(&locations, start));
            }
        }

        let mut cleaned = 0;
        for (index, mut entity) in locations.into_iter().enumerate() {
            if keep.contains(&index) {
                continue;
            }
            let Some(location) = entity.as_location_mut() else {
                continue;
            };
            let before = location.entity_refs.len();
            location
                .entity_refs
                .retain(|r| !(r.entity_type == subject.entity_type() && subject.refers(&r.entity_id)));
            if location.entity_refs.len() != before {
                tracing::warn!(
                    "removed stale {} ref '{}' from '{}'",
                    subject.entity_type(),
                    subject.current.key(),
                    entity.key()
                );
                self.store.save(entity).await?;
                cleaned += 1;
            }
        }
        Ok(cleaned)
    }

    /// Record a contained failure. An unresolvable EntityRef target (not a
    /// missing ancestor) triggers a stale-ref sweep for the source.
    pub(crate) async fn contain(
        &self,
        mapping: &RelationshipMapping,
        reference: &str,
        error: SyncError,
        source: Option<Subject<'_>>,
        failures: &mut Vec<SyncFailure>,
    ) {
        tracing::warn!(error = %error, mapping = %mapping, "relationship '{reference}' not applied");

        let sweep = matches!(error, SyncError::TargetNotFound { .. })
            && mapping.targets_entity_refs()
            && self.config.sweep_stale_refs;
        // A dangling parent is reported against the parent, not the edge value
        let reference = match &error {
            SyncError::MissingParent { parent, .. } => parent.clone(),
            _ => reference.to_string(),
        };
        failures.push(SyncFailure {
            mapping: mapping.to_string(),
            reference,
            error,
        });

        if let (true, Some(subject)) = (sweep, source) {
            if let Err(error) = self.sweep_stale_refs(mapping, subject).await {
                tracing::warn!(error = %error, "stale ref sweep failed");
                failures.push(SyncFailure {
                    mapping: mapping.to_string(),
                    reference: subject.current.key().to_string(),
                    error,
                });
            }
        }
    }
}

fn is_parent_field(mapping: &RelationshipMapping, source_type: EntityType) -> bool {
    source_type == EntityType::Location && mapping.source_field == Field::ParentLocationId
}

/// Add `mirror` to `field` unless an entry for `subject` is already there.
/// Returns whether the target changed.
pub(crate) fn insert_mirror(
    target: &mut Entity,
    field: Field,
    mirror: &Mirror,
    subject: Subject<'_>,
) -> SyncResult<bool> {
    let entity_type = target.entity_type();
    let source_type = subject.entity_type();
    match (target.field_mut(field), mirror) {
        (Some(FieldMut::List(list)), Mirror::Key(key)) => {
            if list.iter().any(|entry| subject.refers(entry) || tokens_match(entry, key)) {
                return Ok(false);
            }
            list.push(key.clone());
            Ok(true)
        }
        (Some(FieldMut::Scalar(slot)), Mirror::Key(key)) => {
            if slot.as_deref().is_some_and(|current| subject.refers(current)) {
                return Ok(false);
            }
            *slot = Some(key.clone());
            Ok(true)
        }
        (Some(FieldMut::Refs(refs)), Mirror::Ref(entity_ref)) => {
            let present = refs.iter().any(|r| {
                r.entity_type == source_type
                    && (subject.refers(&r.entity_id) || r.same_entity(entity_ref))
            });
            if present {
                return Ok(false);
            }
            refs.push(entity_ref.clone());
            Ok(true)
        }
        (Some(FieldMut::Relations(relations)), Mirror::Relation(relation)) => {
            if relations.iter().any(|r| subject.refers(r.target())) {
                return Ok(false);
            }
            relations.push(relation.clone());
            Ok(true)
        }
        _ => Err(SyncError::UnsupportedField { entity_type, field }),
    }
}

/// Remove every entry for `subject` from `field`. Returns whether the target
/// changed, plus the EntityRefs removed.
pub(crate) fn strip_mirror(
    target: &mut Entity,
    field: Field,
    subject: Subject<'_>,
) -> SyncResult<(bool, Vec<EntityRef>)> {
    let entity_type = target.entity_type();
    let source_type = subject.entity_type();
    match target.field_mut(field) {
        Some(FieldMut::List(list)) => {
            let before = list.len();
            list.retain(|entry| !subject.refers(entry));
            Ok((list.len() != before, Vec::new()))
        }
        Some(FieldMut::Scalar(slot)) => {
            let matched = slot.as_deref().is_some_and(|current| subject.refers(current));
            if matched {
                *slot = None;
            }
            Ok((matched, Vec::new()))
        }
        Some(FieldMut::Refs(refs)) => {
            let (removed, kept): (Vec<EntityRef>, Vec<EntityRef>) = std::mem::take(refs)
                .into_iter()
                .partition(|r| r.entity_type == source_type && subject.refers(&r.entity_id));
            *refs = kept;
            Ok((!removed.is_empty(), removed))
        }
        Some(FieldMut::Relations(relations)) => {
            let before = relations.len();
            relations.retain(|r| !subject.refers(r.target()));
            Ok((relations.len() != before, Vec::new()))
        }
        None => Err(SyncError::UnsupportedField { entity_type, field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Character, Event};

    #[test]
    fn test_insert_mirror_is_idempotent() {
        let alice: Entity = Character::new("Alice").with_id("c-1").into();
        let subject = Subject::new(&alice, None);
        let mut festival: Entity = Event::new("Festival").into();

        let mirror = Mirror::Key("c-1".to_string());
        assert!(insert_mirror(&mut festival, Field::Characters, &mirror, subject).unwrap());
        assert!(!insert_mirror(&mut festival, Field::Characters, &mirror, subject).unwrap());
    }

    #[test]
    fn test_insert_mirror_matches_by_name() {
        let alice: Entity = Character::new("Alice").with_id("c-1").into();
        let subject = Subject::new(&alice, None);
        let mut festival: Entity = Event {
            characters: vec!["alice".to_string()],
            ..Event::new("Festival")
        }
        .into();

        let mirror = Mirror::Key("c-1".to_string());
        assert!(!insert_mirror(&mut festival, Field::Characters, &mirror, subject).unwrap());
    }

    #[test]
    fn test_insert_mirror_shape_mismatch() {
        let alice: Entity = Character::new("Alice").into();
        let subject = Subject::new(&alice, None);
        let mut festival: Entity = Event::new("Festival").into();
        let mirror = Mirror::Ref(EntityRef::new("Alice", EntityType::Character));
        assert!(matches!(
            insert_mirror(&mut festival, Field::Characters, &mirror, subject),
            Err(SyncError::UnsupportedField { .. })
        ));
    }

    #[test]
    fn test_strip_mirror_refs() {
        let alice: Entity = Character::new("Alice").into();
        let subject = Subject::new(&alice, None);
        let mut village: Entity = Location {
            entity_refs: vec![
                EntityRef::new("Alice", EntityType::Character),
                EntityRef::new("Alice", EntityType::Item),
            ],
            ..Location::new("Village")
        }
        .into();

        let (changed, removed) = strip_mirror(&mut village, Field::EntityRefs, subject).unwrap();
        assert!(changed);
        assert_eq!(removed.len(), 1);
        let location = village.as_location().unwrap();
        assert_eq!(location.entity_refs.len(), 1);
        assert_eq!(location.entity_refs[0].entity_type, EntityType::Item);
    }
}
