//! Location tree maintenance.
//!
//! Every EntityRef on a location is copied onto each of its ancestors.
//! Copies are pushed eagerly and retracted only once no child of the ancestor
//! still holds the ref and the referenced entity does not point at the
//! ancestor itself. All walks carry a visited set and a depth limit, so a
//! cyclic `parent_location_id` chain ends with an error instead of looping.

use super::diff::{diff_refs, field_tokens, Subject};
use super::report::SyncFailure;
use super::SyncEngine;
use crate::entity::{tokens_match, Entity, EntityRef, EntityType, Location};
use crate::error::{SyncError, SyncResult};
use crate::resolver::RefStyle;
use crate::store::EntityStore;

const HIERARCHY: &str = "location hierarchy";

impl<S: EntityStore> SyncEngine<S> {
    /// Indices of `start` and its ancestors within `locations`, nearest first.
    pub(crate) fn ancestry(&self, locations: &[Entity], start: usize) -> Vec<usize> {
        let mut chain = vec![start];
        let mut current = start;
        while chain.len() <= self.config.max_hierarchy_depth {
            let Some(parent) = locations[current].as_location().and_then(Location::parent) else {
                break;
            };
            let Some(next) = self.resolver.position(locations, parent, RefStyle::Key) else {
                break;
            };
            if chain.contains(&next) {
                break;
            }
            chain.push(next);
            current = next;
        }
        chain
    }

    /// Index of the location `parent_ref` names as the parent of `child`.
    fn locate_parent(&self, locations: &[Entity], child: &str, parent_ref: &str) -> SyncResult<usize> {
        self.resolver
            .position(locations, parent_ref, RefStyle::Key)
            .ok_or_else(|| SyncError::MissingParent {
                location: child.to_string(),
                parent: parent_ref.to_string(),
            })
    }

    /// Copy `entity_ref` onto every ancestor of `location` that lacks it.
    pub(crate) async fn propagate_up(&self, location: &Entity, entity_ref: &EntityRef) -> SyncResult<()> {
        let mut visited = vec![location.key().to_lowercase()];
        let mut child = location.key().to_string();
        let mut next = location
            .as_location()
            .and_then(Location::parent)
            .map(str::to_string);

        while let Some(parent_ref) = next.take() {
            if visited.len() > self.config.max_hierarchy_depth {
                tracing::warn!("ancestor walk from '{}' hit the depth limit", location.key());
                break;
            }
            let mut locations = self.store.list(EntityType::Location).await?;
            let index = self.locate_parent(&locations, &child, &parent_ref)?;
            let mut parent = locations.swap_remove(index);
            child = parent.key().to_string();
            let parent_key = parent.key().to_lowercase();
            if visited.contains(&parent_key) {
                return Err(SyncError::HierarchyCycle {
                    location: parent.key().to_string(),
                });
            }
            visited.push(parent_key);

            let Some(ancestor) = parent.as_location_mut() else {
                break;
            };
            next = ancestor.parent().map(str::to_string);
            if !ancestor.holds(entity_ref.entity_type, &entity_ref.entity_id) {
                ancestor.entity_refs.push(entity_ref.clone());
                tracing::debug!(
                    "propagated {} '{}' up to '{}'",
                    entity_ref.entity_type,
                    entity_ref.entity_id,
                    parent.key()
                );
                self.store.save(parent).await?;
            }
        }
        Ok(())
    }

    /// Walk up from `start`, removing `entity_ref` from each ancestor that no
    /// longer has a reason to hold it. `origin` is the location the ref left
    /// and is not counted as a holder.
    pub(crate) async fn retract_from(
        &self,
        start: Option<&str>,
        origin: &Entity,
        entity_ref: &EntityRef,
    ) -> SyncResult<()> {
        let Some(start) = start else {
            return Ok(());
        };
        let anchors = self.anchors_for(entity_ref).await?;
        let mut visited = vec![origin.key().to_lowercase()];
        let mut child = origin.key().to_string();
        let mut next = Some(start.to_string());

        while let Some(ancestor_ref) = next.take() {
            if visited.len() > self.config.max_hierarchy_depth {
                tracing::warn!("ancestor walk from '{}' hit the depth limit", origin.key());
                break;
            }
            let mut locations = self.store.list(EntityType::Location).await?;
            let index = self.locate_parent(&locations, &child, &ancestor_ref)?;
            child = locations[index].key().to_string();
            let ancestor_key = locations[index].key().to_lowercase();
            if visited.contains(&ancestor_key) {
                return Err(SyncError::HierarchyCycle {
                    location: locations[index].key().to_string(),
                });
            }
            visited.push(ancestor_key);

            if !self.should_retract(&locations, index, origin, entity_ref, &anchors) {
                break;
            }

            let mut ancestor = locations.swap_remove(index);
            let Some(location) = ancestor.as_location_mut() else {
                break;
            };
            location.entity_refs.retain(|r| !r.same_entity(entity_ref));
            next = location.parent().map(str::to_string);
            tracing::debug!(
                "retracted {} '{}' from '{}'",
                entity_ref.entity_type,
                entity_ref.entity_id,
                ancestor.key()
            );
            self.store.save(ancestor).await?;
        }
        Ok(())
    }

    fn should_retract(
        &self,
        locations: &[Entity],
        index: usize,
        origin: &Entity,
        entity_ref: &EntityRef,
        anchors: &[String],
    ) -> bool {
        let ancestor = &locations[index];
        let Some(location) = ancestor.as_location() else {
            return false;
        };
        if !location.holds(entity_ref.entity_type, &entity_ref.entity_id) {
            return false;
        }
        if anchors.iter().any(|anchor| ancestor.is_referenced_by(anchor)) {
            tracing::debug!("'{}' keeps '{}': referenced directly", ancestor.key(), entity_ref.entity_id);
            return false;
        }

        let still_held = locations.iter().enumerate().any(|(i, other)| {
            if i == index || other.is_same(origin) {
                return false;
            }
            let Some(child) = other.as_location() else {
                return false;
            };
            let listed = location
                .child_location_ids
                .iter()
                .any(|c| other.is_referenced_by(c));
            let declares = child.parent().is_some_and(|p| ancestor.is_referenced_by(p));
            (listed || declares) && child.holds(entity_ref.entity_type, &entity_ref.entity_id)
        });
        !still_held
    }

    /// Location references the entity behind `entity_ref` holds directly.
    async fn anchors_for(&self, entity_ref: &EntityRef) -> SyncResult<Vec<String>> {
        let mut anchors = Vec::new();
        for mapping in self
            .registry
            .as_source(entity_ref.entity_type)
            .filter(|m| m.targets_entity_refs())
        {
            let sources = self.store.list(mapping.source_type).await?;
            if let Some(source) = sources
                .iter()
                .find(|s| s.is_referenced_by(&entity_ref.entity_id))
            {
                anchors.extend(field_tokens(Some(source), mapping.source_field, None));
            }
        }
        Ok(anchors)
    }

    /// Move a location's refs after its parent changed from `old_parent`:
    /// retract them from the old chain and push them up the new one.
    pub(crate) async fn rehome(&self, location: &Entity, old_parent: Option<&str>) -> SyncResult<()> {
        if !self.config.propagate_hierarchy {
            return Ok(());
        }
        let Some(refs) = location.as_location().map(|l| l.entity_refs.clone()) else {
            return Ok(());
        };
        for entity_ref in &refs {
            self.retract_from(old_parent, location, entity_ref).await?;
            self.propagate_up(location, entity_ref).await?;
        }
        Ok(())
    }

    /// Hierarchy effects of a host edit to a location: direct ref edits and
    /// re-parenting.
    pub(crate) async fn sync_location_hierarchy(&self, subject: Subject<'_>) -> Vec<SyncFailure> {
        let mut failures = Vec::new();
        let Some(new) = subject.current.as_location() else {
            return failures;
        };
        let old = subject.previous.and_then(Entity::as_location);
        let old_refs = old.map(|l| l.entity_refs.as_slice()).unwrap_or(&[]);
        let (added, removed) = diff_refs(old_refs, &new.entity_refs);

        let old_parent = old.and_then(Location::parent);
        let new_parent = new.parent();
        let moved = match (old_parent, new_parent) {
            (Some(a), Some(b)) => !tokens_match(a, b),
            (None, None) => false,
            _ => true,
        };

        let retract_start = if moved { old_parent } else { new_parent };
        for entity_ref in &removed {
            if let Err(error) = self.retract_from(retract_start, subject.current, entity_ref).await {
                record(&mut failures, entity_ref, error);
            }
        }

        if moved {
            if let Err(error) = self.rehome(subject.current, old_parent).await {
                tracing::warn!(error = %error, "re-parenting '{}' failed", subject.current.key());
                failures.push(SyncFailure {
                    mapping: HIERARCHY.to_string(),
                    reference: subject.current.key().to_string(),
                    error,
                });
            }
        } else {
            for entity_ref in &added {
                if let Err(error) = self.propagate_up(subject.current, entity_ref).await {
                    record(&mut failures, entity_ref, error);
                }
            }
        }
        failures
    }

    /// Push every ref a location holds up its ancestor chain.
    pub(crate) async fn propagate_all_refs(&self, location: &Entity) -> Vec<SyncFailure> {
        let mut failures = Vec::new();
        let refs = location
            .as_location()
            .map(|l| l.entity_refs.clone())
            .unwrap_or_default();
        for entity_ref in &refs {
            if let Err(error) = self.propagate_up(location, entity_ref).await {
                record(&mut failures, entity_ref, error);
            }
        }
        failures
    }
}

fn record(failures: &mut Vec<SyncFailure>, entity_ref: &EntityRef, error: SyncError) {
    tracing::warn!(error = %error, "hierarchy update for '{}' failed", entity_ref.entity_id);
    failures.push(SyncFailure {
        mapping: HIERARCHY.to_string(),
        reference: entity_ref.entity_id.clone(),
        error,
    });
}
