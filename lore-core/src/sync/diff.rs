//! Old/new comparison of relationship fields.

use crate::entity::{clean_token, tokens_match, Entity, EntityRef, EntityType, Field, FieldView};

/// Tokens added to and removed from a field between two saves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl TokenDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Comparable tokens of `field` on `entity`, or nothing when the entity is
/// absent or lacks the field. For EntityRef tables only refs of
/// `ref_type` are included.
pub fn field_tokens(entity: Option<&Entity>, field: Field, ref_type: Option<EntityType>) -> Vec<String> {
    let Some(view) = entity.and_then(|e| e.field(field)) else {
        return Vec::new();
    };
    match (view, ref_type) {
        (FieldView::Refs(refs), Some(ref_type)) => refs
            .iter()
            .filter(|r| r.entity_type == ref_type)
            .filter_map(|r| clean_token(&r.entity_id))
            .map(str::to_string)
            .collect(),
        _ => view.tokens().into_iter().map(str::to_string).collect(),
    }
}

/// Case-insensitive set difference in both directions, preserving the order
/// tokens first appear and dropping repeats.
pub fn diff_tokens(old: &[String], new: &[String]) -> TokenDiff {
    let contains = |haystack: &[String], token: &str| haystack.iter().any(|t| tokens_match(t, token));

    let mut diff = TokenDiff::default();
    for token in new {
        if !contains(old, token) && !contains(&diff.added, token) {
            diff.added.push(token.clone());
        }
    }
    for token in old {
        if !contains(new, token) && !contains(&diff.removed, token) {
            diff.removed.push(token.clone());
        }
    }
    diff
}

/// The change to a scalar field, or `None` when the normalized values are
/// equal (which absorbs whitespace-only and case-only edits).
pub fn scalar_change(old: &[String], new: &[String]) -> Option<(Option<String>, Option<String>)> {
    let old = old.first().cloned();
    let new = new.first().cloned();
    let unchanged = match (&old, &new) {
        (None, None) => true,
        (Some(a), Some(b)) => tokens_match(a, b),
        _ => false,
    };
    (!unchanged).then_some((old, new))
}

/// Refs present in `new` but not `old`, and in `old` but not `new`, keyed
/// by entity type and id.
pub fn diff_refs(old: &[EntityRef], new: &[EntityRef]) -> (Vec<EntityRef>, Vec<EntityRef>) {
    let added = new
        .iter()
        .filter(|r| !old.iter().any(|o| o.same_entity(r)))
        .cloned()
        .collect();
    let removed = old
        .iter()
        .filter(|r| !new.iter().any(|n| n.same_entity(r)))
        .cloned()
        .collect();
    (added, removed)
}

/// An entity being synced, with its previous version for matching entries
/// written under an old name.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub current: &'a Entity,
    pub previous: Option<&'a Entity>,
}

impl<'a> Subject<'a> {
    pub fn new(current: &'a Entity, previous: Option<&'a Entity>) -> Self {
        // A previous version of a different type is not this entity
        let previous = previous.filter(|p| p.entity_type() == current.entity_type());
        Self { current, previous }
    }

    pub fn entity_type(&self) -> EntityType {
        self.current.entity_type()
    }

    /// Whether `token` names this entity, now or before the edit.
    pub fn refers(&self, token: &str) -> bool {
        self.current.is_referenced_by(token)
            || self.previous.is_some_and(|p| p.is_referenced_by(token))
    }

    /// Whether `other` is this entity.
    pub fn is(&self, other: &Entity) -> bool {
        self.current.is_same(other) || self.previous.is_some_and(|p| p.is_same(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Character, Location};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_diff_is_case_insensitive() {
        let diff = diff_tokens(&strings(&["Alice", "Bob"]), &strings(&["alice", "Carol", "carol"]));
        assert_eq!(diff.added, strings(&["Carol"]));
        assert_eq!(diff.removed, strings(&["Bob"]));
    }

    #[test]
    fn test_identical_lists_produce_empty_diff() {
        let values = strings(&["Alice", "Bob"]);
        assert!(diff_tokens(&values, &values).is_empty());
    }

    #[test]
    fn test_scalar_change() {
        assert_eq!(scalar_change(&strings(&["loc-1"]), &strings(&["LOC-1"])), None);
        assert_eq!(
            scalar_change(&strings(&["loc-1"]), &[]),
            Some((Some("loc-1".to_string()), None))
        );
        assert_eq!(scalar_change(&[], &[]), None);
    }

    #[test]
    fn test_field_tokens_trims_and_filters_refs() {
        let location: Entity = Location {
            entity_refs: vec![
                EntityRef::new(" Finn ", EntityType::Character),
                EntityRef::new("Lantern", EntityType::Item),
            ],
            ..Location::new("Village")
        }
        .into();
        assert_eq!(
            field_tokens(Some(&location), Field::EntityRefs, Some(EntityType::Character)),
            strings(&["Finn"])
        );
        assert!(field_tokens(None, Field::EntityRefs, None).is_empty());
    }

    #[test]
    fn test_diff_refs() {
        let finn = EntityRef::new("Finn", EntityType::Character);
        let lantern = EntityRef::new("Lantern", EntityType::Item);
        let (added, removed) = diff_refs(&[finn.clone()], &[lantern.clone()]);
        assert_eq!(added, vec![lantern]);
        assert_eq!(removed, vec![finn]);
    }

    #[test]
    fn test_subject_matches_previous_name() {
        let old: Entity = Character::new("Alicia").into();
        let new: Entity = Character::new("Alice").into();
        let subject = Subject::new(&new, Some(&old));
        assert!(subject.refers("alicia"));
        assert!(subject.refers("Alice"));
        assert!(!subject.refers("Bob"));
    }
}
