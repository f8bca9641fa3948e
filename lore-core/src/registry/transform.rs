//! Edge handlers translating a relationship value between the storage shape
//! of the source field and that of the target field.

use crate::entity::{tokens_match, Entity, EntityRef, Field, FieldView, Relation, TypedRelation};
use crate::resolver::RefStyle;

/// The value written into a target field to mirror one source edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Mirror {
    /// A plain id or name string.
    Key(String),
    /// A typed location ref.
    Ref(EntityRef),
    /// A character relationship entry.
    Relation(Relation),
}

/// Converts relationship values across the two ends of an edge.
pub trait Transformer {
    /// The mirror entry the target field should hold for `value` taken from
    /// `source`'s field.
    fn to_target(&self, value: &str, source: &Entity) -> Mirror;

    /// What `source`'s field should store to point at `target`, given the
    /// target-side token that named the source.
    fn to_source(&self, target_value: &str, target: &Entity) -> String;

    /// How the source field refers to its targets.
    fn source_style(&self) -> RefStyle;

    /// How the target field refers back to its sources.
    fn target_style(&self) -> RefStyle;
}

/// The edge kinds used by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Both sides store plain strings.
    Key {
        /// How the source field names the target.
        source_stores: RefStyle,
        /// How the target field names the source.
        target_stores: RefStyle,
    },
    /// The target is a location's EntityRef table.
    LocationRef {
        /// Label written into each ref.
        relationship: &'static str,
        /// How the source field names the location.
        source_stores: RefStyle,
    },
    /// Character-to-character relationships; kinds are mirrored through
    /// [`inverse_kind`].
    Relation,
}

impl Transform {
    /// Plain keys on both sides.
    pub const KEYS: Transform = Transform::Key {
        source_stores: RefStyle::Key,
        target_stores: RefStyle::Key,
    };
}

impl Transformer for Transform {
    fn to_target(&self, value: &str, source: &Entity) -> Mirror {
        match *self {
            Transform::Key { target_stores, .. } => Mirror::Key(target_stores.render(source)),
            Transform::LocationRef { relationship, .. } => Mirror::Ref(
                EntityRef::new(source.key(), source.entity_type())
                    .with_name(source.name())
                    .with_relationship(relationship),
            ),
            Transform::Relation => {
                let kind = match source.field(Field::Relationships) {
                    Some(FieldView::Relations(relations)) => relations
                        .iter()
                        .find(|r| tokens_match(r.target(), value))
                        .and_then(|r| r.kind()),
                    _ => None,
                };
                match kind {
                    Some(kind) => Mirror::Relation(Relation::Typed(TypedRelation {
                        target: source.key().to_string(),
                        kind: Some(inverse_kind(kind)),
                        note: None,
                    })),
                    None => Mirror::Relation(Relation::Plain(source.key().to_string())),
                }
            }
        }
    }

    fn to_source(&self, _target_value: &str, target: &Entity) -> String {
        self.source_style().render(target)
    }

    fn source_style(&self) -> RefStyle {
        match *self {
            Transform::Key { source_stores, .. } => source_stores,
            Transform::LocationRef { source_stores, .. } => source_stores,
            Transform::Relation => RefStyle::Key,
        }
    }

    fn target_style(&self) -> RefStyle {
        match *self {
            Transform::Key { target_stores, .. } => target_stores,
            Transform::LocationRef { .. } | Transform::Relation => RefStyle::Key,
        }
    }
}

/// The kind the other character records for a relationship of `kind`.
///
/// Asymmetric pairs are swapped; everything else is symmetric.
pub fn inverse_kind(kind: &str) -> String {
    const PAIRS: &[(&str, &str)] = &[
        ("parent", "child"),
        ("mentor", "student"),
        ("employer", "employee"),
        ("leader", "follower"),
        ("master", "apprentice"),
    ];

    let lower = kind.trim().to_lowercase();
    for (a, b) in PAIRS {
        if lower == *a {
            return b.to_string();
        }
        if lower == *b {
            return a.to_string();
        }
    }
    kind.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Character, EntityType, Location};

    #[test]
    fn test_location_ref_transform() {
        let alice: Entity = Character::new("Alice").into();
        let transform = Transform::LocationRef {
            relationship: "located",
            source_stores: RefStyle::Key,
        };
        let Mirror::Ref(entity_ref) = transform.to_target("loc-1", &alice) else {
            panic!("expected an EntityRef mirror");
        };
        assert_eq!(entity_ref.entity_id, "Alice");
        assert_eq!(entity_ref.entity_type, EntityType::Character);
        assert_eq!(entity_ref.relationship.as_deref(), Some("located"));
    }

    #[test]
    fn test_name_style_reverse() {
        let harbor: Entity = Location::new("Harbor").with_id("loc-2").into();
        let transform = Transform::LocationRef {
            relationship: "stored",
            source_stores: RefStyle::Name,
        };
        assert_eq!(transform.to_source("Lantern", &harbor), "Harbor");
        assert_eq!(Transform::KEYS.to_source("Lantern", &harbor), "loc-2");
    }

    #[test]
    fn test_relation_mirrors_inverse_kind() {
        let alice: Entity = Character {
            relationships: vec![Relation::typed("Bob", "Mentor"), Relation::from("Carol")],
            ..Character::new("Alice")
        }
        .into();

        assert_eq!(
            Transform::Relation.to_target("bob", &alice),
            Mirror::Relation(Relation::typed("Alice", "student"))
        );
        assert_eq!(
            Transform::Relation.to_target("Carol", &alice),
            Mirror::Relation(Relation::Plain("Alice".to_string()))
        );
    }

    #[test]
    fn test_inverse_kind() {
        assert_eq!(inverse_kind("Child"), "parent");
        assert_eq!(inverse_kind("rival"), "rival");
    }
}
