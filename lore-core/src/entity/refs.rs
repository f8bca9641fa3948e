//! Reference records stored inside relationship fields.

use super::{tokens_match, EntityType};
use serde::{Deserialize, Serialize};

/// A typed reverse link stored on a location.
///
/// Locations keep one `EntityRef` for every entity present "here", whatever
/// its type. Ancestors of a location hold copies of their descendants' refs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    /// Key (id, or name when the entity has no id) of the referenced entity.
    pub entity_id: String,
    /// Type of the referenced entity.
    pub entity_type: EntityType,
    /// Display name captured when the ref was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    /// Free-form label such as "located" or "stored".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

impl EntityRef {
    /// Create a ref with no name or relationship label.
    pub fn new(entity_id: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_type,
            entity_name: None,
            relationship: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.entity_name = Some(name.into());
        self
    }

    /// Set the relationship label.
    pub fn with_relationship(mut self, relationship: impl Into<String>) -> Self {
        self.relationship = Some(relationship.into());
        self
    }

    /// Whether this ref points at `token` (by id or captured name).
    pub fn points_at(&self, token: &str) -> bool {
        tokens_match(&self.entity_id, token)
            || self
                .entity_name
                .as_deref()
                .is_some_and(|name| tokens_match(name, token))
    }

    /// Whether two refs describe the same entity.
    pub fn same_entity(&self, other: &EntityRef) -> bool {
        self.entity_type == other.entity_type && tokens_match(&self.entity_id, &other.entity_id)
    }
}

/// A typed character-to-character relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedRelation {
    /// Key of the related character.
    pub target: String,
    /// Kind of relationship ("sibling", "rival", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One entry of a character's relationship list.
///
/// Older documents store bare names; newer ones store typed records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Relation {
    /// A bare character key.
    Plain(String),
    /// A typed relationship record.
    Typed(TypedRelation),
}

impl Relation {
    /// Create a typed relation.
    pub fn typed(target: impl Into<String>, kind: impl Into<String>) -> Self {
        Relation::Typed(TypedRelation {
            target: target.into(),
            kind: Some(kind.into()),
            note: None,
        })
    }

    /// The character key this entry points at.
    pub fn target(&self) -> &str {
        match self {
            Relation::Plain(target) => target,
            Relation::Typed(typed) => &typed.target,
        }
    }

    /// The relationship kind, if typed.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Relation::Plain(_) => None,
            Relation::Typed(typed) => typed.kind.as_deref(),
        }
    }
}

impl From<&str> for Relation {
    fn from(target: &str) -> Self {
        Relation::Plain(target.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref_camel_case() {
        let entity_ref = EntityRef::new("c-1", EntityType::Character)
            .with_name("Alice")
            .with_relationship("located");
        let json = serde_json::to_value(&entity_ref).unwrap();
        assert_eq!(json["entityId"], "c-1");
        assert_eq!(json["entityType"], "character");
        assert_eq!(json["entityName"], "Alice");
    }

    #[test]
    fn test_points_at_name_or_id() {
        let entity_ref = EntityRef::new("c-1", EntityType::Character).with_name("Alice");
        assert!(entity_ref.points_at("C-1"));
        assert!(entity_ref.points_at(" alice "));
        assert!(!entity_ref.points_at("Bob"));
    }

    #[test]
    fn test_relation_untagged() {
        let relations: Vec<Relation> =
            serde_json::from_str(r#"["Bob", {"target": "Carol", "kind": "rival"}]"#).unwrap();
        assert_eq!(relations[0].target(), "Bob");
        assert_eq!(relations[0].kind(), None);
        assert_eq!(relations[1].target(), "Carol");
        assert_eq!(relations[1].kind(), Some("rival"));
    }
}
