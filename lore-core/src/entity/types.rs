//! The ten document types and the relationship fields each one carries.

use super::{EntityRef, EntityType, Field, FieldMut, FieldView, Relation};
use serde::{Deserialize, Serialize};

/// Typed access to the relationship fields of one document type.
pub trait Relational {
    /// The type tag of this document.
    const ENTITY_TYPE: EntityType;

    /// Relationship fields this type carries.
    const FIELDS: &'static [Field];

    /// Read a relationship field.
    fn field(&self, field: Field) -> Option<FieldView<'_>>;

    /// Mutate a relationship field.
    fn field_mut(&mut self, field: Field) -> Option<FieldMut<'_>>;
}

/// Declare the relationship fields of a document struct, generating its
/// [`Relational`] impl plus the `new`/`with_id` constructors.
macro_rules! relationship_fields {
    (@view Scalar, $value:expr) => { FieldView::Scalar($value.as_deref()) };
    (@view List, $value:expr) => { FieldView::List(&$value) };
    (@view Refs, $value:expr) => { FieldView::Refs(&$value) };
    (@view Relations, $value:expr) => { FieldView::Relations(&$value) };
    (@mut Scalar, $value:expr) => { FieldMut::Scalar(&mut $value) };
    (@mut List, $value:expr) => { FieldMut::List(&mut $value) };
    (@mut Refs, $value:expr) => { FieldMut::Refs(&mut $value) };
    (@mut Relations, $value:expr) => { FieldMut::Relations(&mut $value) };

    ($ty:ident, $entity_type:ident, { $($variant:ident => $member:ident : $shape:ident),+ $(,)? }) => {
        impl $ty {
            /// Create a document with the given name and no relationships.
            pub fn new(name: impl Into<String>) -> Self {
                Self {
                    name: name.into(),
                    ..Default::default()
                }
            }

            /// Set the id.
            pub fn with_id(mut self, id: impl Into<String>) -> Self {
                self.id = Some(id.into());
                self
            }

            /// Assign a freshly generated id.
            pub fn with_generated_id(mut self) -> Self {
                self.id = Some(uuid::Uuid::new_v4().to_string());
                self
            }
        }

        impl Relational for $ty {
            const ENTITY_TYPE: EntityType = EntityType::$entity_type;
            const FIELDS: &'static [Field] = &[$(Field::$variant),+];

            fn field(&self, field: Field) -> Option<FieldView<'_>> {
                match field {
                    $(Field::$variant => Some(relationship_fields!(@view $shape, self.$member)),)+
                    _ => None,
                }
            }

            fn field_mut(&mut self, field: Field) -> Option<FieldMut<'_>> {
                match field {
                    $(Field::$variant => Some(relationship_fields!(@mut $shape, self.$member)),)+
                    _ => None,
                }
            }
        }
    };
}

/// A person in the world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Key of the location the character is at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_location_id: Option<String>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub owned_items: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub cultures: Vec<String>,
    #[serde(default)]
    pub economies: Vec<String>,
    #[serde(default)]
    pub magic_systems: Vec<String>,
    /// Links to other characters, bare or typed.
    #[serde(default)]
    pub relationships: Vec<Relation>,
}

relationship_fields!(Character, Character, {
    CurrentLocationId => current_location_id: Scalar,
    Events => events: List,
    OwnedItems => owned_items: List,
    Groups => groups: List,
    Cultures => cultures: List,
    Economies => economies: List,
    MagicSystems => magic_systems: List,
    Relationships => relationships: Relations,
});

/// A place. Locations form a tree through `parent_location_id` and
/// aggregate everything present in their subtree in `entity_refs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_location_id: Option<String>,
    #[serde(default)]
    pub child_location_ids: Vec<String>,
    #[serde(default)]
    pub entity_refs: Vec<EntityRef>,
}

relationship_fields!(Location, Location, {
    ParentLocationId => parent_location_id: Scalar,
    ChildLocationIds => child_location_ids: List,
    EntityRefs => entity_refs: Refs,
});

impl Location {
    /// The stored parent reference, trimmed, if set.
    pub fn parent(&self) -> Option<&str> {
        self.parent_location_id
            .as_deref()
            .and_then(super::clean_token)
    }

    /// Whether an EntityRef for `entity_id` of `entity_type` is present.
    pub fn holds(&self, entity_type: EntityType, entity_id: &str) -> bool {
        self.entity_refs
            .iter()
            .any(|r| r.entity_type == entity_type && super::tokens_match(&r.entity_id, entity_id))
    }
}

/// Something that happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// Name of the location where the event took place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub cultures: Vec<String>,
    #[serde(default)]
    pub magic_systems: Vec<String>,
}

relationship_fields!(Event, Event, {
    Location => location: Scalar,
    Characters => characters: List,
    Items => items: List,
    Cultures => cultures: List,
    MagicSystems => magic_systems: List,
});

/// A notable object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Name of the location where the item is kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_location: Option<String>,
    /// Key of the owning character.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_owner: Option<String>,
    #[serde(default)]
    pub associated_events: Vec<String>,
    #[serde(default)]
    pub economies: Vec<String>,
    #[serde(default)]
    pub magic_systems: Vec<String>,
}

relationship_fields!(Item, Item, {
    CurrentLocation => current_location: Scalar,
    CurrentOwner => current_owner: Scalar,
    AssociatedEvents => associated_events: List,
    Economies => economies: List,
    MagicSystems => magic_systems: List,
});

/// A faction or organization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

relationship_fields!(Group, Group, {
    Members => members: List,
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Culture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub linked_locations: Vec<String>,
    #[serde(default)]
    pub linked_characters: Vec<String>,
    #[serde(default)]
    pub linked_events: Vec<String>,
}

relationship_fields!(Culture, Culture, {
    LinkedLocations => linked_locations: List,
    LinkedCharacters => linked_characters: List,
    LinkedEvents => linked_events: List,
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Economy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub linked_locations: Vec<String>,
    #[serde(default)]
    pub linked_characters: Vec<String>,
    #[serde(default)]
    pub linked_items: Vec<String>,
}

relationship_fields!(Economy, Economy, {
    LinkedLocations => linked_locations: List,
    LinkedCharacters => linked_characters: List,
    LinkedItems => linked_items: List,
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicSystem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub linked_locations: Vec<String>,
    #[serde(default)]
    pub linked_characters: Vec<String>,
    #[serde(default)]
    pub linked_events: Vec<String>,
    #[serde(default)]
    pub linked_items: Vec<String>,
}

relationship_fields!(MagicSystem, MagicSystem, {
    LinkedLocations => linked_locations: List,
    LinkedCharacters => linked_characters: List,
    LinkedEvents => linked_events: List,
    LinkedItems => linked_items: List,
});

/// A manuscript scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Name of the location the scene is set in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<String>,
}

relationship_fields!(Scene, Scene, {
    Location => location: Scalar,
    ChapterId => chapter_id: Scalar,
});

/// A manuscript chapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    #[serde(default)]
    pub scene_ids: Vec<String>,
}

relationship_fields!(Chapter, Chapter, {
    SceneIds => scene_ids: List,
});
