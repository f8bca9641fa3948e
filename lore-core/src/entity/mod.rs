//! Worldbuilding entities and typed access to their relationship fields.
//!
//! Every entity is a separately saved document. Relationship-bearing fields
//! are addressed through [`Field`] rather than by string lookups, and each
//! entity struct declares which fields it carries and in what shape.

mod refs;
mod types;

pub use refs::{EntityRef, Relation, TypedRelation};
pub use types::{
    Chapter, Character, Culture, Economy, Event, Group, Item, Location, MagicSystem, Relational,
    Scene,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Compare two identifier strings the way every relationship field does:
/// trimmed and case-insensitive.
pub fn tokens_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    !a.is_empty() && a.to_lowercase() == b.to_lowercase()
}

/// Trim a raw identifier, mapping blank values to `None`.
pub fn clean_token(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// The kinds of documents tracked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Character,
    Location,
    Event,
    Item,
    Group,
    Culture,
    Economy,
    MagicSystem,
    Scene,
    Chapter,
}

impl EntityType {
    /// Every entity type, in a stable order.
    pub const ALL: [EntityType; 10] = [
        EntityType::Character,
        EntityType::Location,
        EntityType::Event,
        EntityType::Item,
        EntityType::Group,
        EntityType::Culture,
        EntityType::Economy,
        EntityType::MagicSystem,
        EntityType::Scene,
        EntityType::Chapter,
    ];

    /// The snake_case name used in logs, refs and store paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Character => "character",
            EntityType::Location => "location",
            EntityType::Event => "event",
            EntityType::Item => "item",
            EntityType::Group => "group",
            EntityType::Culture => "culture",
            EntityType::Economy => "economy",
            EntityType::MagicSystem => "magic_system",
            EntityType::Scene => "scene",
            EntityType::Chapter => "chapter",
        }
    }

    /// Relationship fields carried by this type.
    pub fn fields(&self) -> &'static [Field] {
        match self {
            EntityType::Character => Character::FIELDS,
            EntityType::Location => Location::FIELDS,
            EntityType::Event => Event::FIELDS,
            EntityType::Item => Item::FIELDS,
            EntityType::Group => Group::FIELDS,
            EntityType::Culture => Culture::FIELDS,
            EntityType::Economy => Economy::FIELDS,
            EntityType::MagicSystem => MagicSystem::FIELDS,
            EntityType::Scene => Scene::FIELDS,
            EntityType::Chapter => Chapter::FIELDS,
        }
    }

    /// Whether this type carries `field`.
    pub fn has_field(&self, field: Field) -> bool {
        self.fields().contains(&field)
    }

    /// Storage shape of `field` on this type.
    pub fn field_shape(&self, field: Field) -> Option<FieldShape> {
        Entity::blank(*self).field(field).map(|view| view.shape())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every relationship-bearing field across all entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CurrentLocationId,
    Events,
    OwnedItems,
    Groups,
    Cultures,
    Economies,
    MagicSystems,
    Relationships,
    ParentLocationId,
    ChildLocationIds,
    EntityRefs,
    Location,
    Characters,
    Items,
    CurrentLocation,
    CurrentOwner,
    AssociatedEvents,
    Members,
    LinkedLocations,
    LinkedCharacters,
    LinkedEvents,
    LinkedItems,
    ChapterId,
    SceneIds,
}

impl Field {
    /// The document-level (camelCase) field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::CurrentLocationId => "currentLocationId",
            Field::Events => "events",
            Field::OwnedItems => "ownedItems",
            Field::Groups => "groups",
            Field::Cultures => "cultures",
            Field::Economies => "economies",
            Field::MagicSystems => "magicSystems",
            Field::Relationships => "relationships",
            Field::ParentLocationId => "parentLocationId",
            Field::ChildLocationIds => "childLocationIds",
            Field::EntityRefs => "entityRefs",
            Field::Location => "location",
            Field::Characters => "characters",
            Field::Items => "items",
            Field::CurrentLocation => "currentLocation",
            Field::CurrentOwner => "currentOwner",
            Field::AssociatedEvents => "associatedEvents",
            Field::Members => "members",
            Field::LinkedLocations => "linkedLocations",
            Field::LinkedCharacters => "linkedCharacters",
            Field::LinkedEvents => "linkedEvents",
            Field::LinkedItems => "linkedItems",
            Field::ChapterId => "chapterId",
            Field::SceneIds => "sceneIds",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The storage shape of a relationship field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// A single optional reference.
    Scalar,
    /// An ordered list of references.
    List,
    /// A location's EntityRef table.
    Refs,
    /// A character's relationship list.
    Relations,
}

/// Read access to a relationship field.
#[derive(Debug, Clone, Copy)]
pub enum FieldView<'a> {
    Scalar(Option<&'a str>),
    List(&'a [String]),
    Refs(&'a [EntityRef]),
    Relations(&'a [Relation]),
}

impl<'a> FieldView<'a> {
    pub fn shape(&self) -> FieldShape {
        match self {
            FieldView::Scalar(_) => FieldShape::Scalar,
            FieldView::List(_) => FieldShape::List,
            FieldView::Refs(_) => FieldShape::Refs,
            FieldView::Relations(_) => FieldShape::Relations,
        }
    }

    /// The field's comparable tokens: trimmed, blanks dropped, relations
    /// unwrapped to their target and refs to their entity id.
    pub fn tokens(&self) -> Vec<&'a str> {
        match *self {
            FieldView::Scalar(value) => value.and_then(clean_token).into_iter().collect(),
            FieldView::List(values) => values.iter().filter_map(|v| clean_token(v)).collect(),
            FieldView::Refs(refs) => refs
                .iter()
                .filter_map(|r| clean_token(&r.entity_id))
                .collect(),
            FieldView::Relations(relations) => relations
                .iter()
                .filter_map(|r| clean_token(r.target()))
                .collect(),
        }
    }
}

/// Write access to a relationship field.
#[derive(Debug)]
pub enum FieldMut<'a> {
    Scalar(&'a mut Option<String>),
    List(&'a mut Vec<String>),
    Refs(&'a mut Vec<EntityRef>),
    Relations(&'a mut Vec<Relation>),
}

macro_rules! dispatch {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            Entity::Character($inner) => $body,
            Entity::Location($inner) => $body,
            Entity::Event($inner) => $body,
            Entity::Item($inner) => $body,
            Entity::Group($inner) => $body,
            Entity::Culture($inner) => $body,
            Entity::Economy($inner) => $body,
            Entity::MagicSystem($inner) => $body,
            Entity::Scene($inner) => $body,
            Entity::Chapter($inner) => $body,
        }
    };
}

/// Any worldbuilding document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entity {
    Character(Character),
    Location(Location),
    Event(Event),
    Item(Item),
    Group(Group),
    Culture(Culture),
    Economy(Economy),
    MagicSystem(MagicSystem),
    Scene(Scene),
    Chapter(Chapter),
}

impl Entity {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Entity::Character(_) => EntityType::Character,
            Entity::Location(_) => EntityType::Location,
            Entity::Event(_) => EntityType::Event,
            Entity::Item(_) => EntityType::Item,
            Entity::Group(_) => EntityType::Group,
            Entity::Culture(_) => EntityType::Culture,
            Entity::Economy(_) => EntityType::Economy,
            Entity::MagicSystem(_) => EntityType::MagicSystem,
            Entity::Scene(_) => EntityType::Scene,
            Entity::Chapter(_) => EntityType::Chapter,
        }
    }

    /// The generated id, if any (blank ids count as absent).
    pub fn id(&self) -> Option<&str> {
        dispatch!(self, e => e.id.as_deref().and_then(clean_token))
    }

    pub fn name(&self) -> &str {
        dispatch!(self, e => e.name.trim())
    }

    /// The de facto key: the id when present, otherwise the name.
    pub fn key(&self) -> &str {
        self.id().unwrap_or_else(|| self.name())
    }

    /// Read a relationship field. `None` if this type does not carry it.
    pub fn field(&self, field: Field) -> Option<FieldView<'_>> {
        dispatch!(self, e => e.field(field))
    }

    /// Mutate a relationship field. `None` if this type does not carry it.
    pub fn field_mut(&mut self, field: Field) -> Option<FieldMut<'_>> {
        dispatch!(self, e => e.field_mut(field))
    }

    /// Whether two documents are the same entity: ids match, or, when either
    /// lacks an id, their names match.
    pub fn is_same(&self, other: &Entity) -> bool {
        if self.entity_type() != other.entity_type() {
            return false;
        }
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => tokens_match(self.name(), other.name()),
        }
    }

    /// Whether `token` refers to this entity by id or by name.
    pub fn is_referenced_by(&self, token: &str) -> bool {
        self.id().is_some_and(|id| tokens_match(id, token)) || tokens_match(self.name(), token)
    }

    /// An unnamed document of `entity_type` with every field empty.
    pub fn blank(entity_type: EntityType) -> Entity {
        match entity_type {
            EntityType::Character => Character::default().into(),
            EntityType::Location => Location::default().into(),
            EntityType::Event => Event::default().into(),
            EntityType::Item => Item::default().into(),
            EntityType::Group => Group::default().into(),
            EntityType::Culture => Culture::default().into(),
            EntityType::Economy => Economy::default().into(),
            EntityType::MagicSystem => MagicSystem::default().into(),
            EntityType::Scene => Scene::default().into(),
            EntityType::Chapter => Chapter::default().into(),
        }
    }

    /// Borrow the inner location, if this is one.
    pub fn as_location(&self) -> Option<&Location> {
        match self {
            Entity::Location(location) => Some(location),
            _ => None,
        }
    }

    /// Mutably borrow the inner location, if this is one.
    pub fn as_location_mut(&mut self) -> Option<&mut Location> {
        match self {
            Entity::Location(location) => Some(location),
            _ => None,
        }
    }
}

macro_rules! entity_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Entity::$variant(value)
                }
            }
        )*
    };
}

entity_from!(Character, Location, Event, Item, Group, Culture, Economy, MagicSystem, Scene, Chapter);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefers_id() {
        let with_id: Entity = Character::new("Alice").with_id("c-1").into();
        let without_id: Entity = Character::new("  Bob ").into();
        assert_eq!(with_id.key(), "c-1");
        assert_eq!(without_id.key(), "Bob");
    }

    #[test]
    fn test_blank_id_falls_back_to_name() {
        let entity: Entity = Location::new("Harbor").with_id("   ").into();
        assert_eq!(entity.id(), None);
        assert_eq!(entity.key(), "Harbor");
    }

    #[test]
    fn test_is_same() {
        let a: Entity = Character::new("Alice").with_id("c-1").into();
        let renamed: Entity = Character::new("Alicia").with_id("c-1").into();
        let other_id: Entity = Character::new("Alice").with_id("c-2").into();
        let no_id: Entity = Character::new(" alice").into();

        assert!(a.is_same(&renamed));
        assert!(!a.is_same(&other_id));
        assert!(a.is_same(&no_id));
    }

    #[test]
    fn test_different_types_never_same() {
        let character: Entity = Character::new("Ash").into();
        let item: Entity = Item::new("Ash").into();
        assert!(!character.is_same(&item));
    }

    #[test]
    fn test_field_tokens() {
        let event: Entity = Event {
            characters: vec!["Bob".into(), "  ".into(), " Alice ".into()],
            ..Event::new("Festival")
        }
        .into();
        let view = event.field(Field::Characters).unwrap();
        assert_eq!(view.shape(), FieldShape::List);
        assert_eq!(view.tokens(), vec!["Bob", "Alice"]);
        assert!(event.field(Field::EntityRefs).is_none());
    }

    #[test]
    fn test_tagged_serialization() {
        let entity: Entity = MagicSystem::new("Weaving").into();
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["type"], "magic_system");
        assert_eq!(json["name"], "Weaving");
    }

    #[test]
    fn test_every_type_declares_fields() {
        for entity_type in EntityType::ALL {
            assert!(!entity_type.fields().is_empty(), "{entity_type} has no fields");
        }
        assert!(EntityType::Location.has_field(Field::EntityRefs));
        assert!(!EntityType::Character.has_field(Field::EntityRefs));
    }
}
