//! The declarative table of bidirectional relationship edges.
//!
//! Each [`RelationshipMapping`] describes one logical edge between a field on
//! a source type and a field on a target type, plus the [`Transform`] that
//! translates values between the two storage shapes.

mod transform;

pub use transform::{inverse_kind, Mirror, Transform, Transformer};

use crate::entity::{EntityType, Field, FieldShape};
use crate::error::RegistryError;
use crate::resolver::RefStyle;
use std::fmt;

/// One relationship edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipMapping {
    pub source_type: EntityType,
    pub source_field: Field,
    pub target_type: EntityType,
    pub target_field: Field,
    /// Whether edits on the target side are written back to the source.
    pub bidirectional: bool,
    pub transform: Transform,
}

impl RelationshipMapping {
    /// A bidirectional edge.
    pub fn new(
        source_type: EntityType,
        source_field: Field,
        target_type: EntityType,
        target_field: Field,
        transform: Transform,
    ) -> Self {
        Self {
            source_type,
            source_field,
            target_type,
            target_field,
            bidirectional: true,
            transform,
        }
    }

    /// Make the edge one-way (target edits are not written back).
    pub fn one_way(mut self) -> Self {
        self.bidirectional = false;
        self
    }

    /// Whether the source field holds a list.
    pub fn is_array(&self) -> bool {
        !matches!(self.source_shape(), Some(FieldShape::Scalar))
    }

    pub fn source_shape(&self) -> Option<FieldShape> {
        self.source_type.field_shape(self.source_field)
    }

    pub fn target_shape(&self) -> Option<FieldShape> {
        self.target_type.field_shape(self.target_field)
    }

    /// Whether the target field is a location EntityRef table.
    pub fn targets_entity_refs(&self) -> bool {
        self.target_shape() == Some(FieldShape::Refs)
    }

    /// Whether both ends are the same field of the same type.
    pub fn is_self_mirrored(&self) -> bool {
        self.source_type == self.target_type && self.source_field == self.target_field
    }

    /// How the source field refers to its targets.
    pub fn source_style(&self) -> RefStyle {
        self.transform.source_style()
    }

    /// How the target field refers back to its sources.
    pub fn target_style(&self) -> RefStyle {
        self.transform.target_style()
    }

    fn validate(&self) -> Result<(), RegistryError> {
        let source_shape = self
            .source_shape()
            .ok_or(RegistryError::UnknownField {
                entity_type: self.source_type,
                field: self.source_field,
            })?;
        if source_shape == FieldShape::Refs {
            return Err(RegistryError::InvalidSource {
                field: self.source_field,
            });
        }
        self.target_shape().ok_or(RegistryError::UnknownField {
            entity_type: self.target_type,
            field: self.target_field,
        })?;
        Ok(())
    }
}

impl fmt::Display for RelationshipMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = if self.bidirectional { "<->" } else { "->" };
        write!(
            f,
            "{}.{} {} {}.{}",
            self.source_type, self.source_field, arrow, self.target_type, self.target_field
        )
    }
}

/// Which end of a mapping an entity sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Source,
    Target,
}

/// The full set of relationship edges the engine maintains.
#[derive(Debug, Clone)]
pub struct Registry {
    mappings: Vec<RelationshipMapping>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

impl Registry {
    /// Build a registry from a custom table, rejecting fields that do not
    /// exist on the data model.
    pub fn from_mappings(mappings: Vec<RelationshipMapping>) -> Result<Self, RegistryError> {
        for mapping in &mappings {
            mapping.validate()?;
        }
        Ok(Self { mappings })
    }

    /// The edges of the worldbuilding data model.
    pub fn standard() -> Self {
        use EntityType as T;

        let located = |source_type: EntityType,
                       source_field: Field,
                       relationship: &'static str,
                       source_stores: RefStyle| {
            RelationshipMapping::new(
                source_type,
                source_field,
                T::Location,
                Field::EntityRefs,
                Transform::LocationRef {
                    relationship,
                    source_stores,
                },
            )
        };
        let keys = |source_type: EntityType,
                    source_field: Field,
                    target_type: EntityType,
                    target_field: Field| {
            RelationshipMapping::new(source_type, source_field, target_type, target_field, Transform::KEYS)
        };

        let mappings = vec![
            // Presence at a location
            located(T::Character, Field::CurrentLocationId, "located", RefStyle::Key),
            located(T::Item, Field::CurrentLocation, "stored", RefStyle::Name),
            located(T::Event, Field::Location, "occurred", RefStyle::Name),
            located(T::Scene, Field::Location, "setting", RefStyle::Name),
            located(T::Culture, Field::LinkedLocations, "culture", RefStyle::Key),
            located(T::Economy, Field::LinkedLocations, "economy", RefStyle::Key),
            located(T::MagicSystem, Field::LinkedLocations, "magic", RefStyle::Key),
            // Events, items and characters
            keys(T::Event, Field::Characters, T::Character, Field::Events),
            keys(T::Item, Field::CurrentOwner, T::Character, Field::OwnedItems),
            keys(T::Event, Field::Items, T::Item, Field::AssociatedEvents),
            keys(T::Group, Field::Members, T::Character, Field::Groups),
            // World systems
            keys(T::Culture, Field::LinkedCharacters, T::Character, Field::Cultures),
            keys(T::Culture, Field::LinkedEvents, T::Event, Field::Cultures),
            keys(T::Economy, Field::LinkedCharacters, T::Character, Field::Economies),
            keys(T::Economy, Field::LinkedItems, T::Item, Field::Economies),
            keys(T::MagicSystem, Field::LinkedCharacters, T::Character, Field::MagicSystems),
            keys(T::MagicSystem, Field::LinkedEvents, T::Event, Field::MagicSystems),
            keys(T::MagicSystem, Field::LinkedItems, T::Item, Field::MagicSystems),
            // Structure
            keys(T::Location, Field::ParentLocationId, T::Location, Field::ChildLocationIds),
            keys(T::Scene, Field::ChapterId, T::Chapter, Field::SceneIds),
            RelationshipMapping::new(
                T::Character,
                Field::Relationships,
                T::Character,
                Field::Relationships,
                Transform::Relation,
            ),
        ];

        Self { mappings }
    }

    pub fn mappings(&self) -> &[RelationshipMapping] {
        &self.mappings
    }

    /// Mappings whose source end is `entity_type`.
    pub fn as_source(&self, entity_type: EntityType) -> impl Iterator<Item = &RelationshipMapping> {
        self.mappings
            .iter()
            .filter(move |m| m.source_type == entity_type)
    }

    /// Bidirectional mappings whose target end is `entity_type`.
    pub fn as_target(&self, entity_type: EntityType) -> impl Iterator<Item = &RelationshipMapping> {
        self.mappings
            .iter()
            .filter(move |m| m.bidirectional && m.target_type == entity_type)
    }

    /// Every (mapping, role) pair in which `entity_type` takes part and whose
    /// opposite end may reference it.
    pub fn touching(
        &self,
        entity_type: EntityType,
    ) -> impl Iterator<Item = (&RelationshipMapping, Role)> {
        self.mappings.iter().flat_map(move |m| {
            let as_source = (m.source_type == entity_type).then_some((m, Role::Source));
            let as_target =
                (m.bidirectional && m.target_type == entity_type).then_some((m, Role::Target));
            as_source.into_iter().chain(as_target)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_is_valid() {
        let standard = Registry::standard();
        let rebuilt = Registry::from_mappings(standard.mappings().to_vec()).unwrap();
        assert_eq!(rebuilt.mappings().len(), 21);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let bad = RelationshipMapping::new(
            EntityType::Chapter,
            Field::CurrentOwner,
            EntityType::Character,
            Field::OwnedItems,
            Transform::KEYS,
        );
        assert!(matches!(
            Registry::from_mappings(vec![bad]),
            Err(RegistryError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_refs_cannot_be_source() {
        let bad = RelationshipMapping::new(
            EntityType::Location,
            Field::EntityRefs,
            EntityType::Character,
            Field::CurrentLocationId,
            Transform::KEYS,
        );
        assert!(matches!(
            Registry::from_mappings(vec![bad]),
            Err(RegistryError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_lookups() {
        let registry = Registry::standard();
        let location_targets: Vec<_> = registry.as_target(EntityType::Location).collect();
        // Seven presence edges plus the parent/child edge
        assert_eq!(location_targets.len(), 8);
        assert!(registry
            .as_source(EntityType::Chapter)
            .next()
            .is_none());

        let character_roles: Vec<_> = registry.touching(EntityType::Character).collect();
        assert!(character_roles
            .iter()
            .any(|(m, role)| m.source_field == Field::Relationships && *role == Role::Source));
        assert!(character_roles
            .iter()
            .any(|(m, role)| m.source_field == Field::Relationships && *role == Role::Target));
    }

    #[test]
    fn test_is_array() {
        let registry = Registry::standard();
        let current = &registry.mappings()[0];
        assert!(!current.is_array());
        assert!(current.targets_entity_refs());
        assert!(registry.mappings().last().unwrap().is_self_mirrored());
        assert_eq!(current.to_string(), "character.currentLocationId <-> location.entityRefs");
    }
}
