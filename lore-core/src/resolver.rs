//! Entity lookup by identifier or display name.
//!
//! Relationship fields mix generated ids, hand-typed names and case variants,
//! so lookups go through three tiers:
//!
//! 1. exact match on id or name
//! 2. trimmed, case-insensitive name (or id) match
//! 3. substring containment in either direction (optional)

use crate::entity::{clean_token, tokens_match, Entity};

/// Which identifier a reference is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefStyle {
    /// The id when the entity has one, otherwise the name.
    #[default]
    Key,
    /// Always the display name.
    Name,
}

impl RefStyle {
    /// Render `entity` the way a field of this style stores it.
    pub fn render(&self, entity: &Entity) -> String {
        match self {
            RefStyle::Key => entity.key().to_string(),
            RefStyle::Name => entity.name().to_string(),
        }
    }
}

/// Tiered entity lookup.
#[derive(Debug, Clone, Copy)]
pub struct Resolver {
    fuzzy: bool,
}

impl Default for Resolver {
    fn default() -> Self {
        Self { fuzzy: true }
    }
}

impl Resolver {
    pub fn new(fuzzy: bool) -> Self {
        Self { fuzzy }
    }

    /// Find the entity `reference` points at. Name-style references try the
    /// name before the id at each tier.
    pub fn resolve<'a>(
        &self,
        entities: &'a [Entity],
        reference: &str,
        style: RefStyle,
    ) -> Option<&'a Entity> {
        self.position(entities, reference, style)
            .map(|index| &entities[index])
    }

    /// Index of the entity `reference` points at.
    pub fn position(&self, entities: &[Entity], reference: &str, style: RefStyle) -> Option<usize> {
        let reference = clean_token(reference)?;

        let exact = |e: &Entity| match style {
            RefStyle::Key => e.id() == Some(reference) || e.name() == reference,
            RefStyle::Name => e.name() == reference || e.id() == Some(reference),
        };
        if let Some(index) = entities.iter().position(exact) {
            return Some(index);
        }

        let loose = |e: &Entity| {
            tokens_match(e.name(), reference) || e.id().is_some_and(|id| tokens_match(id, reference))
        };
        if let Some(index) = entities.iter().position(loose) {
            return Some(index);
        }

        if !self.fuzzy {
            return None;
        }

        // Last resort for minor renames ("Old Mill" vs "The Old Mill")
        let needle = reference.to_lowercase();
        entities.iter().position(|e| {
            let name = e.name().to_lowercase();
            !name.is_empty() && (name.contains(&needle) || needle.contains(&name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Location;

    fn locations() -> Vec<Entity> {
        vec![
            Location::new("The Old Mill").with_id("loc-1").into(),
            Location::new("Harbor").with_id("loc-2").into(),
            Location::new("harbor").into(),
        ]
    }

    #[test]
    fn test_exact_id_and_name() {
        let resolver = Resolver::default();
        let entities = locations();
        assert_eq!(
            resolver.resolve(&entities, "loc-2", RefStyle::Key).map(|e| e.key()),
            Some("loc-2")
        );
        // Exact name wins over the case-insensitive match earlier in the list
        assert_eq!(
            resolver.resolve(&entities, "harbor", RefStyle::Name).map(|e| e.key()),
            Some("harbor")
        );
    }

    #[test]
    fn test_case_insensitive_tier() {
        let resolver = Resolver::default();
        let entities = locations();
        let found = resolver.resolve(&entities, "  THE OLD MILL ", RefStyle::Name);
        assert_eq!(found.map(|e| e.key()), Some("loc-1"));
    }

    #[test]
    fn test_substring_tier() {
        let entities = locations();
        let found = Resolver::default().resolve(&entities, "Old Mill", RefStyle::Name);
        assert_eq!(found.map(|e| e.key()), Some("loc-1"));

        assert!(Resolver::new(false)
            .resolve(&entities, "Old Mill", RefStyle::Name)
            .is_none());
    }

    #[test]
    fn test_blank_reference_not_found() {
        assert!(Resolver::default()
            .resolve(&locations(), "  ", RefStyle::Key)
            .is_none());
    }

    #[test]
    fn test_render() {
        let entity: Entity = Location::new("Harbor").with_id("loc-2").into();
        assert_eq!(RefStyle::Key.render(&entity), "loc-2");
        assert_eq!(RefStyle::Name.render(&entity), "Harbor");
    }
}
