//! Bulk repair and audit tests.
//! Run with: `cargo test -p lore-core --test repair`

use lore_core::sync::Problem;
use lore_core::{Character, Entity, EntityType, Event, Item, Location, TestWorld};

fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An imported world: every forward edge is set, no mirror is.
fn imported() -> Vec<Entity> {
    vec![
        Location::new("Northreach").with_id("reg").into(),
        Location {
            parent_location_id: Some("reg".into()),
            ..Location::new("Brindle").with_id("town")
        }
        .into(),
        Character {
            current_location_id: Some("town".into()),
            ..Character::new("Alice")
        }
        .into(),
        Event {
            characters: vec!["Alice".into()],
            location: Some("Northreach".into()),
            ..Event::new("Festival")
        }
        .into(),
        Item {
            current_owner: Some("Alice".into()),
            ..Item::new("Sword")
        }
        .into(),
    ]
}

#[tokio::test]
async fn test_audit_finds_missing_mirrors() {
    setup();
    let world = TestWorld::new(imported());

    let found = world.engine().audit().await;

    // parent, location, event participant, event location, owner
    assert_eq!(found.len(), 5);
    assert!(found.iter().all(|i| i.problem == Problem::MissingMirror));
    assert!(world.store().writes().await.is_empty());
}

#[tokio::test]
async fn test_audit_reports_unresolved_targets() {
    setup();
    let world = TestWorld::new([Event {
        characters: vec!["Nobody".into()],
        ..Event::new("Festival")
    }
    .into()]);

    let found = world.engine().audit().await;

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].problem, Problem::UnresolvedTarget);
    assert_eq!(found[0].source, "Festival");
    assert_eq!(found[0].reference, "Nobody");
}

#[tokio::test]
async fn test_repair_restores_mirrors() {
    setup();
    let world = TestWorld::new(imported());

    let report = world.engine().repair_all().await;

    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
    assert!(report.writes > 0);
    assert!(report.mappings_processed > 0);
    // Per-entity reports add up to every write the pass made
    assert_eq!(report.writes, world.store().writes().await.len());
    assert!(world.engine().audit().await.is_empty());

    assert!(world.holds("town", EntityType::Character, "Alice").await);
    assert!(world.holds("reg", EntityType::Character, "Alice").await);
    assert!(world.holds("reg", EntityType::Event, "Festival").await);

    let alice = world.character("Alice").await.expect("alice missing");
    assert_eq!(alice.events, vec!["Festival".to_string()]);
    assert_eq!(alice.owned_items, vec!["Sword".to_string()]);
    let region = world.location("reg").await.expect("region missing");
    assert_eq!(region.child_location_ids, vec!["town".to_string()]);
}

#[tokio::test]
async fn test_repair_is_idempotent() {
    setup();
    let world = TestWorld::new(imported());
    world.engine().repair_all().await;

    let second = world.engine().repair_all().await;

    assert_eq!(second.writes, 0);
    assert!(second.is_clean());
}
