//! Deletion cascade tests.
//! Run with: `cargo test -p lore-core --test deletion`

use lore_core::{
    Character, EntityType, Event, Group, Item, Location, Relation, TestWorld,
};

fn setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A small world in which every other document references Alice.
async fn world_around_alice() -> TestWorld {
    let world = TestWorld::new([
        Location::new("Village").with_id("loc-1").into(),
        Character::new("Bob").into(),
    ]);
    world
        .save(Character {
            current_location_id: Some("loc-1".into()),
            ..Character::new("Alice")
        })
        .await
        .expect("save failed");
    world
        .save(Event {
            characters: vec!["Alice".into(), "Bob".into()],
            ..Event::new("Festival")
        })
        .await
        .expect("save failed");
    world
        .save(Item {
            current_owner: Some("Alice".into()),
            ..Item::new("Sword")
        })
        .await
        .expect("save failed");
    world
        .save(Group {
            members: vec!["Alice".into(), "Bob".into()],
            ..Group::new("Lamplighters")
        })
        .await
        .expect("save failed");

    let mut bob = world.character("Bob").await.expect("bob missing");
    bob.relationships.push(Relation::typed("Alice", "rival"));
    world.save(bob).await.expect("save failed");
    world
}

#[tokio::test]
async fn test_deleting_character_removes_every_reference() {
    setup();
    let world = world_around_alice().await;

    let report = world
        .delete(EntityType::Character, "Alice")
        .await
        .expect("delete failed");

    assert!(report.failures.is_empty(), "unexpected failures: {:?}", report.failures);
    assert!(report.entities_updated >= 5);
    assert!(world.character("Alice").await.is_none());

    assert!(!world.holds("loc-1", EntityType::Character, "Alice").await);
    let festival = world.event("Festival").await.expect("festival missing");
    assert_eq!(festival.characters, vec!["Bob".to_string()]);
    let sword = world.item("Sword").await.expect("sword missing");
    assert_eq!(sword.current_owner, None);
    let guild = world.group("Lamplighters").await.expect("group missing");
    assert_eq!(guild.members, vec!["Bob".to_string()]);
    let bob = world.character("Bob").await.expect("bob missing");
    assert!(bob.relationships.is_empty());
    assert_eq!(bob.events, vec!["Festival".to_string()]);
}

#[tokio::test]
async fn test_deletion_by_id_after_document_is_gone() {
    setup();
    let world = TestWorld::new([
        Event {
            characters: vec!["c-9".into(), "Bob".into()],
            ..Event::new("Festival")
        }
        .into(),
    ]);

    let report = world
        .engine()
        .handle_deletion(EntityType::Character, "c-9")
        .await;

    assert_eq!(report.entities_updated, 1);
    let festival = world.event("Festival").await.expect("festival missing");
    assert_eq!(festival.characters, vec!["Bob".to_string()]);
}

#[tokio::test]
async fn test_deleting_location_clears_occupants_and_ancestors() {
    setup();
    let world = TestWorld::new([
        Location {
            child_location_ids: vec!["town".into()],
            ..Location::new("Northreach").with_id("reg")
        }
        .into(),
        Location {
            parent_location_id: Some("reg".into()),
            child_location_ids: vec!["tavern".into()],
            ..Location::new("Brindle").with_id("town")
        }
        .into(),
        Location {
            parent_location_id: Some("town".into()),
            ..Location::new("Gilded Goose").with_id("tavern")
        }
        .into(),
    ]);
    world
        .save(Character {
            current_location_id: Some("tavern".into()),
            ..Character::new("Alice")
        })
        .await
        .expect("save failed");
    world
        .save(Event {
            location: Some("Gilded Goose".into()),
            ..Event::new("Brawl")
        })
        .await
        .expect("save failed");
    assert!(world.holds("reg", EntityType::Character, "Alice").await);

    let report = world
        .delete(EntityType::Location, "tavern")
        .await
        .expect("delete failed");

    assert!(report.failures.is_empty(), "unexpected failures: {:?}", report.failures);
    assert!(world.location("tavern").await.is_none());

    let alice = world.character("Alice").await.expect("alice missing");
    assert_eq!(alice.current_location_id, None);
    let brawl = world.event("Brawl").await.expect("event missing");
    assert_eq!(brawl.location, None);

    let town = world.location("town").await.expect("town missing");
    assert!(town.child_location_ids.is_empty());
    assert!(town.entity_refs.is_empty());
    let region = world.location("reg").await.expect("region missing");
    assert!(region.entity_refs.is_empty());
}

#[tokio::test]
async fn test_deleting_unreferenced_entity_touches_nothing() {
    setup();
    let world = world_around_alice().await;
    world.save(Character::new("Hermit")).await.expect("save failed");
    world.store().clear_writes().await;

    let report = world
        .delete(EntityType::Character, "Hermit")
        .await
        .expect("delete failed");

    assert_eq!(report.entities_updated, 0);
    assert!(world.store().writes().await.is_empty());
}
