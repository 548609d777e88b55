//! Integration tests for the authorization engine over the in-memory store
//!
//! Scenarios:
//! 1. Basic grant/deny per user and resource
//! 2. Wildcard user scope, with and without a user
//! 3. Live group resolution
//! 4. Key deletion cascading to rules
//! 5. Group CRUD
//! 6. Rule round trip and idempotent deletes

use auth_access_control::*;
use secrecy::SecretString;
use std::collections::BTreeSet;
use std::sync::Arc;

fn secret(value: &str) -> SecretString {
    SecretString::new(value.to_string())
}

fn resources(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}

// Helper to create a store with one key pair and an engine over it
async fn create_test_engine(public_key: &str) -> (Arc<InMemoryAccessControlStore>, AccessControlEngine) {
    let store = Arc::new(InMemoryAccessControlStore::new());
    assert!(store.add_key_pair(public_key, secret("private")).await.unwrap());
    let engine = AccessControlEngine::from_store(store.clone());
    (store, engine)
}

#[tokio::test]
async fn test_basic_grant_and_deny() {
    let (store, engine) = create_test_engine("pk1").await;

    store
        .add_access_rule(
            "pk1",
            NewAccessRule::for_resources(["image.get"], UserScope::specific(["alice"])),
        )
        .await
        .unwrap()
        .unwrap();

    assert!(engine.has_access("pk1", "image.get", Some("alice")).await.unwrap());
    assert!(!engine.has_access("pk1", "image.get", Some("bob")).await.unwrap());
    assert!(!engine.has_access("pk1", "image.put", Some("alice")).await.unwrap());
    assert!(!engine.has_access("pk1", "image.get", None).await.unwrap());
    assert!(!engine.has_access("unknown", "image.get", Some("alice")).await.unwrap());

    println!("✅ Basic grant/deny works");
}

#[tokio::test]
async fn test_wildcard_users() {
    let (store, engine) = create_test_engine("pk1").await;

    store
        .add_access_rule("pk1", NewAccessRule::for_resources(["images.get"], UserScope::Wildcard))
        .await
        .unwrap()
        .unwrap();

    assert!(engine.has_access("pk1", "images.get", Some("alice")).await.unwrap());
    assert!(engine.has_access("pk1", "images.get", Some("anyone-else")).await.unwrap());
    assert!(engine.has_access("pk1", "images.get", None).await.unwrap());
    assert_eq!(
        engine.users_for_resource("pk1", "images.get").await.unwrap(),
        UserScope::Wildcard
    );

    println!("✅ Wildcard user scope grants every user");
}

#[tokio::test]
async fn test_group_resolution_is_live() {
    let (store, engine) = create_test_engine("pk1").await;

    store
        .add_resource_group("g", resources(&["image.get", "image.head"]))
        .await
        .unwrap();
    let rule_id = store
        .add_access_rule("pk1", NewAccessRule::for_group("g", UserScope::Wildcard))
        .await
        .unwrap()
        .unwrap();

    assert!(engine.has_access("pk1", "image.head", Some("u")).await.unwrap());

    // Emptying the group revokes access without touching the rule
    assert!(store.update_resource_group("g", BTreeSet::new()).await.unwrap());
    assert!(!engine.has_access("pk1", "image.head", Some("u")).await.unwrap());
    assert!(store.get_access_rule("pk1", &rule_id).await.unwrap().is_some());

    // A deleted group grants nothing and is not an error
    assert!(store.update_resource_group("g", resources(&["image.get"])).await.unwrap());
    assert!(engine.has_access("pk1", "image.get", None).await.unwrap());
    assert!(store.delete_resource_group("g").await.unwrap());
    assert!(!engine.has_access("pk1", "image.get", None).await.unwrap());

    println!("✅ Group references resolve at evaluation time");
}

#[tokio::test]
async fn test_rule_for_group_created_later() {
    let (store, engine) = create_test_engine("pk1").await;

    store
        .add_access_rule("pk1", NewAccessRule::for_group("later", UserScope::specific(["alice"])))
        .await
        .unwrap()
        .unwrap();
    assert!(!engine.has_access("pk1", "metadata.get", Some("alice")).await.unwrap());

    store
        .add_resource_group("later", resources(&["metadata.get"]))
        .await
        .unwrap();
    assert!(engine.has_access("pk1", "metadata.get", Some("alice")).await.unwrap());

    println!("✅ Rules may reference groups before they exist");
}

#[tokio::test]
async fn test_deleting_key_removes_its_rules() {
    let (store, engine) = create_test_engine("pk1").await;

    store
        .add_access_rule("pk1", NewAccessRule::for_resources(["image.get"], UserScope::Wildcard))
        .await
        .unwrap()
        .unwrap();
    assert!(engine.has_access("pk1", "image.get", None).await.unwrap());

    assert!(store.delete_public_key("pk1").await.unwrap());
    assert!(store.get_access_list_for_public_key("pk1").await.unwrap().is_empty());
    assert!(!engine.has_access("pk1", "image.get", None).await.unwrap());
    assert!(store.get_private_key("pk1").await.unwrap().is_none());

    // Re-creating the key does not resurrect old rules
    assert!(store.add_key_pair("pk1", secret("new")).await.unwrap());
    assert!(store.get_access_list_for_public_key("pk1").await.unwrap().is_empty());

    println!("✅ Key deletion cascades to access rules");
}

#[tokio::test]
async fn test_group_crud() {
    let store = InMemoryAccessControlStore::new();

    assert!(store.add_resource_group("g1", resources(&["a"])).await.unwrap());
    assert!(!store.add_resource_group("g1", resources(&["b"])).await.unwrap());
    assert_eq!(store.get_group("g1").await.unwrap(), Some(resources(&["a"])));

    assert!(store.update_resource_group("g1", resources(&["c"])).await.unwrap());
    assert_eq!(store.get_group("g1").await.unwrap(), Some(resources(&["c"])));

    assert!(store.delete_resource_group("g1").await.unwrap());
    assert_eq!(store.get_group("g1").await.unwrap(), None);
    assert!(!store.delete_resource_group("g1").await.unwrap());
    assert!(!store.update_resource_group("g1", resources(&["d"])).await.unwrap());

    println!("✅ Group CRUD works");
}

#[tokio::test]
async fn test_empty_group_is_not_a_missing_group() {
    let store = InMemoryAccessControlStore::new();

    assert!(store.add_resource_group("empty", BTreeSet::new()).await.unwrap());
    assert_eq!(store.get_group("empty").await.unwrap(), Some(BTreeSet::new()));
    assert!(store.group_exists("empty").await.unwrap());
    assert_eq!(store.get_group("absent").await.unwrap(), None);
    assert!(!store.group_exists("absent").await.unwrap());
}

#[tokio::test]
async fn test_rule_round_trip_and_idempotent_delete() {
    let (store, _engine) = create_test_engine("pk1").await;

    let rule = NewAccessRule::for_resources(
        ["image.get", "image.head"],
        UserScope::specific(["alice", "bob"]),
    );
    let id = store
        .add_access_rule("pk1", rule.clone())
        .await
        .unwrap()
        .unwrap();

    let fetched = store.get_access_rule("pk1", &id).await.unwrap().unwrap();
    assert_eq!(fetched, rule.with_id(id.clone()));

    assert!(store.delete_access_rule("pk1", &id).await.unwrap());
    assert!(!store.delete_access_rule("pk1", &id).await.unwrap());
    assert!(store.get_access_rule("pk1", &id).await.unwrap().is_none());
    assert!(!store.delete_access_rule("pk1", "never-issued").await.unwrap());

    println!("✅ Rule round trip and repeated deletes behave");
}

#[tokio::test]
async fn test_literal_star_user_is_not_a_wildcard() {
    let (store, engine) = create_test_engine("pk1").await;

    store
        .add_access_rule("pk1", NewAccessRule::for_resources(["image.get"], UserScope::specific(["*"])))
        .await
        .unwrap()
        .unwrap();

    assert!(engine.has_access("pk1", "image.get", Some("*")).await.unwrap());
    assert!(!engine.has_access("pk1", "image.get", Some("alice")).await.unwrap());
    assert!(!engine.has_access("pk1", "image.get", None).await.unwrap());
}

#[tokio::test]
async fn test_expanded_access_list() {
    let (store, engine) = create_test_engine("pk1").await;
    store
        .add_resource_group("readers", resources(&["image.get", "images.get"]))
        .await
        .unwrap();

    let group_rule = store
        .add_access_rule("pk1", NewAccessRule::for_group("readers", UserScope::Wildcard))
        .await
        .unwrap()
        .unwrap();
    let missing_rule = store
        .add_access_rule("pk1", NewAccessRule::for_group("missing", UserScope::Wildcard))
        .await
        .unwrap()
        .unwrap();

    let expanded = engine.expanded_access_list("pk1").await.unwrap();
    assert_eq!(expanded.len(), 2);

    let first = expanded.first().unwrap();
    assert_eq!(first.id, group_rule);
    assert_eq!(first.group.as_deref(), Some("readers"));
    assert_eq!(first.resources, resources(&["image.get", "images.get"]));

    let second = expanded.last().unwrap();
    assert_eq!(second.id, missing_rule);
    assert!(second.resources.is_empty());
}

#[tokio::test]
async fn test_concurrent_readers_and_writers() {
    let (store, engine) = create_test_engine("pk1").await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let user = format!("user-{i}");
            store
                .add_access_rule(
                    "pk1",
                    NewAccessRule::for_resources(["image.get"], UserScope::specific([user.clone()])),
                )
                .await
                .unwrap()
                .unwrap();
            engine.has_access("pk1", "image.get", Some(&user)).await.unwrap()
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap());
    }
    assert_eq!(store.get_access_list_for_public_key("pk1").await.unwrap().len(), 16);
}
