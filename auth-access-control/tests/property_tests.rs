//! Property tests for paging, deletes and user scopes

use auth_access_control::*;
use proptest::prelude::*;
use secrecy::SecretString;
use std::collections::BTreeSet;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn group_total_ignores_paging(
        names in prop::collection::btree_set("[a-z]{1,8}", 0..40),
        page in 1u32..10,
        limit in 1u32..100,
    ) {
        let rt = runtime();
        rt.block_on(async {
            let store = InMemoryAccessControlStore::new();
            for name in &names {
                store.add_resource_group(name, BTreeSet::new()).await.unwrap();
            }

            let small = store.get_groups(GroupQuery::new(1, 1)).await.unwrap();
            let large = store.get_groups(GroupQuery::new(1, 100)).await.unwrap();
            let paged = store.get_groups(GroupQuery::new(page, limit)).await.unwrap();

            assert_eq!(small.total_count, names.len() as u64);
            assert_eq!(large.total_count, names.len() as u64);
            assert_eq!(paged.total_count, names.len() as u64);

            let expected: Vec<&String> = names
                .iter()
                .skip(((page - 1) * limit) as usize)
                .take(limit as usize)
                .collect();
            let actual: Vec<&String> = paged.items.iter().map(|g| &g.name).collect();
            assert_eq!(actual, expected);
        });
    }

    #[test]
    fn repeated_deletes_return_false(name in "[a-z]{1,12}", repeats in 1usize..5) {
        let rt = runtime();
        rt.block_on(async {
            let store = InMemoryAccessControlStore::new();
            store
                .add_key_pair("pk", SecretString::new("secret".to_string()))
                .await
                .unwrap();
            store.add_resource_group(&name, BTreeSet::new()).await.unwrap();
            let id = store
                .add_access_rule("pk", NewAccessRule::for_group(name.clone(), UserScope::Wildcard))
                .await
                .unwrap()
                .unwrap();

            assert!(store.delete_resource_group(&name).await.unwrap());
            assert!(store.delete_access_rule("pk", &id).await.unwrap());
            for _ in 0..repeats {
                assert!(!store.delete_resource_group(&name).await.unwrap());
                assert!(!store.delete_access_rule("pk", &id).await.unwrap());
            }
        });
    }

    #[test]
    fn wildcard_grants_any_user(
        resource in "[a-z]{1,10}\\.(get|head|post)",
        user in prop::option::of("[a-zA-Z0-9*]{1,10}"),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let store = std::sync::Arc::new(InMemoryAccessControlStore::new());
            store
                .add_key_pair("pk", SecretString::new("secret".to_string()))
                .await
                .unwrap();
            store
                .add_access_rule("pk", NewAccessRule::for_resources([resource.clone()], UserScope::Wildcard))
                .await
                .unwrap()
                .unwrap();

            let engine = AccessControlEngine::from_store(store);
            assert!(engine.has_access("pk", &resource, user.as_deref()).await.unwrap());
        });
    }

    #[test]
    fn specific_scope_grants_only_listed_users(
        users in prop::collection::btree_set("[a-z]{1,6}", 1..6),
        probe in "[a-z]{1,6}",
    ) {
        let scope = UserScope::Specific(users.clone());
        prop_assert_eq!(scope.matches(Some(&probe)), users.contains(&probe));
        prop_assert!(!scope.matches(None));
    }
}
