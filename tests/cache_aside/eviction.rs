//! Eviction Tests
//!
//! Eviction runs after a successful operation and never before.

use crate::*;

fn seed(cache: &MemoryCache, namespaces: &[&str]) {
    for ns in namespaces {
        cache
            .put(ns, "entry", json!("stale"), Duration::from_secs(60))
            .unwrap();
    }
}

#[test]
fn test_evicts_after_success() {
    let (guard, cache) = create_guard();
    seed(&cache, &["users"]);

    let result = guard.evict(["users"], || {
        // Still cached while the operation runs
        assert_eq!(cache.namespace_len("users"), 1);
        Ok::<_, Error>("updated")
    });

    assert_eq!(result.unwrap(), "updated");
    assert_eq!(cache.namespace_len("users"), 0);
}

#[test]
fn test_failed_operation_evicts_nothing() {
    let (guard, cache) = create_guard();
    seed(&cache, &["users"]);

    let result: std::result::Result<(), _> =
        guard.evict(["users"], || Err(Error::Operation("rejected".into())));

    assert!(result.is_err());
    assert_eq!(cache.namespace_len("users"), 1);
}

#[test]
fn test_comma_delimited_lists() {
    let (guard, cache) = create_guard();
    seed(&cache, &["users", "profiles", "audit", "orders"]);

    guard
        .evict(["users, profiles", " audit ,"], || Ok::<_, Error>(()))
        .unwrap();

    assert_eq!(cache.namespace_len("users"), 0);
    assert_eq!(cache.namespace_len("profiles"), 0);
    assert_eq!(cache.namespace_len("audit"), 0);
    assert_eq!(cache.namespace_len("orders"), 1);
}

#[test]
fn test_evicted_value_is_produced_again() {
    let (guard, _cache) = create_guard();
    let calls = Calls::default();
    let produce = || {
        calls.hit();
        Ok::<_, Error>(vec!["alice".to_string()])
    };

    guard.get_or_compute("users", "all", None, produce).unwrap();
    guard.get_or_compute("users", "all", None, produce).unwrap();
    assert_eq!(calls.count(), 1);

    guard.evict(["users"], || Ok::<_, Error>(())).unwrap();
    guard.get_or_compute("users", "all", None, produce).unwrap();
    assert_eq!(calls.count(), 2);
}
