//! Stampede Tests
//!
//! Concurrent misses on one key run the producer once.

use crate::*;
use std::sync::Barrier;
use std::thread;

const THREADS: usize = 32;

fn race<F>(guard: &Arc<Guard<MemoryPool>>, key_of: F) -> Arc<Calls>
where
    F: Fn(usize) -> String + Send + Sync + Copy + 'static,
{
    let calls = Arc::new(Calls::default());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let guard = Arc::clone(guard);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let key = key_of(i);
                barrier.wait();
                guard.get_or_compute("reports", &key, None, || {
                    calls.hit();
                    thread::sleep(Duration::from_millis(50));
                    Ok::<_, ()>(format!("report for {}", key))
                })
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let value = handle.join().unwrap().unwrap();
        assert_eq!(value, format!("report for {}", key_of(i)));
    }
    calls
}

#[test]
fn test_cold_key_produced_once() {
    let (guard, cache) = create_guard();
    let guard = Arc::new(guard);

    let calls = race(&guard, |_| "daily".to_string());

    assert_eq!(calls.count(), 1);
    assert_eq!(cache.namespace_len("reports"), 1);
}

#[test]
fn test_distinct_keys_produce_once_each() {
    let (guard, _cache) = create_guard();
    let guard = Arc::new(guard);

    let calls = race(&guard, |i| format!("day-{}", i % 4));

    assert_eq!(calls.count(), 4);
    assert_eq!(guard.cache().lock_registry().len(), 4);
}

#[test]
fn test_namespace_granularity_serializes_all_keys() {
    let config = GuardConfig {
        lock_granularity: LockGranularity::Namespace,
        ..GuardConfig::default()
    };
    let (guard, _cache) = create_guard_with(config, MetadataRegistry::new());
    let guard = Arc::new(guard);

    let started = std::time::Instant::now();
    let calls = race(&guard, |i| format!("day-{}", i % 2));

    assert_eq!(calls.count(), 2);
    assert_eq!(guard.cache().lock_registry().len(), 1);
    // Both producers ran behind the one namespace lock
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[test]
fn test_warm_key_never_produces() {
    let (guard, cache) = create_guard();
    cache
        .put("reports", "daily", json!("cached"), Duration::from_secs(60))
        .unwrap();
    let guard = Arc::new(guard);

    let calls = Arc::new(Calls::default());
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let guard = Arc::clone(&guard);
            let calls = Arc::clone(&calls);
            thread::spawn(move || {
                guard.get_or_compute("reports", "daily", None, || {
                    calls.hit();
                    Ok::<_, ()>("fresh".to_string())
                })
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), "cached");
    }
    assert_eq!(calls.count(), 0);
}

#[test]
fn test_failed_production_lets_next_caller_retry() {
    let (guard, cache) = create_guard();

    let first: std::result::Result<u32, _> = guard.get_or_compute("reports", "k", None, || {
        Err(Error::Operation("upstream timeout".into()))
    });
    assert!(first.is_err());
    assert_eq!(cache.namespace_len("reports"), 0);

    let second: std::result::Result<u32, Error> = guard.get_or_compute("reports", "k", None, || Ok(12));
    assert_eq!(second.unwrap(), 12);
}

#[test]
fn test_panicking_producer_releases_lock() {
    let (guard, _cache) = create_guard();
    let guard = Arc::new(guard);

    let worker = {
        let guard = Arc::clone(&guard);
        thread::spawn(move || {
            let _: std::result::Result<u32, ()> =
                guard.get_or_compute("reports", "k", None, || panic!("producer bug"));
        })
    };
    assert!(worker.join().is_err());

    let value: std::result::Result<u32, ()> = guard.get_or_compute("reports", "k", None, || Ok(3));
    assert_eq!(value, Ok(3));
}

#[test]
fn test_expired_entry_is_produced_again() {
    let (guard, _cache) = create_guard();
    let calls = Calls::default();
    let produce = || {
        calls.hit();
        Ok::<_, ()>(1u32)
    };

    guard
        .get_or_compute("reports", "k", Some(Duration::from_millis(20)), produce)
        .unwrap();
    thread::sleep(Duration::from_millis(40));
    guard
        .get_or_compute("reports", "k", Some(Duration::from_millis(20)), produce)
        .unwrap();

    assert_eq!(calls.count(), 2);
}
