//! Nested Call Tests
//!
//! Nested calls on one chain join the owner's transaction.

use crate::*;

#[test]
fn test_nested_calls_share_one_resource() {
    let (guard, pool) = create_guard();
    let ctx = guard.context();

    guard
        .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
            let outer = ctx.resource().unwrap();
            guard.run(ctx, IsolationLevel::ReadCommitted, |ctx| {
                let middle = ctx.resource().unwrap();
                assert!(Arc::ptr_eq(&outer, &middle));
                guard.run(ctx, IsolationLevel::ReadCommitted, |ctx| {
                    let inner = ctx.resource().unwrap();
                    assert!(Arc::ptr_eq(&outer, &inner));
                    assert_eq!(ctx.depth(), 2);
                    Ok::<_, ()>(())
                })
            })
        })
        .unwrap();

    assert_eq!(pool.stats().acquired(), 1);
    assert_eq!(pool.stats().commits(), 1);
    assert_no_leak(&pool);
}

#[test]
fn test_nested_writes_commit_with_owner() {
    let (guard, pool) = create_guard();
    let ctx = guard.context();

    guard
        .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
            ctx.resource().unwrap().write("order:1", json!("placed"))?;
            guard
                .run(ctx, IsolationLevel::ReadCommitted, |ctx| {
                    let conn = ctx.resource().unwrap();
                    conn.write("stock:1", json!(9))?;
                    assert_eq!(conn.read("order:1")?, Some(json!("placed")));
                    Ok::<_, ResourceError>(())
                })
                .map_err(|e| e.into_operation().unwrap_or(ResourceError::Closed))?;

            // Nothing is visible outside the chain before the owner commits
            assert_eq!(pool.database().get("stock:1"), None);
            Ok::<_, ResourceError>(())
        })
        .unwrap();

    assert_eq!(pool.database().get("order:1"), Some(json!("placed")));
    assert_eq!(pool.database().get("stock:1"), Some(json!(9)));
}

#[test]
fn test_joiner_never_closes_the_resource() {
    let (guard, pool) = create_guard();
    let ctx = guard.context();

    guard
        .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
            guard.run(ctx, IsolationLevel::ReadCommitted, |_| Ok::<_, ()>(()))?;
            let conn = ctx.resource().unwrap();
            assert!(!conn.is_closed());
            assert!(conn.in_transaction());
            assert_eq!(pool.stats().released(), 0);
            Ok::<_, TxError<()>>(())
        })
        .unwrap();

    assert_eq!(pool.stats().released(), 1);
}

#[test]
fn test_sequential_chains_get_fresh_resources() {
    let (guard, pool) = create_guard();
    let ctx = guard.context();

    let first = guard
        .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
            Ok::<_, ()>(ctx.resource().unwrap().id())
        })
        .unwrap();
    let second = guard
        .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
            Ok::<_, ()>(ctx.resource().unwrap().id())
        })
        .unwrap();

    assert_ne!(first, second);
    assert!(!ctx.is_bound());
    assert_no_leak(&pool);
}

#[test]
fn test_parallel_chains_never_share() {
    use std::sync::Barrier;
    use std::thread;

    const CHAINS: usize = 8;

    let (guard, pool) = create_guard();
    let guard = Arc::new(guard);
    let barrier = Arc::new(Barrier::new(CHAINS));

    let handles: Vec<_> = (0..CHAINS)
        .map(|i| {
            let guard = Arc::clone(&guard);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let ctx = guard.context();
                guard
                    .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
                        barrier.wait();
                        let conn = ctx.resource().unwrap();
                        conn.write(format!("row:{}", i), json!(i))?;
                        Ok::<_, ResourceError>(conn.id())
                    })
                    .unwrap()
            })
        })
        .collect();

    let mut ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), CHAINS);
    assert_eq!(pool.database().len(), CHAINS);
    assert_no_leak(&pool);
}
