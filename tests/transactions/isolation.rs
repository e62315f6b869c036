//! Isolation Level Tests
//!
//! Along one chain the effective isolation never decreases.

use crate::*;
use proptest::prelude::*;
use txguard::concurrency::ResourceContext;
use txguard::engine::TransactionExecutor;
use txguard::storage::MemoryConnection;

fn level() -> impl Strategy<Value = IsolationLevel> {
    prop::sample::select(IsolationLevel::ALL.to_vec())
}

/// Run `levels` as a chain of nested calls, recording the effective level at each depth
fn run_chain(
    executor: &TransactionExecutor<MemoryPool>,
    ctx: &ResourceContext<MemoryConnection>,
    levels: &[IsolationLevel],
    seen: &mut Vec<IsolationLevel>,
) -> std::result::Result<(), TxError<()>> {
    let Some((first, rest)) = levels.split_first() else {
        return Ok(());
    };
    executor.run(ctx, *first, |ctx| {
        if let Some(level) = ctx.isolation() {
            seen.push(level);
        }
        run_chain(executor, ctx, rest, seen).map_err(|_| ())
    })
}

#[test]
fn test_inner_weaker_request_keeps_outer_level() {
    let (guard, _pool) = create_guard();
    let ctx = guard.context();

    guard
        .run(&ctx, IsolationLevel::RepeatableRead, |ctx| {
            guard.run(ctx, IsolationLevel::ReadCommitted, |ctx| {
                assert_eq!(ctx.isolation(), Some(IsolationLevel::RepeatableRead));
                let conn = ctx.resource().unwrap();
                assert_eq!(conn.isolation_level().unwrap(), IsolationLevel::RepeatableRead);
                Ok::<_, ()>(())
            })
        })
        .unwrap();
}

#[test]
fn test_inner_stronger_request_raises_level() {
    let (guard, _pool) = create_guard();
    let ctx = guard.context();

    guard
        .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
            guard.run(ctx, IsolationLevel::Serializable, |_| Ok::<_, ()>(()))?;
            // The raise outlives the joiner that asked for it
            assert_eq!(ctx.isolation(), Some(IsolationLevel::Serializable));
            let conn = ctx.resource().unwrap();
            assert_eq!(conn.isolation_level().unwrap(), IsolationLevel::Serializable);
            Ok::<_, TxError<()>>(())
        })
        .unwrap();
}

proptest! {
    #[test]
    fn prop_isolation_is_monotonic(levels in prop::collection::vec(level(), 1..6)) {
        let executor = TransactionExecutor::new(create_pool());
        let ctx = executor.context();
        let mut seen = Vec::new();

        run_chain(&executor, &ctx, &levels, &mut seen).unwrap();

        prop_assert_eq!(seen.len(), levels.len());
        for pair in seen.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
        for (i, effective) in seen.iter().enumerate() {
            let strongest = levels[..=i].iter().max().copied().unwrap();
            prop_assert_eq!(*effective, strongest);
        }
        prop_assert!(!ctx.is_bound());
        prop_assert_eq!(executor.pool().stats().open(), 0);
    }
}
