//! Rollback Tests
//!
//! Errors, explicit aborts and panics all roll back and release.

use crate::*;
use txguard::engine::envelope_policy;

/// Application error used by the scenarios below
#[derive(Debug, PartialEq)]
enum AppError {
    Rejected(&'static str),
    Db(String),
}

impl From<ResourceError> for AppError {
    fn from(e: ResourceError) -> Self {
        AppError::Db(e.to_string())
    }
}

#[test]
fn test_error_after_update_keeps_old_value() {
    let (guard, pool) = create_guard();
    pool.database().put("account:1", json!(100));
    let ctx = guard.context();

    let result = guard.run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
        let conn = ctx.resource().unwrap();
        conn.write("account:1", json!(0))?;
        Err::<(), _>(AppError::Rejected("insufficient funds"))
    });

    assert_eq!(
        result.unwrap_err().into_operation(),
        Some(AppError::Rejected("insufficient funds"))
    );
    assert_eq!(pool.database().get("account:1"), Some(json!(100)));
    assert_eq!(pool.stats().rollbacks(), 1);
    assert_eq!(pool.stats().commits(), 0);
    assert_no_leak(&pool);
}

#[test]
fn test_nested_error_rolls_back_whole_chain() {
    let (guard, pool) = create_guard();
    let ctx = guard.context();

    let result = guard.run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
        ctx.resource().unwrap().write("order:1", json!("placed"))?;
        guard
            .run(ctx, IsolationLevel::ReadCommitted, |_| {
                Err::<(), _>(AppError::Rejected("out of stock"))
            })
            .map_err(|e| e.into_operation().unwrap_or(AppError::Db("infra".into())))
    });

    assert!(result.unwrap_err().is_operation());
    assert_eq!(pool.database().get("order:1"), None);
    assert_no_leak(&pool);
}

#[test]
fn test_swallowed_nested_error_still_commits() {
    let (guard, pool) = create_guard();
    let ctx = guard.context();

    guard
        .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
            ctx.resource().unwrap().write("order:1", json!("placed"))?;
            let inner = guard.run(ctx, IsolationLevel::ReadCommitted, |_| {
                Err::<(), _>(AppError::Rejected("optional step"))
            });
            assert!(inner.is_err());
            Ok::<_, AppError>(())
        })
        .unwrap();

    assert_eq!(pool.database().get("order:1"), Some(json!("placed")));
}

#[test]
fn test_silent_abort_returns_value() {
    let (guard, pool) = create_guard();
    let ctx = guard.context();

    let value = guard
        .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
            ctx.resource().unwrap().write("draft:1", json!("text"))?;
            assert!(ctx.set_rollback_only());
            Ok::<_, AppError>("preview")
        })
        .unwrap();

    assert_eq!(value, "preview");
    assert_eq!(pool.database().get("draft:1"), None);
    assert_eq!(pool.stats().commits(), 0);
    assert_eq!(pool.stats().rollbacks(), 1);
    assert_no_leak(&pool);
}

#[test]
fn test_rollback_only_does_not_leak_into_next_chain_use() {
    let (guard, pool) = create_guard();
    let ctx = guard.context();

    guard
        .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
            ctx.set_rollback_only();
            Ok::<_, ()>(())
        })
        .unwrap();
    guard
        .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
            ctx.resource().unwrap().write("row:1", json!(1))
        })
        .unwrap();

    assert_eq!(pool.database().get("row:1"), Some(json!(1)));
    assert_eq!(pool.stats().commits(), 1);
}

#[test]
fn test_panic_rolls_back_and_releases() {
    let (guard, pool) = create_guard();
    let ctx = guard.context();

    let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        guard.run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
            ctx.resource().unwrap().write("row:1", json!(1))?;
            if ctx.is_bound() {
                panic!("bug in operation");
            }
            Ok::<_, ResourceError>(())
        })
    }));

    assert!(caught.is_err());
    assert!(!ctx.is_bound());
    assert_eq!(pool.database().get("row:1"), None);
    assert_eq!(pool.stats().rollbacks(), 1);
    assert_no_leak(&pool);
}

/// Result envelope returned instead of an `Err`
#[derive(Debug, PartialEq)]
struct Reply {
    status: u16,
}

#[test]
fn test_envelope_policy_rolls_back_failed_reply() {
    let pool = create_pool();
    let guard = Guard::builder(pool.clone())
        .finalize_policy(Arc::new(envelope_policy(|reply: &Reply| reply.status < 400)))
        .build()
        .unwrap();
    let ctx = guard.context();

    let reply = guard
        .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
            ctx.resource().unwrap().write("row:1", json!(1))?;
            Ok::<_, AppError>(Reply { status: 409 })
        })
        .unwrap();
    assert_eq!(reply, Reply { status: 409 });
    assert_eq!(pool.database().get("row:1"), None);

    guard
        .run(&ctx, IsolationLevel::ReadCommitted, |ctx| {
            ctx.resource().unwrap().write("row:2", json!(2))?;
            Ok::<_, AppError>(Reply { status: 201 })
        })
        .unwrap();
    assert_eq!(pool.database().get("row:2"), Some(json!(2)));
    assert_no_leak(&pool);
}
