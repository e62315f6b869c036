//! Propagation Policy Tests
//!
//! Policies select which methods run inside a transaction.

use crate::*;

fn bound_during<P: PropagationPolicy>(guard: &Guard<MemoryPool>, method: &str, policy: &P) -> bool {
    let ctx = guard.context();
    guard
        .run_in_transaction(&ctx, method, policy, IsolationLevel::ReadCommitted, |ctx| {
            Ok::<_, ()>(ctx.is_bound())
        })
        .unwrap()
}

#[test]
fn test_name_policy_selects_exact_names() {
    let (guard, pool) = create_guard();
    let policy = MethodNamePolicy::new(["save", "delete"]);

    assert!(bound_during(&guard, "save", &policy));
    assert!(bound_during(&guard, "delete", &policy));
    assert!(!bound_during(&guard, "saveAll", &policy));
    assert!(!bound_during(&guard, "find", &policy));
    assert_eq!(pool.stats().acquired(), 2);
}

#[test]
fn test_pattern_policy_case_sensitive() {
    let (guard, _pool) = create_guard();
    let policy = MethodPatternPolicy::new("save.*", false).unwrap();

    assert!(bound_during(&guard, "saveUser", &policy));
    assert!(!bound_during(&guard, "SaveUser", &policy));
    assert!(!bound_during(&guard, "autosave", &policy));
}

#[test]
fn test_pattern_policy_case_insensitive() {
    let (guard, _pool) = create_guard();
    let policy = MethodPatternPolicy::new("save.*", true).unwrap();

    assert!(bound_during(&guard, "SaveUser", &policy));
    assert!(bound_during(&guard, "SAVE", &policy));
}

#[test]
fn test_closure_policy() {
    let (guard, _pool) = create_guard();
    let policy = |method: &str| method.starts_with("tx_");

    assert!(bound_during(&guard, "tx_transfer", &policy));
    assert!(!bound_during(&guard, "transfer", &policy));
}

#[test]
fn test_unwrapped_call_still_propagates_errors() {
    let (guard, pool) = create_guard();
    let ctx = guard.context();

    let result = guard.run_in_transaction(
        &ctx,
        "find",
        &NeverPolicy,
        IsolationLevel::ReadCommitted,
        |_| Err::<(), _>("not found"),
    );

    assert_eq!(result.unwrap_err().into_operation(), Some("not found"));
    assert_eq!(pool.stats().acquired(), 0);
}

#[test]
fn test_configured_operations() {
    let config = GuardConfig::from_toml_str(
        r#"
        default_isolation = "read_committed"

        [propagation]
        pattern = "transfer|deposit"

        [types.Accounts]
        isolation = "repeatable_read"

        [operations."Accounts.transfer"]
        isolation = "serializable"
        "#,
    )
    .unwrap();

    let pool = create_pool();
    let guard = Guard::builder(pool.clone()).config(config).build().unwrap();
    let ctx = guard.context();

    let effective = |method: &str| {
        guard
            .run_operation(&ctx, &OperationId::new("Accounts", method), |ctx| {
                Ok::<_, ()>(ctx.isolation())
            })
            .unwrap()
    };

    assert_eq!(effective("transfer"), Some(IsolationLevel::Serializable));
    assert_eq!(effective("deposit"), Some(IsolationLevel::RepeatableRead));
    assert_eq!(effective("balance"), None);
    assert_eq!(pool.stats().acquired(), 2);
    assert_no_leak(&pool);
}
