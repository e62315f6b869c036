//! In-memory transactional resource
//!
//! A minimal database that honours the [`Resource`] contract for real:
//! writes made inside a transaction are buffered on the connection and only
//! become visible to other connections on commit. Rollback discards them.
//!
//! [`MemoryPool`] hands out [`MemoryConnection`]s and counts every lifecycle
//! event in [`PoolStats`], which makes it the reference backend for tests
//! that assert "committed exactly once" or "no connection leaked". Faults can
//! be injected through [`FaultPlan`].

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use txguard_core::{IsolationLevel, Resource, ResourceError, ResourcePool, ResourceResult};

/// Committed rows, keyed by row key
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    rows: RwLock<BTreeMap<String, Value>>,
}

impl MemoryDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a committed row
    pub fn get(&self, key: &str) -> Option<Value> {
        self.rows.read().get(key).cloned()
    }

    /// Write a row outside any transaction
    pub fn put(&self, key: impl Into<String>, value: Value) {
        self.rows.write().insert(key.into(), value);
    }

    /// Number of committed rows
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Check if no row is committed
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn apply(&self, pending: BTreeMap<String, Option<Value>>) {
        let mut rows = self.rows.write();
        for (key, value) in pending {
            match value {
                Some(value) => {
                    rows.insert(key, value);
                }
                None => {
                    rows.remove(&key);
                }
            }
        }
    }
}

/// Lifecycle counters of a pool
#[derive(Debug, Default)]
pub struct PoolStats {
    acquired: AtomicU64,
    released: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

impl PoolStats {
    /// Connections handed out
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Connections closed
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// Connections handed out and not yet closed
    pub fn open(&self) -> u64 {
        self.acquired().saturating_sub(self.released())
    }

    /// Successful commits
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Rollbacks attempted, including failed ones
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

/// Switchable faults, consulted on every call
#[derive(Debug, Default)]
pub struct FaultPlan {
    acquire: AtomicBool,
    begin: AtomicBool,
    commit: AtomicBool,
    rollback: AtomicBool,
    close: AtomicBool,
}

impl FaultPlan {
    /// Make `acquire` fail
    pub fn fail_acquire(&self, fail: bool) {
        self.acquire.store(fail, Ordering::SeqCst);
    }

    /// Make `begin` fail
    pub fn fail_begin(&self, fail: bool) {
        self.begin.store(fail, Ordering::SeqCst);
    }

    /// Make `commit` fail
    pub fn fail_commit(&self, fail: bool) {
        self.commit.store(fail, Ordering::SeqCst);
    }

    /// Make `rollback` fail (buffered writes are still discarded)
    pub fn fail_rollback(&self, fail: bool) {
        self.rollback.store(fail, Ordering::SeqCst);
    }

    /// Make `close` fail (the connection still counts as released)
    pub fn fail_close(&self, fail: bool) {
        self.close.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> ResourceResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(ResourceError::Backend(format!("injected {} failure", what)))
        } else {
            Ok(())
        }
    }
}

struct PoolShared {
    db: Arc<MemoryDatabase>,
    stats: PoolStats,
    faults: FaultPlan,
    next_id: AtomicU64,
    default_isolation: IsolationLevel,
}

/// Pool of [`MemoryConnection`]s over one [`MemoryDatabase`]
#[derive(Clone)]
pub struct MemoryPool {
    shared: Arc<PoolShared>,
}

impl MemoryPool {
    /// Pool over `db`; new connections start in auto-commit at read-committed
    pub fn new(db: Arc<MemoryDatabase>) -> Self {
        Self::with_isolation(db, IsolationLevel::ReadCommitted)
    }

    /// Pool whose connections start at `isolation`
    pub fn with_isolation(db: Arc<MemoryDatabase>, isolation: IsolationLevel) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                db,
                stats: PoolStats::default(),
                faults: FaultPlan::default(),
                next_id: AtomicU64::new(1),
                default_isolation: isolation,
            }),
        }
    }

    /// The database behind the pool
    pub fn database(&self) -> &Arc<MemoryDatabase> {
        &self.shared.db
    }

    /// Lifecycle counters
    pub fn stats(&self) -> &PoolStats {
        &self.shared.stats
    }

    /// Fault switches
    pub fn faults(&self) -> &FaultPlan {
        &self.shared.faults
    }
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("stats", &self.shared.stats)
            .finish()
    }
}

impl ResourcePool for MemoryPool {
    type Resource = MemoryConnection;

    fn acquire(&self) -> ResourceResult<Arc<MemoryConnection>> {
        if self.shared.faults.acquire.load(Ordering::SeqCst) {
            return Err(ResourceError::Unavailable("injected acquire failure".into()));
        }
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        self.shared.stats.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryConnection {
            id,
            shared: Arc::clone(&self.shared),
            state: Mutex::new(ConnectionState {
                auto_commit: true,
                isolation: self.shared.default_isolation,
                isolation_changes: Vec::new(),
                in_transaction: false,
                pending: BTreeMap::new(),
                closed: false,
            }),
        }))
    }
}

struct ConnectionState {
    auto_commit: bool,
    isolation: IsolationLevel,
    isolation_changes: Vec<IsolationLevel>,
    in_transaction: bool,
    pending: BTreeMap<String, Option<Value>>,
    closed: bool,
}

/// Connection handed out by [`MemoryPool`]
pub struct MemoryConnection {
    id: u64,
    shared: Arc<PoolShared>,
    state: Mutex<ConnectionState>,
}

impl MemoryConnection {
    /// Pool-unique connection id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Read a row; sees this connection's uncommitted writes
    pub fn read(&self, key: &str) -> ResourceResult<Option<Value>> {
        let state = self.state.lock();
        if state.closed {
            return Err(ResourceError::Closed);
        }
        if let Some(pending) = state.pending.get(key) {
            return Ok(pending.clone());
        }
        Ok(self.shared.db.get(key))
    }

    /// Write a row; buffered while a transaction is open
    pub fn write(&self, key: impl Into<String>, value: Value) -> ResourceResult<()> {
        self.stage(key.into(), Some(value))
    }

    /// Delete a row; buffered while a transaction is open
    pub fn delete(&self, key: impl Into<String>) -> ResourceResult<()> {
        self.stage(key.into(), None)
    }

    /// Every isolation level set on this connection, in order
    pub fn isolation_changes(&self) -> Vec<IsolationLevel> {
        self.state.lock().isolation_changes.clone()
    }

    /// Check if a transaction is open
    pub fn in_transaction(&self) -> bool {
        self.state.lock().in_transaction
    }

    /// Check if the connection was closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn stage(&self, key: String, value: Option<Value>) -> ResourceResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ResourceError::Closed);
        }
        if state.in_transaction {
            state.pending.insert(key, value);
        } else {
            let mut single = BTreeMap::new();
            single.insert(key, value);
            self.shared.db.apply(single);
        }
        Ok(())
    }

    fn open_state(&self) -> ResourceResult<parking_lot::MutexGuard<'_, ConnectionState>> {
        let state = self.state.lock();
        if state.closed {
            return Err(ResourceError::Closed);
        }
        Ok(state)
    }
}

impl std::fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConnection").field("id", &self.id).finish()
    }
}

impl Resource for MemoryConnection {
    fn isolation_level(&self) -> ResourceResult<IsolationLevel> {
        Ok(self.open_state()?.isolation)
    }

    fn set_isolation_level(&self, level: IsolationLevel) -> ResourceResult<()> {
        let mut state = self.open_state()?;
        state.isolation = level;
        state.isolation_changes.push(level);
        Ok(())
    }

    fn auto_commit(&self) -> ResourceResult<bool> {
        Ok(self.open_state()?.auto_commit)
    }

    fn set_auto_commit(&self, enabled: bool) -> ResourceResult<()> {
        let mut state = self.open_state()?;
        state.auto_commit = enabled;
        Ok(())
    }

    fn begin(&self) -> ResourceResult<()> {
        FaultPlan::check(&self.shared.faults.begin, "begin")?;
        let mut state = self.open_state()?;
        state.in_transaction = true;
        state.pending.clear();
        Ok(())
    }

    fn commit(&self) -> ResourceResult<()> {
        FaultPlan::check(&self.shared.faults.commit, "commit")?;
        let mut state = self.open_state()?;
        let pending = std::mem::take(&mut state.pending);
        state.in_transaction = false;
        self.shared.db.apply(pending);
        self.shared.stats.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&self) -> ResourceResult<()> {
        let mut state = self.open_state()?;
        state.pending.clear();
        state.in_transaction = false;
        self.shared.stats.rollbacks.fetch_add(1, Ordering::SeqCst);
        FaultPlan::check(&self.shared.faults.rollback, "rollback")
    }

    fn close(&self) -> ResourceResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ResourceError::Closed);
        }
        state.closed = true;
        state.pending.clear();
        state.in_transaction = false;
        self.shared.stats.released.fetch_add(1, Ordering::SeqCst);
        FaultPlan::check(&self.shared.faults.close, "close")
    }
}
