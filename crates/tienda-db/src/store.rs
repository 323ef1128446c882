//! # Store Handle
//!
//! Pool + change notifier + open-handle accounting, shared by every
//! repository.
//!
//! ## Scoped Acquisition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Connection Lifetimes                                 │
//! │                                                                         │
//! │  READ                                  WRITE                            │
//! │  ────                                  ─────                            │
//! │  store.acquire()                       store.begin()                    │
//! │     │  open_handles += 1                  │  open_handles += 1          │
//! │     ▼                                     ▼                             │
//! │  SELECT ... (fetch_all)                BEGIN; INSERT/UPDATE/DELETE      │
//! │     │                                     │                             │
//! │     ▼                                     ├── commit() ─► publish()     │
//! │  guard dropped                            └── dropped  ─► ROLLBACK      │
//! │     open_handles -= 1                        open_handles -= 1          │
//! │                                                                         │
//! │  "dropped" covers early return, `?`, and cancellation mid-await.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, trace};

use crate::error::DbResult;
use crate::notify::{ChangeNotifier, Table};

/// Shared handle used by repositories. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    notifier: ChangeNotifier,
    open_handles: Arc<AtomicUsize>,
}

impl Store {
    /// Wraps an already-configured pool.
    pub fn new(pool: SqlitePool, notifier: ChangeNotifier) -> Self {
        Store {
            pool,
            notifier,
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The change notifier writes publish to.
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Connections and transactions currently held by repository calls.
    ///
    /// Zero whenever no operation is in flight; anything else after all
    /// calls returned (or were dropped) is a leak.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::Acquire)
    }

    fn track(&self) -> HandleGuard {
        self.open_handles.fetch_add(1, Ordering::AcqRel);
        HandleGuard {
            counter: Arc::clone(&self.open_handles),
        }
    }

    /// Acquires a pooled connection for reads.
    pub async fn acquire(&self) -> DbResult<ScopedConnection> {
        let guard = self.track();
        let conn = self.pool.acquire().await?;
        trace!("Connection acquired");

        Ok(ScopedConnection {
            conn,
            _guard: guard,
        })
    }

    /// Starts a write transaction.
    ///
    /// Nothing is published unless [`WriteTx::commit`] succeeds.
    pub async fn begin(&self) -> DbResult<WriteTx> {
        let guard = self.track();
        let tx = self.pool.begin().await?;
        trace!("Transaction started");

        Ok(WriteTx {
            tx,
            touched: Vec::new(),
            notifier: self.notifier.clone(),
            _guard: guard,
        })
    }
}

// =============================================================================
// Guards
// =============================================================================

#[derive(Debug)]
struct HandleGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A pooled connection returned to the pool on drop.
pub struct ScopedConnection {
    conn: PoolConnection<Sqlite>,
    _guard: HandleGuard,
}

impl fmt::Debug for ScopedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedConnection").finish_non_exhaustive()
    }
}

impl Deref for ScopedConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for ScopedConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

/// A write transaction that remembers which tables it touched.
///
/// Dropping it without [`WriteTx::commit`] rolls back.
pub struct WriteTx {
    tx: Transaction<'static, Sqlite>,
    touched: Vec<Table>,
    notifier: ChangeNotifier,
    _guard: HandleGuard,
}

impl fmt::Debug for WriteTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteTx")
            .field("touched", &self.touched)
            .finish_non_exhaustive()
    }
}

impl WriteTx {
    /// Connection to run statements on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Marks `table` as changed; it is published after commit.
    pub fn touch(&mut self, table: Table) {
        if !self.touched.contains(&table) {
            self.touched.push(table);
        }
    }

    /// Commits and then publishes a change for every touched table.
    pub async fn commit(self) -> DbResult<()> {
        let WriteTx {
            tx,
            touched,
            notifier,
            _guard,
        } = self;

        tx.commit().await?;
        debug!(tables = ?touched, "Transaction committed");

        for table in touched {
            notifier.publish(table);
        }

        Ok(())
    }
}
