//! # Database Handle
//!
//! Opens the local SQLite file, applies the schema, and hands out
//! repositories that share one pool and one change notifier.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Local Store                                        │
//! │                                                                         │
//! │  App startup                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← pool size, timeouts, channel capacity           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← open pool + apply schema                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────────────── Store ─────────────────────────┐            │
//! │  │  SqlitePool          ChangeNotifier       open_handles │            │
//! │  │  ┌─────┐┌─────┐     cart_items  ─┐                     │            │
//! │  │  │Conn1││Conn2│ ... orders      ─┼─ broadcast          │            │
//! │  │  └─────┘└─────┘     order_items ─┘                     │            │
//! │  └────────────────────────────────────────────────────────┘            │
//! │       │                       │                                         │
//! │       ▼                       ▼                                         │
//! │  db.cart()              db.orders()        db.checkout(user)           │
//! │  CartRepository         OrderRepository    (spans all three tables)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File databases run in WAL mode: one writer at a time, readers never
//! blocked by it. Repositories add no locking of their own.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use tienda_core::{Order, OrderItem, PlacedOrder};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::notify::{ChangeNotifier, Table, TableSubscription, DEFAULT_CHANNEL_CAPACITY};
use crate::repository::cart::{self, CartRepository};
use crate::repository::order::{self, OrderRepository};
use crate::store::Store;

const IN_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/data/tienda.db")
///     .max_connections(4)
///     .notify_capacity(128);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of pooled connections.
    /// Default: 4
    pub max_connections: u32,

    /// Connections kept open while idle.
    /// Default: 1
    pub min_connections: u32,

    /// How long an acquire may wait for a free connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle time before a connection is closed.
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// Age after which a connection is recycled.
    /// Default: 30 minutes
    pub max_lifetime: Option<Duration>,

    /// Whether to apply the embedded schema on open.
    /// Default: true
    pub run_migrations: bool,

    /// Buffered change events per table before slow live queries lag.
    /// Default: 64
    pub notify_capacity: usize,
}

impl DbConfig {
    /// Configuration for a database file, created if missing.
    ///
    /// ## Arguments
    /// * `path` - Location of the SQLite file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 4,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
            run_migrations: true,
            notify_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Private in-memory database (for tests).
    ///
    /// An in-memory database lives exactly as long as its one connection,
    /// so the pool is pinned to a single connection that never expires.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            max_lifetime: None,
            run_migrations: true,
            notify_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the idle timeout (`None` keeps idle connections open).
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the connection lifetime (`None` never recycles).
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Sets whether to apply the schema on open.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets the per-table change channel capacity.
    pub fn notify_capacity(mut self, capacity: usize) -> Self {
        self.notify_capacity = capacity;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::StoreUnavailable(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };

        // SQLite leaves foreign keys off unless asked, per connection
        Ok(options.foreign_keys(true))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the local store. Cheap to clone; clones share the pool and
/// the change notifier.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./tienda.db")).await?;
///
/// db.cart().add_product(42, Some("Coffee"), 3.5).await?;
/// let placed = db.checkout(user_id).await?;
/// let history = db.orders().get_orders_by_user(user_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    store: Store,
}

impl Database {
    /// Opens the pool and applies the schema.
    ///
    /// ## Returns
    /// * `Ok(Database)` - ready to use
    /// * `Err(DbError::StoreUnavailable)` - the file can't be opened or created
    /// * `Err(DbError::MigrationFailed)` - the schema could not be applied
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening local store"
        );

        let connect_options = config.connect_options()?;

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::StoreUnavailable(e.to_string()))?;

        debug!(
            max_connections = config.max_connections,
            in_memory = config.is_in_memory(),
            "Pool created"
        );

        let db = Database {
            store: Store::new(pool, ChangeNotifier::new(config.notify_capacity)),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies the embedded schema. Called by [`Database::new`] unless
    /// disabled in the config.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(self.pool()).await
    }

    /// The connection pool, for queries no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        self.store.pool()
    }

    /// Shared store handle.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Cart repository.
    pub fn cart(&self) -> CartRepository {
        CartRepository::new(self.store.clone())
    }

    /// Order repository.
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.store.clone())
    }

    /// Raw change feed for one table.
    pub fn subscribe(&self, table: Table) -> TableSubscription {
        self.store.notifier().subscribe(table)
    }

    /// Connections and transactions currently held. Zero when idle.
    pub fn open_handles(&self) -> usize {
        self.store.open_handles()
    }

    /// Turns the cart into an order for `user_id`.
    ///
    /// ## What This Does
    /// In one transaction:
    /// 1. Reads the cart in storage order
    /// 2. Inserts an order stamped now, totalling the cart
    /// 3. Inserts one order line per cart line
    /// 4. Empties the cart
    ///
    /// Changes for `cart_items`, `orders` and `order_items` are published
    /// only after the commit.
    ///
    /// ## Returns
    /// * `Ok(PlacedOrder)` - the stored order and its lines
    /// * `Err(DbError::Domain(CoreError::EmptyCart))` - nothing to check out
    pub async fn checkout(&self, user_id: i64) -> DbResult<PlacedOrder> {
        let mut tx = self.store.begin().await?;

        let cart_items = cart::list_in(tx.conn()).await?;
        let order = Order::from_cart(user_id, &cart_items, Utc::now().timestamp_millis())?;

        let lines: Vec<OrderItem> = cart_items
            .iter()
            .map(|item| OrderItem::from_cart_item(0, item))
            .collect();
        let placed = order::place_in(tx.conn(), &order, &lines).await?;

        let cleared = cart::clear_in(tx.conn()).await?;

        tx.touch(Table::Orders);
        tx.touch(Table::OrderItems);
        tx.touch(Table::CartItems);
        tx.commit().await?;

        info!(
            user_id,
            order_id = ?placed.order.id,
            lines = placed.items.len(),
            cleared,
            total = placed.order.total,
            "Checkout complete"
        );

        Ok(placed)
    }

    /// Quick liveness probe.
    pub async fn health_check(&self) -> bool {
        match sqlx::query("SELECT 1").execute(self.pool()).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Health check failed");
                false
            }
        }
    }

    /// Closes the pool. Every later operation fails with
    /// `DbError::StoreUnavailable`; live queries end.
    pub async fn close(&self) {
        info!("Closing local store");
        self.store.pool().close().await;

        // Wake live queries so they observe the closed pool
        for table in Table::ALL {
            self.store.notifier().publish(table);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tienda_core::{CartItem, CoreError};

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);
        assert_eq!(db.open_handles(), 0);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/tienda.db")
            .max_connections(10)
            .min_connections(2)
            .idle_timeout(None)
            .notify_capacity(8);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.notify_capacity, 8);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn test_closed_database_is_unavailable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;

        assert!(!db.health_check().await);
        let err = db.cart().list().await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_checkout_empty_cart() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut orders = db.subscribe(Table::Orders);

        let err = db.checkout(1).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::EmptyCart)));
        assert_eq!(orders.drain(), 0);
        assert_eq!(db.open_handles(), 0);
    }

    #[tokio::test]
    async fn test_checkout_moves_cart_into_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let cart = db.cart();
        cart.insert(&CartItem::new(1, Some("Tea".to_string()), 2.5, 2))
            .await
            .unwrap();
        cart.insert(&CartItem::new(2, None, 1.0, 3)).await.unwrap();

        let placed = db.checkout(9).await.unwrap();
        let order_id = placed.order_id().unwrap();

        assert_eq!(placed.order.user_id, 9);
        assert!((placed.order.total - 8.0).abs() < 1e-9);
        assert!((placed.items_total() - placed.order.total).abs() < 1e-9);
        assert!(placed.items.iter().all(|i| i.order_id == order_id));
        assert_eq!(placed.items[0].product_name.as_deref(), Some("Tea"));

        assert_eq!(cart.count().await.unwrap(), 0);
        let stored = db.orders().get_items_for_order(order_id).await.unwrap();
        assert_eq!(stored, placed.items);
    }
}
