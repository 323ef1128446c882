//! # tienda-db: Local Store for the Tienda App
//!
//! Typed repositories over the app's on-device SQLite database: the cart,
//! placed orders and their lines. Writes are transactional; committed
//! writes are announced per table so cart listings stay live.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tienda Data Flow                                 │
//! │                                                                         │
//! │  Cart screen / checkout / order history                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tienda-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌───────────────┐   │   │
//! │  │   │   Database    │   │  Repositories  │   │  LiveQuery    │   │   │
//! │  │   │   (pool.rs)   │◄──│  cart.rs       │──►│  (live.rs)    │   │   │
//! │  │   │   Store       │   │  order.rs      │   │       ▲       │   │   │
//! │  │   │  (store.rs)   │   └───────┬────────┘   └───────┼───────┘   │   │
//! │  │   └───────┬───────┘           │ Record +            │           │   │
//! │  │           │                   │ Statements          │           │   │
//! │  │           │                   ▼ (schema.rs)         │           │   │
//! │  │           │            commit ──► ChangeNotifier ───┘           │   │
//! │  │           │                       (notify.rs)                   │   │
//! │  └───────────┼─────────────────────────────────────────────────────┘   │
//! │              ▼                                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   SQLite: cart_items │ orders │ order_items                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - `DbConfig` and the `Database` handle
//! - [`store`] - Scoped connections, write transactions, handle counting
//! - [`schema`] - `Record` trait and statement templates
//! - [`repository`] - Cart and order repositories
//! - [`live`] - Re-running queries
//! - [`notify`] - Per-table change channel
//! - [`cancel`] - Explicit cancellation
//! - [`migrations`] - Embedded schema
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tienda_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/tienda.db")).await?;
//!
//! let cart = db.cart();
//! cart.add_product(42, Some("Coffee"), 3.5).await?;
//!
//! let mut live = cart.get_all();
//! let rows = live.next().await;
//!
//! let placed = db.checkout(user_id).await?;
//! let history = db.orders().get_orders_by_user(user_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cancel;
pub mod error;
pub mod live;
pub mod migrations;
pub mod notify;
pub mod pool;
pub mod repository;
pub mod schema;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use cancel::{cancel_pair, cancellable, CancelHandle, CancelSignal};
pub use error::{ConstraintKind, DbError, DbResult};
pub use live::LiveQuery;
pub use migrations::MigrationStatus;
pub use notify::{ChangeEvent, ChangeNotifier, Table, TableSubscription};
pub use pool::{Database, DbConfig};
pub use schema::Record;
pub use store::Store;

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::order::OrderRepository;
