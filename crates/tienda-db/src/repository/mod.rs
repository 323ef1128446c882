//! # Repository Module
//!
//! Typed access to the three local tables.
//!
//! ## Request Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Call                                      │
//! │                                                                         │
//! │  caller: db.cart().insert(&item)                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate (tienda-core)  ── bad field ──► DbError::Domain              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  store.begin()           ← WriteTx, counted in open_handles            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Record::bind_columns + Statements::insert_abort                       │
//! │       │                                                                 │
//! │       ├── constraint fails ──► tx dropped, ROLLBACK, error returned    │
//! │       ▼                                                                 │
//! │  tx.touch(Table::CartItems); tx.commit()                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ChangeNotifier::publish ──► live queries re-read                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads acquire a pooled connection instead of a transaction. Every
//! future here may be dropped at any await point; the connection is
//! released and an open transaction rolls back.
//!
//! ## Available Repositories
//!
//! - [`CartRepository`](cart::CartRepository) - cart lines, live listing
//! - [`OrderRepository`](order::OrderRepository) - orders and their lines

pub mod cart;
pub mod order;
