//! # tienda-core: Records and Rules for the Tienda Local Store
//!
//! This crate holds the records persisted on-device by the Tienda shopping
//! app, plus the pure rules that apply to them. It performs zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tienda Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Application layer (out of workspace)               │   │
//! │  │     Cart screen ──► Checkout ──► Order history                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ in-process calls                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               tienda-db (Repositories, SQLite)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tienda-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐  ┌────────────┐  ┌────────────┐               │   │
//! │  │   │   types    │  │ validation │  │   error    │               │   │
//! │  │   │  CartItem  │  │   price    │  │ CoreError  │               │   │
//! │  │   │  Order     │  │  quantity  │  │ Validation │               │   │
//! │  │   │  OrderItem │  │  records   │  │   Error    │               │   │
//! │  │   └────────────┘  └────────────┘  └────────────┘               │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Records (CartItem, Order, OrderItem)
//! - [`error`] - Domain error types
//! - [`validation`] - Field rules checked before every write
//!
//! ## Example Usage
//!
//! ```rust
//! use tienda_core::{cart_total, CartItem};
//!
//! let cart = vec![
//!     CartItem::new(1, Some("Cafetera".to_string()), 49.99, 1),
//!     CartItem::new(4, Some("Taza térmica".to_string()), 12.99, 2),
//! ];
//!
//! assert!((cart_total(&cart) - 75.97).abs() < 1e-9);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;
