//! # Validation Module
//!
//! Field rules checked before any record reaches the store.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Application layer                                            │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repository (Rust)                                            │
//! │  └── THIS MODULE: price and quantity rules                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (price >= 0, quantity >= 0)                     │
//! │  ├── PRIMARY KEY uniqueness                                            │
//! │  └── Foreign key order_items.orderId → orders.id                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tienda_core::validation::{validate_price, validate_quantity};
//!
//! validate_price("price", 49.99).unwrap();
//! validate_quantity(5).unwrap();
//! assert!(validate_price("price", f64::NAN).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::{CartItem, Order, OrderItem};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a decimal amount (unit price or order total).
///
/// ## Rules
/// - Must be finite (no NaN, no infinity)
/// - Must be non-negative; zero is allowed (free items)
pub fn validate_price(field: &str, value: f64) -> ValidationResult<()> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite {
            field: field.to_string(),
        });
    }

    if value < 0.0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a line quantity.
///
/// ## Rules
/// - Must be non-negative; there is no upper bound
pub fn validate_quantity(qty: i32) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::Negative {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates the numeric fields of a cart line. The name is free text.
pub fn validate_cart_item(item: &CartItem) -> ValidationResult<()> {
    validate_price("price", item.price)?;
    validate_quantity(item.quantity)
}

/// Validates an order header.
pub fn validate_order(order: &Order) -> ValidationResult<()> {
    validate_price("total", order.total)
}

/// Validates the numeric fields of an order line.
pub fn validate_order_item(item: &OrderItem) -> ValidationResult<()> {
    validate_price("price", item.price)?;
    validate_quantity(item.quantity)
}

// =============================================================================
// Unit Tests
// =============================================================================
