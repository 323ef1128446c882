//! # Records
//!
//! The three records persisted by the local store.
//!
//! ## Record Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Records                                      │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    CartItem     │   │      Order      │   │    OrderItem    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │◄──│  order_id (FK)  │       │
//! │  │  product_id     │   │  user_id        │   │  product_name   │       │
//! │  │  name           │   │  total          │   │  price          │       │
//! │  │  price          │   │  created_at     │   │  quantity       │       │
//! │  │  quantity       │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every record carries `id: Option<i64>`:
//! - `None`: the store assigns the next rowid on insert
//! - `Some(id)`: the caller asserts that identity
//!
//! Field names serialize as camelCase, matching the column names.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Cart Item
// =============================================================================

/// A line in the shopping cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "camelCase"))]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Row identity, `None` until stored.
    pub id: Option<i64>,

    /// Catalogue product this line refers to.
    pub product_id: i32,

    /// Display name copied from the product when added.
    pub name: Option<String>,

    /// Unit price copied from the product when added.
    pub price: f64,

    /// Units in the cart.
    pub quantity: i32,
}

impl CartItem {
    /// Creates an unsaved cart line.
    pub fn new(product_id: i32, name: Option<String>, price: f64, quantity: i32) -> Self {
        CartItem {
            id: None,
            product_id,
            name,
            price,
            quantity,
        }
    }

    /// Returns a copy with a different quantity.
    pub fn with_quantity(&self, quantity: i32) -> Self {
        CartItem {
            quantity,
            ..self.clone()
        }
    }

    /// Price × quantity for this line.
    #[inline]
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Sum of every line total in a cart (0.0 when empty).
pub fn cart_total(items: &[CartItem]) -> f64 {
    items.iter().map(CartItem::line_total).sum()
}

// =============================================================================
// Order
// =============================================================================

/// A placed order. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "camelCase"))]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Option<i64>,
    pub user_id: i64,
    pub total: f64,
    /// Placement time in milliseconds since the Unix epoch.
    pub created_at: i64,
}

impl Order {
    /// Creates an unsaved order.
    pub fn new(user_id: i64, total: f64, created_at: i64) -> Self {
        Order {
            id: None,
            user_id,
            total,
            created_at,
        }
    }

    /// Builds the order for checking out `cart`.
    ///
    /// ## Returns
    /// * `Ok(Order)` - total is the cart total
    /// * `Err(CoreError::EmptyCart)` - nothing to order
    pub fn from_cart(user_id: i64, cart: &[CartItem], created_at: i64) -> CoreResult<Self> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart);
        }

        Ok(Order::new(user_id, cart_total(cart), created_at))
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line of a placed order.
/// Product data is copied so history survives catalogue changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "camelCase"))]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Option<i64>,
    /// Parent order (non-owning back-reference).
    pub order_id: i64,
    pub product_name: Option<String>,
    pub price: f64,
    pub quantity: i32,
}

impl OrderItem {
    /// Creates an unsaved order line.
    pub fn new(order_id: i64, product_name: Option<String>, price: f64, quantity: i32) -> Self {
        OrderItem {
            id: None,
            order_id,
            product_name,
            price,
            quantity,
        }
    }

    /// Snapshots a cart line into an order line.
    pub fn from_cart_item(order_id: i64, item: &CartItem) -> Self {
        OrderItem::new(order_id, item.name.clone(), item.price, item.quantity)
    }

    /// Price × quantity for this line.
    #[inline]
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

// =============================================================================
// Placed Order
// =============================================================================

/// An order together with its stored lines, as returned by checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl PlacedOrder {
    /// Identity of the stored order.
    pub fn order_id(&self) -> Option<i64> {
        self.order.id
    }

    /// Sum of the line totals (matches `order.total` for a checkout).
    pub fn items_total(&self) -> f64 {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cart() -> Vec<CartItem> {
        vec![
            CartItem::new(100, Some("Test Product".to_string()), 49.99, 3),
            CartItem::new(200, None, 10.0, 1),
        ]
    }

    #[test]
    fn test_new_cart_item_has_no_identity() {
        let item = CartItem::new(100, Some("Test Product".to_string()), 49.99, 5);
        assert_eq!(item.id, None);
        assert_eq!(item.product_id, 100);
        assert_eq!(item.quantity, 5);
    }

    #[test]
    fn test_line_total() {
        let item = CartItem::new(100, None, 49.99, 3);
        assert!((item.line_total() - 149.97).abs() < 0.001);
    }

    #[test]
    fn test_cart_total() {
        assert!((cart_total(&sample_cart()) - 159.97).abs() < 0.001);
        assert_eq!(cart_total(&[]), 0.0);
    }

    #[test]
    fn test_cart_item_equality() {
        let a = CartItem {
            id: Some(1),
            ..CartItem::new(100, Some("Test Product".to_string()), 49.99, 5)
        };
        assert_eq!(a, a.clone());
        assert_ne!(a, a.with_quantity(10));
        assert_ne!(a, CartItem { id: Some(2), ..a.clone() });
    }

    #[test]
    fn test_order_from_cart() {
        let order = Order::from_cart(7, &sample_cart(), 1_700_000_000_000).unwrap();
        assert_eq!(order.id, None);
        assert_eq!(order.user_id, 7);
        assert!((order.total - 159.97).abs() < 0.001);
        assert_eq!(order.created_at, 1_700_000_000_000);
    }

    #[test]
    fn test_order_from_empty_cart_fails() {
        let err = Order::from_cart(7, &[], 0).unwrap_err();
        assert!(matches!(err, CoreError::EmptyCart));
    }

    #[test]
    fn test_order_item_from_cart_item() {
        let cart = sample_cart();
        let line = OrderItem::from_cart_item(42, &cart[0]);
        assert_eq!(line.order_id, 42);
        assert_eq!(line.product_name.as_deref(), Some("Test Product"));
        assert_eq!(line.quantity, 3);
        assert!((line.line_total() - cart[0].line_total()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_serializes_camel_case() {
        let item = CartItem::new(100, None, 1.5, 2);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["productId"], 100);
        assert!(json["id"].is_null());
    }
}
