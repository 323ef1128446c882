//! # Cart Repository
//!
//! Database operations for the `cart_items` table.
//!
//! ## Conflict Policy
//! Inserts and updates abort on an identity clash: the existing row is
//! left untouched and the caller gets `ConstraintViolation(Unique)`.
//!
//! ## Quantity Changes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_product(42, "Coffee", 3.5)                                        │
//! │       │                                                                 │
//! │       ├── line for 42 exists? ──► quantity + 1 (UPDATE)                │
//! │       └── no                  ──► new line, quantity 1 (INSERT)        │
//! │                                                                         │
//! │  change_quantity(42, delta)                                            │
//! │       │                                                                 │
//! │       ├── no line        ──► Ok(None), nothing written                 │
//! │       ├── result <= 0    ──► line deleted, Ok(None)                    │
//! │       ├── past i32::MAX  ──► CoreError::QuantityOverflow               │
//! │       └── otherwise      ──► UPDATE, Ok(Some(line))                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::OnceLock;

use sqlx::SqliteConnection;
use tracing::debug;

use tienda_core::validation::{validate_cart_item, validate_price};
use tienda_core::{CartItem, CoreError};

use crate::error::{DbError, DbResult};
use crate::live::LiveQuery;
use crate::notify::Table;
use crate::schema::{
    clear_table, delete_by_id, insert_record, update_record, Column, ConflictPolicy, Record,
    SqliteQuery, Statements, StorageType,
};
use crate::store::Store;

// =============================================================================
// Record Mapping
// =============================================================================

impl Record for CartItem {
    const TABLE: Table = Table::CartItems;
    const ENTITY: &'static str = "CartItem";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", StorageType::Integer, true),
        Column::new("productId", StorageType::Integer, false),
        Column::new("name", StorageType::Text, true),
        Column::new("price", StorageType::Real, false),
        Column::new("quantity", StorageType::Integer, false),
    ];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn bind_columns<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.id)
            .bind(self.product_id)
            .bind(self.name.clone())
            .bind(self.price)
            .bind(self.quantity)
    }
}

struct CartSql {
    base: Statements,
    list: String,
    by_product: String,
}

fn sql() -> &'static CartSql {
    static SQL: OnceLock<CartSql> = OnceLock::new();
    SQL.get_or_init(|| {
        let base = Statements::for_record::<CartItem>();
        CartSql {
            list: format!("{} ORDER BY id", base.select),
            by_product: format!("{} WHERE productId = ?1 ORDER BY id LIMIT 1", base.select),
            base,
        }
    })
}

// Connection-level helpers, shared with checkout.

pub(crate) async fn list_in(conn: &mut SqliteConnection) -> DbResult<Vec<CartItem>> {
    let items = sqlx::query_as::<_, CartItem>(&sql().list)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

pub(crate) async fn clear_in(conn: &mut SqliteConnection) -> DbResult<u64> {
    clear_table(conn, &sql().base).await
}

async fn find_by_product(
    conn: &mut SqliteConnection,
    product_id: i32,
) -> DbResult<Option<CartItem>> {
    let item = sqlx::query_as::<_, CartItem>(&sql().by_product)
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(item)
}

fn unassigned() -> DbError {
    DbError::not_found(CartItem::ENTITY, "unassigned")
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the shopping cart.
///
/// ## Usage
/// ```rust,ignore
/// let cart = db.cart();
///
/// let line = cart.add_product(42, Some("Coffee"), 3.5).await?;
/// let mut live = cart.get_all();
/// while let Some(rows) = live.next().await {
///     render(rows?);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CartRepository {
    store: Store,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(store: Store) -> Self {
        CartRepository { store }
    }

    /// Inserts a line.
    ///
    /// ## Arguments
    /// * `item` - `id: None` lets the store assign the next identity
    ///
    /// ## Returns
    /// * `Ok(CartItem)` - the stored line, identity filled in
    /// * `Err(DbError::ConstraintViolation)` - the identity is taken
    pub async fn insert(&self, item: &CartItem) -> DbResult<CartItem> {
        validate_cart_item(item)?;
        debug!(id = ?item.id, product_id = item.product_id, "Inserting cart item");

        let mut tx = self.store.begin().await?;
        let id = insert_record(tx.conn(), &sql().base, ConflictPolicy::Abort, item).await?;
        tx.touch(Table::CartItems);
        tx.commit().await?;

        Ok(CartItem {
            id: Some(id),
            ..item.clone()
        })
    }

    /// Replaces every field of the line with `item.id`.
    ///
    /// ## Returns
    /// * `Ok(())` - row rewritten
    /// * `Err(DbError::NotFound)` - no such row, or `item.id` is `None`
    pub async fn update(&self, item: &CartItem) -> DbResult<()> {
        let id = item.id.ok_or_else(unassigned)?;
        validate_cart_item(item)?;
        debug!(id, quantity = item.quantity, "Updating cart item");

        let mut tx = self.store.begin().await?;
        if update_record(tx.conn(), &sql().base, item).await? == 0 {
            return Err(DbError::not_found(CartItem::ENTITY, id.to_string()));
        }
        tx.touch(Table::CartItems);
        tx.commit().await
    }

    /// Removes the line with `item.id`. Absent rows are a no-op.
    ///
    /// ## Returns
    /// Whether a row was removed.
    pub async fn delete(&self, item: &CartItem) -> DbResult<bool> {
        let Some(id) = item.id else {
            return Ok(false);
        };
        debug!(id, "Deleting cart item");

        let mut tx = self.store.begin().await?;
        let removed = delete_by_id(tx.conn(), &sql().base, id).await? > 0;
        if removed {
            tx.touch(Table::CartItems);
        }
        tx.commit().await?;

        Ok(removed)
    }

    /// Removes every line. Clearing an empty cart succeeds.
    ///
    /// ## Returns
    /// Number of lines removed.
    pub async fn clear(&self) -> DbResult<u64> {
        let mut tx = self.store.begin().await?;
        let removed = clear_in(tx.conn()).await?;
        if removed > 0 {
            tx.touch(Table::CartItems);
        }
        tx.commit().await?;

        debug!(removed, "Cart cleared");
        Ok(removed)
    }

    /// Live listing of the cart in storage order.
    ///
    /// The first `next()` yields the current rows; each later one waits for
    /// a committed cart write and yields the rows again. Every call returns
    /// an independent query; drop it to unsubscribe.
    pub fn get_all(&self) -> LiveQuery<CartItem> {
        LiveQuery::new(self.store.clone(), sql().list.clone())
    }

    /// One-shot listing in storage order.
    pub async fn list(&self) -> DbResult<Vec<CartItem>> {
        let mut conn = self.store.acquire().await?;
        list_in(&mut conn).await
    }

    /// First line for `product_id`, or `None`.
    pub async fn get_by_product_id(&self, product_id: i32) -> DbResult<Option<CartItem>> {
        let mut conn = self.store.acquire().await?;
        find_by_product(&mut conn, product_id).await
    }

    /// Adds one unit of a product.
    ///
    /// ## Arguments
    /// * `product_id` - catalogue product
    /// * `name` / `price` - copied onto a new line; an existing line keeps
    ///   its own
    ///
    /// ## Returns
    /// The line after the change.
    pub async fn add_product(
        &self,
        product_id: i32,
        name: Option<&str>,
        price: f64,
    ) -> DbResult<CartItem> {
        validate_price("price", price)?;

        let mut tx = self.store.begin().await?;

        let line = match find_by_product(tx.conn(), product_id).await? {
            Some(existing) => {
                let quantity = checked_quantity(existing.quantity, 1)?;
                let updated = existing.with_quantity(quantity);
                update_record(tx.conn(), &sql().base, &updated).await?;
                updated
            }
            None => {
                let fresh = CartItem::new(product_id, name.map(str::to_owned), price, 1);
                validate_cart_item(&fresh)?;
                let id =
                    insert_record(tx.conn(), &sql().base, ConflictPolicy::Abort, &fresh).await?;
                CartItem {
                    id: Some(id),
                    ..fresh
                }
            }
        };

        tx.touch(Table::CartItems);
        tx.commit().await?;

        debug!(product_id, quantity = line.quantity, "Product added to cart");
        Ok(line)
    }

    /// Adjusts the quantity of a product's line by `delta`.
    ///
    /// ## Returns
    /// * `Ok(Some(line))` - the updated line
    /// * `Ok(None)` - the line was removed, or never existed
    /// * `Err(DbError::Domain(CoreError::QuantityOverflow))` - past `i32::MAX`
    pub async fn change_quantity(&self, product_id: i32, delta: i32) -> DbResult<Option<CartItem>> {
        let mut tx = self.store.begin().await?;

        let Some(existing) = find_by_product(tx.conn(), product_id).await? else {
            return Ok(None);
        };
        let Some(id) = existing.id else {
            return Err(unassigned());
        };

        let requested = i64::from(existing.quantity) + i64::from(delta);
        let line = if requested <= 0 {
            delete_by_id(tx.conn(), &sql().base, id).await?;
            None
        } else {
            let updated = existing.with_quantity(checked_quantity(existing.quantity, delta)?);
            update_record(tx.conn(), &sql().base, &updated).await?;
            Some(updated)
        };

        tx.touch(Table::CartItems);
        tx.commit().await?;

        debug!(product_id, delta, requested, "Cart quantity changed");
        Ok(line)
    }

    /// Σ price × quantity over the cart (0.0 when empty).
    pub async fn total(&self) -> DbResult<f64> {
        let mut conn = self.store.acquire().await?;
        let total: f64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(price * quantity), 0.0) FROM cart_items")
                .fetch_one(&mut *conn)
                .await?;
        Ok(total)
    }

    /// Number of lines.
    pub async fn count(&self) -> DbResult<u64> {
        let mut conn = self.store.acquire().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items")
            .fetch_one(&mut *conn)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn checked_quantity(current: i32, delta: i32) -> DbResult<i32> {
    match current.checked_add(delta) {
        Some(quantity) => Ok(quantity.max(0)),
        None => Err(CoreError::QuantityOverflow { current, delta }.into()),
    }
}
