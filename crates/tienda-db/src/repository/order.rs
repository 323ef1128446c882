//! # Order Repository
//!
//! Database operations for `orders` and `order_items`.
//!
//! ## Conflict Policy
//! Both tables insert-or-replace: writing an existing identity overwrites
//! the row. Order lines are not cascaded, so replacing an order keeps the
//! lines that point at it.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Order Writes                                     │
//! │                                                                         │
//! │  insert_order(order)          one tx ─► orders                         │
//! │  insert_items([item, ...])    one tx ─► order_items (all or nothing)   │
//! │  place_order(order, items)    one tx ─► orders + order_items           │
//! │  Database::checkout(user)     one tx ─► cart_items + orders + items    │
//! │                                                                         │
//! │  A line whose orderId names no order fails the foreign key and rolls   │
//! │  back its whole transaction.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::OnceLock;

use sqlx::SqliteConnection;
use tracing::debug;

use tienda_core::validation::{validate_order, validate_order_item};
use tienda_core::{Order, OrderItem, PlacedOrder};

use crate::error::DbResult;
use crate::notify::Table;
use crate::schema::{
    insert_record, Column, ConflictPolicy, Record, SqliteQuery, Statements, StorageType,
};
use crate::store::Store;

// =============================================================================
// Record Mapping
// =============================================================================

impl Record for Order {
    const TABLE: Table = Table::Orders;
    const ENTITY: &'static str = "Order";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", StorageType::Integer, true),
        Column::new("userId", StorageType::Integer, false),
        Column::new("total", StorageType::Real, false),
        Column::new("createdAt", StorageType::Integer, false),
    ];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn bind_columns<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.id)
            .bind(self.user_id)
            .bind(self.total)
            .bind(self.created_at)
    }
}

impl Record for OrderItem {
    const TABLE: Table = Table::OrderItems;
    const ENTITY: &'static str = "OrderItem";
    const COLUMNS: &'static [Column] = &[
        Column::new("id", StorageType::Integer, true),
        Column::new("orderId", StorageType::Integer, false),
        Column::new("productName", StorageType::Text, true),
        Column::new("price", StorageType::Real, false),
        Column::new("quantity", StorageType::Integer, false),
    ];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn bind_columns<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.id)
            .bind(self.order_id)
            .bind(self.product_name.clone())
            .bind(self.price)
            .bind(self.quantity)
    }
}

struct OrderSql {
    orders: Statements,
    items: Statements,
    by_user: String,
    by_id: String,
    items_for_order: String,
}

fn sql() -> &'static OrderSql {
    static SQL: OnceLock<OrderSql> = OnceLock::new();
    SQL.get_or_init(|| {
        let orders = Statements::for_record::<Order>();
        let items = Statements::for_record::<OrderItem>();
        OrderSql {
            by_user: format!(
                "{} WHERE userId = ?1 ORDER BY createdAt DESC, id DESC",
                orders.select
            ),
            by_id: format!("{} WHERE id = ?1", orders.select),
            items_for_order: format!("{} WHERE orderId = ?1 ORDER BY id", items.select),
            orders,
            items,
        }
    })
}

async fn insert_lines(conn: &mut SqliteConnection, items: &[OrderItem]) -> DbResult<Vec<i64>> {
    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        ids.push(insert_record(conn, &sql().items, ConflictPolicy::Replace, item).await?);
    }
    Ok(ids)
}

/// Writes an order and its lines on `conn`, pointing every line at the
/// stored order.
pub(crate) async fn place_in(
    conn: &mut SqliteConnection,
    order: &Order,
    items: &[OrderItem],
) -> DbResult<PlacedOrder> {
    validate_order(order)?;
    for item in items {
        validate_order_item(item)?;
    }

    let order_id = insert_record(conn, &sql().orders, ConflictPolicy::Replace, order).await?;

    let mut lines: Vec<OrderItem> = items
        .iter()
        .map(|item| OrderItem {
            order_id,
            ..item.clone()
        })
        .collect();
    let ids = insert_lines(conn, &lines).await?;
    for (line, id) in lines.iter_mut().zip(ids) {
        line.id = Some(id);
    }

    Ok(PlacedOrder {
        order: Order {
            id: Some(order_id),
            ..order.clone()
        },
        items: lines,
    })
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for placed orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    store: Store,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(store: Store) -> Self {
        OrderRepository { store }
    }

    /// Inserts or replaces an order.
    ///
    /// ## Returns
    /// The identity used: `order.id` when set, otherwise the one assigned.
    pub async fn insert_order(&self, order: &Order) -> DbResult<i64> {
        validate_order(order)?;
        debug!(id = ?order.id, user_id = order.user_id, "Inserting order");

        let mut tx = self.store.begin().await?;
        let id = insert_record(tx.conn(), &sql().orders, ConflictPolicy::Replace, order).await?;
        tx.touch(Table::Orders);
        tx.commit().await?;

        Ok(id)
    }

    /// Inserts or replaces order lines, all in one transaction.
    ///
    /// ## Returns
    /// * `Ok(ids)` - identities in input order (empty input writes nothing)
    /// * `Err(e)` - no line was written
    pub async fn insert_items(&self, items: &[OrderItem]) -> DbResult<Vec<i64>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        for item in items {
            validate_order_item(item)?;
        }
        debug!(count = items.len(), "Inserting order items");

        let mut tx = self.store.begin().await?;
        let ids = insert_lines(tx.conn(), items).await?;
        tx.touch(Table::OrderItems);
        tx.commit().await?;

        Ok(ids)
    }

    /// Writes an order and its lines together.
    ///
    /// ## Arguments
    /// * `order` - the order, `id: None` to let the store assign one
    /// * `items` - its lines; their `order_id` is overwritten with the
    ///   stored order's identity
    pub async fn place_order(&self, order: &Order, items: &[OrderItem]) -> DbResult<PlacedOrder> {
        let mut tx = self.store.begin().await?;
        let placed = place_in(tx.conn(), order, items).await?;
        tx.touch(Table::Orders);
        if !placed.items.is_empty() {
            tx.touch(Table::OrderItems);
        }
        tx.commit().await?;

        debug!(order_id = ?placed.order.id, lines = placed.items.len(), "Order placed");
        Ok(placed)
    }

    /// A user's orders, newest first (ties broken by higher id first).
    pub async fn get_orders_by_user(&self, user_id: i64) -> DbResult<Vec<Order>> {
        let mut conn = self.store.acquire().await?;
        let orders = sqlx::query_as::<_, Order>(&sql().by_user)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        debug!(user_id, count = orders.len(), "Loaded orders");
        Ok(orders)
    }

    /// One order by identity.
    pub async fn get_order(&self, id: i64) -> DbResult<Option<Order>> {
        let mut conn = self.store.acquire().await?;
        let order = sqlx::query_as::<_, Order>(&sql().by_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(order)
    }

    /// Lines of one order in storage order.
    pub async fn get_items_for_order(&self, order_id: i64) -> DbResult<Vec<OrderItem>> {
        let mut conn = self.store.acquire().await?;
        let items = sqlx::query_as::<_, OrderItem>(&sql().items_for_order)
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};

    async fn setup() -> (Database, OrderRepository) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let orders = db.orders();
        (db, orders)
    }

    #[tokio::test]
    async fn test_orders_newest_first() {
        let (_db, orders) = setup().await;
        for created_at in [100, 300, 200] {
            orders.insert_order(&Order::new(1, 10.0, created_at)).await.unwrap();
        }
        orders.insert_order(&Order::new(2, 10.0, 999)).await.unwrap();

        let stamps: Vec<i64> = orders
            .get_orders_by_user(1)
            .await
            .unwrap()
            .iter()
            .map(|o| o.created_at)
            .collect();
        assert_eq!(stamps, vec![300, 200, 100]);
    }

    #[tokio::test]
    async fn test_equal_timestamps_break_by_id() {
        let (_db, orders) = setup().await;
        let a = orders.insert_order(&Order::new(1, 1.0, 500)).await.unwrap();
        let b = orders.insert_order(&Order::new(1, 2.0, 500)).await.unwrap();

        let ids: Vec<Option<i64>> = orders
            .get_orders_by_user(1)
            .await
            .unwrap()
            .iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![Some(b), Some(a)]);
    }

    #[tokio::test]
    async fn test_insert_order_replaces_existing_identity() {
        let (_db, orders) = setup().await;
        let id = orders.insert_order(&Order::new(1, 10.0, 100)).await.unwrap();

        let replacement = Order {
            id: Some(id),
            ..Order::new(1, 25.0, 200)
        };
        assert_eq!(orders.insert_order(&replacement).await.unwrap(), id);

        assert_eq!(orders.get_order(id).await.unwrap(), Some(replacement));
        assert_eq!(orders.get_orders_by_user(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_replacing_order_keeps_its_lines() {
        let (_db, orders) = setup().await;
        let id = orders.insert_order(&Order::new(1, 10.0, 100)).await.unwrap();
        orders
            .insert_items(&[
                OrderItem::new(id, Some("Cafetera".to_string()), 5.0, 1000),
                OrderItem::new(id, Some(String::new()), 0.0, 1),
            ])
            .await
            .unwrap();
        let lines = orders.get_items_for_order(id).await.unwrap();
        assert_eq!(lines.len(), 2);

        let replacement = Order {
            id: Some(id),
            ..Order::new(1, 5000.0, 200)
        };
        orders.insert_order(&replacement).await.unwrap();

        assert_eq!(orders.get_order(id).await.unwrap(), Some(replacement));
        assert_eq!(orders.get_items_for_order(id).await.unwrap(), lines);
        assert_eq!(lines[0].quantity, 1000);
        assert_eq!(lines[1].product_name.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_insert_items_all_or_nothing() {
        let (_db, orders) = setup().await;
        let order_id = orders.insert_order(&Order::new(1, 3.0, 1)).await.unwrap();

        let good = OrderItem::new(order_id, Some("Tea".to_string()), 1.0, 1);
        let orphan = OrderItem::new(order_id + 1000, Some("Ghost".to_string()), 2.0, 1);

        let err = orders
            .insert_items(&[good.clone(), orphan])
            .await
            .unwrap_err();
        assert!(err.is_constraint_violation());
        assert!(orders.get_items_for_order(order_id).await.unwrap().is_empty());

        let ids = orders.insert_items(&[good.clone(), good]).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(orders.get_items_for_order(order_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_no_items_is_ok() {
        let (db, orders) = setup().await;
        let mut sub = db.subscribe(Table::OrderItems);

        assert!(orders.insert_items(&[]).await.unwrap().is_empty());
        assert_eq!(sub.drain(), 0);
    }

    #[tokio::test]
    async fn test_place_order_links_lines() {
        let (_db, orders) = setup().await;
        let lines = vec![
            OrderItem::new(0, Some("Bread".to_string()), 2.0, 1),
            OrderItem::new(0, None, 0.5, 4),
        ];

        let placed = orders
            .place_order(&Order::new(5, 4.0, 42), &lines)
            .await
            .unwrap();
        let order_id = placed.order_id().unwrap();

        assert!(placed.items.iter().all(|i| i.order_id == order_id && i.id.is_some()));
        assert_eq!(
            orders.get_items_for_order(order_id).await.unwrap(),
            placed.items
        );
    }

    #[tokio::test]
    async fn test_invalid_total_rejected() {
        let (_db, orders) = setup().await;
        let err = orders
            .insert_order(&Order::new(1, f64::NAN, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));
    }

    #[tokio::test]
    async fn test_absent_order_reads() {
        let (_db, orders) = setup().await;
        assert_eq!(orders.get_order(1).await.unwrap(), None);
        assert!(orders.get_orders_by_user(1).await.unwrap().is_empty());
        assert!(orders.get_items_for_order(1).await.unwrap().is_empty());
    }
}
