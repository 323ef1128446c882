//! Orders, order lines and checkout against a file-backed database.

mod common;

use futures_util::poll;
use tienda_core::{CartItem, CoreError, Order, OrderItem};
use tienda_db::{cancel_pair, cancellable, DbError, Table};

#[tokio::test]
async fn orders_sorted_newest_first() {
    let (_dir, db) = common::open().await;
    let orders = db.orders();
    for created_at in [100, 300, 200] {
        orders
            .insert_order(&Order::new(42, 1.0, created_at))
            .await
            .unwrap();
    }

    let stamps: Vec<i64> = orders
        .get_orders_by_user(42)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.created_at)
        .collect();
    assert_eq!(stamps, vec![300, 200, 100]);
}

#[tokio::test]
async fn bad_line_leaves_items_unchanged() {
    let (_dir, db) = common::open().await;
    let orders = db.orders();
    let order_id = orders.insert_order(&Order::new(1, 5.0, 1)).await.unwrap();
    orders
        .insert_items(&[OrderItem::new(order_id, Some("Existing".to_string()), 5.0, 1)])
        .await
        .unwrap();
    let before = orders.get_items_for_order(order_id).await.unwrap();

    let mut changes = db.subscribe(Table::OrderItems);
    let batch = [
        OrderItem::new(order_id, Some("Fine".to_string()), 1.0, 1),
        OrderItem::new(-1, Some("Orphan".to_string()), 1.0, 1),
    ];
    let err = orders.insert_items(&batch).await.unwrap_err();

    assert!(err.is_constraint_violation());
    assert_eq!(orders.get_items_for_order(order_id).await.unwrap(), before);
    assert_eq!(changes.drain(), 0);
}

#[tokio::test]
async fn items_in_storage_order() {
    let (_dir, db) = common::open().await;
    let orders = db.orders();
    let order_id = orders.insert_order(&Order::new(1, 6.0, 1)).await.unwrap();

    let names = ["c", "a", "b"];
    let lines: Vec<OrderItem> = names
        .iter()
        .map(|n| OrderItem::new(order_id, Some(n.to_string()), 2.0, 1))
        .collect();
    orders.insert_items(&lines).await.unwrap();

    let stored: Vec<String> = orders
        .get_items_for_order(order_id)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|i| i.product_name)
        .collect();
    assert_eq!(stored, names);
}

#[tokio::test]
async fn dropped_read_releases_connection() {
    let (_dir, db) = common::open().await;
    let orders = db.orders();
    orders.insert_order(&Order::new(3, 1.0, 10)).await.unwrap();

    {
        let mut fut = Box::pin(orders.get_orders_by_user(3));
        let _ = poll!(fut.as_mut());
    }

    assert_eq!(db.open_handles(), 0);
    assert_eq!(orders.get_orders_by_user(3).await.unwrap().len(), 1);
}

#[tokio::test]
async fn cancelled_read_reports_cancelled() {
    let (_dir, db) = common::open().await;
    let (handle, signal) = cancel_pair();
    handle.cancel();

    let result = cancellable(signal, db.orders().get_orders_by_user(3)).await;

    assert!(matches!(result, Err(DbError::Cancelled)));
    assert_eq!(db.open_handles(), 0);
}

#[tokio::test]
async fn cancelled_write_commits_nothing() {
    let (_dir, db) = common::open().await;
    let (handle, signal) = cancel_pair();
    handle.cancel();

    let result = cancellable(signal, db.orders().insert_order(&Order::new(3, 1.0, 10))).await;

    assert!(matches!(result, Err(DbError::Cancelled)));
    assert!(db.orders().get_orders_by_user(3).await.unwrap().is_empty());
}

#[tokio::test]
async fn checkout_end_to_end() {
    let (_dir, db) = common::open().await;
    let cart = db.cart();
    cart.add_product(1, Some("Pan"), 1.5).await.unwrap();
    cart.add_product(1, Some("Pan"), 1.5).await.unwrap();
    cart.add_product(2, Some("Leche"), 0.99).await.unwrap();
    let expected_total = cart.total().await.unwrap();

    let mut cart_changes = db.subscribe(Table::CartItems);
    let mut order_changes = db.subscribe(Table::Orders);
    let mut item_changes = db.subscribe(Table::OrderItems);

    let placed = db.checkout(11).await.unwrap();
    let order_id = placed.order_id().unwrap();

    assert!((placed.order.total - expected_total).abs() < 1e-9);
    assert_eq!(placed.items.len(), 2);
    assert_eq!(placed.items[0].quantity, 2);
    assert!(cart.list().await.unwrap().is_empty());

    let history = db.orders().get_orders_by_user(11).await.unwrap();
    assert_eq!(history, vec![placed.order.clone()]);
    assert_eq!(
        db.orders().get_items_for_order(order_id).await.unwrap(),
        placed.items
    );

    assert_eq!(cart_changes.drain(), 1);
    assert_eq!(order_changes.drain(), 1);
    assert_eq!(item_changes.drain(), 1);
    assert_eq!(db.open_handles(), 0);
}

#[tokio::test]
async fn checkout_of_empty_cart_fails_cleanly() {
    let (_dir, db) = common::open().await;

    let err = db.checkout(11).await.unwrap_err();

    assert!(matches!(err, DbError::Domain(CoreError::EmptyCart)));
    assert!(db.orders().get_orders_by_user(11).await.unwrap().is_empty());
}

#[tokio::test]
async fn checkout_keeps_cart_lines_as_snapshot() {
    let (_dir, db) = common::open().await;
    db.cart()
        .insert(&CartItem::new(8, Some("Queso".to_string()), 4.25, 3))
        .await
        .unwrap();

    let placed = db.checkout(2).await.unwrap();
    let line = &placed.items[0];

    assert_eq!(line.product_name.as_deref(), Some("Queso"));
    assert!((line.price - 4.25).abs() < 1e-9);
    assert_eq!(line.quantity, 3);
}

#[tokio::test]
async fn checkout_of_bulk_unnamed_line() {
    let (_dir, db) = common::open().await;
    db.cart()
        .insert(&CartItem::new(3, Some(String::new()), 0.5, 1000))
        .await
        .unwrap();

    let placed = db.checkout(4).await.unwrap();

    assert!((placed.order.total - 500.0).abs() < 1e-9);
    assert_eq!(placed.items[0].quantity, 1000);
    assert_eq!(placed.items[0].product_name.as_deref(), Some(""));
}
