//! Order workflow against a real database.
//!
//! These tests require `TEST_DATABASE_URL` pointing at a disposable
//! `PostgreSQL` database. Run with:
//! `cargo test -p tradewind-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use tradewind_api::services::orders::{OrderError, OrderService, UpdateOrderStatus};
use tradewind_core::{OrderStatus, PaymentStatus, UserRole};
use tradewind_integration_tests::{
    create_category, create_product, create_user, inventory_of, order_request, test_pool,
};

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_create_order_prices_and_reserves_stock() {
    let pool = test_pool().await;
    let seller = create_user(&pool, UserRole::Seller).await;
    let customer = create_user(&pool, UserRole::Customer).await;
    let category = create_category(&pool).await;
    let shirt = create_product(&pool, &seller, &category, "30.00", 10).await;
    let lamp = create_product(&pool, &seller, &category, "50.00", 3).await;

    let order = OrderService::new(&pool)
        .create_order(customer.id, &order_request(&[(shirt.id, 2), (lamp.id, 1)]))
        .await
        .expect("order should be created");

    assert_eq!(order.subtotal, Decimal::new(11000, 2));
    assert_eq!(order.tax, Decimal::new(880, 2));
    assert_eq!(order.shipping, Decimal::ZERO);
    assert_eq!(order.total, Decimal::new(11880, 2));
    assert_eq!(order.total, order.subtotal + order.tax + order.shipping);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.items.len(), 2);
    assert!(order.order_number.starts_with("ORD-"));

    assert_eq!(inventory_of(&pool, shirt.id).await, 8);
    assert_eq!(inventory_of(&pool, lamp.id).await, 2);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_small_order_pays_shipping() {
    let pool = test_pool().await;
    let seller = create_user(&pool, UserRole::Seller).await;
    let customer = create_user(&pool, UserRole::Customer).await;
    let category = create_category(&pool).await;
    let book = create_product(&pool, &seller, &category, "12.99", 5).await;

    let order = OrderService::new(&pool)
        .create_order(customer.id, &order_request(&[(book.id, 1)]))
        .await
        .expect("order should be created");

    assert_eq!(order.shipping, Decimal::new(10, 0));
    assert_eq!(order.total, order.subtotal + order.tax + order.shipping);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_insufficient_inventory_changes_nothing() {
    let pool = test_pool().await;
    let seller = create_user(&pool, UserRole::Seller).await;
    let customer = create_user(&pool, UserRole::Customer).await;
    let category = create_category(&pool).await;
    let plenty = create_product(&pool, &seller, &category, "10.00", 100).await;
    let scarce = create_product(&pool, &seller, &category, "10.00", 1).await;

    let service = OrderService::new(&pool);
    let err = service
        .create_order(customer.id, &order_request(&[(plenty.id, 5), (scarce.id, 2)]))
        .await
        .expect_err("order should fail");

    match err {
        OrderError::InsufficientInventory {
            requested,
            available,
            ..
        } => {
            assert_eq!(requested, 2);
            assert_eq!(available, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(inventory_of(&pool, plenty.id).await, 100);
    assert_eq!(inventory_of(&pool, scarce.id).await, 1);
    assert!(service.list_user_orders(customer.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_concurrent_orders_cannot_oversell() {
    let pool = test_pool().await;
    let seller = create_user(&pool, UserRole::Seller).await;
    let first = create_user(&pool, UserRole::Customer).await;
    let second = create_user(&pool, UserRole::Customer).await;
    let category = create_category(&pool).await;
    let product = create_product(&pool, &seller, &category, "20.00", 5).await;

    let service = OrderService::new(&pool);
    let request = order_request(&[(product.id, 5)]);
    let (a, b) = tokio::join!(
        service.create_order(first.id, &request),
        service.create_order(second.id, &request),
    );

    assert_eq!(
        usize::from(a.is_ok()) + usize::from(b.is_ok()),
        1,
        "exactly one order may take the last units: {a:?} / {b:?}"
    );
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(
        loser,
        Err(OrderError::InsufficientInventory { available: 0, .. })
    ));
    assert_eq!(inventory_of(&pool, product.id).await, 0);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_cancel_restocks_exact_quantities() {
    let pool = test_pool().await;
    let seller = create_user(&pool, UserRole::Seller).await;
    let customer = create_user(&pool, UserRole::Customer).await;
    let category = create_category(&pool).await;
    let product = create_product(&pool, &seller, &category, "15.00", 10).await;

    let service = OrderService::new(&pool);
    let order = service
        .create_order(customer.id, &order_request(&[(product.id, 3), (product.id, 1)]))
        .await
        .unwrap();
    assert_eq!(inventory_of(&pool, product.id).await, 6);

    let cancelled = service.cancel_order(order.id, &customer).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());
    assert_eq!(inventory_of(&pool, product.id).await, 10);

    // A second cancellation must not restock again
    let err = service.cancel_order(order.id, &customer).await.unwrap_err();
    assert!(matches!(err, OrderError::CannotBeCancelled(OrderStatus::Cancelled)));
    assert_eq!(inventory_of(&pool, product.id).await, 10);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_status_workflow_and_permissions() {
    let pool = test_pool().await;
    let seller = create_user(&pool, UserRole::Seller).await;
    let customer = create_user(&pool, UserRole::Customer).await;
    let stranger = create_user(&pool, UserRole::Customer).await;
    let category = create_category(&pool).await;
    let product = create_product(&pool, &seller, &category, "40.00", 4).await;

    let service = OrderService::new(&pool);
    let order = service
        .create_order(customer.id, &order_request(&[(product.id, 1)]))
        .await
        .unwrap();

    let to = |status| UpdateOrderStatus {
        status,
        tracking_number: None,
        notes: None,
    };

    let err = service
        .update_status(order.id, &to(OrderStatus::Confirmed), &customer)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Forbidden(_)));

    let err = service
        .update_status(order.id, &to(OrderStatus::Delivered), &seller)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidStatusTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Delivered
        }
    ));

    let confirmed = service
        .update_status(order.id, &to(OrderStatus::Confirmed), &seller)
        .await
        .unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);

    assert!(matches!(
        service.get_order(order.id, &stranger).await,
        Err(OrderError::OrderNotFound)
    ));
    assert_eq!(
        service.get_order(order.id, &seller).await.unwrap().id,
        order.id
    );
}
