//! Payment workflow against a real database and the in-memory gateway.
//!
//! These tests require `TEST_DATABASE_URL`. Run with:
//! `cargo test -p tradewind-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use secrecy::SecretString;
use serde_json::json;
use sqlx::PgPool;

use tradewind_api::models::{Order, User};
use tradewind_api::services::orders::OrderService;
use tradewind_api::services::payments::{PaymentError, PaymentService, WebhookOutcome};
use tradewind_api::stripe::webhook::{PAYMENT_FAILED, PAYMENT_SUCCEEDED, signature_header};
use tradewind_api::stripe::{InMemoryGateway, IntentStatus};
use tradewind_core::{OrderId, OrderStatus, PaymentStatus, UserRole};
use tradewind_integration_tests::{
    WEBHOOK_SECRET, create_category, create_product, create_user, order_request, stripe_config,
    test_pool,
};

/// A customer with one pending order worth 118.80.
async fn pending_order(pool: &PgPool) -> (User, Order) {
    let seller = create_user(pool, UserRole::Seller).await;
    let customer = create_user(pool, UserRole::Customer).await;
    let category = create_category(pool).await;
    let shirt = create_product(pool, &seller, &category, "30.00", 10).await;
    let lamp = create_product(pool, &seller, &category, "50.00", 10).await;

    let order = OrderService::new(pool)
        .create_order(customer.id, &order_request(&[(shirt.id, 2), (lamp.id, 1)]))
        .await
        .unwrap();
    (customer, order)
}

fn event(event_id: &str, event_type: &str, intent_id: &str, order_id: OrderId) -> Vec<u8> {
    let status = if event_type == PAYMENT_SUCCEEDED {
        "succeeded"
    } else {
        "requires_payment_method"
    };
    serde_json::to_vec(&json!({
        "id": event_id,
        "type": event_type,
        "data": {
            "object": {
                "id": intent_id,
                "object": "payment_intent",
                "amount": 11880,
                "currency": "usd",
                "status": status,
                "metadata": { "order_id": order_id.to_string() }
            }
        }
    }))
    .unwrap()
}

fn new_event_id() -> String {
    format!("evt_{}", uuid::Uuid::new_v4().simple())
}

fn sign(payload: &[u8]) -> String {
    signature_header(
        payload,
        &SecretString::from(WEBHOOK_SECRET),
        Utc::now().timestamp(),
    )
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_intent_is_reused_for_the_same_order() {
    let pool = test_pool().await;
    let gateway = InMemoryGateway::new();
    let config = stripe_config();
    let (customer, order) = pending_order(&pool).await;

    let payments = PaymentService::new(&pool, &gateway, &config);
    let first = payments.create_intent(order.id, &customer).await.unwrap();
    let second = payments.create_intent(order.id, &customer).await.unwrap();

    assert_eq!(first.payment_intent_id, second.payment_intent_id);
    assert_eq!(gateway.intent_count(), 1);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_confirm_requires_succeeded_intent() {
    let pool = test_pool().await;
    let gateway = InMemoryGateway::new();
    let config = stripe_config();
    let (customer, order) = pending_order(&pool).await;

    let payments = PaymentService::new(&pool, &gateway, &config);
    let intent = payments.create_intent(order.id, &customer).await.unwrap();

    let err = payments
        .confirm(order.id, &intent.payment_intent_id, &customer)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::PaymentFailed { .. }));

    let unpaid = OrderService::new(&pool)
        .get_order(order.id, &customer)
        .await
        .unwrap();
    assert_eq!(unpaid.payment_status, PaymentStatus::Pending);

    assert!(gateway.set_status(&intent.payment_intent_id, IntentStatus::Succeeded));
    let paid = payments
        .confirm(order.id, &intent.payment_intent_id, &customer)
        .await
        .unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.status, OrderStatus::Confirmed);

    // Paid orders can't get a new intent
    assert!(matches!(
        payments.create_intent(order.id, &customer).await,
        Err(PaymentError::AlreadyPaid)
    ));
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_webhook_replay_is_idempotent() {
    let pool = test_pool().await;
    let gateway = InMemoryGateway::new();
    let config = stripe_config();
    let (customer, order) = pending_order(&pool).await;

    let payments = PaymentService::new(&pool, &gateway, &config);
    let intent = payments.create_intent(order.id, &customer).await.unwrap();

    let event_id = new_event_id();
    let payload = event(&event_id, PAYMENT_SUCCEEDED, &intent.payment_intent_id, order.id);

    let first = payments
        .handle_webhook(&payload, Some(&sign(&payload)))
        .await
        .unwrap();
    assert_eq!(first, WebhookOutcome::Applied);

    let after_first = OrderService::new(&pool)
        .get_order(order.id, &customer)
        .await
        .unwrap();

    let replay = payments
        .handle_webhook(&payload, Some(&sign(&payload)))
        .await
        .unwrap();
    assert_eq!(replay, WebhookOutcome::Duplicate);

    let after_replay = OrderService::new(&pool)
        .get_order(order.id, &customer)
        .await
        .unwrap();
    assert_eq!(after_first.payment_status, PaymentStatus::Paid);
    assert_eq!(after_first.status, OrderStatus::Confirmed);
    assert_eq!(after_replay.payment_status, after_first.payment_status);
    assert_eq!(after_replay.status, after_first.status);
    assert_eq!(after_replay.updated_at, after_first.updated_at);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_failed_event_after_success_keeps_order_paid() {
    let pool = test_pool().await;
    let gateway = InMemoryGateway::new();
    let config = stripe_config();
    let (customer, order) = pending_order(&pool).await;

    let payments = PaymentService::new(&pool, &gateway, &config);
    let intent = payments.create_intent(order.id, &customer).await.unwrap();

    let succeeded = event(
        &new_event_id(),
        PAYMENT_SUCCEEDED,
        &intent.payment_intent_id,
        order.id,
    );
    let failed = event(
        &new_event_id(),
        PAYMENT_FAILED,
        &intent.payment_intent_id,
        order.id,
    );

    payments
        .handle_webhook(&succeeded, Some(&sign(&succeeded)))
        .await
        .unwrap();
    payments
        .handle_webhook(&failed, Some(&sign(&failed)))
        .await
        .unwrap();

    let current = OrderService::new(&pool)
        .get_order(order.id, &customer)
        .await
        .unwrap();
    assert_eq!(current.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_tampered_webhook_rejected() {
    let pool = test_pool().await;
    let gateway = InMemoryGateway::new();
    let config = stripe_config();
    let (_, order) = pending_order(&pool).await;

    let payload = event("evt_tampered", PAYMENT_SUCCEEDED, "pi_unknown", order.id);
    let header = sign(&payload);
    let mut tampered = payload;
    tampered.extend_from_slice(b" ");

    let err = PaymentService::new(&pool, &gateway, &config)
        .handle_webhook(&tampered, Some(&header))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvalidSignature(_)));
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_event_for_unknown_order_is_acknowledged() {
    let pool = test_pool().await;
    let gateway = InMemoryGateway::new();
    let config = stripe_config();

    let payload = event(
        &new_event_id(),
        PAYMENT_SUCCEEDED,
        &format!("pi_{}", uuid::Uuid::new_v4().simple()),
        OrderId::generate(),
    );
    let payments = PaymentService::new(&pool, &gateway, &config);

    let first = payments
        .handle_webhook(&payload, Some(&sign(&payload)))
        .await
        .unwrap();
    assert_eq!(first, WebhookOutcome::Ignored);

    let replay = payments
        .handle_webhook(&payload, Some(&sign(&payload)))
        .await
        .unwrap();
    assert_eq!(replay, WebhookOutcome::Duplicate);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_cancelled_order_is_never_marked_paid() {
    let pool = test_pool().await;
    let gateway = InMemoryGateway::new();
    let config = stripe_config();
    let (customer, order) = pending_order(&pool).await;

    let payments = PaymentService::new(&pool, &gateway, &config);
    let intent = payments.create_intent(order.id, &customer).await.unwrap();
    OrderService::new(&pool)
        .cancel_order(order.id, &customer)
        .await
        .unwrap();
    assert!(gateway.set_status(&intent.payment_intent_id, IntentStatus::Succeeded));

    let payload = event(
        &new_event_id(),
        PAYMENT_SUCCEEDED,
        &intent.payment_intent_id,
        order.id,
    );
    let outcome = payments
        .handle_webhook(&payload, Some(&sign(&payload)))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);

    let err = payments
        .confirm(order.id, &intent.payment_intent_id, &customer)
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::OrderClosed(OrderStatus::Cancelled)));

    let current = OrderService::new(&pool)
        .get_order(order.id, &customer)
        .await
        .unwrap();
    assert_eq!(current.status, OrderStatus::Cancelled);
    assert_eq!(current.payment_status, PaymentStatus::Pending);
}
