//! Payment workflow.
//!
//! Payment intents are created and confirmed against a [`PaymentGateway`];
//! signed gateway events are reconciled onto orders. Every event id is
//! recorded in the same transaction as the order change it causes, so a
//! redelivered event is acknowledged without being applied twice.

use chrono::Utc;
use secrecy::SecretString;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::instrument;

use tradewind_core::{AmountError, OrderId, OrderStatus, PaymentStatus, to_minor_units};

use crate::config::StripeConfig;
use crate::db::RepositoryError;
use crate::db::orders::{self, OrderRepository};
use crate::db::webhook_events;
use crate::models::{Order, User};
use crate::stripe::webhook::{
    self, PAYMENT_FAILED, PAYMENT_SUCCEEDED, SignatureError, WebhookEvent,
};
use crate::stripe::{CreateIntent, IntentStatus, PaymentGateway, StripeError};

/// Errors from the payment workflow.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("order not found")]
    OrderNotFound,

    #[error("order already paid")]
    AlreadyPaid,

    #[error("order is {0} and cannot be paid")]
    OrderClosed(OrderStatus),

    #[error("payment intent does not belong to this order")]
    IntentMismatch,

    #[error("payment not completed (status {status})")]
    PaymentFailed { status: IntentStatus },

    #[error("invalid webhook signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("malformed webhook event: {0}")]
    MalformedEvent(#[source] serde_json::Error),

    #[error("payment intent has no client secret")]
    MissingClientSecret,

    #[error("payment gateway error: {0}")]
    Gateway(#[from] StripeError),

    #[error("invalid amount: {0}")]
    Amount(#[from] AmountError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PaymentError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// What the client needs to complete payment in the browser.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentCreated {
    pub client_secret: String,
    pub payment_intent_id: String,
}

/// What happened to a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event changed an order.
    Applied,
    /// The event id was already processed.
    Duplicate,
    /// Not an event we act on, or no matching order.
    Ignored,
}

/// Payment service over a gateway `G`.
pub struct PaymentService<'a, G> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
    gateway: &'a G,
    config: &'a StripeConfig,
}

impl<'a, G: PaymentGateway> PaymentService<'a, G> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, gateway: &'a G, config: &'a StripeConfig) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
            gateway,
            config,
        }
    }

    /// Create a payment intent for the caller's order.
    ///
    /// The idempotency key is derived from the order and amount, so retrying
    /// returns the same intent.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` if the order isn't the caller's.
    /// Returns `PaymentError::AlreadyPaid` or `PaymentError::OrderClosed` if
    /// the order can no longer be paid.
    /// Returns `PaymentError::Gateway` if Stripe fails.
    #[instrument(skip(self, caller), fields(user_id = %caller.id))]
    pub async fn create_intent(
        &self,
        order_id: OrderId,
        caller: &User,
    ) -> Result<IntentCreated, PaymentError> {
        let order = self.owned_order(order_id, caller).await?;

        if order.is_paid() {
            return Err(PaymentError::AlreadyPaid);
        }
        if order.status.is_terminal() {
            return Err(PaymentError::OrderClosed(order.status));
        }

        let amount = to_minor_units(order.total)?;
        let intent = self
            .gateway
            .create_intent(&CreateIntent {
                amount,
                currency: self.config.currency.clone(),
                order_id: order.id,
                user_id: caller.id,
                idempotency_key: format!("order-{}-{amount}", order.id),
            })
            .await?;

        self.orders.set_payment_intent(order.id, &intent.id).await?;

        tracing::info!(
            order_id = %order.id,
            intent_id = %intent.id,
            amount,
            "Payment intent created"
        );

        Ok(IntentCreated {
            client_secret: intent.client_secret.ok_or(PaymentError::MissingClientSecret)?,
            payment_intent_id: intent.id,
        })
    }

    /// Check the intent with the gateway and mark the order paid if it succeeded.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` if the order isn't the caller's.
    /// Returns `PaymentError::IntentMismatch` if the intent isn't the order's.
    /// Returns `PaymentError::PaymentFailed` if the intent hasn't succeeded.
    #[instrument(skip(self, caller), fields(user_id = %caller.id))]
    pub async fn confirm(
        &self,
        order_id: OrderId,
        payment_intent_id: &str,
        caller: &User,
    ) -> Result<Order, PaymentError> {
        let order = self.owned_order(order_id, caller).await?;

        if order.payment_intent_id.as_deref() != Some(payment_intent_id) {
            return Err(PaymentError::IntentMismatch);
        }

        let intent = self.gateway.retrieve_intent(payment_intent_id).await?;
        if intent.status != IntentStatus::Succeeded {
            tracing::warn!(
                order_id = %order.id,
                intent_status = %intent.status,
                "Payment confirmation with unsuccessful intent"
            );
            return Err(PaymentError::PaymentFailed {
                status: intent.status,
            });
        }

        if order.is_paid() {
            return Ok(order);
        }

        let mut tx = self.pool.begin().await?;
        if let Err(err) = mark_paid(&mut *tx, order.id).await {
            if let PaymentError::OrderClosed(status) = &err {
                tracing::warn!(
                    order_id = %order.id,
                    %status,
                    intent_id = %payment_intent_id,
                    "Payment succeeded for a closed order; refund required"
                );
            }
            return Err(err);
        }
        let updated = orders::fetch_order(&mut *tx, order.id, false)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;
        tx.commit().await?;

        tracing::info!(order_id = %updated.id, intent_id = %payment_intent_id, "Payment confirmed");
        Ok(updated)
    }

    /// Verify and apply a gateway event.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` if the header is missing or wrong.
    /// Returns `PaymentError::MalformedEvent` if the body isn't a recognizable event.
    #[instrument(skip_all, fields(event_id = tracing::field::Empty))]
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, PaymentError> {
        let signature = signature.ok_or(SignatureError::MissingSignature)?;
        verify(payload, signature, &self.config.webhook_secret)?;

        let event: WebhookEvent =
            serde_json::from_slice(payload).map_err(PaymentError::MalformedEvent)?;
        tracing::Span::current().record("event_id", event.id.as_str());

        if event.event_type != PAYMENT_SUCCEEDED && event.event_type != PAYMENT_FAILED {
            tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored);
        }

        let intent = event
            .payment_intent()
            .map_err(PaymentError::MalformedEvent)?;

        let order_id = match intent.order_id() {
            Some(id) => Some(id),
            None => self.orders.find_id_by_payment_intent(&intent.id).await?,
        };

        let mut tx = self.pool.begin().await?;

        // Lock the order before claiming so the ledger only references existing orders
        let order = match order_id {
            Some(id) => orders::fetch_order(&mut *tx, id, true).await?,
            None => None,
        };

        if !webhook_events::claim(
            &mut *tx,
            &event.id,
            &event.event_type,
            order.as_ref().map(|o| o.id),
        )
        .await?
        {
            tracing::info!(event_id = %event.id, "Duplicate webhook event acknowledged");
            return Ok(WebhookOutcome::Duplicate);
        }

        let Some(order) = order else {
            tracing::warn!(
                event_id = %event.id,
                intent_id = %intent.id,
                "Webhook event for unknown order"
            );
            tx.commit().await?;
            return Ok(WebhookOutcome::Ignored);
        };

        if order
            .payment_intent_id
            .as_deref()
            .is_some_and(|stored| stored != intent.id)
        {
            tracing::warn!(
                event_id = %event.id,
                order_id = %order.id,
                intent_id = %intent.id,
                "Webhook event for a superseded payment intent"
            );
            tx.commit().await?;
            return Ok(WebhookOutcome::Ignored);
        }

        if event.event_type == PAYMENT_SUCCEEDED && order.status.is_terminal() {
            tracing::warn!(
                event_id = %event.id,
                order_id = %order.id,
                status = %order.status,
                intent_id = %intent.id,
                "Payment succeeded for a closed order; refund required"
            );
            tx.commit().await?;
            return Ok(WebhookOutcome::Ignored);
        }

        let outcome = if event.event_type == PAYMENT_SUCCEEDED {
            mark_paid(&mut *tx, order.id).await?;
            WebhookOutcome::Applied
        } else if order.is_paid() {
            tracing::warn!(
                event_id = %event.id,
                order_id = %order.id,
                "Payment failure after success ignored"
            );
            WebhookOutcome::Ignored
        } else {
            orders::update_payment_status(&mut *tx, order.id, PaymentStatus::Failed, None).await?;
            WebhookOutcome::Applied
        };

        tx.commit().await?;

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            order_id = %order.id,
            outcome = ?outcome,
            "Webhook event processed"
        );
        Ok(outcome)
    }

    async fn owned_order(&self, order_id: OrderId, caller: &User) -> Result<Order, PaymentError> {
        self.orders
            .get(order_id)
            .await?
            .filter(|order| order.user_id == caller.id)
            .ok_or(PaymentError::OrderNotFound)
    }
}

fn verify(payload: &[u8], signature: &str, secret: &SecretString) -> Result<(), SignatureError> {
    webhook::verify_signature(payload, signature, secret, Utc::now().timestamp())
}

/// Set an order paid; a pending order also becomes confirmed. No-op if already paid.
///
/// Cancelled and refunded orders are never marked paid: their stock is
/// already back on the shelf.
async fn mark_paid(conn: &mut PgConnection, order_id: OrderId) -> Result<(), PaymentError> {
    let order = orders::fetch_order(conn, order_id, true)
        .await?
        .ok_or(PaymentError::OrderNotFound)?;

    if order.is_paid() {
        return Ok(());
    }
    if order.status.is_terminal() {
        return Err(PaymentError::OrderClosed(order.status));
    }

    let status = (order.status == OrderStatus::Pending).then_some(OrderStatus::Confirmed);
    orders::update_payment_status(conn, order_id, PaymentStatus::Paid, status).await?;
    Ok(())
}
