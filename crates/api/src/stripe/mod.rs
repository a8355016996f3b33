//! Stripe payment gateway.
//!
//! # Architecture
//!
//! - [`PaymentGateway`] is the seam the payment service depends on
//! - [`StripeClient`] implements it over the form-encoded Stripe REST API
//! - [`InMemoryGateway`] implements it in process for tests
//! - [`webhook`] verifies `Stripe-Signature` headers and parses events
//!
//! Only the payment intent endpoints are used:
//!
//! - `POST /v1/payment_intents`
//! - `GET /v1/payment_intents/{id}`

mod client;
mod memory;
pub mod webhook;

pub use client::StripeClient;
pub use memory::InMemoryGateway;

use std::collections::HashMap;
use std::future::Future;

use serde::Deserialize;
use thiserror::Error;

use tradewind_core::{OrderId, UserId};

/// Errors that can occur when talking to Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe answered with a non-success status.
    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Payment intent lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

impl IntentStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::RequiresAction => "requires_action",
            Self::Processing => "processing",
            Self::RequiresCapture => "requires_capture",
            Self::Canceled => "canceled",
            Self::Succeeded => "succeeded",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts of a Stripe `PaymentIntent` object we use.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Only present on intents fetched with the secret key.
    pub client_secret: Option<String>,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// The order id recorded in the intent metadata, if it parses.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.metadata.get("order_id")?.parse().ok()
    }
}

/// Parameters for a new payment intent.
#[derive(Debug, Clone)]
pub struct CreateIntent {
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub order_id: OrderId,
    pub user_id: UserId,
    /// Sent as the `Idempotency-Key` header.
    pub idempotency_key: String,
}

/// Operations the payment workflow needs from a gateway.
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent.
    fn create_intent(
        &self,
        params: &CreateIntent,
    ) -> impl Future<Output = Result<PaymentIntent, StripeError>> + Send;

    /// Fetch the current state of a payment intent.
    fn retrieve_intent(
        &self,
        intent_id: &str,
    ) -> impl Future<Output = Result<PaymentIntent, StripeError>> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_deserializes() {
        let order_id = OrderId::generate();
        let intent: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_123",
            "object": "payment_intent",
            "client_secret": "pi_123_secret_abc",
            "amount": 11880,
            "currency": "usd",
            "status": "requires_payment_method",
            "metadata": { "order_id": order_id.to_string() }
        }))
        .unwrap();

        assert_eq!(intent.status, IntentStatus::RequiresPaymentMethod);
        assert_eq!(intent.amount, 11880);
        assert_eq!(intent.order_id(), Some(order_id));
    }

    #[test]
    fn test_unknown_status_tolerated() {
        let intent: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_123",
            "amount": 100,
            "currency": "usd",
            "status": "some_future_state"
        }))
        .unwrap();

        assert_eq!(intent.status, IntentStatus::Unknown);
        assert!(intent.order_id().is_none());
    }
}
