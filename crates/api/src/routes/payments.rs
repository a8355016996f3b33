//! Payment route handlers.
//!
//! The webhook takes the raw body: the signature covers the exact bytes
//! Stripe sent, so it must be checked before any JSON parsing.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use tradewind_core::OrderId;

use crate::error::Result;
use crate::extract::Json;
use crate::middleware::RequireAuth;
use crate::models::OrderView;
use crate::response::ApiResponse;
use crate::services::payments::{IntentCreated, PaymentService};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub order_id: OrderId,
    pub payment_intent_id: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// `POST /payments/create-intent`
pub async fn create_intent(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Json(body): Json<CreateIntentRequest>,
) -> Result<ApiResponse<IntentCreated>> {
    let created = PaymentService::new(state.pool(), state.stripe(), &state.config().stripe)
        .create_intent(body.order_id, &caller)
        .await?;

    Ok(ApiResponse::ok(created))
}

/// `POST /payments/confirm`
pub async fn confirm(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Json(body): Json<ConfirmRequest>,
) -> Result<ApiResponse<OrderView>> {
    let order = PaymentService::new(state.pool(), state.stripe(), &state.config().stripe)
        .confirm(body.order_id, &body.payment_intent_id, &caller)
        .await?;

    Ok(ApiResponse::ok(order.into()).with_message("Payment processed successfully"))
}

/// `POST /payments/webhook`
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ApiResponse<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    PaymentService::new(state.pool(), state.stripe(), &state.config().stripe)
        .handle_webhook(&body, signature)
        .await?;

    Ok(ApiResponse::ok(WebhookAck { received: true }))
}
