//! HTTP client for the Stripe payment intent API.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::{CreateIntent, PaymentGateway, PaymentIntent, StripeError};
use crate::config::StripeConfig;

/// Client for the Stripe REST API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
}

impl fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.inner.api_base)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_base: config.api_base.clone(),
                secret_key: config.secret_key.clone(),
            }),
        }
    }

    async fn parse(response: reqwest::Response) -> Result<PaymentIntent, StripeError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            tracing::error!(status = %status, message = %message, "Stripe API returned non-success status");
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl PaymentGateway for StripeClient {
    #[instrument(skip(self, params), fields(order_id = %params.order_id, amount = params.amount))]
    async fn create_intent(&self, params: &CreateIntent) -> Result<PaymentIntent, StripeError> {
        let order_id = params.order_id.to_string();
        let user_id = params.user_id.to_string();
        let amount = params.amount.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", params.currency.as_str()),
            ("metadata[order_id]", order_id.as_str()),
            ("metadata[user_id]", user_id.as_str()),
            ("automatic_payment_methods[enabled]", "true"),
        ];

        let response = self
            .inner
            .client
            .post(format!("{}/v1/payment_intents", self.inner.api_base))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .header("Idempotency-Key", &params.idempotency_key)
            .form(&form)
            .send()
            .await?;

        let intent = Self::parse(response).await?;
        tracing::debug!(intent_id = %intent.id, "Payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, StripeError> {
        let response = self
            .inner
            .client
            .get(format!(
                "{}/v1/payment_intents/{intent_id}",
                self.inner.api_base
            ))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .send()
            .await?;

        Self::parse(response).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use tradewind_core::{OrderId, UserId};

    use super::*;
    use crate::config::tests::{STRIPE_KEY, test_config};
    use crate::stripe::IntentStatus;

    fn client_for(server: &MockServer) -> StripeClient {
        let mut config = test_config().stripe;
        config.api_base = server.uri();
        StripeClient::new(&config)
    }

    #[tokio::test]
    async fn test_create_intent_sends_form_and_headers() {
        let server = MockServer::start().await;
        let order_id = OrderId::generate();

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("authorization", format!("Bearer {STRIPE_KEY}").as_str()))
            .and(header("idempotency-key", "order-key-1"))
            .and(body_string_contains("amount=11880"))
            .and(body_string_contains("currency=usd"))
            .and(body_string_contains("metadata%5Border_id%5D="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_123",
                "client_secret": "pi_123_secret_abc",
                "amount": 11880,
                "currency": "usd",
                "status": "requires_payment_method",
                "metadata": { "order_id": order_id.to_string() }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let intent = client_for(&server)
            .create_intent(&CreateIntent {
                amount: 11880,
                currency: "usd".to_owned(),
                order_id,
                user_id: UserId::generate(),
                idempotency_key: "order-key-1".to_owned(),
            })
            .await
            .unwrap();

        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.client_secret.as_deref(), Some("pi_123_secret_abc"));
        assert_eq!(intent.order_id(), Some(order_id));
    }

    #[tokio::test]
    async fn test_retrieve_intent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pi_456",
                "amount": 500,
                "currency": "usd",
                "status": "succeeded"
            })))
            .mount(&server)
            .await;

        let intent = client_for(&server).retrieve_intent("pi_456").await.unwrap();
        assert_eq!(intent.status, IntentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_api_error_message_extracted() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": { "type": "invalid_request_error", "message": "No such payment_intent" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .retrieve_intent("pi_missing")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StripeError::Api { status: 404, ref message } if message == "No such payment_intent"
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = StripeClient::new(&test_config().stripe);
        let debug = format!("{client:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(STRIPE_KEY));
    }
}
