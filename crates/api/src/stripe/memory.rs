//! In-process gateway for tests and local development without Stripe.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use uuid::Uuid;

use super::{CreateIntent, IntentStatus, PaymentGateway, PaymentIntent, StripeError};

/// A [`PaymentGateway`] that keeps intents in memory.
///
/// Creating an intent twice with the same idempotency key returns the first
/// one, as Stripe does. Intent ids are unique across gateway instances, so
/// several gateways can share one database.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    intents: HashMap<String, PaymentIntent>,
    by_key: HashMap<String, String>,
}

impl InMemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move an intent to `status`, as the customer's browser would.
    ///
    /// Returns `false` for an unknown intent.
    pub fn set_status(&self, intent_id: &str, status: IntentStatus) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.intents.get_mut(intent_id) {
            Some(intent) => {
                intent.status = status;
                true
            }
            None => false,
        }
    }

    /// Number of distinct intents created.
    #[must_use]
    pub fn intent_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .intents
            .len()
    }
}

impl PaymentGateway for InMemoryGateway {
    async fn create_intent(&self, params: &CreateIntent) -> Result<PaymentIntent, StripeError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = state
            .by_key
            .get(&params.idempotency_key)
            .and_then(|id| state.intents.get(id))
        {
            return Ok(existing.clone());
        }

        let id = format!("pi_mem_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            id: id.clone(),
            client_secret: Some(format!("{id}_secret")),
            amount: params.amount,
            currency: params.currency.clone(),
            status: IntentStatus::RequiresPaymentMethod,
            metadata: HashMap::from([
                ("order_id".to_owned(), params.order_id.to_string()),
                ("user_id".to_owned(), params.user_id.to_string()),
            ]),
        };
        state
            .by_key
            .insert(params.idempotency_key.clone(), id.clone());
        state.intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, StripeError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| StripeError::Api {
                status: 404,
                message: format!("No such payment_intent: '{intent_id}'"),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tradewind_core::{OrderId, UserId};

    use super::*;

    fn params(key: &str) -> CreateIntent {
        CreateIntent {
            amount: 1000,
            currency: "usd".to_owned(),
            order_id: OrderId::generate(),
            user_id: UserId::generate(),
            idempotency_key: key.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_idempotency_key_reuses_intent() {
        let gateway = InMemoryGateway::new();
        let first = gateway.create_intent(&params("k1")).await.unwrap();
        let again = gateway.create_intent(&params("k1")).await.unwrap();
        let other = gateway.create_intent(&params("k2")).await.unwrap();

        assert_eq!(first.id, again.id);
        assert_ne!(first.id, other.id);
        assert_eq!(gateway.intent_count(), 2);
    }

    #[tokio::test]
    async fn test_ids_unique_across_gateways() {
        let first = InMemoryGateway::new()
            .create_intent(&params("k1"))
            .await
            .unwrap();
        let second = InMemoryGateway::new()
            .create_intent(&params("k1"))
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert!(first.id.starts_with("pi_mem_"));
    }

    #[tokio::test]
    async fn test_status_changes_are_visible() {
        let gateway = InMemoryGateway::new();
        let intent = gateway.create_intent(&params("k1")).await.unwrap();

        assert!(gateway.set_status(&intent.id, IntentStatus::Succeeded));
        let fetched = gateway.retrieve_intent(&intent.id).await.unwrap();
        assert_eq!(fetched.status, IntentStatus::Succeeded);

        assert!(!gateway.set_status("pi_unknown", IntentStatus::Succeeded));
        assert!(matches!(
            gateway.retrieve_intent("pi_unknown").await,
            Err(StripeError::Api { status: 404, .. })
        ));
    }
}
