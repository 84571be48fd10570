use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Client-side handle for completing a payment. Shape mirrors what hosted
/// gateways return; the intent lives in the provider, not in our database.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub order_id: i64,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
}

/// Payment gateway port. Real gateways (Stripe etc.) implement this; the
/// shipped default is a local dummy for development and tests.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_intent(
        &self,
        order_id: i64,
        amount_cents: i64,
        currency: &str,
    ) -> anyhow::Result<PaymentIntent>;
}

#[derive(Default)]
pub struct DummyProvider;

#[async_trait]
impl PaymentProvider for DummyProvider {
    async fn create_intent(
        &self,
        order_id: i64,
        amount_cents: i64,
        currency: &str,
    ) -> anyhow::Result<PaymentIntent> {
        let id = format!("pi_{}", Uuid::new_v4().simple());
        let client_secret = format!("{}_secret_{}", id, Uuid::new_v4().simple());
        Ok(PaymentIntent {
            id,
            client_secret,
            order_id,
            amount_cents,
            currency: currency.to_string(),
            status: "requires_payment_method".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dummy_intent_carries_order_amount() {
        let provider = DummyProvider;
        let intent = provider.create_intent(7, 1299, "usd").await.expect("intent");
        assert_eq!(intent.order_id, 7);
        assert_eq!(intent.amount_cents, 1299);
        assert_eq!(intent.currency, "usd");
        assert!(intent.id.starts_with("pi_"));
        assert!(intent.client_secret.starts_with(&intent.id));
        assert_eq!(intent.status, "requires_payment_method");
    }

    #[tokio::test]
    async fn dummy_intent_ids_are_unique() {
        let provider = DummyProvider;
        let a = provider.create_intent(1, 100, "usd").await.unwrap();
        let b = provider.create_intent(1, 100, "usd").await.unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.client_secret, b.client_secret);
    }
}
