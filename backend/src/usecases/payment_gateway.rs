use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::{
    domain::value_objects::enums::price_change_timings::PriceChangeTiming,
    payments::stripe_client::{StripeClient, StripeEvent, StripeSubscription},
};

/// Outbound payment provider calls. Implementations do not retry; the reconciler does.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn get_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription>;

    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        price_id: &str,
        timing: PriceChangeTiming,
    ) -> AnyResult<()>;

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> AnyResult<StripeSubscription>;

    async fn cancel_subscription(&self, subscription_id: &str) -> AnyResult<()>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn get_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription> {
        self.retrieve_subscription(subscription_id).await
    }

    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        price_id: &str,
        timing: PriceChangeTiming,
    ) -> AnyResult<()> {
        self.update_subscription_price(subscription_id, price_id, timing)
            .await
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> AnyResult<StripeSubscription> {
        self.create_subscription(customer_id, price_id).await
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> AnyResult<()> {
        self.cancel_subscription(subscription_id).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}
