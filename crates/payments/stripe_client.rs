use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use tracing::error;

use crate::domain::value_objects::enums::price_change_timings::PriceChangeTiming;

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
/// Signed webhook payloads older than this are rejected as replays.
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    /// Subscription id carried by subscription and invoice payment events.
    pub fn subscription_id(&self) -> Option<String> {
        let object = &self.data.object;

        if self.type_.starts_with("customer.subscription.") {
            return object.get("id")?.as_str().map(str::to_string);
        }

        if self.type_.starts_with("invoice.payment_") {
            // Newer API versions nest the subscription under `parent.subscription_details`.
            return object
                .get("subscription")
                .and_then(|value| value.as_str())
                .or_else(|| {
                    object
                        .pointer("/parent/subscription_details/subscription")
                        .and_then(|value| value.as_str())
                })
                .map(str::to_string);
        }

        None
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    pub customer: Option<String>,
    /// Attached subscription schedule, if any.
    pub schedule: Option<String>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub billing_cycle_anchor: Option<i64>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub id: String,
    pub price: Option<StripePrice>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
    pub currency: Option<String>,
}

impl StripeSubscription {
    /// Period start, falling back to the first item or the billing cycle anchor.
    pub fn period_start(&self) -> Option<i64> {
        self.current_period_start
            .or_else(|| {
                self.items
                    .data
                    .first()
                    .and_then(|item| item.current_period_start)
            })
            .or(self.billing_cycle_anchor)
    }

    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        })
    }

    pub fn period_start_at(&self) -> Option<DateTime<Utc>> {
        self.period_start().and_then(unix_to_utc)
    }

    pub fn period_end_at(&self) -> Option<DateTime<Utc>> {
        self.period_end().and_then(unix_to_utc)
    }

    pub fn current_price_id(&self) -> Option<&str> {
        self.items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.as_str())
    }
}

fn unix_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = resp.text().await.unwrap_or_default();
        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.clone()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.clone()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.clone()),
            context = %context,
            "stripe: api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    async fn post_form(&self, path: &str, body: &[(String, String)], context: &str) -> Result<reqwest::Response> {
        let resp = self
            .http
            .post(format!("{STRIPE_API_BASE}/{path}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body)
            .send()
            .await?;

        Self::ensure_success(resp, context).await
    }

    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        // https://stripe.com/docs/api/subscriptions/retrieve
        let resp = self
            .http
            .get(format!("{STRIPE_API_BASE}/subscriptions/{subscription_id}"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "retrieve subscription").await?;

        Ok(resp.json::<StripeSubscription>().await?)
    }

    pub async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> Result<StripeSubscription> {
        let body = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
        ];

        let resp = self
            .post_form("subscriptions", &body, "create subscription")
            .await?;

        Ok(resp.json::<StripeSubscription>().await?)
    }

    /// Marks a subscription to cancel at period end.
    pub async fn cancel_subscription(&self, subscription_id: &str) -> Result<()> {
        let body = vec![("cancel_at_period_end".to_string(), "true".to_string())];

        self.post_form(
            &format!("subscriptions/{subscription_id}"),
            &body,
            "cancel subscription",
        )
        .await?;

        Ok(())
    }

    pub async fn update_subscription_price(
        &self,
        subscription_id: &str,
        price_id: &str,
        timing: PriceChangeTiming,
    ) -> Result<()> {
        let subscription = self.retrieve_subscription(subscription_id).await?;
        let item = subscription
            .items
            .data
            .first()
            .ok_or_else(|| anyhow!("subscription {subscription_id} has no items"))?;

        match timing {
            PriceChangeTiming::Immediate => {
                let body = vec![
                    ("items[0][id]".to_string(), item.id.clone()),
                    ("items[0][price]".to_string(), price_id.to_string()),
                    ("proration_behavior".to_string(), "create_prorations".to_string()),
                ];

                self.post_form(
                    &format!("subscriptions/{subscription_id}"),
                    &body,
                    "update subscription price",
                )
                .await?;
            }
            PriceChangeTiming::Scheduled => {
                let schedule_id = match subscription.schedule.clone() {
                    Some(schedule_id) => schedule_id,
                    None => self.create_schedule_from(subscription_id).await?,
                };

                let body = next_phase_form(&subscription, price_id)?;
                self.post_form(
                    &format!("subscription_schedules/{schedule_id}"),
                    &body,
                    "schedule subscription price",
                )
                .await?;
            }
        }

        Ok(())
    }

    async fn create_schedule_from(&self, subscription_id: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct ScheduleResp {
            id: String,
        }

        let body = vec![("from_subscription".to_string(), subscription_id.to_string())];
        let resp = self
            .post_form("subscription_schedules", &body, "create subscription schedule")
            .await?;

        Ok(resp.json::<ScheduleResp>().await?.id)
    }

    pub fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str) -> Result<StripeEvent> {
        verify_signature(
            &self.webhook_secret,
            payload,
            signature_header,
            Utc::now().timestamp(),
        )
    }
}

/// Keeps the current price until the period ends, then switches to `price_id`.
fn next_phase_form(subscription: &StripeSubscription, price_id: &str) -> Result<Vec<(String, String)>> {
    let current_price = subscription
        .current_price_id()
        .ok_or_else(|| anyhow!("subscription {} has no current price", subscription.id))?;
    let start = subscription
        .period_start()
        .ok_or_else(|| anyhow!("subscription {} has no period start", subscription.id))?;
    let end = subscription
        .period_end()
        .ok_or_else(|| anyhow!("subscription {} has no period end", subscription.id))?;

    Ok(vec![
        ("end_behavior".to_string(), "release".to_string()),
        ("proration_behavior".to_string(), "none".to_string()),
        ("phases[0][items][0][price]".to_string(), current_price.to_string()),
        ("phases[0][start_date]".to_string(), start.to_string()),
        ("phases[0][end_date]".to_string(), end.to_string()),
        ("phases[1][items][0][price]".to_string(), price_id.to_string()),
        ("phases[1][iterations]".to_string(), "1".to_string()),
    ])
}

/// https://stripe.com/docs/webhooks/signatures
fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    now_secs: i64,
) -> Result<StripeEvent> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp = timestamp.ok_or_else(|| anyhow!("missing timestamp in stripe-signature"))?;
    if signatures.is_empty() {
        anyhow::bail!("missing v1 in stripe-signature");
    }

    let signed_at: i64 = timestamp.parse()?;
    if (now_secs - signed_at).abs() > WEBHOOK_TOLERANCE_SECS {
        anyhow::bail!("stripe-signature timestamp outside tolerance");
    }

    let mut signed_payload = format!("{timestamp}.").into_bytes();
    signed_payload.extend_from_slice(payload);

    let matched = signatures.iter().any(|candidate| {
        let Ok(provided) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(&signed_payload);
        mac.verify_slice(&provided).is_ok()
    });

    if !matched {
        anyhow::bail!("invalid webhook signature");
    }

    Ok(serde_json::from_slice::<StripeEvent>(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    fn sign(payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn subscription(value: serde_json::Value) -> StripeSubscription {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accepts_valid_signature_and_extracts_subscription() {
        let payload = json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "data": { "object": { "id": "sub_123", "status": "active" } }
        })
        .to_string();
        let header = sign(payload.as_bytes(), 1_700_000_000);

        let event = verify_signature(SECRET, payload.as_bytes(), &header, 1_700_000_010).unwrap();

        assert_eq!(event.type_, "customer.subscription.updated");
        assert_eq!(event.subscription_id().as_deref(), Some("sub_123"));
    }

    #[test]
    fn rejects_tampered_payload() {
        let payload = br#"{"type":"invoice.payment_succeeded","data":{"object":{}}}"#;
        let header = sign(payload, 1_700_000_000);
        let tampered = br#"{"type":"invoice.payment_failed","data":{"object":{}}}"#;

        assert!(verify_signature(SECRET, tampered, &header, 1_700_000_000).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = br#"{"type":"invoice.payment_succeeded","data":{"object":{}}}"#;
        let header = sign(payload, 1_700_000_000);

        assert!(verify_signature(SECRET, payload, &header, 1_700_000_000 + 3600).is_err());
    }

    #[test]
    fn rejects_header_without_v1() {
        let payload = br#"{}"#;
        assert!(verify_signature(SECRET, payload, "t=1700000000", 1_700_000_000).is_err());
    }

    #[test]
    fn invoice_event_reads_nested_subscription() {
        let event: StripeEvent = serde_json::from_value(json!({
            "type": "invoice.payment_succeeded",
            "data": { "object": {
                "parent": { "subscription_details": { "subscription": "sub_9" } }
            } }
        }))
        .unwrap();

        assert_eq!(event.subscription_id().as_deref(), Some("sub_9"));
    }

    #[test]
    fn unrelated_event_has_no_subscription() {
        let event: StripeEvent = serde_json::from_value(json!({
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_1", "subscription": "sub_1" } }
        }))
        .unwrap();

        assert!(event.subscription_id().is_none());
    }

    #[test]
    fn period_falls_back_to_first_item() {
        let sub = subscription(json!({
            "id": "sub_1",
            "status": "active",
            "items": { "data": [{
                "id": "si_1",
                "price": { "id": "price_gold", "currency": "thb" },
                "current_period_start": 1_700_000_000,
                "current_period_end": 1_702_592_000
            }] }
        }));

        assert_eq!(sub.period_start(), Some(1_700_000_000));
        assert_eq!(sub.period_end(), Some(1_702_592_000));
        assert_eq!(sub.current_price_id(), Some("price_gold"));
    }

    #[test]
    fn period_start_falls_back_to_anchor() {
        let sub = subscription(json!({
            "id": "sub_1",
            "status": "trialing",
            "billing_cycle_anchor": 1_690_000_000
        }));

        assert_eq!(sub.period_start(), Some(1_690_000_000));
        assert!(sub.period_end().is_none());
        assert!(sub.current_price_id().is_none());
    }

    #[test]
    fn next_phase_keeps_current_price_until_period_end() {
        let sub = subscription(json!({
            "id": "sub_1",
            "status": "active",
            "current_period_start": 100,
            "current_period_end": 200,
            "items": { "data": [{ "id": "si_1", "price": { "id": "price_basic" } }] }
        }));

        let form = next_phase_form(&sub, "price_gold").unwrap();

        assert!(form.contains(&("phases[0][items][0][price]".to_string(), "price_basic".to_string())));
        assert!(form.contains(&("phases[0][end_date]".to_string(), "200".to_string())));
        assert!(form.contains(&("phases[1][items][0][price]".to_string(), "price_gold".to_string())));
    }
}
