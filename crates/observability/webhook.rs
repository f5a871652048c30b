use super::notifier::{Alert, AlertSink};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use url::Url;

const MAX_ALERT_CHARS: usize = 2000;

/// Posts alerts as `{"text": ...}` to a chat-style incoming webhook.
pub(crate) struct AlertWebhookSink {
    webhook_url: Url,
    client: Client,
}

impl AlertWebhookSink {
    pub(crate) fn new(webhook_url: Url) -> Self {
        // Builder only fails when TLS backends are missing; fall back to the default client.
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap_or_default();

        Self {
            webhook_url,
            client,
        }
    }
}

pub(crate) fn render(alert: &Alert) -> String {
    let mut lines = vec![format!(
        "[{}] {} {}/{} at {}",
        alert.level,
        alert.service_name,
        alert.environment,
        alert.component,
        alert.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
    )];

    if let Some(message) = alert.message.as_deref().filter(|m| !m.trim().is_empty()) {
        lines.push(message.trim().to_string());
    }

    lines.push(format!("target: {}", alert.target));

    if !alert.spans.is_empty() {
        lines.push(format!("spans: {}", alert.spans.join(" > ")));
    }

    for (key, value) in &alert.fields {
        lines.push(format!("{key} = {value}"));
    }

    let text = lines.join("\n");
    if text.chars().count() <= MAX_ALERT_CHARS {
        return text;
    }

    let mut truncated: String = text.chars().take(MAX_ALERT_CHARS - 1).collect();
    truncated.push('…');
    truncated
}

#[async_trait]
impl AlertSink for AlertWebhookSink {
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "text": render(alert) }))
            .send()
            .await
            // reqwest errors embed the URL, which is a secret.
            .map_err(|err| anyhow!("alert webhook request failed (timeout: {})", err.is_timeout()))?;

        if !response.status().is_success() {
            return Err(anyhow!("alert webhook returned {}", response.status()));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tracing::Level;

    fn alert(message: &str) -> Alert {
        let mut fields = BTreeMap::new();
        fields.insert("member_id".to_string(), "7c1e".to_string());

        Alert {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "membership".to_string(),
            environment: "Local".to_string(),
            component: "backend".to_string(),
            target: "backend::usecases::bookings".to_string(),
            message: Some(message.to_string()),
            fields,
            spans: vec!["request".to_string()],
        }
    }

    #[test]
    fn render_includes_context_and_fields() {
        let text = render(&alert("bookings: refund failed"));

        assert!(text.starts_with("[ERROR] membership Local/backend"));
        assert!(text.contains("bookings: refund failed"));
        assert!(text.contains("member_id = 7c1e"));
        assert!(text.contains("spans: request"));
    }

    #[test]
    fn render_truncates_long_alerts() {
        let text = render(&alert(&"x".repeat(5000)));

        assert_eq!(text.chars().count(), MAX_ALERT_CHARS);
        assert!(text.ends_with('…'));
    }
}
