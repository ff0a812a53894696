// src/clients/alarm.rs

use async_trait::async_trait;
use serde_json::json;

/// Operator alerting. Delivery is best-effort: failures are only logged.
#[async_trait]
pub trait AlarmService: Send + Sync {
    async fn notify(&self, title: &str, body: &str);
}

/// Posts `{"text": "### <title>\n<body>"}` to a chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookAlarm {
    client: reqwest::Client,
    url: String,
}

impl WebhookAlarm {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl AlarmService for WebhookAlarm {
    async fn notify(&self, title: &str, body: &str) {
        let payload = json!({ "text": format!("### {}\n{}", title, body) });

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(res) if res.status().is_success() => {
                tracing::info!(title, "Alert delivered");
            }
            Ok(res) => {
                tracing::error!(title, status = res.status().as_u16(), "Alert webhook rejected the message");
            }
            Err(e) => {
                tracing::error!(title, "Failed to deliver alert: {}", e);
            }
        }
    }
}

/// Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogAlarm;

#[async_trait]
impl AlarmService for LogAlarm {
    async fn notify(&self, title: &str, body: &str) {
        tracing::error!(title, "ALERT: {}", body);
    }
}
