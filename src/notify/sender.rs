use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::NotifyError;

/// Delivers one push message to one device token
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, token: &str, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// HTTP push gateway client (legacy FCM-style JSON API)
pub struct PushSender {
    client: reqwest::Client,
    endpoint: String,
    server_key: Option<String>,
}

impl PushSender {
    pub fn new(endpoint: impl Into<String>, server_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            server_key,
        }
    }
}

#[async_trait]
impl NotificationSender for PushSender {
    async fn send(&self, token: &str, title: &str, body: &str) -> Result<(), NotifyError> {
        let payload = json!({
            "to": token,
            "notification": { "title": title, "body": body },
        });
        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.server_key {
            request = request.header(reqwest::header::AUTHORIZATION, format!("key={}", key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status: status.as_u16(), body });
        }
        Ok(())
    }
}

/// Stand-in when no push endpoint is configured
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, token: &str, title: &str, body: &str) -> Result<(), NotifyError> {
        info!(token, "notification '{}': {}", title, body);
        Ok(())
    }
}
