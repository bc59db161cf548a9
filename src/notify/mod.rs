//! Best-effort push notifications. Nothing in here ever fails the caller:
//! lookup and delivery errors are logged and counted as undelivered.

pub mod directory;
pub mod sender;

pub use directory::{StoreDirectory, SubjectContact, SubjectDirectory};
pub use sender::{LogSender, NotificationSender, PushSender};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::NotifyConfig;
use crate::database::{DatabaseError, DocumentStore};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("push gateway rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("subject lookup failed: {0}")]
    Lookup(#[from] DatabaseError),

    #[error("{0}")]
    Other(String),
}

pub struct Notifier {
    sender: Arc<dyn NotificationSender>,
    directory: Arc<dyn SubjectDirectory>,
    send_timeout: Duration,
}

impl Notifier {
    pub fn new(
        sender: Arc<dyn NotificationSender>,
        directory: Arc<dyn SubjectDirectory>,
        send_timeout: Duration,
    ) -> Self {
        Self { sender, directory, send_timeout }
    }

    /// Push gateway when an endpoint is configured, log-only otherwise
    pub fn from_config(config: &NotifyConfig, store: Arc<dyn DocumentStore>) -> Self {
        let sender: Arc<dyn NotificationSender> = match &config.endpoint {
            Some(endpoint) => Arc::new(PushSender::new(endpoint.clone(), config.server_key.clone())),
            None => Arc::new(LogSender),
        };
        Self::new(sender, Arc::new(StoreDirectory::new(store)), config.timeout())
    }

    /// Send `title`/`body` to every token of `subject_id`; returns how many
    /// sends succeeded
    pub async fn notify(&self, subject_id: Uuid, title: &str, body: &str) -> usize {
        let contact = match self.directory.lookup(subject_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                debug!(%subject_id, "no user record; notification skipped");
                return 0;
            }
            Err(e) => {
                warn!(%subject_id, "notification lookup failed: {}", e);
                return 0;
            }
        };

        let mut delivered = 0;
        for token in &contact.tokens {
            match timeout(self.send_timeout, self.sender.send(token, title, body)).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!(%subject_id, "notification send failed: {}", e),
                Err(_) => warn!(%subject_id, "notification send timed out after {:?}", self.send_timeout),
            }
        }
        delivered
    }
}
