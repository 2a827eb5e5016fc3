//! New-entry notification fan-out
//!
//! Every subscriber gets a rich HTML message for each new entry. When the rich
//! message cannot be formatted or delivered, a plain-text message is sent
//! instead; when that fails too the failure is logged and delivery moves on.
//! Notification never fails the caller.

mod format;
mod registry;
mod sink;

pub use format::{format_plain, format_rich};
pub use registry::SubscriberRegistry;
pub use sink::{HttpMessageSink, MessageSink, TracingSink};

use crate::catalog::CatalogEntry;
use crate::config::NotifyConfig;
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Errors raised while formatting or delivering a message
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Cannot format message: {0}")]
    Format(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint rejected message with status {0}")]
    Rejected(u16),

    #[error("Invalid notification endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Html,
    Plain,
}

/// A message addressed to one subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: String,
    pub text: String,
    pub format: MessageFormat,
}

/// Fans new entries out to all registered subscribers
pub struct Notifier {
    registry: Arc<SubscriberRegistry>,
    sink: Arc<dyn MessageSink>,
}

impl Notifier {
    pub fn new(registry: Arc<SubscriberRegistry>, sink: Arc<dyn MessageSink>) -> Self {
        Self { registry, sink }
    }

    /// Builds a notifier from configuration
    ///
    /// Posts to the configured endpoint with `client`, or logs messages when
    /// no endpoint is set.
    pub fn from_config(config: &NotifyConfig, client: Client) -> Result<Self, NotifyError> {
        let registry = Arc::new(SubscriberRegistry::from_ids(config.subscribers.iter().cloned()));

        let sink: Arc<dyn MessageSink> = match &config.endpoint {
            Some(endpoint) => Arc::new(HttpMessageSink::new(client, Url::parse(endpoint)?)),
            None => Arc::new(TracingSink),
        };

        Ok(Self::new(registry, sink))
    }

    /// A notifier without subscribers
    pub fn disabled() -> Self {
        Self::new(Arc::new(SubscriberRegistry::new()), Arc::new(TracingSink))
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Announces a new entry to every subscriber
    pub async fn notify_new(&self, entry: &CatalogEntry) {
        for chat_id in self.registry.snapshot() {
            self.deliver(&chat_id, entry).await;
        }
    }

    async fn deliver(&self, chat_id: &str, entry: &CatalogEntry) {
        match format_rich(entry) {
            Ok(text) => {
                let message = OutgoingMessage {
                    chat_id: chat_id.to_string(),
                    text,
                    format: MessageFormat::Html,
                };
                match self.sink.send(&message).await {
                    Ok(()) => return,
                    Err(e) => tracing::debug!(
                        "Rich notification to {} failed, falling back to plain text: {}",
                        chat_id,
                        e
                    ),
                }
            }
            Err(e) => tracing::debug!("Cannot format rich notification for {}: {}", entry.url, e),
        }

        let message = OutgoingMessage {
            chat_id: chat_id.to_string(),
            text: format_plain(entry),
            format: MessageFormat::Plain,
        };
        if let Err(e) = self.sink.send(&message).await {
            tracing::warn!(
                "Failed to notify {} about '{}': {}",
                chat_id,
                entry.title,
                e
            );
        }
    }
}
