//! Message delivery backends

use crate::notify::{MessageFormat, NotifyError, OutgoingMessage};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use url::Url;

/// Delivers one message to one subscriber
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

/// Posts messages as JSON to a bot endpoint
#[derive(Debug, Clone)]
pub struct HttpMessageSink {
    client: Client,
    endpoint: Url,
}

impl HttpMessageSink {
    pub fn new(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl MessageSink for HttpMessageSink {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError> {
        let body = SendMessageBody {
            chat_id: &message.chat_id,
            text: &message.text,
            parse_mode: match message.format {
                MessageFormat::Html => Some("HTML"),
                MessageFormat::Plain => None,
            },
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        Ok(())
    }
}

/// Logs messages instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl MessageSink for TracingSink {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), NotifyError> {
        tracing::info!(
            "Notification for {} ({:?}): {}",
            message.chat_id,
            message.format,
            message.text
        );
        Ok(())
    }
}
