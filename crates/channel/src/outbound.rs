use async_trait::async_trait;
use marketbot_core::UserId;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::blocks::MessageTemplate;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel request failed: {0}")]
    Transport(String),
    #[error("channel rejected message for user {user}: {description}")]
    Rejected { user: UserId, description: String },
}

/// Outbound path to a user that is not a direct reply to their event.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn send_to_user(
        &self,
        user: UserId,
        message: &MessageTemplate,
    ) -> Result<(), ChannelError>;
}

/// Sends and logs a failure instead of returning it. Returns whether delivery succeeded.
pub async fn notify_best_effort(
    channel: &dyn Channel,
    user: UserId,
    message: &MessageTemplate,
    correlation_id: &str,
) -> bool {
    match channel.send_to_user(user, message).await {
        Ok(()) => {
            debug!(
                event_name = "egress.channel.delivered",
                correlation_id,
                user_id = user.0,
                "delivered message"
            );
            true
        }
        Err(error) => {
            warn!(
                event_name = "egress.channel.delivery_failed",
                correlation_id,
                user_id = user.0,
                error = %error,
                "could not deliver message; continuing"
            );
            false
        }
    }
}

#[derive(Default)]
pub struct NoopChannel;

#[async_trait]
impl Channel for NoopChannel {
    async fn send_to_user(
        &self,
        user: UserId,
        message: &MessageTemplate,
    ) -> Result<(), ChannelError> {
        debug!(
            event_name = "egress.channel.noop",
            user_id = user.0,
            fallback_text = %message.fallback_text,
            "discarding outbound message"
        );
        Ok(())
    }
}

/// Keeps every delivered message in memory; can be told to fail.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(UserId, MessageTemplate)>>,
    failing: bool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { sent: Mutex::default(), failing: true }
    }

    pub async fn sent(&self) -> Vec<(UserId, MessageTemplate)> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, user: UserId) -> Vec<MessageTemplate> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(recipient, _)| *recipient == user)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    async fn send_to_user(
        &self,
        user: UserId,
        message: &MessageTemplate,
    ) -> Result<(), ChannelError> {
        if self.failing {
            return Err(ChannelError::Rejected {
                user,
                description: "recipient unreachable".to_owned(),
            });
        }
        self.sent.lock().await.push((user, message.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use marketbot_core::UserId;

    use super::{notify_best_effort, Channel, NoopChannel, RecordingChannel};
    use crate::blocks::text_message;

    #[tokio::test]
    async fn best_effort_reports_success_and_records_message() {
        let channel = RecordingChannel::new();
        let delivered =
            notify_best_effort(&channel, UserId(3), &text_message("hello"), "corr-1").await;

        assert!(delivered);
        assert_eq!(channel.sent_to(UserId(3)).await.len(), 1);
        assert!(channel.sent_to(UserId(4)).await.is_empty());
    }

    #[tokio::test]
    async fn best_effort_swallows_delivery_failure() {
        let channel = RecordingChannel::failing();
        let delivered =
            notify_best_effort(&channel, UserId(3), &text_message("hello"), "corr-2").await;

        assert!(!delivered);
        assert!(channel.sent().await.is_empty());
    }

    #[tokio::test]
    async fn noop_channel_accepts_everything() {
        assert!(NoopChannel.send_to_user(UserId(1), &text_message("x")).await.is_ok());
    }
}
