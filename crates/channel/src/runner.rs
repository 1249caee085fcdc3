use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, HandlerResult, InboundEnvelope};
use crate::outbound::{notify_best_effort, Channel};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

/// Retry budget for consecutive sessions that fail before delivering anything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, failures: u32) -> Duration {
        let factor = 1_u64 << failures.min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

/// Source of inbound envelopes. `Ok(None)` from `next_envelope` closes the stream.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<InboundEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;

    fn is_noop(&self) -> bool {
        false
    }
}

#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl UpdateTransport for NoopTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<InboundEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Pumps envelopes into the dispatcher one at a time and sends replies back to the sender.
pub struct TransportRunner {
    transport: Arc<dyn UpdateTransport>,
    dispatcher: EventDispatcher,
    channel: Arc<dyn Channel>,
    reconnect_policy: ReconnectPolicy,
}

impl TransportRunner {
    pub fn new(
        transport: Arc<dyn UpdateTransport>,
        dispatcher: EventDispatcher,
        channel: Arc<dyn Channel>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, channel, reconnect_policy }
    }

    pub fn is_noop_transport(&self) -> bool {
        self.transport.is_noop()
    }

    /// Runs sessions until the stream closes or the retry budget runs out.
    /// A session that delivered at least one envelope before dropping resets the budget.
    pub async fn start(&self) -> Result<()> {
        let policy = &self.reconnect_policy;
        let mut failures = 0_u32;

        loop {
            let mut delivered = 0_usize;
            let error = match self.run_session(failures, &mut delivered).await {
                Ok(()) => return Ok(()),
                Err(error) => error,
            };

            if delivered > 0 {
                failures = 0;
            }
            warn!(
                event_name = "ingress.transport.failed",
                attempt = failures,
                delivered,
                max_retries = policy.max_retries,
                error = %error,
                "update transport failed"
            );

            if delivered == 0 {
                if failures >= policy.max_retries {
                    warn!(
                        event_name = "ingress.transport.retries_exhausted",
                        max_retries = policy.max_retries,
                        "transport retries exhausted; continuing process without crash"
                    );
                    return Ok(());
                }
                failures += 1;
            }

            let delay = policy.backoff(failures.saturating_sub(1));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn run_session(&self, attempt: u32, delivered: &mut usize) -> Result<(), TransportError> {
        info!(attempt, "opening update transport");
        self.transport.connect().await?;
        info!(attempt, "update transport connected");

        while let Some(envelope) = self.transport.next_envelope().await? {
            *delivered += 1;
            self.handle_envelope(&envelope).await;
        }

        info!(attempt, delivered = *delivered, "update transport stream closed");
        self.transport.disconnect().await
    }

    async fn handle_envelope(&self, envelope: &InboundEnvelope) {
        let correlation_id = envelope.envelope_id.as_str();
        let user_id = envelope.event.sender().map(|sender| sender.id.0).unwrap_or_default();
        info!(
            event_name = "ingress.transport.envelope_received",
            event_type = ?envelope.event.event_type(),
            correlation_id,
            user_id,
            "received envelope"
        );

        match self.transport.acknowledge(correlation_id).await {
            Ok(()) => debug!(
                event_name = "ingress.transport.ack_sent",
                correlation_id,
                user_id,
                "acknowledged envelope"
            ),
            Err(error) => warn!(
                event_name = "ingress.transport.ack_failed",
                correlation_id,
                user_id,
                error = %error,
                "failed to acknowledge envelope"
            ),
        }

        let context = EventContext { correlation_id: correlation_id.to_owned() };
        let reply = match self.dispatcher.dispatch(envelope, &context).await {
            Ok(HandlerResult::Responded(message)) => message,
            Ok(HandlerResult::Processed | HandlerResult::Ignored) => return,
            Err(error) => {
                warn!(
                    event_name = "ingress.transport.dispatch_failed",
                    correlation_id,
                    user_id,
                    error = %error,
                    "event dispatch failed; continuing transport loop"
                );
                return;
            }
        };

        if let Some(sender) = envelope.event.sender() {
            notify_best_effort(self.channel.as_ref(), sender.id, &reply, correlation_id).await;
        }
    }
}
