//! Bot HTTP API: long-polled `getUpdates` inbound, `sendMessage` outbound.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use marketbot_core::config::ChannelConfig;
use marketbot_core::{Sender, UserId};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::blocks::MessageTemplate;
use crate::commands::{decode_callback, encode_callback};
use crate::events::{ActionEvent, InboundEnvelope, InboundEvent};
use crate::outbound::{Channel, ChannelError};
use crate::runner::{TransportError, UpdateTransport};

/// Headroom on top of the long-poll timeout before the HTTP request itself gives up.
const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 10;

pub struct BotApiClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl BotApiClient {
    pub fn new(config: &ChannelConfig) -> Result<Self, ChannelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + REQUEST_TIMEOUT_MARGIN_SECS))
            .build()
            .map_err(|error| ChannelError::Transport(error.without_url().to_string()))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            token: config.bot_token.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token.expose_secret())
    }

    /// The token is part of the URL, so request errors are reported without it.
    async fn call<T>(&self, method: &str, body: &Value) -> Result<T, String>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|error| error.without_url().to_string())?;

        let status = response.status();
        let payload: ApiResponse<T> =
            response.json().await.map_err(|error| error.without_url().to_string())?;

        match (payload.ok, payload.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(payload
                .description
                .unwrap_or_else(|| format!("`{method}` failed with status {status}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireUpdate {
    pub update_id: i64,
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    callback_query: Option<WireCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    from: Option<WireUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCallbackQuery {
    id: String,
    from: WireUser,
    #[serde(default)]
    data: Option<String>,
}

fn sender(user: WireUser) -> Sender {
    Sender { id: UserId(user.id), username: user.username, first_name: user.first_name }
}

/// Converts one wire update. The second value is the callback id still awaiting an answer.
pub fn envelope_from_update(update: WireUpdate) -> (InboundEnvelope, Option<String>) {
    let envelope_id = update.update_id.to_string();

    if let Some(query) = update.callback_query {
        let (action_id, value) = decode_callback(query.data.as_deref().unwrap_or_default());
        let event =
            InboundEvent::Action(ActionEvent { sender: sender(query.from), action_id, value });
        return (InboundEnvelope { envelope_id, event }, Some(query.id));
    }

    let event = match update.message {
        Some(WireMessage { from: Some(from), text: Some(text) }) => {
            InboundEvent::from_text(sender(from), text)
        }
        Some(_) => InboundEvent::Unsupported { event_type: "non_text_message".to_owned() },
        None => InboundEvent::Unsupported { event_type: "unknown_update".to_owned() },
    };
    (InboundEnvelope { envelope_id, event }, None)
}

/// `sendMessage` body: one button per keyboard row.
pub fn send_message_body(user: UserId, message: &MessageTemplate) -> Value {
    let rows: Vec<Value> = message
        .buttons()
        .map(|button| match button.url.as_deref() {
            Some(url) => json!([{ "text": button.label, "url": url }]),
            None => json!([{
                "text": button.label,
                "callback_data": encode_callback(&button.action_id, button.value.as_deref()),
            }]),
        })
        .collect();

    let mut body = json!({ "chat_id": user.0, "text": message.render_text() });
    if !rows.is_empty() {
        body["reply_markup"] = json!({ "inline_keyboard": rows });
    }
    body
}

pub struct HttpBotChannel {
    client: Arc<BotApiClient>,
}

impl HttpBotChannel {
    pub fn new(client: Arc<BotApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Channel for HttpBotChannel {
    async fn send_to_user(
        &self,
        user: UserId,
        message: &MessageTemplate,
    ) -> Result<(), ChannelError> {
        self.client
            .call::<Value>("sendMessage", &send_message_body(user, message))
            .await
            .map(|_| ())
            .map_err(|description| ChannelError::Rejected { user, description })
    }
}

#[derive(Default)]
struct PollState {
    offset: i64,
    buffered: VecDeque<InboundEnvelope>,
    pending_callbacks: HashMap<String, String>,
}

pub struct HttpPollingTransport {
    client: Arc<BotApiClient>,
    poll_timeout_secs: u64,
    state: Mutex<PollState>,
}

impl HttpPollingTransport {
    pub fn new(client: Arc<BotApiClient>, poll_timeout_secs: u64) -> Self {
        Self { client, poll_timeout_secs, state: Mutex::default() }
    }

    async fn poll(&self) -> Result<(), TransportError> {
        let offset = self.state.lock().await.offset;
        let body = json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        let updates: Vec<WireUpdate> =
            self.client.call("getUpdates", &body).await.map_err(TransportError::Receive)?;
        debug!(event_name = "ingress.http.polled", offset, count = updates.len(), "polled updates");

        let mut state = self.state.lock().await;
        for update in updates {
            let (envelope, callback_id) = envelope_from_update(update);
            if let Some(callback_id) = callback_id {
                state.pending_callbacks.insert(envelope.envelope_id.clone(), callback_id);
            }
            state.buffered.push_back(envelope);
        }
        Ok(())
    }
}

#[async_trait]
impl UpdateTransport for HttpPollingTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.client
            .call::<Value>("getMe", &json!({}))
            .await
            .map(|_| ())
            .map_err(TransportError::Connect)
    }

    /// Blocks in long polls until at least one update arrives.
    async fn next_envelope(&self) -> Result<Option<InboundEnvelope>, TransportError> {
        loop {
            if let Some(envelope) = self.state.lock().await.buffered.pop_front() {
                return Ok(Some(envelope));
            }
            self.poll().await?;
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let update_id: i64 = envelope_id
            .parse()
            .map_err(|_| TransportError::Acknowledge(format!("not an update id: {envelope_id}")))?;

        let callback_id = {
            let mut state = self.state.lock().await;
            state.offset = state.offset.max(update_id + 1);
            state.pending_callbacks.remove(envelope_id)
        };

        if let Some(callback_id) = callback_id {
            let body = json!({ "callback_query_id": callback_id });
            if let Err(error) = self.client.call::<Value>("answerCallbackQuery", &body).await {
                warn!(
                    event_name = "ingress.http.callback_answer_failed",
                    correlation_id = envelope_id,
                    error = %error,
                    "could not answer callback query"
                );
            }
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use marketbot_core::UserId;
    use serde_json::json;

    use super::{envelope_from_update, send_message_body, WireUpdate};
    use crate::blocks::{follow_up_message, text_message, ButtonElement, MessageBuilder};
    use crate::events::InboundEvent;

    fn update(value: serde_json::Value) -> WireUpdate {
        serde_json::from_value(value).expect("valid update")
    }

    #[test]
    fn text_updates_become_messages_or_commands() {
        let (envelope, callback) = envelope_from_update(update(json!({
            "update_id": 501,
            "message": { "from": { "id": 9, "username": "ada" }, "text": "I need food" }
        })));
        assert_eq!(envelope.envelope_id, "501");
        assert!(callback.is_none());
        let InboundEvent::Message(message) = envelope.event else {
            panic!("expected a message");
        };
        assert_eq!(message.sender.id, UserId(9));
        assert_eq!(message.sender.username.as_deref(), Some("ada"));

        let (envelope, _) = envelope_from_update(update(json!({
            "update_id": 502,
            "message": { "from": { "id": 9 }, "text": "/register" }
        })));
        assert!(matches!(envelope.event, InboundEvent::Command(_)));
    }

    #[test]
    fn callback_updates_become_actions_with_pending_answer() {
        let (envelope, callback) = envelope_from_update(update(json!({
            "update_id": 600,
            "callback_query": { "id": "cb-1", "from": { "id": 4 }, "data": "rate|5" }
        })));
        assert_eq!(callback.as_deref(), Some("cb-1"));
        let InboundEvent::Action(action) = envelope.event else {
            panic!("expected an action");
        };
        assert_eq!(action.action_id, "rate");
        assert_eq!(action.value.as_deref(), Some("5"));
    }

    #[test]
    fn non_text_messages_are_unsupported() {
        let (envelope, _) = envelope_from_update(update(json!({
            "update_id": 700,
            "message": { "from": { "id": 4 } }
        })));
        assert!(matches!(envelope.event, InboundEvent::Unsupported { .. }));
    }

    #[test]
    fn send_body_renders_inline_keyboard_rows() {
        let body = send_message_body(UserId(8), &follow_up_message(marketbot_core::OrderId(3)));
        assert_eq!(body["chat_id"], 8);
        let rows = body["reply_markup"]["inline_keyboard"].as_array().expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0]["callback_data"], "complete|3");
        assert_eq!(rows[1][0]["callback_data"], "incomplete|3");
    }

    #[test]
    fn send_body_omits_keyboard_without_buttons_and_keeps_link_urls() {
        let plain = send_message_body(UserId(8), &text_message("hi"));
        assert!(plain.get("reply_markup").is_none());
        assert_eq!(plain["text"], "hi");

        let linked = MessageBuilder::new("bot")
            .actions("a", |actions| {
                actions.button(ButtonElement::link("Open", "https://t.me/FreshBot"));
            })
            .build();
        let body = send_message_body(UserId(8), &linked);
        assert_eq!(body["reply_markup"]["inline_keyboard"][0][0]["url"], "https://t.me/FreshBot");
    }
}
