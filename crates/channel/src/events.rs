use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use marketbot_core::Sender;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    blocks::{self, MessageTemplate},
    commands::{parse_action, parse_command, BotAction, BotCommand, CommandParseError},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEnvelope {
    pub envelope_id: String,
    pub event: InboundEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Message(MessageEvent),
    Command(CommandEvent),
    Action(ActionEvent),
    Unsupported { event_type: String },
}

impl InboundEvent {
    /// Leading `/` makes it a command; anything else is free text.
    pub fn from_text(sender: Sender, text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim_start().starts_with('/') {
            Self::Command(CommandEvent { sender, text })
        } else {
            Self::Message(MessageEvent { sender, text })
        }
    }

    pub fn event_type(&self) -> InboundEventType {
        match self {
            Self::Message(_) => InboundEventType::Message,
            Self::Command(_) => InboundEventType::Command,
            Self::Action(_) => InboundEventType::Action,
            Self::Unsupported { .. } => InboundEventType::Unsupported,
        }
    }

    pub fn sender(&self) -> Option<&Sender> {
        match self {
            Self::Message(event) => Some(&event.sender),
            Self::Command(event) => Some(&event.sender),
            Self::Action(event) => Some(&event.sender),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InboundEventType {
    Message,
    Command,
    Action,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub sender: Sender,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEvent {
    pub sender: Sender,
    /// Full text including the leading `/`.
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionEvent {
    pub sender: Sender,
    pub action_id: String,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: Uuid::new_v4().to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Processed,
    Ignored,
}

impl From<Option<MessageTemplate>> for HandlerResult {
    fn from(message: Option<MessageTemplate>) -> Self {
        match message {
            Some(message) => Self::Responded(message),
            None => Self::Processed,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error("conversation handler failure: {0}")]
    Service(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> InboundEventType;
    async fn handle(
        &self,
        envelope: &InboundEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<InboundEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &InboundEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Registers message, command and action handlers that all route to one service.
pub fn conversation_dispatcher<S>(service: Arc<S>) -> EventDispatcher
where
    S: MessageService + CommandService + ActionService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(service.clone()));
    dispatcher.register(CommandHandler::new(service.clone()));
    dispatcher.register(ActionHandler::new(service));
    dispatcher
}

pub fn default_dispatcher() -> EventDispatcher {
    conversation_dispatcher(Arc::new(NoopConversationService))
}

#[async_trait]
pub trait MessageService: Send + Sync {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError>;
}

#[async_trait]
pub trait CommandService: Send + Sync {
    async fn handle_command(
        &self,
        command: BotCommand,
        event: &CommandEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError>;
}

#[async_trait]
pub trait ActionService: Send + Sync {
    async fn handle_action(
        &self,
        action: BotAction,
        event: &ActionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError>;
}

#[async_trait]
impl<T> MessageService for Arc<T>
where
    T: MessageService + ?Sized,
{
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        (**self).handle_message(event, ctx).await
    }
}

#[async_trait]
impl<T> CommandService for Arc<T>
where
    T: CommandService + ?Sized,
{
    async fn handle_command(
        &self,
        command: BotCommand,
        event: &CommandEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        (**self).handle_command(command, event, ctx).await
    }
}

#[async_trait]
impl<T> ActionService for Arc<T>
where
    T: ActionService + ?Sized,
{
    async fn handle_action(
        &self,
        action: BotAction,
        event: &ActionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        (**self).handle_action(action, event, ctx).await
    }
}

pub struct MessageHandler<S> {
    service: S,
}

impl<S> MessageHandler<S>
where
    S: MessageService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: MessageService + 'static,
{
    fn event_type(&self) -> InboundEventType {
        InboundEventType::Message
    }

    async fn handle(
        &self,
        envelope: &InboundEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        if event.text.trim().is_empty() {
            return Ok(HandlerResult::Ignored);
        }

        Ok(self.service.handle_message(event, ctx).await?.into())
    }
}

pub struct CommandHandler<S> {
    service: S,
}

impl<S> CommandHandler<S>
where
    S: CommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for CommandHandler<S>
where
    S: CommandService + 'static,
{
    fn event_type(&self) -> InboundEventType {
        InboundEventType::Command
    }

    async fn handle(
        &self,
        envelope: &InboundEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::Command(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let command = parse_command(&event.text)?;
        Ok(self.service.handle_command(command, event, ctx).await?.into())
    }
}

pub struct ActionHandler<S> {
    service: S,
}

impl<S> ActionHandler<S>
where
    S: ActionService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ActionHandler<S>
where
    S: ActionService + 'static,
{
    fn event_type(&self) -> InboundEventType {
        InboundEventType::Action
    }

    async fn handle(
        &self,
        envelope: &InboundEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::Action(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let action = parse_action(&event.action_id, event.value.as_deref())?;
        Ok(self.service.handle_action(action, event, ctx).await?.into())
    }
}

/// Stateless stand-in that answers with static guidance.
#[derive(Default)]
pub struct NoopConversationService;

#[async_trait]
impl MessageService for NoopConversationService {
    async fn handle_message(
        &self,
        _event: &MessageEvent,
        _ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        Ok(Some(blocks::help_message()))
    }
}

#[async_trait]
impl CommandService for NoopConversationService {
    async fn handle_command(
        &self,
        command: BotCommand,
        _event: &CommandEvent,
        _ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        Ok(Some(match command {
            BotCommand::Start => blocks::welcome_message(),
            _ => blocks::help_message(),
        }))
    }
}

#[async_trait]
impl ActionService for NoopConversationService {
    async fn handle_action(
        &self,
        action: BotAction,
        _event: &ActionEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        Ok(Some(blocks::error_message(
            &format!("Button `{}` is not available right now.", action.action_id()),
            &ctx.correlation_id,
        )))
    }
}
