//! Conversational channel for marketbot.
//!
//! - **Events** (`events`) - inbound messages, commands and button actions, plus the dispatcher
//! - **Commands** (`commands`) - slash-command and callback-data parsing
//! - **Blocks** (`blocks`) - message templates with inline buttons
//! - **Runner** (`runner`) - transport loop with reconnection logic
//! - **Outbound** (`outbound`) - the `Channel` used to reach users outside a reply
//! - **HTTP** (`http`) - bot HTTP API transport and channel
//!
//! # Architecture
//!
//! ```text
//! UpdateTransport → TransportRunner → EventDispatcher → Handlers → Assistant
//!                         ↓
//!                  Channel::send_to_user ← HandlerResult::Responded
//! ```

pub mod blocks;
pub mod commands;
pub mod events;
pub mod http;
pub mod outbound;
pub mod runner;
