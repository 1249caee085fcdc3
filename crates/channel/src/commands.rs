use marketbot_core::{OrderId, VendorId};
use thiserror::Error;

pub const ACTION_VENDOR: &str = "vendor";
pub const ACTION_ORDER: &str = "order";
pub const ACTION_BOT_ORDER: &str = "botorder";
pub const ACTION_CONTACT: &str = "contact";
pub const ACTION_SEARCH_AGAIN: &str = "search_again";
pub const ACTION_RATE: &str = "rate";
pub const ACTION_COMPLETE: &str = "complete";
pub const ACTION_INCOMPLETE: &str = "incomplete";

/// Separates the action id from its value in wire callback data.
pub const CALLBACK_SEPARATOR: char = '|';

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Register,
    Cancel,
    Skip,
    OrderHistory,
    MyRating,
    /// Any other slash command; mid-flow it is treated as step text.
    Unrecognized(String),
}

impl BotCommand {
    pub fn name(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Register => "register",
            Self::Cancel => "cancel",
            Self::Skip => "skip",
            Self::OrderHistory => "orderhistory",
            Self::MyRating => "myrating",
            Self::Unrecognized(name) => name,
        }
    }

    /// Commands that only read state and may run without disturbing an active flow.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Start | Self::Help | Self::OrderHistory | Self::MyRating)
    }
}

/// A button press, decoded from its action id and value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotAction {
    ShowVendor(VendorId),
    PlaceOrder(VendorId),
    OrderViaBot(VendorId),
    ShowContact(VendorId),
    SearchAgain,
    /// Raw star choice; range checking belongs to the rating step.
    Rate(String),
    Complete(OrderId),
    Incomplete(OrderId),
}

impl BotAction {
    pub fn action_id(&self) -> &'static str {
        match self {
            Self::ShowVendor(_) => ACTION_VENDOR,
            Self::PlaceOrder(_) => ACTION_ORDER,
            Self::OrderViaBot(_) => ACTION_BOT_ORDER,
            Self::ShowContact(_) => ACTION_CONTACT,
            Self::SearchAgain => ACTION_SEARCH_AGAIN,
            Self::Rate(_) => ACTION_RATE,
            Self::Complete(_) => ACTION_COMPLETE,
            Self::Incomplete(_) => ACTION_INCOMPLETE,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("text is not a slash command: {0}")]
    NotACommand(String),
    #[error("unsupported action `{0}`")]
    UnsupportedAction(String),
    #[error("action `{action_id}` requires a value")]
    MissingActionValue { action_id: String },
    #[error("action `{action_id}` carries a malformed id `{value}`")]
    MalformedActionValue { action_id: String, value: String },
}

/// Parses `/name` or `/name@BotName` plus optional trailing arguments.
pub fn parse_command(text: &str) -> Result<BotCommand, CommandParseError> {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix('/') else {
        return Err(CommandParseError::NotACommand(trimmed.to_owned()));
    };

    let word = body.split_whitespace().next().unwrap_or_default();
    let name = word.split('@').next().unwrap_or_default().to_ascii_lowercase();

    Ok(match name.as_str() {
        "start" => BotCommand::Start,
        "help" => BotCommand::Help,
        "register" => BotCommand::Register,
        "cancel" => BotCommand::Cancel,
        "skip" => BotCommand::Skip,
        "orderhistory" => BotCommand::OrderHistory,
        "myrating" => BotCommand::MyRating,
        _ => BotCommand::Unrecognized(name),
    })
}

pub fn parse_action(action_id: &str, value: Option<&str>) -> Result<BotAction, CommandParseError> {
    let action_id = action_id.trim();
    match action_id {
        ACTION_VENDOR => vendor_value(action_id, value).map(BotAction::ShowVendor),
        ACTION_ORDER => vendor_value(action_id, value).map(BotAction::PlaceOrder),
        ACTION_BOT_ORDER => vendor_value(action_id, value).map(BotAction::OrderViaBot),
        ACTION_CONTACT => vendor_value(action_id, value).map(BotAction::ShowContact),
        ACTION_SEARCH_AGAIN => Ok(BotAction::SearchAgain),
        ACTION_RATE => required_value(action_id, value).map(|raw| BotAction::Rate(raw.to_owned())),
        ACTION_COMPLETE => order_value(action_id, value).map(BotAction::Complete),
        ACTION_INCOMPLETE => order_value(action_id, value).map(BotAction::Incomplete),
        other => Err(CommandParseError::UnsupportedAction(other.to_owned())),
    }
}

/// Wire form of an action: `id` alone, or `id|value`.
pub fn encode_callback(action_id: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("{action_id}{CALLBACK_SEPARATOR}{value}"),
        None => action_id.to_owned(),
    }
}

pub fn decode_callback(data: &str) -> (String, Option<String>) {
    match data.split_once(CALLBACK_SEPARATOR) {
        Some((action_id, value)) => (action_id.to_owned(), Some(value.to_owned())),
        None => (data.to_owned(), None),
    }
}

fn required_value<'a>(
    action_id: &str,
    value: Option<&'a str>,
) -> Result<&'a str, CommandParseError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CommandParseError::MissingActionValue { action_id: action_id.to_owned() })
}

fn numeric_value(action_id: &str, value: Option<&str>) -> Result<i64, CommandParseError> {
    let raw = required_value(action_id, value)?;
    raw.parse::<i64>().map_err(|_| CommandParseError::MalformedActionValue {
        action_id: action_id.to_owned(),
        value: raw.to_owned(),
    })
}

fn vendor_value(action_id: &str, value: Option<&str>) -> Result<VendorId, CommandParseError> {
    numeric_value(action_id, value).map(VendorId)
}

fn order_value(action_id: &str, value: Option<&str>) -> Result<OrderId, CommandParseError> {
    numeric_value(action_id, value).map(OrderId)
}
