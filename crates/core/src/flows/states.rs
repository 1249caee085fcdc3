use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Field names written into [`ActiveFlow::fields`].
pub mod fields {
    pub const BUSINESS_NAME: &str = "business_name";
    pub const SERVICES: &str = "services";
    pub const KEYWORDS: &str = "keywords";
    pub const CONTACT: &str = "contact";
    pub const BOT_HANDLE: &str = "bot_handle";
    pub const DESCRIPTION: &str = "description";
    pub const PRICE_RANGE: &str = "price_range";
    pub const VENDOR_ID: &str = "vendor_id";
    pub const ORDER_DETAILS: &str = "order_details";
    pub const DEADLINE: &str = "deadline";
    pub const ORDER_ID: &str = "order_id";
    pub const STARS: &str = "stars";
    pub const REVIEW: &str = "review";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Registration,
    OrderPlacement,
    Rating,
}

impl FlowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::OrderPlacement => "order_placement",
            Self::Rating => "rating",
        }
    }

    pub fn steps(self) -> &'static [FlowStep] {
        use FlowStep::*;
        match self {
            Self::Registration => {
                &[BusinessName, Services, Contact, BotHandle, Description, PriceRange]
            }
            Self::OrderPlacement => &[OrderDetails, Deadline],
            Self::Rating => &[Stars, Review],
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    BusinessName,
    Services,
    Contact,
    BotHandle,
    Description,
    PriceRange,
    OrderDetails,
    Deadline,
    Stars,
    Review,
}

impl FlowStep {
    pub fn field(self) -> &'static str {
        match self {
            Self::BusinessName => fields::BUSINESS_NAME,
            Self::Services => fields::SERVICES,
            Self::Contact => fields::CONTACT,
            Self::BotHandle => fields::BOT_HANDLE,
            Self::Description => fields::DESCRIPTION,
            Self::PriceRange => fields::PRICE_RANGE,
            Self::OrderDetails => fields::ORDER_DETAILS,
            Self::Deadline => fields::DEADLINE,
            Self::Stars => fields::STARS,
            Self::Review => fields::REVIEW,
        }
    }

    /// Steps fed by a constrained choice rather than free text.
    pub fn expects_choice(self) -> bool {
        matches!(self, Self::Stars)
    }
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// One inbound unit delivered to the active step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepInput {
    Text(String),
    Choice(String),
}

impl StepInput {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn choice(value: impl Into<String>) -> Self {
        Self::Choice(value.into())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFlow {
    pub kind: FlowKind,
    pub step: usize,
    pub fields: BTreeMap<String, String>,
}

impl ActiveFlow {
    pub fn new(kind: FlowKind) -> Self {
        Self { kind, step: 0, fields: BTreeMap::new() }
    }

    pub fn seeded<I, K, V>(kind: FlowKind, seed: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = seed.into_iter().map(|(key, value)| (key.into(), value.into())).collect();
        Self { kind, step: 0, fields }
    }

    pub fn current_step(&self) -> Option<FlowStep> {
        self.kind.steps().get(self.step).copied()
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextStep {
    Prompt(FlowStep),
    Complete,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowStep,
    pub next: NextStep,
    /// Flow after the input was applied; the caller stores it only once any
    /// completion side effects have settled.
    pub flow: ActiveFlow,
}
