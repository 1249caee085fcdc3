use thiserror::Error;

use crate::domain::rating::Stars;
use crate::flows::states::{
    fields, ActiveFlow, FlowKind, FlowStep, NextStep, StepInput, TransitionOutcome,
};
use crate::keywords::extract_keywords;

/// Replies that mean "no external bot".
pub const NEGATIVE_HANDLE_TOKENS: &[&str] =
    &["no", "skip", "none", "nope", "na", "n/a", "don't have", "dont have"];

/// Review text that stores no review.
pub const SKIP_TOKEN: &str = "/skip";

pub const DESCRIPTION_LIMIT: usize = 200;

pub trait FlowDefinition {
    fn kind(&self) -> FlowKind;

    fn steps(&self) -> &'static [FlowStep] {
        self.kind().steps()
    }

    /// Field writes for one accepted input. An empty list leaves the field absent.
    fn accept(
        &self,
        step: FlowStep,
        input: &StepInput,
    ) -> Result<Vec<(&'static str, String)>, StepValidationError> {
        accept_step(step, input)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RegistrationFlow;

#[derive(Clone, Copy, Debug, Default)]
pub struct OrderPlacementFlow;

#[derive(Clone, Copy, Debug, Default)]
pub struct RatingFlow;

impl FlowDefinition for RegistrationFlow {
    fn kind(&self) -> FlowKind {
        FlowKind::Registration
    }
}

impl FlowDefinition for OrderPlacementFlow {
    fn kind(&self) -> FlowKind {
        FlowKind::OrderPlacement
    }
}

impl FlowDefinition for RatingFlow {
    fn kind(&self) -> FlowKind {
        FlowKind::Rating
    }
}

impl FlowDefinition for FlowKind {
    fn kind(&self) -> FlowKind {
        *self
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn kind(&self) -> FlowKind {
        self.flow.kind()
    }

    /// Applies one input to the current step without touching `current`.
    pub fn apply(
        &self,
        current: &ActiveFlow,
        input: &StepInput,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let kind = self.flow.kind();
        if current.kind != kind {
            return Err(FlowTransitionError::KindMismatch { expected: kind, actual: current.kind });
        }

        let steps = self.flow.steps();
        let step = steps
            .get(current.step)
            .copied()
            .ok_or(FlowTransitionError::StepOutOfRange { kind, step: current.step })?;

        let writes = self
            .flow
            .accept(step, input)
            .map_err(|source| FlowTransitionError::Validation { step, source })?;

        let mut flow = current.clone();
        for (field, value) in writes {
            flow.fields.insert(field.to_owned(), value);
        }
        flow.step += 1;

        let next = match steps.get(flow.step) {
            Some(next_step) => NextStep::Prompt(*next_step),
            None => NextStep::Complete,
        };

        Ok(TransitionOutcome { from: step, next, flow })
    }
}

impl Default for FlowEngine<RegistrationFlow> {
    fn default() -> Self {
        Self::new(RegistrationFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StepValidationError {
    #[error("a non-empty reply is required")]
    Blank,
    #[error("a typed reply is required, not a button press")]
    ExpectedText,
    #[error("one of the offered options is required")]
    ExpectedChoice,
    #[error("`{0}` is not one of the offered options")]
    InvalidChoice(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid input for step {step}: {source}")]
    Validation { step: FlowStep, source: StepValidationError },
    #[error("flow {kind} has no step {step}")]
    StepOutOfRange { kind: FlowKind, step: usize },
    #[error("engine for {expected} cannot drive a {actual} flow")]
    KindMismatch { expected: FlowKind, actual: FlowKind },
    #[error("missing required fields for {kind}: {missing_fields:?}")]
    MissingRequiredFields { kind: FlowKind, missing_fields: Vec<String> },
    #[error("field {field} holds malformed value `{value}`")]
    MalformedField { field: &'static str, value: String },
}

fn accept_step(
    step: FlowStep,
    input: &StepInput,
) -> Result<Vec<(&'static str, String)>, StepValidationError> {
    let text = match (step, input) {
        (FlowStep::Stars, StepInput::Choice(choice)) => {
            return accept_stars(choice).map(|stars| vec![(fields::STARS, stars.to_string())]);
        }
        (FlowStep::Stars, StepInput::Text(_)) => return Err(StepValidationError::ExpectedChoice),
        (_, StepInput::Choice(_)) => return Err(StepValidationError::ExpectedText),
        (_, StepInput::Text(text)) => text,
    };

    let writes = match step {
        FlowStep::BusinessName => {
            let name = text.trim();
            if name.is_empty() {
                return Err(StepValidationError::Blank);
            }
            vec![(fields::BUSINESS_NAME, name.to_owned())]
        }
        FlowStep::Services => vec![
            (fields::SERVICES, text.clone()),
            (fields::KEYWORDS, extract_keywords(text).join()),
        ],
        FlowStep::BotHandle => match normalize_bot_handle(text)? {
            Some(handle) => vec![(fields::BOT_HANDLE, handle)],
            None => Vec::new(),
        },
        FlowStep::Description => {
            vec![(fields::DESCRIPTION, truncate_chars(text, DESCRIPTION_LIMIT))]
        }
        FlowStep::Review => {
            if text.trim() == SKIP_TOKEN {
                Vec::new()
            } else {
                vec![(fields::REVIEW, text.clone())]
            }
        }
        FlowStep::Contact | FlowStep::PriceRange | FlowStep::OrderDetails | FlowStep::Deadline => {
            vec![(step.field(), text.clone())]
        }
        FlowStep::Stars => return Err(StepValidationError::ExpectedChoice),
    };

    Ok(writes)
}

fn accept_stars(choice: &str) -> Result<Stars, StepValidationError> {
    choice
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(|value| Stars::new(value).ok())
        .ok_or_else(|| StepValidationError::InvalidChoice(choice.to_owned()))
}

/// `None` for a negative reply, otherwise the handle with a leading `@`.
pub fn normalize_bot_handle(text: &str) -> Result<Option<String>, StepValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(StepValidationError::Blank);
    }
    let lowered = trimmed.to_lowercase();
    if trimmed == SKIP_TOKEN || NEGATIVE_HANDLE_TOKENS.contains(&lowered.as_str()) {
        return Ok(None);
    }
    if trimmed.starts_with('@') {
        Ok(Some(trimmed.to_owned()))
    } else {
        Ok(Some(format!("@{trimmed}")))
    }
}

pub fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
