pub mod drafts;
pub mod engine;
pub mod states;

pub use drafts::{order_draft, rating_draft, vendor_draft};
pub use engine::{
    FlowDefinition, FlowEngine, FlowTransitionError, OrderPlacementFlow, RatingFlow,
    RegistrationFlow, StepValidationError, SKIP_TOKEN,
};
pub use states::{fields, ActiveFlow, FlowKind, FlowStep, NextStep, StepInput, TransitionOutcome};
