//! Conversation runtime - routes inbound events through flows and searches
//!
//! This crate is the part of the marketplace that decides what to say:
//! - Runs the registration, order placement and rating flows per user
//! - Classifies free text when no flow is active and answers searches
//! - Persists completed flows through the repository
//! - Notifies vendors and schedules the post-order follow-up
//!
//! # Architecture
//!
//! Every inbound event takes the user's session lock first:
//! 1. **In flow** - text, `/skip` and button presses go to the active step
//! 2. **Idle** - commands and actions are routed, free text is classified
//! 3. **Completion** - the repository outcome decides the reply; state is
//!    cleared only after that outcome is known
//!
//! # Key Types
//!
//! - `Assistant` - implements the channel's message, command and action services
//! - `Scheduler` - deferred work such as `OrderFollowUp`
//! - `replies` - step prompts and small-talk texts

pub mod assistant;
pub mod followup;
pub mod replies;

pub use assistant::{Assistant, DEFAULT_FOLLOWUP_DELAY};
pub use followup::{
    DeferredTask, FollowUpOutcome, ManualScheduler, OrderFollowUp, Scheduler, TokioScheduler,
};
