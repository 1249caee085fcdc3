use thiserror::Error;

use crate::domain::order::OrderStatus;
use crate::domain::user::UserId;
use crate::flows::FlowTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid order transition from {from:?} to {to:?}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },
    #[error("stars must be within 1..=5, got {0}")]
    InvalidStars(i64),
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Vendor,
    Order,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vendor => f.write_str("vendor"),
            Self::Order => f.write_str("order"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("user {owner} already owns a vendor")]
    DuplicateVendor { owner: UserId },
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("notification failure: {0}")]
    Notification(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::DuplicateVendor { .. } => {
                "You're already registered as a vendor. Check /myrating to see how you're doing!"
            }
            Self::NotFound { entity: Entity::Vendor, .. } => {
                "That vendor is no longer available. Try searching again."
            }
            Self::NotFound { entity: Entity::Order, .. } => "That order could not be found.",
            Self::Domain(_)
            | Self::Persistence(_)
            | Self::Notification(_)
            | Self::Configuration(_) => "Something went wrong on our side. Please try again.",
        }
    }

    /// Failures that end the active flow instead of re-prompting.
    pub fn aborts_flow(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Domain(_) | Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::order::OrderStatus;
    use crate::domain::user::UserId;
    use crate::errors::{ApplicationError, DomainError, Entity};

    #[test]
    fn duplicate_vendor_has_friendly_message() {
        let error = ApplicationError::DuplicateVendor { owner: UserId(9) };
        assert!(error.user_message().contains("already registered"));
        assert!(!error.aborts_flow());
    }

    #[test]
    fn not_found_message_names_the_entity() {
        let vendor = ApplicationError::NotFound { entity: Entity::Vendor, id: 3 };
        let order = ApplicationError::NotFound { entity: Entity::Order, id: 4 };

        assert_eq!(vendor.to_string(), "vendor 3 not found");
        assert!(vendor.user_message().contains("no longer available"));
        assert_eq!(order.user_message(), "That order could not be found.");
    }

    #[test]
    fn persistence_failure_is_generic_and_aborts() {
        let error = ApplicationError::Persistence("database is locked".to_owned());
        assert_eq!(error.user_message(), "Something went wrong on our side. Please try again.");
        assert!(error.aborts_flow());
    }

    #[test]
    fn domain_error_converts_into_application_error() {
        let error = ApplicationError::from(DomainError::InvalidOrderTransition {
            from: OrderStatus::Flagged,
            to: OrderStatus::Completed,
        });
        assert!(matches!(error, ApplicationError::Domain(_)));
        assert!(!error.user_message().contains("Flagged"));
    }
}
