pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod intent;
pub mod keywords;
pub mod matcher;
pub mod session;

pub use domain::order::{NewOrder, Order, OrderId, OrderStatus};
pub use domain::rating::{NewRating, Rating, RatingId, Stars};
pub use domain::user::{Sender, UserId};
pub use domain::vendor::{NewVendor, Vendor, VendorAggregate, VendorId};
pub use errors::{ApplicationError, DomainError, Entity};
pub use flows::{ActiveFlow, FlowKind, FlowStep, StepInput};
pub use intent::{classify, Classification, Intent};
pub use keywords::{extract_keywords, KeywordSet};
pub use matcher::{VendorMatch, VendorMatcher, MAX_LISTED_VENDORS};
pub use session::{ConversationState, SessionStore};
