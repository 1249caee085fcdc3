pub mod order;
pub mod rating;
pub mod user;
pub mod vendor;
