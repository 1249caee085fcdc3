use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the person behind an inbound message or action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl Sender {
    pub fn new(id: UserId) -> Self {
        Self { id, username: None, first_name: None }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    /// `@username` when known, otherwise a numeric fallback.
    pub fn handle(&self) -> String {
        match self.username.as_deref().map(str::trim).filter(|name| !name.is_empty()) {
            Some(username) => format!("@{}", username.trim_start_matches('@')),
            None => format!("User {}", self.id),
        }
    }

    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("Customer")
    }
}

#[cfg(test)]
mod tests {
    use super::{Sender, UserId};

    #[test]
    fn handle_prefers_username_and_normalizes_at_sign() {
        assert_eq!(Sender::new(UserId(7)).with_username("ada").handle(), "@ada");
        assert_eq!(Sender::new(UserId(7)).with_username("@ada").handle(), "@ada");
        assert_eq!(Sender::new(UserId(7)).handle(), "User 7");
    }

    #[test]
    fn display_name_falls_back_to_customer() {
        assert_eq!(Sender::new(UserId(1)).display_name(), "Customer");
        assert_eq!(Sender::new(UserId(1)).with_first_name("Tobi").display_name(), "Tobi");
    }
}
