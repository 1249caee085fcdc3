use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::OrderId;
use crate::domain::user::UserId;
use crate::domain::vendor::VendorId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RatingId(pub i64);

impl fmt::Display for RatingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Star score in `1..=5`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Stars(u8);

impl Stars {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, DomainError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::InvalidStars(i64::from(value)))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Stars> {
        (Self::MIN..=Self::MAX).map(Stars)
    }

    pub fn glyphs(self) -> String {
        "⭐".repeat(usize::from(self.0))
    }
}

impl TryFrom<u8> for Stars {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for Stars {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value).map_err(|_| DomainError::InvalidStars(value)).and_then(Self::new)
    }
}

impl From<Stars> for u8 {
    fn from(value: Stars) -> Self {
        value.0
    }
}

impl fmt::Display for Stars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub id: RatingId,
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub buyer_id: UserId,
    pub stars: Stars,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRating {
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub buyer_id: UserId,
    pub stars: Stars,
    pub review: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::Stars;
    use crate::errors::DomainError;

    #[test]
    fn stars_accept_only_one_through_five() {
        assert_eq!(Stars::new(0), Err(DomainError::InvalidStars(0)));
        assert_eq!(Stars::new(6), Err(DomainError::InvalidStars(6)));
        assert_eq!(Stars::all().map(Stars::get).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn wide_integers_out_of_range_are_rejected() {
        assert_eq!(Stars::try_from(-3_i64), Err(DomainError::InvalidStars(-3)));
        assert_eq!(Stars::try_from(300_i64), Err(DomainError::InvalidStars(300)));
        assert_eq!(Stars::try_from(4_i64).map(Stars::get), Ok(4));
    }

    #[test]
    fn glyphs_repeat_per_star() {
        assert_eq!(Stars::new(3).map(Stars::glyphs), Ok("⭐⭐⭐".to_owned()));
    }
}
