use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::rating::Stars;
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VendorId(pub i64);

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub owner: UserId,
    pub business_name: String,
    pub services: String,
    /// Space-joined keyword text derived from `services` at registration.
    pub keywords: String,
    pub contact: String,
    pub bot_handle: Option<String>,
    pub description: String,
    pub price_range: String,
    pub avg_rating: f64,
    pub total_orders: i64,
    pub created_at: DateTime<Utc>,
}

impl Vendor {
    pub fn has_bot(&self) -> bool {
        self.bot_handle.is_some()
    }

    pub fn is_rated(&self) -> bool {
        self.total_orders > 0
    }
}

/// Fields collected by the registration flow, ready to insert.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVendor {
    pub owner: UserId,
    pub business_name: String,
    pub services: String,
    pub keywords: String,
    pub contact: String,
    pub bot_handle: Option<String>,
    pub description: String,
    pub price_range: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VendorAggregate {
    pub avg_rating: f64,
    pub total_orders: i64,
}

impl VendorAggregate {
    pub const EMPTY: Self = Self { avg_rating: 0.0, total_orders: 0 };

    /// Mean and count over the complete rating set for one vendor.
    pub fn from_stars<I>(stars: I) -> Self
    where
        I: IntoIterator<Item = Stars>,
    {
        let (sum, count) = stars
            .into_iter()
            .fold((0_i64, 0_i64), |(sum, count), star| (sum + i64::from(star.get()), count + 1));

        if count == 0 {
            return Self::EMPTY;
        }

        Self { avg_rating: sum as f64 / count as f64, total_orders: count }
    }
}

#[cfg(test)]
mod tests {
    use super::VendorAggregate;
    use crate::domain::rating::Stars;

    fn stars(values: &[u8]) -> Vec<Stars> {
        values.iter().map(|value| Stars::new(*value).expect("valid stars")).collect()
    }

    #[test]
    fn aggregate_is_mean_and_count_of_all_ratings() {
        let aggregate = VendorAggregate::from_stars(stars(&[5, 3, 4]));
        assert_eq!(aggregate.total_orders, 3);
        assert!((aggregate.avg_rating - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn aggregate_does_not_depend_on_insertion_order() {
        let forward = VendorAggregate::from_stars(stars(&[5, 3, 4]));
        let reversed = VendorAggregate::from_stars(stars(&[4, 3, 5]));
        assert_eq!(forward, reversed);
    }

    #[test]
    fn empty_rating_set_yields_zero_aggregate() {
        assert_eq!(VendorAggregate::from_stars(Vec::new()), VendorAggregate::EMPTY);
    }
}
