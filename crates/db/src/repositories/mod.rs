use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use marketbot_core::domain::order::{NewOrder, Order, OrderId, OrderStatus};
use marketbot_core::domain::rating::{NewRating, Rating, RatingId};
use marketbot_core::domain::user::UserId;
use marketbot_core::domain::vendor::{NewVendor, Vendor, VendorAggregate, VendorId};
use marketbot_core::errors::{ApplicationError, Entity};

pub mod memory;
pub mod sql;

pub use memory::InMemoryMarketplaceRepository;
pub use sql::SqlMarketplaceRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("user {owner} already owns a vendor")]
    DuplicateVendor { owner: UserId },
    #[error("order {order_id} already has a rating")]
    DuplicateRating { order_id: OrderId },
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::DuplicateVendor { owner } => Self::DuplicateVendor { owner },
            RepositoryError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Storage for vendors, orders and ratings.
#[async_trait]
pub trait MarketplaceRepository: Send + Sync {
    async fn find_vendor_by_owner(&self, owner: UserId) -> Result<Option<Vendor>, RepositoryError>;

    /// Fails with [`RepositoryError::DuplicateVendor`] when `owner` already has a vendor.
    async fn insert_vendor(&self, vendor: NewVendor) -> Result<VendorId, RepositoryError>;

    /// Every vendor in registration order.
    async fn list_vendors(&self) -> Result<Vec<Vendor>, RepositoryError>;

    async fn find_vendor(&self, id: VendorId) -> Result<Option<Vendor>, RepositoryError>;

    /// Stored as [`OrderStatus::Pending`].
    async fn insert_order(&self, order: NewOrder) -> Result<OrderId, RepositoryError>;

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError>;

    async fn insert_rating(&self, rating: NewRating) -> Result<RatingId, RepositoryError>;

    /// Overwrites the vendor's aggregate with the mean and count of all its ratings.
    async fn recompute_vendor_aggregate(
        &self,
        vendor_id: VendorId,
    ) -> Result<VendorAggregate, RepositoryError>;

    /// Newest first.
    async fn list_orders_for_vendor(
        &self,
        vendor_id: VendorId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Newest first.
    async fn list_ratings_for_vendor(
        &self,
        vendor_id: VendorId,
        limit: u32,
    ) -> Result<Vec<Rating>, RepositoryError>;

    async fn find_rating_by_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Rating>, RepositoryError>;
}
