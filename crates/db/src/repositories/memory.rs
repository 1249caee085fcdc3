use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use marketbot_core::domain::order::{NewOrder, Order, OrderId, OrderStatus};
use marketbot_core::domain::rating::{NewRating, Rating, RatingId};
use marketbot_core::domain::user::UserId;
use marketbot_core::domain::vendor::{NewVendor, Vendor, VendorAggregate, VendorId};
use marketbot_core::errors::Entity;

use super::{MarketplaceRepository, RepositoryError};

#[derive(Default)]
struct Tables {
    vendors: BTreeMap<i64, Vendor>,
    orders: BTreeMap<i64, Order>,
    ratings: BTreeMap<i64, Rating>,
    next_vendor_id: i64,
    next_order_id: i64,
    next_rating_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Default)]
pub struct InMemoryMarketplaceRepository {
    tables: RwLock<Tables>,
}

impl InMemoryMarketplaceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl MarketplaceRepository for InMemoryMarketplaceRepository {
    async fn find_vendor_by_owner(&self, owner: UserId) -> Result<Option<Vendor>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.vendors.values().find(|vendor| vendor.owner == owner).cloned())
    }

    async fn insert_vendor(&self, vendor: NewVendor) -> Result<VendorId, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.vendors.values().any(|existing| existing.owner == vendor.owner) {
            return Err(RepositoryError::DuplicateVendor { owner: vendor.owner });
        }

        let id = VendorId(next_id(&mut tables.next_vendor_id));
        tables.vendors.insert(
            id.0,
            Vendor {
                id,
                owner: vendor.owner,
                business_name: vendor.business_name,
                services: vendor.services,
                keywords: vendor.keywords,
                contact: vendor.contact,
                bot_handle: vendor.bot_handle,
                description: vendor.description,
                price_range: vendor.price_range,
                avg_rating: 0.0,
                total_orders: 0,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn list_vendors(&self) -> Result<Vec<Vendor>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.vendors.values().cloned().collect())
    }

    async fn find_vendor(&self, id: VendorId) -> Result<Option<Vendor>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.vendors.get(&id.0).cloned())
    }

    async fn insert_order(&self, order: NewOrder) -> Result<OrderId, RepositoryError> {
        let mut tables = self.tables.write().await;
        let id = OrderId(next_id(&mut tables.next_order_id));
        tables.orders.insert(
            id.0,
            Order {
                id,
                vendor_id: order.vendor_id,
                buyer_id: order.buyer_id,
                details: order.details,
                deadline: order.deadline,
                status: OrderStatus::Pending,
                created_at: Utc::now(),
                completed_at: None,
            },
        );
        Ok(id)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&id.0).cloned())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(&id.0)
            .ok_or(RepositoryError::NotFound { entity: Entity::Order, id: id.0 })?;

        order.status = status;
        if completed_at.is_some() {
            order.completed_at = completed_at;
        }
        Ok(())
    }

    async fn insert_rating(&self, rating: NewRating) -> Result<RatingId, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.ratings.values().any(|existing| existing.order_id == rating.order_id) {
            return Err(RepositoryError::DuplicateRating { order_id: rating.order_id });
        }

        let id = RatingId(next_id(&mut tables.next_rating_id));
        tables.ratings.insert(
            id.0,
            Rating {
                id,
                order_id: rating.order_id,
                vendor_id: rating.vendor_id,
                buyer_id: rating.buyer_id,
                stars: rating.stars,
                review: rating.review,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn recompute_vendor_aggregate(
        &self,
        vendor_id: VendorId,
    ) -> Result<VendorAggregate, RepositoryError> {
        let mut tables = self.tables.write().await;
        let aggregate = VendorAggregate::from_stars(
            tables
                .ratings
                .values()
                .filter(|rating| rating.vendor_id == vendor_id)
                .map(|rating| rating.stars),
        );

        let vendor = tables
            .vendors
            .get_mut(&vendor_id.0)
            .ok_or(RepositoryError::NotFound { entity: Entity::Vendor, id: vendor_id.0 })?;
        vendor.avg_rating = aggregate.avg_rating;
        vendor.total_orders = aggregate.total_orders;
        Ok(aggregate)
    }

    async fn list_orders_for_vendor(
        &self,
        vendor_id: VendorId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .rev()
            .filter(|order| order.vendor_id == vendor_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_ratings_for_vendor(
        &self,
        vendor_id: VendorId,
        limit: u32,
    ) -> Result<Vec<Rating>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .ratings
            .values()
            .rev()
            .filter(|rating| rating.vendor_id == vendor_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_rating_by_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Rating>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.ratings.values().find(|rating| rating.order_id == order_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryMarketplaceRepository;
    use crate::repositories::contract::{self, TestResult};

    #[tokio::test]
    async fn vendor_roundtrip_and_duplicate_owner() -> TestResult<()> {
        contract::vendor_roundtrip_and_duplicate_owner(&InMemoryMarketplaceRepository::new()).await
    }

    #[tokio::test]
    async fn vendors_list_in_registration_order() -> TestResult<()> {
        contract::vendors_list_in_registration_order(&InMemoryMarketplaceRepository::new()).await
    }

    #[tokio::test]
    async fn order_status_lifecycle() -> TestResult<()> {
        contract::order_status_lifecycle(&InMemoryMarketplaceRepository::new()).await
    }

    #[tokio::test]
    async fn aggregate_is_recomputed_from_all_ratings() -> TestResult<()> {
        contract::aggregate_is_recomputed_from_all_ratings(&InMemoryMarketplaceRepository::new())
            .await
    }

    #[tokio::test]
    async fn one_rating_per_order() -> TestResult<()> {
        contract::one_rating_per_order(&InMemoryMarketplaceRepository::new()).await
    }

    #[tokio::test]
    async fn vendor_orders_are_newest_first_and_limited() -> TestResult<()> {
        contract::vendor_orders_are_newest_first_and_limited(&InMemoryMarketplaceRepository::new())
            .await
    }
}
