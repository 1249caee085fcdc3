use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use marketbot_core::domain::order::{NewOrder, Order, OrderId, OrderStatus};
use marketbot_core::domain::rating::{NewRating, Rating, RatingId, Stars};
use marketbot_core::domain::user::UserId;
use marketbot_core::domain::vendor::{NewVendor, Vendor, VendorAggregate, VendorId};
use marketbot_core::errors::Entity;

use super::{MarketplaceRepository, RepositoryError};
use crate::DbPool;

const VENDOR_COLUMNS: &str = "id, owner_user_id, business_name, services, keywords, contact, \
     bot_handle, description, price_range, avg_rating, total_orders, created_at";

const ORDER_COLUMNS: &str =
    "id, vendor_id, buyer_user_id, details, deadline, status, created_at, completed_at";

const RATING_COLUMNS: &str = "id, order_id, vendor_id, buyer_user_id, stars, review, created_at";

pub struct SqlMarketplaceRepository {
    pool: DbPool,
}

impl SqlMarketplaceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl MarketplaceRepository for SqlMarketplaceRepository {
    async fn find_vendor_by_owner(&self, owner: UserId) -> Result<Option<Vendor>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {VENDOR_COLUMNS} FROM vendors WHERE owner_user_id = ?"
        ))
        .bind(owner.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|value| vendor_from_row(&value)).transpose()
    }

    async fn insert_vendor(&self, vendor: NewVendor) -> Result<VendorId, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO vendors (
                owner_user_id, business_name, services, keywords, contact,
                bot_handle, description, price_range, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(vendor.owner.0)
        .bind(&vendor.business_name)
        .bind(&vendor.services)
        .bind(&vendor.keywords)
        .bind(&vendor.contact)
        .bind(vendor.bot_handle.as_deref())
        .bind(&vendor.description)
        .bind(&vendor.price_range)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                RepositoryError::DuplicateVendor { owner: vendor.owner }
            } else {
                RepositoryError::Database(error)
            }
        })?;

        let id = VendorId(result.last_insert_rowid());
        debug!(event_name = "db.vendor.inserted", vendor_id = id.0, owner = vendor.owner.0);
        Ok(id)
    }

    async fn list_vendors(&self) -> Result<Vec<Vendor>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {VENDOR_COLUMNS} FROM vendors ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(vendor_from_row).collect()
    }

    async fn find_vendor(&self, id: VendorId) -> Result<Option<Vendor>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {VENDOR_COLUMNS} FROM vendors WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|value| vendor_from_row(&value)).transpose()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<OrderId, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO orders (vendor_id, buyer_user_id, details, deadline, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.vendor_id.0)
        .bind(order.buyer_id.0)
        .bind(&order.details)
        .bind(&order.deadline)
        .bind(OrderStatus::Pending.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(OrderId(result.last_insert_rowid()))
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|value| order_from_row(&value)).transpose()
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET status = ?, completed_at = COALESCE(?, completed_at) WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(completed_at.map(|value| value.to_rfc3339()))
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: Entity::Order, id: id.0 });
        }
        Ok(())
    }

    async fn insert_rating(&self, rating: NewRating) -> Result<RatingId, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO ratings (order_id, vendor_id, buyer_user_id, stars, review, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(rating.order_id.0)
        .bind(rating.vendor_id.0)
        .bind(rating.buyer_id.0)
        .bind(i64::from(rating.stars.get()))
        .bind(rating.review.as_deref())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                RepositoryError::DuplicateRating { order_id: rating.order_id }
            } else {
                RepositoryError::Database(error)
            }
        })?;

        Ok(RatingId(result.last_insert_rowid()))
    }

    async fn recompute_vendor_aggregate(
        &self,
        vendor_id: VendorId,
    ) -> Result<VendorAggregate, RepositoryError> {
        let raw_stars: Vec<i64> =
            sqlx::query_scalar("SELECT stars FROM ratings WHERE vendor_id = ?")
                .bind(vendor_id.0)
                .fetch_all(&self.pool)
                .await?;

        let stars = raw_stars
            .into_iter()
            .map(|value| {
                Stars::try_from(value)
                    .map_err(|error| RepositoryError::Decode(format!("rating stars: {error}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let aggregate = VendorAggregate::from_stars(stars);

        let result = sqlx::query("UPDATE vendors SET avg_rating = ?, total_orders = ? WHERE id = ?")
            .bind(aggregate.avg_rating)
            .bind(aggregate.total_orders)
            .bind(vendor_id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound { entity: Entity::Vendor, id: vendor_id.0 });
        }
        Ok(aggregate)
    }

    async fn list_orders_for_vendor(
        &self,
        vendor_id: VendorId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE vendor_id = ? ORDER BY id DESC LIMIT ?"
        ))
        .bind(vendor_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn list_ratings_for_vendor(
        &self,
        vendor_id: VendorId,
        limit: u32,
    ) -> Result<Vec<Rating>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RATING_COLUMNS} FROM ratings WHERE vendor_id = ? ORDER BY id DESC LIMIT ?"
        ))
        .bind(vendor_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(rating_from_row).collect()
    }

    async fn find_rating_by_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<Rating>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {RATING_COLUMNS} FROM ratings WHERE order_id = ?"))
            .bind(order_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|value| rating_from_row(&value)).transpose()
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_error) if db_error.is_unique_violation())
}

fn vendor_from_row(row: &SqliteRow) -> Result<Vendor, RepositoryError> {
    Ok(Vendor {
        id: VendorId(row.try_get("id")?),
        owner: UserId(row.try_get("owner_user_id")?),
        business_name: row.try_get("business_name")?,
        services: row.try_get("services")?,
        keywords: row.try_get("keywords")?,
        contact: row.try_get("contact")?,
        bot_handle: row.try_get("bot_handle")?,
        description: row.try_get("description")?,
        price_range: row.try_get("price_range")?,
        avg_rating: row.try_get("avg_rating")?,
        total_orders: row.try_get("total_orders")?,
        created_at: parse_rfc3339("vendor created_at", &row.try_get::<String, _>("created_at")?)?,
    })
}

fn order_from_row(row: &SqliteRow) -> Result<Order, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = status_raw
        .parse::<OrderStatus>()
        .map_err(|_| RepositoryError::Decode(format!("invalid order status: {status_raw}")))?;

    let completed_at = row
        .try_get::<Option<String>, _>("completed_at")?
        .as_deref()
        .map(|ts| parse_rfc3339("order completed_at", ts))
        .transpose()?;

    Ok(Order {
        id: OrderId(row.try_get("id")?),
        vendor_id: VendorId(row.try_get("vendor_id")?),
        buyer_id: UserId(row.try_get("buyer_user_id")?),
        details: row.try_get("details")?,
        deadline: row.try_get("deadline")?,
        status,
        created_at: parse_rfc3339("order created_at", &row.try_get::<String, _>("created_at")?)?,
        completed_at,
    })
}

fn rating_from_row(row: &SqliteRow) -> Result<Rating, RepositoryError> {
    let stars_raw: i64 = row.try_get("stars")?;
    let stars = Stars::try_from(stars_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid rating stars: {error}")))?;

    Ok(Rating {
        id: RatingId(row.try_get("id")?),
        order_id: OrderId(row.try_get("order_id")?),
        vendor_id: VendorId(row.try_get("vendor_id")?),
        buyer_id: UserId(row.try_get("buyer_user_id")?),
        stars,
        review: row.try_get("review")?,
        created_at: parse_rfc3339("rating created_at", &row.try_get::<String, _>("created_at")?)?,
    })
}

fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc)).map_err(|err| {
        RepositoryError::Decode(format!("invalid {} timestamp '{}': {}", field, value, err))
    })
}
