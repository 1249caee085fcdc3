use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Number of forward migrations shipped with this build.
pub fn known_count() -> usize {
    MIGRATOR.iter().filter(|migration| migration.migration_type.is_up_migration()).count()
}

/// Successfully applied migrations; errors if the database was never migrated.
pub async fn applied_count(pool: &DbPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{applied_count, known_count, run_pending};
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "vendors",
        "orders",
        "ratings",
        "idx_orders_vendor_id",
        "idx_orders_buyer_user_id",
        "idx_ratings_vendor_id",
    ];

    async fn table_count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
        sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(pool)
        .await
        .expect("check table")
        .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_marketplace_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        assert_eq!(table_count(&pool, "vendors").await, 1);
        assert_eq!(table_count(&pool, "orders").await, 1);
        assert_eq!(table_count(&pool, "ratings").await, 1);
    }

    #[tokio::test]
    async fn stars_outside_range_are_rejected_by_schema() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        sqlx::query(
            "INSERT INTO vendors (owner_user_id, business_name, services, contact, created_at)
             VALUES (1, 'Spot', 'rice', '080', '2026-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await
        .expect("insert vendor");
        sqlx::query(
            "INSERT INTO orders (vendor_id, buyer_user_id, details, deadline, created_at)
             VALUES (1, 2, 'rice', 'today', '2026-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await
        .expect("insert order");

        let result = sqlx::query(
            "INSERT INTO ratings (order_id, vendor_id, buyer_user_id, stars, created_at)
             VALUES (1, 1, 2, 6, '2026-01-01T00:00:00+00:00')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err(), "six stars must violate the check constraint");
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    #[tokio::test]
    async fn applied_count_tracks_migration_runs() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        assert!(applied_count(&pool).await.is_err(), "no bookkeeping table before migrating");

        run_pending(&pool).await.expect("run migrations");
        let applied = applied_count(&pool).await.expect("count applied");
        assert_eq!(usize::try_from(applied).ok(), Some(known_count()));
        assert_eq!(known_count(), 1);
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let mut signature: Vec<(String, String, String)> = sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects")
        .into_iter()
        .filter_map(|row| {
            let name = row.get::<String, _>("name");
            if MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()) {
                Some((row.get::<String, _>("type"), name, row.get::<String, _>("sql")))
            } else {
                None
            }
        })
        .collect();
        signature.sort();
        signature
    }
}
