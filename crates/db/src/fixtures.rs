use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Row counts the demo dataset is expected to produce, per table.
const SEED_COUNTS: &[(&str, &str, i64)] = &[
    ("products", "product", 15),
    ("purchases", "purchase", 40),
    ("purchase-items", "purchase_item", 158),
    ("stock-movements", "stock_movement", 54),
    ("stock-lots", "stock_lot", 8),
];

const SEED_PRODUCT_ID_MAX: i64 = 15;
const SEED_PURCHASE_ID_MAX: i64 = 40;
const SEED_ITEM_ID_MAX: i64 = 158;
const SEED_MOVEMENT_ID_MAX: i64 = 54;
const SEED_LOT_ID_MAX: i64 = 8;

/// Demo grocery dataset used by the CLI `seed` command and end-to-end tests.
///
/// Every row has a fixed id, so loading twice is a no-op.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            products: expected_count("products"),
            purchases: expected_count("purchases"),
            items: expected_count("purchase-items"),
            movements: expected_count("stock-movements"),
            lots: expected_count("stock-lots"),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for (label, table, expected) in SEED_COUNTS {
            let count: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(1) FROM {table} WHERE id BETWEEN 1 AND ?1"
            ))
            .bind(id_ceiling(table))
            .fetch_one(pool)
            .await?;
            checks.push((*label, count == *expected));
        }

        let anchor: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM product WHERE id = 1 AND name = 'Pipoca Yoki')",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("anchor-product", anchor == 1));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded rows, leaving anything with ids outside the dataset in place.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        for table in ["purchase_item", "purchase", "stock_lot", "stock_movement", "product"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE id BETWEEN 1 AND ?1"))
                .bind(id_ceiling(table))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn id_ceiling(table: &str) -> i64 {
    match table {
        "product" => SEED_PRODUCT_ID_MAX,
        "purchase" => SEED_PURCHASE_ID_MAX,
        "purchase_item" => SEED_ITEM_ID_MAX,
        "stock_movement" => SEED_MOVEMENT_ID_MAX,
        _ => SEED_LOT_ID_MAX,
    }
}

fn expected_count(label: &str) -> i64 {
    SEED_COUNTS
        .iter()
        .find(|(candidate, _, _)| *candidate == label)
        .map(|(_, _, count)| *count)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedResult {
    pub products: i64,
    pub purchases: i64,
    pub items: i64,
    pub movements: i64,
    pub lots: i64,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[test]
    fn sql_fixture_is_valid() {
        assert!(DemoSeedDataset::SQL.contains("INSERT OR REPLACE INTO product"));
    }

    #[tokio::test]
    async fn load_is_idempotent_and_verifies() {
        let pool = migrated_pool().await;

        let first = DemoSeedDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(first_verification.all_present, "{:?}", first_verification.checks);
        assert_eq!(first.items, 158);

        let second = DemoSeedDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification = DemoSeedDataset::verify(&pool).await.expect("re-verify");
        assert!(second_verification.all_present);
        assert_eq!(first, second);
        assert_eq!(first_verification.checks, second_verification.checks);
    }

    #[tokio::test]
    async fn verify_reports_missing_rows() {
        let pool = migrated_pool().await;

        let empty = DemoSeedDataset::verify(&pool).await.expect("verify empty");
        assert!(!empty.all_present);

        DemoSeedDataset::load(&pool).await.expect("load");
        DemoSeedDataset::clean(&pool).await.expect("clean");

        let cleaned = DemoSeedDataset::verify(&pool).await.expect("verify cleaned");
        assert!(cleaned.checks.iter().all(|(_, ok)| !ok));
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM purchase_item")
            .fetch_one(&pool)
            .await
            .expect("count items");
        assert_eq!(remaining, 0);
    }
}
