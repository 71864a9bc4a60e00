use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;

use synergy_core::analysis::source::{DataSourceError, StockDataSource};
use synergy_core::domain::product::ProductId;
use synergy_core::domain::stock::{StockLot, StockMovement};
use synergy_core::domain::window::format_iso;

use super::{decode_date, decode_decimal, RepositoryError};
use crate::DbPool;

pub struct SqlStockRepository {
    pool: DbPool,
}

impl SqlStockRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_movements(
        &self,
        product_id: ProductId,
        until: NaiveDate,
    ) -> Result<Vec<StockMovement>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT product_id, moved_on, entries, outputs, unit_cost FROM stock_movement
             WHERE product_id = ?1 AND substr(moved_on, 1, 10) <= ?2
             ORDER BY substr(moved_on, 1, 10), id",
        )
        .bind(product_id.0)
        .bind(format_iso(until))
        .fetch_all(&self.pool)
        .await?;

        let mut movements = Vec::with_capacity(rows.len());
        for row in rows {
            let moved_on: String = row.try_get("moved_on")?;
            let unit_cost: String = row.try_get("unit_cost")?;
            movements.push(StockMovement {
                product_id: ProductId(row.try_get("product_id")?),
                date: decode_date("stock_movement.moved_on", &moved_on)?,
                entries: row.try_get("entries")?,
                outputs: row.try_get("outputs")?,
                unit_cost: decode_decimal("stock_movement.unit_cost", &unit_cost)?,
            });
        }
        Ok(movements)
    }

    pub async fn list_lots(&self, product_id: ProductId) -> Result<Vec<StockLot>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, product_id, quantity, expires_on FROM stock_lot
             WHERE product_id = ?1
             ORDER BY id",
        )
        .bind(product_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut lots = Vec::with_capacity(rows.len());
        for row in rows {
            let expires_on: Option<String> = row.try_get("expires_on")?;
            lots.push(StockLot {
                id: row.try_get("id")?,
                product_id: ProductId(row.try_get("product_id")?),
                quantity: row.try_get("quantity")?,
                expires_on: expires_on
                    .as_deref()
                    .map(|raw| decode_date("stock_lot.expires_on", raw))
                    .transpose()?,
            });
        }
        Ok(lots)
    }

    pub async fn list_stocked_products(&self) -> Result<Vec<ProductId>, RepositoryError> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT DISTINCT product_id FROM stock_movement ORDER BY product_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().map(ProductId).collect())
    }
}

#[async_trait]
impl StockDataSource for SqlStockRepository {
    async fn movements_for_product(
        &self,
        product_id: ProductId,
        until: NaiveDate,
    ) -> Result<Vec<StockMovement>, DataSourceError> {
        Ok(self.list_movements(product_id, until).await?)
    }

    async fn lots_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockLot>, DataSourceError> {
        Ok(self.list_lots(product_id).await?)
    }

    async fn products_with_stock(&self) -> Result<Vec<ProductId>, DataSourceError> {
        Ok(self.list_stocked_products().await?)
    }
}
