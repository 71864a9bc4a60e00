use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use synergy_core::analysis::source::{DataSourceError, SalesDataSource};
use synergy_core::domain::product::{Product, ProductId};
use synergy_core::domain::purchase::{Purchase, PurchaseId, PurchaseItem};
use synergy_core::domain::window::format_iso;

use super::{decode_date, decode_decimal, placeholders, RepositoryError, MAX_BIND_CHUNK};
use crate::DbPool;

pub struct SqlSalesRepository {
    pool: DbPool,
}

impl SqlSalesRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, unit_price FROM product WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    /// Case-insensitive partial match on the name; the lowest id wins.
    ///
    /// SQLite `LIKE` and `lower()` only fold ASCII, so names are folded here instead.
    pub async fn search_product(&self, query: &str) -> Result<Option<Product>, RepositoryError> {
        let needle = query.trim().to_lowercase();
        let rows = sqlx::query("SELECT id, name, unit_price FROM product ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        for row in &rows {
            let name: String = row.try_get("name")?;
            if name.to_lowercase().contains(&needle) {
                return product_from_row(row).map(Some);
            }
        }
        Ok(None)
    }

    pub async fn list_purchases(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Purchase>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, purchased_on, customer_ref FROM purchase
             WHERE substr(purchased_on, 1, 10) BETWEEN ?1 AND ?2
             ORDER BY id",
        )
        .bind(format_iso(start))
        .bind(format_iso(end))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<Purchase, RepositoryError> {
                let purchased_on: String = row.try_get("purchased_on")?;
                Ok(Purchase {
                    id: PurchaseId(row.try_get("id")?),
                    date: decode_date("purchase.purchased_on", &purchased_on)?,
                    customer_ref: row.try_get("customer_ref")?,
                })
            })
            .collect()
    }

    pub async fn list_items(
        &self,
        purchase_ids: &[PurchaseId],
    ) -> Result<Vec<PurchaseItem>, RepositoryError> {
        let mut items = Vec::new();
        for chunk in purchase_ids.chunks(MAX_BIND_CHUNK) {
            let sql = format!(
                "SELECT id, purchase_id, product_id, unit_value, flyer_flag FROM purchase_item
                 WHERE purchase_id IN ({})
                 ORDER BY purchase_id, id",
                placeholders(chunk.len())
            );
            let mut query = sqlx::query(&sql);
            for purchase_id in chunk {
                query = query.bind(purchase_id.0);
            }

            for row in query.fetch_all(&self.pool).await? {
                let unit_value: String = row.try_get("unit_value")?;
                items.push(PurchaseItem {
                    id: row.try_get("id")?,
                    purchase_id: PurchaseId(row.try_get("purchase_id")?),
                    product_id: ProductId(row.try_get("product_id")?),
                    unit_value: decode_decimal("purchase_item.unit_value", &unit_value)?,
                    flyer_flag: row.try_get("flyer_flag")?,
                });
            }
        }
        Ok(items)
    }
}

fn product_from_row(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let unit_price: String = row.try_get("unit_price")?;
    Ok(Product {
        id: ProductId(row.try_get("id")?),
        name: row.try_get("name")?,
        unit_price: decode_decimal("product.unit_price", &unit_price)?,
    })
}

#[async_trait]
impl SalesDataSource for SqlSalesRepository {
    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, DataSourceError> {
        Ok(self.find_product(id).await?)
    }

    async fn product_by_name(&self, query: &str) -> Result<Option<Product>, DataSourceError> {
        Ok(self.search_product(query).await?)
    }

    async fn purchases_in_window(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Purchase>, DataSourceError> {
        Ok(self.list_purchases(start, end).await?)
    }

    async fn items_for_purchases(
        &self,
        purchase_ids: &[PurchaseId],
    ) -> Result<Vec<PurchaseItem>, DataSourceError> {
        Ok(self.list_items(purchase_ids).await?)
    }
}
