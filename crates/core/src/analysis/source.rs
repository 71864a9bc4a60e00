use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::product::{Product, ProductId};
use crate::domain::purchase::{Purchase, PurchaseId, PurchaseItem};
use crate::domain::stock::{StockLot, StockMovement};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DataSourceError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    #[error("data source returned undecodable data: {0}")]
    Decode(String),
}

/// Read-only access to the sales ledger.
///
/// Date bounds are inclusive on both ends.
#[async_trait]
pub trait SalesDataSource: Send + Sync {
    async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, DataSourceError>;

    /// Case-insensitive partial name match. When several products match, the lowest id wins.
    async fn product_by_name(&self, query: &str) -> Result<Option<Product>, DataSourceError>;

    async fn purchases_in_window(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Purchase>, DataSourceError>;

    async fn items_for_purchases(
        &self,
        purchase_ids: &[PurchaseId],
    ) -> Result<Vec<PurchaseItem>, DataSourceError>;
}

#[async_trait]
pub trait StockDataSource: Send + Sync {
    /// Movements dated on or before `until`, oldest first.
    async fn movements_for_product(
        &self,
        product_id: ProductId,
        until: NaiveDate,
    ) -> Result<Vec<StockMovement>, DataSourceError>;

    async fn lots_for_product(&self, product_id: ProductId)
        -> Result<Vec<StockLot>, DataSourceError>;

    /// Ids of every product with at least one recorded movement.
    async fn products_with_stock(&self) -> Result<Vec<ProductId>, DataSourceError>;
}
