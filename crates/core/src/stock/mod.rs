//! Stock balance history, lot classification and inventory valuation.

pub mod classification;
pub mod history;

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::source::{SalesDataSource, StockDataSource};
use crate::config::StockConfig;
use crate::domain::product::{Product, ProductId};
use crate::domain::stock::StockMovement;
use crate::errors::ApplicationError;

pub use classification::{LotStatus, StockCategory, StockClassification};
pub use history::{StockHistory, StockPoint};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockSettings {
    pub coverage_lookback_days: u32,
    pub critical_coverage_days: u32,
    pub over_coverage_days: u32,
    pub expiry_warning_days: u32,
}

impl Default for StockSettings {
    fn default() -> Self {
        Self {
            coverage_lookback_days: 30,
            critical_coverage_days: 15,
            over_coverage_days: 30,
            expiry_warning_days: 90,
        }
    }
}

impl From<&StockConfig> for StockSettings {
    fn from(config: &StockConfig) -> Self {
        Self {
            coverage_lookback_days: config.coverage_lookback_days,
            critical_coverage_days: config.critical_coverage_days,
            over_coverage_days: config.over_coverage_days,
            expiry_warning_days: config.expiry_warning_days,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTotal {
    pub quantity: i64,
    pub value: Decimal,
}

/// Stock queries over a [`StockDataSource`]. Product names and prices come from the sales ledger.
#[derive(Clone)]
pub struct StockAnalyzer {
    sales: Arc<dyn SalesDataSource>,
    stock: Arc<dyn StockDataSource>,
    settings: StockSettings,
}

impl StockAnalyzer {
    pub fn new(sales: Arc<dyn SalesDataSource>, stock: Arc<dyn StockDataSource>) -> Self {
        Self::with_settings(sales, stock, StockSettings::default())
    }

    pub fn with_settings(
        sales: Arc<dyn SalesDataSource>,
        stock: Arc<dyn StockDataSource>,
        settings: StockSettings,
    ) -> Self {
        Self { sales, stock, settings }
    }

    pub fn settings(&self) -> &StockSettings {
        &self.settings
    }

    /// Current balance of every stocked product valued at its latest unit cost.
    pub async fn stock_total(&self, today: NaiveDate) -> Result<StockTotal, ApplicationError> {
        let mut total = StockTotal { quantity: 0, value: Decimal::ZERO };
        let products = self.stock.products_with_stock().await?;

        for product_id in &products {
            let movements = self.stock.movements_for_product(*product_id, today).await?;
            let balance = balance_of(&movements);
            total.quantity += balance;
            if let Some(cost) = latest_unit_cost(&movements) {
                total.value += Decimal::from(balance) * cost;
            }
        }

        info!(
            event_name = "stock.total.computed",
            products = products.len(),
            quantity = total.quantity,
            value = %total.value,
            "stock total computed"
        );
        Ok(total)
    }

    pub(crate) async fn find_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<Product>, ApplicationError> {
        Ok(self.sales.product_by_id(product_id).await?)
    }

    pub(crate) async fn require_product(
        &self,
        product_id: ProductId,
    ) -> Result<Product, ApplicationError> {
        self.find_product(product_id)
            .await?
            .ok_or_else(|| ApplicationError::ProductNotFound(format!("product id {product_id}")))
    }

    pub(crate) fn stock_source(&self) -> &dyn StockDataSource {
        self.stock.as_ref()
    }
}

/// Net units across `movements`.
pub fn balance_of(movements: &[StockMovement]) -> i64 {
    movements.iter().map(StockMovement::net).sum()
}

/// Unit cost of the most recent movement. Movements are expected oldest first.
pub fn latest_unit_cost(movements: &[StockMovement]) -> Option<Decimal> {
    movements.last().map(|movement| movement.unit_cost)
}
