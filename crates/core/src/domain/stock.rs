use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;

/// One day's inbound/outbound movement for a product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub product_id: ProductId,
    pub date: NaiveDate,
    pub entries: i64,
    pub outputs: i64,
    pub unit_cost: Decimal,
}

impl StockMovement {
    pub fn net(&self) -> i64 {
        self.entries - self.outputs
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLot {
    pub id: i64,
    pub product_id: ProductId,
    pub quantity: i64,
    pub expires_on: Option<NaiveDate>,
}
