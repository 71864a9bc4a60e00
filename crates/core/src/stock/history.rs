use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::StockAnalyzer;
use crate::domain::product::ProductId;
use crate::domain::stock::StockMovement;
use crate::domain::window::DateWindow;
use crate::errors::ApplicationError;

/// Balance at the end of one day with movements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockPoint {
    pub date: NaiveDate,
    pub quantity: i64,
    pub entries: i64,
    pub outputs: i64,
    pub value: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockHistory {
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub start_date: String,
    pub end_date: String,
    pub initial_stock: i64,
    pub history: Vec<StockPoint>,
}

/// Opening balance before `window` plus one point per day with movements inside it.
///
/// Several movements on one day collapse into a single point valued at the cost of the
/// last of them.
pub fn build_history(movements: &[StockMovement], window: DateWindow) -> (i64, Vec<StockPoint>) {
    let mut ordered = movements.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|movement| movement.date);

    let initial_stock = ordered
        .iter()
        .filter(|movement| movement.date < window.start())
        .map(|movement| movement.net())
        .sum::<i64>();

    let mut balance = initial_stock;
    let mut points: Vec<StockPoint> = Vec::new();
    for movement in ordered.into_iter().filter(|movement| window.contains(movement.date)) {
        balance += movement.net();
        let value = Decimal::from(balance) * movement.unit_cost;
        match points.last_mut() {
            Some(point) if point.date == movement.date => {
                point.quantity = balance;
                point.entries += movement.entries;
                point.outputs += movement.outputs;
                point.value = value;
            }
            _ => points.push(StockPoint {
                date: movement.date,
                quantity: balance,
                entries: movement.entries,
                outputs: movement.outputs,
                value,
            }),
        }
    }

    (initial_stock, points)
}

impl StockAnalyzer {
    pub async fn stock_history(
        &self,
        product_id: ProductId,
        window: DateWindow,
    ) -> Result<StockHistory, ApplicationError> {
        let product = self.require_product(product_id).await?;
        let movements = self.stock_source().movements_for_product(product_id, window.end()).await?;
        let (initial_stock, history) = build_history(&movements, window);

        info!(
            event_name = "stock.history.computed",
            product_id = product_id.0,
            window = %window,
            initial_stock,
            points = history.len(),
            "stock history computed"
        );

        Ok(StockHistory {
            product_id,
            product_name: product.name,
            sku: product_id.to_string(),
            start_date: window.start_iso(),
            end_date: window.end_iso(),
            initial_stock,
            history,
        })
    }
}
