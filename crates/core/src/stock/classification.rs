use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{balance_of, StockAnalyzer, StockSettings};
use crate::analysis::percent_of;
use crate::domain::product::ProductId;
use crate::domain::stock::{StockLot, StockMovement};
use crate::errors::ApplicationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    Expired,
    CriticalAge,
    StockOver,
    Ok,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCategory {
    pub units: i64,
    pub percentage: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockClassification {
    /// `None` when the classification spans every stocked product.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    pub stock_over: StockCategory,
    pub critical_age: StockCategory,
    pub expired: StockCategory,
    pub ok: StockCategory,
    pub total: i64,
}

impl StockClassification {
    fn add(&mut self, status: LotStatus, units: i64) {
        let category = match status {
            LotStatus::Expired => &mut self.expired,
            LotStatus::CriticalAge => &mut self.critical_age,
            LotStatus::StockOver => &mut self.stock_over,
            LotStatus::Ok => &mut self.ok,
        };
        category.units += units;
        self.total += units;
    }

    fn merge(&mut self, other: &Self) {
        for (status, category) in [
            (LotStatus::Expired, other.expired),
            (LotStatus::CriticalAge, other.critical_age),
            (LotStatus::StockOver, other.stock_over),
            (LotStatus::Ok, other.ok),
        ] {
            self.add(status, category.units);
        }
    }

    fn finish(mut self) -> Self {
        let total = u64::try_from(self.total).unwrap_or(0);
        for category in
            [&mut self.stock_over, &mut self.critical_age, &mut self.expired, &mut self.ok]
        {
            category.percentage = match total {
                0 => 0,
                total => percent_of(u64::try_from(category.units).unwrap_or(0), total),
            };
        }
        self
    }

    /// Units that need attention: expired or close to it.
    pub fn at_risk_units(&self) -> i64 {
        self.expired.units + self.critical_age.units
    }
}

/// Days of stock left at the recent output rate. `None` means nothing left the shelf during the
/// lookback, so coverage is unbounded.
pub fn coverage_days(
    on_hand: i64,
    movements: &[StockMovement],
    today: NaiveDate,
    lookback_days: u32,
) -> Option<Decimal> {
    let since = today
        .checked_sub_days(Days::new(u64::from(lookback_days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN);
    let outputs = movements
        .iter()
        .filter(|movement| since <= movement.date && movement.date <= today)
        .map(|movement| movement.outputs)
        .sum::<i64>();
    if outputs <= 0 {
        return None;
    }

    Some(Decimal::from(on_hand.max(0)) * Decimal::from(lookback_days) / Decimal::from(outputs))
}

/// First matching rule wins: expired, critical age, stock over, ok.
pub fn classify_lot(
    lot: &StockLot,
    coverage: Option<Decimal>,
    today: NaiveDate,
    settings: &StockSettings,
) -> LotStatus {
    if let Some(expires_on) = lot.expires_on {
        if expires_on < today {
            return LotStatus::Expired;
        }
    }

    let warning_horizon = today
        .checked_add_days(Days::new(u64::from(settings.expiry_warning_days)))
        .unwrap_or(NaiveDate::MAX);
    let expiring_soon = lot.expires_on.map(|expires_on| expires_on <= warning_horizon).unwrap_or(false);
    let low_coverage = coverage
        .map(|days| days < Decimal::from(settings.critical_coverage_days))
        .unwrap_or(false);
    if low_coverage || expiring_soon {
        return LotStatus::CriticalAge;
    }

    let over_covered =
        coverage.map(|days| days > Decimal::from(settings.over_coverage_days)).unwrap_or(true);
    if over_covered {
        return LotStatus::StockOver;
    }

    LotStatus::Ok
}

impl StockAnalyzer {
    /// Splits a product's on-hand units into expired, critical age, stock over and ok.
    ///
    /// A product without recorded lots is treated as one undated lot holding its balance.
    pub async fn classify_stock(
        &self,
        product_id: ProductId,
        today: NaiveDate,
    ) -> Result<StockClassification, ApplicationError> {
        self.require_product(product_id).await?;
        let classification = self.classify_units(product_id, today).await?.finish();

        info!(
            event_name = "stock.classification.computed",
            product_id = product_id.0,
            total = classification.total,
            expired = classification.expired.units,
            critical_age = classification.critical_age.units,
            stock_over = classification.stock_over.units,
            "stock classified"
        );
        Ok(StockClassification { product_id: Some(product_id), ..classification })
    }

    /// Classification summed across every stocked product.
    pub async fn classify_all(
        &self,
        today: NaiveDate,
    ) -> Result<StockClassification, ApplicationError> {
        let products = self.stock_source().products_with_stock().await?;
        let mut combined = StockClassification::default();
        for product_id in &products {
            combined.merge(&self.classify_units(*product_id, today).await?);
        }
        let combined = combined.finish();

        info!(
            event_name = "stock.classification.computed",
            products = products.len(),
            total = combined.total,
            "stock classified for all products"
        );
        Ok(combined)
    }

    async fn classify_units(
        &self,
        product_id: ProductId,
        today: NaiveDate,
    ) -> Result<StockClassification, ApplicationError> {
        let source = self.stock_source();
        let movements = source.movements_for_product(product_id, today).await?;
        let mut lots = source.lots_for_product(product_id).await?;
        let on_hand = balance_of(&movements);
        if lots.is_empty() && on_hand > 0 {
            lots.push(StockLot { id: 0, product_id, quantity: on_hand, expires_on: None });
        }

        let coverage =
            coverage_days(on_hand, &movements, today, self.settings().coverage_lookback_days);
        let mut classification = StockClassification::default();
        for lot in lots.iter().filter(|lot| lot.quantity > 0) {
            let status = classify_lot(lot, coverage, today, self.settings());
            classification.add(status, lot.quantity);
        }

        debug!(
            event_name = "stock.classification.lots",
            product_id = product_id.0,
            lots = lots.len(),
            on_hand,
            coverage = ?coverage,
            "lots classified"
        );
        Ok(classification)
    }
}
