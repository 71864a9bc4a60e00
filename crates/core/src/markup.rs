use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::product::ProductId;
use crate::errors::ApplicationError;
use crate::stock::{latest_unit_cost, StockAnalyzer};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkupFigures {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    pub markup_value: Decimal,
    pub margin_value: Decimal,
}

/// Markup over cost, in percent. `None` when the cost is not positive.
pub fn markup_percent(unit_price: Decimal, unit_cost: Decimal) -> Option<Decimal> {
    if unit_cost <= Decimal::ZERO {
        return None;
    }
    Some((unit_price - unit_cost) / unit_cost * Decimal::ONE_HUNDRED)
}

/// Margin over price implied by a markup, in percent.
pub fn margin_from_markup(markup: Decimal) -> Option<Decimal> {
    let base = Decimal::ONE_HUNDRED + markup;
    if base.is_zero() {
        return None;
    }
    Some(markup / base * Decimal::ONE_HUNDRED)
}

fn round_percent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn figures(product_id: Option<ProductId>, markup: Decimal) -> Option<MarkupFigures> {
    let margin = margin_from_markup(markup)?;
    Some(MarkupFigures {
        product_id,
        markup_value: round_percent(markup),
        margin_value: round_percent(margin),
    })
}

impl StockAnalyzer {
    /// Markup of the product's list price over its latest unit cost.
    pub async fn product_markup(
        &self,
        product_id: ProductId,
        today: NaiveDate,
    ) -> Result<Option<MarkupFigures>, ApplicationError> {
        let product = self.require_product(product_id).await?;
        let movements = self.stock_source().movements_for_product(product_id, today).await?;
        let markup = latest_unit_cost(&movements)
            .and_then(|cost| markup_percent(product.unit_price, cost))
            .and_then(|markup| figures(Some(product_id), markup));

        info!(
            event_name = "markup.product.computed",
            product_id = product_id.0,
            has_cost = markup.is_some(),
            "product markup computed"
        );
        Ok(markup)
    }

    /// Average markup across stocked products that have a known cost.
    pub async fn general_markup(
        &self,
        today: NaiveDate,
    ) -> Result<Option<MarkupFigures>, ApplicationError> {
        let products = self.stock_source().products_with_stock().await?;
        let mut markups = Vec::with_capacity(products.len());

        for product_id in products {
            let Some(product) = self.find_product(product_id).await? else {
                continue;
            };
            let movements = self.stock_source().movements_for_product(product_id, today).await?;
            if let Some(markup) =
                latest_unit_cost(&movements).and_then(|cost| markup_percent(product.unit_price, cost))
            {
                markups.push(markup);
            }
        }

        let general = match markups.len() {
            0 => None,
            count => {
                let average = markups.iter().copied().sum::<Decimal>() / Decimal::from(count);
                figures(None, average)
            }
        };

        info!(
            event_name = "markup.general.computed",
            products = markups.len(),
            "general markup computed"
        );
        Ok(general)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{margin_from_markup, markup_percent, MarkupFigures};
    use crate::analysis::testing::FixtureLedger;
    use crate::domain::product::ProductId;
    use crate::stock::testing::FixtureWarehouse;
    use crate::stock::StockAnalyzer;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 10, 10).expect("date")
    }

    #[test]
    fn markup_and_margin_follow_price_over_cost() {
        let markup = markup_percent(Decimal::new(499, 2), Decimal::new(250, 2)).expect("markup");
        assert_eq!(markup, Decimal::new(996, 1));

        let margin = margin_from_markup(Decimal::ONE_HUNDRED).expect("margin");
        assert_eq!(margin, Decimal::from(50));
    }

    #[test]
    fn zero_cost_has_no_markup() {
        assert!(markup_percent(Decimal::new(499, 2), Decimal::ZERO).is_none());
        assert!(margin_from_markup(Decimal::from(-100)).is_none());
    }

    #[tokio::test]
    async fn product_markup_uses_latest_cost() {
        // fixture products are priced at 4.99
        let warehouse = FixtureWarehouse::default()
            .movement(1, "2023-09-01", 10, 0, 100)
            .movement(1, "2023-10-01", 10, 0, 300);
        let analyzer = StockAnalyzer::new(
            Arc::new(FixtureLedger::with_products(&[(1, "Pipoca Yoki")])),
            Arc::new(warehouse),
        );

        let figures = analyzer.product_markup(ProductId(1), today()).await.expect("markup");

        assert_eq!(
            figures,
            Some(MarkupFigures {
                product_id: Some(ProductId(1)),
                markup_value: Decimal::new(6633, 2),
                margin_value: Decimal::new(3988, 2),
            })
        );
    }

    #[tokio::test]
    async fn product_without_cost_data_has_no_markup() {
        let analyzer = StockAnalyzer::new(
            Arc::new(FixtureLedger::with_products(&[(1, "Pipoca Yoki")])),
            Arc::new(FixtureWarehouse::default()),
        );

        let figures = analyzer.product_markup(ProductId(1), today()).await.expect("markup");

        assert!(figures.is_none());
    }

    #[tokio::test]
    async fn general_markup_averages_known_costs() {
        let warehouse = FixtureWarehouse::default()
            .movement(1, "2023-09-01", 10, 0, 250)
            .movement(2, "2023-09-01", 10, 0, 499)
            .movement(3, "2023-09-01", 10, 0, 0);
        let analyzer = StockAnalyzer::new(
            Arc::new(FixtureLedger::with_products(&[(1, "A"), (2, "B"), (3, "C")])),
            Arc::new(warehouse),
        );

        let figures = analyzer.general_markup(today()).await.expect("markup").expect("figures");

        assert_eq!(figures.product_id, None);
        assert_eq!(figures.markup_value, Decimal::new(4980, 2));
    }
}
