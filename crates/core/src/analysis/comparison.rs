use serde::{Deserialize, Serialize};
use tracing::info;

use super::cross_sell::RelatedProductStat;
use super::{percent_of, AnalysisMode, SalesAnalyzer};
use crate::domain::product::ProductId;
use crate::domain::window::DateWindow;
use crate::errors::{ApplicationError, DomainError};

/// Magnitude of a change between two sales counts. The direction lives in `is_increase` only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesDelta {
    pub percentage: u64,
    pub absolute_value: u64,
    pub is_increase: bool,
}

impl SalesDelta {
    /// Change from `reference` to `current`.
    ///
    /// A zero reference reports 100% when anything sold and 0% otherwise. A zero change counts
    /// as an increase. The percentage is the rounded size of the change, so a 12.5% drop reads
    /// as 13, the same as a 12.5% rise.
    pub fn between(reference: u64, current: u64) -> Self {
        let absolute_value = current.abs_diff(reference);
        let percentage = match (reference, current) {
            (0, 0) => 0,
            (0, _) => 100,
            (reference, _) => percent_of(absolute_value, reference),
        };
        Self { percentage, absolute_value, is_increase: current >= reference }
    }

    /// Plain volume for a single window with nothing to compare against.
    pub fn volume(total: u64) -> Self {
        Self { percentage: 0, absolute_value: total, is_increase: true }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesAnalysisResult {
    pub product_id: ProductId,
    pub product_name: String,
    /// Items sold in the reference period (or by the reference product).
    #[serde(rename = "startDateSales")]
    pub reference_count: u64,
    /// Items sold in the current period.
    #[serde(rename = "endDateSales")]
    pub current_count: u64,
    pub sales_difference: SalesDelta,
    pub related_products: Vec<RelatedProductStat>,
    pub show_comparison: bool,
}

impl SalesAnalyzer {
    /// Sales counts, delta and cross-sell ranking for one product.
    ///
    /// `rival` only applies in [`AnalysisMode::Until`]: the product's sales inside `window` are
    /// then compared against the rival's sales inside the same window.
    pub async fn analyze_sales(
        &self,
        product_id: ProductId,
        window: DateWindow,
        mode: AnalysisMode,
        rival: Option<ProductId>,
    ) -> Result<SalesAnalysisResult, ApplicationError> {
        match mode {
            AnalysisMode::Compare => {
                let reference = window.preceding_from(self.settings.history_start);
                self.compare_periods(product_id, reference, window).await
            }
            AnalysisMode::Until => match rival {
                Some(rival) => self.compare_products(product_id, rival, window).await,
                None => self.window_volume(product_id, window).await,
            },
        }
    }

    /// Reference period against current period. A missing reference period counts as zero sales.
    pub(crate) async fn compare_periods(
        &self,
        product_id: ProductId,
        reference: Option<DateWindow>,
        current: DateWindow,
    ) -> Result<SalesAnalysisResult, ApplicationError> {
        let product_name = self.product_name(product_id).await?;

        let reference_count = match reference {
            Some(reference) => self.load_window(reference).await?.count_for(product_id),
            None => 0,
        };
        let current_sales = self.load_window(current).await?;
        let current_count = current_sales.count_for(product_id);
        let related_products = self.related_from_items(product_id, &current_sales.items).await?;

        info!(
            event_name = "analysis.sales.compare_periods",
            product_id = product_id.0,
            reference = %reference.map(|window| window.to_string()).unwrap_or_else(|| "none".to_string()),
            current = %current,
            reference_count,
            current_count,
            "period comparison computed"
        );

        Ok(SalesAnalysisResult {
            product_id,
            product_name,
            reference_count,
            current_count,
            sales_difference: SalesDelta::between(reference_count, current_count),
            related_products,
            show_comparison: true,
        })
    }

    async fn window_volume(
        &self,
        product_id: ProductId,
        window: DateWindow,
    ) -> Result<SalesAnalysisResult, ApplicationError> {
        let product_name = self.product_name(product_id).await?;
        let sales = self.load_window(window).await?;
        let total = sales.count_for(product_id);
        let related_products = self.related_from_items(product_id, &sales.items).await?;

        info!(
            event_name = "analysis.sales.window_volume",
            product_id = product_id.0,
            window = %window,
            total,
            "window volume computed"
        );

        Ok(SalesAnalysisResult {
            product_id,
            product_name,
            reference_count: 0,
            current_count: total,
            sales_difference: SalesDelta::volume(total),
            related_products,
            show_comparison: false,
        })
    }

    async fn compare_products(
        &self,
        product_id: ProductId,
        rival: ProductId,
        window: DateWindow,
    ) -> Result<SalesAnalysisResult, ApplicationError> {
        if rival == product_id {
            return Err(DomainError::DuplicateProduct(product_id).into());
        }

        let product_name = self.product_name(product_id).await?;
        let sales = self.load_window(window).await?;
        let current_count = sales.count_for(product_id);
        let reference_count = sales.count_for(rival);
        let related_products = self.related_from_items(product_id, &sales.items).await?;

        info!(
            event_name = "analysis.sales.compare_products",
            product_id = product_id.0,
            rival_id = rival.0,
            window = %window,
            reference_count,
            current_count,
            "product comparison computed"
        );

        Ok(SalesAnalysisResult {
            product_id,
            product_name,
            reference_count,
            current_count,
            sales_difference: SalesDelta::between(reference_count, current_count),
            related_products,
            show_comparison: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use crate::analysis::testing::FixtureLedger;
    use crate::analysis::{AnalysisMode, AnalysisSettings, SalesAnalyzer, SalesDelta};
    use crate::domain::product::ProductId;
    use crate::domain::window::DateWindow;
    use crate::errors::{ApplicationError, DomainError};

    fn window(start: &str, end: &str) -> DateWindow {
        DateWindow::parse(start, end).expect("window")
    }

    fn analyzer(ledger: FixtureLedger) -> SalesAnalyzer {
        let settings = AnalysisSettings {
            history_start: NaiveDate::from_ymd_opt(2023, 10, 1).expect("date"),
            ..AnalysisSettings::default()
        };
        SalesAnalyzer::with_settings(Arc::new(ledger), settings)
    }

    #[test]
    fn delta_reports_growth_and_decline() {
        assert_eq!(
            SalesDelta::between(10, 15),
            SalesDelta { percentage: 50, absolute_value: 5, is_increase: true }
        );
        assert_eq!(
            SalesDelta::between(10, 5),
            SalesDelta { percentage: 50, absolute_value: 5, is_increase: false }
        );
        assert_eq!(
            SalesDelta::between(0, 4),
            SalesDelta { percentage: 100, absolute_value: 4, is_increase: true }
        );
    }

    #[test]
    fn delta_properties_hold_for_small_counts() {
        for reference in 0..=12u64 {
            for current in 0..=12u64 {
                let delta = SalesDelta::between(reference, current);
                assert_eq!(delta.absolute_value, current.abs_diff(reference));
                assert_eq!(delta.is_increase, current >= reference);
                if reference == 0 {
                    assert_eq!(delta.percentage == 100, current > 0);
                }
            }
        }
    }

    #[test]
    fn half_percent_changes_round_away_from_zero_in_both_directions() {
        // 1/8 = 12.5%
        assert_eq!(SalesDelta::between(8, 9).percentage, 13);
        assert_eq!(SalesDelta::between(8, 7).percentage, 13);
        assert!(!SalesDelta::between(8, 7).is_increase);
    }

    #[test]
    fn unchanged_sales_count_as_non_decrease() {
        let delta = SalesDelta::between(7, 7);
        assert_eq!(delta, SalesDelta { percentage: 0, absolute_value: 0, is_increase: true });
        assert_eq!(SalesDelta::between(0, 0).percentage, 0);
    }

    #[tokio::test]
    async fn compare_mode_splits_periods_at_the_start_date() {
        let ledger = FixtureLedger::with_products(&[(1, "Pipoca Yoki"), (2, "Guaraná 1L")])
            .purchase(1, "2023-10-01", &[1])
            .purchase(2, "2023-10-04", &[1, 2])
            // the start day itself belongs to the current period
            .purchase(3, "2023-10-05", &[1, 2])
            .purchase(4, "2023-10-07", &[1])
            .purchase(5, "2023-10-09", &[1, 1])
            .purchase(6, "2023-10-11", &[1]);

        let result = analyzer(ledger)
            .analyze_sales(ProductId(1), window("2023-10-05", "2023-10-10"), AnalysisMode::Compare, None)
            .await
            .expect("analysis");

        assert_eq!(result.reference_count, 2);
        assert_eq!(result.current_count, 4, "item rows are counted, not purchases");
        assert_eq!(
            result.sales_difference,
            SalesDelta { percentage: 100, absolute_value: 2, is_increase: true }
        );
        assert!(result.show_comparison);
        assert_eq!(result.related_products.len(), 1);
        assert_eq!(result.related_products[0].product_name, "Guaraná 1L");
        assert_eq!(result.related_products[0].occurrences, 1);
        assert_eq!(result.related_products[0].percentage, 33);
    }

    #[tokio::test]
    async fn compare_mode_at_history_start_has_empty_reference() {
        let ledger = FixtureLedger::with_products(&[(1, "Pipoca Yoki")])
            .purchase(1, "2023-10-01", &[1, 1]);

        let result = analyzer(ledger)
            .analyze_sales(ProductId(1), window("2023-10-01", "2023-10-02"), AnalysisMode::Compare, None)
            .await
            .expect("analysis");

        assert_eq!(result.reference_count, 0);
        assert_eq!(result.current_count, 2);
        assert_eq!(result.sales_difference.percentage, 100);
    }

    #[tokio::test]
    async fn until_mode_counts_a_single_inclusive_window() {
        let ledger = FixtureLedger::with_products(&[(1, "Pipoca Yoki")])
            .purchase(1, "2023-10-02", &[1])
            .purchase(2, "2023-10-03", &[1])
            .purchase(3, "2023-10-03", &[1])
            .purchase(4, "2023-10-04", &[1]);

        let result = analyzer(ledger)
            .analyze_sales(ProductId(1), window("2023-10-03", "2023-10-03"), AnalysisMode::Until, None)
            .await
            .expect("analysis");

        assert_eq!(result.reference_count, 0);
        assert_eq!(result.current_count, 2);
        assert_eq!(result.sales_difference, SalesDelta::volume(2));
        assert!(!result.show_comparison);
    }

    #[tokio::test]
    async fn until_mode_with_rival_compares_products_in_the_same_window() {
        let ledger = FixtureLedger::with_products(&[(1, "Pipoca Yoki"), (3, "Coca-cola 600ml")])
            .purchase(1, "2023-10-02", &[1, 3])
            .purchase(2, "2023-10-03", &[3])
            .purchase(3, "2023-10-03", &[3])
            .purchase(4, "2023-10-04", &[1]);

        let result = analyzer(ledger)
            .analyze_sales(
                ProductId(3),
                window("2023-10-01", "2023-10-05"),
                AnalysisMode::Until,
                Some(ProductId(1)),
            )
            .await
            .expect("analysis");

        assert_eq!(result.reference_count, 2);
        assert_eq!(result.current_count, 3);
        assert_eq!(
            result.sales_difference,
            SalesDelta { percentage: 50, absolute_value: 1, is_increase: true }
        );
        assert!(result.show_comparison);
    }

    #[tokio::test]
    async fn rival_equal_to_product_is_rejected() {
        let ledger = FixtureLedger::with_products(&[(1, "Pipoca Yoki")]);
        let error = analyzer(ledger)
            .analyze_sales(
                ProductId(1),
                window("2023-10-01", "2023-10-05"),
                AnalysisMode::Until,
                Some(ProductId(1)),
            )
            .await
            .expect_err("duplicate rival");

        assert_eq!(error, ApplicationError::Domain(DomainError::DuplicateProduct(ProductId(1))));
    }

    #[tokio::test]
    async fn vanished_product_name_uses_placeholder() {
        let ledger = FixtureLedger::with_products(&[]).purchase(1, "2023-10-02", &[42]);

        let result = analyzer(ledger)
            .analyze_sales(ProductId(42), window("2023-10-01", "2023-10-05"), AnalysisMode::Until, None)
            .await
            .expect("analysis");

        assert_eq!(result.product_name, "Produto Desconhecido");
        assert_eq!(result.current_count, 1);
    }

    #[tokio::test]
    async fn empty_window_yields_zero_counts() {
        let ledger = FixtureLedger::with_products(&[(1, "Pipoca Yoki")]);
        let analyzer = analyzer(ledger);

        let result = analyzer
            .analyze_sales(ProductId(1), window("2023-11-01", "2023-11-30"), AnalysisMode::Compare, None)
            .await
            .expect("analysis");

        assert_eq!(result.reference_count, 0);
        assert_eq!(result.current_count, 0);
        assert_eq!(
            result.sales_difference,
            SalesDelta { percentage: 0, absolute_value: 0, is_increase: true }
        );
        assert!(result.related_products.is_empty());
    }

    #[tokio::test]
    async fn data_source_failure_propagates() {
        let ledger = FixtureLedger::with_products(&[(1, "Pipoca Yoki")]).failing("disk I/O error");

        let error = analyzer(ledger)
            .analyze_sales(ProductId(1), window("2023-10-01", "2023-10-05"), AnalysisMode::Compare, None)
            .await
            .expect_err("failure must surface");

        assert!(matches!(error, ApplicationError::DataUnavailable(ref message)
            if message.contains("disk I/O error")));
    }

    #[tokio::test]
    async fn repeated_calls_are_identical() {
        let ledger = FixtureLedger::with_products(&[(1, "A"), (2, "B"), (3, "C")])
            .purchase(1, "2023-10-02", &[1, 2, 3])
            .purchase(2, "2023-10-06", &[1, 3])
            .purchase(3, "2023-10-07", &[1, 2]);
        let analyzer = analyzer(ledger);

        let first = analyzer
            .analyze_sales(ProductId(1), window("2023-10-05", "2023-10-10"), AnalysisMode::Compare, None)
            .await
            .expect("first");
        let second = analyzer
            .analyze_sales(ProductId(1), window("2023-10-05", "2023-10-10"), AnalysisMode::Compare, None)
            .await
            .expect("second");

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).expect("json"),
            serde_json::to_string(&second).expect("json")
        );
    }

    #[test]
    fn result_serializes_with_dashboard_field_names() {
        let result = crate::analysis::SalesAnalysisResult {
            product_id: ProductId(1),
            product_name: "Pipoca Yoki".to_string(),
            reference_count: 10,
            current_count: 15,
            sales_difference: SalesDelta::between(10, 15),
            related_products: Vec::new(),
            show_comparison: true,
        };

        let value = serde_json::to_value(&result).expect("json");
        assert_eq!(value["productId"], 1);
        assert_eq!(value["startDateSales"], 10);
        assert_eq!(value["endDateSales"], 15);
        assert_eq!(value["salesDifference"]["absoluteValue"], 5);
        assert_eq!(value["salesDifference"]["isIncrease"], true);
        assert_eq!(value["showComparison"], true);
    }
}
