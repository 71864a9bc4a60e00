//! Sales comparison and cross-sell analysis.
//!
//! Every entry point is request scoped: results are rebuilt from the data source on each call and
//! no accumulator outlives the call that created it.

pub mod assembly;
pub mod comparison;
pub mod cross_sell;
pub mod source;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::domain::product::{Product, ProductId, SearchBy};
use crate::domain::purchase::{PurchaseId, PurchaseItem};
use crate::domain::window::{parse_iso_date, DateWindow};
use crate::errors::{ApplicationError, DomainError};

pub use assembly::{ComparisonPlan, ComparisonRequest, DashboardSnapshot, SalesAnalysisReport};
pub use comparison::{SalesAnalysisResult, SalesDelta};
pub use cross_sell::{rank_co_purchases, CoPurchase, RelatedProductStat};
pub use source::{DataSourceError, SalesDataSource, StockDataSource};

pub const DEFAULT_RELATED_LIMIT: usize = 5;
pub const DEFAULT_UNKNOWN_PRODUCT_LABEL: &str = "Produto Desconhecido";
pub const DEFAULT_HISTORY_START: &str = "1970-01-01";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Sales before the window start against sales inside the window.
    #[default]
    Compare,
    /// Sales inside the window only.
    Until,
}

impl std::str::FromStr for AnalysisMode {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compare" => Ok(Self::Compare),
            "until" => Ok(Self::Until),
            other => Err(DomainError::InvalidRequest(format!(
                "unsupported comparison type `{other}` (expected compare|until)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisSettings {
    /// Earliest date considered part of the "before" period in compare mode.
    pub history_start: NaiveDate,
    pub related_limit: usize,
    pub unknown_product_label: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            history_start: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default(),
            related_limit: DEFAULT_RELATED_LIMIT,
            unknown_product_label: DEFAULT_UNKNOWN_PRODUCT_LABEL.to_string(),
        }
    }
}

impl TryFrom<&AnalysisConfig> for AnalysisSettings {
    type Error = DomainError;

    fn try_from(config: &AnalysisConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            history_start: parse_iso_date(&config.history_start)?,
            related_limit: config.related_limit,
            unknown_product_label: config.unknown_product_label.clone(),
        })
    }
}

/// Entry point for sales analysis over a [`SalesDataSource`].
#[derive(Clone)]
pub struct SalesAnalyzer {
    source: Arc<dyn SalesDataSource>,
    settings: AnalysisSettings,
}

/// Purchases and their items for one inclusive window.
pub(crate) struct WindowSales {
    pub purchase_ids: Vec<PurchaseId>,
    pub items: Vec<PurchaseItem>,
}

impl WindowSales {
    fn empty() -> Self {
        Self { purchase_ids: Vec::new(), items: Vec::new() }
    }

    pub fn count_for(&self, product_id: ProductId) -> u64 {
        self.items.iter().filter(|item| item.product_id == product_id).count() as u64
    }
}

impl SalesAnalyzer {
    pub fn new(source: Arc<dyn SalesDataSource>) -> Self {
        Self::with_settings(source, AnalysisSettings::default())
    }

    pub fn with_settings(source: Arc<dyn SalesDataSource>, settings: AnalysisSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Resolves a free-text query to a product. `Ok(None)` is the not-found signal.
    pub async fn find_product(
        &self,
        query: &str,
        search_by: SearchBy,
    ) -> Result<Option<Product>, ApplicationError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let product = match search_by {
            SearchBy::Product => self.source.product_by_name(query).await?,
            SearchBy::Sku => {
                let id = query.parse::<i64>().map_err(|_| {
                    DomainError::InvalidRequest(format!("product id must be numeric, got `{query}`"))
                })?;
                self.source.product_by_id(ProductId(id)).await?
            }
        };

        debug!(
            event_name = "analysis.product.lookup",
            query,
            found = product.is_some(),
            "product lookup finished"
        );
        Ok(product)
    }

    /// Ids of the purchases made inside `window`, in id order.
    pub async fn purchases_in(
        &self,
        window: DateWindow,
    ) -> Result<Vec<PurchaseId>, ApplicationError> {
        let mut purchase_ids = self
            .source
            .purchases_in_window(window.start(), window.end())
            .await?
            .into_iter()
            .map(|purchase| purchase.id)
            .collect::<Vec<_>>();
        purchase_ids.sort();
        Ok(purchase_ids)
    }

    pub(crate) async fn require_product(
        &self,
        product_id: ProductId,
    ) -> Result<Product, ApplicationError> {
        self.source
            .product_by_id(product_id)
            .await?
            .ok_or_else(|| ApplicationError::ProductNotFound(format!("product id {product_id}")))
    }

    pub(crate) async fn product_name(&self, product_id: ProductId) -> Result<String, ApplicationError> {
        let product = self.source.product_by_id(product_id).await?;
        Ok(product
            .map(|product| product.name)
            .unwrap_or_else(|| self.settings.unknown_product_label.clone()))
    }

    pub(crate) async fn load_window(&self, window: DateWindow) -> Result<WindowSales, ApplicationError> {
        let purchases = self.source.purchases_in_window(window.start(), window.end()).await?;
        if purchases.is_empty() {
            return Ok(WindowSales::empty());
        }

        let purchase_ids = purchases.iter().map(|purchase| purchase.id).collect::<Vec<_>>();
        let items = self.source.items_for_purchases(&purchase_ids).await?;
        Ok(WindowSales { purchase_ids, items })
    }
}

/// `part / whole * 100`, rounded half up. `whole` must be non-zero.
pub(crate) fn percent_of(part: u64, whole: u64) -> u64 {
    debug_assert!(whole > 0);
    let scaled = u128::from(part) * 200 + u128::from(whole);
    let rounded = scaled / (u128::from(whole) * 2);
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use super::source::{DataSourceError, SalesDataSource};
    use crate::domain::product::{Product, ProductId};
    use crate::domain::purchase::{Purchase, PurchaseId, PurchaseItem};
    use crate::domain::window::parse_iso_date;

    /// Small in-process ledger used by the analysis tests.
    #[derive(Default)]
    pub struct FixtureLedger {
        pub products: HashMap<ProductId, Product>,
        pub purchases: Vec<Purchase>,
        pub items: Vec<PurchaseItem>,
        pub fail_with: Option<String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FixtureLedger {
        pub fn with_products(names: &[(i64, &str)]) -> Self {
            let products = names
                .iter()
                .map(|(id, name)| {
                    (
                        ProductId(*id),
                        Product {
                            id: ProductId(*id),
                            name: (*name).to_string(),
                            unit_price: Decimal::new(499, 2),
                        },
                    )
                })
                .collect();
            Self { products, ..Self::default() }
        }

        /// Adds a purchase holding one item per listed product id.
        pub fn purchase(mut self, id: i64, date: &str, product_ids: &[i64]) -> Self {
            self.purchases.push(Purchase {
                id: PurchaseId(id),
                date: parse_iso_date(date).expect("fixture date"),
                customer_ref: format!("cust-{id}"),
            });
            for product_id in product_ids {
                let item_id = self.items.len() as i64 + 1;
                self.items.push(PurchaseItem {
                    id: item_id,
                    purchase_id: PurchaseId(id),
                    product_id: ProductId(*product_id),
                    unit_value: Decimal::new(499, 2),
                    flyer_flag: None,
                });
            }
            self
        }

        pub fn failing(mut self, message: &str) -> Self {
            self.fail_with = Some(message.to_string());
            self
        }

        pub async fn calls(&self) -> Vec<String> {
            self.calls.lock().await.clone()
        }

        async fn record(&self, call: String) -> Result<(), DataSourceError> {
            self.calls.lock().await.push(call);
            match &self.fail_with {
                Some(message) => Err(DataSourceError::Unavailable(message.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl SalesDataSource for FixtureLedger {
        async fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, DataSourceError> {
            self.record(format!("product_by_id:{id}")).await?;
            Ok(self.products.get(&id).cloned())
        }

        async fn product_by_name(&self, query: &str) -> Result<Option<Product>, DataSourceError> {
            self.record(format!("product_by_name:{query}")).await?;
            let needle = query.to_lowercase();
            let mut matches = self
                .products
                .values()
                .filter(|product| product.name.to_lowercase().contains(&needle))
                .collect::<Vec<_>>();
            matches.sort_by_key(|product| product.id);
            Ok(matches.first().map(|product| (*product).clone()))
        }

        async fn purchases_in_window(
            &self,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<Purchase>, DataSourceError> {
            self.record(format!("purchases_in_window:{start}:{end}")).await?;
            Ok(self
                .purchases
                .iter()
                .filter(|purchase| start <= purchase.date && purchase.date <= end)
                .cloned()
                .collect())
        }

        async fn items_for_purchases(
            &self,
            purchase_ids: &[PurchaseId],
        ) -> Result<Vec<PurchaseItem>, DataSourceError> {
            self.record(format!("items_for_purchases:{}", purchase_ids.len())).await?;
            Ok(self
                .items
                .iter()
                .filter(|item| purchase_ids.contains(&item.purchase_id))
                .cloned()
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::testing::FixtureLedger;
    use super::{percent_of, AnalysisMode, SalesAnalyzer};
    use crate::domain::product::{ProductId, SearchBy};
    use crate::domain::purchase::PurchaseId;
    use crate::domain::window::DateWindow;
    use crate::errors::{ApplicationError, DomainError};

    #[test]
    fn percent_of_rounds_half_up() {
        assert_eq!(percent_of(2, 3), 67);
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(1, 8), 13);
        assert_eq!(percent_of(5, 10), 50);
        assert_eq!(percent_of(0, 4), 0);
    }

    #[test]
    fn mode_parsing_is_closed() {
        assert_eq!("compare".parse::<AnalysisMode>(), Ok(AnalysisMode::Compare));
        assert_eq!(" UNTIL ".parse::<AnalysisMode>(), Ok(AnalysisMode::Until));
        assert!(matches!("between".parse::<AnalysisMode>(), Err(DomainError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn name_lookup_prefers_lowest_id() {
        let ledger = FixtureLedger::with_products(&[
            (9, "Coca-cola 2L"),
            (3, "Coca-cola 600ml"),
            (1, "Pipoca Yoki"),
        ]);
        let analyzer = SalesAnalyzer::new(Arc::new(ledger));

        let found = analyzer.find_product("coca", SearchBy::Product).await.expect("lookup");
        assert_eq!(found.map(|product| product.id), Some(ProductId(3)));

        let missing = analyzer.find_product("heineken", SearchBy::Product).await.expect("lookup");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn sku_lookup_requires_numeric_query() {
        let analyzer =
            SalesAnalyzer::new(Arc::new(FixtureLedger::with_products(&[(1, "Pipoca Yoki")])));

        let found = analyzer.find_product("1", SearchBy::Sku).await.expect("lookup");
        assert_eq!(found.map(|product| product.name), Some("Pipoca Yoki".to_string()));

        let error = analyzer.find_product("abc", SearchBy::Sku).await.expect_err("non numeric");
        assert!(matches!(error, ApplicationError::Domain(DomainError::InvalidRequest(_))));

        let blank = analyzer.find_product("   ", SearchBy::Product).await.expect("blank lookup");
        assert!(blank.is_none());
    }

    #[tokio::test]
    async fn purchases_in_lists_window_purchases_through_the_source() {
        let ledger = FixtureLedger::with_products(&[(1, "Pipoca Yoki"), (2, "Guaraná Antarc. 1L")])
            .purchase(7, "2023-10-06", &[1, 2])
            .purchase(3, "2023-10-05", &[1])
            .purchase(9, "2023-10-11", &[2]);
        let ledger = Arc::new(ledger);
        let analyzer = SalesAnalyzer::new(ledger.clone());
        let window = DateWindow::parse("2023-10-05", "2023-10-10").expect("window");

        let purchase_ids = analyzer.purchases_in(window).await.expect("purchases");

        assert_eq!(purchase_ids, vec![PurchaseId(3), PurchaseId(7)]);
        assert_eq!(ledger.calls().await, vec!["purchases_in_window:2023-10-05:2023-10-10"]);

        let related = analyzer.related_products(ProductId(1), &purchase_ids).await.expect("related");
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].percentage, 50);
    }
}
