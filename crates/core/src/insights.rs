//! Rule-based narrative over a sales analysis and, optionally, the product's stock split.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::SalesAnalysisResult;
use crate::stock::StockClassification;

pub const DEFAULT_CROSS_SELL_THRESHOLD: u64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Positive,
    Negative,
    Neutral,
    Suggestion,
}

impl InsightKind {
    const ORDERED: [InsightKind; 4] =
        [InsightKind::Positive, InsightKind::Negative, InsightKind::Neutral, InsightKind::Suggestion];
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightMetric {
    pub value: i64,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<InsightMetric>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightReport {
    pub summary: String,
    pub insights: Vec<Insight>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightRequest {
    pub analysis: SalesAnalysisResult,
    #[serde(default)]
    pub stock: Option<StockClassification>,
}

#[derive(Clone, Debug)]
pub struct InsightGenerator {
    cross_sell_threshold: u64,
}

impl Default for InsightGenerator {
    fn default() -> Self {
        Self { cross_sell_threshold: DEFAULT_CROSS_SELL_THRESHOLD }
    }
}

impl InsightGenerator {
    pub fn new(cross_sell_threshold: u64) -> Self {
        Self { cross_sell_threshold }
    }

    pub fn generate(
        &self,
        analysis: &SalesAnalysisResult,
        stock: Option<&StockClassification>,
    ) -> InsightReport {
        let mut insights = Vec::new();
        insights.push(sales_insight(analysis));

        if let Some(top) = analysis.related_products.first() {
            if top.percentage >= self.cross_sell_threshold {
                insights.push(Insight {
                    kind: InsightKind::Suggestion,
                    title: format!("Bundle with {}", top.product_name),
                    description: format!(
                        "{} appears in {}% of the purchases that include {}. Place them together \
                         or promote them as a combo.",
                        top.product_name, top.percentage, analysis.product_name
                    ),
                    metric: Some(InsightMetric {
                        value: to_i64(top.percentage),
                        unit: "%".to_string(),
                        change: None,
                    }),
                });
            }
        }

        if let Some(stock) = stock {
            insights.extend(stock_insights(stock));
        }

        let summary = summarize(&insights);
        debug!(
            event_name = "insights.generated",
            product_id = analysis.product_id.0,
            insights = insights.len(),
            "insights generated"
        );
        InsightReport { summary, insights }
    }
}

fn sales_insight(analysis: &SalesAnalysisResult) -> Insight {
    let delta = analysis.sales_difference;
    if !analysis.show_comparison {
        return Insight {
            kind: InsightKind::Neutral,
            title: "Sales volume".to_string(),
            description: format!(
                "{} sold {} units in the selected period.",
                analysis.product_name, analysis.current_count
            ),
            metric: Some(InsightMetric {
                value: to_i64(analysis.current_count),
                unit: "units".to_string(),
                change: None,
            }),
        };
    }

    let change = to_i64(delta.percentage);
    let metric = |change: i64| {
        Some(InsightMetric {
            value: to_i64(analysis.current_count),
            unit: "units".to_string(),
            change: Some(change),
        })
    };

    if delta.absolute_value == 0 {
        Insight {
            kind: InsightKind::Neutral,
            title: "Stable sales".to_string(),
            description: format!(
                "{} sold {} units in both periods.",
                analysis.product_name, analysis.current_count
            ),
            metric: metric(0),
        }
    } else if delta.is_increase {
        Insight {
            kind: InsightKind::Positive,
            title: "Sales are up".to_string(),
            description: format!(
                "{} sold {} more units ({}%) than in the reference period.",
                analysis.product_name, delta.absolute_value, delta.percentage
            ),
            metric: metric(change),
        }
    } else {
        Insight {
            kind: InsightKind::Negative,
            title: "Sales are down".to_string(),
            description: format!(
                "{} sold {} fewer units ({}%) than in the reference period.",
                analysis.product_name, delta.absolute_value, delta.percentage
            ),
            metric: metric(-change),
        }
    }
}

fn stock_insights(stock: &StockClassification) -> Vec<Insight> {
    let mut insights = Vec::new();

    let at_risk = stock.at_risk_units();
    if at_risk > 0 {
        insights.push(Insight {
            kind: InsightKind::Negative,
            title: "Stock at risk".to_string(),
            description: format!(
                "{} units are expired and {} units are close to expiry or running out.",
                stock.expired.units, stock.critical_age.units
            ),
            metric: Some(InsightMetric { value: at_risk, unit: "units".to_string(), change: None }),
        });
    }

    if stock.stock_over.units > 0 {
        insights.push(Insight {
            kind: InsightKind::Suggestion,
            title: "Reduce overstock".to_string(),
            description: format!(
                "{} units ({}% of stock) exceed expected demand. Consider a promotion or pausing \
                 replenishment.",
                stock.stock_over.units, stock.stock_over.percentage
            ),
            metric: Some(InsightMetric {
                value: stock.stock_over.units,
                unit: "units".to_string(),
                change: None,
            }),
        });
    }

    insights
}

fn summarize(insights: &[Insight]) -> String {
    let headlines = InsightKind::ORDERED
        .iter()
        .filter_map(|kind| insights.iter().find(|insight| insight.kind == *kind))
        .map(|insight| insight.title.as_str())
        .collect::<Vec<_>>();

    if headlines.is_empty() {
        "No notable changes.".to_string()
    } else {
        format!("{}.", headlines.join(". "))
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
