use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::comparison::SalesAnalysisResult;
use super::{AnalysisMode, SalesAnalyzer};
use crate::domain::product::ProductId;
use crate::domain::window::DateWindow;
use crate::errors::{ApplicationError, DomainError};

/// Snapshot of the dashboard's date-range controls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRequest {
    pub primary_window: DateWindow,
    #[serde(default)]
    pub secondary_window: Option<DateWindow>,
    #[serde(default = "enabled_by_default")]
    pub primary_enabled: bool,
    #[serde(default)]
    pub secondary_enabled: bool,
    #[serde(default)]
    pub mode: AnalysisMode,
}

fn enabled_by_default() -> bool {
    true
}

/// What to compute for a [`ComparisonRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComparisonPlan {
    /// No range is active.
    Skip,
    Single { window: DateWindow, mode: AnalysisMode },
    /// Both ranges are active: the first is the reference, the second the current period.
    PeriodOverPeriod { reference: DateWindow, current: DateWindow },
}

impl ComparisonRequest {
    pub fn single(window: DateWindow, mode: AnalysisMode) -> Self {
        Self {
            primary_window: window,
            secondary_window: None,
            primary_enabled: true,
            secondary_enabled: false,
            mode,
        }
    }

    pub fn plan(&self) -> Result<ComparisonPlan, DomainError> {
        let secondary = match (self.secondary_enabled, self.secondary_window) {
            (true, None) => {
                return Err(DomainError::InvalidRequest(
                    "second date range is enabled but has no dates".to_string(),
                ))
            }
            (true, Some(window)) => Some(window),
            (false, _) => None,
        };

        let plan = match (self.primary_enabled, secondary) {
            (false, None) => ComparisonPlan::Skip,
            (true, None) => ComparisonPlan::Single { window: self.primary_window, mode: self.mode },
            (false, Some(window)) => ComparisonPlan::Single { window, mode: self.mode },
            (true, Some(current)) => {
                ComparisonPlan::PeriodOverPeriod { reference: self.primary_window, current }
            }
        };
        Ok(plan)
    }
}

/// Product slots plus the active date-range controls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub products: Vec<ProductId>,
    pub request: ComparisonRequest,
}

impl DashboardSnapshot {
    pub fn ensure_distinct_products(&self) -> Result<(), DomainError> {
        let mut seen = HashSet::with_capacity(self.products.len());
        for product_id in &self.products {
            if !seen.insert(*product_id) {
                return Err(DomainError::DuplicateProduct(*product_id));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesAnalysisReport {
    pub product_id: ProductId,
    pub comparison_type: AnalysisMode,
    /// `None` when no date range is active.
    pub analysis: Option<SalesAnalysisResult>,
    pub show_comparison: bool,
    pub show_cross_sell: bool,
    pub first_start_date: String,
    pub first_end_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_end_date: Option<String>,
    pub first_date_range_checked: bool,
    pub second_date_range_checked: bool,
}

impl SalesAnalysisReport {
    fn new(
        product_id: ProductId,
        request: &ComparisonRequest,
        analysis: Option<SalesAnalysisResult>,
    ) -> Self {
        let show_comparison = analysis.as_ref().map(|result| result.show_comparison).unwrap_or(false);
        let show_cross_sell = analysis.is_some();
        Self {
            product_id,
            comparison_type: request.mode,
            analysis,
            show_comparison,
            show_cross_sell,
            first_start_date: request.primary_window.start_iso(),
            first_end_date: request.primary_window.end_iso(),
            second_start_date: request.secondary_window.map(|window| window.start_iso()),
            second_end_date: request.secondary_window.map(|window| window.end_iso()),
            first_date_range_checked: request.primary_enabled,
            second_date_range_checked: request.secondary_enabled,
        }
    }
}

impl SalesAnalyzer {
    /// Builds the dashboard report for one product slot.
    ///
    /// The product must exist; a missing product is reported as
    /// [`ApplicationError::ProductNotFound`] before any sales query runs.
    pub async fn assemble(
        &self,
        product_id: ProductId,
        request: &ComparisonRequest,
        rival: Option<ProductId>,
    ) -> Result<SalesAnalysisReport, ApplicationError> {
        let plan = request.plan()?;
        if rival == Some(product_id) {
            return Err(DomainError::DuplicateProduct(product_id).into());
        }
        self.require_product(product_id).await?;

        let analysis = match plan {
            ComparisonPlan::Skip => None,
            ComparisonPlan::Single { window, mode } => {
                Some(self.analyze_sales(product_id, window, mode, rival).await?)
            }
            ComparisonPlan::PeriodOverPeriod { reference, current } => {
                Some(self.compare_periods(product_id, Some(reference), current).await?)
            }
        };

        Ok(SalesAnalysisReport::new(product_id, request, analysis))
    }

    /// Recomputes every slot from a full snapshot of the dashboard state.
    ///
    /// Slots after the first are compared against the first product in `until` mode.
    pub async fn recompute(
        &self,
        snapshot: &DashboardSnapshot,
    ) -> Result<Vec<SalesAnalysisReport>, ApplicationError> {
        if let Err(error) = snapshot.ensure_distinct_products() {
            warn!(
                event_name = "analysis.dashboard.duplicate_product",
                error = %error,
                "dashboard snapshot rejected"
            );
            return Err(error.into());
        }
        snapshot.request.plan()?;

        let first = snapshot.products.first().copied();
        let mut reports = Vec::with_capacity(snapshot.products.len());
        for (slot, product_id) in snapshot.products.iter().copied().enumerate() {
            let rival = if slot == 0 { None } else { first };
            reports.push(self.assemble(product_id, &snapshot.request, rival).await?);
        }

        info!(
            event_name = "analysis.dashboard.recomputed",
            slots = reports.len(),
            mode = ?snapshot.request.mode,
            "dashboard recomputed"
        );
        Ok(reports)
    }
}
