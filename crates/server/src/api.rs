//! JSON API over the analysis engines.
//!
//! Endpoints:
//! - `GET  /products/search/{query}?search_type=`: product lookup by name or id
//! - `GET  /analysis/sales`: one product slot of the dashboard
//! - `POST /analysis/dashboard`: recompute every slot from a snapshot
//! - `GET  /stock/history`: daily stock balance
//! - `GET  /stock/classification`: stock aging split
//! - `GET  /stock/total`: units on hand and their value
//! - `GET  /api/markup/general`: average markup and margin
//! - `GET  /api/markup/product/{id}`: markup and margin for one product
//! - `POST /insights`: narrative insights for an analysis

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use synergy_core::analysis::{
    AnalysisMode, ComparisonRequest, DashboardSnapshot, SalesAnalysisReport, SalesAnalyzer,
};
use synergy_core::domain::product::{Product, ProductId, SearchBy};
use synergy_core::domain::window::{parse_iso_date, DateWindow};
use synergy_core::errors::{ApplicationError, DomainError, InterfaceError};
use synergy_core::insights::{InsightGenerator, InsightReport, InsightRequest};
use synergy_core::markup::MarkupFigures;
use synergy_core::stock::{StockAnalyzer, StockClassification, StockHistory, StockTotal};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    pub sales: SalesAnalyzer,
    pub stock: StockAnalyzer,
    pub insights: InsightGenerator,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/products/search/{query}", get(search_product))
        .route("/analysis/sales", get(analyze_sales))
        .route("/analysis/dashboard", post(recompute_dashboard))
        .route("/stock/history", get(stock_history))
        .route("/stock/classification", get(stock_classification))
        .route("/stock/total", get(stock_total))
        .route("/api/markup/general", get(general_markup))
        .route("/api/markup/product/{id}", get(product_markup))
        .route("/insights", post(generate_insights))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl ApiError {
    fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        warn!(
            event_name = "api.request.failed",
            correlation_id = %correlation_id,
            error = %error,
            "request failed"
        );
        Self(error.into_interface(correlation_id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let detail = match &self.0 {
            // internal details stay in the logs
            InterfaceError::Internal { .. } | InterfaceError::ServiceUnavailable { .. } => {
                String::new()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: self.0.user_message(),
            detail,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn parse_day(raw: Option<&str>) -> Result<NaiveDate, ApplicationError> {
    match raw {
        Some(raw) => Ok(parse_iso_date(raw)?),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    pub search_type: Option<String>,
}

async fn search_product(
    Path(query): Path<String>,
    Query(params): Query<SearchQuery>,
    State(state): State<ApiState>,
) -> ApiResult<Product> {
    let correlation_id = correlation_id();
    let result = async {
        let search_by = match params.search_type.as_deref() {
            Some(raw) => raw.parse::<SearchBy>().map_err(DomainError::InvalidRequest)?,
            None => SearchBy::Product,
        };
        state
            .sales
            .find_product(&query, search_by)
            .await?
            .ok_or_else(|| ApplicationError::ProductNotFound(format!("no product matches `{query}`")))
    }
    .await;

    result.map(Json).map_err(|error| ApiError::from_application(error, &correlation_id))
}

// ---------------------------------------------------------------------------
// Sales analysis
// ---------------------------------------------------------------------------

/// Query string of `GET /analysis/sales`. Names are snake_case; camelCase spellings are accepted.
///
/// `first_product_id` is the product a second dashboard slot is compared against.
#[derive(Debug, Deserialize)]
pub struct SalesQuery {
    #[serde(alias = "productId")]
    pub product_id: i64,
    #[serde(alias = "startDate")]
    pub start_date: String,
    #[serde(alias = "endDate")]
    pub end_date: String,
    #[serde(alias = "comparisonType")]
    pub comparison_type: Option<String>,
    #[serde(rename = "first_product_id", alias = "rival_id", alias = "rivalId")]
    pub rival_id: Option<i64>,
    #[serde(alias = "secondStartDate")]
    pub second_start_date: Option<String>,
    #[serde(alias = "secondEndDate")]
    pub second_end_date: Option<String>,
}

impl SalesQuery {
    fn to_request(&self) -> Result<ComparisonRequest, DomainError> {
        let mode = match self.comparison_type.as_deref() {
            Some(raw) => raw.parse::<AnalysisMode>()?,
            None => AnalysisMode::default(),
        };
        let mut request =
            ComparisonRequest::single(DateWindow::parse(&self.start_date, &self.end_date)?, mode);

        match (self.second_start_date.as_deref(), self.second_end_date.as_deref()) {
            (Some(start), Some(end)) => {
                request.secondary_window = Some(DateWindow::parse(start, end)?);
                request.secondary_enabled = true;
            }
            (None, None) => {}
            _ => {
                return Err(DomainError::InvalidRequest(
                    "second_start_date and second_end_date must be given together".to_string(),
                ))
            }
        }
        Ok(request)
    }
}

async fn analyze_sales(
    Query(params): Query<SalesQuery>,
    State(state): State<ApiState>,
) -> ApiResult<SalesAnalysisReport> {
    let correlation_id = correlation_id();
    let result = async {
        let request = params.to_request()?;
        state
            .sales
            .assemble(ProductId(params.product_id), &request, params.rival_id.map(ProductId))
            .await
    }
    .await;

    if let Ok(report) = &result {
        info!(
            event_name = "api.analysis.sales",
            correlation_id = %correlation_id,
            product_id = report.product_id.0,
            show_comparison = report.show_comparison,
            "sales analysis served"
        );
    }
    result.map(Json).map_err(|error| ApiError::from_application(error, &correlation_id))
}

async fn recompute_dashboard(
    State(state): State<ApiState>,
    Json(snapshot): Json<DashboardSnapshot>,
) -> ApiResult<Vec<SalesAnalysisReport>> {
    let correlation_id = correlation_id();
    state
        .sales
        .recompute(&snapshot)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &correlation_id))
}

// ---------------------------------------------------------------------------
// Stock
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StockHistoryQuery {
    #[serde(alias = "productId")]
    pub product_id: i64,
    #[serde(alias = "startDate")]
    pub start_date: String,
    #[serde(alias = "endDate")]
    pub end_date: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct StockQuery {
    #[serde(alias = "productId")]
    pub product_id: Option<i64>,
    pub today: Option<String>,
}

async fn stock_history(
    Query(params): Query<StockHistoryQuery>,
    State(state): State<ApiState>,
) -> ApiResult<StockHistory> {
    let correlation_id = correlation_id();
    let result = async {
        let window = DateWindow::parse(&params.start_date, &params.end_date)?;
        state.stock.stock_history(ProductId(params.product_id), window).await
    }
    .await;

    result.map(Json).map_err(|error| ApiError::from_application(error, &correlation_id))
}

async fn stock_classification(
    Query(params): Query<StockQuery>,
    State(state): State<ApiState>,
) -> ApiResult<StockClassification> {
    let correlation_id = correlation_id();
    let result = async {
        let today = parse_day(params.today.as_deref())?;
        match params.product_id {
            Some(product_id) => state.stock.classify_stock(ProductId(product_id), today).await,
            None => state.stock.classify_all(today).await,
        }
    }
    .await;

    result.map(Json).map_err(|error| ApiError::from_application(error, &correlation_id))
}

async fn stock_total(
    Query(params): Query<StockQuery>,
    State(state): State<ApiState>,
) -> ApiResult<StockTotal> {
    let correlation_id = correlation_id();
    let result = async {
        let today = parse_day(params.today.as_deref())?;
        state.stock.stock_total(today).await
    }
    .await;

    result.map(Json).map_err(|error| ApiError::from_application(error, &correlation_id))
}

// ---------------------------------------------------------------------------
// Markup
// ---------------------------------------------------------------------------

async fn general_markup(
    Query(params): Query<StockQuery>,
    State(state): State<ApiState>,
) -> ApiResult<Option<MarkupFigures>> {
    let correlation_id = correlation_id();
    let result = async {
        let today = parse_day(params.today.as_deref())?;
        state.stock.general_markup(today).await
    }
    .await;

    result.map(Json).map_err(|error| ApiError::from_application(error, &correlation_id))
}

async fn product_markup(
    Path(id): Path<i64>,
    Query(params): Query<StockQuery>,
    State(state): State<ApiState>,
) -> ApiResult<Option<MarkupFigures>> {
    let correlation_id = correlation_id();
    let result = async {
        let today = parse_day(params.today.as_deref())?;
        state.stock.product_markup(ProductId(id), today).await
    }
    .await;

    result.map(Json).map_err(|error| ApiError::from_application(error, &correlation_id))
}

// ---------------------------------------------------------------------------
// Insights
// ---------------------------------------------------------------------------

async fn generate_insights(
    State(state): State<ApiState>,
    Json(request): Json<InsightRequest>,
) -> Json<InsightReport> {
    Json(state.insights.generate(&request.analysis, request.stock.as_ref()))
}
