pub mod analysis;
pub mod config;
pub mod domain;
pub mod errors;
pub mod insights;
pub mod markup;
pub mod stock;

pub use analysis::{
    AnalysisMode, AnalysisSettings, ComparisonPlan, ComparisonRequest, DashboardSnapshot,
    DataSourceError, RelatedProductStat, SalesAnalysisReport, SalesAnalysisResult, SalesAnalyzer,
    SalesDataSource, SalesDelta, StockDataSource,
};
pub use config::AppConfig;
pub use domain::product::{Product, ProductId, SearchBy};
pub use domain::purchase::{Purchase, PurchaseId, PurchaseItem};
pub use domain::stock::{StockLot, StockMovement};
pub use domain::window::DateWindow;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use insights::{Insight, InsightGenerator, InsightKind, InsightReport, InsightRequest};
pub use markup::MarkupFigures;
pub use stock::{StockAnalyzer, StockClassification, StockHistory, StockSettings, StockTotal};
