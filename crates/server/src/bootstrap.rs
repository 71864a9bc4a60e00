use std::sync::Arc;

use synergy_core::analysis::{AnalysisSettings, SalesAnalyzer};
use synergy_core::config::{AppConfig, ConfigError, LoadOptions};
use synergy_core::errors::DomainError;
use synergy_core::insights::InsightGenerator;
use synergy_core::stock::{StockAnalyzer, StockSettings};
use synergy_db::{connect_with_config, migrations, DbPool, SqlSalesRepository, SqlStockRepository};
use thiserror::Error;
use tracing::info;

use crate::api::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("analysis settings are invalid: {0}")]
    Settings(#[source] DomainError),
}

#[cfg(test)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let analysis_settings =
        AnalysisSettings::try_from(&config.analysis).map_err(BootstrapError::Settings)?;

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let sales_source = Arc::new(SqlSalesRepository::new(db_pool.clone()));
    let api = ApiState {
        sales: SalesAnalyzer::with_settings(sales_source.clone(), analysis_settings),
        stock: StockAnalyzer::with_settings(
            sales_source,
            Arc::new(SqlStockRepository::new(db_pool.clone())),
            StockSettings::from(&config.stock),
        ),
        insights: InsightGenerator::default(),
    };

    Ok(Application { config, db_pool, api })
}
