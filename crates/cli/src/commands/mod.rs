pub mod analyze;
pub mod config;
pub mod doctor;
pub mod insights;
pub mod migrate;
pub mod related;
pub mod search;
pub mod seed;
pub mod stock;

use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use synergy_core::analysis::{AnalysisSettings, SalesAnalyzer};
use synergy_core::config::{AppConfig, LoadOptions};
use synergy_core::domain::window::{parse_iso_date, DateWindow};
use synergy_core::errors::ApplicationError;
use synergy_core::stock::{StockAnalyzer, StockSettings};
use synergy_db::{connect_with_config, migrations, DbPool, SqlSalesRepository, SqlStockRepository};

/// `(error_class, message, exit_code)` for a failed command step.
pub(crate) type Failure = (&'static str, String, u8);

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Success carrying a serialized result under `data`.
    pub fn with_data(command: &str, message: impl Into<String>, data: &impl Serialize) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 3);
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads config, opens the database with migrations applied and runs `task` on a
/// current-thread runtime.
pub(crate) fn run_against_database<F, Fut>(command: &'static str, task: F) -> CommandResult
where
    F: FnOnce(AppConfig, DbPool) -> Fut,
    Fut: Future<Output = Result<CommandResult, Failure>>,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let outcome = task(config, pool.clone()).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(result) => result,
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}

pub(crate) fn application_failure(error: ApplicationError) -> Failure {
    match error {
        ApplicationError::Domain(error) => ("invalid_request", error.to_string(), 2),
        ApplicationError::Configuration(message) => ("config_validation", message, 2),
        ApplicationError::DataUnavailable(message) => ("db_query", message, 4),
        ApplicationError::ProductNotFound(message) => {
            ("not_found", format!("product not found: {message}"), 7)
        }
    }
}

pub(crate) fn sales_analyzer(config: &AppConfig, pool: &DbPool) -> Result<SalesAnalyzer, Failure> {
    let settings = AnalysisSettings::try_from(&config.analysis)
        .map_err(|error| ("config_validation", error.to_string(), 2u8))?;
    Ok(SalesAnalyzer::with_settings(Arc::new(SqlSalesRepository::new(pool.clone())), settings))
}

pub(crate) fn stock_analyzer(config: &AppConfig, pool: &DbPool) -> StockAnalyzer {
    StockAnalyzer::with_settings(
        Arc::new(SqlSalesRepository::new(pool.clone())),
        Arc::new(SqlStockRepository::new(pool.clone())),
        StockSettings::from(&config.stock),
    )
}

pub(crate) fn parse_window(command: &str, start: &str, end: &str) -> Result<DateWindow, CommandResult> {
    DateWindow::parse(start, end).map_err(|error| {
        CommandResult::failure(command, "input_parse", format!("invalid date range: {error}"), 2)
    })
}

/// `--today`, or the local calendar date when omitted.
pub(crate) fn parse_today(command: &str, today: Option<&str>) -> Result<NaiveDate, CommandResult> {
    match today {
        Some(raw) => parse_iso_date(raw).map_err(|error| {
            CommandResult::failure(command, "input_parse", format!("invalid --today: {error}"), 2)
        }),
        None => Ok(chrono::Local::now().date_naive()),
    }
}
