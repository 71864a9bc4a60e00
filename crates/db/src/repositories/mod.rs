use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use synergy_core::analysis::source::DataSourceError;
use synergy_core::domain::window::parse_iso_date;

pub mod memory;
pub mod sales;
pub mod stock;

pub use memory::InMemorySalesStore;
pub use sales::SqlSalesRepository;
pub use stock::SqlStockRepository;

/// SQLite caps bound parameters per statement; `IN` lists are split into chunks of this size.
pub(crate) const MAX_BIND_CHUNK: usize = 500;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for DataSourceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(source) => Self::Unavailable(source.to_string()),
            RepositoryError::Decode(message) => Self::Decode(message),
        }
    }
}

pub(crate) fn decode_decimal(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw.trim())
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}

pub(crate) fn decode_date(column: &str, raw: &str) -> Result<NaiveDate, RepositoryError> {
    parse_iso_date(raw).map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

/// `?, ?, ?` with `count` placeholders.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
