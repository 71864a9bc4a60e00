use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{DEFAULT_HISTORY_START, DEFAULT_RELATED_LIMIT, DEFAULT_UNKNOWN_PRODUCT_LABEL};
use crate::domain::window::parse_iso_date;

pub const DEFAULT_CONFIG_FILE: &str = "synergy.toml";
pub const MAX_RELATED_LIMIT: usize = 50;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub analysis: AnalysisConfig,
    pub stock: StockConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnalysisConfig {
    /// First calendar day of the "before" period in compare mode, `YYYY-MM-DD`.
    pub history_start: String,
    pub related_limit: usize,
    pub unknown_product_label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StockConfig {
    pub coverage_lookback_days: u32,
    pub critical_coverage_days: u32,
    pub over_coverage_days: u32,
    pub expiry_warning_days: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub history_start: Option<String>,
    pub related_limit: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://synergy.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 3001 },
            analysis: AnalysisConfig {
                history_start: DEFAULT_HISTORY_START.to_string(),
                related_limit: DEFAULT_RELATED_LIMIT,
                unknown_product_label: DEFAULT_UNKNOWN_PRODUCT_LABEL.to_string(),
            },
            stock: StockConfig {
                coverage_lookback_days: 30,
                critical_coverage_days: 15,
                over_coverage_days: 30,
                expiry_warning_days: 90,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(analysis) = patch.analysis {
            if let Some(history_start) = analysis.history_start {
                self.analysis.history_start = history_start;
            }
            if let Some(related_limit) = analysis.related_limit {
                self.analysis.related_limit = related_limit;
            }
            if let Some(label) = analysis.unknown_product_label {
                self.analysis.unknown_product_label = label;
            }
        }

        if let Some(stock) = patch.stock {
            if let Some(days) = stock.coverage_lookback_days {
                self.stock.coverage_lookback_days = days;
            }
            if let Some(days) = stock.critical_coverage_days {
                self.stock.critical_coverage_days = days;
            }
            if let Some(days) = stock.over_coverage_days {
                self.stock.over_coverage_days = days;
            }
            if let Some(days) = stock.expiry_warning_days {
                self.stock.expiry_warning_days = days;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SYNERGY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SYNERGY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("SYNERGY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SYNERGY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SYNERGY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SYNERGY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SYNERGY_SERVER_PORT") {
            self.server.port = parse_u16("SYNERGY_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("SYNERGY_ANALYSIS_HISTORY_START") {
            self.analysis.history_start = value;
        }
        if let Some(value) = read_env("SYNERGY_ANALYSIS_RELATED_LIMIT") {
            self.analysis.related_limit = parse_usize("SYNERGY_ANALYSIS_RELATED_LIMIT", &value)?;
        }
        if let Some(value) = read_env("SYNERGY_ANALYSIS_UNKNOWN_PRODUCT_LABEL") {
            self.analysis.unknown_product_label = value;
        }

        if let Some(value) = read_env("SYNERGY_STOCK_COVERAGE_LOOKBACK_DAYS") {
            self.stock.coverage_lookback_days =
                parse_u32("SYNERGY_STOCK_COVERAGE_LOOKBACK_DAYS", &value)?;
        }
        if let Some(value) = read_env("SYNERGY_STOCK_CRITICAL_COVERAGE_DAYS") {
            self.stock.critical_coverage_days =
                parse_u32("SYNERGY_STOCK_CRITICAL_COVERAGE_DAYS", &value)?;
        }
        if let Some(value) = read_env("SYNERGY_STOCK_OVER_COVERAGE_DAYS") {
            self.stock.over_coverage_days = parse_u32("SYNERGY_STOCK_OVER_COVERAGE_DAYS", &value)?;
        }
        if let Some(value) = read_env("SYNERGY_STOCK_EXPIRY_WARNING_DAYS") {
            self.stock.expiry_warning_days =
                parse_u32("SYNERGY_STOCK_EXPIRY_WARNING_DAYS", &value)?;
        }

        let log_level =
            read_env("SYNERGY_LOGGING_LEVEL").or_else(|| read_env("SYNERGY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SYNERGY_LOGGING_FORMAT").or_else(|| read_env("SYNERGY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(history_start) = overrides.history_start {
            self.analysis.history_start = history_start;
        }
        if let Some(related_limit) = overrides.related_limit {
            self.analysis.related_limit = related_limit;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_analysis(&self.analysis)?;
        validate_stock(&self.stock)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    Ok(())
}

fn validate_analysis(analysis: &AnalysisConfig) -> Result<(), ConfigError> {
    if parse_iso_date(&analysis.history_start).is_err() {
        return Err(ConfigError::Validation(format!(
            "analysis.history_start must be a YYYY-MM-DD date, got `{}`",
            analysis.history_start
        )));
    }

    if analysis.related_limit == 0 || analysis.related_limit > MAX_RELATED_LIMIT {
        return Err(ConfigError::Validation(format!(
            "analysis.related_limit must be in range 1..={MAX_RELATED_LIMIT}"
        )));
    }

    if analysis.unknown_product_label.trim().is_empty() {
        return Err(ConfigError::Validation(
            "analysis.unknown_product_label must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_stock(stock: &StockConfig) -> Result<(), ConfigError> {
    if stock.coverage_lookback_days == 0 {
        return Err(ConfigError::Validation(
            "stock.coverage_lookback_days must be greater than zero".to_string(),
        ));
    }

    if stock.critical_coverage_days > stock.over_coverage_days {
        return Err(ConfigError::Validation(
            "stock.critical_coverage_days must not exceed stock.over_coverage_days".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    analysis: Option<AnalysisPatch>,
    stock: Option<StockPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisPatch {
    history_start: Option<String>,
    related_limit: Option<usize>,
    unknown_product_label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StockPatch {
    coverage_lookback_days: Option<u32>,
    critical_coverage_days: Option<u32>,
    over_coverage_days: Option<u32>,
    expiry_warning_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
