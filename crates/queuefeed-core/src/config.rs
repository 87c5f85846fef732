//! Runtime settings, read from the process environment (after `.env` has been
//! loaded by the binary) with defaults matching the published table.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use queuefeed_parser::TableSchema;
use thiserror::Error;

use crate::trigger::TriggerPolicy;

pub const API_KEY_VAR: &str = "DUNE_API_KEY";

pub const DEFAULT_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/etheralpha/validatorqueue-com/refs/heads/main/historical_data.json";
pub const DEFAULT_DUNE_BASE_URL: &str = "https://api.dune.com";
pub const DEFAULT_TABLE_NAME: &str = "eth_validator_queue_metrics";
pub const DEFAULT_TABLE_DESCRIPTION: &str =
    "Ethereum validator queue metrics, sourced from validatorqueue.com";
pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_MAIN_BRANCH: &str = "main";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const SCHEDULE_FORMAT: &str = "%H:%M";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("table name {0:?} must start with a lowercase letter and contain only lowercase letters, digits and '_'")]
    InvalidTableName(String),

    #[error("source URL {url:?} is invalid: {reason}")]
    InvalidSourceUrl { url: String, reason: String },

    #[error("at least one metric column is required")]
    NoMetricColumns,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuneConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for DuneConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DUNE_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub name: String,
    pub description: String,
    pub is_private: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TABLE_NAME.to_string(),
            description: DEFAULT_TABLE_DESCRIPTION.to_string(),
            is_private: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub source_url: String,
    pub dune: DuneConfig,
    pub table: TableConfig,
    pub env_file: PathBuf,
    pub schedule_utc: NaiveTime,
    pub main_branch: String,
    pub schema: TableSchema,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            dune: DuneConfig::default(),
            table: TableConfig::default(),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            schedule_utc: NaiveTime::MIN,
            main_branch: DEFAULT_MAIN_BRANCH.to_string(),
            schema: TableSchema::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut settings = Settings::default();

        if let Some(url) = get("QUEUEFEED_SOURCE_URL") {
            settings.source_url = url;
        }
        if let Some(url) = get("DUNE_API_BASE_URL") {
            settings.dune.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = get("DUNE_API_REQUEST_TIMEOUT") {
            let secs = raw.trim().parse::<u64>().map_err(|err| ConfigError::Invalid {
                var: "DUNE_API_REQUEST_TIMEOUT",
                value: raw.clone(),
                reason: err.to_string(),
            })?;
            settings.dune.timeout = Duration::from_secs(secs);
        }
        if let Some(name) = get("QUEUEFEED_TABLE_NAME") {
            settings.table.name = name;
        }
        if let Some(description) = get("QUEUEFEED_TABLE_DESCRIPTION") {
            settings.table.description = description;
        }
        if let Some(raw) = get("QUEUEFEED_TABLE_PRIVATE") {
            settings.table.is_private = parse_flag("QUEUEFEED_TABLE_PRIVATE", &raw)?;
        }
        if let Some(path) = get("QUEUEFEED_ENV_FILE") {
            settings.env_file = PathBuf::from(path);
        }
        if let Some(raw) = get("QUEUEFEED_SCHEDULE_UTC") {
            settings.schedule_utc = parse_schedule(&raw)?;
        }
        if let Some(branch) = get("QUEUEFEED_MAIN_BRANCH") {
            settings.main_branch = branch;
        }
        if let Some(raw) = get("QUEUEFEED_METRIC_COLUMNS") {
            settings.schema = TableSchema::new(
                raw.split(',')
                    .map(str::trim)
                    .filter(|column| !column.is_empty()),
            );
        }

        Ok(settings)
    }

    pub fn trigger_policy(&self) -> TriggerPolicy {
        TriggerPolicy {
            daily_at: self.schedule_utc,
            main_branch: self.main_branch.clone(),
        }
    }

    /// Checks the values the upload depends on before any side effect runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        reqwest::Url::parse(&self.source_url).map_err(|err| ConfigError::InvalidSourceUrl {
            url: self.source_url.clone(),
            reason: err.to_string(),
        })?;

        if !is_valid_table_name(&self.table.name) {
            return Err(ConfigError::InvalidTableName(self.table.name.clone()));
        }

        if self.schema.metric_columns.is_empty() {
            return Err(ConfigError::NoMetricColumns);
        }

        Ok(())
    }
}

pub fn parse_schedule(raw: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(raw.trim(), SCHEDULE_FORMAT).map_err(|err| ConfigError::Invalid {
        var: "QUEUEFEED_SCHEDULE_UTC",
        value: raw.to_string(),
        reason: format!("expected HH:MM ({err})"),
    })
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
