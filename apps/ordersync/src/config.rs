//! Run configuration loaded from environment variables.
//!
//! Required variables must be present and valid or the run refuses to
//! start. A `.env` file in the working directory is honored.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ordersync_connector::{ApiConfig, ApiCredentials};
use ordersync_reconcile::{ReconcileConfig, UnknownColumnPolicy};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgConnectOptions;
use thiserror::Error;

/// Markets processed when `MARKETS_TO_PROCESS` is unset.
pub const DEFAULT_MARKETS: &str = "region_a,region_b,region_c";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(format!("expected 'json' or 'pretty', got '{other}'")),
        }
    }
}

/// Destination database settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the discrete settings.
    pub url: Option<SecretString>,
    pub host: String,
    pub port: u16,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<SecretString>,
    pub schema: String,
    pub table: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

impl DatabaseConfig {
    /// Builds connection options.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` cannot be parsed.
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        if let Some(url) = &self.url {
            return PgConnectOptions::from_str(url.expose_secret()).map_err(|e| {
                ConfigError::InvalidValue {
                    var: "DATABASE_URL".to_string(),
                    message: e.to_string(),
                }
            });
        }

        let mut options = PgConnectOptions::new().host(&self.host).port(self.port);
        if let Some(name) = &self.name {
            options = options.database(name);
        }
        if let Some(user) = &self.user {
            options = options.username(user);
        }
        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }
        Ok(options)
    }
}

/// Completion notification settings.
#[derive(Debug, Clone, Default)]
pub struct NotifyConfig {
    /// Webhook receiving the completion summary; logs only when unset.
    pub webhook_url: Option<String>,
    /// Recipients named in the notification payload.
    pub recipients: Vec<String>,
}

/// Full run configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub markets: Vec<String>,
    pub api: ApiConfig,
    pub api_user: String,
    pub api_password: SecretString,
    pub database: DatabaseConfig,
    pub reconcile: ReconcileConfig,
    /// Directory receiving the backup and report artifacts.
    pub base_dir: PathBuf,
    pub city_mapping_file: PathBuf,
    pub notify: NotifyConfig,
    pub log_filter: String,
    pub log_format: LogFormat,
    /// Exit non-zero when reconciliation partially failed.
    pub fail_on_partial: bool,
}

impl AppConfig {
    /// Loads configuration from the process environment, after reading `.env`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through a variable lookup function.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        let markets = split_list(&var("MARKETS_TO_PROCESS").unwrap_or_else(|| DEFAULT_MARKETS.to_string()));
        if markets.is_empty() {
            return Err(ConfigError::InvalidValue {
                var: "MARKETS_TO_PROCESS".to_string(),
                message: "at least one market is required".to_string(),
            });
        }

        let mut api = ApiConfig::new(required("API_BASE_URL")?);
        if let Some(statuses) = var("ORDER_STATUSES") {
            api.statuses = split_list(&statuses);
        }
        if let Some(limit) = parse_var(&var, "SEARCH_LIMIT")? {
            api.search_limit = limit;
        }
        if let Some(pages) = parse_var(&var, "MAX_PAGES_PER_STATUS")? {
            api.max_pages_per_status = pages;
        }
        if let Some(timeout) = parse_var(&var, "API_TIMEOUT_SECS")? {
            api.timeout_secs = timeout;
        }
        if let Some(version) = var("PIPELINE_VERSION") {
            api.source_version = version;
        }
        api.validate().map_err(|e| ConfigError::InvalidValue {
            var: "API_BASE_URL".to_string(),
            message: e.to_string(),
        })?;

        let database = DatabaseConfig {
            url: var("DATABASE_URL").map(SecretString::from),
            host: var("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_var(&var, "DB_PORT")?.unwrap_or(5432),
            name: var("DB_NAME"),
            user: var("DB_USER"),
            password: var("DB_PASS").map(SecretString::from),
            schema: var("DB_SCHEMA").unwrap_or_else(|| "public".to_string()),
            table: var("DB_TABLE").unwrap_or_else(|| "fact_sales_orders".to_string()),
            max_connections: parse_var(&var, "DB_MAX_CONNECTIONS")?.unwrap_or(5),
            connect_timeout: Duration::from_secs(
                parse_var(&var, "DB_CONNECT_TIMEOUT_SECS")?.unwrap_or(30),
            ),
        };
        if database.url.is_none() && database.name.is_none() {
            return Err(ConfigError::MissingVar("DATABASE_URL or DB_NAME".to_string()));
        }

        let mut reconcile = ReconcileConfig::default();
        if let Some(size) = parse_var(&var, "RECONCILE_BATCH_SIZE")? {
            reconcile.batch_size = size;
        }
        if let Some(rows) = parse_var(&var, "INSERT_CHUNK_ROWS")? {
            reconcile.insert_chunk_rows = rows;
        }
        if let Some(policy) = var("UNKNOWN_COLUMN_POLICY") {
            reconcile.unknown_columns =
                policy
                    .parse::<UnknownColumnPolicy>()
                    .map_err(|e| ConfigError::InvalidValue {
                        var: "UNKNOWN_COLUMN_POLICY".to_string(),
                        message: e.to_string(),
                    })?;
        }
        reconcile.validate().map_err(|e| ConfigError::InvalidValue {
            var: "RECONCILE_BATCH_SIZE".to_string(),
            message: e.to_string(),
        })?;

        let base_dir = PathBuf::from(var("BASE_DIR").unwrap_or_else(|| "./data_output".to_string()));
        let city_mapping_file = var("CITY_MAPPING_FILE")
            .map_or_else(|| base_dir.join("address_metadata.json"), PathBuf::from);

        let log_format = match var("LOG_FORMAT") {
            Some(v) => v.parse().map_err(|message| ConfigError::InvalidValue {
                var: "LOG_FORMAT".to_string(),
                message,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            markets,
            api,
            api_user: required("API_USER")?,
            api_password: SecretString::from(required("API_PASS")?),
            database,
            reconcile,
            base_dir,
            city_mapping_file,
            notify: NotifyConfig {
                webhook_url: var("NOTIFY_WEBHOOK_URL"),
                recipients: var("NOTIFY_RECIPIENTS").map(|v| split_list(&v)).unwrap_or_default(),
            },
            log_filter: var("LOG_LEVEL").unwrap_or_else(|| "info,ordersync=debug".to_string()),
            log_format,
            fail_on_partial: parse_bool(var("FAIL_ON_PARTIAL").as_deref()),
        })
    }

    /// API login credentials.
    #[must_use]
    pub fn api_credentials(&self) -> ApiCredentials {
        ApiCredentials {
            username: self.api_user.clone(),
            password: self.api_password.clone(),
        }
    }
}

/// Splits a comma-separated list, trimming blanks.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
}

fn parse_var<T, F>(var: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|v| {
            v.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                var: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("API_BASE_URL", "https://orders.example.com/ccadmin/v1"),
            ("API_USER", "svc"),
            ("API_PASS", "secret"),
            ("DATABASE_URL", "postgres://etl:pw@localhost/warehouse"),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&minimal())).unwrap();
        assert_eq!(config.markets, vec!["region_a", "region_b", "region_c"]);
        assert_eq!(config.database.table, "fact_sales_orders");
        assert_eq!(config.reconcile.batch_size, 1000);
        assert_eq!(
            config.city_mapping_file,
            PathBuf::from("./data_output").join("address_metadata.json")
        );
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(!config.fail_on_partial);
        assert!(config.notify.webhook_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let mut pairs = minimal();
        pairs.extend([
            ("MARKETS_TO_PROCESS", " north , south ,"),
            ("ORDER_STATUSES", "APPROVED,FAILED"),
            ("RECONCILE_BATCH_SIZE", "250"),
            ("UNKNOWN_COLUMN_POLICY", "reject"),
            ("BASE_DIR", "/var/lib/ordersync"),
            ("FAIL_ON_PARTIAL", "true"),
            ("LOG_FORMAT", "pretty"),
        ]);
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.markets, vec!["north", "south"]);
        assert_eq!(config.api.statuses, vec!["APPROVED", "FAILED"]);
        assert_eq!(config.reconcile.batch_size, 250);
        assert_eq!(config.reconcile.unknown_columns, UnknownColumnPolicy::Reject);
        assert_eq!(
            config.city_mapping_file,
            PathBuf::from("/var/lib/ordersync/address_metadata.json")
        );
        assert!(config.fail_on_partial);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_missing_required_var() {
        let pairs: Vec<_> = minimal()
            .into_iter()
            .filter(|(k, _)| *k != "API_PASS")
            .collect();
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "API_PASS"));
    }

    #[test]
    fn test_invalid_batch_size() {
        let mut pairs = minimal();
        pairs.push(("RECONCILE_BATCH_SIZE", "lots"));
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref var, .. } if var == "RECONCILE_BATCH_SIZE"));
    }

    #[test]
    fn test_discrete_database_settings() {
        let pairs = vec![
            ("API_BASE_URL", "https://orders.example.com"),
            ("API_USER", "svc"),
            ("API_PASS", "secret"),
            ("DB_HOST", "db.internal"),
            ("DB_NAME", "warehouse"),
            ("DB_USER", "etl"),
            ("DB_PASS", "pw"),
        ];
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        let options = config.database.connect_options().unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_database(), Some("warehouse"));
    }

    #[test]
    fn test_database_required() {
        let pairs: Vec<_> = minimal()
            .into_iter()
            .filter(|(k, _)| *k != "DATABASE_URL")
            .collect();
        assert!(AppConfig::from_lookup(lookup(&pairs)).is_err());
    }
}
