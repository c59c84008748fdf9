use crate::error::ConfigError;
use deadpool_postgres::{ManagerConfig, Pool, RecyclingMethod};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, trace};

const DEFAULT_SCHEMA: &str = "public";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_SYMBOL_SUFFIX: &str = ".NS";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REPORT_BASE_URL: &str = "https://ridewinners.com";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36";

/// Everything the pipelines read from the outside world, resolved once at start-up.
///
/// | variable               | default                    |
/// |------------------------|----------------------------|
/// | `DB_URL`               | unset (needed by database) |
/// | `DB_SCHEMA`            | `public`                   |
/// | `API_TOKEN`            | unset (needed by download) |
/// | `DATA_DIR`             | `data`                     |
/// | `SYMBOL_SUFFIX`        | `.NS`                      |
/// | `REQUEST_TIMEOUT_SECS` | `30`                       |
/// | `USER_AGENT`           | a desktop browser string   |
/// | `REPORT_BASE_URL`      | `https://ridewinners.com`  |
#[derive(Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub schema: String,
    pub api_token: Option<String>,
    pub data_dir: PathBuf,
    pub symbol_suffix: String,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub report_base_url: String,
}

impl Config {
    /// Read the configuration from the process environment (and `.env`, if loaded).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| dotenv::var(name).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let schema = var("DB_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.to_string());
        if !schema
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::InvalidSchema(schema));
        }

        let request_timeout = match var("REQUEST_TIMEOUT_SECS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "REQUEST_TIMEOUT_SECS",
                        value,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            database_url: var("DB_URL"),
            schema,
            api_token: var("API_TOKEN"),
            data_dir: PathBuf::from(var("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.into())),
            symbol_suffix: var("SYMBOL_SUFFIX").unwrap_or_else(|| DEFAULT_SYMBOL_SUFFIX.into()),
            request_timeout,
            user_agent: var("USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.into()),
            report_base_url: var("REPORT_BASE_URL")
                .unwrap_or_else(|| DEFAULT_REPORT_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Create the PostgreSQL connection pool, pinning `search_path` to the configured schema.
    ///
    /// Fails when `DB_URL` is unset.
    pub fn pool(&self) -> anyhow::Result<Pool> {
        let url = self
            .database_url
            .clone()
            .ok_or(ConfigError::Missing("DB_URL"))?;

        trace!("creating postgres connection pool config");
        let mut pg_config = deadpool_postgres::Config::new();
        pg_config.url = Some(url);
        pg_config.options = Some(format!("-csearch_path={}", self.schema));
        pg_config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = pg_config.create_pool(
            Some(deadpool_postgres::Runtime::Tokio1),
            tokio_postgres::NoTls,
        )?;
        debug!("connection pool established for schema {}", self.schema);

        Ok(pool)
    }
}

// the token stays out of logs
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("schema", &self.schema)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("data_dir", &self.data_dir)
            .field("symbol_suffix", &self.symbol_suffix)
            .field("request_timeout", &self.request_timeout)
            .field("report_base_url", &self.report_base_url)
            .finish_non_exhaustive()
    }
}
