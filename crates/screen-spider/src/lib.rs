pub mod config;
pub mod error;
pub mod fs;
pub mod models;
pub mod screen;
pub mod stock;
pub mod watermark;

mod load;
mod sql;
mod tui;

pub use config::Config;

/// Shortcut for required API elements.
pub(crate) mod http {
    pub(crate) use reqwest::header::{HeaderMap, HeaderValue};
    pub(crate) use reqwest::Client as HttpClient;
    pub(crate) use reqwest::ClientBuilder;
}

/// HTTP client shared by the report and price fetchers: configured user agent and request
/// timeout.
pub fn std_client_build(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    http::ClientBuilder::new()
        .user_agent(&config.user_agent)
        .timeout(config.request_timeout)
        .build()
}

/// Table/schema DDL; safe to run repeatedly.
pub async fn create_tables(pool: &deadpool_postgres::Pool) -> anyhow::Result<()> {
    watermark::PgStore::new(pool.clone()).create_tables().await
}

pub(crate) fn time_elapsed(time: std::time::Instant) -> String {
    format!("Time elapsed: {:.2?}", time.elapsed())
}
