use std::time::Duration;
use thiserror::Error;

/// Problems reading the process configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} has an invalid value \"{value}\"")]
    Invalid { name: &'static str, value: String },

    #[error("schema name \"{0}\" must only contain ASCII letters, digits or underscores")]
    InvalidSchema(String),
}

/// A report filename that does not carry a usable `_YYYY-MM-DD.csv` suffix.
#[derive(Debug, Error)]
pub enum FilenameError {
    #[error("{0} has no trailing date segment")]
    MissingDate(String),

    #[error("{filename} has an unparseable date segment \"{segment}\", error({source})")]
    InvalidDate {
        filename: String,
        segment: String,
        source: chrono::ParseError,
    },
}

/// File-level failures while turning a CSV report into typed records.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to read report, error({0})")]
    Io(#[from] std::io::Error),

    #[error("failed to parse CSV, error({0})")]
    Csv(#[from] csv::Error),

    #[error("report has no \"{0}\" column")]
    MissingColumn(&'static str),
}

/// Failures while requesting price history for a single symbol.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed, error({0})")]
    Http(#[from] reqwest::Error),

    #[error("provider responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("provider reported an error: {0}")]
    Provider(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures while downloading a screener report.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("API_TOKEN is required to download reports")]
    MissingToken,

    #[error("API_TOKEN is not a valid header value")]
    InvalidToken,

    #[error("request failed, error({0})")]
    Http(#[from] reqwest::Error),

    #[error("endpoint responded with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to write report, error({0})")]
    Io(#[from] std::io::Error),
}
