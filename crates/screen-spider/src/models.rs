use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// The two report exports produced by the screener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReportKind {
    Detail,
    Trend,
}

impl ReportKind {
    /// Marker found in the filename, and the path segment used by the download endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Detail => "detail",
            ReportKind::Trend => "trend",
        }
    }

    /// Destination table.
    pub fn table(&self) -> &'static str {
        match self {
            ReportKind::Detail => "screen5_detail",
            ReportKind::Trend => "screen5_trend",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a detail report.
#[derive(Clone, Debug, PartialEq)]
pub struct DetailRecord {
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    pub symbol: String,
    pub isin: Option<String>,
    pub weighted_rpi: Option<f64>,
    pub high_52wk_weighted_rpi: Option<f64>,
    pub latest_price: Option<f64>,
    pub high_52wk: Option<f64>,
    pub ema_9: Option<f64>,
    pub ema_21: Option<f64>,
    pub adx_14: Option<f64>,
    pub rsi_14: Option<f64>,
    pub rpi_2_week: Option<f64>,
    pub rpi_3_month: Option<f64>,
    pub rpi_6_month: Option<f64>,
    pub sma_2wk_of_6m_rpi: Option<f64>,
    pub report_date: NaiveDate,
}

/// One row of a trend report.
///
/// `days[0]` is the most recent trading day in the report, `days[1]` the one before, and so on.
#[derive(Clone, Debug, PartialEq)]
pub struct TrendRecord {
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    pub symbol: String,
    pub isin: Option<String>,
    pub high_52wk: Option<f64>,
    pub trending_days: Option<i32>,
    pub days: Vec<Option<f64>>,
    pub weighted_rpi: Option<f64>,
    pub adx_14: Option<f64>,
    pub rsi_14: Option<f64>,
    pub report_date: NaiveDate,
}

/// A parsed report, ready to be loaded.
#[derive(Clone, Debug, PartialEq)]
pub enum Report {
    Detail(Vec<DetailRecord>),
    Trend(Vec<TrendRecord>),
}

impl Report {
    pub fn kind(&self) -> ReportKind {
        match self {
            Report::Detail(_) => ReportKind::Detail,
            Report::Trend(_) => ReportKind::Trend,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Report::Detail(rows) => rows.len(),
            Report::Trend(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A daily price bar. `price` is the close.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PriceRecord {
    pub report_date: NaiveDate,
    pub symbol: String,
    pub price: f64,
    pub open: Option<f64>,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub volume: Option<i64>,
}

/// A report file that has been loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessedFile {
    pub filename: String,
    pub processed_at: NaiveDateTime,
}

/// The last day of prices loaded for a symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolWatermark {
    pub symbol: String,
    pub last_processed_at: NaiveDate,
}

/// Symbols seen in the trend reports, and the earliest report date among them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Universe {
    pub symbols: Vec<String>,
    pub earliest: Option<NaiveDate>,
}
