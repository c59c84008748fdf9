use crate::error::FetchError;
use crate::models::PriceRecord;
use chrono::{Days, NaiveDate};
use std::time::Duration;
use tracing::{debug, trace};

/// A provider of daily price history.
#[allow(async_fn_in_trait)]
pub trait PriceSource {
    /// Daily bars for `symbol` from `start`, up to `end` inclusive (or the latest available).
    async fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceRecord>, FetchError>;
}

/// Requested date range. An open `end` means "through today".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

/// What to do for one symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Plan {
    Fetch(Window),
    /// Nothing left to fetch: the watermark covers the window, or the window is empty.
    UpToDate,
}

/// Where fetching should begin, given the requested start and the stored watermark.
///
/// A watermark on or after the requested start resumes the day after it; otherwise the
/// requested start stands. `None` only when the watermark is the last representable date.
///
/// ```rust
/// use chrono::NaiveDate;
/// use screen_spider::stock::fetch::effective_start;
///
/// let day = |d| NaiveDate::from_ymd_opt(2025, 1, d).unwrap();
/// assert_eq!(effective_start(day(1), Some(day(10))), Some(day(11)));
/// assert_eq!(effective_start(day(12), Some(day(10))), Some(day(12)));
/// assert_eq!(effective_start(day(1), None), Some(day(1)));
/// ```
pub fn effective_start(requested: NaiveDate, watermark: Option<NaiveDate>) -> Option<NaiveDate> {
    match watermark {
        Some(watermark) if watermark >= requested => watermark.checked_add_days(Days::new(1)),
        _ => Some(requested),
    }
}

/// Plan the fetch for one symbol against `today`.
pub fn plan(requested: Window, watermark: Option<NaiveDate>, today: NaiveDate) -> Plan {
    let end = requested.end.unwrap_or(today);
    match effective_start(requested.start, watermark) {
        Some(start) if start <= end => Plan::Fetch(Window {
            start,
            end: requested.end,
        }),
        _ => Plan::UpToDate,
    }
}

/// The date a loaded batch lets the watermark advance to.
///
/// That is the batch's latest date, except on an open-ended run where a bar for `today` (or
/// later) is still intraday: the watermark then stops at yesterday so the next run fetches the
/// final bar again. `None` for an empty batch.
pub fn settled_through(
    prices: &[PriceRecord],
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let latest = prices.iter().map(|p| p.report_date).max()?;
    match end {
        None if latest >= today => today.checked_sub_days(Days::new(1)),
        _ => Some(latest),
    }
}

/// Result of fetching one symbol; never an `Err`, so one symbol cannot stop the batch.
#[derive(Debug)]
pub enum FetchOutcome {
    Rows(Vec<PriceRecord>),
    /// The provider answered, but had nothing in the window.
    NoData,
    Failed(FetchError),
}

/// Runs [`PriceSource`] requests with a deadline and trims answers to the asked window.
pub struct Fetcher<'a, P> {
    source: &'a P,
    timeout: Duration,
}

impl<'a, P: PriceSource> Fetcher<'a, P> {
    pub fn new(source: &'a P, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    pub async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> FetchOutcome {
        trace!("requesting {symbol} prices from {start} to {end:?}");
        let rows = match tokio::time::timeout(self.timeout, self.source.history(symbol, start, end))
            .await
        {
            Ok(Ok(rows)) => rows,
            Ok(Err(err)) => return FetchOutcome::Failed(err),
            Err(_) => return FetchOutcome::Failed(FetchError::Timeout(self.timeout)),
        };

        let received = rows.len();
        let rows: Vec<PriceRecord> = rows
            .into_iter()
            .filter(|row| row.report_date >= start && end.map_or(true, |end| row.report_date <= end))
            .collect();
        if rows.len() < received {
            debug!(
                "dropped {} {symbol} rows outside {start}..{end:?}",
                received - rows.len()
            );
        }

        if rows.is_empty() {
            FetchOutcome::NoData
        } else {
            FetchOutcome::Rows(rows)
        }
    }
}
