use super::fetch::PriceSource;
use crate::error::FetchError;
use crate::http::*;
use crate::models::PriceRecord;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{trace, warn};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Daily bars from the Yahoo Finance chart API.
///
/// Symbols are stored without their exchange suffix; `suffix` (e.g. `.NS`) is appended only on
/// the request.
pub struct YahooFinance {
    http_client: HttpClient,
    suffix: String,
}

impl YahooFinance {
    pub fn new(http_client: HttpClient, suffix: impl Into<String>) -> Self {
        Self {
            http_client,
            suffix: suffix.into(),
        }
    }

    fn url(&self, symbol: &str, start: NaiveDate, end: Option<NaiveDate>) -> String {
        let period1 = midnight_timestamp(start);
        // period2 is exclusive, so ask through the start of the following day
        let period2 = end
            .and_then(|end| end.checked_add_days(Days::new(1)))
            .map(midnight_timestamp)
            .unwrap_or_else(|| Utc::now().timestamp());
        format!(
            "{CHART_URL}/{symbol}{suffix}?period1={period1}&period2={period2}&interval=1d",
            suffix = self.suffix
        )
    }
}

impl PriceSource for YahooFinance {
    async fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceRecord>, FetchError> {
        let url = self.url(symbol, start, end);
        trace!("fetching Yahoo Finance prices for [{symbol}] from {url}");

        let response = self.http_client.get(url).send().await?;
        let status = response.status();

        // the chart API answers 404 with a JSON body for unknown symbols / empty ranges
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::Status(status));
        }

        let price_response: PriceResponse = response.json().await?;
        price_response.into_prices(symbol)
    }
}

fn midnight_timestamp(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
}

// de
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct PriceResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Meta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

// bars the exchange did not report come back as nulls
#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

impl PriceResponse {
    /// Turn the chart payload into bars dated in exchange-local time.
    ///
    /// Timestamps without a close are dropped; an empty or missing result is `Ok(vec![])`.
    pub(crate) fn into_prices(self, symbol: &str) -> Result<Vec<PriceRecord>, FetchError> {
        let results = match (self.chart.result, self.chart.error) {
            (Some(results), _) => results,
            (None, Some(err)) if err.code == "Not Found" => return Ok(vec![]),
            (None, Some(err)) => {
                return Err(FetchError::Provider(format!(
                    "{}: {}",
                    err.code,
                    err.description.unwrap_or_default()
                )))
            }
            (None, None) => return Ok(vec![]),
        };

        let Some(base) = results.into_iter().next() else {
            return Ok(vec![]);
        };
        let offset = base.meta.gmtoffset;
        let quote = base.indicators.quote.into_iter().next().unwrap_or_default();

        let mut prices = Vec::with_capacity(base.timestamp.len());
        for (i, timestamp) in base.timestamp.iter().enumerate() {
            let Some(close) = quote.close.get(i).copied().flatten() else {
                continue;
            };
            let Some(time) = DateTime::from_timestamp(timestamp + offset, 0) else {
                warn!("invalid timestamp {timestamp} in Yahoo Finance prices for [{symbol}]");
                continue;
            };

            prices.push(PriceRecord {
                report_date: time.date_naive(),
                symbol: symbol.to_string(),
                price: close,
                open: quote.open.get(i).copied().flatten(),
                low: quote.low.get(i).copied().flatten(),
                high: quote.high.get(i).copied().flatten(),
                volume: quote.volume.get(i).copied().flatten(),
            });
        }

        // an intraday bar for today can share a date with the last daily bar; keep the later one
        prices.dedup_by(|later, earlier| {
            if later.report_date == earlier.report_date {
                std::mem::swap(later, earlier);
                true
            } else {
                false
            }
        });

        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // 2025-01-02 and 2025-01-03 03:45 UTC (09:15 IST), then a null bar
    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "symbol": "AAA.NS", "gmtoffset": 19800 },
                "timestamp": [1735789500, 1735875900, 1735962300],
                "indicators": {
                    "quote": [{
                        "open":   [10.0, 11.0, null],
                        "high":   [10.5, 11.5, null],
                        "low":    [9.5, 10.5, null],
                        "close":  [10.2, 11.2, null],
                        "volume": [1000, 2000, null]
                    }],
                    "adjclose": [{ "adjclose": [10.2, 11.2, null] }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn chart_payload_becomes_dated_bars() {
        let response: PriceResponse = serde_json::from_str(CHART).unwrap();
        let prices = response.into_prices("AAA").unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].report_date, date(2025, 1, 2));
        assert_eq!(prices[0].symbol, "AAA");
        assert_eq!(prices[0].price, 10.2);
        assert_eq!(prices[0].volume, Some(1000));
        assert_eq!(prices[1].report_date, date(2025, 1, 3));
        assert_eq!(prices[1].high, Some(11.5));
    }

    #[test]
    fn same_day_bars_keep_the_last() {
        let json = r#"{"chart": {"result": [{
            "timestamp": [1735789500, 1735800000],
            "indicators": {"quote": [{"close": [10.0, 10.7]}]}
        }], "error": null}}"#;
        let response: PriceResponse = serde_json::from_str(json).unwrap();
        let prices = response.into_prices("AAA").unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].price, 10.7);
    }

    #[test]
    fn unknown_symbol_is_empty_other_errors_fail() {
        let not_found = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let response: PriceResponse = serde_json::from_str(not_found).unwrap();
        assert!(response.into_prices("ZZZ").unwrap().is_empty());

        let bad = r#"{"chart": {"result": null, "error": {"code": "Bad Request", "description": "Invalid input"}}}"#;
        let response: PriceResponse = serde_json::from_str(bad).unwrap();
        assert!(matches!(
            response.into_prices("ZZZ"),
            Err(FetchError::Provider(_))
        ));
    }

    #[test]
    fn url_carries_suffix_and_exclusive_end() {
        let source = YahooFinance::new(HttpClient::new(), ".NS");
        let url = source.url("AAA", date(2025, 1, 11), Some(date(2025, 1, 15)));
        assert_eq!(
            url,
            "https://query1.finance.yahoo.com/v8/finance/chart/AAA.NS?period1=1736553600&period2=1736985600&interval=1d"
        );
    }
}
