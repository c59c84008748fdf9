use crate::config::Config;
use crate::error::DownloadError;
use crate::http::*;
use crate::models::ReportKind;
use crate::tui::Progress;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// One report export to download.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportRequest {
    pub screen: u32,
    pub kind: ReportKind,
    /// `None` asks for the latest report.
    pub date: Option<NaiveDate>,
    /// Trend reports only: restrict to symbols trending on `date`.
    pub must_trend_on_date: bool,
}

/// Endpoint for a request, relative to `base` (e.g. `https://ridewinners.com`).
pub fn report_url(base: &str, request: &ReportRequest) -> String {
    let screen = request.screen;
    match (request.kind, request.date) {
        (ReportKind::Detail, None) => {
            format!("{base}/api/v1/screens/{screen}/latest/details?format=csv")
        }
        (ReportKind::Detail, Some(date)) => {
            format!("{base}/api/v1/screens/{screen}/details?date={date}&format=csv")
        }
        (ReportKind::Trend, date) => {
            let date = date.map(|d| d.to_string()).unwrap_or_else(|| "latest".into());
            format!(
                "{base}/api/v1/screens/{screen}/trend?format=csv&date={date}&mustTrendOnDate={}",
                request.must_trend_on_date
            )
        }
    }
}

/// JSON body sent with every export request.
pub fn payload(kind: ReportKind) -> serde_json::Value {
    match kind {
        ReportKind::Detail => serde_json::json!({
            "filters": {},
            "sortBy": "sector",
            "isAscOrder": true,
        }),
        ReportKind::Trend => serde_json::json!({
            "filters": {},
            "sortBy": "trending_days",
            "isAscOrder": false,
        }),
    }
}

/// Where a downloaded report lands: `<data_dir>/screen_<kind>/<id>/screen<id>_<kind>_<date>.csv`.
///
/// The name carries the kind marker and trailing date that the loader classifies on.
pub fn report_path(data_dir: &Path, screen: u32, kind: ReportKind, date: NaiveDate) -> PathBuf {
    data_dir
        .join(format!("screen_{kind}"))
        .join(screen.to_string())
        .join(format!("screen{screen}_{kind}_{date}.csv"))
}

/// Every Friday from `start` (inclusive) through `today`.
pub fn fridays_between(start: NaiveDate, today: NaiveDate) -> Vec<NaiveDate> {
    let offset = (7 + Weekday::Fri.num_days_from_monday() - start.weekday().num_days_from_monday()) % 7;
    let Some(mut day) = start.checked_add_days(Days::new(offset as u64)) else {
        return vec![];
    };

    let mut fridays = Vec::new();
    while day <= today {
        fridays.push(day);
        match day.checked_add_days(Days::new(7)) {
            Some(next) => day = next,
            None => break,
        }
    }
    fridays
}

fn headers(config: &Config, request: &ReportRequest) -> Result<HeaderMap, DownloadError> {
    let token = config.api_token.as_deref().ok_or(DownloadError::MissingToken)?;
    let date = request
        .date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "latest".into());
    let page = match request.kind {
        ReportKind::Detail => "details",
        ReportKind::Trend => "trend",
    };
    let referer = format!(
        "{}/screen/{}/{date}/{page}",
        config.report_base_url, request.screen
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(token).map_err(|_| DownloadError::InvalidToken)?,
    );
    headers.insert(
        "accept",
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    if let Ok(origin) = HeaderValue::from_str(&config.report_base_url) {
        headers.insert("origin", origin);
    }
    if let Ok(referer) = HeaderValue::from_str(&referer) {
        headers.insert("referer", referer);
    }
    Ok(headers)
}

/// Download one report and write it under the data directory.
///
/// A latest report is filed under `today`. Returns the written path.
pub async fn download_report(
    http_client: &HttpClient,
    config: &Config,
    request: &ReportRequest,
    today: NaiveDate,
) -> Result<PathBuf, DownloadError> {
    let url = report_url(&config.report_base_url, request);
    debug!("downloading {} report for screen {} from {url}", request.kind, request.screen);

    let response = http_client
        .post(&url)
        .headers(headers(config, request)?)
        .json(&payload(request.kind))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DownloadError::Status { status, body });
    }

    let bytes = response.bytes().await?;
    let path = report_path(
        &config.data_dir,
        request.screen,
        request.kind,
        request.date.unwrap_or(today),
    );
    crate::fs::write_file(&path, &bytes).await?;

    info!("{} report downloaded to {}", request.kind, path.display());
    Ok(path)
}

/// Outcome counts of a [`backfill`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: Vec<PathBuf>,
    pub failed: Vec<NaiveDate>,
}

/// Download a report for every Friday from `from` through `today`, or just the latest one.
///
/// Each failed date is logged and skipped.
#[allow(clippy::too_many_arguments)]
pub async fn backfill(
    http_client: &HttpClient,
    config: &Config,
    screen: u32,
    kind: ReportKind,
    from: Option<NaiveDate>,
    must_trend_on_date: bool,
    today: NaiveDate,
    tui: bool,
) -> Result<DownloadSummary, DownloadError> {
    let token = config.api_token.as_deref().ok_or(DownloadError::MissingToken)?;
    HeaderValue::from_str(token).map_err(|_| DownloadError::InvalidToken)?;

    let dates: Vec<Option<NaiveDate>> = match from {
        Some(from) => fridays_between(from, today).into_iter().map(Some).collect(),
        None => vec![None],
    };

    let time = std::time::Instant::now();
    let progress = Progress::new(dates.len(), "reports", tui);
    let mut summary = DownloadSummary::default();
    for date in dates {
        let request = ReportRequest {
            screen,
            kind,
            date,
            must_trend_on_date,
        };
        match download_report(http_client, config, &request, today).await {
            Ok(path) => {
                summary.downloaded.push(path);
                progress.succeed();
            }
            Err(err) => {
                let date = date.unwrap_or(today);
                error!("failed to download {kind} report for screen {screen} on {date}, error({err})");
                summary.failed.push(date);
                progress.fail();
            }
        }
    }
    progress.finish();

    info!(
        "{} {kind} reports downloaded for screen {screen}, {} failed. {}",
        summary.downloaded.len(),
        summary.failed.len(),
        crate::time_elapsed(time)
    );
    Ok(summary)
}
