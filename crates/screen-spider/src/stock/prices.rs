use super::fetch::{plan, settled_through, FetchOutcome, Fetcher, Plan, PriceSource, Window};
use crate::config::Config;
use crate::models::PriceRecord;
use crate::tui::Progress;
use crate::watermark::Store;
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Which symbols and dates a price run covers.
#[derive(Clone, Debug)]
pub struct PriceRequest {
    /// Explicit symbols; otherwise every symbol in the trend reports.
    pub symbols: Option<Vec<String>>,
    /// Explicit start; otherwise the earliest trend report date.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub today: NaiveDate,
    pub now: NaiveDateTime,
}

impl PriceRequest {
    pub fn new(
        symbols: Option<Vec<String>>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Self {
        let now = Local::now().naive_local();
        Self {
            symbols,
            start,
            end,
            today: now.date(),
            now,
        }
    }
}

/// Per-symbol outcomes of a price run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PriceSummary {
    pub symbols: usize,
    pub up_to_date: usize,
    /// Watermark could not be read.
    pub read_failed: usize,
    pub no_data: usize,
    pub fetch_failed: usize,
    pub loaded: usize,
    pub load_failed: usize,
    pub rows: u64,
    pub snapshot: Option<PathBuf>,
}

/// Fetch each symbol's missing prices and load them, advancing watermarks.
///
/// Symbols run one after the other. A symbol whose watermark cannot be read, or whose fetch
/// fails, times out or comes back empty, is logged and skipped. On an open-ended run the
/// watermark never covers today, whose bar may still be intraday. Fetched rows are snapshotted to CSV before any database write; each
/// symbol then loads in its own transaction. Only a run where nothing at all was fetched stops
/// early, without writing.
pub async fn run<S, P>(
    store: &mut S,
    source: &P,
    config: &Config,
    request: PriceRequest,
    tui: bool,
) -> anyhow::Result<PriceSummary>
where
    S: Store,
    P: PriceSource,
{
    let time = std::time::Instant::now();

    let universe = store.universe().await?;
    let symbols = match request.symbols {
        Some(symbols) => symbols.into_iter().map(|s| s.trim().to_uppercase()).collect(),
        None => universe.symbols,
    };
    let Some(start) = request.start.or(universe.earliest) else {
        warn!("no start date given and no trend reports loaded; nothing to fetch");
        return Ok(PriceSummary::default());
    };
    let window = Window {
        start,
        end: request.end,
    };

    info!(
        "fetching stock prices for {} symbols since {start}",
        symbols.len()
    );
    let mut summary = PriceSummary {
        symbols: symbols.len(),
        ..Default::default()
    };

    // 1. fetch
    let fetcher = Fetcher::new(source, config.request_timeout);
    let progress = Progress::new(symbols.len(), "prices", tui);
    let mut batches: Vec<(String, Vec<PriceRecord>)> = Vec::new();
    for symbol in symbols {
        let watermark = match store.get_watermark(&symbol).await {
            Ok(watermark) => watermark,
            Err(err) => {
                error!("failed to read watermark for {symbol}, error({err})");
                summary.read_failed += 1;
                progress.fail();
                continue;
            }
        };
        let window = match plan(window, watermark, request.today) {
            Plan::Fetch(window) => window,
            Plan::UpToDate => {
                info!("{symbol} is up to date (last processed {watermark:?})");
                summary.up_to_date += 1;
                progress.skip();
                continue;
            }
        };

        info!(
            "fetching stock prices for symbol: {symbol} and start date: {}",
            window.start
        );
        match fetcher.fetch(&symbol, window.start, window.end).await {
            FetchOutcome::Rows(rows) => {
                info!("{} price rows fetched for {symbol}", rows.len());
                batches.push((symbol, rows));
                progress.succeed();
            }
            FetchOutcome::NoData => {
                warn!("no data found for symbol {symbol} on or after {}", window.start);
                summary.no_data += 1;
                progress.skip();
            }
            FetchOutcome::Failed(err) => {
                warn!("failed to fetch prices for {symbol}, skipping, error({err})");
                summary.fetch_failed += 1;
                progress.fail();
            }
        }
    }
    progress.finish();

    if batches.is_empty() {
        if summary.up_to_date == summary.symbols {
            info!("all {} symbols are up to date; nothing written", summary.symbols);
        } else {
            error!("no stock prices data available; nothing written");
        }
        return Ok(summary);
    }

    // 2. snapshot, so the fetched data survives a failed load
    let all: Vec<PriceRecord> = batches
        .iter()
        .flat_map(|(_, rows)| rows.iter().cloned())
        .collect();
    match crate::fs::write_price_snapshot(&config.data_dir, &all, request.now).await {
        Ok(path) => {
            info!("{} price rows saved to {}", all.len(), path.display());
            summary.snapshot = Some(path);
        }
        Err(err) => error!("failed to write price snapshot, continuing without it, error({err})"),
    }

    // 3. load, one transaction per symbol
    let progress = Progress::new(batches.len(), "loading", tui);
    for (symbol, rows) in &batches {
        let Some(through) = settled_through(rows, request.end, request.today) else {
            progress.skip();
            continue;
        };
        match store.load_prices(symbol, rows, through).await {
            Ok(load) => {
                info!(
                    "{} price rows loaded for {symbol}, last processed {} (advanced: {})",
                    load.rows, load.through, load.advanced
                );
                summary.loaded += 1;
                summary.rows += load.rows;
                progress.succeed();
            }
            Err(err) => {
                error!(
                    "failed to load prices for {symbol}, replay from {:?}, error({err})",
                    summary.snapshot
                );
                summary.load_failed += 1;
                progress.fail();
            }
        }
    }
    progress.finish();

    info!(
        "processed {} symbols with data since {start}: {} loaded, {} failed, {} without data, \
        {} up to date, {} fetch failures, {} unreadable watermarks. {}",
        summary.symbols,
        summary.loaded,
        summary.load_failed,
        summary.no_data,
        summary.up_to_date,
        summary.fetch_failed,
        summary.read_failed,
        crate::time_elapsed(time)
    );

    Ok(summary)
}
