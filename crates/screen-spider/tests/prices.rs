use chrono::{NaiveDate, NaiveDateTime};
use screen_spider::error::FetchError;
use screen_spider::models::{PriceRecord, Report, TrendRecord};
use screen_spider::stock::fetch::PriceSource;
use screen_spider::stock::prices::{self, PriceRequest};
use screen_spider::watermark::{MemoryStore, Store};
use screen_spider::Config;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
}

fn now() -> NaiveDateTime {
    day(16).and_hms_opt(18, 0, 0).unwrap()
}

fn bar(symbol: &str, d: u32) -> PriceRecord {
    PriceRecord {
        report_date: day(d),
        symbol: symbol.to_string(),
        price: 100.0 + d as f64,
        open: Some(100.0),
        low: Some(99.0),
        high: Some(110.0),
        volume: Some(1_000),
    }
}

fn config(data_dir: &Path) -> Config {
    let data_dir = data_dir.display().to_string();
    Config::from_lookup(|name| match name {
        "DB_URL" => Some("postgres://localhost/test".into()),
        "DATA_DIR" => Some(data_dir.clone()),
        _ => None,
    })
    .unwrap()
}

fn request(symbols: &[&str], start: Option<NaiveDate>, end: Option<NaiveDate>) -> PriceRequest {
    PriceRequest {
        symbols: (!symbols.is_empty()).then(|| symbols.iter().map(|s| s.to_string()).collect()),
        start,
        end,
        today: day(16),
        now: now(),
    }
}

/// Serves canned bars per symbol and records every request.
#[derive(Default)]
struct Stub {
    bars: HashMap<String, Vec<PriceRecord>>,
    failing: Vec<String>,
    requests: Mutex<Vec<(String, NaiveDate)>>,
}

impl Stub {
    fn with(mut self, symbol: &str, days: &[u32]) -> Self {
        self.bars.insert(
            symbol.to_string(),
            days.iter().map(|d| bar(symbol, *d)).collect(),
        );
        self
    }

    fn failing(mut self, symbol: &str) -> Self {
        self.failing.push(symbol.to_string());
        self
    }

    fn requested(&self) -> Vec<(String, NaiveDate)> {
        self.requests.lock().unwrap().clone()
    }
}

impl PriceSource for Stub {
    async fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        _end: Option<NaiveDate>,
    ) -> Result<Vec<PriceRecord>, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((symbol.to_string(), start));
        if self.failing.iter().any(|s| s == symbol) {
            return Err(FetchError::Provider("service unavailable".into()));
        }
        Ok(self.bars.get(symbol).cloned().unwrap_or_default())
    }
}

fn snapshots(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .filter(|name| name.starts_with("stock_prices_"))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn resumes_after_watermark_and_skips_empty_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::new();
    store.advance_watermark("AAA", day(10)).await.unwrap();

    let source = Stub::default()
        .with("AAA", &[9, 10, 13, 14, 15])
        .with("CCC", &[2, 3])
        .failing("DDD");

    let summary = prices::run(
        &mut store,
        &source,
        &config(dir.path()),
        request(&["AAA", "BBB", "CCC", "DDD"], Some(day(1)), Some(day(15))),
        false,
    )
    .await
    .unwrap();

    assert_eq!(
        source.requested(),
        [
            ("AAA".to_string(), day(11)),
            ("BBB".to_string(), day(1)),
            ("CCC".to_string(), day(1)),
            ("DDD".to_string(), day(1)),
        ]
    );
    assert_eq!(summary.loaded, 2);
    assert_eq!(summary.no_data, 1);
    assert_eq!(summary.fetch_failed, 1);
    assert_eq!(summary.rows, 5);

    // AAA only gains the bars after its watermark
    let aaa: Vec<NaiveDate> = store
        .prices()
        .filter(|p| p.symbol == "AAA")
        .map(|p| p.report_date)
        .collect();
    assert_eq!(aaa, [day(13), day(14), day(15)]);
    assert_eq!(store.get_watermark("AAA").await.unwrap(), Some(day(15)));
    assert_eq!(store.get_watermark("CCC").await.unwrap(), Some(day(3)));

    // nothing for the empty and the failing symbol
    assert!(store.prices().all(|p| p.symbol != "BBB" && p.symbol != "DDD"));
    assert_eq!(store.get_watermark("BBB").await.unwrap(), None);
    assert_eq!(store.get_watermark("DDD").await.unwrap(), None);

    // snapshot written with every fetched row
    let snapshot = summary.snapshot.unwrap();
    assert_eq!(
        snapshot.file_name().unwrap(),
        "stock_prices_20250116_180000.csv"
    );
    let text = std::fs::read_to_string(snapshot).unwrap();
    assert_eq!(text.lines().count(), 1 + 5);
}

#[tokio::test]
async fn rerun_fetches_from_the_day_after_the_last_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::new();
    let source = Stub::default().with("AAA", &[2, 3, 6]);

    for _ in 0..2 {
        prices::run(
            &mut store,
            &source,
            &config(dir.path()),
            request(&["AAA"], Some(day(1)), None),
            false,
        )
        .await
        .unwrap();
    }

    assert_eq!(
        source.requested(),
        [("AAA".to_string(), day(1)), ("AAA".to_string(), day(7))]
    );
    assert_eq!(store.prices().count(), 3);
    assert_eq!(store.get_watermark("AAA").await.unwrap(), Some(day(6)));
}

#[tokio::test]
async fn up_to_date_symbols_are_not_requested() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::new();
    store.advance_watermark("AAA", day(15)).await.unwrap();
    let source = Stub::default().with("AAA", &[15]);

    let summary = prices::run(
        &mut store,
        &source,
        &config(dir.path()),
        request(&["AAA"], Some(day(1)), Some(day(15))),
        false,
    )
    .await
    .unwrap();

    assert!(source.requested().is_empty());
    assert_eq!(summary.up_to_date, 1);
    assert_eq!(summary.up_to_date, summary.symbols);
    assert!(summary.snapshot.is_none());
    assert!(snapshots(dir.path()).is_empty());
}

#[tokio::test]
async fn unreadable_watermark_skips_only_that_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::new();
    store.fail_reads_for("BBB");
    let source = Stub::default()
        .with("AAA", &[13, 14])
        .with("BBB", &[13, 14])
        .with("CCC", &[13]);

    let summary = prices::run(
        &mut store,
        &source,
        &config(dir.path()),
        request(&["AAA", "BBB", "CCC"], Some(day(1)), Some(day(15))),
        false,
    )
    .await
    .unwrap();

    assert_eq!(summary.read_failed, 1);
    assert_eq!(summary.loaded, 2);
    assert_eq!(summary.rows, 3);
    assert_eq!(
        source.requested(),
        [("AAA".to_string(), day(1)), ("CCC".to_string(), day(1))]
    );
    assert_eq!(store.get_watermark("AAA").await.unwrap(), Some(day(14)));
    assert_eq!(store.get_watermark("CCC").await.unwrap(), Some(day(13)));
    assert!(store.prices().all(|p| p.symbol != "BBB"));

    let text = std::fs::read_to_string(summary.snapshot.unwrap()).unwrap();
    assert_eq!(text.lines().count(), 1 + 3);
}

#[tokio::test]
async fn todays_bar_is_fetched_again_on_the_next_open_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::new();
    let source = Stub::default().with("AAA", &[14, 15, 16]);

    for _ in 0..2 {
        let summary = prices::run(
            &mut store,
            &source,
            &config(dir.path()),
            request(&["AAA"], Some(day(1)), None),
            false,
        )
        .await
        .unwrap();
        assert_eq!(summary.loaded, 1);
    }

    // day 16 is today: stored, but the watermark waits for its final close
    assert_eq!(
        source.requested(),
        [("AAA".to_string(), day(1)), ("AAA".to_string(), day(16))]
    );
    assert_eq!(store.prices().count(), 3);
    assert_eq!(store.get_watermark("AAA").await.unwrap(), Some(day(15)));
}

#[tokio::test]
async fn explicit_end_settles_through_today() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::new();
    let source = Stub::default().with("AAA", &[15, 16]);

    prices::run(
        &mut store,
        &source,
        &config(dir.path()),
        request(&["AAA"], Some(day(1)), Some(day(16))),
        false,
    )
    .await
    .unwrap();

    assert_eq!(store.get_watermark("AAA").await.unwrap(), Some(day(16)));
}

#[tokio::test]
async fn no_data_anywhere_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::new();
    let source = Stub::default().failing("BBB");

    let summary = prices::run(
        &mut store,
        &source,
        &config(dir.path()),
        request(&["AAA", "BBB"], Some(day(1)), None),
        false,
    )
    .await
    .unwrap();

    assert_eq!(summary.no_data, 1);
    assert_eq!(summary.fetch_failed, 1);
    assert!(summary.snapshot.is_none());
    assert_eq!(store.writes(), 0);
    assert!(snapshots(dir.path()).is_empty());
}

#[tokio::test]
async fn failed_load_keeps_watermark_and_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::new();
    store.advance_watermark("AAA", day(10)).await.unwrap();
    store.fail_writes_for("AAA");

    let source = Stub::default()
        .with("AAA", &[13, 14])
        .with("BBB", &[13]);

    let summary = prices::run(
        &mut store,
        &source,
        &config(dir.path()),
        request(&["AAA", "BBB"], Some(day(1)), None),
        false,
    )
    .await
    .unwrap();

    assert_eq!(summary.load_failed, 1);
    assert_eq!(summary.loaded, 1);
    assert_eq!(store.get_watermark("AAA").await.unwrap(), Some(day(10)));
    assert_eq!(store.get_watermark("BBB").await.unwrap(), Some(day(13)));

    // the failed symbol's rows are still on disk for replay
    let text = std::fs::read_to_string(summary.snapshot.unwrap()).unwrap();
    assert!(text.lines().any(|line| line.starts_with("2025-01-14,AAA,")));
}

#[tokio::test]
async fn universe_and_start_come_from_trend_reports() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::new();

    let trend = |symbol: &str, d: u32| TrendRecord {
        company_name: None,
        sector: None,
        market_cap: None,
        symbol: symbol.to_string(),
        isin: None,
        high_52wk: None,
        trending_days: Some(1),
        days: vec![Some(1.0)],
        weighted_rpi: None,
        adx_14: None,
        rsi_14: None,
        report_date: day(d),
    };
    let report = Report::Trend(vec![trend("BBB", 3), trend("AAA", 10)]);
    store
        .load_report("trend_2025-01-10.csv", &report, now())
        .await
        .unwrap();

    let source = Stub::default().with("AAA", &[6]).with("BBB", &[6]);
    prices::run(
        &mut store,
        &source,
        &config(dir.path()),
        request(&[], None, None),
        false,
    )
    .await
    .unwrap();

    assert_eq!(
        source.requested(),
        [("AAA".to_string(), day(3)), ("BBB".to_string(), day(3))]
    );
}
