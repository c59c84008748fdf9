//! Runs against a live PostgreSQL when `TEST_DB_URL` is set; each test works in its own schema.

use chrono::{NaiveDate, NaiveDateTime};
use deadpool_postgres::Pool;
use screen_spider::models::{DetailRecord, PriceRecord, Report};
use screen_spider::watermark::{PgStore, Store};
use screen_spider::Config;
use tokio_postgres::NoTls;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
}

fn at() -> NaiveDateTime {
    day(4).and_hms_opt(6, 0, 0).unwrap()
}

struct TestDb {
    store: PgStore,
    pool: Pool,
    schema: String,
}

impl TestDb {
    async fn open(name: &str) -> Option<Self> {
        let Ok(url) = dotenv::var("TEST_DB_URL") else {
            eprintln!("TEST_DB_URL not set, skipping");
            return None;
        };
        let schema = format!("screen_test_{name}_{}", std::process::id());

        let (client, conn) = tokio_postgres::connect(&url, NoTls).await.unwrap();
        tokio::spawn(conn);
        client
            .batch_execute(&format!(
                "DROP SCHEMA IF EXISTS {schema} CASCADE; CREATE SCHEMA {schema};"
            ))
            .await
            .unwrap();

        let config = Config::from_lookup(|var| match var {
            "DB_URL" => Some(url.clone()),
            "DB_SCHEMA" => Some(schema.clone()),
            _ => None,
        })
        .unwrap();
        let pool = config.pool().unwrap();
        let store = PgStore::new(pool.clone());
        store.create_tables().await.unwrap();
        // twice, as `init` may be re-run
        store.create_tables().await.unwrap();

        Some(Self {
            store,
            pool,
            schema,
        })
    }

    async fn count(&self, table: &str) -> i64 {
        let client = self.pool.get().await.unwrap();
        client
            .query_one(&format!("SELECT COUNT(*) FROM {table}"), &[])
            .await
            .unwrap()
            .get(0)
    }

    async fn close(self) {
        let client = self.pool.get().await.unwrap();
        client
            .batch_execute(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .await
            .unwrap();
    }
}

fn detail(symbol: &str) -> DetailRecord {
    DetailRecord {
        company_name: Some(format!("{symbol} Corp")),
        sector: Some("Industrials".into()),
        market_cap: Some(1200.0),
        symbol: symbol.to_string(),
        isin: None,
        weighted_rpi: Some(0.8),
        high_52wk_weighted_rpi: Some(0.9),
        latest_price: Some(101.5),
        high_52wk: Some(120.0),
        ema_9: None,
        ema_21: None,
        adx_14: None,
        rsi_14: None,
        rpi_2_week: None,
        rpi_3_month: None,
        rpi_6_month: None,
        sma_2wk_of_6m_rpi: None,
        report_date: day(3),
    }
}

fn bar(symbol: &str, d: u32, close: f64) -> PriceRecord {
    PriceRecord {
        report_date: day(d),
        symbol: symbol.to_string(),
        price: close,
        open: None,
        low: None,
        high: None,
        volume: Some(10),
    }
}

#[tokio::test]
async fn watermark_only_moves_forward() {
    let Some(mut db) = TestDb::open("watermark").await else {
        return;
    };

    assert_eq!(db.store.get_watermark("AAA").await.unwrap(), None);
    assert!(db.store.advance_watermark("AAA", day(10)).await.unwrap());
    assert!(!db.store.advance_watermark("AAA", day(5)).await.unwrap());
    assert_eq!(db.store.get_watermark("AAA").await.unwrap(), Some(day(10)));

    db.close().await;
}

#[tokio::test]
async fn report_loads_with_its_marker_and_never_duplicates() {
    let Some(mut db) = TestDb::open("report").await else {
        return;
    };

    let report = Report::Detail(vec![detail("AAA"), detail("BBB")]);
    let written = db
        .store
        .load_report("detail_2025-01-03.csv", &report, at())
        .await
        .unwrap();
    assert_eq!(written, 2);
    assert!(db.store.is_processed("detail_2025-01-03.csv").await.unwrap());

    // same rows under another name hit the unique key
    let written = db
        .store
        .load_report("detail_copy_2025-01-03.csv", &report, at())
        .await
        .unwrap();
    assert_eq!(written, 0);
    assert_eq!(db.count("screen5_detail").await, 2);
    assert_eq!(db.store.processed_files().await.unwrap().len(), 2);

    db.close().await;
}

#[tokio::test]
async fn prices_merge_and_advance_in_one_transaction() {
    let Some(mut db) = TestDb::open("prices").await else {
        return;
    };

    let load = db
        .store
        .load_prices("AAA", &[bar("AAA", 2, 10.0), bar("AAA", 3, 11.0)], day(3))
        .await
        .unwrap();
    assert_eq!(load.through, day(3));
    assert!(load.advanced);

    // a corrected bar replaces the stored one; the watermark stays put
    let load = db
        .store
        .load_prices("AAA", &[bar("AAA", 3, 11.5)], day(3))
        .await
        .unwrap();
    assert!(!load.advanced);
    assert_eq!(db.count("stock_prices").await, 2);

    let client = db.pool.get().await.unwrap();
    let price: f64 = client
        .query_one(
            "SELECT price FROM stock_prices WHERE symbol = 'AAA' AND report_date = $1",
            &[&day(3)],
        )
        .await
        .unwrap()
        .get(0);
    assert_eq!(price, 11.5);
    drop(client);

    let watermarks = db.store.watermarks().await.unwrap();
    assert_eq!(watermarks.len(), 1);
    assert_eq!(watermarks[0].last_processed_at, day(3));

    db.close().await;
}
