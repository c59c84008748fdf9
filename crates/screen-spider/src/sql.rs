//! Statements against the destination schema.
//!
//! Every statement is unqualified; the pool pins `search_path` to the configured schema.

//////////////////////////////////////////////////////////////////
// schema
//////////////////////////////////////////////////////////////////

/// Creates every table the pipelines read or write. Safe to re-run.
pub(crate) const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS processed_files (
    filename TEXT PRIMARY KEY,
    processed_at TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS stock_prices_processed (
    symbol TEXT PRIMARY KEY,
    last_processed_at DATE NOT NULL
);

CREATE TABLE IF NOT EXISTS screen5_detail (
    company_name TEXT,
    sector TEXT,
    market_cap DOUBLE PRECISION,
    symbol TEXT NOT NULL,
    isin TEXT,
    weighted_rpi DOUBLE PRECISION,
    "52wk_high_w.rpi" DOUBLE PRECISION,
    latest_price DOUBLE PRECISION,
    "52wk_high" DOUBLE PRECISION,
    ema_9 DOUBLE PRECISION,
    ema_21 DOUBLE PRECISION,
    adx_14 DOUBLE PRECISION,
    rsi_14 DOUBLE PRECISION,
    "2_week_rpi" DOUBLE PRECISION,
    "3_month_rpi" DOUBLE PRECISION,
    "6_month_rpi" DOUBLE PRECISION,
    "2wk_sma_of_6m_rpi" DOUBLE PRECISION,
    report_date DATE NOT NULL,
    UNIQUE (symbol, report_date)
);

CREATE TABLE IF NOT EXISTS screen5_trend (
    company_name TEXT,
    sector TEXT,
    market_cap DOUBLE PRECISION,
    symbol TEXT NOT NULL,
    isin TEXT,
    "52wk_high" DOUBLE PRECISION,
    trending_days INTEGER,
    day0 DOUBLE PRECISION,
    day1 DOUBLE PRECISION,
    day2 DOUBLE PRECISION,
    day3 DOUBLE PRECISION,
    day4 DOUBLE PRECISION,
    day5 DOUBLE PRECISION,
    day6 DOUBLE PRECISION,
    day7 DOUBLE PRECISION,
    day8 DOUBLE PRECISION,
    day9 DOUBLE PRECISION,
    day10 DOUBLE PRECISION,
    day11 DOUBLE PRECISION,
    weighted_rpi DOUBLE PRECISION,
    adx_14 DOUBLE PRECISION,
    rsi_14 DOUBLE PRECISION,
    report_date DATE NOT NULL,
    UNIQUE (symbol, report_date)
);

CREATE TABLE IF NOT EXISTS stock_prices (
    report_date DATE NOT NULL,
    symbol TEXT NOT NULL,
    price DOUBLE PRECISION,
    open DOUBLE PRECISION,
    low DOUBLE PRECISION,
    high DOUBLE PRECISION,
    volume BIGINT,
    PRIMARY KEY (symbol, report_date)
);

CREATE INDEX IF NOT EXISTS idx_stock_prices_symbol_date ON stock_prices (symbol, report_date);
"#;

/// Number of relative-day columns in `screen5_trend`.
pub(crate) const TREND_DAY_COLUMNS: usize = 12;

//////////////////////////////////////////////////////////////////
// processed files
//////////////////////////////////////////////////////////////////

pub(crate) const IS_PROCESSED: &str = "SELECT 1 FROM processed_files WHERE filename = $1";

/// A file is marked once; the first `processed_at` wins.
pub(crate) const MARK_PROCESSED: &str = "
    INSERT INTO processed_files (filename, processed_at)
    VALUES ($1, $2)
    ON CONFLICT (filename) DO NOTHING
";

pub(crate) const SELECT_PROCESSED: &str =
    "SELECT filename, processed_at FROM processed_files ORDER BY filename";

//////////////////////////////////////////////////////////////////
// watermarks
//////////////////////////////////////////////////////////////////

pub(crate) const GET_WATERMARK: &str =
    "SELECT last_processed_at FROM stock_prices_processed WHERE symbol = $1";

/// Only ever moves a watermark forward; an older date affects zero rows.
pub(crate) const ADVANCE_WATERMARK: &str = "
    INSERT INTO stock_prices_processed (symbol, last_processed_at)
    VALUES ($1, $2)
    ON CONFLICT (symbol) DO UPDATE
    SET last_processed_at = EXCLUDED.last_processed_at
    WHERE stock_prices_processed.last_processed_at < EXCLUDED.last_processed_at
";

pub(crate) const SELECT_WATERMARKS: &str =
    "SELECT symbol, last_processed_at FROM stock_prices_processed ORDER BY symbol";

//////////////////////////////////////////////////////////////////
// reports
//////////////////////////////////////////////////////////////////

pub(crate) const DETAIL_COLUMNS: &[&str] = &[
    "company_name",
    "sector",
    "market_cap",
    "symbol",
    "isin",
    "weighted_rpi",
    "\"52wk_high_w.rpi\"",
    "latest_price",
    "\"52wk_high\"",
    "ema_9",
    "ema_21",
    "adx_14",
    "rsi_14",
    "\"2_week_rpi\"",
    "\"3_month_rpi\"",
    "\"6_month_rpi\"",
    "\"2wk_sma_of_6m_rpi\"",
    "report_date",
];

pub(crate) const TREND_COLUMNS: &[&str] = &[
    "company_name",
    "sector",
    "market_cap",
    "symbol",
    "isin",
    "\"52wk_high\"",
    "trending_days",
    "day0",
    "day1",
    "day2",
    "day3",
    "day4",
    "day5",
    "day6",
    "day7",
    "day8",
    "day9",
    "day10",
    "day11",
    "weighted_rpi",
    "adx_14",
    "rsi_14",
    "report_date",
];

/// Report rows are append-only; a repeated (symbol, report_date) keeps the first load.
pub(crate) const ON_CONFLICT_KEEP: &str = "ON CONFLICT (symbol, report_date) DO NOTHING";

pub(crate) const SELECT_UNIVERSE: &str = "
    SELECT DISTINCT symbol FROM screen5_trend
    WHERE symbol IS NOT NULL
    ORDER BY symbol
";

pub(crate) const SELECT_EARLIEST_TREND: &str = "SELECT MIN(report_date) FROM screen5_trend";

//////////////////////////////////////////////////////////////////
// prices
//////////////////////////////////////////////////////////////////

pub(crate) const PRICE_COLUMNS: &[&str] = &[
    "report_date",
    "symbol",
    "price",
    "open",
    "low",
    "high",
    "volume",
];

/// Prices merge by key; a re-fetched bar replaces the stored one.
pub(crate) const ON_CONFLICT_MERGE_PRICE: &str = "
    ON CONFLICT (symbol, report_date) DO UPDATE
    SET price = EXCLUDED.price,
        open = EXCLUDED.open,
        low = EXCLUDED.low,
        high = EXCLUDED.high,
        volume = EXCLUDED.volume
";
