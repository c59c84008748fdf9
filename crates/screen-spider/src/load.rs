use crate::models::{DetailRecord, PriceRecord, TrendRecord};
use crate::sql;
use tokio_postgres::types::ToSql;
use tokio_postgres::Transaction;
use tracing::trace;

/// PostgreSQL accepts at most this many bind parameters per statement.
const MAX_PARAMS: usize = u16::MAX as usize;

/// Upper bound on rows per `INSERT`, independent of width.
const MAX_ROWS_PER_STATEMENT: usize = 1_000;

static NO_VALUE: Option<f64> = None;

/// A record that maps onto one row of a destination table.
pub(crate) trait Row {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    const ON_CONFLICT: &'static str;

    /// Bind parameters, in `COLUMNS` order.
    fn params(&self) -> Vec<&(dyn ToSql + Sync)>;
}

impl Row for DetailRecord {
    const TABLE: &'static str = "screen5_detail";
    const COLUMNS: &'static [&'static str] = sql::DETAIL_COLUMNS;
    const ON_CONFLICT: &'static str = sql::ON_CONFLICT_KEEP;

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        let params: [&(dyn ToSql + Sync); 18] = [
            &self.company_name,
            &self.sector,
            &self.market_cap,
            &self.symbol,
            &self.isin,
            &self.weighted_rpi,
            &self.high_52wk_weighted_rpi,
            &self.latest_price,
            &self.high_52wk,
            &self.ema_9,
            &self.ema_21,
            &self.adx_14,
            &self.rsi_14,
            &self.rpi_2_week,
            &self.rpi_3_month,
            &self.rpi_6_month,
            &self.sma_2wk_of_6m_rpi,
            &self.report_date,
        ];
        params.to_vec()
    }
}

impl Row for TrendRecord {
    const TABLE: &'static str = "screen5_trend";
    const COLUMNS: &'static [&'static str] = sql::TREND_COLUMNS;
    const ON_CONFLICT: &'static str = sql::ON_CONFLICT_KEEP;

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(Self::COLUMNS.len());
        params.push(&self.company_name);
        params.push(&self.sector);
        params.push(&self.market_cap);
        params.push(&self.symbol);
        params.push(&self.isin);
        params.push(&self.high_52wk);
        params.push(&self.trending_days);
        // the table holds a fixed window; shorter reports are padded with NULLs
        for i in 0..sql::TREND_DAY_COLUMNS {
            params.push(self.days.get(i).unwrap_or(&NO_VALUE));
        }
        params.push(&self.weighted_rpi);
        params.push(&self.adx_14);
        params.push(&self.rsi_14);
        params.push(&self.report_date);
        params
    }
}

impl Row for PriceRecord {
    const TABLE: &'static str = "stock_prices";
    const COLUMNS: &'static [&'static str] = sql::PRICE_COLUMNS;
    const ON_CONFLICT: &'static str = sql::ON_CONFLICT_MERGE_PRICE;

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        let params: [&(dyn ToSql + Sync); 7] = [
            &self.report_date,
            &self.symbol,
            &self.price,
            &self.open,
            &self.low,
            &self.high,
            &self.volume,
        ];
        params.to_vec()
    }
}

/// How many rows of `width` columns fit into one statement.
pub(crate) fn rows_per_statement(width: usize) -> usize {
    (MAX_PARAMS / width.max(1)).clamp(1, MAX_ROWS_PER_STATEMENT)
}

/// Build `INSERT INTO table (cols) VALUES ($1, ..), (..) <suffix>` for `rows` rows.
pub(crate) fn insert_statement(table: &str, columns: &[&str], rows: usize, suffix: &str) -> String {
    let width = columns.len();
    let values = (0..rows)
        .map(|row| {
            let placeholders = (1..=width)
                .map(|col| format!("${}", row * width + col))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({placeholders})")
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {table} ({}) VALUES {values} {}",
        columns.join(", "),
        suffix.trim()
    )
}

/// Write `rows` with batched multi-row inserts inside `transaction`.
///
/// Batches are not atomic on their own; nothing is visible until the caller commits.
/// Returns the number of rows the database reports as written.
pub(crate) async fn insert_rows<R: Row>(
    transaction: &Transaction<'_>,
    rows: &[R],
) -> Result<u64, tokio_postgres::Error> {
    let mut written = 0;
    for chunk in rows.chunks(rows_per_statement(R::COLUMNS.len())) {
        let stmt = insert_statement(R::TABLE, R::COLUMNS, chunk.len(), R::ON_CONFLICT);
        let params: Vec<&(dyn ToSql + Sync)> = chunk.iter().flat_map(|row| row.params()).collect();
        written += transaction.execute(stmt.as_str(), &params).await?;
        trace!("{} batch of {} rows written", R::TABLE, chunk.len());
    }
    Ok(written)
}
