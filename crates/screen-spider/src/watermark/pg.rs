use super::{PriceLoad, Store};
use crate::load::insert_rows;
use crate::models::{PriceRecord, ProcessedFile, Report, SymbolWatermark, Universe};
use crate::sql;
use chrono::{NaiveDate, NaiveDateTime};
use deadpool_postgres::Pool;
use tracing::{debug, error, trace};

/// [`Store`] over the PostgreSQL destination schema.
///
/// Each call borrows one pooled connection; a unit of work runs in one transaction on it.
/// Dropping an uncommitted transaction (any `?` exit) rolls it back, and the connection goes
/// back to the pool when the call returns.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create the destination tables if they do not exist.
    pub async fn create_tables(&self) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        client.batch_execute(sql::CREATE_TABLES).await.map_err(|err| {
            error!("failed to create tables, error({err})");
            err
        })?;
        debug!("destination tables are in place");
        Ok(())
    }
}

impl Store for PgStore {
    async fn is_processed(&mut self, filename: &str) -> anyhow::Result<bool> {
        let client = self.pool.get().await?;
        let row = client.query_opt(sql::IS_PROCESSED, &[&filename]).await?;
        Ok(row.is_some())
    }

    async fn mark_processed(&mut self, filename: &str, at: NaiveDateTime) -> anyhow::Result<bool> {
        let client = self.pool.get().await?;
        let inserted = client.execute(sql::MARK_PROCESSED, &[&filename, &at]).await?;
        Ok(inserted == 1)
    }

    async fn get_watermark(&mut self, symbol: &str) -> anyhow::Result<Option<NaiveDate>> {
        let client = self.pool.get().await?;
        let row = client.query_opt(sql::GET_WATERMARK, &[&symbol]).await?;
        Ok(row.map(|row| row.get(0)))
    }

    async fn advance_watermark(&mut self, symbol: &str, date: NaiveDate) -> anyhow::Result<bool> {
        let client = self.pool.get().await?;
        let moved = client.execute(sql::ADVANCE_WATERMARK, &[&symbol, &date]).await?;
        Ok(moved == 1)
    }

    async fn load_report(
        &mut self,
        filename: &str,
        report: &Report,
        at: NaiveDateTime,
    ) -> anyhow::Result<u64> {
        let time = std::time::Instant::now();
        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        let written = match report {
            Report::Detail(rows) => insert_rows(&transaction, rows).await,
            Report::Trend(rows) => insert_rows(&transaction, rows).await,
        }
        .map_err(|err| {
            error!("failed to insert {} rows from {filename}, error({err})", report.kind());
            err
        })?;
        trace!("{written} of {} rows from {filename} staged", report.len());

        transaction
            .execute(sql::MARK_PROCESSED, &[&filename, &at])
            .await?;

        transaction.commit().await.map_err(|err| {
            error!("failed to commit TRANSACTION for {filename}, error({err})");
            err
        })?;

        debug!("{filename} committed. {}", crate::time_elapsed(time));
        Ok(written)
    }

    async fn load_prices(
        &mut self,
        symbol: &str,
        prices: &[PriceRecord],
        through: NaiveDate,
    ) -> anyhow::Result<PriceLoad> {
        let time = std::time::Instant::now();
        anyhow::ensure!(!prices.is_empty(), "cannot load an empty price batch");

        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;

        let rows = insert_rows(&transaction, prices).await.map_err(|err| {
            error!("failed to upsert prices for {symbol}, error({err})");
            err
        })?;

        let advanced = transaction
            .execute(sql::ADVANCE_WATERMARK, &[&symbol, &through])
            .await?
            == 1;

        transaction.commit().await.map_err(|err| {
            error!("failed to commit TRANSACTION for {symbol} prices, error({err})");
            err
        })?;

        debug!("{symbol} priceset committed. {}", crate::time_elapsed(time));
        Ok(PriceLoad {
            rows,
            through,
            advanced,
        })
    }

    async fn universe(&mut self) -> anyhow::Result<Universe> {
        let client = self.pool.get().await?;
        let symbols = client
            .query(sql::SELECT_UNIVERSE, &[])
            .await?
            .into_iter()
            .map(|row| row.get(0))
            .collect();
        let earliest: Option<NaiveDate> = client.query_one(sql::SELECT_EARLIEST_TREND, &[]).await?.get(0);

        Ok(Universe { symbols, earliest })
    }

    async fn watermarks(&mut self) -> anyhow::Result<Vec<SymbolWatermark>> {
        let client = self.pool.get().await?;
        let rows = client.query(sql::SELECT_WATERMARKS, &[]).await?;
        Ok(rows
            .into_iter()
            .map(|row| SymbolWatermark {
                symbol: row.get(0),
                last_processed_at: row.get(1),
            })
            .collect())
    }

    async fn processed_files(&mut self) -> anyhow::Result<Vec<ProcessedFile>> {
        let client = self.pool.get().await?;
        let rows = client.query(sql::SELECT_PROCESSED, &[]).await?;
        Ok(rows
            .into_iter()
            .map(|row| ProcessedFile {
                filename: row.get(0),
                processed_at: row.get(1),
            })
            .collect())
    }
}
