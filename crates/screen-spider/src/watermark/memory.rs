use super::{PriceLoad, Store};
use crate::models::{
    DetailRecord, PriceRecord, ProcessedFile, Report, SymbolWatermark, TrendRecord, Universe,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};

type Key = (String, NaiveDate);

/// [`Store`] held in memory, with the same keying and conflict rules as the PostgreSQL tables.
///
/// Used for dry runs and tests. Keys named with [`MemoryStore::fail_writes_for`] make the next
/// loads touching them fail before anything is written; [`MemoryStore::fail_reads_for`] does the
/// same for marker lookups.
#[derive(Debug, Default)]
pub struct MemoryStore {
    processed: BTreeMap<String, NaiveDateTime>,
    watermarks: BTreeMap<String, NaiveDate>,
    details: BTreeMap<Key, DetailRecord>,
    trends: BTreeMap<Key, TrendRecord>,
    prices: BTreeMap<Key, PriceRecord>,
    failing: BTreeSet<String>,
    failing_reads: BTreeSet<String>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make loads for this filename or symbol fail.
    pub fn fail_writes_for(&mut self, key: &str) {
        self.failing.insert(key.to_string());
    }

    /// Make processed-marker and watermark lookups for this filename or symbol fail.
    pub fn fail_reads_for(&mut self, key: &str) {
        self.failing_reads.insert(key.to_string());
    }

    /// Number of successful write operations so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn details(&self) -> impl Iterator<Item = &DetailRecord> {
        self.details.values()
    }

    pub fn trends(&self) -> impl Iterator<Item = &TrendRecord> {
        self.trends.values()
    }

    pub fn prices(&self) -> impl Iterator<Item = &PriceRecord> {
        self.prices.values()
    }

    fn check(&self, key: &str) -> anyhow::Result<()> {
        if self.failing.contains(key) {
            anyhow::bail!("simulated write failure for {key}");
        }
        Ok(())
    }

    fn check_read(&self, key: &str) -> anyhow::Result<()> {
        if self.failing_reads.contains(key) {
            anyhow::bail!("simulated read failure for {key}");
        }
        Ok(())
    }

    fn advance(&mut self, symbol: &str, date: NaiveDate) -> bool {
        match self.watermarks.get(symbol) {
            Some(current) if *current >= date => false,
            _ => {
                self.watermarks.insert(symbol.to_string(), date);
                true
            }
        }
    }
}

impl Store for MemoryStore {
    async fn is_processed(&mut self, filename: &str) -> anyhow::Result<bool> {
        self.check_read(filename)?;
        Ok(self.processed.contains_key(filename))
    }

    async fn mark_processed(&mut self, filename: &str, at: NaiveDateTime) -> anyhow::Result<bool> {
        if self.processed.contains_key(filename) {
            return Ok(false);
        }
        self.processed.insert(filename.to_string(), at);
        self.writes += 1;
        Ok(true)
    }

    async fn get_watermark(&mut self, symbol: &str) -> anyhow::Result<Option<NaiveDate>> {
        self.check_read(symbol)?;
        Ok(self.watermarks.get(symbol).copied())
    }

    async fn advance_watermark(&mut self, symbol: &str, date: NaiveDate) -> anyhow::Result<bool> {
        let moved = self.advance(symbol, date);
        if moved {
            self.writes += 1;
        }
        Ok(moved)
    }

    async fn load_report(
        &mut self,
        filename: &str,
        report: &Report,
        at: NaiveDateTime,
    ) -> anyhow::Result<u64> {
        self.check(filename)?;

        let mut written = 0;
        match report {
            Report::Detail(rows) => {
                for row in rows {
                    let key = (row.symbol.clone(), row.report_date);
                    if !self.details.contains_key(&key) {
                        self.details.insert(key, row.clone());
                        written += 1;
                    }
                }
            }
            Report::Trend(rows) => {
                for row in rows {
                    let key = (row.symbol.clone(), row.report_date);
                    if !self.trends.contains_key(&key) {
                        self.trends.insert(key, row.clone());
                        written += 1;
                    }
                }
            }
        }
        self.processed.entry(filename.to_string()).or_insert(at);
        self.writes += 1;

        Ok(written)
    }

    async fn load_prices(
        &mut self,
        symbol: &str,
        prices: &[PriceRecord],
        through: NaiveDate,
    ) -> anyhow::Result<PriceLoad> {
        anyhow::ensure!(!prices.is_empty(), "cannot load an empty price batch");
        self.check(symbol)?;

        for price in prices {
            self.prices
                .insert((price.symbol.clone(), price.report_date), price.clone());
        }
        let advanced = self.advance(symbol, through);
        self.writes += 1;

        Ok(PriceLoad {
            rows: prices.len() as u64,
            through,
            advanced,
        })
    }

    async fn universe(&mut self) -> anyhow::Result<Universe> {
        let symbols: BTreeSet<String> = self.trends.keys().map(|(s, _)| s.clone()).collect();
        let earliest = self.trends.keys().map(|(_, d)| *d).min();
        Ok(Universe {
            symbols: symbols.into_iter().collect(),
            earliest,
        })
    }

    async fn watermarks(&mut self) -> anyhow::Result<Vec<SymbolWatermark>> {
        Ok(self
            .watermarks
            .iter()
            .map(|(symbol, date)| SymbolWatermark {
                symbol: symbol.clone(),
                last_processed_at: *date,
            })
            .collect())
    }

    async fn processed_files(&mut self) -> anyhow::Result<Vec<ProcessedFile>> {
        Ok(self
            .processed
            .iter()
            .map(|(filename, at)| ProcessedFile {
                filename: filename.clone(),
                processed_at: *at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar(symbol: &str, day: NaiveDate, close: f64) -> PriceRecord {
        PriceRecord {
            report_date: day,
            symbol: symbol.to_string(),
            price: close,
            open: None,
            low: None,
            high: None,
            volume: None,
        }
    }

    #[tokio::test]
    async fn watermark_never_moves_backwards() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get_watermark("AAA").await.unwrap(), None);

        assert!(store.advance_watermark("AAA", date(2025, 1, 10)).await.unwrap());
        assert!(!store.advance_watermark("AAA", date(2025, 1, 5)).await.unwrap());
        assert!(!store.advance_watermark("AAA", date(2025, 1, 10)).await.unwrap());
        assert_eq!(
            store.get_watermark("AAA").await.unwrap(),
            Some(date(2025, 1, 10))
        );

        assert!(store.advance_watermark("AAA", date(2025, 1, 11)).await.unwrap());
        assert_eq!(
            store.get_watermark("AAA").await.unwrap(),
            Some(date(2025, 1, 11))
        );
    }

    #[tokio::test]
    async fn processed_marker_is_set_once() {
        let mut store = MemoryStore::new();
        let first = date(2025, 1, 3).and_hms_opt(9, 0, 0).unwrap();
        let later = date(2025, 1, 4).and_hms_opt(9, 0, 0).unwrap();

        assert!(!store.is_processed("a.csv").await.unwrap());
        assert!(store.mark_processed("a.csv", first).await.unwrap());
        assert!(!store.mark_processed("a.csv", later).await.unwrap());
        assert!(store.is_processed("a.csv").await.unwrap());
        assert_eq!(store.processed_files().await.unwrap()[0].processed_at, first);
    }

    #[tokio::test]
    async fn price_reload_merges_and_keeps_watermark() {
        let mut store = MemoryStore::new();
        let batch = [bar("AAA", date(2025, 1, 2), 10.0), bar("AAA", date(2025, 1, 3), 11.0)];
        let load = store
            .load_prices("AAA", &batch, date(2025, 1, 3))
            .await
            .unwrap();
        assert!(load.advanced);
        assert_eq!(load.through, date(2025, 1, 3));

        // an older, corrected bar replaces the stored row but leaves the watermark alone
        let load = store
            .load_prices("AAA", &[bar("AAA", date(2025, 1, 2), 10.5)], date(2025, 1, 2))
            .await
            .unwrap();
        assert!(!load.advanced);
        assert_eq!(store.prices().count(), 2);
        assert_eq!(store.prices().next().unwrap().price, 10.5);
        assert_eq!(
            store.get_watermark("AAA").await.unwrap(),
            Some(date(2025, 1, 3))
        );
    }

    #[tokio::test]
    async fn failed_load_writes_nothing() {
        let mut store = MemoryStore::new();
        store.fail_writes_for("AAA");
        assert!(store
            .load_prices("AAA", &[bar("AAA", date(2025, 1, 2), 10.0)], date(2025, 1, 2))
            .await
            .is_err());
        assert_eq!(store.prices().count(), 0);
        assert_eq!(store.get_watermark("AAA").await.unwrap(), None);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn empty_batch_is_refused() {
        let mut store = MemoryStore::new();
        assert!(store.load_prices("AAA", &[], date(2025, 1, 2)).await.is_err());
        assert_eq!(store.get_watermark("AAA").await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_failures_are_per_key() {
        let mut store = MemoryStore::new();
        store.fail_reads_for("BBB");
        assert!(store.get_watermark("BBB").await.is_err());
        assert!(store.is_processed("BBB").await.is_err());
        assert_eq!(store.get_watermark("AAA").await.unwrap(), None);
    }
}
