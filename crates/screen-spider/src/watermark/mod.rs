//! Ingestion bookkeeping: which report files are loaded, and how far each symbol's prices go.
//!
//! A [`Store`] is also the destination for the data those markers describe. Loading a unit of
//! work (one file, or one symbol's price batch) writes its rows and its marker together, so a
//! marker never exists without its data and data is never committed without its marker.

use crate::models::{PriceRecord, ProcessedFile, Report, SymbolWatermark, Universe};
use chrono::{NaiveDate, NaiveDateTime};

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Result of loading one symbol's price batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceLoad {
    pub rows: u64,
    /// Date the watermark was asked to advance to.
    pub through: NaiveDate,
    /// False when the stored watermark was already at or past `through`.
    pub advanced: bool,
}

/// Destination store with watermark tracking.
///
/// Implementations must uphold:
/// - `advance_watermark` never moves a watermark backwards; an older date is a no-op;
/// - `load_report` and `load_prices` are all-or-nothing, including their marker.
#[allow(async_fn_in_trait)]
pub trait Store {
    /// Whether `filename` has already been loaded.
    async fn is_processed(&mut self, filename: &str) -> anyhow::Result<bool>;

    /// Record `filename` as loaded. Returns false if it already was.
    async fn mark_processed(&mut self, filename: &str, at: NaiveDateTime) -> anyhow::Result<bool>;

    /// Last price date loaded for `symbol`.
    async fn get_watermark(&mut self, symbol: &str) -> anyhow::Result<Option<NaiveDate>>;

    /// Move `symbol`'s watermark to `date` if that is later. Returns whether it moved.
    async fn advance_watermark(&mut self, symbol: &str, date: NaiveDate) -> anyhow::Result<bool>;

    /// Append a report's rows and mark `filename` processed, in one unit.
    async fn load_report(
        &mut self,
        filename: &str,
        report: &Report,
        at: NaiveDateTime,
    ) -> anyhow::Result<u64>;

    /// Merge a symbol's price rows and advance its watermark to `through`, in one unit.
    ///
    /// `prices` must be non-empty.
    async fn load_prices(
        &mut self,
        symbol: &str,
        prices: &[PriceRecord],
        through: NaiveDate,
    ) -> anyhow::Result<PriceLoad>;

    /// Symbols and earliest report date found in the trend reports.
    async fn universe(&mut self) -> anyhow::Result<Universe>;

    async fn watermarks(&mut self) -> anyhow::Result<Vec<SymbolWatermark>>;

    async fn processed_files(&mut self) -> anyhow::Result<Vec<ProcessedFile>>;
}
