/// Watermark-driven fetch planning, and the [`fetch::PriceSource`] seam for price providers.
pub mod fetch;

/// Incremental price ingestion across the symbol universe.
pub mod prices;

/// Price data collected from the Yahoo Finance API; inspiration from Python's [yfinance] library.
///
/// [yfinance]: https://github.com/ranaroussi/yfinance/
pub mod yahoo_finance;
