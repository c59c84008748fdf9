/// Report file recognition: detail / trend marker and trailing `_YYYY-MM-DD` date.
pub mod classify;

/// Report downloads from the screener's CSV export endpoint.
pub mod download;

/// Folder ingestion: classify, skip processed files, transform, load.
pub mod ingest;

/// CSV report parsing into typed detail and trend records.
pub mod transform;
