use crate::models::PriceRecord;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Names of the regular files directly inside `dir`.
pub async fn list_files(dir: &Path) -> anyhow::Result<Vec<String>> {
    trace!("listing directory: {}", dir.display());
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => debug!("skipping non UTF-8 filename {name:?}"),
        }
    }
    names.sort();
    Ok(names)
}

/// Write `bytes` to `path`, creating parent directories as necessary.
pub async fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, bytes).await
}

/// Snapshot fetched prices to `<dir>/stock_prices_<YYYYmmdd_HHMMSS>.csv`.
///
/// Written before any database write, so a failed load can be replayed from disk.
pub async fn write_price_snapshot(
    dir: &Path,
    prices: &[PriceRecord],
    at: NaiveDateTime,
) -> anyhow::Result<PathBuf> {
    let path = dir.join(format!("stock_prices_{}.csv", at.format("%Y%m%d_%H%M%S")));

    let mut writer = csv::Writer::from_writer(Vec::new());
    for price in prices {
        writer.serialize(price)?;
    }
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;

    write_file(&path, &bytes).await?;
    debug!("{} price rows snapshotted to {}", prices.len(), path.display());

    Ok(path)
}
