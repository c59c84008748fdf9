use super::classify::classify_listing;
use super::transform::read_report;
use crate::tui::Progress;
use crate::watermark::Store;
use chrono::{Local, NaiveDateTime};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Per-file outcomes of one folder run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub files: usize,
    pub unknown: usize,
    pub rejected: usize,
    /// Already in `processed_files`.
    pub skipped: usize,
    pub loaded: usize,
    pub failed: usize,
    pub rows: u64,
    pub row_errors: usize,
    /// Unreadable cells loaded as NULL.
    pub cell_errors: usize,
}

/// Load every unprocessed detail/trend report in `folder`, stamping them with the current time.
pub async fn run<S: Store>(store: &mut S, folder: &Path, tui: bool) -> anyhow::Result<IngestSummary> {
    run_at(store, folder, Local::now().naive_local(), tui).await
}

/// Load every unprocessed detail/trend report in `folder`.
///
/// Files are taken in filename order. Each one is transformed and then loaded with its
/// processed marker in a single unit of work; a file that fails at any stage is logged and left
/// unmarked, so the next run retries it. A file whose every row was rejected counts as failed.
/// Only an unreadable folder is an error.
pub async fn run_at<S: Store>(
    store: &mut S,
    folder: &Path,
    at: NaiveDateTime,
    tui: bool,
) -> anyhow::Result<IngestSummary> {
    let time = std::time::Instant::now();

    let listing = crate::fs::list_files(folder).await.map_err(|err| {
        error!("failed to list {}, error({err})", folder.display());
        err
    })?;
    let classified = classify_listing(folder, &listing);

    let mut summary = IngestSummary {
        files: listing.len(),
        unknown: classified.unknown.len(),
        rejected: classified.rejected.len(),
        ..Default::default()
    };
    for filename in &classified.unknown {
        debug!("ignoring {filename}: not a detail or trend report");
    }
    for (filename, err) in &classified.rejected {
        error!("skipping {filename}, error({err})");
    }

    let progress = Progress::new(classified.candidates.len(), "files", tui);
    for candidate in &classified.candidates {
        let filename = &candidate.filename;
        match store.is_processed(filename).await {
            Ok(true) => {
                debug!("{filename} already processed");
                summary.skipped += 1;
                progress.skip();
                continue;
            }
            Ok(false) => (),
            Err(err) => {
                error!("failed to check whether {filename} is processed, error({err})");
                summary.failed += 1;
                progress.fail();
                continue;
            }
        }

        let transformed = match read_report(&candidate.path, candidate.kind, candidate.report_date) {
            Ok(transformed) => transformed,
            Err(err) => {
                error!("failed to transform {filename}, error({err})");
                summary.failed += 1;
                progress.fail();
                continue;
            }
        };
        for row in &transformed.row_errors {
            warn!("{filename} line {}: {}, row skipped", row.line, row.message);
        }
        summary.row_errors += transformed.row_errors.len();
        for cell in &transformed.cell_errors {
            warn!("{filename} line {}: {}", cell.line, cell.message);
        }
        summary.cell_errors += transformed.cell_errors.len();

        if transformed.rows_read > 0 && transformed.report.is_empty() {
            error!(
                "no usable rows in {filename} ({} rejected), leaving it unprocessed",
                transformed.row_errors.len()
            );
            summary.failed += 1;
            progress.fail();
            continue;
        }

        match store.load_report(filename, &transformed.report, at).await {
            Ok(rows) => {
                info!(
                    "{filename} loaded into {}: {rows} of {} rows written",
                    candidate.kind.table(),
                    transformed.rows_read
                );
                summary.loaded += 1;
                summary.rows += rows;
                progress.succeed();
            }
            Err(err) => {
                error!("failed to load {filename}, error({err})");
                summary.failed += 1;
                progress.fail();
            }
        }
    }
    progress.finish();

    info!(
        "{}: {} loaded, {} already processed, {} failed, {} rejected, {} ignored. {}",
        folder.display(),
        summary.loaded,
        summary.skipped,
        summary.failed,
        summary.rejected,
        summary.unknown,
        crate::time_elapsed(time)
    );

    Ok(summary)
}
