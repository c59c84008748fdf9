use crate::cli::Kind;
use chrono::{Local, NaiveDate};
use deadpool_postgres::Pool;
use screen_spider::models::ReportKind;
use screen_spider::screen::{download, ingest};
use screen_spider::stock::prices::{self, PriceRequest};
use screen_spider::stock::yahoo_finance::YahooFinance;
use screen_spider::watermark::{PgStore, Store};
use screen_spider::Config;
use std::path::PathBuf;
use tracing::{debug, error, info, trace};

fn connect(config: &Config) -> anyhow::Result<Pool> {
    trace!("connecting to {} ...", config.schema);
    config.pool().map_err(|err| {
        error!("failed to create connection pool, error({err})");
        err
    })
}

/// Create every destination table.
pub(crate) async fn init(config: &Config) -> anyhow::Result<()> {
    let pool = connect(config)?;
    screen_spider::create_tables(&pool).await?;
    info!("tables created in schema {}", config.schema);
    Ok(())
}

/// Ingest each report folder; a folder that cannot be read is logged and skipped.
pub(crate) async fn load(config: &Config, folders: Vec<PathBuf>, tui: bool) -> anyhow::Result<()> {
    let folders = if folders.is_empty() {
        vec![
            config.data_dir.join("screen_detail").join("5"),
            config.data_dir.join("screen_trend").join("5"),
        ]
    } else {
        folders
    };

    let mut store = PgStore::new(connect(config)?);
    let time = std::time::Instant::now();
    let (mut loaded, mut failed) = (0, 0);
    for folder in &folders {
        match ingest::run(&mut store, folder, tui).await {
            Ok(summary) => {
                debug!("{}: {summary:?}", folder.display());
                loaded += summary.loaded;
                failed += summary.failed + summary.rejected;
            }
            Err(err) => error!("failed to ingest {}, error({err})", folder.display()),
        }
    }

    info!(
        "report files loaded: {loaded}, failed: {failed}, time elapsed: {:?}",
        time.elapsed()
    );
    Ok(())
}

/// Incremental price ingest.
pub(crate) async fn prices(
    config: &Config,
    symbols: Option<Vec<String>>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    tui: bool,
) -> anyhow::Result<()> {
    let mut store = PgStore::new(connect(config)?);
    let http_client = screen_spider::std_client_build(config)?;
    let source = YahooFinance::new(http_client, config.symbol_suffix.clone());

    let summary = prices::run(
        &mut store,
        &source,
        config,
        PriceRequest::new(symbols, start, end),
        tui,
    )
    .await?;
    debug!("{summary:?}");

    if summary.load_failed > 0 {
        if let Some(snapshot) = &summary.snapshot {
            error!(
                "{} symbols failed to load; fetched prices are kept in {}",
                summary.load_failed,
                snapshot.display()
            );
        }
    }
    Ok(())
}

/// Download reports for one screen.
pub(crate) async fn download(
    config: &Config,
    screen: u32,
    kind: Kind,
    from: Option<NaiveDate>,
    must_trend_on_date: bool,
    tui: bool,
) -> anyhow::Result<()> {
    let kind = match kind {
        Kind::Detail => ReportKind::Detail,
        Kind::Trend => ReportKind::Trend,
    };
    let http_client = screen_spider::std_client_build(config)?;
    let today = Local::now().date_naive();

    download::backfill(
        &http_client,
        config,
        screen,
        kind,
        from,
        must_trend_on_date,
        today,
        tui,
    )
    .await?;
    Ok(())
}

/// Print watermarks and processed files to stdout.
pub(crate) async fn status(config: &Config) -> anyhow::Result<()> {
    let mut store = PgStore::new(connect(config)?);

    let watermarks = store.watermarks().await?;
    println!("{:<16} last_processed_at", "symbol");
    for watermark in &watermarks {
        println!("{:<16} {}", watermark.symbol, watermark.last_processed_at);
    }

    let files = store.processed_files().await?;
    println!("\n{:<48} processed_at", "filename");
    for file in &files {
        println!("{:<48} {}", file.filename, file.processed_at);
    }

    println!(
        "\n{} symbols tracked, {} files processed",
        watermarks.len(),
        files.len()
    );
    Ok(())
}
