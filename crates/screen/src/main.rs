mod cli;
mod run;

// remote imports
use clap::Parser;
use cli::{Cli, TraceLevel};
use tracing::{subscriber, trace, Level};
use tracing_subscriber::FmtSubscriber;

////////////////////////////////////////////////////////////////////////////

// set the subscriber at the requested trace level
fn preprocess(trace_level: Level) -> anyhow::Result<()> {
    let my_subscriber = FmtSubscriber::builder()
        .with_max_level(trace_level)
        .finish();
    subscriber::set_global_default(my_subscriber)?;
    Ok(())
}

////////////////////////////////////////////////////////////////////////////

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // set the trace level
    if let Some(trace_level) = cli.trace {
        preprocess(match trace_level {
            TraceLevel::DEBUG => Level::DEBUG,
            TraceLevel::ERROR => Level::ERROR,
            TraceLevel::INFO => Level::INFO,
            TraceLevel::TRACE => Level::TRACE,
            TraceLevel::WARN => Level::WARN,
        })?;
    }
    trace!("command line input recorded: {cli:?}");

    // if no trace level provided, use tui
    let tui = cli.trace.is_none();

    let config = screen_spider::Config::from_env()?;
    trace!("configuration loaded: {config:?}");

    // read cli inputs
    use cli::Commands::*;
    match cli.command {
        // `screen init`: create tables
        Init => run::init(&config).await?,

        // `screen load [--folder <DIR>]...`: ingest report folders
        Load { folder } => run::load(&config, folder, tui).await?,

        // `screen prices [--start] [--end] [--symbol <SYM>]...`: incremental price ingest
        Prices { start, end, symbol } => {
            let symbols = (!symbol.is_empty()).then_some(symbol);
            run::prices(&config, symbols, start, end, tui).await?
        }

        // `screen download --kind <KIND> [--screen] [--from]`: fetch report exports
        Download {
            screen,
            kind,
            from,
            must_trend_on_date,
        } => run::download(&config, screen, kind, from, must_trend_on_date, tui).await?,

        // `screen status`: watermarks & processed files
        Status => run::status(&config).await?,
    }

    Ok(())
}
