use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets the level of tracing.
    ///
    /// Without it, progress bars are drawn instead of log lines.
    #[arg(short, long, global = true)]
    pub trace: Option<TraceLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the destination tables, if they do not exist.
    Init,

    /// Load new detail & trend report files into the database.
    Load {
        /// Folders to scan.
        ///
        /// If no folders are provided, `DATA_DIR/screen_detail/5` and `DATA_DIR/screen_trend/5`
        /// are scanned.
        #[arg(short, long)]
        folder: Vec<PathBuf>,
    },

    /// Fetch and load stock prices since each symbol's last processed date.
    Prices {
        /// First date to fetch; defaults to the earliest trend report.
        #[arg(short, long)]
        start: Option<NaiveDate>,

        /// Last date to fetch (inclusive); defaults to today.
        #[arg(short, long)]
        end: Option<NaiveDate>,

        /// Symbols to fetch; defaults to every symbol in the trend reports.
        #[arg(long)]
        symbol: Vec<String>,
    },

    /// Download screener reports to the data directory.
    Download {
        /// Screen identifier.
        #[arg(short, long, default_value_t = 5)]
        screen: u32,

        /// Report to download.
        #[arg(short, long)]
        kind: Kind,

        /// Download every Friday from this date until today, instead of the latest report.
        #[arg(short, long)]
        from: Option<NaiveDate>,

        /// Trend reports only: keep symbols trending on the report date.
        #[arg(long)]
        must_trend_on_date: bool,
    },

    /// Print symbol watermarks and processed files.
    Status,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
#[clap(rename_all = "UPPERCASE")]
pub enum TraceLevel {
    DEBUG,
    ERROR,
    INFO,
    TRACE,
    WARN,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// Per-symbol indicator report.
    Detail,

    /// Trending-days report, one column per report date.
    Trend,
}
