//! CSV report normalisation.
//!
//! Raw screener exports are turned into typed records in two steps:
//! 1. a [`ColumnMap`] gives every header a canonical name (normalised, and for trend reports
//!    the dated columns become `day0..dayN`, most recent first);
//! 2. each row is read through that map into a [`DetailRecord`] or [`TrendRecord`].
//!
//! A row without a symbol is skipped and reported as a [`RowError`]; the rest of the file still
//! loads. An optional cell that cannot be read as a number is stored as NULL and reported in
//! [`Transformed::cell_errors`].

use crate::error::TransformError;
use crate::models::{DetailRecord, Report, ReportKind, TrendRecord};
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::trace;

/// Header formats recognised as calendar dates.
const HEADER_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d-%b-%Y", "%d %b %Y"];

/// Cell contents treated as missing values.
const NULL_CELLS: &[&str] = &["", "-", "na", "n/a", "nan", "null"];

/// Lowercase, trimmed, spaces replaced by underscores. Applying it twice changes nothing.
///
/// ```rust
/// use screen_spider::screen::transform::normalize_column_name;
///
/// assert_eq!(normalize_column_name(" Weighted RPI "), "weighted_rpi");
/// ```
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Parse a header as a calendar date, if it is one.
pub fn parse_header_date(header: &str) -> Option<NaiveDate> {
    let header = header.trim();
    HEADER_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(header, format).ok())
}

/// Canonical column names for one header row, by position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMap {
    names: Vec<String>,
    positions: HashMap<String, usize>,
    days: usize,
}

impl ColumnMap {
    /// Normalise every header.
    pub fn detail<S: AsRef<str>>(headers: &[S]) -> Self {
        let names = headers
            .iter()
            .map(|header| normalize_column_name(header.as_ref()))
            .collect();
        Self::from_names(names, 0)
    }

    /// Normalise every header, and rename dated headers to `day0..dayN`.
    ///
    /// Dated headers are ordered newest first (ties keep their source order), then named by
    /// position. The same header row always yields the same names.
    pub fn trend<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut names: Vec<String> = headers
            .iter()
            .map(|header| normalize_column_name(header.as_ref()))
            .collect();

        let mut dated: Vec<(usize, NaiveDate)> = headers
            .iter()
            .enumerate()
            .filter_map(|(i, header)| parse_header_date(header.as_ref()).map(|date| (i, date)))
            .collect();
        dated.sort_by(|a, b| b.1.cmp(&a.1));

        for (day, (position, date)) in dated.iter().enumerate() {
            trace!("trend column {date} -> day{day}");
            names[*position] = format!("day{day}");
        }

        Self::from_names(names, dated.len())
    }

    fn from_names(names: Vec<String>, days: usize) -> Self {
        let mut positions = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // first occurrence wins for duplicated headers
            positions.entry(name.clone()).or_insert(i);
        }
        Self {
            names,
            positions,
            days,
        }
    }

    /// Canonical names, in source order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Number of `dayN` columns.
    pub fn day_count(&self) -> usize {
        self.days
    }
}

/// A row that was skipped.
#[derive(Clone, Debug, PartialEq)]
pub struct RowError {
    pub line: u64,
    pub message: String,
}

/// A parsed report with its skipped rows.
#[derive(Debug)]
pub struct Transformed {
    pub report: Report,
    pub row_errors: Vec<RowError>,
    /// Unreadable optional cells, loaded as NULL.
    pub cell_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Read and transform the report at `path`.
pub fn read_report(
    path: &Path,
    kind: ReportKind,
    report_date: NaiveDate,
) -> Result<Transformed, TransformError> {
    let file = std::fs::File::open(path)?;
    parse_report(file, kind, report_date)
}

/// Transform a CSV report from any reader.
pub fn parse_report<R: Read>(
    reader: R,
    kind: ReportKind,
    report_date: NaiveDate,
) -> Result<Transformed, TransformError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let columns = match kind {
        ReportKind::Detail => ColumnMap::detail(&headers),
        ReportKind::Trend => ColumnMap::trend(&headers),
    };
    if columns.position("symbol").is_none() {
        return Err(TransformError::MissingColumn("symbol"));
    }

    let mut details = Vec::new();
    let mut trends = Vec::new();
    let mut row_errors = Vec::new();
    let mut cell_errors = Vec::new();
    let mut rows_read = 0;

    for (i, result) in reader.records().enumerate() {
        let record = result?;
        rows_read += 1;
        let line = record.position().map(|p| p.line()).unwrap_or(i as u64 + 2);
        let mut cells = Cells {
            columns: &columns,
            record: &record,
            nulled: Vec::new(),
        };

        let parsed = match kind {
            ReportKind::Detail => detail_record(&mut cells, report_date).map(|r| details.push(r)),
            ReportKind::Trend => trend_record(&mut cells, report_date).map(|r| trends.push(r)),
        };
        match parsed {
            Ok(()) => cell_errors.extend(
                cells
                    .nulled
                    .into_iter()
                    .map(|message| RowError { line, message }),
            ),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    let report = match kind {
        ReportKind::Detail => Report::Detail(details),
        ReportKind::Trend => Report::Trend(trends),
    };

    Ok(Transformed {
        report,
        row_errors,
        cell_errors,
        rows_read,
    })
}

// rows
// ----------------------------------------------------------------------------

fn detail_record(cells: &mut Cells, report_date: NaiveDate) -> Result<DetailRecord, String> {
    Ok(DetailRecord {
        company_name: cells.text("company_name"),
        sector: cells.text("sector"),
        market_cap: cells.number("market_cap"),
        symbol: cells.symbol()?,
        isin: cells.text("isin"),
        weighted_rpi: cells.number("weighted_rpi"),
        high_52wk_weighted_rpi: cells.number("52wk_high_w.rpi"),
        latest_price: cells.number("latest_price"),
        high_52wk: cells.number("52wk_high"),
        ema_9: cells.number("ema_9"),
        ema_21: cells.number("ema_21"),
        adx_14: cells.number("adx_14"),
        rsi_14: cells.number("rsi_14"),
        rpi_2_week: cells.number("2_week_rpi"),
        rpi_3_month: cells.number("3_month_rpi"),
        rpi_6_month: cells.number("6_month_rpi"),
        sma_2wk_of_6m_rpi: cells.number("2wk_sma_of_6m_rpi"),
        report_date,
    })
}

fn trend_record(cells: &mut Cells, report_date: NaiveDate) -> Result<TrendRecord, String> {
    let days = (0..cells.columns.day_count())
        .map(|day| cells.number(&format!("day{day}")))
        .collect();

    Ok(TrendRecord {
        company_name: cells.text("company_name"),
        sector: cells.text("sector"),
        market_cap: cells.number("market_cap"),
        symbol: cells.symbol()?,
        isin: cells.text("isin"),
        high_52wk: cells.number("52wk_high"),
        trending_days: cells.integer("trending_days"),
        days,
        weighted_rpi: cells.number("weighted_rpi"),
        adx_14: cells.number("adx_14"),
        rsi_14: cells.number("rsi_14"),
        report_date,
    })
}

/// One CSV record, addressed by canonical column name.
struct Cells<'a> {
    columns: &'a ColumnMap,
    record: &'a StringRecord,
    /// Cells that were present but unreadable.
    nulled: Vec<String>,
}

impl<'a> Cells<'a> {
    fn raw(&self, name: &str) -> Option<&'a str> {
        let cell = self.record.get(self.columns.position(name)?)?.trim();
        if NULL_CELLS.iter().any(|null| cell.eq_ignore_ascii_case(null)) {
            None
        } else {
            Some(cell)
        }
    }

    fn text(&self, name: &str) -> Option<String> {
        self.raw(name).map(str::to_string)
    }

    fn symbol(&self) -> Result<String, String> {
        self.raw("symbol")
            .map(str::to_uppercase)
            .ok_or_else(|| "row has no symbol".to_string())
    }

    fn number(&mut self, name: &str) -> Option<f64> {
        let cell = self.raw(name)?;
        let value = parse_number(cell);
        if value.is_none() {
            self.nulled
                .push(format!("column {name} has a non-numeric value \"{cell}\", stored as NULL"));
        }
        value
    }

    fn integer(&mut self, name: &str) -> Option<i32> {
        match self.number(name)? {
            value if value.fract() == 0.0 && value.abs() <= i32::MAX as f64 => Some(value as i32),
            value => {
                self.nulled
                    .push(format!("column {name} has a non-integer value {value}, stored as NULL"));
                None
            }
        }
    }
}

/// Numbers may carry thousands separators or a trailing percent sign.
fn parse_number(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
