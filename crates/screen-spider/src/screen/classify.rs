use crate::error::FilenameError;
use crate::models::ReportKind;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// A report file that is recognised and dated, not yet checked against `processed_files`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub filename: String,
    pub path: PathBuf,
    pub kind: ReportKind,
    pub report_date: NaiveDate,
}

/// A folder listing split by what can be done with each file.
#[derive(Debug, Default)]
pub struct Classified {
    pub candidates: Vec<Candidate>,
    pub unknown: Vec<String>,
    pub rejected: Vec<(String, FilenameError)>,
}

/// Decide which report a filename holds, by the `detail` / `trend` marker in its name.
///
/// Anything that is not a `.csv`, or that carries both markers, is `None`.
pub fn classify(filename: &str) -> Option<ReportKind> {
    let lower = filename.to_lowercase();
    if !lower.ends_with(".csv") {
        return None;
    }

    match (lower.contains("detail"), lower.contains("trend")) {
        (true, false) => Some(ReportKind::Detail),
        (false, true) => Some(ReportKind::Trend),
        _ => None,
    }
}

/// Extract the report date from `<anything>_YYYY-MM-DD.csv`.
///
/// ```rust
/// use chrono::NaiveDate;
/// use screen_spider::screen::classify::report_date;
///
/// let date = report_date("screen5_trend_2025-01-03.csv").unwrap();
/// assert_eq!(date, NaiveDate::from_ymd_opt(2025, 1, 3).unwrap());
/// ```
pub fn report_date(filename: &str) -> Result<NaiveDate, FilenameError> {
    let stem = match filename.len().checked_sub(4) {
        Some(cut) if filename.is_char_boundary(cut) && filename[cut..].eq_ignore_ascii_case(".csv") => {
            &filename[..cut]
        }
        _ => filename,
    };

    let segment = match stem.rsplit_once('_') {
        Some((_, segment)) if !segment.is_empty() => segment,
        _ => return Err(FilenameError::MissingDate(filename.to_string())),
    };

    NaiveDate::parse_from_str(segment, "%Y-%m-%d").map_err(|source| FilenameError::InvalidDate {
        filename: filename.to_string(),
        segment: segment.to_string(),
        source,
    })
}

/// Split a listing of `folder` into dated report candidates, unknown files and bad names.
///
/// Output order follows the filenames, so runs over the same folder are repeatable.
pub fn classify_listing<I, S>(folder: &Path, filenames: I) -> Classified
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut names: Vec<String> = filenames.into_iter().map(Into::into).collect();
    names.sort();

    let mut classified = Classified::default();
    for filename in names {
        let Some(kind) = classify(&filename) else {
            classified.unknown.push(filename);
            continue;
        };

        match report_date(&filename) {
            Ok(report_date) => classified.candidates.push(Candidate {
                path: folder.join(&filename),
                filename,
                kind,
                report_date,
            }),
            Err(err) => classified.rejected.push((filename, err)),
        }
    }

    classified
}
