use crate::config::{FileFilter, ParseOptions};
use crate::{query, Field, HrateError, Record, Result, Series};
use chrono::{NaiveDateTime, TimeDelta};
use log::{debug, info, warn};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Layout of the start time on the first line, e.g. `04 August 2017 00:00:00`.
pub const HEADER_TIME_FORMAT: &str = "%d %B %Y %H:%M:%S";

/// Lines between the header and the preamble that are always present.
const SEPARATOR_LINES: usize = 1;

/// One data row before it is anchored to the header time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub time_offset_ms: f64,
    pub heart_rate_bpm: f64,
    pub rr_interval_ms: f64,
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Parses the first line of a recording.
///
/// Only the line terminator is stripped, and the month must be spelled out in full.
pub fn parse_header(path: &Path, line: &str) -> Result<NaiveDateTime> {
    let text = line.trim_end_matches(['\r', '\n']);
    let format_error = |message: String| HrateError::Format {
        path: path.to_path_buf(),
        line: 1,
        text: text.to_string(),
        message,
    };

    if text.trim() != text {
        return Err(format_error(
            "header has leading or trailing whitespace".to_string(),
        ));
    }
    match text.split_whitespace().nth(1) {
        Some(month) if MONTH_NAMES.contains(&month) => {}
        _ => {
            return Err(format_error(
                "header month is not a full English month name".to_string(),
            ))
        }
    }

    NaiveDateTime::parse_from_str(text, HEADER_TIME_FORMAT)
        .map_err(|e| format_error(format!("header is not a start time ({})", e)))
}

/// Converts a float millisecond offset to a whole number of microseconds.
pub fn offset_to_delta(time_offset_ms: f64) -> Option<TimeDelta> {
    let micros = (time_offset_ms * 1000.0).round();
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(TimeDelta::microseconds(micros as i64))
}

/// Parses the data block of a recording held in memory.
///
/// `path` is only used to label errors.
pub fn parse_selfloops(path: &Path, text: &str, options: ParseOptions) -> Result<Series> {
    let lines: Vec<&str> = text.lines().collect();
    let header = match lines.first() {
        Some(line) => *line,
        None => {
            return Err(HrateError::Format {
                path: path.to_path_buf(),
                line: 1,
                text: String::new(),
                message: "file is empty".to_string(),
            })
        }
    };
    let start_time = parse_header(path, header)?;

    let skip_top = 1 + SEPARATOR_LINES + options.header_skip_rows;
    let data_end = lines.len().saturating_sub(options.footer_skip_rows);
    if data_end <= skip_top {
        warn!(
            "{} has {} lines, nothing left after skipping {} leading and {} trailing",
            path.display(),
            lines.len(),
            skip_top,
            options.footer_skip_rows
        );
        return Ok(Series::default());
    }

    let block = lines[skip_top..data_end].join("\n");
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // field count is checked per row below
        .trim(csv::Trim::All)
        .from_reader(block.as_bytes());

    let mut samples = Vec::with_capacity(data_end - skip_top);
    for result in rdr.records() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line() as usize).unwrap_or(1);
            HrateError::Format {
                path: path.to_path_buf(),
                line: skip_top + line,
                text: lines.get(skip_top + line - 1).unwrap_or(&"").to_string(),
                message: e.to_string(),
            }
        })?;
        let line = skip_top + record.position().map(|p| p.line() as usize).unwrap_or(1);
        samples.push((line, parse_row(path, line, &lines, &record)?));
    }

    let series = anchor_samples(path, start_time, &samples)?;
    debug!("{}: {} records", path.display(), series.len());
    Ok(series)
}

fn parse_row(
    path: &Path,
    line: usize,
    lines: &[&str],
    record: &csv::StringRecord,
) -> Result<RawSample> {
    let format_error = |message: String| HrateError::Format {
        path: path.to_path_buf(),
        line,
        text: lines.get(line - 1).unwrap_or(&"").to_string(),
        message,
    };

    if record.len() != 3 {
        return Err(format_error(format!(
            "expected 3 fields, found {}",
            record.len()
        )));
    }

    let mut values = [0.0f64; 3];
    for (value, field) in values.iter_mut().zip(record.iter()) {
        *value = field
            .parse::<f64>()
            .map_err(|e| format_error(format!("{:?} is not a number: {}", field, e)))?;
    }

    Ok(RawSample {
        time_offset_ms: values[0],
        heart_rate_bpm: values[1],
        rr_interval_ms: values[2],
    })
}

fn anchor_samples(
    path: &Path,
    start_time: NaiveDateTime,
    samples: &[(usize, RawSample)],
) -> Result<Series> {
    let mut timestamps = Vec::with_capacity(samples.len());
    for (line, sample) in samples {
        let timestamp = offset_to_delta(sample.time_offset_ms)
            .and_then(|delta| start_time.checked_add_signed(delta))
            .ok_or_else(|| HrateError::Format {
                path: path.to_path_buf(),
                line: *line,
                text: sample.time_offset_ms.to_string(),
                message: "time offset is out of range".to_string(),
            })?;
        timestamps.push(timestamp);
    }

    let Some(origin) = timestamps.iter().min().copied() else {
        return Ok(Series::default());
    };

    let records = samples
        .iter()
        .zip(timestamps)
        .map(|((_, sample), timestamp)| Record {
            timestamp,
            elapsed: timestamp - origin,
            heart_rate: sample.heart_rate_bpm,
            rr_interval: sample.rr_interval_ms,
        })
        .collect();

    Ok(Series::new(records))
}

/// Reads a recording as text. Device preambles are not always valid UTF-8, so bad bytes are
/// replaced rather than rejected.
pub fn read_recording_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|source| HrateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Reads one recording from disk.
pub fn read_selfloops_file(path: &Path, options: ParseOptions) -> Result<Series> {
    info!("Opening file {}", path.display());
    let text = read_recording_text(path)?;
    parse_selfloops(path, &text, options)
}

/// Name a recording is listed under.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// All recordings of one session, in listing order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    entries: Vec<(String, Series)>,
    index: HashMap<String, usize>,
}

impl Dataset {
    /// Adds a recording; a repeated name replaces the earlier series in place.
    pub fn insert(&mut self, name: String, series: Series) {
        match self.index.get(&name) {
            Some(&idx) => self.entries[idx].1 = series,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, series));
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<&Series> {
        self.index
            .get(name)
            .map(|&idx| &self.entries[idx].1)
            .ok_or_else(|| HrateError::UnknownRecording(name.to_string()))
    }

    pub fn list_available(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Series)> {
        self.entries.iter().map(|(name, series)| (name.as_str(), series))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resample(&self, name: &str, target_count: usize) -> Result<Cow<'_, [Record]>> {
        query::resample(self.get(name)?.records(), target_count)
    }

    pub fn slice_by_time(
        &self,
        name: &str,
        t_min: Option<NaiveDateTime>,
        t_max: Option<NaiveDateTime>,
    ) -> Result<Cow<'_, [Record]>> {
        Ok(query::slice_by_time(self.get(name)?.records(), t_min, t_max))
    }

    pub fn slice_by_time_capped(
        &self,
        name: &str,
        t_min: Option<NaiveDateTime>,
        t_max: Option<NaiveDateTime>,
        cap: TimeDelta,
    ) -> Result<Cow<'_, [Record]>> {
        query::slice_by_time_capped(self.get(name)?.records(), t_min, t_max, cap)
    }

    pub fn argmin_argmax(&self, name: &str, field: Field) -> Result<(Record, Record)> {
        query::argmin_argmax(self.get(name)?.records(), field)
    }
}

pub fn list_available(dataset: &Dataset) -> Vec<&str> {
    dataset.list_available()
}

#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: HrateError,
}

/// Outcome of loading a directory: every file either parsed or failed.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub dataset: Dataset,
    pub failures: Vec<LoadFailure>,
}

/// Regular files directly inside `dir` that pass `filter`, sorted by file name.
pub fn list_recording_files(dir: &Path, filter: &FileFilter) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            // a dangling link is kept so reading it reports the failure for that file
            Err(e) if e.depth() > 0 => match e.path() {
                Some(path) if filter.matches(path) => {
                    paths.push(path.to_path_buf());
                    continue;
                }
                Some(_) => continue,
                None => return Err(walk_error(dir, e)),
            },
            Err(e) => return Err(walk_error(dir, e)),
        };
        if entry.file_type().is_file() && filter.matches(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

fn walk_error(dir: &Path, e: walkdir::Error) -> HrateError {
    let path = e.path().unwrap_or(dir).to_path_buf();
    HrateError::Io {
        path,
        source: e.into(),
    }
}

/// Parses every matching recording in `dir`.
///
/// A file that fails to parse is reported in `failures` and loading continues with the rest.
/// Only an unreadable directory fails the whole call.
pub fn load_dataset(dir: &Path, filter: &FileFilter, options: ParseOptions) -> Result<LoadReport> {
    let mut report = LoadReport::default();

    for path in list_recording_files(dir, filter)? {
        match read_selfloops_file(&path, options) {
            Ok(series) => report.dataset.insert(display_name(&path), series),
            Err(error) => {
                warn!("Skipping {}: {}", path.display(), error);
                report.failures.push(LoadFailure { path, error });
            }
        }
    }

    info!(
        "Loaded {} recordings from {} ({} failed)",
        report.dataset.len(),
        dir.display(),
        report.failures.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn recording(preamble: usize, rows: &[&str], trailer: usize) -> String {
        let mut lines = vec!["04 August 2017 00:00:00".to_string()];
        lines.extend((0..preamble + SEPARATOR_LINES).map(|i| format!("device meta {}", i)));
        lines.extend(rows.iter().map(|r| r.to_string()));
        lines.extend((0..trailer).map(|i| format!("trailer {}", i)));
        lines.join("\n") + "\n"
    }

    fn opts(header: usize, footer: usize) -> ParseOptions {
        ParseOptions {
            header_skip_rows: header,
            footer_skip_rows: footer,
        }
    }

    #[test]
    fn header_uses_day_month_name_year() {
        let t = parse_header(Path::new("x"), "04 August 2017 13:05:09\r").unwrap();
        let expected = NaiveDate::from_ymd_opt(2017, 8, 4)
            .unwrap()
            .and_hms_opt(13, 5, 9)
            .unwrap();
        assert_eq!(t, expected);
    }

    #[test]
    fn header_rejects_abbreviated_month() {
        let err = parse_header(Path::new("x"), "04 Aug 2017 00:00:00").unwrap_err();
        assert!(matches!(err, HrateError::Format { line: 1, .. }));
    }

    #[test]
    fn header_rejects_surrounding_whitespace() {
        for line in [
            "  04 August 2017 00:00:00  ",
            "04 August 2017 00:00:00 ",
            " 04 August 2017 00:00:00",
        ] {
            match parse_header(Path::new("x"), line) {
                Err(HrateError::Format { text, .. }) => assert_eq!(text, line),
                other => panic!("{:?} parsed as {:?}", line, other),
            }
        }
    }

    #[test]
    fn bad_header_is_format_error_with_text() {
        let text = "2017-08-04 00:00:00\n1,2,3\n";
        match parse_selfloops(Path::new("r.txt"), text, opts(0, 0)) {
            Err(HrateError::Format { line, text, .. }) => {
                assert_eq!(line, 1);
                assert_eq!(text, "2017-08-04 00:00:00");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn empty_file_is_format_error() {
        assert!(matches!(
            parse_selfloops(Path::new("r.txt"), "", ParseOptions::default()),
            Err(HrateError::Format { .. })
        ));
    }

    #[test]
    fn rows_are_anchored_to_header_time() {
        let text = recording(2, &["0,60,1000", "1000.5,61,999.5", "+2000,-1.5e1,1e3"], 1);
        let series = parse_selfloops(Path::new("r.txt"), &text, opts(2, 1)).unwrap();
        assert_eq!(series.len(), 3);

        let records = series.records();
        assert_eq!(records[0].elapsed, TimeDelta::zero());
        assert_eq!(
            records[1].timestamp - records[0].timestamp,
            TimeDelta::microseconds(1_000_500)
        );
        assert_eq!(records[1].elapsed, TimeDelta::microseconds(1_000_500));
        assert_eq!(records[2].heart_rate, -15.0);
        assert_eq!(records[2].rr_interval, 1000.0);
    }

    #[test]
    fn elapsed_is_measured_from_earliest_timestamp() {
        let text = recording(0, &["500,60,1000", "100,61,999"], 0);
        let series = parse_selfloops(Path::new("r.txt"), &text, opts(0, 0)).unwrap();
        assert_eq!(series.records()[0].elapsed, TimeDelta::milliseconds(400));
        assert_eq!(series.records()[1].elapsed, TimeDelta::zero());
    }

    #[test]
    fn row_with_two_fields_reports_its_line() {
        let text = recording(3, &["0,60,1000", "1000,61"], 2);
        match parse_selfloops(Path::new("r.txt"), &text, opts(3, 2)) {
            Err(HrateError::Format { line, text, .. }) => {
                // header + separator + 3 preamble + first row
                assert_eq!(line, 7);
                assert_eq!(text, "1000,61");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn non_numeric_field_is_rejected() {
        let text = recording(0, &["0,sixty,1000"], 0);
        assert!(matches!(
            parse_selfloops(Path::new("r.txt"), &text, opts(0, 0)),
            Err(HrateError::Format { line: 3, .. })
        ));
    }

    #[test]
    fn short_file_yields_empty_series() {
        let text = recording(1, &[], 1);
        let series = parse_selfloops(Path::new("r.txt"), &text, opts(30, 30)).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn dataset_keeps_insertion_order() {
        let mut dataset = Dataset::default();
        dataset.insert("b.txt".to_string(), Series::default());
        dataset.insert("a.txt".to_string(), Series::default());
        dataset.insert("b.txt".to_string(), Series::default());
        assert_eq!(dataset.list_available(), vec!["b.txt", "a.txt"]);
        assert!(matches!(
            dataset.get("c.txt"),
            Err(HrateError::UnknownRecording(_))
        ));
    }
}
