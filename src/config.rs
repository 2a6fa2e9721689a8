use crate::{Field, HrateError, Result};
use chrono::{NaiveDateTime, TimeDelta};
use clap::Parser;
use std::path::{Path, PathBuf};

pub const DEFAULT_HEADER_SKIP_ROWS: usize = 30;
pub const DEFAULT_FOOTER_SKIP_ROWS: usize = 30;
pub const DEFAULT_RESAMPLE_TARGET: usize = 1000;
pub const DEFAULT_DETAIL_CAP_SECONDS: i64 = 300;

/// Format of `--start`/`--end` on the command line.
pub const CLI_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Size of the device preamble and trailer around the data block.
///
/// Firmware versions differ in how much metadata they write, so both counts are overridable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub header_skip_rows: usize,
    pub footer_skip_rows: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            header_skip_rows: DEFAULT_HEADER_SKIP_ROWS,
            footer_skip_rows: DEFAULT_FOOTER_SKIP_ROWS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Upper bound on points drawn for an overview.
    pub resample_target: usize,
    /// Widest time range a detail view will return.
    pub detail_cap: TimeDelta,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            resample_target: DEFAULT_RESAMPLE_TARGET,
            detail_cap: TimeDelta::seconds(DEFAULT_DETAIL_CAP_SECONDS),
        }
    }
}

/// Which directory entries are treated as recordings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    /// Case-insensitive extension without the dot; `None` accepts every file.
    pub extension: Option<String>,
}

impl FileFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_extension(ext: &str) -> Self {
        Self {
            extension: Some(ext.trim_start_matches('.').to_string()),
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        match &self.extension {
            None => true,
            Some(wanted) => path
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(wanted))
                .unwrap_or(false),
        }
    }
}

/// Load beat-by-beat recordings and query them
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory containing the recordings
    #[arg(help = "Directory containing the recordings")]
    pub input_dir: PathBuf,

    /// Only load files with this extension (e.g. txt)
    #[arg(long)]
    pub extension: Option<String>,

    /// Device preamble rows after the header and separator lines
    #[arg(long, default_value_t = DEFAULT_HEADER_SKIP_ROWS)]
    pub header_skip_rows: usize,

    /// Device trailer rows at the end of the file
    #[arg(long, default_value_t = DEFAULT_FOOTER_SKIP_ROWS)]
    pub footer_skip_rows: usize,

    /// Recording to query, defaults to the first one listed
    #[arg(long)]
    pub recording: Option<String>,

    /// Field for extremum and histogram queries (hr or rr)
    #[arg(long, default_value = "hr")]
    pub field: Field,

    /// Start of the detail range (format: YYYY-MM-DD HH:MM:SS), defaults to the first record
    #[arg(long)]
    pub start: Option<String>,

    /// End of the detail range (format: YYYY-MM-DD HH:MM:SS), defaults to the last record
    #[arg(long)]
    pub end: Option<String>,

    /// Target point count of the decimated overview
    #[arg(long, default_value_t = DEFAULT_RESAMPLE_TARGET, env = "HRATE_RESAMPLE_TARGET")]
    pub resample_target: usize,

    /// Widest detail range in seconds
    #[arg(long, default_value_t = DEFAULT_DETAIL_CAP_SECONDS, env = "HRATE_DETAIL_CAP_SECONDS")]
    pub detail_cap_seconds: i64,

    /// Number of histogram bins for the detail range
    #[arg(long, default_value = "20")]
    pub histogram_bins: usize,

    /// Write the detail range to this CSV file
    #[arg(long)]
    pub csv_output: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl Args {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            header_skip_rows: self.header_skip_rows,
            footer_skip_rows: self.footer_skip_rows,
        }
    }

    pub fn query_options(&self) -> Result<QueryOptions> {
        let detail_cap = TimeDelta::try_seconds(self.detail_cap_seconds).ok_or_else(|| {
            HrateError::InvalidParameter(format!(
                "detail cap of {} seconds is out of range",
                self.detail_cap_seconds
            ))
        })?;
        Ok(QueryOptions {
            resample_target: self.resample_target,
            detail_cap,
        })
    }

    pub fn file_filter(&self) -> FileFilter {
        match &self.extension {
            Some(ext) => FileFilter::with_extension(ext),
            None => FileFilter::any(),
        }
    }
}

pub fn parse_cli_time(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), CLI_TIME_FORMAT).map_err(|e| {
        HrateError::InvalidParameter(format!(
            "time {:?} does not match {}: {}",
            value, CLI_TIME_FORMAT, e
        ))
    })
}
