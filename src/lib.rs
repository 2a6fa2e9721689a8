pub mod config;
pub mod data_loading;
pub mod output;
pub mod query;

use chrono::{NaiveDateTime, TimeDelta};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub use data_loading::{load_dataset, read_selfloops_file, Dataset, LoadFailure, LoadReport};
pub use query::{argmin_argmax, histogram, resample, slice_by_time, slice_by_time_capped};

#[derive(Debug, Error)]
pub enum HrateError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message} ({text:?})", path.display())]
    Format {
        path: PathBuf,
        line: usize,
        text: String,
        message: String,
    },

    #[error("no records in the selected range")]
    EmptySeries,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown recording: {0}")]
    UnknownRecording(String),
}

pub type Result<T, E = HrateError> = std::result::Result<T, E>;

/// One beat of a parsed recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    pub timestamp: NaiveDateTime,
    /// Time since the earliest timestamp of the recording.
    pub elapsed: TimeDelta,
    pub heart_rate: f64,
    pub rr_interval: f64,
}

/// Value column a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    HeartRate, // bpm
    RrInterval, // ms
}

impl Field {
    pub fn value(self, record: &Record) -> f64 {
        match self {
            Field::HeartRate => record.heart_rate,
            Field::RrInterval => record.rr_interval,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::HeartRate => "heart_rate",
            Field::RrInterval => "rr_interval",
        }
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hr" | "heart_rate" => Ok(Field::HeartRate),
            "rr" | "rr_interval" => Ok(Field::RrInterval),
            _ => Err(format!(
                "Invalid field: {}. Use hr for heart rate or rr for RR interval",
                s
            )),
        }
    }
}

/// Parsed recording, immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    records: Vec<Record>,
}

impl Series {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&Record> {
        self.records.last()
    }
}

impl From<Vec<Record>> for Series {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}
