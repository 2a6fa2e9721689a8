//! Range and summary queries over a parsed recording.
//!
//! Every function takes the records of one series in file order and borrows them whenever
//! the result is a contiguous run of the input.

use crate::{Field, HrateError, Record, Result};
use chrono::{NaiveDateTime, TimeDelta};
use log::trace;
use serde::Serialize;
use std::borrow::Cow;

/// Keeps every `step`-th record so that roughly `target_count` remain.
///
/// Series shorter than `target_count` are returned as they are.
pub fn resample(records: &[Record], target_count: usize) -> Result<Cow<'_, [Record]>> {
    if target_count < 1 {
        return Err(HrateError::InvalidParameter(
            "resample target must be at least 1".to_string(),
        ));
    }
    if records.len() < target_count {
        return Ok(Cow::Borrowed(records));
    }

    let step = records.len() / target_count;
    trace!("Resampling {} records with step {}", records.len(), step);
    Ok(Cow::Owned(records.iter().step_by(step).copied().collect()))
}

/// Records with `t_min < timestamp < t_max`.
///
/// Both bounds are exclusive. A missing bound or a reversed range selects nothing.
/// Time-ordered input is sliced in place; out-of-order input is filtered into a copy.
pub fn slice_by_time(
    records: &[Record],
    t_min: Option<NaiveDateTime>,
    t_max: Option<NaiveDateTime>,
) -> Cow<'_, [Record]> {
    let (Some(t_min), Some(t_max)) = (t_min, t_max) else {
        return Cow::Borrowed(&[]);
    };
    if t_max <= t_min {
        return Cow::Borrowed(&[]);
    }

    let inside = |r: &Record| r.timestamp > t_min && r.timestamp < t_max;
    if !records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
        trace!("Records out of time order, filtering");
        return Cow::Owned(records.iter().filter(|r| inside(*r)).copied().collect());
    }

    let start = records.partition_point(|r| r.timestamp <= t_min);
    let end = records.partition_point(|r| r.timestamp < t_max);
    if start >= end {
        return Cow::Borrowed(&[]);
    }
    Cow::Borrowed(&records[start..end])
}

/// Like [`slice_by_time`] with `t_max` clamped to `t_min + cap`.
pub fn slice_by_time_capped(
    records: &[Record],
    t_min: Option<NaiveDateTime>,
    t_max: Option<NaiveDateTime>,
    cap: TimeDelta,
) -> Result<Cow<'_, [Record]>> {
    if cap < TimeDelta::zero() {
        return Err(HrateError::InvalidParameter(format!(
            "cap duration must not be negative, got {} ms",
            cap.num_milliseconds()
        )));
    }
    let (Some(t_min), Some(t_max)) = (t_min, t_max) else {
        return Ok(Cow::Borrowed(&[]));
    };
    if t_min > t_max {
        return Err(HrateError::InvalidParameter(format!(
            "range start {} is after its end {}",
            t_min, t_max
        )));
    }

    let limit = t_min.checked_add_signed(cap).unwrap_or(NaiveDateTime::MAX);
    Ok(slice_by_time(records, Some(t_min), Some(t_max.min(limit))))
}

/// Records holding the smallest and the largest value of `field`.
///
/// The first occurrence wins on ties. NaN values are never selected.
pub fn argmin_argmax(records: &[Record], field: Field) -> Result<(Record, Record)> {
    let mut values = records
        .iter()
        .filter(|r| !field.value(r).is_nan());
    let first = values.next().ok_or(HrateError::EmptySeries)?;

    let (mut min, mut max) = (first, first);
    for record in values {
        let value = field.value(record);
        if value < field.value(min) {
            min = record;
        }
        if value > field.value(max) {
            max = record;
        }
    }
    Ok((*min, *max))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// `counts.len() + 1` bin edges, ascending.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Equal-width histogram of `field` between its minimum and maximum.
pub fn histogram(records: &[Record], field: Field, bins: usize) -> Result<Histogram> {
    if bins < 1 {
        return Err(HrateError::InvalidParameter(
            "histogram needs at least one bin".to_string(),
        ));
    }
    let (min, max) = argmin_argmax(records, field)?;
    let (lo, hi) = (field.value(&min), field.value(&max));
    let width = (hi - lo) / bins as f64;

    let edges = (0..=bins)
        .map(|i| if i == bins { hi } else { lo + width * i as f64 })
        .collect();
    let mut counts = vec![0usize; bins];
    for value in records.iter().map(|r| field.value(r)).filter(|v| !v.is_nan()) {
        let idx = if width > 0.0 {
            (((value - lo) / width) as usize).min(bins - 1)
        } else {
            0
        };
        counts[idx] += 1;
    }

    Ok(Histogram { edges, counts })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremes {
    pub min: f64,
    pub min_at: NaiveDateTime,
    pub max: f64,
    pub max_at: NaiveDateTime,
}

impl Extremes {
    fn of(records: &[Record], field: Field) -> Result<Self> {
        let (min, max) = argmin_argmax(records, field)?;
        Ok(Self {
            min: field.value(&min),
            min_at: min.timestamp,
            max: field.value(&max),
            max_at: max.timestamp,
        })
    }
}

/// Min/max overview of a range, as shown next to the detail chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_ms: i64,
    pub heart_rate: Extremes,
    pub rr_interval: Extremes,
}

pub fn summarize(records: &[Record]) -> Result<Summary> {
    let (first, last) = match (records.first(), records.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(HrateError::EmptySeries),
    };

    Ok(Summary {
        count: records.len(),
        start: first.timestamp,
        end: last.timestamp,
        duration_ms: (last.timestamp - first.timestamp).num_milliseconds(),
        heart_rate: Extremes::of(records, Field::HeartRate)?,
        rr_interval: Extremes::of(records, Field::RrInterval)?,
    })
}
