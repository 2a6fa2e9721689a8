use crate::Record;
use anyhow::Result;
use log::info;
use std::io::Write;
use std::path::Path;

pub const CSV_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub fn write_records<W: Write>(writer: W, records: &[Record]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    writer.write_record(["timestamp", "elapsed_ms", "heart_rate", "rr_interval"])?;
    for record in records {
        writer.write_record(&[
            record.timestamp.format(CSV_TIME_FORMAT).to_string(),
            record.elapsed.num_milliseconds().to_string(),
            record.heart_rate.to_string(),
            record.rr_interval.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_series_csv(path: &Path, records: &[Record]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    info!("Writing {} records to {}", records.len(), path.display());
    let file = std::fs::File::create(path)?;
    write_records(file, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    #[test]
    fn writes_header_and_millisecond_columns() {
        let t = NaiveDate::from_ymd_opt(2017, 8, 4)
            .unwrap()
            .and_hms_milli_opt(0, 0, 1, 250)
            .unwrap();
        let records = [Record {
            timestamp: t,
            elapsed: TimeDelta::milliseconds(1250),
            heart_rate: 61.5,
            rr_interval: 975.0,
        }];

        let mut buf = Vec::new();
        write_records(&mut buf, &records).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "timestamp,elapsed_ms,heart_rate,rr_interval\n2017-08-04 00:00:01.250,1250,61.5,975\n"
        );
    }
}
