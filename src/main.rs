use anyhow::{bail, Context};
use clap::Parser;
use hrate::config::{parse_cli_time, Args};
use hrate::data_loading::load_dataset;
use hrate::output::write_series_csv;
use hrate::query::{self, summarize};
use log::{debug, warn};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let query_options = args.query_options()?;

    let report = load_dataset(&args.input_dir, &args.file_filter(), args.parse_options())
        .with_context(|| format!("Failed to list {}", args.input_dir.display()))?;
    for failure in &report.failures {
        eprintln!("Could not load {}: {}", failure.path.display(), failure.error);
    }

    let dataset = report.dataset;
    let available = dataset.list_available();
    if available.is_empty() {
        bail!("No recordings loaded from {}", args.input_dir.display());
    }

    println!("Found {} recordings:", available.len());
    for (name, series) in dataset.iter() {
        println!("  {} ({} records)", name, series.len());
    }

    let name = match &args.recording {
        Some(name) => name.as_str(),
        None => available[0],
    };
    let series = dataset.get(name)?;

    let overview = dataset.resample(name, query_options.resample_target)?;
    println!(
        "\n{}: overview of {} points from {} records",
        name,
        overview.len(),
        series.len()
    );

    let t_min = match &args.start {
        Some(s) => Some(parse_cli_time(s)?),
        // bounds are exclusive, step just outside the recording
        None => series.first().map(|r| r.timestamp - chrono::TimeDelta::milliseconds(1)),
    };
    let t_max = match &args.end {
        Some(s) => Some(parse_cli_time(s)?),
        None => series.last().map(|r| r.timestamp + chrono::TimeDelta::milliseconds(1)),
    };
    debug!("Detail range {:?} .. {:?}", t_min, t_max);

    let detail = dataset.slice_by_time_capped(name, t_min, t_max, query_options.detail_cap)?;
    if detail.is_empty() {
        warn!("No records in the selected range");
        println!("No data in the selected range");
        return Ok(());
    }

    let summary = summarize(&detail)?;
    let histogram = query::histogram(&detail, args.field, args.histogram_bins)?;

    if args.json {
        let out = serde_json::json!({
            "recording": name,
            "field": args.field.name(),
            "summary": summary,
            "histogram": histogram,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "Detail {} to {}: {} records",
            summary.start.format("%Y-%m-%d %H:%M:%S"),
            summary.end.format("%Y-%m-%d %H:%M:%S"),
            summary.count
        );
        println!(
            "  heart rate  min {:.1} bpm at {}, max {:.1} bpm at {}",
            summary.heart_rate.min,
            summary.heart_rate.min_at.format("%H:%M:%S"),
            summary.heart_rate.max,
            summary.heart_rate.max_at.format("%H:%M:%S")
        );
        println!(
            "  RR interval min {:.0} ms at {}, max {:.0} ms at {}",
            summary.rr_interval.min,
            summary.rr_interval.min_at.format("%H:%M:%S"),
            summary.rr_interval.max,
            summary.rr_interval.max_at.format("%H:%M:%S")
        );
        println!("  {} histogram:", args.field.name());
        for (i, count) in histogram.counts.iter().enumerate() {
            println!(
                "    [{:8.1}, {:8.1}) {}",
                histogram.edges[i],
                histogram.edges[i + 1],
                count
            );
        }
    }

    if let Some(path) = &args.csv_output {
        write_series_csv(path, &detail)?;
    }

    Ok(())
}
