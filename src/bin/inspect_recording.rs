use anyhow::{Context, Result};
use hrate::data_loading::{parse_header, read_recording_text};
use std::path::Path;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        println!("Usage: {} <recording>", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);
    let text = read_recording_text(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let lines: Vec<&str> = text.lines().collect();

    let header = lines.first().copied().unwrap_or_default();
    let start = parse_header(path, header)?;
    println!("Start time: {}", start);
    println!("Lines:      {}", lines.len());

    // first and last line that look like a data row
    let is_row = |line: &&str| {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        fields.len() == 3 && fields.iter().all(|f| f.parse::<f64>().is_ok())
    };
    match lines.iter().position(|l| is_row(l)) {
        Some(idx) => println!("First data row at line {}: {}", idx + 1, lines[idx]),
        None => println!("No data rows found"),
    }
    if let Some(idx) = lines.iter().rposition(|l| is_row(l)) {
        println!("Last data row at line {}: {}", idx + 1, lines[idx]);
        println!(
            "Suggested --header-skip-rows {} --footer-skip-rows {}",
            lines.iter().position(|l| is_row(l)).unwrap_or(2).saturating_sub(2),
            lines.len() - idx - 1
        );
    }

    Ok(())
}
