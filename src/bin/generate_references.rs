//! Write the built-in reference spectra to a file that can be edited and
//! passed back with `--references`.
//!
//! Usage: `generate_references [path]` (`.json` by default, `.csv` also works)

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value as JsonValue};

use plastiscan::data::model::{BUILTIN_REFERENCES, CHANNELS};

fn write_json(path: &PathBuf) -> Result<()> {
    let table: Map<String, JsonValue> = BUILTIN_REFERENCES
        .iter()
        .map(|(label, raw)| (label.to_string(), JsonValue::from(raw.to_vec())))
        .collect();
    let text = serde_json::to_string_pretty(&table).context("serialising references")?;
    std::fs::write(path, text + "\n").with_context(|| format!("writing {}", path.display()))
}

fn write_csv(path: &PathBuf) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    let mut header = vec!["label".to_string()];
    header.extend((0..CHANNELS).map(|i| format!("ch{i}")));
    writer.write_record(&header)?;
    for (label, raw) in BUILTIN_REFERENCES {
        let mut row = vec![label.to_string()];
        row.extend(raw.iter().map(|v| v.to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let output_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("reference_spectra.json"));

    let ext = output_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "json" => write_json(&output_path)?,
        "csv" => write_csv(&output_path)?,
        other => bail!("Unsupported output extension: .{other}"),
    }

    println!(
        "Wrote {} reference spectra ({CHANNELS} channels each) to {}",
        BUILTIN_REFERENCES.len(),
        output_path.display()
    );
    Ok(())
}
