use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;

use super::conditioning::Conditioner;
use super::model::{ReferenceEntry, ReferenceTable, CHANNELS};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a reference table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.json` – `{ "label": [c0, …, c5], … }` or `[{ "label": …, "spectrum": [...] }, …]`
/// * `.csv`  – a `label` column plus six channel columns, left to right
///
/// With `conditioner = Some(..)` the spectra are raw counts and are
/// conditioned exactly like live samples; with `None` they are taken as
/// already-conditioned vectors. Table order is file order.
pub fn load_references(path: &Path, conditioner: Option<&Conditioner>) -> Result<ReferenceTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let spectra = match ext.as_str() {
        "json" => read_json(path)?,
        "csv" => read_csv(path)?,
        other => bail!("Unsupported reference file extension: .{other}"),
    };

    let table = match conditioner {
        Some(c) => ReferenceTable::from_spectra(spectra, c),
        None => ReferenceTable::new(
            spectra
                .into_iter()
                .map(|(label, vector)| ReferenceEntry { label, vector })
                .collect(),
        ),
    }
    .with_context(|| format!("building reference table from {}", path.display()))?;

    log::info!("Loaded {} reference spectra from {}", table.len(), path.display());
    Ok(table)
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Both shapes are accepted:
///
/// ```json
/// { "Polyethylene (PE)": [1200, 1500, 1100, 1300, 1400, 1250] }
/// ```
///
/// ```json
/// [ { "label": "Polyethylene (PE)", "spectrum": [1200, 1500, 1100, 1300, 1400, 1250] } ]
/// ```
fn read_json(path: &Path) -> Result<Vec<(String, [f64; CHANNELS])>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;
    parse_json(&root)
}

fn parse_json(root: &JsonValue) -> Result<Vec<(String, [f64; CHANNELS])>> {
    match root {
        JsonValue::Object(map) => map
            .iter()
            .map(|(label, spectrum)| Ok((label.clone(), json_spectrum(Some(spectrum), label)?)))
            .collect(),
        JsonValue::Array(records) => records
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                let obj = rec
                    .as_object()
                    .with_context(|| format!("Row {i} is not a JSON object"))?;
                let label = obj
                    .get("label")
                    .and_then(|l| l.as_str())
                    .with_context(|| format!("Row {i}: missing or invalid 'label'"))?;
                Ok((label.to_string(), json_spectrum(obj.get("spectrum"), label)?))
            })
            .collect(),
        _ => bail!("Expected a top-level JSON object or array"),
    }
}

fn json_spectrum(val: Option<&JsonValue>, label: &str) -> Result<[f64; CHANNELS]> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("'{label}': missing or invalid spectrum array"))?;

    let values = arr
        .iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("'{label}'[{j}]: not a number"))
        })
        .collect::<Result<Vec<f64>>>()?;

    to_channels(values, label)
}

fn to_channels(values: Vec<f64>, label: &str) -> Result<[f64; CHANNELS]> {
    let n = values.len();
    <[f64; CHANNELS]>::try_from(values)
        .map_err(|_| anyhow::anyhow!("'{label}': expected {CHANNELS} channels, found {n}"))
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// CSV layout: header row, one `label` column, every other column is a
/// channel in left-to-right order.
fn read_csv(path: &Path) -> Result<Vec<(String, [f64; CHANNELS])>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let label_idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("label"))
        .context("CSV missing 'label' column")?;

    let mut spectra = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let label = record.get(label_idx).unwrap_or("").trim().to_string();

        let values = record
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != label_idx)
            .map(|(i, tok)| {
                tok.trim().parse::<f64>().with_context(|| {
                    format!("Row {row_no}, {}: '{tok}' is not a number", headers[i])
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        spectra.push((label.clone(), to_channels(values, &label)?));
    }
    Ok(spectra)
}
