//! Capture file loading for the driver binary.
//!
//! Turns a CSV export or the upload layer's JSON document into a
//! [`RawTable`]. This is the only place the engine touches the filesystem.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use milbus_diagnostics::{Cell, RawTable};

/// Load a capture table, choosing the reader from the file extension.
///
/// - `.csv`: header row gives the columns; cell types are inferred
/// - `.json` / `.txt`: either a bare `{columns, rows}` table or an upload
///   response carrying it under `parsedData`
pub fn load_table(path: &Path) -> Result<RawTable> {
    // ---
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    let table = match ext.as_str() {
        "csv" => read_csv(reader),
        "json" | "txt" => read_json(reader),
        other => Err(anyhow!("Unsupported capture format '.{}'", other)),
    }
    .with_context(|| format!("Failed to read capture {}", path.display()))?;

    tracing::debug!(
        "Loaded {} rows x {} columns from {}",
        table.rows.len(),
        table.columns.len(),
        path.display()
    );
    Ok(table)
}

pub fn read_csv<R: Read>(reader: R) -> Result<RawTable> {
    // ---
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut table = RawTable::new(columns.clone());
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("Bad CSV record {}", i + 1))?;
        table.push_row(
            columns
                .iter()
                .zip(record.iter())
                .map(|(c, v)| (c.clone(), infer_cell(v))),
        );
    }
    Ok(table)
}

/// CSV carries no types: blank is null, then integer, then float, else text.
fn infer_cell(field: &str) -> Cell {
    // ---
    let s = field.trim();
    if s.is_empty() {
        return Cell::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Cell::Int(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Cell::Float(f);
    }
    Cell::text(field)
}

pub fn read_json<R: Read>(reader: R) -> Result<RawTable> {
    // ---
    let mut doc: serde_json::Value = serde_json::from_reader(reader)?;
    if let Some(inner) = doc.get_mut("parsedData") {
        doc = inner.take();
    }
    serde_json::from_value(doc).context("JSON is not a {columns, rows} table")
}
