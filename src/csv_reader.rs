use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::data::RecordTable;

/// Read a record table from any CSV source with a header row.
pub fn read_csv<R: Read>(reader: R) -> Result<RecordTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_idx, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV row {}", row_idx + 1))?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }

    Ok(RecordTable::new(headers, rows))
}

pub fn read_csv_file(path: &Path) -> Result<RecordTable> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open '{}'", path.display()))?;
    read_csv(file).with_context(|| format!("Failed to parse '{}'", path.display()))
}
