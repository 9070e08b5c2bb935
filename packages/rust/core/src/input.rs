//! ID source: one column of a CSV export of the ID table.

use std::path::Path;

use innscan_shared::{InnScanError, Result};
use tracing::debug;

/// Read the raw values of `column` from the CSV file at `path`, in row order.
///
/// Values are trimmed and otherwise returned as-is; validation happens later,
/// per ID. Comma- and semicolon-separated files are both accepted.
pub fn read_ids(path: &Path, column: &str) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| InnScanError::Input(format!("cannot read {}: {e}", path.display())))?;
    let content = content.trim_start_matches('\u{feff}');

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| InnScanError::Input(format!("{}: {e}", path.display())))?;
    let index = headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| {
            InnScanError::Input(format!(
                "column '{column}' not found in {}",
                path.display()
            ))
        })?;

    let mut ids = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            InnScanError::Input(format!("{}: row {}: {e}", path.display(), row + 2))
        })?;
        ids.push(record.get(index).unwrap_or_default().trim().to_string());
    }

    debug!(path = %path.display(), count = ids.len(), "read ID list");
    Ok(ids)
}

/// Spreadsheet exports in Russian locales separate fields with `;`.
fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    if header.contains(';') && !header.contains(',') {
        b';'
    } else {
        b','
    }
}
