use crate::error::Result;
use crate::types::AnnotatedForecastPoint;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

pub const CSV_HEADER: [&str; 8] = [
    "ds",
    "yhat",
    "yhat_lower",
    "yhat_upper",
    "Suggested_Inventory",
    "Current_Stock",
    "Stockout_Risk",
    "Product",
];

fn bool_field(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

/// Write annotated rows as CSV, header first.
pub fn write_csv<W: Write>(rows: &[AnnotatedForecastPoint], writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(CSV_HEADER)?;
    for row in rows {
        out.write_record([
            row.ds.format("%Y-%m-%d").to_string(),
            row.yhat.to_string(),
            row.yhat_lower.to_string(),
            row.yhat_upper.to_string(),
            row.suggested_inventory.to_string(),
            row.current_stock.to_string(),
            bool_field(row.stockout_risk).to_string(),
            row.product.clone(),
        ])?;
    }
    out.flush()?;
    Ok(())
}

pub fn to_csv_bytes(rows: &[AnnotatedForecastPoint]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    Ok(buf)
}

/// Write the CSV next to `path` and rename it into place.
pub fn write_csv_file(path: &Path, rows: &[AnnotatedForecastPoint]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    write_csv(rows, &mut tmp)?;
    tmp.persist(path).map_err(|e| e.error)?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "wrote forecast csv");
    Ok(())
}
