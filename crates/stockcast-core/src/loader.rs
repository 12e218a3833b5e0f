//! Upload parsing and validation.
//!
//! An upload is read as comma-delimited text first and as a workbook
//! (xlsx, xls, xlsb, ods; first sheet) when that fails. Cell values are then
//! coerced leniently: rows with an unparseable `Date` are dropped and
//! non-numeric `Units_Sold` / `Current_Stock` values become 0.
//!
//! Only headers are trimmed on read. Dates and numbers are trimmed where
//! they are coerced; `Product` values are kept exactly as written.

use crate::error::{Result, StockcastError};
use crate::types::{SalesRecord, SalesTable};
use calamine::{Data, Reader};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use std::io::Cursor;

pub const COL_DATE: &str = "Date";
pub const COL_PRODUCT: &str = "Product";
pub const COL_UNITS_SOLD: &str = "Units_Sold";
pub const COL_CURRENT_STOCK: &str = "Current_Stock";

const REQUIRED_COLUMNS: [&str; 3] = [COL_DATE, COL_PRODUCT, COL_UNITS_SOLD];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%b %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

// ---------------------------------------------------------------------------
// RawTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    DelimitedText,
    Workbook,
}

/// A single parsed cell before column coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

/// Header row plus typed cells, as read from the upload.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub format: SourceFormat,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse raw upload bytes as delimited text, falling back to a workbook.
pub fn parse_upload(bytes: &[u8]) -> Result<RawTable> {
    let text_err = match parse_delimited(bytes) {
        Ok(table) => return Ok(table),
        Err(e) => e,
    };
    tracing::debug!(reason = %text_err, "upload is not delimited text, trying workbook");

    parse_workbook(bytes).map_err(|workbook| StockcastError::UnsupportedFormat {
        text: text_err,
        workbook,
    })
}

fn parse_delimited(bytes: &[u8]) -> std::result::Result<RawTable, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| format!("not UTF-8: {e}"))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err("no columns to parse".to_string());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        if record.len() > headers.len() {
            return Err(format!(
                "line {}: expected {} fields, saw {}",
                i + 2,
                headers.len(),
                record.len()
            ));
        }
        let cells = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(field.to_string())
                }
            })
            .collect();
        rows.push(cells);
    }

    Ok(RawTable {
        format: SourceFormat::DelimitedText,
        headers,
        rows,
    })
}

fn parse_workbook(bytes: &[u8]) -> std::result::Result<RawTable, String> {
    let mut workbook =
        calamine::open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| "workbook has no sheets".to_string())?
        .map_err(|e| e.to_string())?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| "first sheet is empty".to_string())?
        .iter()
        .map(|d| product_text(&cell_from_data(d)).trim().to_string())
        .collect();

    let rows = rows
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect();

    Ok(RawTable {
        format: SourceFormat::Workbook,
        headers,
        rows,
    })
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(d) => Cell::DateTime(d),
            None => Cell::Number(dt.as_f64()),
        },
    }
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

/// Interpret a cell as a calendar date. `None` means the row is dropped.
///
/// Bare numbers only come from workbook cells and are read as Excel serial
/// day numbers (1900 date system).
pub fn coerce_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Text(s) => parse_date_text(s),
        Cell::DateTime(dt) => Some(dt.date()),
        Cell::Number(n) => excel_serial_date(*n),
        Cell::Bool(_) | Cell::Empty => None,
    }
}

/// Interpret a cell as a number, with 0.0 for anything that is not one.
pub fn coerce_number(cell: &Cell) -> f64 {
    let value = match cell {
        Cell::Number(n) => *n,
        Cell::Bool(b) => f64::from(u8::from(*b)),
        Cell::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Cell::DateTime(_) | Cell::Empty => 0.0,
    };
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        let year = s[..4].parse().ok()?;
        let month = s[4..6].parse().ok()?;
        let day = s[6..].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

fn excel_serial_date(serial: f64) -> Option<NaiveDate> {
    // Serial 2958465 is 9999-12-31.
    if !serial.is_finite() || !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

fn product_text(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Text(s) => s.clone(),
        Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Cell::Number(n) => n.to_string(),
        Cell::Bool(true) => "True".to_string(),
        Cell::Bool(false) => "False".to_string(),
        Cell::DateTime(dt) => dt.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check required columns and coerce every row into a [`SalesRecord`].
pub fn validate(raw: &RawTable) -> Result<SalesTable> {
    let indices: Vec<usize> = REQUIRED_COLUMNS
        .iter()
        .filter_map(|name| raw.column(name))
        .collect();
    if indices.len() != REQUIRED_COLUMNS.len() {
        let missing = REQUIRED_COLUMNS
            .iter()
            .filter(|name| raw.column(name).is_none())
            .map(|name| name.to_string())
            .collect();
        return Err(StockcastError::MissingColumns(missing));
    }
    let (date_idx, product_idx, units_idx) = (indices[0], indices[1], indices[2]);
    let stock_idx = raw.column(COL_CURRENT_STOCK);

    let mut table = SalesTable {
        has_current_stock: stock_idx.is_some(),
        ..Default::default()
    };

    for row in &raw.rows {
        let Some(date) = coerce_date(cell_at(row, date_idx)) else {
            table.dropped_rows += 1;
            continue;
        };
        table.records.push(SalesRecord {
            date,
            product: product_text(cell_at(row, product_idx)),
            units_sold: coerce_number(cell_at(row, units_idx)),
            current_stock: stock_idx
                .map(|i| coerce_number(cell_at(row, i)))
                .unwrap_or(0.0),
        });
    }

    Ok(table)
}

static EMPTY_CELL: Cell = Cell::Empty;

fn cell_at(row: &[Cell], idx: usize) -> &Cell {
    row.get(idx).unwrap_or(&EMPTY_CELL)
}

/// Parse and validate an upload in one step.
pub fn load(bytes: &[u8]) -> Result<SalesTable> {
    let raw = parse_upload(bytes)?;
    let table = validate(&raw)?;
    tracing::debug!(
        format = ?raw.format,
        rows = table.len(),
        dropped = table.dropped_rows,
        "upload loaded"
    );
    Ok(table)
}
