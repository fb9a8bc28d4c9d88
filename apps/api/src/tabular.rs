//! Feedback import from CSV or XLSX, and CSV export of report rows.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx, XlsxError};
use serde::Serialize;
use thiserror::Error;

use crate::sentiment::pipeline::FeedbackInput;

/// Column holding an employee identifier, detected case-insensitively.
pub const EMPLOYEE_ID_COLUMN: &str = "employee_id";

#[derive(Debug, Error)]
pub enum TabularError {
    #[error("Failed to read CSV: {0}")]
    Read(csv::Error),

    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] XlsxError),

    #[error("Unsupported feedback file '{0}' (expected .csv or .xlsx)")]
    UnsupportedFormat(String),

    #[error("Column '{column}' not found (available: {available})")]
    MissingColumn { column: String, available: String },

    #[error("File contains no data rows")]
    Empty,

    #[error("Failed to write CSV: {0}")]
    Write(csv::Error),
}

/// Feedback file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackFormat {
    Csv,
    Xlsx,
}

impl FeedbackFormat {
    pub fn from_filename(name: &str) -> Result<Self, TabularError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("xlsx") => Ok(Self::Xlsx),
            _ => Err(TabularError::UnsupportedFormat(name.to_string())),
        }
    }
}

/// Loads feedback rows from `bytes` in the given format.
pub fn load_feedback(
    bytes: &[u8],
    format: FeedbackFormat,
    text_column: &str,
) -> Result<Vec<FeedbackInput>, TabularError> {
    match format {
        FeedbackFormat::Csv => load_feedback_csv(bytes, text_column),
        FeedbackFormat::Xlsx => load_feedback_xlsx(bytes, text_column),
    }
}

/// Where the text and id live in a header row.
struct FeedbackColumns {
    text: usize,
    employee_id: Option<usize>,
}

impl FeedbackColumns {
    fn locate(headers: &[String], text_column: &str) -> Result<Self, TabularError> {
        let text = headers
            .iter()
            .position(|h| h == text_column.trim())
            .ok_or_else(|| TabularError::MissingColumn {
                column: text_column.to_string(),
                available: headers.join(", "),
            })?;
        let employee_id = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(EMPLOYEE_ID_COLUMN));
        Ok(Self { text, employee_id })
    }

    fn input<'a>(&self, cell: impl Fn(usize) -> Option<&'a str>) -> FeedbackInput {
        FeedbackInput {
            text: cell(self.text).unwrap_or_default().to_string(),
            employee_id: self
                .employee_id
                .and_then(&cell)
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        }
    }
}

/// Reads feedback rows from CSV with a header row.
///
/// `text_column` names the feedback text; an `employee_id` column is picked up when
/// present. Blank texts are kept so row positions match the file.
pub fn load_feedback_csv<R: Read>(
    reader: R,
    text_column: &str,
) -> Result<Vec<FeedbackInput>, TabularError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(TabularError::Read)?
        .iter()
        .map(str::to_string)
        .collect();
    let columns = FeedbackColumns::locate(&headers, text_column)?;

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(TabularError::Read)?;
        rows.push(columns.input(|i| record.get(i)));
    }

    if rows.is_empty() {
        return Err(TabularError::Empty);
    }
    Ok(rows)
}

/// Reads feedback rows from the first worksheet of an XLSX workbook.
/// The first row is the header; column rules match [`load_feedback_csv`].
pub fn load_feedback_xlsx(
    bytes: &[u8],
    text_column: &str,
) -> Result<Vec<FeedbackInput>, TabularError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(TabularError::Empty)??;

    let mut sheet_rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
    let headers: Vec<String> = sheet_rows
        .next()
        .ok_or(TabularError::Empty)?
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();
    let columns = FeedbackColumns::locate(&headers, text_column)?;

    let rows: Vec<FeedbackInput> = sheet_rows
        .map(|cells| columns.input(|i| cells.get(i).map(String::as_str)))
        .collect();

    if rows.is_empty() {
        return Err(TabularError::Empty);
    }
    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// A row type for CSV export. `HEADERS` is the serialized field order, so an export
/// without rows still carries its header line.
pub trait CsvRow: Serialize {
    const HEADERS: &'static [&'static str];
}

/// Writes `rows` as CSV with a header derived from the row type.
pub fn write_csv<W, T, I>(writer: W, rows: I) -> Result<(), TabularError>
where
    W: Write,
    T: CsvRow,
    I: IntoIterator<Item = T>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut rows = rows.into_iter().peekable();
    if rows.peek().is_none() {
        csv_writer
            .write_record(T::HEADERS)
            .map_err(TabularError::Write)?;
    }
    for row in rows {
        csv_writer.serialize(row).map_err(TabularError::Write)?;
    }
    csv_writer
        .flush()
        .map_err(|e| TabularError::Write(e.into()))?;
    Ok(())
}

/// [`write_csv`] into a `String`.
pub fn to_csv_string<T, I>(rows: I) -> Result<String, TabularError>
where
    T: CsvRow,
    I: IntoIterator<Item = T>,
{
    let mut buffer = Vec::new();
    write_csv(&mut buffer, rows)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
