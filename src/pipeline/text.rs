//! Text extraction for text-like uploads.
//!
//! Plain text is taken as UTF-8. CSV and spreadsheets are parsed into a
//! [`Table`] (first row as the header) and flattened into the fixed-width
//! layout pandas prints for `DataFrame.to_string()`: a row-index column,
//! two-space gutters, every cell right-aligned to its column width. Models
//! read that layout well, and it keeps row/column association visible.
//!
//! ```text
//!     name  age
//! 0  Alice   30
//! ```

use crate::error::QuizError;
use crate::pipeline::input::MediaKind;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use tracing::debug;

/// Placeholder for a missing cell, as pandas prints it.
const MISSING: &str = "NaN";

/// A header row plus data rows, every row as wide as the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Decode a text-like upload into the text that will be sent to the model.
pub fn extract_text(kind: MediaKind, bytes: &[u8]) -> Result<String, QuizError> {
    let text = match kind {
        MediaKind::PlainText => decode_plain(bytes)?,
        MediaKind::Csv => render_table(&parse_csv(bytes)?),
        MediaKind::Spreadsheet => render_table(&parse_spreadsheet(bytes)?),
        MediaKind::Image | MediaKind::Pdf => {
            return Err(QuizError::Internal(format!(
                "{kind:?} uploads are rasterised, not read as text"
            )))
        }
    };
    debug!("Extracted {} chars of {:?} text", text.len(), kind);
    Ok(text)
}

fn decode_plain(bytes: &[u8]) -> Result<String, QuizError> {
    let text = std::str::from_utf8(bytes).map_err(|e| QuizError::DecodeFailed {
        kind: "text",
        detail: format!("not valid UTF-8: {e}"),
    })?;
    Ok(text.strip_prefix('\u{FEFF}').unwrap_or(text).to_string())
}

/// Parse CSV with the first record as the header.
///
/// Short rows are padded with `NaN`; a row longer than the header is an
/// error, as is an input with no header at all.
pub fn parse_csv(bytes: &[u8]) -> Result<Table, QuizError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect();
    if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
        return Err(QuizError::DecodeFailed {
            kind: "CSV",
            detail: "no columns to parse from file".into(),
        });
    }

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        if record.len() > columns.len() {
            return Err(QuizError::DecodeFailed {
                kind: "CSV",
                detail: format!(
                    "expected {} fields in line {}, saw {}",
                    columns.len(),
                    i + 2,
                    record.len()
                ),
            });
        }
        rows.push(pad_row(record.iter().map(str::to_string).collect(), columns.len()));
    }

    Ok(Table { columns, rows })
}

fn csv_error(e: csv::Error) -> QuizError {
    QuizError::DecodeFailed {
        kind: "CSV",
        detail: e.to_string(),
    }
}

/// Parse the first worksheet of an `.xls`/`.xlsx` workbook, first row as header.
pub fn parse_spreadsheet(bytes: &[u8]) -> Result<Table, QuizError> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(spreadsheet_error)?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| QuizError::DecodeFailed {
            kind: "spreadsheet",
            detail: "workbook has no worksheets".into(),
        })?
        .map_err(spreadsheet_error)?;

    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(i, cell)| match cell {
                Data::Empty => format!("Unnamed: {i}"),
                other => other.to_string(),
            })
            .collect(),
        None => {
            return Err(QuizError::DecodeFailed {
                kind: "spreadsheet",
                detail: "first worksheet is empty".into(),
            })
        }
    };

    let rows = rows
        .map(|row| {
            let cells = row.iter().map(cell_text).collect();
            pad_row(cells, columns.len())
        })
        .collect();

    Ok(Table { columns, rows })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => MISSING.to_string(),
        other => other.to_string(),
    }
}

fn spreadsheet_error(e: calamine::Error) -> QuizError {
    QuizError::DecodeFailed {
        kind: "spreadsheet",
        detail: e.to_string(),
    }
}

fn pad_row(mut cells: Vec<String>, width: usize) -> Vec<String> {
    for cell in cells.iter_mut() {
        if cell.is_empty() {
            *cell = MISSING.to_string();
        }
    }
    cells.resize(width, MISSING.to_string());
    cells
}

/// Flatten a table into pandas' `to_string()` layout.
pub fn render_table(table: &Table) -> String {
    if table.rows.is_empty() {
        return format!(
            "Empty DataFrame\nColumns: [{}]\nIndex: []",
            table.columns.join(", ")
        );
    }

    let index: Vec<String> = (0..table.rows.len()).map(|i| i.to_string()).collect();
    let index_width = index.iter().map(|s| width(s)).max().unwrap_or(0);

    let col_widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(c, name)| {
            table
                .rows
                .iter()
                .map(|row| row.get(c).map_or(0, |v| width(v)))
                .chain(std::iter::once(width(name)))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(table.rows.len() + 1);

    let mut header = " ".repeat(index_width);
    for (name, w) in table.columns.iter().zip(&col_widths) {
        header.push_str("  ");
        header.push_str(&right_align(name, *w));
    }
    lines.push(header);

    for (label, row) in index.iter().zip(&table.rows) {
        let mut line = format!("{label:<index_width$}");
        for (c, w) in col_widths.iter().enumerate() {
            line.push_str("  ");
            line.push_str(&right_align(row.get(c).map_or(MISSING, String::as_str), *w));
        }
        lines.push(line);
    }

    lines.join("\n")
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn right_align(s: &str, w: usize) -> String {
    let pad = w.saturating_sub(width(s));
    format!("{}{}", " ".repeat(pad), s)
}
