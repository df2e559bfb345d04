use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use tracing::{debug, instrument};

use crate::error::IngestError;

use super::{ParsedTable, RowRecord};

/// File types accepted at the input boundary, matched on the lowercased
/// final extension before any decode is attempted.
static ALLOWED_EXTENSIONS: &[&str] = &["xlsx", "xls", "csv"];

/// Decode an uploaded byte payload into a `ParsedTable`.
///
/// CSV goes through the csv crate; anything else on the allow-list is
/// opened as a workbook and only its first sheet (by position) is read.
/// Row 0 becomes the headers; each later row is zipped against them, short
/// rows padded with empty cells. All-or-nothing: on any failure no table
/// is produced.
#[instrument(level = "debug", skip(bytes), fields(len = bytes.len()))]
pub fn parse(bytes: &[u8], file_name: &str) -> Result<ParsedTable, IngestError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let extension = match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => ext,
        _ => {
            return Err(IngestError::UnsupportedFileType {
                name: file_name.to_string(),
            })
        }
    };

    let grid = if extension == "csv" {
        decode_csv(bytes, file_name)?
    } else {
        decode_workbook(bytes, file_name)?
    };

    let mut rows_iter = grid.into_iter();
    let headers = match rows_iter.next() {
        Some(h) => h,
        None => return Err(IngestError::EmptyFile),
    };

    let rows: Vec<RowRecord> = rows_iter
        .enumerate()
        .map(|(i, cells)| RowRecord {
            row_index: i + 1,
            cells: headers
                .iter()
                .enumerate()
                .map(|(col, header)| {
                    (header.clone(), cells.get(col).cloned().unwrap_or_default())
                })
                .collect::<BTreeMap<_, _>>(),
        })
        .collect();

    debug!(headers = headers.len(), rows = rows.len(), "decoded table");
    Ok(ParsedTable { headers, rows })
}

/// Read a file from disk and parse it. Used by the driver binary; tests
/// cover it through a temp directory.
pub fn parse_path(path: impl AsRef<Path>) -> Result<ParsedTable, IngestError> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let bytes = std::fs::read(path).map_err(|e| IngestError::Decode {
        name: name.clone(),
        source: anyhow::Error::new(e).context(format!("reading {}", path.display())),
    })?;
    parse(&bytes, &name)
}

fn decode_csv(bytes: &[u8], file_name: &str) -> Result<Vec<Vec<String>>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::Decode {
            name: file_name.to_string(),
            source: anyhow::Error::new(e).context("reading csv record"),
        })?;
        grid.push(record.iter().map(str::to_string).collect());
    }
    Ok(grid)
}

fn decode_workbook(bytes: &[u8], file_name: &str) -> Result<Vec<Vec<String>>, IngestError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|e| IngestError::Decode {
        name: file_name.to_string(),
        source: anyhow::Error::new(e).context("opening workbook"),
    })?;

    // First sheet by position, regardless of its name.
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| IngestError::Decode {
            name: file_name.to_string(),
            source: anyhow::Error::new(e).context("reading first sheet"),
        })?,
        None => return Err(IngestError::EmptyFile),
    };

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}
