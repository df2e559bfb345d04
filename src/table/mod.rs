pub mod decode;

use std::collections::BTreeMap;

use serde::Serialize;

/// How many data rows the preview shows by default. Parsing itself never
/// truncates; only `ParsedTable::preview` applies this cap, and callers may
/// pass their own limit.
pub const DEFAULT_PREVIEW_ROWS: usize = 100;

/// One data row keyed by header name, plus its 1-based position among the
/// data rows (header excluded). Every header is present as a key; cells the
/// source row was too short to provide are empty strings. Duplicate header
/// names collapse to a single key holding the last column's cell, matching
/// the upstream wire format's object-per-row shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowRecord {
    #[serde(rename = "rowIndex")]
    pub row_index: usize,
    #[serde(flatten)]
    pub cells: BTreeMap<String, String>,
}

impl RowRecord {
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells.get(header).map(String::as_str)
    }
}

/// A decoded upload: header row plus data rows, all cells as strings.
/// Replaced wholesale on every new file selection; never partially filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<RowRecord>,
}

impl ParsedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The first `limit` data rows, for display before commit.
    pub fn preview(&self, limit: usize) -> &[RowRecord] {
        &self.rows[..self.rows.len().min(limit)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_rows(n: usize) -> ParsedTable {
        let rows = (1..=n)
            .map(|i| RowRecord {
                row_index: i,
                cells: BTreeMap::from([("SKU".to_string(), format!("sku-{i}"))]),
            })
            .collect();
        ParsedTable {
            headers: vec!["SKU".to_string()],
            rows,
        }
    }

    #[test]
    fn preview_caps_but_never_pads() {
        let table = table_with_rows(150);
        assert_eq!(table.preview(DEFAULT_PREVIEW_ROWS).len(), 100);
        assert_eq!(table.preview(DEFAULT_PREVIEW_ROWS)[0].row_index, 1);

        let small = table_with_rows(3);
        assert_eq!(small.preview(DEFAULT_PREVIEW_ROWS).len(), 3);
    }

    #[test]
    fn row_records_serialize_flat_with_camel_case_index() {
        let table = table_with_rows(1);
        let json = serde_json::to_value(&table.rows[0]).unwrap();
        assert_eq!(json["rowIndex"], 1);
        assert_eq!(json["SKU"], "sku-1");
    }
}
