//! In-process grid with the same addressing rules as the Sheets API.
//!
//! Every call is recorded so callers can assert on what was read and written.
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    AppendResult, Row, RowStore, UpdateResult, error::SheetsError, range::RangeAddress,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Get(String),
    Append { range: String, rows: usize },
    Update(String),
}

type SheetKey = (String, String);

#[derive(Default)]
pub struct MemoryStore {
    sheets: Mutex<HashMap<SheetKey, Vec<Row>>>,
    operations: Mutex<Vec<Operation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `sheet` of `spreadsheet_id`, first row is sheet row 1.
    pub fn with_rows(self, spreadsheet_id: &str, sheet: &str, rows: Vec<Row>) -> Self {
        if let Ok(mut sheets) = self.sheets.lock() {
            sheets.insert(key(spreadsheet_id, sheet), rows);
        }
        self
    }

    pub fn rows(&self, spreadsheet_id: &str, sheet: &str) -> Vec<Row> {
        self.sheets
            .lock()
            .ok()
            .and_then(|sheets| sheets.get(&key(spreadsheet_id, sheet)).cloned())
            .unwrap_or_default()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.operations
            .lock()
            .map(|ops| ops.clone())
            .unwrap_or_default()
    }

    fn record(&self, operation: Operation) -> Result<(), SheetsError> {
        self.operations
            .lock()
            .map_err(|_| poisoned())?
            .push(operation);
        Ok(())
    }

    fn sheets(&self) -> Result<MutexGuard<'_, HashMap<SheetKey, Vec<Row>>>, SheetsError> {
        self.sheets.lock().map_err(|_| poisoned())
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &RangeAddress,
    ) -> Result<Vec<Row>, SheetsError> {
        self.record(Operation::Get(range.to_string()))?;

        let sheets = self.sheets()?;
        let Some(grid) = sheets.get(&key(spreadsheet_id, &range.sheet)) else {
            return Ok(Vec::new());
        };

        let first = (range.first_row() - 1) as usize;
        let last = range
            .end_row
            .map(|row| row as usize)
            .unwrap_or(grid.len())
            .min(grid.len());

        let mut rows: Vec<Row> = grid
            .get(first..last)
            .unwrap_or_default()
            .iter()
            .map(|row| trim_trailing(slice_columns(row, range)))
            .collect();

        while rows.last().is_some_and(|row| row.is_empty()) {
            rows.pop();
        }

        Ok(rows)
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &RangeAddress,
        rows: &[Row],
    ) -> Result<AppendResult, SheetsError> {
        let mut sheets = self.sheets()?;
        let grid = sheets
            .entry(key(spreadsheet_id, &range.sheet))
            .or_default();

        let next_row = grid
            .iter()
            .rposition(|row| row.iter().any(|cell| !is_empty(cell)))
            .map_or(0, |index| index + 1);

        grid.truncate(next_row);
        for row in rows {
            grid.push(place(row, range.start_col));
        }

        let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1) as u32;
        let written = RangeAddress {
            sheet: range.sheet.clone(),
            start_col: range.start_col,
            start_row: Some(next_row as u32 + 1),
            end_col: range.start_col + width - 1,
            end_row: Some((next_row + rows.len().max(1)) as u32),
        };
        drop(sheets);

        self.record(Operation::Append {
            range: range.to_string(),
            rows: rows.len(),
        })?;

        Ok(AppendResult {
            updated_range: written.to_string(),
            row_count: rows.len(),
        })
    }

    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &RangeAddress,
        rows: &[Row],
    ) -> Result<UpdateResult, SheetsError> {
        let Some(first) = range.start_row else {
            return Err(SheetsError::InvalidRange(format!(
                "{range} has no starting row"
            )));
        };

        let mut sheets = self.sheets()?;
        let grid = sheets
            .entry(key(spreadsheet_id, &range.sheet))
            .or_default();

        let mut cell_count = 0;
        for (offset, values) in rows.iter().enumerate() {
            let index = first as usize - 1 + offset;
            if grid.len() <= index {
                grid.resize(index + 1, Vec::new());
            }

            let row = &mut grid[index];
            let start = range.start_col as usize;
            if row.len() < start + values.len() {
                row.resize(start + values.len(), Value::Null);
            }

            for (col, value) in values.iter().enumerate() {
                row[start + col] = value.clone();
                cell_count += 1;
            }
        }
        drop(sheets);

        self.record(Operation::Update(range.to_string()))?;

        Ok(UpdateResult {
            updated_range: range.to_string(),
            cell_count,
        })
    }
}

fn key(spreadsheet_id: &str, sheet: &str) -> SheetKey {
    (spreadsheet_id.to_string(), sheet.to_string())
}

fn poisoned() -> SheetsError {
    SheetsError::Unavailable("memory store lock poisoned".to_string())
}

fn is_empty(cell: &Value) -> bool {
    match cell {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn slice_columns(row: &Row, range: &RangeAddress) -> Row {
    row.iter()
        .skip(range.start_col as usize)
        .take(range.width())
        .cloned()
        .collect()
}

fn trim_trailing(mut row: Row) -> Row {
    while row.last().is_some_and(is_empty) {
        row.pop();
    }
    row
}

fn place(values: &Row, start_col: u32) -> Row {
    let mut row = vec![Value::Null; start_col as usize];
    row.extend(values.iter().cloned());
    row
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const ID: &str = "sheet-id";

    fn seeded() -> MemoryStore {
        MemoryStore::new().with_rows(
            ID,
            "Datos",
            vec![
                vec![json!("grupo"), json!("asignatura")],
                vec![json!("6A"), json!("Física"), json!("")],
            ],
        )
    }

    #[tokio::test]
    async fn test_get_range_trims_like_sheets() {
        let store = seeded();
        let rows = store
            .get_range(ID, &RangeAddress::columns("Datos", 0, 6))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![json!("6A"), json!("Física")]);
    }

    #[tokio::test]
    async fn test_get_unknown_sheet_is_empty() {
        let store = MemoryStore::new();
        let rows = store
            .get_range(ID, &RangeAddress::columns("plan", 0, 9))
            .await
            .unwrap();

        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_append_after_last_populated_row() {
        let store = seeded();
        let result = store
            .append_rows(
                ID,
                &RangeAddress::columns("Datos", 0, 6),
                &[vec![json!("7B"), json!("Química")]],
            )
            .await
            .unwrap();

        assert_eq!(result.updated_range, "Datos!A3:B3");
        assert_eq!(result.row_count, 1);
        assert_eq!(store.rows(ID, "Datos").len(), 3);
    }

    #[tokio::test]
    async fn test_update_overwrites_slice() {
        let store = seeded();
        let range = RangeAddress::columns("Datos", 4, 6).row(2);
        let result = store
            .update_range(ID, &range, &[vec![json!("plan"), json!("2025-06-01"), json!("now")]])
            .await
            .unwrap();

        assert_eq!(result.cell_count, 3);
        let row = &store.rows(ID, "Datos")[1];
        assert_eq!(row[0], json!("6A"));
        assert_eq!(row[4], json!("plan"));
        assert_eq!(row[6], json!("now"));
    }

    #[tokio::test]
    async fn test_update_needs_a_row() {
        let store = seeded();
        let err = store
            .update_range(ID, &RangeAddress::columns("Datos", 0, 1), &[vec![json!("x")]])
            .await
            .unwrap_err();

        assert!(matches!(err, SheetsError::InvalidRange(_)));
        assert!(store.operations().is_empty());
    }
}
