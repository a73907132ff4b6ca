//! # Row Store Gateway
//!
//! Turns submitted records into store calls.
//!
//! Every upsert re-reads the whole range, nothing is cached between requests. Batches
//! read once and reconcile each record against that single snapshot, so two records
//! with the same key in one batch are both appended.
use std::sync::Arc;

use sheets::{AppendResult, RangeAddress, Row, RowStore, UpdateResult};
use tracing::{debug, info};

use crate::{
    error::AppError,
    reconcile::{Decision, Reconciler},
};

/// A worksheet region holding fixed-width records.
#[derive(Debug, Clone)]
pub struct Table {
    pub spreadsheet_id: String,
    /// Whole-column range the records live in, e.g. `Datos!A:G`.
    pub range: RangeAddress,
    /// Columns rewritten when a record matches, e.g. `Datos!E:G`.
    pub update_columns: RangeAddress,
    pub reconciler: Reconciler,
}

impl Table {
    pub fn width(&self) -> usize {
        self.range.width()
    }

    /// The cells of `candidate` that land in `update_columns`.
    fn update_slice(&self, candidate: &Row) -> Result<Row, AppError> {
        let start = self.update_columns.start_col.saturating_sub(self.range.start_col) as usize;
        let end = start + self.update_columns.width();

        candidate.get(start..end).map(<[_]>::to_vec).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "row has {} cells, {} needs {end}",
                candidate.len(),
                self.update_columns
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub decision: Decision,
    pub updated_range: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Sheet rows rewritten in place, in submission order.
    pub updated_rows: Vec<u32>,
    pub appended: usize,
}

pub struct Gateway {
    store: Arc<dyn RowStore>,
}

impl Gateway {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    pub async fn fetch_all(
        &self,
        spreadsheet_id: &str,
        range: &RangeAddress,
    ) -> Result<Vec<Row>, AppError> {
        let rows = self.store.get_range(spreadsheet_id, range).await?;
        debug!("Fetched {} rows from {range}", rows.len());

        Ok(rows)
    }

    pub async fn append_row(
        &self,
        spreadsheet_id: &str,
        range: &RangeAddress,
        row: Row,
    ) -> Result<AppendResult, AppError> {
        Ok(self
            .store
            .append_rows(spreadsheet_id, range, &[row])
            .await?)
    }

    /// One append call for all of `rows`, `None` when there is nothing to write.
    pub async fn append_batch(
        &self,
        spreadsheet_id: &str,
        range: &RangeAddress,
        rows: &[Row],
    ) -> Result<Option<AppendResult>, AppError> {
        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            self.store.append_rows(spreadsheet_id, range, rows).await?,
        ))
    }

    /// Overwrites a single-row span exactly as wide as `row`.
    pub async fn update_row(
        &self,
        spreadsheet_id: &str,
        address: &RangeAddress,
        row: Row,
    ) -> Result<UpdateResult, AppError> {
        if !address.is_single_row() || address.width() != row.len() {
            return Err(AppError::InvalidInput(format!(
                "{address} cannot hold a row of {} cells",
                row.len()
            )));
        }

        Ok(self
            .store
            .update_range(spreadsheet_id, address, &[row])
            .await?)
    }

    pub async fn update_batch(
        &self,
        spreadsheet_id: &str,
        updates: Vec<(RangeAddress, Row)>,
    ) -> Result<Vec<UpdateResult>, AppError> {
        let mut results = Vec::with_capacity(updates.len());

        for (address, row) in updates {
            results.push(self.update_row(spreadsheet_id, &address, row).await?);
        }

        Ok(results)
    }

    pub async fn upsert(&self, table: &Table, candidate: Row) -> Result<UpsertOutcome, AppError> {
        check_keys(table, &candidate)?;

        let existing = self.fetch_all(&table.spreadsheet_id, &table.range).await?;
        let decision = table.reconciler.reconcile(&candidate, &existing);
        info!("{decision:?} in {}", table.range);

        let updated_range = match decision {
            Decision::Update { row_index } => {
                let address = table.update_columns.row(sheet_row(table, row_index));
                let slice = table.update_slice(&candidate)?;

                self.update_row(&table.spreadsheet_id, &address, slice)
                    .await?
                    .updated_range
            }
            Decision::Append => {
                self.append_row(&table.spreadsheet_id, &table.range, candidate)
                    .await?
                    .updated_range
            }
        };

        Ok(UpsertOutcome {
            decision,
            updated_range,
        })
    }

    /// Reconciles every candidate against one snapshot, updates matches one by one and
    /// appends the rest in a single call.
    pub async fn upsert_batch(
        &self,
        table: &Table,
        candidates: Vec<Row>,
    ) -> Result<BatchOutcome, AppError> {
        for candidate in &candidates {
            check_keys(table, candidate)?;
        }

        let existing = self.fetch_all(&table.spreadsheet_id, &table.range).await?;

        let mut updates = Vec::new();
        let mut appends = Vec::new();
        let mut outcome = BatchOutcome::default();

        for candidate in candidates {
            match table.reconciler.reconcile(&candidate, &existing) {
                Decision::Update { row_index } => {
                    let row = sheet_row(table, row_index);
                    debug!("Updating row {row} of {}", table.range);

                    updates.push((table.update_columns.row(row), table.update_slice(&candidate)?));
                    outcome.updated_rows.push(row);
                }
                Decision::Append => appends.push(candidate),
            }
        }

        self.update_batch(&table.spreadsheet_id, updates).await?;
        self.append_batch(&table.spreadsheet_id, &table.range, &appends)
            .await?;
        outcome.appended = appends.len();

        info!(
            "{} updated, {} appended in {}",
            outcome.updated_rows.len(),
            outcome.appended,
            table.range
        );

        Ok(outcome)
    }
}

fn check_keys(table: &Table, candidate: &Row) -> Result<(), AppError> {
    let missing = table.reconciler.missing_keys(candidate);

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "row is missing key cells at {missing:?}"
        )))
    }
}

/// Reconciler indices count from the first fetched row.
fn sheet_row(table: &Table, row_index: u32) -> u32 {
    table.range.first_row() - 1 + row_index
}
