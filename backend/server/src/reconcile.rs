//! # Upsert Reconciliation
//!
//! Decides whether a submitted row replaces an existing one or gets appended.
//!
//! - Rows are scanned top to bottom, the first row whose key cells all loosely equal
//!   the candidate's wins, later duplicates are never looked at
//! - Row numbers are 1-based: scan index 0 is sheet row 1
//! - A row too short to hold every key cell is a non-match, never an error
//! - With `skip_header_row`, index 0 is never considered but numbering is unchanged
//!
//! ## Race
//!
//! The decision is made against a snapshot. Nothing stops another request from
//! appending the same key between the fetch and the write, which yields a duplicate
//! row, or from updating the matched row in between, which loses one of the updates.
use sheets::{Row, cell::loose_eq};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Update { row_index: u32 },
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciler {
    key_fields: Vec<usize>,
    skip_header_row: bool,
}

impl Reconciler {
    pub fn new(key_fields: impl Into<Vec<usize>>) -> Self {
        Self {
            key_fields: key_fields.into(),
            skip_header_row: false,
        }
    }

    pub fn skip_header_row(mut self, skip: bool) -> Self {
        self.skip_header_row = skip;
        self
    }

    pub fn key_fields(&self) -> &[usize] {
        &self.key_fields
    }

    /// Every key position the candidate itself is missing.
    pub fn missing_keys(&self, candidate: &Row) -> Vec<usize> {
        self.key_fields
            .iter()
            .copied()
            .filter(|&index| index >= candidate.len())
            .collect()
    }

    pub fn matches(&self, candidate: &Row, row: &Row) -> bool {
        self.key_fields
            .iter()
            .all(|&index| match (candidate.get(index), row.get(index)) {
                (Some(wanted), Some(found)) => loose_eq(wanted, found),
                _ => false,
            })
    }

    pub fn reconcile(&self, candidate: &Row, existing: &[Row]) -> Decision {
        let skip = usize::from(self.skip_header_row);

        existing
            .iter()
            .enumerate()
            .skip(skip)
            .find(|(_, row)| self.matches(candidate, row))
            .map_or(Decision::Append, |(index, _)| Decision::Update {
                row_index: index as u32 + 1,
            })
    }
}

/// Match-or-append over every fetched row, header included.
pub fn reconcile(candidate: &Row, existing: &[Row], key_fields: &[usize]) -> Decision {
    Reconciler::new(key_fields).reconcile(candidate, existing)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const KEYS: [usize; 4] = [0, 1, 2, 3];

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| json!(c)).collect()
    }

    fn existing() -> Vec<Row> {
        vec![
            row(&["A", "Math", "T1", "S1", "plan a", "2025-05-01"]),
            row(&["B", "Sci", "T2", "S2", "plan b", "2025-05-02"]),
        ]
    }

    #[test]
    fn test_match_updates_first_row() {
        let candidate = row(&["A", "Math", "T1", "S1", "new plan", "2025-06-01"]);

        assert_eq!(
            reconcile(&candidate, &existing(), &KEYS),
            Decision::Update { row_index: 1 }
        );
    }

    #[test]
    fn test_match_reports_one_based_position() {
        let candidate = row(&["B", "Sci", "T2", "S2"]);

        assert_eq!(
            reconcile(&candidate, &existing(), &KEYS),
            Decision::Update { row_index: 2 }
        );
    }

    #[test]
    fn test_no_match_appends() {
        let candidate = row(&["C", "Art", "T3", "S3"]);

        assert_eq!(reconcile(&candidate, &existing(), &KEYS), Decision::Append);
        assert_eq!(reconcile(&candidate, &[], &KEYS), Decision::Append);
    }

    #[test]
    fn test_non_key_fields_are_ignored() {
        let candidate = row(&["A", "Math", "T1", "S1", "different", "different"]);

        assert_eq!(
            reconcile(&candidate, &existing(), &KEYS),
            Decision::Update { row_index: 1 }
        );
    }

    #[test]
    fn test_first_match_wins() {
        let mut rows = existing();
        rows.push(row(&["B", "Sci", "T2", "S2", "duplicate"]));

        let candidate = row(&["B", "Sci", "T2", "S2"]);
        assert_eq!(
            reconcile(&candidate, &rows, &KEYS),
            Decision::Update { row_index: 2 }
        );
    }

    #[test]
    fn test_short_row_never_matches() {
        let rows = vec![row(&["A", "Math", "T1"])];

        assert_eq!(
            reconcile(&row(&["A", "Math", "T1", ""]), &rows, &KEYS),
            Decision::Append
        );
    }

    #[test]
    fn test_loose_equality() {
        let rows = vec![vec![json!("Lengua"), json!("Ana"), json!("7"), json!(""), json!("2")]];
        let candidate = vec![json!(" Lengua"), json!("Ana "), json!(7), json!("x"), json!(2)];

        assert_eq!(
            reconcile(&candidate, &rows, &[0, 1, 2, 4]),
            Decision::Update { row_index: 1 }
        );
    }

    #[test]
    fn test_skip_header_row_keeps_numbering() {
        let rows = vec![
            row(&["grupo", "asignatura", "docente", "estudiante"]),
            row(&["grupo", "asignatura", "docente", "estudiante"]),
        ];
        let candidate = row(&["grupo", "asignatura", "docente", "estudiante"]);

        let plain = Reconciler::new(KEYS);
        let skipping = Reconciler::new(KEYS).skip_header_row(true);

        assert_eq!(plain.reconcile(&candidate, &rows), Decision::Update { row_index: 1 });
        assert_eq!(
            skipping.reconcile(&candidate, &rows),
            Decision::Update { row_index: 2 }
        );
        assert_eq!(skipping.reconcile(&candidate, &rows[..1]), Decision::Append);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let rows = existing();
        let reconciler = Reconciler::new(KEYS);

        for candidate in [row(&["B", "Sci", "T2", "S2"]), row(&["Z", "Z", "Z", "Z"])] {
            let first = reconciler.reconcile(&candidate, &rows);
            let second = reconciler.reconcile(&candidate, &rows);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_missing_keys() {
        let reconciler = Reconciler::new([0, 1, 2, 4]);

        assert_eq!(reconciler.missing_keys(&row(&["a", "b", "c"])), vec![4]);
        assert!(reconciler.missing_keys(&row(&["a", "b", "c", "d", "e"])).is_empty());
    }
}
