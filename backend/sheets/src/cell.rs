//! Loose cell comparison.
//!
//! Form submissions carry numbers where the sheet stores text (a grade of `7` against
//! the cell `"7"`), and users leave stray whitespace around names. Both sides are
//! rendered to trimmed text before comparing, numeric text compares by value.
use serde_json::Value;

use crate::{Cell, Row};

/// Canonical text of a cell.
pub fn normalize(cell: &Cell) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

pub fn loose_eq(left: &Cell, right: &Cell) -> bool {
    let left = normalize(left);
    let right = normalize(right);

    if left == right {
        return true;
    }

    match (as_number(&left), as_number(&right)) {
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}

/// Cell at `index` rendered as text, `""` when the row is too short.
pub fn text_at(row: &Row, index: usize) -> String {
    row.get(index).map(normalize).unwrap_or_default()
}

fn as_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}
