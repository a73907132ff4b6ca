//! # Range Addressing
//!
//! `<sheet>!<startCol><startRow>:<endCol><endRow>` where rows are optional.
//!
//! - Columns are stored 0-based (`A` is 0) and rendered as letters (`Z`, `AA`, ...)
//! - Rows are 1-based like the sheet UI, `None` means unbounded (`A:J`)
//! - Sheet names that are not plain identifiers are single-quoted, quotes doubled
use std::{fmt, str::FromStr};

use crate::error::SheetsError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeAddress {
    pub sheet: String,
    pub start_col: u32,
    pub start_row: Option<u32>,
    pub end_col: u32,
    pub end_row: Option<u32>,
}

impl RangeAddress {
    /// Whole-column range, e.g. `plan!A:J`.
    pub fn columns(sheet: impl Into<String>, start_col: u32, end_col: u32) -> Self {
        Self {
            sheet: sheet.into(),
            start_col: start_col.min(end_col),
            start_row: None,
            end_col: start_col.max(end_col),
            end_row: None,
        }
    }

    /// The same columns narrowed to a single sheet row, e.g. `plan!A7:J7`.
    pub fn row(&self, row: u32) -> Self {
        Self {
            sheet: self.sheet.clone(),
            start_col: self.start_col,
            start_row: Some(row),
            end_col: self.end_col,
            end_row: Some(row),
        }
    }

    pub fn parse(text: &str) -> Result<Self, SheetsError> {
        let invalid = || SheetsError::InvalidRange(text.to_string());

        let (sheet, region) = split_sheet(text).ok_or_else(invalid)?;
        let (start, end) = region.split_once(':').unwrap_or((region, region));

        let (start_col, start_row) = parse_cell(start).ok_or_else(invalid)?;
        let (end_col, end_row) = parse_cell(end).ok_or_else(invalid)?;

        if sheet.is_empty() || start_col > end_col {
            return Err(invalid());
        }

        if let (Some(first), Some(last)) = (start_row, end_row) {
            if first > last {
                return Err(invalid());
            }
        }

        Ok(Self {
            sheet,
            start_col,
            start_row,
            end_col,
            end_row,
        })
    }

    /// Number of columns covered.
    pub fn width(&self) -> usize {
        (self.end_col - self.start_col + 1) as usize
    }

    pub fn is_single_row(&self) -> bool {
        matches!((self.start_row, self.end_row), (Some(first), Some(last)) if first == last)
    }

    /// Sheet row of the first element of a fetch over this range.
    pub fn first_row(&self) -> u32 {
        self.start_row.unwrap_or(1)
    }
}

impl fmt::Display for RangeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!", quote_sheet(&self.sheet))?;

        write!(f, "{}", column_letters(self.start_col))?;
        if let Some(row) = self.start_row {
            write!(f, "{row}")?;
        }

        write!(f, ":{}", column_letters(self.end_col))?;
        if let Some(row) = self.end_row {
            write!(f, "{row}")?;
        }

        Ok(())
    }
}

impl FromStr for RangeAddress {
    type Err = SheetsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// `0` -> `A`, `25` -> `Z`, `26` -> `AA`.
pub fn column_letters(index: u32) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();

    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }

    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Inverse of [`column_letters`], case-insensitive.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }

    let mut n: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        n = n.checked_mul(26)?.checked_add(digit)?;
    }

    Some(n - 1)
}

fn quote_sheet(sheet: &str) -> String {
    if sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    }
}

fn split_sheet(text: &str) -> Option<(String, &str)> {
    let Some(quoted) = text.strip_prefix('\'') else {
        let (sheet, region) = text.split_once('!')?;
        return Some((sheet.to_string(), region));
    };

    let mut sheet = String::new();
    let mut chars = quoted.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '\'' {
            sheet.push(c);
            continue;
        }

        if matches!(chars.peek(), Some((_, '\''))) {
            chars.next();
            sheet.push('\'');
            continue;
        }

        let region = quoted[i + 1..].strip_prefix('!')?;
        return Some((sheet, region));
    }

    None
}

fn parse_cell(cell: &str) -> Option<(u32, Option<u32>)> {
    let split = cell
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(split);

    let col = column_index(letters)?;
    let row = if digits.is_empty() {
        None
    } else {
        match digits.parse::<u32>().ok()? {
            0 => return None,
            row => Some(row),
        }
    };

    Some((col, row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(9), "J");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A"), Some(0));
        assert_eq!(column_index("j"), Some(9));
        assert_eq!(column_index("AA"), Some(26));
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn test_display_whole_columns() {
        assert_eq!(RangeAddress::columns("plan", 0, 9).to_string(), "plan!A:J");
        assert_eq!(RangeAddress::columns("Datos", 6, 0).to_string(), "Datos!A:G");
    }

    #[test]
    fn test_single_row_span() {
        let range = RangeAddress::columns("Datos", 4, 6).row(12);

        assert_eq!(range.to_string(), "Datos!E12:G12");
        assert!(range.is_single_row());
        assert_eq!(range.width(), 3);
        assert!(!RangeAddress::columns("Datos", 0, 6).is_single_row());
    }

    #[test]
    fn test_quoted_sheet_names() {
        let range = RangeAddress::columns("Plan de aula", 0, 1);
        assert_eq!(range.to_string(), "'Plan de aula'!A:B");

        let range = RangeAddress::columns("Docente's", 0, 0).row(3);
        assert_eq!(range.to_string(), "'Docente''s'!A3:A3");
        assert_eq!(RangeAddress::parse(&range.to_string()).unwrap(), range);
    }

    #[test]
    fn test_parse() {
        let range = RangeAddress::parse("plan!A5:J5").unwrap();
        assert_eq!(range.sheet, "plan");
        assert_eq!((range.start_col, range.end_col), (0, 9));
        assert_eq!((range.start_row, range.end_row), (Some(5), Some(5)));

        let range: RangeAddress = "Datos!A:Z".parse().unwrap();
        assert_eq!(range.first_row(), 1);
        assert_eq!(range.width(), 26);

        let range = RangeAddress::parse("Datos!B2").unwrap();
        assert_eq!(range.to_string(), "Datos!B2:B2");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for text in ["A1:B2", "plan!", "plan!J:A", "plan!A5:A2", "plan!A0:B1", "'open!A:B"] {
            assert!(RangeAddress::parse(text).is_err(), "{text} should not parse");
        }
    }
}
