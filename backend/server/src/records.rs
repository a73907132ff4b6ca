//! # Records
//!
//! Request payloads and the sheet layouts they map onto.
//!
//! ## Plan de aula
//! - `plan!A:J`, one 10-cell row per classroom plan
//! - Identity: area (0), teacher (1), grade (2), period (4)
//! - A match rewrites the whole `A:J` row
//!
//! ## Plan de mejoramiento
//! - `Datos!A:G`: group, subject, teacher, student, plan, due date, registered at
//! - Identity: the first four cells
//! - A match rewrites `E:G` only, one submission fans out to one row per student
//!
//! ## Cards
//! - `Datos!A:Z`, two cells per row (card, teachers), append only
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use sheets::{Cell, RangeAddress, Row, cell::text_at};

use crate::{config::StoreAddress, error::AppError, gateway::Table, reconcile::Reconciler};

pub const PLAN_LAST_COLUMN: u32 = 9;
pub const PLAN_KEYS: [usize; 4] = [0, 1, 2, 4];

pub const IMPROVEMENT_LAST_COLUMN: u32 = 6;
pub const IMPROVEMENT_KEYS: [usize; 4] = [0, 1, 2, 3];
const IMPROVEMENT_FIRST_UPDATED: u32 = 4;

pub const CARDS_LAST_COLUMN: u32 = 25;

/// America/Bogota, no daylight saving.
const REGISTRATION_UTC_OFFSET_HOURS: i64 = -5;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetQuery {
    pub spreadsheet_id: Option<String>,
    pub worksheet_title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanAulaSubmission {
    pub spreadsheet_id: Option<String>,
    pub worksheet_title: Option<String>,
    pub values: Row,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementSubmission {
    #[serde(default)]
    pub grupo: Cell,
    #[serde(default)]
    pub asignatura: Cell,
    #[serde(default, rename = "docenteSeleccionado")]
    pub docente: Cell,
    #[serde(default)]
    pub fecha_limite: Cell,
    #[serde(default)]
    pub plan_mejoramiento: Cell,
    #[serde(default)]
    pub nombres_estudiante: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImprovementRecord {
    pub grupo: String,
    pub asignatura: String,
    pub docente: String,
    pub estudiante: String,
    pub plan: String,
    pub fecha_limite: String,
    pub fecha_registro: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Card {
    #[serde(default)]
    pub card: Cell,
    #[serde(default)]
    pub teachers: Cell,
}

/// Plan table at the configured address, or wherever the request points.
pub fn plan_table(
    address: &StoreAddress,
    spreadsheet_id: Option<String>,
    worksheet: Option<String>,
) -> Table {
    let spreadsheet_id = non_empty(spreadsheet_id).unwrap_or_else(|| address.spreadsheet_id.clone());
    let worksheet = non_empty(worksheet).unwrap_or_else(|| address.worksheet.clone());
    let range = RangeAddress::columns(worksheet, 0, PLAN_LAST_COLUMN);

    Table {
        spreadsheet_id,
        update_columns: range.clone(),
        range,
        reconciler: Reconciler::new(PLAN_KEYS).skip_header_row(address.skip_header_row),
    }
}

pub fn improvement_table(address: &StoreAddress) -> Table {
    let worksheet = address.worksheet.as_str();

    Table {
        spreadsheet_id: address.spreadsheet_id.clone(),
        range: RangeAddress::columns(worksheet, 0, IMPROVEMENT_LAST_COLUMN),
        update_columns: RangeAddress::columns(
            worksheet,
            IMPROVEMENT_FIRST_UPDATED,
            IMPROVEMENT_LAST_COLUMN,
        ),
        reconciler: Reconciler::new(IMPROVEMENT_KEYS).skip_header_row(address.skip_header_row),
    }
}

pub fn cards_range(address: &StoreAddress) -> RangeAddress {
    RangeAddress::columns(address.worksheet.as_str(), 0, CARDS_LAST_COLUMN)
}

/// Decodes a JSON body, any syntax or shape problem is the caller's fault.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(malformed)
}

/// Decodes a body that must be a JSON object. Serde would otherwise accept a
/// positional array for a struct.
pub fn parse_object<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    from_object(parse_body(body)?)
}

fn from_object<T: DeserializeOwned>(value: Value) -> Result<T, AppError> {
    if !value.is_object() {
        return Err(AppError::InvalidInput("expected a JSON object".to_string()));
    }

    serde_json::from_value(value).map_err(malformed)
}

fn malformed(e: serde_json::Error) -> AppError {
    AppError::InvalidInput(format!("malformed JSON: {e}"))
}

/// Sheets only stores strings, numbers, booleans and blanks.
fn check_scalar(field: &str, cell: &Cell) -> Result<(), AppError> {
    if cell.is_object() || cell.is_array() {
        return Err(AppError::InvalidInput(format!(
            "{field} must be a string, number, boolean or null"
        )));
    }

    Ok(())
}

impl PlanAulaSubmission {
    pub fn parse(body: &[u8]) -> Result<Self, AppError> {
        let submission: Self = parse_object(body)?;
        let width = PLAN_LAST_COLUMN as usize + 1;

        if submission.values.len() != width {
            return Err(AppError::InvalidInput(format!(
                "expected {width} values, got {}",
                submission.values.len()
            )));
        }

        for (i, cell) in submission.values.iter().enumerate() {
            check_scalar(&format!("values[{i}]"), cell)?;
        }

        Ok(submission)
    }
}

impl ImprovementSubmission {
    pub fn parse(body: &[u8]) -> Result<Self, AppError> {
        let submission: Self = parse_object(body)?;

        if submission.nombres_estudiante.is_empty() {
            return Err(AppError::InvalidInput(
                "nombresEstudiante must list at least one student".to_string(),
            ));
        }

        check_scalar("grupo", &submission.grupo)?;
        check_scalar("asignatura", &submission.asignatura)?;
        check_scalar("docenteSeleccionado", &submission.docente)?;
        check_scalar("fechaLimite", &submission.fecha_limite)?;
        check_scalar("planMejoramiento", &submission.plan_mejoramiento)?;

        Ok(submission)
    }

    /// One row per student, every row stamped with `registered_at`.
    pub fn rows(&self, registered_at: &str) -> Vec<Row> {
        self.nombres_estudiante
            .iter()
            .map(|student| {
                vec![
                    blank(&self.grupo),
                    blank(&self.asignatura),
                    blank(&self.docente),
                    Value::String(student.clone()),
                    blank(&self.plan_mejoramiento),
                    blank(&self.fecha_limite),
                    Value::String(registered_at.to_string()),
                ]
            })
            .collect()
    }
}

impl ImprovementRecord {
    pub fn from_row(row: &Row) -> Self {
        Self {
            grupo: text_at(row, 0),
            asignatura: text_at(row, 1),
            docente: text_at(row, 2),
            estudiante: text_at(row, 3),
            plan: text_at(row, 4),
            fecha_limite: text_at(row, 5),
            fecha_registro: text_at(row, 6),
        }
    }
}

impl Card {
    /// A JSON array of `{card, teachers}` objects.
    pub fn parse_batch(body: &[u8]) -> Result<Vec<Self>, AppError> {
        let items: Vec<Value> = parse_body(body)?;

        items
            .into_iter()
            .map(|item| {
                let card: Self = from_object(item)?;
                check_scalar("card", &card.card)?;
                check_scalar("teachers", &card.teachers)?;

                Ok(card)
            })
            .collect()
    }

    /// Rows without both cells are not cards.
    pub fn from_row(row: &Row) -> Option<Self> {
        match (row.first(), row.get(1)) {
            (Some(card), Some(teachers)) if !card.is_null() && !teachers.is_null() => Some(Self {
                card: card.clone(),
                teachers: teachers.clone(),
            }),
            _ => None,
        }
    }

    pub fn into_row(self) -> Row {
        vec![blank(&self.card), blank(&self.teachers)]
    }
}

/// `2025-03-14 07:05:09` in Bogota time.
pub fn registration_timestamp(now: DateTime<Utc>) -> String {
    (now + Duration::hours(REGISTRATION_UTC_OFFSET_HOURS))
        .naive_utc()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn blank(cell: &Cell) -> Cell {
    match cell {
        Value::Null => Value::String(String::new()),
        other => other.clone(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
