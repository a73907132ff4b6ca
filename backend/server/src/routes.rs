use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{self, Query, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::{
    error::AppError,
    reconcile::Decision,
    records::{
        Card, ImprovementRecord, ImprovementSubmission, PlanAulaSubmission, SheetQuery,
        cards_range, improvement_table, plan_table, registration_timestamp,
    },
    state::State,
};

type AppState = extract::State<Arc<State>>;

pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

pub async fn get_plan_aula(
    extract::State(state): AppState,
    query: Result<Query<SheetQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let table = plan_table(&state.config.plan, query.spreadsheet_id, query.worksheet_title);
    let values = state
        .gateway
        .fetch_all(&table.spreadsheet_id, &table.range)
        .await?;

    Ok(Json(json!({ "success": true, "values": values })))
}

pub async fn save_plan_aula(
    extract::State(state): AppState,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let submission = PlanAulaSubmission::parse(&body)?;
    let table = plan_table(
        &state.config.plan,
        submission.spreadsheet_id,
        submission.worksheet_title,
    );

    let outcome = state.gateway.upsert(&table, submission.values).await?;
    let updated = matches!(outcome.decision, Decision::Update { .. });
    let message = if updated {
        "Plan de Aula actualizado exitosamente."
    } else {
        "Plan de Aula guardado exitosamente."
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "updated": updated,
        "updatedRange": outcome.updated_range,
    })))
}

pub async fn get_improvement_plans(
    extract::State(state): AppState,
) -> Result<impl IntoResponse, AppError> {
    let table = improvement_table(&state.config.improvement);
    let rows = state
        .gateway
        .fetch_all(&table.spreadsheet_id, &table.range)
        .await?;

    let skip = usize::from(state.config.improvement.skip_header_row);
    let records: Vec<ImprovementRecord> = rows
        .iter()
        .skip(skip)
        .map(ImprovementRecord::from_row)
        .collect();

    Ok(Json(json!({ "success": true, "records": records })))
}

pub async fn save_improvement_plans(
    extract::State(state): AppState,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let submission = ImprovementSubmission::parse(&body)?;
    let table = improvement_table(&state.config.improvement);

    let rows = submission.rows(&registration_timestamp(Utc::now()));
    info!("Improvement plan for {} students", rows.len());

    let outcome = state.gateway.upsert_batch(&table, rows).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Datos procesados correctamente",
        "updated": outcome.updated_rows.len(),
        "appended": outcome.appended,
    })))
}

pub async fn get_cards(extract::State(state): AppState) -> Result<impl IntoResponse, AppError> {
    let address = &state.config.cards;
    let rows = state
        .gateway
        .fetch_all(&address.spreadsheet_id, &cards_range(address))
        .await?;

    let cards: Vec<Card> = rows.iter().filter_map(Card::from_row).collect();

    Ok(Json(cards))
}

pub async fn save_cards(
    extract::State(state): AppState,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let cards = Card::parse_batch(&body)?;
    let rows: Vec<_> = cards.into_iter().map(Card::into_row).collect();

    let address = &state.config.cards;
    let result = state
        .gateway
        .append_batch(&address.spreadsheet_id, &cards_range(address), &rows)
        .await?;

    let (updated_range, row_count) = result
        .map(|r| (r.updated_range, r.row_count))
        .unwrap_or_default();

    Ok(Json(json!({
        "success": true,
        "message": "Datos guardados exitosamente",
        "updatedRange": updated_range,
        "rowCount": row_count,
    })))
}
