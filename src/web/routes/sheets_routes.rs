use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::api_error::ApiError;
use super::router::AppState;
use crate::core::registrations::registration_models::canonicalize_keys;
use crate::core::registrations::validation::SUBMISSION_KEYS;
use crate::core::registrations::{validate_submission, EventDescriptor, ValidationIssue};
use crate::core::sheets::SpreadsheetClient;

/// Body of the create and update calls.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRequest {
    #[serde(default)]
    pub event_data: Option<EventDescriptor>,
    /// Kept as raw JSON so one unreadable entry becomes an error row
    /// instead of a rejected body.
    #[serde(default)]
    pub registrations: Value,
}

impl SheetRequest {
    /// Validates the raw body, then reads it into the typed request.
    fn from_body(mut body: Value) -> Result<Self, ApiError> {
        validate_submission(&body).map_err(ApiError::validation)?;

        canonicalize_keys(&mut body, SUBMISSION_KEYS);
        serde_json::from_value(body).map_err(|e| {
            ApiError::validation(vec![ValidationIssue::new("eventData", e.to_string())])
        })
    }
}

pub async fn create_sheet<C: SpreadsheetClient + 'static>(
    State(state): State<AppState<C>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(body) = payload?;
    let request = SheetRequest::from_body(body)?;

    let created = state
        .sheets
        .create_event_sheet(request.event_data.as_ref(), &request.registrations)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "data": created})),
    ))
}

pub async fn update_sheet<C: SpreadsheetClient + 'static>(
    State(state): State<AppState<C>>,
    Path(spreadsheet_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let request = SheetRequest::from_body(body)?;

    let updated = state
        .sheets
        .update_event_sheet(
            &spreadsheet_id,
            request.event_data.as_ref(),
            &request.registrations,
        )
        .await?;

    Ok(Json(json!({"success": true, "data": updated})))
}

pub async fn get_sheet<C: SpreadsheetClient + 'static>(
    State(state): State<AppState<C>>,
    Path(spreadsheet_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let info = state.sheets.get_sheet_info(&spreadsheet_id).await?;
    Ok(Json(json!({"success": true, "data": info})))
}

pub async fn delete_sheet<C: SpreadsheetClient + 'static>(
    State(state): State<AppState<C>>,
    Path(spreadsheet_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.sheets.delete_sheet(&spreadsheet_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Spreadsheet {spreadsheet_id} deleted"),
    })))
}
