// src/handlers/sessions.rs

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{error::AppError, models::session::FinalizeRequest, state::AppState};

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.get(&id).await?;
    Ok(Json(session))
}

/// Finalizes a session. The body `{"early": true}` is optional.
/// Safe to retry: a completed session returns its stored score.
pub async fn finalize_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: FinalizeRequest = if body.is_empty() {
        FinalizeRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let outcome = state.sessions.finalize(&id, request.early).await?;
    Ok(Json(outcome))
}
