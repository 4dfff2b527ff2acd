// src/handlers/users.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{CreateRecipientRequest, ListRecipientsQuery},
    state::AppState,
};

/// Registers a student (or teacher/admin) by phone number.
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateRecipientRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let recipient = state.recipients.create(payload).await?;
    Ok((StatusCode::CREATED, Json(recipient)))
}

/// Lists users, optionally filtered by `?classId=`.
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListRecipientsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let users = state.recipients.list(query.class_id.as_deref()).await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.recipients.get(&id).await?;
    Ok(Json(user))
}
