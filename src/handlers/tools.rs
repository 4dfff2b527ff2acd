// src/handlers/tools.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    authoring,
    error::{AppError, QuizError},
    models::{
        content::IngestRequest,
        dispatch::{SendToClassRequest, SendToStudentsRequest},
        quiz::GenerateQuizRequest,
    },
    state::AppState,
};

/// Sends a quiz to every student of a class.
pub async fn send_to_class(
    State(state): State<AppState>,
    Json(payload): Json<SendToClassRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    tracing::info!(
        "Teacher {:?} sends quiz {} to class {} (subject {:?})",
        payload.teacher_id,
        payload.quiz_id,
        payload.class_id,
        payload.subject_id
    );
    let report = state
        .dispatch
        .dispatch_to_class(&payload.quiz_id, &payload.class_id)
        .await?;
    Ok(Json(report))
}

/// Sends a quiz to an explicit list of students.
pub async fn send_to_students(
    State(state): State<AppState>,
    Json(payload): Json<SendToStudentsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    tracing::info!(
        "Teacher {:?} sends quiz {} to {} students",
        payload.teacher_id,
        payload.quiz_id,
        payload.student_ids.len()
    );
    let report = state
        .dispatch
        .dispatch_to_recipients(&payload.quiz_id, &payload.student_ids)
        .await?;
    Ok(Json(report))
}

pub async fn bot_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.bot_status.snapshot())
}

pub async fn student_analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let analytics = state.analytics.student(&id).await?;
    Ok(Json(analytics))
}

/// Generates a draft quiz from uploaded content or raw text.
pub async fn generate_quiz(
    State(state): State<AppState>,
    Json(payload): Json<GenerateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let generator = state
        .generator
        .clone()
        .ok_or(QuizError::GeneratorUnavailable)?;

    let quiz =
        authoring::generate_draft(generator.as_ref(), &state.contents, &state.quizzes, payload)
            .await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Uploads plain-text study material.
pub async fn ingest_content(
    State(state): State<AppState>,
    Json(payload): Json<IngestRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let content = state
        .contents
        .ingest(&payload.title, &payload.text, payload.class_id.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(content)))
}

pub async fn content_chunks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let chunks = state.contents.chunks(&id).await?;
    if chunks.is_empty() {
        return Err(AppError::NotFound(format!("content not found: {}", id)));
    }
    Ok(Json(chunks))
}

/// Runs the expiry sweep now instead of waiting for the next tick.
pub async fn expire_sessions(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let expired = state
        .sessions
        .expire_stale(Utc::now(), state.sessions.ttl())
        .await?;
    Ok(Json(json!({ "expired": expired })))
}
