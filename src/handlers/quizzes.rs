// src/handlers/quizzes.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::{AnswerKeyCorrection, QuestionInput},
        quiz::{CreateQuizRequest, ListQuizzesQuery, PublicQuiz},
    },
    services::quizzes::NewQuiz,
    state::AppState,
};

/// Creates a draft quiz from explicit questions.
pub async fn create_quiz(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let meta = NewQuiz {
        title: payload.title,
        subject: payload.subject,
        grade_level: payload.grade_level,
        cohort: payload.class_id,
        created_by: payload.teacher_id,
    };
    let quiz = state.quizzes.create_draft(meta, payload.questions).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Lists quizzes without their questions.
pub async fn list_quizzes(
    State(state): State<AppState>,
    Query(query): Query<ListQuizzesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = state
        .quizzes
        .list(query.class_id.as_deref(), query.status)
        .await?;
    Ok(Json(quizzes))
}

/// Full quiz including the answer key.
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = state.quizzes.get(&id).await?;
    Ok(Json(quiz))
}

/// Quiz as a student sees it (no answer key).
pub async fn get_public_quiz(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = state.quizzes.get(&id).await?;
    Ok(Json(PublicQuiz::from(&quiz)))
}

pub async fn activate_quiz(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = state.quizzes.activate(&id).await?;
    Ok(Json(quiz))
}

pub async fn close_quiz(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = state.quizzes.close(&id).await?;
    Ok(Json(quiz))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceQuestionsRequest {
    #[validate(length(min = 1, max = 100), nested)]
    pub questions: Vec<QuestionInput>,
}

/// Replaces the questions of a draft quiz.
pub async fn replace_questions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ReplaceQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let quiz = state.quizzes.replace_questions(&id, payload.questions).await?;
    Ok(Json(quiz))
}

/// Corrects the answer key of one question, also on a live quiz.
pub async fn correct_answer_key(
    State(state): State<AppState>,
    Path((id, position)): Path<(String, u32)>,
    Json(payload): Json<AnswerKeyCorrection>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let question = state
        .quizzes
        .correct_answer_key(&id, position, &payload.correct_label, payload.explanation)
        .await?;
    Ok(Json(question))
}
