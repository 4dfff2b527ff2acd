// src/handlers/mod.rs

pub mod quizzes;
pub mod sessions;
pub mod tools;
pub mod users;

use axum::{Json, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
