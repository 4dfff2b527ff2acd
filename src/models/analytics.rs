// src/models/analytics.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::utils::time::{from_millis, opt_from_millis};

/// Score history for one student, read-only.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAnalytics {
    pub student_id: String,
    pub name: String,
    pub total_sessions: u32,
    pub completed_sessions: u32,
    pub active_sessions: u32,
    /// Mean of completed scores, one decimal.
    pub average_score: Option<f64>,
    pub best_score: Option<u32>,
    pub history: Vec<SessionSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub quiz_id: String,
    pub quiz_title: String,
    pub status: String,
    pub score: Option<u32>,
    pub answered: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Helper struct for the sessions/quizzes join.
#[derive(Debug, FromRow)]
pub struct SessionSummaryRow {
    pub id: String,
    pub quiz_id: String,
    pub title: String,
    pub status: String,
    pub score: Option<i64>,
    pub answers: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
}

impl From<SessionSummaryRow> for SessionSummary {
    fn from(row: SessionSummaryRow) -> Self {
        let answered = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&row.answers)
            .map(|m| m.len() as u32)
            .unwrap_or(0);
        SessionSummary {
            session_id: row.id,
            quiz_id: row.quiz_id,
            quiz_title: row.title,
            status: row.status,
            score: row.score.map(|s| s.clamp(0, 100) as u32),
            answered,
            started_at: from_millis(row.start_time),
            completed_at: opt_from_millis(row.end_time),
        }
    }
}
