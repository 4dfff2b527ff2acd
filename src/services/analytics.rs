// src/services/analytics.rs

use sqlx::AnyPool;

use crate::{
    error::{QuizError, QuizResult},
    models::{
        analytics::{SessionSummary, SessionSummaryRow, StudentAnalytics},
        session::SessionStatus,
    },
};

/// Read-only score history.
#[derive(Clone)]
pub struct AnalyticsService {
    pool: AnyPool,
}

impl AnalyticsService {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub async fn student(&self, student_id: &str) -> QuizResult<StudentAnalytics> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM users WHERE id = ?")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;
        let name = name.ok_or_else(|| QuizError::RecipientNotFound(student_id.to_string()))?;

        let history: Vec<SessionSummary> = sqlx::query_as::<_, SessionSummaryRow>(
            "SELECT s.id, s.quiz_id, q.title, s.status, s.score, s.answers, s.start_time, s.end_time \
             FROM sessions s JOIN quizzes q ON q.id = s.quiz_id \
             WHERE s.recipient_id = ? ORDER BY s.start_time DESC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(SessionSummary::from)
        .collect();

        Ok(summarize(student_id, name, history))
    }
}

fn summarize(student_id: &str, name: String, history: Vec<SessionSummary>) -> StudentAnalytics {
    let count = |status: SessionStatus| {
        history
            .iter()
            .filter(|s| s.status == status.as_str())
            .count() as u32
    };

    let scores: Vec<u32> = history
        .iter()
        .filter(|s| s.status == SessionStatus::Completed.as_str())
        .filter_map(|s| s.score)
        .collect();

    let average_score = if scores.is_empty() {
        None
    } else {
        let mean = scores.iter().sum::<u32>() as f64 / scores.len() as f64;
        Some((mean * 10.0).round() / 10.0)
    };

    StudentAnalytics {
        student_id: student_id.to_string(),
        name,
        total_sessions: history.len() as u32,
        completed_sessions: count(SessionStatus::Completed),
        active_sessions: count(SessionStatus::Active),
        average_score,
        best_score: scores.iter().copied().max(),
        history,
    }
}
