// src/models/session.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    error::{QuizError, QuizResult},
    utils::time::{from_millis, opt_from_millis},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Expired,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Expired => "expired",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            "expired" => Some(SessionStatus::Expired),
            "abandoned" => Some(SessionStatus::Abandoned),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

/// One attempt by a recipient at a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub recipient_id: String,
    pub quiz_id: String,
    pub status: SessionStatus,
    /// 1-based; N+1 once every question has an answer.
    pub position: u32,
    /// Submitted label per question position.
    pub answers: BTreeMap<u32, char>,
    /// Integer percentage, set on completion.
    pub score: Option<u32>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Value of the unique `active_key` column while the session is active.
    pub fn active_key(recipient_id: &str, quiz_id: &str) -> String {
        format!("{}:{}", recipient_id, quiz_id)
    }
}

/// Represents the 'sessions' table in the database.
#[derive(Debug, FromRow)]
pub struct SessionRow {
    pub id: String,
    pub recipient_id: String,
    pub quiz_id: String,
    pub status: String,
    pub position: i64,
    /// JSON object: position -> label.
    pub answers: String,
    pub score: Option<i64>,
    pub start_time: i64,
    pub end_time: Option<i64>,
}

impl TryFrom<SessionRow> for Session {
    type Error = QuizError;

    fn try_from(row: SessionRow) -> QuizResult<Self> {
        let status = SessionStatus::parse(&row.status).ok_or_else(|| {
            QuizError::Persistence(format!("unknown session status '{}'", row.status))
        })?;
        Ok(Session {
            id: row.id,
            recipient_id: row.recipient_id,
            quiz_id: row.quiz_id,
            status,
            position: row.position.max(0) as u32,
            answers: serde_json::from_str(&row.answers)?,
            score: row.score.map(|s| s.clamp(0, 100) as u32),
            start_time: from_millis(row.start_time),
            end_time: opt_from_millis(row.end_time),
        })
    }
}

/// Result of a single answer submission, rendered as immediate feedback.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub session: Session,
    /// Position the answer was recorded for.
    pub position: u32,
    pub is_correct: bool,
    pub correct_label: char,
    pub explanation: Option<String>,
    pub question_count: u32,
}

impl AnswerOutcome {
    /// True once the last question has been answered.
    pub fn is_last(&self) -> bool {
        self.session.position > self.question_count
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeOutcome {
    pub score: u32,
    pub correct_count: u32,
    pub total_answered: u32,
    pub session: Session,
}

/// Integer percentage, rounded half up; zero answered scores 0.
pub fn percentage(correct: u32, answered: u32) -> u32 {
    if answered == 0 {
        return 0;
    }
    let correct = correct.min(answered) as u64;
    let answered = answered as u64;
    ((200 * correct + answered) / (2 * answered)) as u32
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    #[serde(default)]
    pub early: bool,
}
