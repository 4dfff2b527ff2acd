// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Domain errors raised by the quiz services and the messaging adapter.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("not a valid phone number: {0:?}")]
    InvalidPhone(String),

    #[error("a recipient with phone {0} already exists")]
    RecipientExists(String),

    #[error("recipient {recipient_id} is already bound to another chat")]
    ChannelAlreadyBound { recipient_id: String },

    #[error("an active session already exists: {session_id}")]
    DuplicateSession { session_id: String },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session {0} is no longer active")]
    SessionExpired(String),

    #[error("session {0} has answered every question and awaits finalization")]
    SessionAlreadyFinalizing(String),

    #[error("session {session_id} already has an answer for position {position}")]
    AnswerAlreadyRecorded { session_id: String, position: u32 },

    #[error("session {0} still has unanswered questions")]
    SessionIncomplete(String),

    #[error("invalid answer format: {0:?}")]
    InvalidAnswerFormat(String),

    #[error("quiz not found: {0}")]
    QuizNotFound(String),

    #[error("quiz {0} is not active")]
    QuizNotActive(String),

    #[error("quiz {0} can no longer be edited")]
    QuizImmutable(String),

    #[error("invalid quiz content: {0}")]
    InvalidQuizContent(String),

    #[error("question generation is not configured")]
    GeneratorUnavailable,

    #[error("question generation failed: {0}")]
    Generator(String),

    #[error("message delivery failed: {0}")]
    Channel(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl QuizError {
    /// Chat-facing text for this error. Never includes identifiers or causes.
    pub fn user_message(&self) -> &'static str {
        match self {
            QuizError::RecipientNotFound(_) => {
                "❌ We could not find a student with that phone number. Please check it or contact your teacher."
            }
            QuizError::InvalidPhone(_) => {
                "📱 Please send a valid phone number, for example: /register +1234567890"
            }
            QuizError::RecipientExists(_) => "ℹ️ You are already registered.",
            QuizError::ChannelAlreadyBound { .. } => {
                "⚠️ This account is already linked to a different chat. Please contact your teacher."
            }
            QuizError::DuplicateSession { .. } => {
                "ℹ️ You already have this quiz in progress. Send /quiz to continue."
            }
            QuizError::SessionNotFound(_) => "ℹ️ You have no active quiz right now.",
            QuizError::SessionExpired(_) => {
                "⌛ This quiz session has expired. Please ask your teacher to send it again."
            }
            QuizError::SessionAlreadyFinalizing(_) => {
                "✅ You have already answered every question of this quiz."
            }
            QuizError::AnswerAlreadyRecorded { .. } => {
                "ℹ️ That question has already been answered."
            }
            QuizError::SessionIncomplete(_) => "ℹ️ There are still unanswered questions.",
            QuizError::InvalidAnswerFormat(_) => {
                "❓ Please answer with one of the option letters, or use the buttons below the question."
            }
            QuizError::QuizNotFound(_) | QuizError::QuizNotActive(_) => {
                "ℹ️ This quiz is not available anymore."
            }
            QuizError::QuizImmutable(_)
            | QuizError::InvalidQuizContent(_)
            | QuizError::GeneratorUnavailable
            | QuizError::Generator(_)
            | QuizError::Channel(_)
            | QuizError::Persistence(_) => {
                "⚠️ Something went wrong on our side. Please try again in a moment."
            }
        }
    }
}

impl From<sqlx::Error> for QuizError {
    fn from(err: sqlx::Error) -> Self {
        QuizError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for QuizError {
    fn from(err: serde_json::Error) -> Self {
        QuizError::Persistence(format!("corrupt stored document: {}", err))
    }
}

pub type QuizResult<T> = Result<T, QuizError>;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate session)
    Conflict(String),

    // 503 Service Unavailable (e.g., generator not configured)
    ServiceUnavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<QuizError> for AppError {
    fn from(err: QuizError) -> Self {
        match err {
            QuizError::RecipientNotFound(_)
            | QuizError::SessionNotFound(_)
            | QuizError::QuizNotFound(_) => AppError::NotFound(err.to_string()),
            QuizError::RecipientExists(_)
            | QuizError::ChannelAlreadyBound { .. }
            | QuizError::DuplicateSession { .. }
            | QuizError::SessionExpired(_)
            | QuizError::SessionAlreadyFinalizing(_)
            | QuizError::AnswerAlreadyRecorded { .. }
            | QuizError::QuizNotActive(_)
            | QuizError::QuizImmutable(_) => AppError::Conflict(err.to_string()),
            QuizError::InvalidPhone(_)
            | QuizError::SessionIncomplete(_)
            | QuizError::InvalidAnswerFormat(_)
            | QuizError::InvalidQuizContent(_) => AppError::BadRequest(err.to_string()),
            QuizError::GeneratorUnavailable => AppError::ServiceUnavailable(err.to_string()),
            QuizError::Generator(_) | QuizError::Channel(_) | QuizError::Persistence(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_http_statuses() {
        let resp = AppError::from(QuizError::QuizNotFound("q".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = AppError::from(QuizError::DuplicateSession {
            session_id: "s".into(),
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = AppError::from(QuizError::GeneratorUnavailable).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn user_messages_do_not_leak_identifiers() {
        let err = QuizError::ChannelAlreadyBound {
            recipient_id: "secret-id-42".into(),
        };
        assert!(!err.user_message().contains("secret-id-42"));
        assert!(err.to_string().contains("secret-id-42"));
    }
}
