// src/bot/gateway.rs

use async_trait::async_trait;

use crate::{
    bot::render::QuestionPrompt,
    error::{QuizError, QuizResult},
};

/// Outbound side of the chat channel.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_text(&self, chat_id: &str, text: &str) -> QuizResult<()>;

    /// Sends a question with one inline button per answer label.
    async fn send_question(&self, chat_id: &str, prompt: &QuestionPrompt) -> QuizResult<()>;
}

/// Used when no bot token is configured. Every send fails, so dispatch
/// reports each recipient as a delivery failure.
pub struct DisabledGateway;

#[async_trait]
impl ChatGateway for DisabledGateway {
    async fn send_text(&self, _chat_id: &str, _text: &str) -> QuizResult<()> {
        Err(QuizError::Channel("chat bot is not configured".to_string()))
    }

    async fn send_question(&self, _chat_id: &str, _prompt: &QuestionPrompt) -> QuizResult<()> {
        Err(QuizError::Channel("chat bot is not configured".to_string()))
    }
}
