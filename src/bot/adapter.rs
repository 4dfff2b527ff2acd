// src/bot/adapter.rs

use std::sync::Arc;

use crate::{
    bot::{
        command::Command,
        gateway::ChatGateway,
        render::{self, question_prompt},
    },
    error::{QuizError, QuizResult},
    models::{session::Session, user::Recipient},
    services::{recipients::RecipientService, sessions::SessionService},
};

/// Maps inbound chat events onto the session state machine and renders the
/// results back through the gateway. Errors stop here: each one is logged and
/// answered with a chat message.
pub struct MessagingAdapter {
    recipients: RecipientService,
    sessions: Arc<SessionService>,
    gateway: Arc<dyn ChatGateway>,
    labels: Vec<char>,
}

impl MessagingAdapter {
    pub fn new(
        recipients: RecipientService,
        sessions: Arc<SessionService>,
        gateway: Arc<dyn ChatGateway>,
        labels: Vec<char>,
    ) -> Self {
        Self {
            recipients,
            sessions,
            gateway,
            labels,
        }
    }

    /// Handles a text message from `chat_id`.
    pub async fn handle_text(&self, chat_id: &str, text: &str) {
        let command = Command::parse(text);
        self.handle(chat_id, command).await;
    }

    /// Handles an inline button click from `chat_id`.
    pub async fn handle_button(&self, chat_id: &str, data: &str) {
        let command = Command::parse_button(data);
        self.handle(chat_id, command).await;
    }

    pub async fn handle(&self, chat_id: &str, command: Command) {
        tracing::debug!("Chat {} sent {:?}", chat_id, command);
        if let Err(e) = self.route(chat_id, command).await {
            match &e {
                QuizError::Persistence(_) | QuizError::Channel(_) => {
                    tracing::error!("Chat {} request failed: {}", chat_id, e)
                }
                _ => tracing::info!("Chat {} request rejected: {}", chat_id, e),
            }
            self.reply(chat_id, e.user_message()).await;
        }
    }

    async fn route(&self, chat_id: &str, command: Command) -> QuizResult<()> {
        match command {
            Command::Start => {
                let recipient = self.recipients.find_by_channel(chat_id).await?;
                self.reply(chat_id, &render::welcome(recipient.as_ref().map(|r| r.name.as_str())))
                    .await;
                Ok(())
            }
            Command::Register(phone) => self.register(chat_id, &phone).await,
            Command::RegisterUsage => {
                self.reply(chat_id, render::register_usage()).await;
                Ok(())
            }
            Command::Help | Command::Unknown => {
                self.reply(chat_id, &render::help(&self.labels)).await;
                Ok(())
            }
            Command::Resume => {
                let Some(session) = self.current_session(chat_id).await? else {
                    return Ok(());
                };
                self.send_current_question(chat_id, &session).await
            }
            Command::Finish => {
                let Some(session) = self.current_session(chat_id).await? else {
                    return Ok(());
                };
                self.finish(chat_id, &session.id, true).await
            }
            Command::Answer(label) => {
                if !self.is_label(&label) && !self.has_active_session(chat_id).await? {
                    self.reply(chat_id, &render::help(&self.labels)).await;
                    return Ok(());
                }
                let Some(session) = self.current_session(chat_id).await? else {
                    return Ok(());
                };
                // Pinned to the question on screen: a repeated reply must not answer the next one.
                self.answer(chat_id, &session, session.position, &label)
                    .await
            }
            Command::Button {
                session_id,
                position,
                label,
            } => {
                let Some(recipient) = self.registered(chat_id).await? else {
                    return Ok(());
                };
                let session = self.sessions.get(&session_id).await?;
                if session.recipient_id != recipient.id {
                    tracing::warn!(
                        "Chat {} clicked a button for someone else's session {}",
                        chat_id,
                        session_id
                    );
                    return Err(QuizError::SessionNotFound(session_id));
                }
                self.answer(chat_id, &session, position, &label).await
            }
        }
    }

    async fn register(&self, chat_id: &str, phone: &str) -> QuizResult<()> {
        let recipient = self.recipients.bind_channel(phone, chat_id).await?;
        self.reply(chat_id, &render::registered(&recipient.name)).await;

        if let Some(session) = self.sessions.active_for_recipient(&recipient.id).await? {
            self.send_current_question(chat_id, &session).await?;
        }
        Ok(())
    }

    /// Submits an answer for `position`, then sends feedback followed by the
    /// next question, or the result once the last question is answered.
    async fn answer(
        &self,
        chat_id: &str,
        session: &Session,
        position: u32,
        label: &str,
    ) -> QuizResult<()> {
        let submitted = self
            .sessions
            .submit_answer_at(&session.id, position, label)
            .await;

        let outcome = match submitted {
            Ok(outcome) => outcome,
            Err(e @ QuizError::InvalidAnswerFormat(_)) => {
                tracing::info!("Chat {} sent an unusable answer: {}", chat_id, e);
                self.reply(chat_id, e.user_message()).await;
                return self.send_current_question(chat_id, session).await;
            }
            Err(QuizError::SessionAlreadyFinalizing(_)) => {
                return self.finish(chat_id, &session.id, false).await;
            }
            Err(e) => return Err(e),
        };

        self.gateway
            .send_text(chat_id, &render::feedback(&outcome))
            .await?;

        if outcome.is_last() {
            self.finish(chat_id, &outcome.session.id, false).await
        } else {
            self.send_current_question(chat_id, &outcome.session).await
        }
    }

    async fn finish(&self, chat_id: &str, session_id: &str, early: bool) -> QuizResult<()> {
        let outcome = self.sessions.finalize(session_id, early).await?;
        let quiz = self.sessions.quiz_for(&outcome.session).await?;
        self.gateway
            .send_text(chat_id, &render::result(&outcome, &quiz.title))
            .await
    }

    async fn send_current_question(&self, chat_id: &str, session: &Session) -> QuizResult<()> {
        let quiz = self.sessions.quiz_for(session).await?;
        match quiz.question_at(session.position) {
            Some(question) => {
                let prompt = question_prompt(&quiz, question, &session.id, &self.labels);
                self.gateway.send_question(chat_id, &prompt).await
            }
            None => self.finish(chat_id, &session.id, false).await,
        }
    }

    /// Recipient bound to this chat; tells the chat to register when there is none.
    async fn registered(&self, chat_id: &str) -> QuizResult<Option<Recipient>> {
        let recipient = self.recipients.find_by_channel(chat_id).await?;
        if recipient.is_none() {
            self.reply(chat_id, render::not_registered()).await;
        }
        Ok(recipient)
    }

    /// Active session of the recipient bound to this chat. Replies with the
    /// matching notice when the chat is unregistered or has nothing active.
    async fn current_session(&self, chat_id: &str) -> QuizResult<Option<Session>> {
        let Some(recipient) = self.registered(chat_id).await? else {
            return Ok(None);
        };
        let session = self.sessions.active_for_recipient(&recipient.id).await?;
        if session.is_none() {
            self.reply(chat_id, render::nothing_active()).await;
        }
        Ok(session)
    }

    fn is_label(&self, raw: &str) -> bool {
        let mut chars = raw.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => self.labels.contains(&c.to_ascii_uppercase()),
            _ => false,
        }
    }

    async fn has_active_session(&self, chat_id: &str) -> QuizResult<bool> {
        let Some(recipient) = self.recipients.find_by_channel(chat_id).await? else {
            return Ok(false);
        };
        Ok(self
            .sessions
            .active_for_recipient(&recipient.id)
            .await?
            .is_some())
    }

    async fn reply(&self, chat_id: &str, text: &str) {
        if let Err(e) = self.gateway.send_text(chat_id, text).await {
            tracing::error!("Failed to reply to chat {}: {}", chat_id, e);
        }
    }
}
