// src/services/dispatch.rs

use std::sync::Arc;

use crate::{
    bot::{gateway::ChatGateway, render::question_prompt},
    error::{QuizError, QuizResult},
    models::{dispatch::DispatchReport, quiz::{Quiz, QuizStatus}, user::Recipient},
    services::{quizzes::QuizService, recipients::RecipientService, sessions::SessionService},
};

/// Sends a quiz to many recipients. Per-recipient failures are collected in
/// the report and never abort the batch.
pub struct DispatchService {
    recipients: RecipientService,
    quizzes: QuizService,
    sessions: Arc<SessionService>,
    gateway: Arc<dyn ChatGateway>,
}

impl DispatchService {
    pub fn new(
        recipients: RecipientService,
        quizzes: QuizService,
        sessions: Arc<SessionService>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        Self {
            recipients,
            quizzes,
            sessions,
            gateway,
        }
    }

    pub async fn dispatch_to_class(&self, quiz_id: &str, cohort: &str) -> QuizResult<DispatchReport> {
        let quiz = self.prepare(quiz_id).await?;
        let takers = self.recipients.list_takers(cohort).await?;
        tracing::info!(
            "Dispatching quiz {} to class {} ({} students)",
            quiz.id,
            cohort,
            takers.len()
        );

        let mut report = DispatchReport::new(&quiz.id);
        for recipient in &takers {
            self.deliver(&mut report, &quiz, recipient).await;
        }

        log_report(&report);
        Ok(report)
    }

    pub async fn dispatch_to_recipients(
        &self,
        quiz_id: &str,
        recipient_ids: &[String],
    ) -> QuizResult<DispatchReport> {
        let quiz = self.prepare(quiz_id).await?;
        tracing::info!(
            "Dispatching quiz {} to {} selected students",
            quiz.id,
            recipient_ids.len()
        );

        let mut report = DispatchReport::new(&quiz.id);
        for id in recipient_ids {
            match self.recipients.get(id).await {
                Ok(recipient) => self.deliver(&mut report, &quiz, &recipient).await,
                Err(e) => {
                    tracing::warn!("Dispatch to {} failed: {}", id, e);
                    report.record_failure(id, e.to_string());
                }
            }
        }

        log_report(&report);
        Ok(report)
    }

    /// Loads the quiz, activating a draft after validation.
    async fn prepare(&self, quiz_id: &str) -> QuizResult<Quiz> {
        let quiz = self.quizzes.get(quiz_id).await?;
        match quiz.status {
            QuizStatus::Active => Ok(quiz),
            QuizStatus::Draft => self.quizzes.activate(quiz_id).await,
            QuizStatus::Closed => Err(QuizError::QuizNotActive(quiz_id.to_string())),
        }
    }

    async fn deliver(&self, report: &mut DispatchReport, quiz: &Quiz, recipient: &Recipient) {
        let Some(chat_id) = recipient.channel_id.as_deref() else {
            tracing::debug!("Recipient {} has no bound chat, skipping", recipient.id);
            report.record_skipped(&recipient.id);
            return;
        };

        let session = match self.sessions.create(&recipient.id, &quiz.id).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Dispatch to {} failed: {}", recipient.id, e);
                report.record_failure(&recipient.id, e.to_string());
                return;
            }
        };

        let Some(first) = quiz.question_at(1) else {
            report.record_failure(&recipient.id, "quiz has no questions");
            return;
        };
        let prompt = question_prompt(quiz, first, &session.id, self.quizzes.labels());

        if let Err(e) = self.gateway.send_question(chat_id, &prompt).await {
            tracing::warn!(
                "First question of quiz {} could not be sent to {}: {}",
                quiz.id,
                recipient.id,
                e
            );
            // Free the (recipient, quiz) slot so a later dispatch can retry.
            if let Err(abandon_err) = self.sessions.abandon(&session.id).await {
                tracing::error!(
                    "Failed to abandon undelivered session {}: {}",
                    session.id,
                    abandon_err
                );
            }
            report.record_failure(&recipient.id, e.to_string());
            return;
        }

        report.record_success(&recipient.id, &session.id);
    }
}

fn log_report(report: &DispatchReport) {
    tracing::info!(
        "Dispatch of quiz {} finished: {} sent, {} failed, {} without chat",
        report.quiz_id,
        report.success_count,
        report.failure_count,
        report.skipped_no_channel
    );
}
