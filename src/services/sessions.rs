// src/services/sessions.rs

use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};
use sqlx::AnyPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::is_unique_violation,
    error::{QuizError, QuizResult},
    models::{
        quiz::{Quiz, QuizStatus},
        session::{AnswerOutcome, FinalizeOutcome, Session, SessionRow, SessionStatus, percentage},
    },
    services::quizzes::QuizService,
    utils::{lock::KeyedLocks, time::to_millis},
};

const SELECT_SESSION: &str = "SELECT id, recipient_id, quiz_id, status, position, answers, score, start_time, end_time FROM sessions";

/// Quiz-taking state machine.
///
/// The database is the authority. Active sessions are cached by id and dropped
/// from the cache on every terminal transition. Mutations for one session are
/// serialized in-process by a keyed mutex, and every write is a conditional
/// UPDATE guarded by status, position and start time, so a concurrent writer
/// in another process cannot double-apply an answer either.
pub struct SessionService {
    pool: AnyPool,
    quizzes: QuizService,
    ttl: Duration,
    cache: RwLock<HashMap<String, Session>>,
    locks: KeyedLocks,
}

impl SessionService {
    pub fn new(pool: AnyPool, quizzes: QuizService, ttl: Duration) -> Self {
        Self {
            pool,
            quizzes,
            ttl,
            cache: RwLock::new(HashMap::new()),
            locks: KeyedLocks::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Starts a session at position 1 for an active quiz.
    ///
    /// Fails with `DuplicateSession` while another active session exists for
    /// the same pair. An existing session past its TTL is expired first.
    pub async fn create(&self, recipient_id: &str, quiz_id: &str) -> QuizResult<Session> {
        let quiz = self.quizzes.get(quiz_id).await?;
        if quiz.status != QuizStatus::Active {
            return Err(QuizError::QuizNotActive(quiz_id.to_string()));
        }

        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(recipient_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(QuizError::RecipientNotFound(recipient_id.to_string()));
        }

        let active_key = Session::active_key(recipient_id, quiz_id);
        if let Some(existing) = self.find_by_active_key(&active_key).await? {
            if self.is_stale(&existing, Utc::now()) {
                self.mark_expired(&existing.id).await?;
            } else {
                return Err(QuizError::DuplicateSession {
                    session_id: existing.id,
                });
            }
        }

        let id = Uuid::new_v4().to_string();
        let now = to_millis(Utc::now());

        let inserted = sqlx::query(
            "INSERT INTO sessions (id, recipient_id, quiz_id, status, position, answers, score, start_time, end_time, active_key) \
             VALUES (?, ?, ?, ?, 1, '{}', NULL, ?, NULL, ?)",
        )
        .bind(&id)
        .bind(recipient_id)
        .bind(quiz_id)
        .bind(SessionStatus::Active.as_str())
        .bind(now)
        .bind(&active_key)
        .execute(&self.pool)
        .await;

        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                // Lost a race against a concurrent dispatch for the same pair.
                let session_id = self
                    .find_by_active_key(&active_key)
                    .await?
                    .map(|s| s.id)
                    .unwrap_or_default();
                return Err(QuizError::DuplicateSession { session_id });
            }
            tracing::error!("Failed to create session: {:?}", e);
            return Err(e.into());
        }

        tracing::info!(
            "Session {} started for recipient {} on quiz {}",
            id,
            recipient_id,
            quiz_id
        );
        self.load_fresh(&id).await
    }

    pub async fn get(&self, id: &str) -> QuizResult<Session> {
        if let Some(session) = self.cache.read().await.get(id) {
            return Ok(session.clone());
        }
        self.load_fresh(id).await
    }

    /// Most recently started active session of a recipient.
    pub async fn active_for_recipient(&self, recipient_id: &str) -> QuizResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "{} WHERE recipient_id = ? AND status = ? ORDER BY start_time DESC LIMIT 1",
            SELECT_SESSION
        ))
        .bind(recipient_id)
        .bind(SessionStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let session = Session::try_from(row)?;
                self.remember(&session).await;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// The quiz a session is taking, with its current answer key.
    pub async fn quiz_for(&self, session: &Session) -> QuizResult<Quiz> {
        self.quizzes.get(&session.quiz_id).await
    }

    /// Records an answer for the session's current question.
    pub async fn submit_answer(&self, session_id: &str, label: &str) -> QuizResult<AnswerOutcome> {
        let label = self.parse_label(label)?;
        let _guard = self.locks.lock(session_id).await;
        self.apply_answer(session_id, None, label).await
    }

    /// Records an answer for an explicit position, as carried by a button payload.
    /// A position other than the current one is a stale or duplicate click.
    pub async fn submit_answer_at(
        &self,
        session_id: &str,
        position: u32,
        label: &str,
    ) -> QuizResult<AnswerOutcome> {
        let label = self.parse_label(label)?;
        let _guard = self.locks.lock(session_id).await;
        self.apply_answer(session_id, Some(position), label).await
    }

    fn parse_label(&self, raw: &str) -> QuizResult<char> {
        let trimmed = raw.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                let c = c.to_ascii_uppercase();
                if self.quizzes.labels().contains(&c) {
                    Ok(c)
                } else {
                    Err(QuizError::InvalidAnswerFormat(raw.to_string()))
                }
            }
            _ => Err(QuizError::InvalidAnswerFormat(raw.to_string())),
        }
    }

    async fn apply_answer(
        &self,
        session_id: &str,
        expected_position: Option<u32>,
        label: char,
    ) -> QuizResult<AnswerOutcome> {
        let session = self.get(session_id).await?;
        if !session.is_active() {
            return Err(QuizError::SessionExpired(session.id));
        }
        if self.is_stale(&session, Utc::now()) {
            self.mark_expired(&session.id).await?;
            return Err(QuizError::SessionExpired(session.id));
        }

        let quiz = self.quizzes.get(&session.quiz_id).await?;
        let question_count = quiz.question_count();

        if let Some(position) = expected_position {
            if position < session.position {
                return Err(QuizError::AnswerAlreadyRecorded {
                    session_id: session.id,
                    position,
                });
            }
            if position > session.position {
                return Err(QuizError::InvalidAnswerFormat(format!(
                    "question {} is not the current question",
                    position
                )));
            }
        }
        if session.position > question_count {
            return Err(QuizError::SessionAlreadyFinalizing(session.id));
        }

        let position = session.position;
        let question = quiz.question_at(position).ok_or_else(|| {
            QuizError::Persistence(format!(
                "quiz {} has no question at position {}",
                quiz.id, position
            ))
        })?;

        let mut answers = session.answers.clone();
        if answers.contains_key(&position) {
            return Err(QuizError::AnswerAlreadyRecorded {
                session_id: session.id,
                position,
            });
        }
        answers.insert(position, label);

        let cutoff = to_millis(Utc::now()) - self.ttl.as_millis() as i64;
        let result = sqlx::query(
            "UPDATE sessions SET position = ?, answers = ? \
             WHERE id = ? AND status = ? AND position = ? AND start_time >= ?",
        )
        .bind((position + 1) as i64)
        .bind(serde_json::to_string(&answers)?)
        .bind(&session.id)
        .bind(SessionStatus::Active.as_str())
        .bind(position as i64)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.explain_lost_update(&session.id, position).await);
        }

        let mut updated = session;
        updated.position = position + 1;
        updated.answers = answers;
        self.remember(&updated).await;

        let is_correct = question.is_correct(label);
        tracing::debug!(
            "Session {} answered {} at position {} (correct: {})",
            updated.id,
            label,
            position,
            is_correct
        );

        Ok(AnswerOutcome {
            session: updated,
            position,
            is_correct,
            correct_label: question.correct_label,
            explanation: question.explanation.clone(),
            question_count,
        })
    }

    /// Works out why a guarded write matched no row.
    async fn explain_lost_update(&self, session_id: &str, position: u32) -> QuizError {
        self.forget(session_id).await;
        let current = match self.load_fresh(session_id).await {
            Ok(session) => session,
            Err(e) => return e,
        };
        if !current.is_active() {
            return QuizError::SessionExpired(current.id);
        }
        if self.is_stale(&current, Utc::now()) {
            if let Err(e) = self.mark_expired(&current.id).await {
                return e;
            }
            return QuizError::SessionExpired(current.id);
        }
        if current.answers.contains_key(&position) || current.position > position {
            return QuizError::AnswerAlreadyRecorded {
                session_id: current.id,
                position,
            };
        }
        QuizError::Persistence(format!(
            "session {} changed concurrently at position {}",
            current.id, position
        ))
    }

    /// Completes a session and stores its score.
    ///
    /// The correct count is recomputed from stored answers against the current
    /// answer key. Calling it again on a completed session returns the stored
    /// score unchanged.
    pub async fn finalize(&self, session_id: &str, early: bool) -> QuizResult<FinalizeOutcome> {
        let _guard = self.locks.lock(session_id).await;
        self.finalize_locked(session_id, early).await
    }

    async fn finalize_locked(&self, session_id: &str, early: bool) -> QuizResult<FinalizeOutcome> {
        let session = self.load_fresh(session_id).await?;
        let quiz = self.quizzes.get(&session.quiz_id).await?;
        let correct_count = count_correct(&session, &quiz);
        let total_answered = session.answers.len() as u32;

        match session.status {
            SessionStatus::Completed => {
                let score = session
                    .score
                    .unwrap_or_else(|| percentage(correct_count, total_answered));
                return Ok(FinalizeOutcome {
                    score,
                    correct_count,
                    total_answered,
                    session,
                });
            }
            SessionStatus::Expired | SessionStatus::Abandoned => {
                return Err(QuizError::SessionExpired(session.id));
            }
            SessionStatus::Active => {}
        }

        if session.position <= quiz.question_count() && !early {
            return Err(QuizError::SessionIncomplete(session.id));
        }

        let score = percentage(correct_count, total_answered);
        let end_time = Utc::now();

        let result = sqlx::query(
            "UPDATE sessions SET status = ?, score = ?, end_time = ?, active_key = NULL \
             WHERE id = ? AND status = ?",
        )
        .bind(SessionStatus::Completed.as_str())
        .bind(score as i64)
        .bind(to_millis(end_time))
        .bind(&session.id)
        .bind(SessionStatus::Active.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to finalize session {}: {:?}", session.id, e);
            QuizError::from(e)
        })?;

        self.forget(&session.id).await;

        if result.rows_affected() == 0 {
            let current = self.load_fresh(&session.id).await?;
            return match (current.status, current.score) {
                (SessionStatus::Completed, Some(stored)) => Ok(FinalizeOutcome {
                    score: stored,
                    correct_count,
                    total_answered,
                    session: current,
                }),
                _ => Err(QuizError::SessionExpired(current.id)),
            };
        }

        tracing::info!(
            "Session {} completed: {}/{} correct, score {}",
            session.id,
            correct_count,
            total_answered,
            score
        );

        let completed = self.load_fresh(&session.id).await?;
        Ok(FinalizeOutcome {
            score,
            correct_count,
            total_answered,
            session: completed,
        })
    }

    /// Expires every active session started more than `timeout` before `now`.
    /// Returns how many sessions were expired.
    pub async fn expire_stale(&self, now: DateTime<Utc>, timeout: Duration) -> QuizResult<u64> {
        let cutoff = to_millis(now) - timeout.as_millis() as i64;

        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM sessions WHERE status = ? AND start_time < ?")
                .bind(SessionStatus::Active.as_str())
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?;

        let result = sqlx::query(
            "UPDATE sessions SET status = ?, active_key = NULL WHERE status = ? AND start_time < ?",
        )
        .bind(SessionStatus::Expired.as_str())
        .bind(SessionStatus::Active.as_str())
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        {
            // Also drops sessions that went stale between the SELECT and the UPDATE.
            let mut cache = self.cache.write().await;
            for id in &ids {
                cache.remove(id);
            }
            cache.retain(|_, session| to_millis(session.start_time) >= cutoff);
        }

        let expired = result.rows_affected();
        if expired > 0 {
            tracing::info!("Expired {} stale sessions", expired);
        }
        Ok(expired)
    }

    /// Ends a session that never got going, e.g. its first question could not be delivered.
    pub async fn abandon(&self, session_id: &str) -> QuizResult<()> {
        let result = sqlx::query(
            "UPDATE sessions SET status = ?, active_key = NULL WHERE id = ? AND status = ?",
        )
        .bind(SessionStatus::Abandoned.as_str())
        .bind(session_id)
        .bind(SessionStatus::Active.as_str())
        .execute(&self.pool)
        .await?;
        self.forget(session_id).await;

        if result.rows_affected() > 0 {
            tracing::warn!("Session {} abandoned", session_id);
        }
        Ok(())
    }

    /// True while the session is held in the read cache.
    pub async fn is_cached(&self, session_id: &str) -> bool {
        self.cache.read().await.contains_key(session_id)
    }

    fn is_stale(&self, session: &Session, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(session.start_time);
        age.to_std().map(|age| age > self.ttl).unwrap_or(false)
    }

    async fn mark_expired(&self, session_id: &str) -> QuizResult<()> {
        sqlx::query("UPDATE sessions SET status = ?, active_key = NULL WHERE id = ? AND status = ?")
            .bind(SessionStatus::Expired.as_str())
            .bind(session_id)
            .bind(SessionStatus::Active.as_str())
            .execute(&self.pool)
            .await?;
        self.forget(session_id).await;
        tracing::info!("Session {} expired after {:?}", session_id, self.ttl);
        Ok(())
    }

    async fn find_by_active_key(&self, active_key: &str) -> QuizResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!("{} WHERE active_key = ?", SELECT_SESSION))
            .bind(active_key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Session::try_from).transpose()
    }

    async fn load_fresh(&self, id: &str) -> QuizResult<Session> {
        let row = sqlx::query_as::<_, SessionRow>(&format!("{} WHERE id = ?", SELECT_SESSION))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| QuizError::SessionNotFound(id.to_string()))?;
        let session = Session::try_from(row)?;
        self.remember(&session).await;
        Ok(session)
    }

    async fn remember(&self, session: &Session) {
        let mut cache = self.cache.write().await;
        if session.is_active() {
            cache.insert(session.id.clone(), session.clone());
        } else {
            cache.remove(&session.id);
        }
    }

    async fn forget(&self, session_id: &str) {
        self.cache.write().await.remove(session_id);
    }
}

fn count_correct(session: &Session, quiz: &Quiz) -> u32 {
    session
        .answers
        .iter()
        .filter(|(position, label)| {
            quiz.question_at(**position)
                .is_some_and(|q| q.is_correct(**label))
        })
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::connect_in_memory,
        models::{
            question::QuestionInput,
            user::{CreateRecipientRequest, Role},
        },
        services::{quizzes::NewQuiz, recipients::RecipientService},
    };

    const LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

    struct Fixture {
        sessions: SessionService,
        quizzes: QuizService,
        recipient_id: String,
        quiz_id: String,
    }

    async fn fixture() -> Fixture {
        let pool = connect_in_memory().await.unwrap();
        let quizzes = QuizService::new(pool.clone(), &LABELS);
        let recipients = RecipientService::new(pool.clone());

        let recipient = recipients
            .create(CreateRecipientRequest {
                name: "Ann".into(),
                phone: "+1234567890".into(),
                class_id: Some("7A".into()),
                role: Role::Student,
            })
            .await
            .unwrap();

        let question = |correct: &str| QuestionInput {
            prompt: "pick".into(),
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_label: correct.into(),
            explanation: None,
        };
        let quiz = quizzes
            .create_draft(
                NewQuiz {
                    title: "Two".into(),
                    ..Default::default()
                },
                vec![question("B"), question("C")],
            )
            .await
            .unwrap();
        quizzes.activate(&quiz.id).await.unwrap();

        Fixture {
            sessions: SessionService::new(pool, quizzes.clone(), Duration::from_secs(3600)),
            quizzes,
            recipient_id: recipient.id,
            quiz_id: quiz.id,
        }
    }

    #[tokio::test]
    async fn second_active_session_is_a_duplicate() {
        let f = fixture().await;
        let first = f.sessions.create(&f.recipient_id, &f.quiz_id).await.unwrap();
        let err = f
            .sessions
            .create(&f.recipient_id, &f.quiz_id)
            .await
            .unwrap_err();
        match err {
            QuizError::DuplicateSession { session_id } => assert_eq!(session_id, first.id),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn new_session_allowed_after_completion() {
        let f = fixture().await;
        let first = f.sessions.create(&f.recipient_id, &f.quiz_id).await.unwrap();
        f.sessions.finalize(&first.id, true).await.unwrap();
        let second = f.sessions.create(&f.recipient_id, &f.quiz_id).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn invalid_label_leaves_session_untouched() {
        let f = fixture().await;
        let session = f.sessions.create(&f.recipient_id, &f.quiz_id).await.unwrap();

        for bad in ["E", "AB", "", "1"] {
            let err = f.sessions.submit_answer(&session.id, bad).await.unwrap_err();
            assert!(matches!(err, QuizError::InvalidAnswerFormat(_)));
        }
        let current = f.sessions.get(&session.id).await.unwrap();
        assert_eq!(current.position, 1);
        assert!(current.answers.is_empty());
    }

    #[tokio::test]
    async fn answering_past_the_end_requires_finalize() {
        let f = fixture().await;
        let session = f.sessions.create(&f.recipient_id, &f.quiz_id).await.unwrap();
        f.sessions.submit_answer(&session.id, "B").await.unwrap();
        let last = f.sessions.submit_answer(&session.id, "C").await.unwrap();
        assert!(last.is_last());

        let err = f.sessions.submit_answer(&session.id, "A").await.unwrap_err();
        assert!(matches!(err, QuizError::SessionAlreadyFinalizing(_)));
    }

    #[tokio::test]
    async fn stale_button_is_already_recorded() {
        let f = fixture().await;
        let session = f.sessions.create(&f.recipient_id, &f.quiz_id).await.unwrap();
        f.sessions.submit_answer_at(&session.id, 1, "b").await.unwrap();

        let err = f
            .sessions
            .submit_answer_at(&session.id, 1, "a")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QuizError::AnswerAlreadyRecorded { position: 1, .. }
        ));
        let current = f.sessions.get(&session.id).await.unwrap();
        assert_eq!(current.answers.get(&1), Some(&'B'));
    }

    #[tokio::test]
    async fn incomplete_session_needs_early_flag() {
        let f = fixture().await;
        let session = f.sessions.create(&f.recipient_id, &f.quiz_id).await.unwrap();
        f.sessions.submit_answer(&session.id, "B").await.unwrap();

        let err = f.sessions.finalize(&session.id, false).await.unwrap_err();
        assert!(matches!(err, QuizError::SessionIncomplete(_)));

        let outcome = f.sessions.finalize(&session.id, true).await.unwrap();
        assert_eq!(outcome.score, 100);
        assert_eq!(outcome.total_answered, 1);
    }

    #[tokio::test]
    async fn finalize_uses_corrected_answer_key() {
        let f = fixture().await;
        let session = f.sessions.create(&f.recipient_id, &f.quiz_id).await.unwrap();
        f.sessions.submit_answer(&session.id, "B").await.unwrap();
        f.sessions.submit_answer(&session.id, "D").await.unwrap();

        f.quizzes
            .correct_answer_key(&f.quiz_id, 2, "D", None)
            .await
            .unwrap();

        let outcome = f.sessions.finalize(&session.id, false).await.unwrap();
        assert_eq!(outcome.correct_count, 2);
        assert_eq!(outcome.score, 100);
    }

    #[tokio::test]
    async fn terminal_sessions_leave_the_cache() {
        let f = fixture().await;
        let session = f.sessions.create(&f.recipient_id, &f.quiz_id).await.unwrap();
        assert!(f.sessions.is_cached(&session.id).await);

        f.sessions.abandon(&session.id).await.unwrap();
        assert!(!f.sessions.is_cached(&session.id).await);

        let err = f.sessions.submit_answer(&session.id, "B").await.unwrap_err();
        assert!(matches!(err, QuizError::SessionExpired(_)));
    }

    #[tokio::test]
    async fn inactive_quiz_cannot_start_sessions() {
        let f = fixture().await;
        f.quizzes.close(&f.quiz_id).await.unwrap();
        let err = f
            .sessions
            .create(&f.recipient_id, &f.quiz_id)
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::QuizNotActive(_)));
    }

    #[tokio::test]
    async fn sweep_evicts_cached_sessions_past_the_cutoff() {
        let f = fixture().await;
        let session = f.sessions.create(&f.recipient_id, &f.quiz_id).await.unwrap();
        assert!(f.sessions.is_cached(&session.id).await);

        // The row was expired by a concurrent sweep; only the cache still says active.
        sqlx::query("UPDATE sessions SET status = ?, active_key = NULL WHERE id = ?")
            .bind(SessionStatus::Expired.as_str())
            .bind(&session.id)
            .execute(&f.sessions.pool)
            .await
            .unwrap();

        let later = Utc::now() + chrono::Duration::hours(2);
        let expired = f
            .sessions
            .expire_stale(later, Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(expired, 0);
        assert!(!f.sessions.is_cached(&session.id).await);
        assert_eq!(
            f.sessions.get(&session.id).await.unwrap().status,
            SessionStatus::Expired
        );
    }

    #[tokio::test]
    async fn session_locks_are_freed_after_use() {
        let f = fixture().await;
        let session = f.sessions.create(&f.recipient_id, &f.quiz_id).await.unwrap();
        f.sessions.submit_answer(&session.id, "B").await.unwrap();
        let _ = f.sessions.submit_answer_at(&session.id, 1, "B").await;
        f.sessions.finalize(&session.id, true).await.unwrap();
        assert!(f.sessions.locks.is_empty());
    }
}
