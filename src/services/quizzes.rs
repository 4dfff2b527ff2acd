// src/services/quizzes.rs

use std::sync::Arc;

use chrono::Utc;
use sqlx::AnyPool;
use uuid::Uuid;

use crate::{
    error::{QuizError, QuizResult},
    models::{
        question::{Question, QuestionInput, QuestionRow},
        quiz::{Quiz, QuizRow, QuizStatus, check_quiz_shape},
    },
    utils::time::to_millis,
};

const SELECT_QUIZ: &str =
    "SELECT id, title, subject, grade_level, cohort, status, created_by, created_at FROM quizzes";

/// Metadata for a new draft quiz.
#[derive(Debug, Clone, Default)]
pub struct NewQuiz {
    pub title: String,
    pub subject: Option<String>,
    pub grade_level: Option<String>,
    pub cohort: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Clone)]
pub struct QuizService {
    pool: AnyPool,
    labels: Arc<[char]>,
}

impl QuizService {
    pub fn new(pool: AnyPool, labels: &[char]) -> Self {
        Self {
            pool,
            labels: labels.into(),
        }
    }

    pub fn labels(&self) -> &[char] {
        &self.labels
    }

    /// Stores a draft quiz built from request inputs, numbering questions 1..N.
    pub async fn create_draft(&self, meta: NewQuiz, inputs: Vec<QuestionInput>) -> QuizResult<Quiz> {
        let questions = inputs
            .into_iter()
            .enumerate()
            .map(|(i, input)| input.into_question(i as u32 + 1))
            .collect::<Vec<_>>();
        self.create_with_questions(meta, questions).await
    }

    /// Stores a draft quiz with already-positioned questions after validating their shape.
    pub async fn create_with_questions(
        &self,
        meta: NewQuiz,
        questions: Vec<Question>,
    ) -> QuizResult<Quiz> {
        check_quiz_shape(&questions, &self.labels)?;

        let id = Uuid::new_v4().to_string();
        let now = to_millis(Utc::now());

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO quizzes (id, title, subject, grade_level, cohort, status, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(meta.title.trim())
        .bind(meta.subject.as_deref())
        .bind(meta.grade_level.as_deref())
        .bind(meta.cohort.as_deref())
        .bind(QuizStatus::Draft.as_str())
        .bind(meta.created_by.as_deref())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for question in &questions {
            insert_question(&mut tx, &id, question).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "Draft quiz {} '{}' created with {} questions",
            id,
            meta.title,
            questions.len()
        );
        self.get(&id).await
    }

    pub async fn get(&self, id: &str) -> QuizResult<Quiz> {
        let row = sqlx::query_as::<_, QuizRow>(&format!("{} WHERE id = ?", SELECT_QUIZ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| QuizError::QuizNotFound(id.to_string()))?;
        let questions = self.questions(id).await?;
        row.into_quiz(questions)
    }

    async fn questions(&self, quiz_id: &str) -> QuizResult<Vec<Question>> {
        sqlx::query_as::<_, QuestionRow>(
            "SELECT position, prompt, choices, correct_label, explanation \
             FROM questions WHERE quiz_id = ? ORDER BY position",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Question::try_from)
        .collect()
    }

    /// Lists quizzes (without loading their questions).
    pub async fn list(
        &self,
        cohort: Option<&str>,
        status: Option<QuizStatus>,
    ) -> QuizResult<Vec<Quiz>> {
        let rows = sqlx::query_as::<_, QuizRow>(&format!(
            "{} WHERE (? IS NULL OR cohort = ?) AND (? IS NULL OR status = ?) ORDER BY created_at DESC",
            SELECT_QUIZ
        ))
        .bind(cohort)
        .bind(cohort)
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_quiz(Vec::new())).collect()
    }

    /// Moves a draft quiz to active after validating its content.
    /// Activating an already active quiz is a no-op.
    pub async fn activate(&self, id: &str) -> QuizResult<Quiz> {
        let quiz = self.get(id).await?;
        match quiz.status {
            QuizStatus::Active => return Ok(quiz),
            QuizStatus::Closed => return Err(QuizError::QuizNotActive(id.to_string())),
            QuizStatus::Draft => {}
        }

        check_quiz_shape(&quiz.questions, &self.labels)?;

        sqlx::query("UPDATE quizzes SET status = ? WHERE id = ? AND status = ?")
            .bind(QuizStatus::Active.as_str())
            .bind(id)
            .bind(QuizStatus::Draft.as_str())
            .execute(&self.pool)
            .await?;

        tracing::info!("Quiz {} activated", id);
        self.get(id).await
    }

    pub async fn close(&self, id: &str) -> QuizResult<Quiz> {
        let result = sqlx::query("UPDATE quizzes SET status = ? WHERE id = ?")
            .bind(QuizStatus::Closed.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(QuizError::QuizNotFound(id.to_string()));
        }
        tracing::info!("Quiz {} closed", id);
        self.get(id).await
    }

    /// Replaces every question of a draft quiz. Active and closed quizzes are immutable.
    pub async fn replace_questions(
        &self,
        id: &str,
        inputs: Vec<QuestionInput>,
    ) -> QuizResult<Quiz> {
        let quiz = self.get(id).await?;
        if quiz.status != QuizStatus::Draft {
            return Err(QuizError::QuizImmutable(id.to_string()));
        }

        let questions = inputs
            .into_iter()
            .enumerate()
            .map(|(i, input)| input.into_question(i as u32 + 1))
            .collect::<Vec<_>>();
        check_quiz_shape(&questions, &self.labels)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM questions WHERE quiz_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for question in &questions {
            insert_question(&mut tx, id, question).await?;
        }
        tx.commit().await?;

        self.get(id).await
    }

    /// Fixes the answer key of one question. Allowed on live quizzes because
    /// prompt, choices and positions stay put; scores are recomputed on finalize.
    pub async fn correct_answer_key(
        &self,
        id: &str,
        position: u32,
        correct_label: &str,
        explanation: Option<String>,
    ) -> QuizResult<Question> {
        let label = correct_label
            .trim()
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .filter(|c| self.labels.contains(c))
            .ok_or_else(|| {
                QuizError::InvalidQuizContent(format!(
                    "correct label {:?} is not one of {:?}",
                    correct_label, self.labels
                ))
            })?;

        let quiz = self.get(id).await?;
        if quiz.status == QuizStatus::Closed {
            return Err(QuizError::QuizImmutable(id.to_string()));
        }
        if quiz.question_at(position).is_none() {
            return Err(QuizError::InvalidQuizContent(format!(
                "quiz {} has no question at position {}",
                id, position
            )));
        }

        sqlx::query(
            "UPDATE questions SET correct_label = ?, explanation = COALESCE(?, explanation) \
             WHERE quiz_id = ? AND position = ?",
        )
        .bind(label.to_string())
        .bind(explanation)
        .bind(id)
        .bind(position as i64)
        .execute(&self.pool)
        .await?;

        tracing::warn!(
            "Answer key of quiz {} question {} corrected to {}",
            id,
            position,
            label
        );

        self.get(id)
            .await?
            .question_at(position)
            .cloned()
            .ok_or_else(|| QuizError::QuizNotFound(id.to_string()))
    }
}

async fn insert_question(
    tx: &mut sqlx::Transaction<'_, sqlx::Any>,
    quiz_id: &str,
    question: &Question,
) -> QuizResult<()> {
    sqlx::query(
        "INSERT INTO questions (quiz_id, position, prompt, choices, correct_label, explanation) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(quiz_id)
    .bind(question.position as i64)
    .bind(&question.prompt)
    .bind(serde_json::to_string(&question.choices)?)
    .bind(question.correct_label.to_string())
    .bind(question.explanation.as_deref())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
