// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{
    error::{QuizError, QuizResult},
    models::question::{PublicQuestion, Question, QuestionInput},
    utils::time::from_millis,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    Draft,
    Active,
    Closed,
}

impl QuizStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizStatus::Draft => "draft",
            QuizStatus::Active => "active",
            QuizStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(QuizStatus::Draft),
            "active" => Some(QuizStatus::Active),
            "closed" => Some(QuizStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub subject: Option<String>,
    pub grade_level: Option<String>,
    /// Target class.
    pub cohort: Option<String>,
    pub status: QuizStatus,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Ordered by position, 1..N.
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn question_count(&self) -> u32 {
        self.questions.len() as u32
    }

    pub fn question_at(&self, position: u32) -> Option<&Question> {
        if position == 0 {
            return None;
        }
        self.questions.get(position as usize - 1)
    }
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, FromRow)]
pub struct QuizRow {
    pub id: String,
    pub title: String,
    pub subject: Option<String>,
    pub grade_level: Option<String>,
    pub cohort: Option<String>,
    pub status: String,
    pub created_by: Option<String>,
    pub created_at: i64,
}

impl QuizRow {
    pub fn into_quiz(self, questions: Vec<Question>) -> QuizResult<Quiz> {
        let status = QuizStatus::parse(&self.status)
            .ok_or_else(|| QuizError::Persistence(format!("unknown quiz status '{}'", self.status)))?;
        Ok(Quiz {
            id: self.id,
            title: self.title,
            subject: self.subject,
            grade_level: self.grade_level,
            cohort: self.cohort,
            status,
            created_by: self.created_by,
            created_at: from_millis(self.created_at),
            questions,
        })
    }
}

/// Validates a full question list: positions 1..N in order, every question well formed.
pub fn check_quiz_shape(questions: &[Question], labels: &[char]) -> QuizResult<()> {
    if questions.is_empty() {
        return Err(QuizError::InvalidQuizContent(
            "quiz has no questions".to_string(),
        ));
    }
    for (i, q) in questions.iter().enumerate() {
        if q.position as usize != i + 1 {
            return Err(QuizError::InvalidQuizContent(format!(
                "question at index {} has position {}",
                i, q.position
            )));
        }
        q.check_shape(labels).map_err(QuizError::InvalidQuizContent)?;
    }
    Ok(())
}

/// Quiz without answer keys, for listing to takers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuiz {
    pub id: String,
    pub title: String,
    pub status: QuizStatus,
    pub questions: Vec<PublicQuestion>,
}

impl From<&Quiz> for PublicQuiz {
    fn from(quiz: &Quiz) -> Self {
        PublicQuiz {
            id: quiz.id.clone(),
            title: quiz.title.clone(),
            status: quiz.status,
            questions: quiz.questions.iter().map(PublicQuestion::from).collect(),
        }
    }
}

/// DTO for creating a draft quiz with explicit questions.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 100))]
    pub subject: Option<String>,
    #[validate(length(max = 50))]
    pub grade_level: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub class_id: Option<String>,
    pub teacher_id: Option<String>,
    #[validate(length(min = 1, max = 100), nested)]
    pub questions: Vec<QuestionInput>,
}

/// DTO for generating a draft quiz from ingested content or raw text.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Ingested content to draw from; all chunks are used unless `chunk_index` is given.
    pub content_id: Option<String>,
    pub chunk_index: Option<u32>,
    /// Raw text, used when `content_id` is absent.
    #[validate(length(min = 1, max = 50000))]
    pub text: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub grade_level: String,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(range(min = 1, max = 30))]
    pub question_count: Option<u32>,
    #[validate(length(min = 1, max = 64))]
    pub class_id: Option<String>,
    pub teacher_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuizzesQuery {
    pub class_id: Option<String>,
    pub status: Option<QuizStatus>,
}
