// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::QuizError;

/// One multiple-choice question at a fixed position inside a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// 1-based position within the quiz.
    pub position: u32,
    pub prompt: String,
    /// One choice per configured label, in label order.
    pub choices: Vec<String>,
    pub correct_label: char,
    pub explanation: Option<String>,
}

impl Question {
    pub fn is_correct(&self, label: char) -> bool {
        self.correct_label.eq_ignore_ascii_case(&label)
    }

    /// Checks the question against the label alphabet.
    pub fn check_shape(&self, labels: &[char]) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err(format!("question {} has an empty prompt", self.position));
        }
        if self.choices.len() != labels.len() {
            return Err(format!(
                "question {} has {} choices, expected {}",
                self.position,
                self.choices.len(),
                labels.len()
            ));
        }
        if let Some(i) = self.choices.iter().position(|c| c.trim().is_empty()) {
            return Err(format!(
                "question {} has an empty choice {}",
                self.position, labels[i]
            ));
        }
        if !labels.contains(&self.correct_label) {
            return Err(format!(
                "question {} has correct label '{}' outside the label set",
                self.position, self.correct_label
            ));
        }
        Ok(())
    }

    /// Pairs each label with its choice text.
    pub fn labeled_choices<'a>(&'a self, labels: &'a [char]) -> impl Iterator<Item = (char, &'a str)> {
        labels
            .iter()
            .copied()
            .zip(self.choices.iter().map(String::as_str))
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, FromRow)]
pub struct QuestionRow {
    pub position: i64,
    pub prompt: String,
    /// JSON array of choice texts.
    pub choices: String,
    pub correct_label: String,
    pub explanation: Option<String>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = QuizError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let choices: Vec<String> = serde_json::from_str(&row.choices)?;
        let correct_label = row
            .correct_label
            .chars()
            .next()
            .ok_or_else(|| QuizError::Persistence("empty correct label".to_string()))?;
        Ok(Question {
            position: row.position as u32,
            prompt: row.prompt,
            choices,
            correct_label,
            explanation: row.explanation,
        })
    }
}

/// Question as shown to quiz takers (no answer key).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub position: u32,
    pub prompt: String,
    pub choices: Vec<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        PublicQuestion {
            position: q.position,
            prompt: q.prompt.clone(),
            choices: q.choices.clone(),
        }
    }
}

/// DTO for a question inside a quiz creation request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 1000))]
    pub prompt: String,
    #[validate(custom(function = validate_choices))]
    pub choices: Vec<String>,
    #[validate(length(equal = 1))]
    pub correct_label: String,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

impl QuestionInput {
    pub fn into_question(self, position: u32) -> Question {
        Question {
            position,
            prompt: self.prompt.trim().to_string(),
            choices: self.choices.into_iter().map(|c| c.trim().to_string()).collect(),
            correct_label: self
                .correct_label
                .chars()
                .next()
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or(' '),
            explanation: self
                .explanation
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
        }
    }
}

/// DTO for correcting the answer key of a question on a live quiz.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerKeyCorrection {
    #[validate(length(equal = 1))]
    pub correct_label: String,
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

fn validate_choices(choices: &[String]) -> Result<(), validator::ValidationError> {
    if choices.is_empty() {
        return Err(validator::ValidationError::new("choices_cannot_be_empty"));
    }
    for choice in choices {
        if choice.len() > 500 {
            return Err(validator::ValidationError::new("choice_too_long"));
        }
    }
    Ok(())
}
