// src/authoring/generator.rs

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::{
    authoring::parser::parse_questions,
    config::GeneratorConfig,
    error::{QuizError, QuizResult},
    models::question::Question,
};

/// Longest source text sent to the model, in characters.
const MAX_SOURCE_CHARS: usize = 12_000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Produces quiz questions from study material.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate_questions(
        &self,
        content: &str,
        grade_level: &str,
        subject: &str,
        count: u32,
    ) -> QuizResult<Vec<Question>>;
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct HttpQuestionGenerator {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
    labels: Vec<char>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpQuestionGenerator {
    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &GeneratorConfig, labels: &[char]) -> QuizResult<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };

        let mut base = config.api_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("chat/completions")
            .map_err(|e| QuizError::Generator(format!("invalid generator url: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| QuizError::Generator(e.to_string()))?;

        Ok(Some(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone(),
            labels: labels.to_vec(),
        }))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl QuestionGenerator for HttpQuestionGenerator {
    async fn generate_questions(
        &self,
        content: &str,
        grade_level: &str,
        subject: &str,
        count: u32,
    ) -> QuizResult<Vec<Question>> {
        let body = json!({
            "model": self.model,
            "temperature": 0.7,
            "messages": [
                {
                    "role": "system",
                    "content": "You are an experienced teacher who writes clear multiple-choice quizzes."
                },
                {
                    "role": "user",
                    "content": build_prompt(content, grade_level, subject, count, &self.labels)
                }
            ]
        });

        tracing::info!(
            "Requesting {} questions from {} ({} / {})",
            count,
            self.model,
            subject,
            grade_level
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| QuizError::Generator(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!("Generator returned {}: {}", status, detail);
            return Err(QuizError::Generator(format!("generator returned {}", status)));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| QuizError::Generator(format!("unreadable generator reply: {}", e)))?;
        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| QuizError::Generator("generator reply has no content".to_string()))?;

        let questions = parse_questions(&text, &self.labels);
        if questions.len() < count as usize {
            tracing::warn!(
                "Generator produced {} usable questions out of {} requested",
                questions.len(),
                count
            );
        }
        Ok(questions)
    }
}

/// Prompt asking for the fixed layout `parse_questions` reads.
pub fn build_prompt(
    content: &str,
    grade_level: &str,
    subject: &str,
    count: u32,
    labels: &[char],
) -> String {
    let source: String = content.chars().take(MAX_SOURCE_CHARS).collect();
    let choice_lines = labels
        .iter()
        .map(|l| format!("{}) [option]", l))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Write {count} multiple-choice questions for {grade} students studying {subject}, \
         based only on the material below.\n\
         Each question must have exactly {n} options and exactly one correct answer.\n\n\
         Use exactly this format for every question:\n\n\
         Question 1: [question text]\n\
         {choice_lines}\n\
         Correct Answer: [letter]\n\
         Explanation: [one or two sentences]\n\n\
         Material:\n{source}",
        count = count,
        grade = grade_level,
        subject = subject,
        n = labels.len(),
        choice_lines = choice_lines,
        source = source,
    )
}
