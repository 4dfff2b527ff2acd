// src/services/content.rs

use chrono::Utc;
use sqlx::AnyPool;
use uuid::Uuid;

use crate::{
    error::{QuizError, QuizResult},
    models::content::{Content, ContentChunk},
    utils::{chunk::chunk_text, time::to_millis},
};

/// Stores uploaded study material as bounded-size chunks.
#[derive(Clone)]
pub struct ContentService {
    pool: AnyPool,
    chunk_size: usize,
}

impl ContentService {
    pub fn new(pool: AnyPool, chunk_size: usize) -> Self {
        Self { pool, chunk_size }
    }

    pub async fn ingest(&self, title: &str, text: &str, cohort: Option<&str>) -> QuizResult<Content> {
        let chunks = chunk_text(text, self.chunk_size);
        if chunks.is_empty() {
            return Err(QuizError::InvalidQuizContent(
                "uploaded text is empty".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO contents (id, title, cohort, chunk_count, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(title.trim())
        .bind(cohort)
        .bind(chunks.len() as i64)
        .bind(to_millis(created_at))
        .execute(&mut *tx)
        .await?;

        for (index, body) in chunks.iter().enumerate() {
            sqlx::query("INSERT INTO content_chunks (content_id, chunk_index, body) VALUES (?, ?, ?)")
                .bind(&id)
                .bind(index as i64)
                .bind(body)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::info!("Content {} '{}' stored in {} chunks", id, title, chunks.len());

        Ok(Content {
            id,
            title: title.trim().to_string(),
            cohort: cohort.map(str::to_string),
            chunk_count: chunks.len() as u32,
            created_at,
        })
    }

    /// Chunks of one upload, in order. Unknown ids yield an empty list.
    pub async fn chunks(&self, content_id: &str) -> QuizResult<Vec<ContentChunk>> {
        let chunks = sqlx::query_as::<_, ContentChunk>(
            "SELECT content_id, chunk_index, body FROM content_chunks \
             WHERE content_id = ? ORDER BY chunk_index",
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }

    /// Text to generate questions from: one chunk, or every chunk joined.
    pub async fn source_text(&self, content_id: &str, chunk_index: Option<u32>) -> QuizResult<String> {
        let chunks = self.chunks(content_id).await?;
        if chunks.is_empty() {
            return Err(QuizError::InvalidQuizContent(format!(
                "no content with id {}",
                content_id
            )));
        }
        match chunk_index {
            Some(index) => chunks
                .into_iter()
                .find(|c| c.chunk_index == index as i64)
                .map(|c| c.body)
                .ok_or_else(|| {
                    QuizError::InvalidQuizContent(format!(
                        "content {} has no chunk {}",
                        content_id, index
                    ))
                }),
            None => Ok(chunks
                .into_iter()
                .map(|c| c.body)
                .collect::<Vec<_>>()
                .join("\n\n")),
        }
    }
}
