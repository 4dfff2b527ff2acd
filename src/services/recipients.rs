// src/services/recipients.rs

use chrono::Utc;
use sqlx::AnyPool;
use uuid::Uuid;

use crate::{
    db::is_unique_violation,
    error::{QuizError, QuizResult},
    models::user::{CreateRecipientRequest, Recipient, RecipientRow, Role},
    utils::{phone::normalize_phone, time::to_millis},
};

const SELECT_RECIPIENT: &str =
    "SELECT id, name, phone, channel_id, cohort, role, created_at FROM users";

/// Registry of quiz takers and their chat bindings.
#[derive(Clone)]
pub struct RecipientService {
    pool: AnyPool,
}

impl RecipientService {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, req: CreateRecipientRequest) -> QuizResult<Recipient> {
        let phone = normalize_phone(&req.phone)
            .ok_or_else(|| QuizError::InvalidPhone(req.phone.clone()))?;
        self.insert(&req.name, &phone, req.class_id.as_deref(), req.role)
            .await
    }

    async fn insert(
        &self,
        name: &str,
        phone: &str,
        cohort: Option<&str>,
        role: Role,
    ) -> QuizResult<Recipient> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, name, phone, channel_id, cohort, role, created_at) \
             VALUES (?, ?, ?, NULL, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name.trim())
        .bind(phone)
        .bind(cohort)
        .bind(role.as_str())
        .bind(to_millis(now))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                QuizError::RecipientExists(phone.to_string())
            } else {
                tracing::error!("Failed to create recipient: {:?}", e);
                QuizError::from(e)
            }
        })?;

        tracing::info!("Recipient {} created (cohort {:?})", id, cohort);
        self.get(&id).await
    }

    pub async fn get(&self, id: &str) -> QuizResult<Recipient> {
        let row = sqlx::query_as::<_, RecipientRow>(&format!("{} WHERE id = ?", SELECT_RECIPIENT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| QuizError::RecipientNotFound(id.to_string()))?;
        Recipient::try_from(row)
    }

    pub async fn find_by_phone(&self, phone: &str) -> QuizResult<Option<Recipient>> {
        let Some(phone) = normalize_phone(phone) else {
            return Ok(None);
        };
        let row =
            sqlx::query_as::<_, RecipientRow>(&format!("{} WHERE phone = ?", SELECT_RECIPIENT))
                .bind(phone)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Recipient::try_from).transpose()
    }

    pub async fn find_by_channel(&self, channel_id: &str) -> QuizResult<Option<Recipient>> {
        let row = sqlx::query_as::<_, RecipientRow>(&format!(
            "{} WHERE channel_id = ?",
            SELECT_RECIPIENT
        ))
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Recipient::try_from).transpose()
    }

    /// Lists recipients, optionally restricted to one class.
    pub async fn list(&self, cohort: Option<&str>) -> QuizResult<Vec<Recipient>> {
        let rows = match cohort {
            Some(cohort) => {
                sqlx::query_as::<_, RecipientRow>(&format!(
                    "{} WHERE cohort = ? ORDER BY name",
                    SELECT_RECIPIENT
                ))
                .bind(cohort)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, RecipientRow>(&format!("{} ORDER BY name", SELECT_RECIPIENT))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(Recipient::try_from).collect()
    }

    /// Students of a class, the targets of a class-wide dispatch.
    pub async fn list_takers(&self, cohort: &str) -> QuizResult<Vec<Recipient>> {
        Ok(self
            .list(Some(cohort))
            .await?
            .into_iter()
            .filter(|r| r.role == Role::Student)
            .collect())
    }

    /// Binds a chat identifier to the recipient registered under `phone`.
    ///
    /// Idempotent for the same chat. The binding is set once: a different chat
    /// for the same phone, or a chat already bound to someone else, is rejected.
    pub async fn bind_channel(&self, phone: &str, channel_id: &str) -> QuizResult<Recipient> {
        let recipient = self
            .find_by_phone(phone)
            .await?
            .ok_or_else(|| QuizError::RecipientNotFound(phone.to_string()))?;

        match recipient.channel_id.as_deref() {
            Some(bound) if bound == channel_id => return Ok(recipient),
            Some(_) => {
                return Err(QuizError::ChannelAlreadyBound {
                    recipient_id: recipient.id,
                });
            }
            None => {}
        }

        if let Some(other) = self.find_by_channel(channel_id).await? {
            tracing::warn!(
                "Chat {} is already bound to recipient {}, refusing to bind {}",
                channel_id,
                other.id,
                recipient.id
            );
            return Err(QuizError::ChannelAlreadyBound {
                recipient_id: recipient.id,
            });
        }

        let result = sqlx::query(
            "UPDATE users SET channel_id = ? WHERE id = ? AND channel_id IS NULL",
        )
        .bind(channel_id)
        .bind(&recipient.id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                QuizError::ChannelAlreadyBound {
                    recipient_id: recipient.id.clone(),
                }
            } else {
                QuizError::from(e)
            }
        })?;

        let updated = self.get(&recipient.id).await?;
        if result.rows_affected() == 0 && updated.channel_id.as_deref() != Some(channel_id) {
            // Lost a race against another registration.
            return Err(QuizError::ChannelAlreadyBound {
                recipient_id: recipient.id,
            });
        }

        tracing::info!("Recipient {} bound to chat {}", updated.id, channel_id);
        Ok(updated)
    }
}
