// src/models/user.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{error::QuizError, utils::phone::validate_phone, utils::time::from_millis};

/// Role of a registered person: quiz taker, quiz author or operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// A registered person who can be sent quizzes over the chat channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: String,
    pub name: String,
    pub phone: String,
    /// Chat identifier; set once on registration.
    pub channel_id: Option<String>,
    /// Class the recipient belongs to.
    pub cohort: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Represents the 'users' table in the database.
#[derive(Debug, FromRow)]
pub struct RecipientRow {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub channel_id: Option<String>,
    pub cohort: Option<String>,
    pub role: String,
    pub created_at: i64,
}

impl TryFrom<RecipientRow> for Recipient {
    type Error = QuizError;

    fn try_from(row: RecipientRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| QuizError::Persistence(format!("unknown role '{}'", row.role)))?;
        Ok(Recipient {
            id: row.id,
            name: row.name,
            phone: row.phone,
            channel_id: row.channel_id,
            cohort: row.cohort,
            role,
            created_at: from_millis(row.created_at),
        })
    }
}

/// DTO for creating a new recipient.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecipientRequest {
    #[validate(length(min = 1, max = 100, message = "Name length must be between 1 and 100 characters."))]
    pub name: String,
    #[validate(custom(function = validate_phone))]
    pub phone: String,
    #[validate(length(min = 1, max = 64))]
    pub class_id: Option<String>,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecipientsQuery {
    pub class_id: Option<String>,
}
