// src/models/dispatch.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Outcome of sending a quiz to many recipients.
///
/// `success_count + failure_count == total_recipients - skipped_no_channel`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub quiz_id: String,
    pub total_recipients: u32,
    pub success_count: u32,
    pub failure_count: u32,
    /// Recipients without a bound chat; excluded from success/failure.
    pub skipped_no_channel: u32,
    pub skipped: Vec<String>,
    pub delivered: Vec<DispatchSuccess>,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn new(quiz_id: &str) -> Self {
        Self {
            quiz_id: quiz_id.to_string(),
            ..Default::default()
        }
    }

    pub fn record_success(&mut self, recipient_id: &str, session_id: &str) {
        self.total_recipients += 1;
        self.success_count += 1;
        self.delivered.push(DispatchSuccess {
            recipient_id: recipient_id.to_string(),
            session_id: session_id.to_string(),
        });
    }

    pub fn record_failure(&mut self, recipient_id: &str, reason: impl Into<String>) {
        self.total_recipients += 1;
        self.failure_count += 1;
        self.failures.push(DispatchFailure {
            recipient_id: recipient_id.to_string(),
            reason: reason.into(),
        });
    }

    pub fn record_skipped(&mut self, recipient_id: &str) {
        self.total_recipients += 1;
        self.skipped_no_channel += 1;
        self.skipped.push(recipient_id.to_string());
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSuccess {
    pub recipient_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchFailure {
    pub recipient_id: String,
    pub reason: String,
}

/// DTO for `POST /api/tools/quiz/send-to-class`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendToClassRequest {
    #[validate(length(min = 1, max = 64))]
    pub quiz_id: String,
    #[validate(length(min = 1, max = 64))]
    pub class_id: String,
    pub subject_id: Option<String>,
    pub teacher_id: Option<String>,
}

/// DTO for `POST /api/tools/quiz/send-to-students`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendToStudentsRequest {
    #[validate(length(min = 1, max = 64))]
    pub quiz_id: String,
    #[validate(length(min = 1, max = 500))]
    pub student_ids: Vec<String>,
    pub teacher_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_add_up() {
        let mut report = DispatchReport::new("quiz-1");
        report.record_success("r1", "s1");
        report.record_failure("r2", "duplicate session");
        report.record_skipped("r3");
        report.record_success("r4", "s4");

        assert_eq!(report.total_recipients, 4);
        assert_eq!(
            report.success_count + report.failure_count,
            report.total_recipients - report.skipped_no_channel
        );
        assert_eq!(report.skipped, vec!["r3".to_string()]);
    }
}
