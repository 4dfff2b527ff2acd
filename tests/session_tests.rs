// tests/session_tests.rs

mod common;

use std::time::Duration;

use chrono::Utc;
use common::{seed_active_quiz, seed_bound_student, seed_draft_quiz, seed_student, setup};
use quiz_whiz::{
    error::QuizError,
    models::{quiz::QuizStatus, session::SessionStatus},
};

const HOUR: Duration = Duration::from_secs(3600);

async fn backdate(app: &common::TestApp, session_id: &str, hours: i64) {
    let start = Utc::now().timestamp_millis() - hours * 3_600_000;
    sqlx::query("UPDATE sessions SET start_time = ? WHERE id = ?")
        .bind(start)
        .bind(session_id)
        .execute(&app.state.pool)
        .await
        .expect("Failed to backdate session");
}

#[tokio::test]
async fn answer_walkthrough_scores_fifty() {
    let app = setup().await;
    let r1 = seed_student(&app.state, "Ann", "+1234567890", "7A").await;
    let q1 = seed_active_quiz(&app.state, "7A", &["B", "C"]).await;
    let sessions = &app.state.sessions;

    let session = sessions.create(&r1.id, &q1.id).await.unwrap();
    assert_eq!(session.position, 1);
    assert!(session.answers.is_empty());

    let first = sessions.submit_answer(&session.id, "b").await.unwrap();
    assert!(first.is_correct);
    assert_eq!(first.session.position, 2);
    assert_eq!(first.session.answers.get(&1), Some(&'B'));

    let second = sessions.submit_answer(&session.id, "D").await.unwrap();
    assert!(!second.is_correct);
    assert_eq!(second.correct_label, 'C');
    assert_eq!(second.session.position, 3);
    assert!(second.is_last());

    let outcome = sessions.finalize(&session.id, false).await.unwrap();
    assert_eq!(outcome.score, 50);
    assert_eq!(outcome.session.status, SessionStatus::Completed);
    assert_eq!(outcome.session.score, Some(50));
    assert!(outcome.session.end_time.is_some());
}

#[tokio::test]
async fn all_correct_scores_hundred_and_all_wrong_scores_zero() {
    let app = setup().await;
    let ann = seed_student(&app.state, "Ann", "+1234567890", "7A").await;
    let bob = seed_student(&app.state, "Bob", "+1987654321", "7A").await;
    let quiz = seed_active_quiz(&app.state, "7A", &["A", "B", "C"]).await;
    let sessions = &app.state.sessions;

    let right = sessions.create(&ann.id, &quiz.id).await.unwrap();
    for label in ["A", "B", "C"] {
        sessions.submit_answer(&right.id, label).await.unwrap();
    }
    assert_eq!(sessions.finalize(&right.id, false).await.unwrap().score, 100);

    let wrong = sessions.create(&bob.id, &quiz.id).await.unwrap();
    for label in ["D", "D", "D"] {
        sessions.submit_answer(&wrong.id, label).await.unwrap();
    }
    assert_eq!(sessions.finalize(&wrong.id, false).await.unwrap().score, 0);
}

#[tokio::test]
async fn zero_answered_scores_zero_without_error() {
    let app = setup().await;
    let ann = seed_student(&app.state, "Ann", "+1234567890", "7A").await;
    let quiz = seed_active_quiz(&app.state, "7A", &["A", "B"]).await;

    let session = app.state.sessions.create(&ann.id, &quiz.id).await.unwrap();
    let outcome = app.state.sessions.finalize(&session.id, true).await.unwrap();
    assert_eq!(outcome.score, 0);
    assert_eq!(outcome.total_answered, 0);
}

#[tokio::test]
async fn finalize_is_idempotent() {
    let app = setup().await;
    let ann = seed_student(&app.state, "Ann", "+1234567890", "7A").await;
    let quiz = seed_active_quiz(&app.state, "7A", &["B", "C"]).await;
    let sessions = &app.state.sessions;

    let session = sessions.create(&ann.id, &quiz.id).await.unwrap();
    sessions.submit_answer(&session.id, "B").await.unwrap();
    sessions.submit_answer(&session.id, "D").await.unwrap();

    let first = sessions.finalize(&session.id, false).await.unwrap();

    // A later key correction does not rewrite a stored score.
    app.state
        .quizzes
        .correct_answer_key(&quiz.id, 2, "D", None)
        .await
        .unwrap();

    let second = sessions.finalize(&session.id, false).await.unwrap();
    assert_eq!(first.score, 50);
    assert_eq!(second.score, first.score);
    assert_eq!(second.session.end_time, first.session.end_time);
}

#[tokio::test]
async fn concurrent_clicks_record_exactly_one_answer() {
    let app = setup().await;
    let ann = seed_student(&app.state, "Ann", "+1234567890", "7A").await;
    let quiz = seed_active_quiz(&app.state, "7A", &["B", "C"]).await;
    let session = app.state.sessions.create(&ann.id, &quiz.id).await.unwrap();

    let mut handles = Vec::new();
    for label in ["B", "A", "B", "C", "D", "b"] {
        let sessions = app.state.sessions.clone();
        let id = session.id.clone();
        handles.push(tokio::spawn(async move {
            sessions.submit_answer_at(&id, 1, label).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(QuizError::AnswerAlreadyRecorded { position, .. }) => assert_eq!(position, 1),
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(accepted, 1);

    let current = app.state.sessions.get(&session.id).await.unwrap();
    assert_eq!(current.answers.len(), 1);
    assert_eq!(current.position, 2);
}

#[tokio::test]
async fn position_stays_within_bounds() {
    let app = setup().await;
    let ann = seed_student(&app.state, "Ann", "+1234567890", "7A").await;
    let quiz = seed_active_quiz(&app.state, "7A", &["A", "B"]).await;
    let sessions = &app.state.sessions;
    let n = quiz.question_count();

    let session = sessions.create(&ann.id, &quiz.id).await.unwrap();
    let mut last = session.position;
    for label in ["A", "x", "B", "C", "A"] {
        let _ = sessions.submit_answer(&session.id, label).await;
        let current = sessions.get(&session.id).await.unwrap();
        assert!(current.position >= 1 && current.position <= n + 1);
        assert!(current.position >= last);
        last = current.position;
    }
    assert_eq!(last, n + 1);
}

#[tokio::test]
async fn sweep_expires_stale_sessions_and_rejects_late_answers() {
    let app = setup().await;
    let ann = seed_student(&app.state, "Ann", "+1234567890", "7A").await;
    let bob = seed_student(&app.state, "Bob", "+1987654321", "7A").await;
    let quiz = seed_active_quiz(&app.state, "7A", &["B", "C"]).await;
    let sessions = &app.state.sessions;

    let stale = sessions.create(&ann.id, &quiz.id).await.unwrap();
    let fresh = sessions.create(&bob.id, &quiz.id).await.unwrap();
    backdate(&app, &stale.id, 2).await;

    let expired = sessions.expire_stale(Utc::now(), HOUR).await.unwrap();
    assert_eq!(expired, 1);
    assert_eq!(
        sessions.get(&stale.id).await.unwrap().status,
        SessionStatus::Expired
    );
    assert!(sessions.get(&stale.id).await.unwrap().end_time.is_none());

    let err = sessions.submit_answer(&stale.id, "B").await.unwrap_err();
    assert!(matches!(err, QuizError::SessionExpired(_)));

    // Running it again changes nothing.
    assert_eq!(sessions.expire_stale(Utc::now(), HOUR).await.unwrap(), 0);
    assert!(sessions.submit_answer(&fresh.id, "B").await.is_ok());
}

#[tokio::test]
async fn session_past_ttl_expires_when_touched() {
    let app = setup().await;
    let ann = seed_student(&app.state, "Ann", "+1234567890", "7A").await;
    let quiz = seed_active_quiz(&app.state, "7A", &["B", "C"]).await;
    let sessions = &app.state.sessions;

    let session = sessions.create(&ann.id, &quiz.id).await.unwrap();
    backdate(&app, &session.id, 2).await;

    let err = sessions.submit_answer(&session.id, "B").await.unwrap_err();
    assert!(matches!(err, QuizError::SessionExpired(_)));
    assert_eq!(
        sessions.get(&session.id).await.unwrap().status,
        SessionStatus::Expired
    );

    // The pair is free again.
    assert!(sessions.create(&ann.id, &quiz.id).await.is_ok());
}

#[tokio::test]
async fn dispatch_counts_add_up() {
    let app = setup().await;
    let state = &app.state;
    seed_bound_student(state, "Ann", "+1234567890", "7A", "101").await;
    seed_bound_student(state, "Bob", "+1987654321", "7A", "102").await;
    let blocked = seed_bound_student(state, "Cid", "+1555000222", "7A", "103").await;
    let unbound = seed_student(state, "Dee", "+1555000333", "7A").await;
    seed_bound_student(state, "Eve", "+1555000444", "8B", "105").await;
    app.gateway.fail_for("103");

    let quiz = seed_draft_quiz(state, "7A", &["A", "B"]).await;
    let report = state.dispatch.dispatch_to_class(&quiz.id, "7A").await.unwrap();

    assert_eq!(report.total_recipients, 4);
    assert_eq!(report.success_count, 2);
    assert_eq!(report.failure_count, 1);
    assert_eq!(report.skipped_no_channel, 1);
    assert_eq!(
        report.success_count + report.failure_count,
        report.total_recipients - report.skipped_no_channel
    );
    assert_eq!(report.failures[0].recipient_id, blocked.id);
    assert_eq!(report.skipped, vec![unbound.id.clone()]);

    // The draft was validated and activated on the way out.
    assert_eq!(
        state.quizzes.get(&quiz.id).await.unwrap().status,
        QuizStatus::Active
    );

    // First question went out with one button per label.
    let sent = app.gateway.last_to("101");
    assert!(sent.text.contains("Question 1/2"));
    assert_eq!(sent.buttons.len(), 4);

    // The undelivered session was abandoned, so a retry reaches Cid while
    // everyone else already has the quiz in progress.
    let blocked_session = state.sessions.active_for_recipient(&blocked.id).await.unwrap();
    assert!(blocked_session.is_none());

    app.gateway.recover("103");
    let retry = state.dispatch.dispatch_to_class(&quiz.id, "7A").await.unwrap();
    assert_eq!(retry.success_count, 1);
    assert_eq!(retry.delivered[0].recipient_id, blocked.id);
    assert_eq!(retry.failure_count, 2);
    assert_eq!(retry.skipped_no_channel, 1);
}

#[tokio::test]
async fn redispatch_reports_duplicates_as_failures() {
    let app = setup().await;
    let state = &app.state;
    let ann = seed_bound_student(state, "Ann", "+1234567890", "7A", "101").await;
    let quiz = seed_active_quiz(state, "7A", &["A"]).await;

    let first = state.dispatch.dispatch_to_class(&quiz.id, "7A").await.unwrap();
    assert_eq!(first.success_count, 1);

    let second = state.dispatch.dispatch_to_class(&quiz.id, "7A").await.unwrap();
    assert_eq!(second.success_count, 0);
    assert_eq!(second.failure_count, 1);
    assert_eq!(second.failures[0].recipient_id, ann.id);
    assert!(second.failures[0].reason.contains("active session"));
}

#[tokio::test]
async fn dispatch_to_students_reports_unknown_ids() {
    let app = setup().await;
    let state = &app.state;
    let ann = seed_bound_student(state, "Ann", "+1234567890", "7A", "101").await;
    let quiz = seed_active_quiz(state, "7A", &["A"]).await;

    let ids = vec![ann.id.clone(), "no-such-student".to_string()];
    let report = state
        .dispatch
        .dispatch_to_recipients(&quiz.id, &ids)
        .await
        .unwrap();

    assert_eq!(report.total_recipients, 2);
    assert_eq!(report.success_count, 1);
    assert_eq!(report.failure_count, 1);
    assert_eq!(report.failures[0].recipient_id, "no-such-student");
    assert_eq!(report.delivered[0].recipient_id, ann.id);
}

#[tokio::test]
async fn closed_quiz_cannot_be_dispatched() {
    let app = setup().await;
    let quiz = seed_active_quiz(&app.state, "7A", &["A"]).await;
    app.state.quizzes.close(&quiz.id).await.unwrap();

    let err = app
        .state
        .dispatch
        .dispatch_to_class(&quiz.id, "7A")
        .await
        .unwrap_err();
    assert!(matches!(err, QuizError::QuizNotActive(_)));
}
