// tests/bot_tests.rs

mod common;

use common::{TestApp, seed_bound_student, seed_draft_quiz, seed_student, setup};
use quiz_whiz::{bot::adapter::MessagingAdapter, models::session::SessionStatus};

/// Ann (chat 101) with the two-question quiz already delivered.
async fn delivered(app: &TestApp) -> (MessagingAdapter, String) {
    let ann = seed_bound_student(&app.state, "Ann", "+1234567890", "7A", "101").await;
    let quiz = seed_draft_quiz(&app.state, "7A", &["B", "C"]).await;
    let report = app
        .state
        .dispatch
        .dispatch_to_class(&quiz.id, "7A")
        .await
        .expect("Failed to dispatch quiz");
    assert_eq!(report.success_count, 1);
    assert_eq!(report.delivered[0].recipient_id, ann.id);
    (app.state.adapter(), report.delivered[0].session_id.clone())
}

#[tokio::test]
async fn register_binds_chat_once() {
    let app = setup().await;
    seed_student(&app.state, "Ann", "+1234567890", "7A").await;
    let adapter = app.state.adapter();

    adapter.handle_text("555", "/register +1234567890").await;
    assert!(app.gateway.last_to("555").text.contains("You are registered, Ann"));

    // The same phone from another chat is refused.
    adapter.handle_text("777", "/register +1234567890").await;
    assert!(
        app.gateway
            .last_to("777")
            .text
            .contains("already linked to a different chat")
    );

    // Re-registering from the bound chat is harmless.
    adapter.handle_text("555", "/register +1234567890").await;
    assert!(app.gateway.last_to("555").text.contains("You are registered"));
}

#[tokio::test]
async fn register_with_unknown_or_missing_phone() {
    let app = setup().await;
    let adapter = app.state.adapter();

    adapter.handle_text("555", "/register +1999999999").await;
    assert!(
        app.gateway
            .last_to("555")
            .text
            .contains("could not find a student")
    );

    adapter.handle_text("555", "/register").await;
    assert!(app.gateway.last_to("555").text.contains("include your phone number"));
}

#[tokio::test]
async fn start_greets_known_and_unknown_chats() {
    let app = setup().await;
    seed_bound_student(&app.state, "Ann", "+1234567890", "7A", "101").await;
    let adapter = app.state.adapter();

    adapter.handle_text("101", "/start").await;
    assert!(app.gateway.last_to("101").text.contains("Welcome back, Ann"));

    adapter.handle_text("999", "/start").await;
    assert!(app.gateway.last_to("999").text.contains("/register"));
}

#[tokio::test]
async fn unregistered_chat_is_told_to_register() {
    let app = setup().await;
    let adapter = app.state.adapter();

    adapter.handle_text("999", "A").await;
    assert!(app.gateway.last_to("999").text.contains("not registered yet"));
}

#[tokio::test]
async fn answer_without_active_session() {
    let app = setup().await;
    seed_bound_student(&app.state, "Ann", "+1234567890", "7A", "101").await;
    let adapter = app.state.adapter();

    adapter.handle_text("101", "B").await;
    assert!(app.gateway.last_to("101").text.contains("no active quiz"));
}

#[tokio::test]
async fn unknown_text_gets_help() {
    let app = setup().await;
    let adapter = app.state.adapter();

    adapter.handle_text("101", "what is this?").await;
    let help = app.gateway.last_to("101").text;
    assert!(help.contains("/register"));
    assert!(help.contains("A, B, C or D"));
}

#[tokio::test]
async fn full_quiz_over_chat() {
    let app = setup().await;
    let (adapter, session_id) = delivered(&app).await;

    let first = app.gateway.last_to("101");
    assert!(first.text.contains("Unit test quiz"));
    assert!(first.text.contains("Question 1/2"));
    assert_eq!(first.buttons[1], format!("answer_{}_1_B", session_id));
    app.gateway.clear();

    // Text reply: feedback comes before the next question.
    adapter.handle_text("101", "b").await;
    let sent = app.gateway.sent_to("101");
    assert_eq!(sent.len(), 2);
    assert!(sent[0].text.contains("Correct"));
    assert!(sent[1].text.contains("Question 2/2"));
    assert!(!sent[1].text.contains("Unit test quiz"));
    app.gateway.clear();

    // Button click on the last question finishes the quiz.
    adapter
        .handle_button("101", &format!("answer_{}_2_A", session_id))
        .await;
    let sent = app.gateway.sent_to("101");
    assert_eq!(sent.len(), 2);
    assert!(sent[0].text.contains("correct answer is C"));
    assert!(sent[1].text.contains("Quiz complete"));
    assert!(sent[1].text.contains("50%"));

    let session = app.state.sessions.get(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.score, Some(50));
}

#[tokio::test]
async fn invalid_label_prompts_again() {
    let app = setup().await;
    let (adapter, session_id) = delivered(&app).await;
    app.gateway.clear();

    adapter.handle_text("101", "x").await;
    let sent = app.gateway.sent_to("101");
    assert_eq!(sent.len(), 2);
    assert!(sent[0].text.contains("option letters"));
    assert!(sent[1].text.contains("Question 1/2"));

    let session = app.state.sessions.get(&session_id).await.unwrap();
    assert_eq!(session.position, 1);
    assert!(session.answers.is_empty());
}

#[tokio::test]
async fn stale_button_does_not_overwrite_answer() {
    let app = setup().await;
    let (adapter, session_id) = delivered(&app).await;

    adapter
        .handle_button("101", &format!("answer_{}_1_B", session_id))
        .await;
    app.gateway.clear();

    // Second click on the first question's keyboard.
    adapter
        .handle_button("101", &format!("answer_{}_1_D", session_id))
        .await;
    assert!(
        app.gateway
            .last_to("101")
            .text
            .contains("already been answered")
    );

    let session = app.state.sessions.get(&session_id).await.unwrap();
    assert_eq!(session.position, 2);
    assert_eq!(session.answers.get(&1), Some(&'B'));
}

#[tokio::test]
async fn button_for_another_students_session_is_refused() {
    let app = setup().await;
    let (adapter, session_id) = delivered(&app).await;
    seed_bound_student(&app.state, "Bob", "+1987654321", "8B", "102").await;

    adapter
        .handle_button("102", &format!("answer_{}_1_B", session_id))
        .await;
    assert!(app.gateway.last_to("102").text.contains("no active quiz"));

    let session = app.state.sessions.get(&session_id).await.unwrap();
    assert!(session.answers.is_empty());
}

#[tokio::test]
async fn resume_and_finish_early() {
    let app = setup().await;
    let (adapter, session_id) = delivered(&app).await;

    adapter.handle_text("101", "B").await;
    app.gateway.clear();

    adapter.handle_text("101", "/quiz").await;
    assert!(app.gateway.last_to("101").text.contains("Question 2/2"));

    adapter.handle_text("101", "/finish").await;
    assert!(app.gateway.last_to("101").text.contains("Quiz complete"));

    let session = app.state.sessions.get(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);

    // Nothing is left to answer.
    adapter.handle_text("101", "C").await;
    assert!(app.gateway.last_to("101").text.contains("no active quiz"));
}

#[tokio::test]
async fn registering_late_resends_the_open_question() {
    let app = setup().await;
    let ann = seed_student(&app.state, "Ann", "+1234567890", "7A").await;
    let quiz = common::seed_active_quiz(&app.state, "7A", &["A", "B"]).await;
    app.state.sessions.create(&ann.id, &quiz.id).await.unwrap();
    let adapter = app.state.adapter();

    adapter.handle_text("555", "/register +1234567890").await;
    let sent = app.gateway.sent_to("555");
    assert_eq!(sent.len(), 2);
    assert!(sent[0].text.contains("You are registered"));
    assert!(sent[1].text.contains("Question 1/2"));
}

#[tokio::test]
async fn duplicate_text_reply_is_recorded_once() {
    let app = setup().await;
    let (adapter, session_id) = delivered(&app).await;
    app.gateway.clear();

    tokio::join!(
        adapter.handle_text("101", "B"),
        adapter.handle_text("101", "B")
    );

    let session = app.state.sessions.get(&session_id).await.unwrap();
    assert_eq!(session.answers.len(), 1);
    assert_eq!(session.answers.get(&1), Some(&'B'));
    assert_eq!(session.position, 2);

    let sent = app.gateway.sent_to("101");
    assert!(sent.iter().any(|s| s.text.contains("already been answered")));
    assert_eq!(
        sent.iter()
            .filter(|s| s.text.contains("Question 2/2"))
            .count(),
        1
    );
}

#[tokio::test]
async fn non_label_character_without_quiz_gets_help() {
    let app = setup().await;
    seed_bound_student(&app.state, "Ann", "+1234567890", "7A", "101").await;
    let adapter = app.state.adapter();

    adapter.handle_text("101", "7").await;
    assert!(app.gateway.last_to("101").text.contains("Quiz Whiz commands"));

    adapter.handle_text("101", "e").await;
    assert!(app.gateway.last_to("101").text.contains("Quiz Whiz commands"));

    // A valid label still gets the "nothing active" notice.
    adapter.handle_text("101", "b").await;
    assert!(app.gateway.last_to("101").text.contains("no active quiz"));
}
