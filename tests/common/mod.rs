// tests/common/mod.rs
#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use quiz_whiz::{
    authoring::generator::QuestionGenerator,
    bot::{gateway::ChatGateway, render::QuestionPrompt},
    config::Config,
    db::connect_in_memory,
    error::{QuizError, QuizResult},
    models::{
        question::{Question, QuestionInput},
        quiz::Quiz,
        user::{CreateRecipientRequest, Recipient, Role},
    },
    routes,
    services::quizzes::NewQuiz,
    state::AppState,
};

/// One outbound message captured by the fake gateway.
#[derive(Debug, Clone)]
pub struct Sent {
    pub chat_id: String,
    pub text: String,
    /// Button payloads; empty for plain text.
    pub buttons: Vec<String>,
}

/// Records outbound messages instead of talking to a chat service.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<Sent>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingGateway {
    /// Makes every send to `chat_id` fail.
    pub fn fail_for(&self, chat_id: &str) {
        self.failing.lock().unwrap().insert(chat_id.to_string());
    }

    pub fn recover(&self, chat_id: &str) {
        self.failing.lock().unwrap().remove(chat_id);
    }

    pub fn sent_to(&self, chat_id: &str) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub fn last_to(&self, chat_id: &str) -> Sent {
        self.sent_to(chat_id)
            .pop()
            .expect("no message was sent to this chat")
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn record(&self, chat_id: &str, text: &str, buttons: Vec<String>) -> QuizResult<()> {
        if self.failing.lock().unwrap().contains(chat_id) {
            return Err(QuizError::Channel(format!("chat {} blocked the bot", chat_id)));
        }
        self.sent.lock().unwrap().push(Sent {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            buttons,
        });
        Ok(())
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send_text(&self, chat_id: &str, text: &str) -> QuizResult<()> {
        self.record(chat_id, text, Vec::new())
    }

    async fn send_question(&self, chat_id: &str, prompt: &QuestionPrompt) -> QuizResult<()> {
        let buttons = prompt.buttons.iter().map(|(_, p)| p.clone()).collect();
        self.record(chat_id, &prompt.text, buttons)
    }
}

/// Returns the same questions for every request.
pub struct CannedGenerator {
    pub questions: Vec<Question>,
}

#[async_trait]
impl QuestionGenerator for CannedGenerator {
    async fn generate_questions(
        &self,
        _content: &str,
        _grade_level: &str,
        _subject: &str,
        _count: u32,
    ) -> QuizResult<Vec<Question>> {
        Ok(self.questions.clone())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<RecordingGateway>,
}

/// App state over a fresh in-memory database.
pub async fn setup() -> TestApp {
    setup_with_generator(None).await
}

pub async fn setup_with_generator(generator: Option<Arc<dyn QuestionGenerator>>) -> TestApp {
    let pool = connect_in_memory()
        .await
        .expect("Failed to open in-memory database");
    let gateway = Arc::new(RecordingGateway::default());
    let state = AppState::new(pool, Config::for_tests(), gateway.clone(), generator);
    TestApp { state, gateway }
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
pub async fn spawn_app(app: &TestApp) -> String {
    let router = routes::create_router(app.state.clone());

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    address
}

pub async fn seed_student(state: &AppState, name: &str, phone: &str, class_id: &str) -> Recipient {
    state
        .recipients
        .create(CreateRecipientRequest {
            name: name.to_string(),
            phone: phone.to_string(),
            class_id: Some(class_id.to_string()),
            role: Role::Student,
        })
        .await
        .expect("Failed to seed student")
}

/// Student registered with a bound chat.
pub async fn seed_bound_student(
    state: &AppState,
    name: &str,
    phone: &str,
    class_id: &str,
    chat_id: &str,
) -> Recipient {
    seed_student(state, name, phone, class_id).await;
    state
        .recipients
        .bind_channel(phone, chat_id)
        .await
        .expect("Failed to bind chat")
}

pub fn question_input(prompt: &str, correct: &str) -> QuestionInput {
    QuestionInput {
        prompt: prompt.to_string(),
        choices: vec![
            "first".to_string(),
            "second".to_string(),
            "third".to_string(),
            "fourth".to_string(),
        ],
        correct_label: correct.to_string(),
        explanation: None,
    }
}

/// Draft quiz with one question per entry of `correct_labels`.
pub async fn seed_draft_quiz(state: &AppState, class_id: &str, correct_labels: &[&str]) -> Quiz {
    let inputs = correct_labels
        .iter()
        .enumerate()
        .map(|(i, label)| question_input(&format!("Question number {}?", i + 1), label))
        .collect();
    state
        .quizzes
        .create_draft(
            NewQuiz {
                title: "Unit test quiz".to_string(),
                subject: Some("Science".to_string()),
                grade_level: Some("Grade 7".to_string()),
                cohort: Some(class_id.to_string()),
                created_by: None,
            },
            inputs,
        )
        .await
        .expect("Failed to seed quiz")
}

/// Active quiz with one question per entry of `correct_labels`.
pub async fn seed_active_quiz(state: &AppState, class_id: &str, correct_labels: &[&str]) -> Quiz {
    let quiz = seed_draft_quiz(state, class_id, correct_labels).await;
    state
        .quizzes
        .activate(&quiz.id)
        .await
        .expect("Failed to activate quiz")
}
