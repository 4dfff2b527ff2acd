// src/bot/render.rs

use crate::{
    bot::command::button_payload,
    models::{
        question::Question,
        quiz::Quiz,
        session::{AnswerOutcome, FinalizeOutcome},
    },
};

/// A question ready to send: message text plus one button per label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionPrompt {
    pub text: String,
    /// (button caption, callback payload)
    pub buttons: Vec<(String, String)>,
}

pub fn question_prompt(
    quiz: &Quiz,
    question: &Question,
    session_id: &str,
    labels: &[char],
) -> QuestionPrompt {
    let mut text = String::new();
    if question.position == 1 {
        text.push_str(&format!("📚 {}\n\n", quiz.title));
    }
    text.push_str(&format!(
        "📝 Question {}/{}\n\n{}\n\n",
        question.position,
        quiz.question_count(),
        question.prompt
    ));
    for (label, choice) in question.labeled_choices(labels) {
        text.push_str(&format!("{}) {}\n", label, choice));
    }
    text.push_str(&format!(
        "\nReply with {} or tap a button below.",
        label_list(labels)
    ));

    let buttons = labels
        .iter()
        .take(question.choices.len())
        .map(|&label| {
            (
                label.to_string(),
                button_payload(session_id, question.position, label),
            )
        })
        .collect();

    QuestionPrompt { text, buttons }
}

pub fn feedback(outcome: &AnswerOutcome) -> String {
    let mut text = if outcome.is_correct {
        "✅ Correct!".to_string()
    } else {
        format!(
            "❌ Not quite. The correct answer is {}.",
            outcome.correct_label
        )
    };
    if let Some(explanation) = &outcome.explanation {
        text.push_str(&format!("\n\n💡 {}", explanation));
    }
    text
}

pub fn result(outcome: &FinalizeOutcome, quiz_title: &str) -> String {
    let verdict = match outcome.score {
        90..=100 => "Excellent work! 🌟",
        70..=89 => "Well done! 👏",
        50..=69 => "Good effort, keep practicing. 💪",
        _ => "Keep studying, you will get there. 📖",
    };
    format!(
        "🏁 Quiz complete: {}\n\nScore: {}% ({}/{} correct)\n{}",
        quiz_title, outcome.score, outcome.correct_count, outcome.total_answered, verdict
    )
}

pub fn welcome(registered_name: Option<&str>) -> String {
    match registered_name {
        Some(name) => format!(
            "👋 Welcome back, {}! Your quizzes will arrive here. Send /quiz to continue an open quiz.",
            name
        ),
        None => "👋 Welcome to Quiz Whiz!\n\nTo receive quizzes, register with the phone number your school has on file:\n/register +1234567890".to_string(),
    }
}

pub fn registered(name: &str) -> String {
    format!(
        "✅ You are registered, {}! Quizzes from your teacher will be sent to this chat.",
        name
    )
}

pub fn register_usage() -> &'static str {
    "📱 Please include your phone number, for example: /register +1234567890"
}

pub fn not_registered() -> &'static str {
    "ℹ️ This chat is not registered yet. Send /register followed by your phone number."
}

pub fn nothing_active() -> &'static str {
    "ℹ️ You have no active quiz right now. Your teacher will send one soon."
}

pub fn help(labels: &[char]) -> String {
    format!(
        "🤖 Quiz Whiz commands\n\n\
         /start - welcome message\n\
         /register <phone> - link this chat to your student account\n\
         /quiz - show your current question again\n\
         /finish - finish the current quiz now\n\
         /help - this message\n\n\
         To answer a question, reply with {} or tap one of the buttons.",
        label_list(labels)
    )
}

/// "A, B, C or D"
fn label_list(labels: &[char]) -> String {
    match labels.split_last() {
        Some((last, [])) => last.to_string(),
        Some((last, rest)) => format!(
            "{} or {}",
            rest.iter().map(char::to_string).collect::<Vec<_>>().join(", "),
            last
        ),
        None => String::new(),
    }
}
