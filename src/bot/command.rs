// src/bot/command.rs

const BUTTON_PREFIX: &str = "answer_";

/// Inbound chat event, produced by a single parse step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Register(String),
    /// `/register` without a phone number.
    RegisterUsage,
    Help,
    /// `/quiz`: re-send the current question.
    Resume,
    /// `/finish`: finish the current quiz early.
    Finish,
    /// Single-character free-text reply.
    Answer(String),
    /// Inline button click.
    Button {
        session_id: String,
        position: u32,
        label: String,
    },
    Unknown,
}

impl Command {
    /// Parses a text message.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();

        if let Some(rest) = text.strip_prefix('/') {
            let (word, args) = match rest.split_once(char::is_whitespace) {
                Some((word, args)) => (word, args.trim()),
                None => (rest, ""),
            };
            // "/start@QuizWhizBot" in group chats.
            let word = word.split('@').next().unwrap_or(word).to_ascii_lowercase();
            return match word.as_str() {
                "start" => Command::Start,
                "register" if args.is_empty() => Command::RegisterUsage,
                "register" => Command::Register(args.to_string()),
                "help" => Command::Help,
                "quiz" => Command::Resume,
                "finish" => Command::Finish,
                _ => Command::Unknown,
            };
        }

        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphanumeric() => Command::Answer(c.to_string()),
            _ => Command::Unknown,
        }
    }

    /// Parses a button payload of the form `answer_<sessionId>_<position>_<label>`.
    pub fn parse_button(data: &str) -> Self {
        let Some(rest) = data.strip_prefix(BUTTON_PREFIX) else {
            return Command::Unknown;
        };
        let mut parts = rest.rsplitn(3, '_');
        let (Some(label), Some(position), Some(session_id)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Command::Unknown;
        };
        match position.parse::<u32>() {
            Ok(position) if !session_id.is_empty() && !label.is_empty() => Command::Button {
                session_id: session_id.to_string(),
                position,
                label: label.to_string(),
            },
            _ => Command::Unknown,
        }
    }
}

pub fn button_payload(session_id: &str, position: u32, label: char) -> String {
    format!("{}{}_{}_{}", BUTTON_PREFIX, session_id, position, label)
}
