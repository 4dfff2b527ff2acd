// src/bot/telegram.rs

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use serde::Serialize;
use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup},
};

use crate::{
    bot::{adapter::MessagingAdapter, gateway::ChatGateway, render::QuestionPrompt},
    error::{QuizError, QuizResult},
};

/// Buttons per keyboard row.
const BUTTONS_PER_ROW: usize = 4;

/// Liveness flags of the polling loop, reported by `GET /api/tools/bot/status`.
#[derive(Debug, Default)]
pub struct BotStatus {
    running: AtomicBool,
    initialized: AtomicBool,
}

#[derive(Debug, Serialize)]
pub struct BotStatusView {
    pub running: bool,
    pub initialized: bool,
}

impl BotStatus {
    pub fn snapshot(&self) -> BotStatusView {
        BotStatusView {
            running: self.running.load(Ordering::SeqCst),
            initialized: self.initialized.load(Ordering::SeqCst),
        }
    }
}

/// Sends messages through the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn chat_id(raw: &str) -> QuizResult<ChatId> {
    raw.parse::<i64>()
        .map(ChatId)
        .map_err(|_| QuizError::Channel(format!("not a telegram chat id: {}", raw)))
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    async fn send_text(&self, chat: &str, text: &str) -> QuizResult<()> {
        self.bot
            .send_message(chat_id(chat)?, text)
            .await
            .map_err(|e| QuizError::Channel(e.to_string()))?;
        Ok(())
    }

    async fn send_question(&self, chat: &str, prompt: &QuestionPrompt) -> QuizResult<()> {
        let rows: Vec<Vec<InlineKeyboardButton>> = prompt
            .buttons
            .chunks(BUTTONS_PER_ROW)
            .map(|row| {
                row.iter()
                    .map(|(caption, payload)| {
                        InlineKeyboardButton::callback(caption.clone(), payload.clone())
                    })
                    .collect()
            })
            .collect();

        self.bot
            .send_message(chat_id(chat)?, prompt.text.clone())
            .reply_markup(InlineKeyboardMarkup::new(rows))
            .await
            .map_err(|e| QuizError::Channel(e.to_string()))?;
        Ok(())
    }
}

/// Runs the long-polling loop until the process exits.
pub async fn run_polling(bot: Bot, adapter: Arc<MessagingAdapter>, status: Arc<BotStatus>) {
    match bot.get_me().await {
        Ok(me) => {
            tracing::info!("Telegram bot @{} connected", me.username());
            status.initialized.store(true, Ordering::SeqCst);
        }
        Err(e) => {
            tracing::error!("Telegram bot failed to initialize: {}", e);
            return;
        }
    }

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    status.running.store(true, Ordering::SeqCst);
    tracing::info!("Telegram polling started");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![adapter])
        .build()
        .dispatch()
        .await;

    status.running.store(false, Ordering::SeqCst);
    tracing::warn!("Telegram polling stopped");
}

async fn on_message(adapter: Arc<MessagingAdapter>, msg: Message) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        adapter.handle_text(&msg.chat.id.0.to_string(), text).await;
    }
    Ok(())
}

async fn on_callback(
    bot: Bot,
    adapter: Arc<MessagingAdapter>,
    query: CallbackQuery,
) -> ResponseResult<()> {
    // Stops the client-side spinner on the button.
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        tracing::warn!("Failed to acknowledge callback query: {}", e);
    }

    if let Some(data) = query.data.as_deref() {
        // Private chats share their id with the user.
        let chat = query.from.id.0.to_string();
        adapter.handle_button(&chat, data).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_ids_must_be_numeric() {
        assert_eq!(chat_id("555").unwrap(), ChatId(555));
        assert_eq!(chat_id("-100123").unwrap(), ChatId(-100123));
        assert!(matches!(chat_id("abc"), Err(QuizError::Channel(_))));
    }

    #[test]
    fn status_starts_down() {
        let status = BotStatus::default();
        let view = status.snapshot();
        assert!(!view.running);
        assert!(!view.initialized);
    }
}
