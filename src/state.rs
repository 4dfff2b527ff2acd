// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::AnyPool;

use crate::{
    authoring::generator::QuestionGenerator,
    bot::{adapter::MessagingAdapter, gateway::ChatGateway, telegram::BotStatus},
    config::Config,
    services::{
        analytics::AnalyticsService, content::ContentService, dispatch::DispatchService,
        quizzes::QuizService, recipients::RecipientService, sessions::SessionService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: AnyPool,
    pub config: Config,
    pub recipients: RecipientService,
    pub quizzes: QuizService,
    pub sessions: Arc<SessionService>,
    pub dispatch: Arc<DispatchService>,
    pub contents: ContentService,
    pub analytics: AnalyticsService,
    pub gateway: Arc<dyn ChatGateway>,
    /// `None` when no generator API key is configured.
    pub generator: Option<Arc<dyn QuestionGenerator>>,
    pub bot_status: Arc<BotStatus>,
}

impl AppState {
    pub fn new(
        pool: AnyPool,
        config: Config,
        gateway: Arc<dyn ChatGateway>,
        generator: Option<Arc<dyn QuestionGenerator>>,
    ) -> Self {
        let recipients = RecipientService::new(pool.clone());
        let quizzes = QuizService::new(pool.clone(), &config.answer_labels);
        let sessions = Arc::new(SessionService::new(
            pool.clone(),
            quizzes.clone(),
            config.session_ttl,
        ));
        let dispatch = Arc::new(DispatchService::new(
            recipients.clone(),
            quizzes.clone(),
            sessions.clone(),
            gateway.clone(),
        ));

        Self {
            contents: ContentService::new(pool.clone(), config.chunk_size),
            analytics: AnalyticsService::new(pool.clone()),
            pool,
            config,
            recipients,
            quizzes,
            sessions,
            dispatch,
            gateway,
            generator,
            bot_status: Arc::new(BotStatus::default()),
        }
    }

    /// Chat adapter sharing this state's services and gateway.
    pub fn adapter(&self) -> MessagingAdapter {
        MessagingAdapter::new(
            self.recipients.clone(),
            self.sessions.clone(),
            self.gateway.clone(),
            self.config.answer_labels.clone(),
        )
    }
}

impl FromRef<AppState> for AnyPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
