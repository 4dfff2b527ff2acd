// src/main.rs

use std::{net::SocketAddr, sync::Arc};

use quiz_whiz::{
    authoring::generator::{HttpQuestionGenerator, QuestionGenerator},
    bot::{
        gateway::{ChatGateway, DisabledGateway},
        telegram::{TelegramGateway, run_polling},
    },
    config::Config,
    db, routes,
    services::sweeper,
    state::AppState,
};
use teloxide::Bot;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration from environment (reads .env if present)
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let pool = db::connect(&config.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to database after 5 retries: {}", e));
    tracing::info!("Database connected...");

    db::init_schema(&pool)
        .await
        .expect("Failed to create database schema");

    // Chat channel
    let bot = config.telegram_bot_token.as_ref().map(Bot::new);
    let gateway: Arc<dyn ChatGateway> = match &bot {
        Some(bot) => Arc::new(TelegramGateway::new(bot.clone())),
        None => {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set, quiz delivery is disabled");
            Arc::new(DisabledGateway)
        }
    };

    // Question generator
    let generator: Option<Arc<dyn QuestionGenerator>> =
        match HttpQuestionGenerator::from_config(&config.generator, &config.answer_labels) {
            Ok(Some(generator)) => Some(Arc::new(generator)),
            Ok(None) => {
                tracing::warn!("GENERATOR_API_KEY not set, quiz generation is disabled");
                None
            }
            Err(e) => {
                tracing::error!("Question generator unavailable: {}", e);
                None
            }
        };

    // Create AppState
    let state = AppState::new(pool, config.clone(), gateway, generator);

    if let Some(bot) = bot {
        let adapter = Arc::new(state.adapter());
        tokio::spawn(run_polling(bot, adapter, state.bot_status.clone()));
    }

    sweeper::spawn(state.sessions.clone(), config.sweep_interval);

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}
