// src/config.rs

use std::{env, time::Duration};

use dotenvy::dotenv;
use url::Url;

/// Default choice labels used when `ANSWER_LABELS` is unset.
pub const DEFAULT_ANSWER_LABELS: &str = "ABCD";

/// Implicit time-to-live of a single quiz session (1 hour).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// How often the expiry sweeper runs.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Maximum characters per ingested content chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 3000;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,
    pub server_port: u16,
    pub telegram_bot_token: Option<String>,
    pub generator: GeneratorConfig,
    /// Uppercase choice labels, one per answer option.
    pub answer_labels: Vec<char>,
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
    pub chunk_size: usize,
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: Option<String>,
    pub api_url: Url,
    pub model: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let server_port = env::var("SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let telegram_bot_token = env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let api_url = env::var("GENERATOR_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_url = Url::parse(&api_url).expect("GENERATOR_API_URL must be a valid URL");

        let generator = GeneratorConfig {
            api_key: env::var("GENERATOR_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            api_url,
            model: env::var("GENERATOR_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        };

        let answer_labels = parse_labels(
            &env::var("ANSWER_LABELS").unwrap_or_else(|_| DEFAULT_ANSWER_LABELS.to_string()),
        );

        Self {
            database_url,
            rust_log,
            server_port,
            telegram_bot_token,
            generator,
            answer_labels,
            session_ttl: Duration::from_secs(env_u64("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)),
            sweep_interval: Duration::from_secs(env_u64(
                "SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL_SECS,
            )),
            chunk_size: env_u64("CHUNK_SIZE", DEFAULT_CHUNK_SIZE as u64) as usize,
        }
    }

    /// Configuration for tests: in-memory SQLite, no bot, no generator.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            rust_log: "error".to_string(),
            server_port: 0,
            telegram_bot_token: None,
            generator: GeneratorConfig {
                api_key: None,
                api_url: Url::parse("http://127.0.0.1:9/v1").expect("static url"),
                model: "test-model".to_string(),
            },
            answer_labels: parse_labels(DEFAULT_ANSWER_LABELS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

/// Uppercases and de-duplicates a label alphabet, falling back to A-D when empty.
pub fn parse_labels(raw: &str) -> Vec<char> {
    let mut labels: Vec<char> = Vec::new();
    for c in raw.chars().filter(|c| c.is_ascii_alphanumeric()) {
        let c = c.to_ascii_uppercase();
        if !labels.contains(&c) {
            labels.push(c);
        }
    }
    if labels.len() < 2 {
        return DEFAULT_ANSWER_LABELS.chars().collect();
    }
    labels
}
