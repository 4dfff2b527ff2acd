// src/db.rs

use std::time::Duration;

use sqlx::{
    AnyPool,
    any::{AnyPoolOptions, install_default_drivers},
};

/// Portable DDL: runs unchanged on MySQL (production) and SQLite (tests).
/// `sessions.active_key` is non-NULL only while a session is active, so the
/// UNIQUE constraint allows one active session per (recipient, quiz).
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        phone VARCHAR(32) NOT NULL UNIQUE,
        channel_id VARCHAR(64) UNIQUE,
        cohort VARCHAR(64),
        role VARCHAR(16) NOT NULL,
        created_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS quizzes (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        title VARCHAR(200) NOT NULL,
        subject VARCHAR(100),
        grade_level VARCHAR(50),
        cohort VARCHAR(64),
        status VARCHAR(16) NOT NULL,
        created_by VARCHAR(64),
        created_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS questions (
        quiz_id VARCHAR(64) NOT NULL,
        position BIGINT NOT NULL,
        prompt TEXT NOT NULL,
        choices TEXT NOT NULL,
        correct_label VARCHAR(4) NOT NULL,
        explanation TEXT,
        PRIMARY KEY (quiz_id, position),
        FOREIGN KEY (quiz_id) REFERENCES quizzes (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        recipient_id VARCHAR(64) NOT NULL,
        quiz_id VARCHAR(64) NOT NULL,
        status VARCHAR(16) NOT NULL,
        position BIGINT NOT NULL,
        answers TEXT NOT NULL,
        score BIGINT,
        start_time BIGINT NOT NULL,
        end_time BIGINT,
        active_key VARCHAR(160) UNIQUE,
        FOREIGN KEY (recipient_id) REFERENCES users (id),
        FOREIGN KEY (quiz_id) REFERENCES quizzes (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS contents (
        id VARCHAR(64) NOT NULL PRIMARY KEY,
        title VARCHAR(200) NOT NULL,
        cohort VARCHAR(64),
        chunk_count BIGINT NOT NULL,
        created_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS content_chunks (
        content_id VARCHAR(64) NOT NULL,
        chunk_index BIGINT NOT NULL,
        body TEXT NOT NULL,
        PRIMARY KEY (content_id, chunk_index),
        FOREIGN KEY (content_id) REFERENCES contents (id)
    )
    "#,
];

/// Connects to the database, retrying while it comes up.
pub async fn connect(database_url: &str) -> Result<AnyPool, sqlx::Error> {
    install_default_drivers();

    let mut retry_count = 0;
    loop {
        match pool_options(database_url).connect(database_url).await {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    return Err(e);
                }
                tracing::warn!(
                    "Database not ready, retrying in 2s... (Attempt {}): {}",
                    retry_count,
                    e
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

fn pool_options(database_url: &str) -> AnyPoolOptions {
    if database_url.starts_with("sqlite:") && database_url.contains(":memory:") {
        // Every connection to an in-memory SQLite database sees a fresh database,
        // so keep exactly one alive for the lifetime of the pool.
        AnyPoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        AnyPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
    }
}

/// Creates missing tables.
pub async fn init_schema(pool: &AnyPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(pool).await?;
    }
    tracing::info!("Database schema ready.");
    Ok(())
}

/// Fresh in-memory database with the schema applied.
pub async fn connect_in_memory() -> Result<AnyPool, sqlx::Error> {
    let pool = connect("sqlite::memory:").await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// True when the error is a UNIQUE/PRIMARY KEY constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
