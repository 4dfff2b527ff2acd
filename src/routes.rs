// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{self, quizzes, sessions, tools, users},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (tools, users, quizzes, sessions).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (services, config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    let tool_routes = Router::new()
        .route("/quiz/send-to-class", post(tools::send_to_class))
        .route("/quiz/send-to-students", post(tools::send_to_students))
        .route("/quiz/generate", post(tools::generate_quiz))
        .route("/bot/status", get(tools::bot_status))
        .route("/analytics/student/{id}", get(tools::student_analytics))
        .route("/content", post(tools::ingest_content))
        .route("/content/{id}/chunks", get(tools::content_chunks))
        .route("/sessions/expire", post(tools::expire_sessions));

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route("/{id}", get(users::get_user));

    let quiz_routes = Router::new()
        .route("/", get(quizzes::list_quizzes).post(quizzes::create_quiz))
        .route("/{id}", get(quizzes::get_quiz))
        .route("/{id}/public", get(quizzes::get_public_quiz))
        .route("/{id}/activate", post(quizzes::activate_quiz))
        .route("/{id}/close", post(quizzes::close_quiz))
        .route("/{id}/questions", put(quizzes::replace_questions))
        .route(
            "/{id}/questions/{position}/answer-key",
            put(quizzes::correct_answer_key),
        );

    let session_routes = Router::new()
        .route("/{id}", get(sessions::get_session))
        .route("/{id}/finalize", post(sessions::finalize_session));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/tools", tool_routes)
        .nest("/api/users", user_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/sessions", session_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
