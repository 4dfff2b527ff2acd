pub mod analytics;
pub mod content;
pub mod dispatch;
pub mod quizzes;
pub mod recipients;
pub mod sessions;
pub mod sweeper;
