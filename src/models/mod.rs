// src/models/mod.rs

pub mod analytics;
pub mod content;
pub mod dispatch;
pub mod question;
pub mod quiz;
pub mod session;
pub mod user;
