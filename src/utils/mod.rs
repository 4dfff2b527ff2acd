// src/utils/mod.rs

pub mod chunk;
pub mod lock;
pub mod phone;
pub mod time;
