pub mod adapter;
pub mod command;
pub mod gateway;
pub mod render;
pub mod telegram;
