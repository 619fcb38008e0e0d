pub mod board;
pub mod commands;
pub mod config;
pub mod db;
pub mod render;
pub mod roster;
pub mod services;

/// Custom data passed to all commands
pub struct Data {
    pub config: config::Config,
    pub db: db::Database,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
