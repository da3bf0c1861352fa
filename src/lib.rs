pub mod bot;
pub mod config;
pub mod operator_log;
