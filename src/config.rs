use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default market-overview page the rates are scraped from.
pub const DEFAULT_MARKET_URL: &str = "https://www.binance.com/ru/markets";

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    telegram_bot_token: String,
    /// The only user allowed to run /send.
    admin_id: i64,
    /// Directory for state files (database, logs). Defaults to current directory.
    data_dir: Option<String>,
    #[serde(default = "default_database_file")]
    database_file: String,
    #[serde(default = "default_market_url")]
    market_url: String,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    /// Chat that receives WARN/ERROR log lines.
    log_chat_id: Option<i64>,
}

fn default_database_file() -> String {
    "users.db".to_string()
}

fn default_market_url() -> String {
    DEFAULT_MARKET_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub admin_id: i64,
    /// Directory for state files (database, logs).
    pub data_dir: PathBuf,
    /// Full path of the SQLite file holding registered chats.
    pub database_path: PathBuf,
    pub market_url: String,
    /// Upper bound for the price fetch and for each broadcast delivery.
    pub request_timeout: Duration,
    pub log_chat_id: Option<i64>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }
        if file.admin_id == 0 {
            return Err(ConfigError::Validation("admin_id must be a Telegram user ID".into()));
        }
        if file.request_timeout_secs == 0 {
            return Err(ConfigError::Validation("request_timeout_secs must be greater than zero".into()));
        }
        if !file.market_url.starts_with("http://") && !file.market_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!("market_url '{}' is not an http(s) URL", file.market_url)));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let database_path = data_dir.join(&file.database_file);

        Ok(Self {
            telegram_bot_token: file.telegram_bot_token,
            admin_id: file.admin_id,
            data_dir,
            database_path,
            market_url: file.market_url,
            request_timeout: Duration::from_secs(file.request_timeout_secs),
            log_chat_id: file.log_chat_id,
        })
    }
}
