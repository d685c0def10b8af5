use std::env;
use std::path::PathBuf;

use thiserror::Error;

const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
const ADMINS_ENV: &str = "ADMIN_CHAT_ID";
const DATA_DIR_ENV: &str = "DATA_DIR";
const DEFAULT_DATA_DIR: &str = "./data";
const REPORT_FILE: &str = "report.xlsx";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("ADMIN_CHAT_ID contains an invalid chat id: {0:?}")]
    InvalidAdminId(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub admin_ids: Vec<String>,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = lookup(TOKEN_ENV)
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::Missing(TOKEN_ENV))?;

        let admin_ids = parse_admin_ids(&lookup(ADMINS_ENV).unwrap_or_default())?;

        let data_dir = lookup(DATA_DIR_ENV)
            .filter(|dir| !dir.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
            .into();

        Ok(Self {
            bot_token,
            admin_ids,
            data_dir,
        })
    }

    pub fn report_path(&self) -> PathBuf {
        self.data_dir.join(REPORT_FILE)
    }
}

/// "123, -456" -> ["123", "-456"]; нужен хотя бы один id
pub fn parse_admin_ids(raw: &str) -> Result<Vec<String>, ConfigError> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<i64>()
                .map(|id| id.to_string())
                .map_err(|_| ConfigError::InvalidAdminId(id.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if ids.is_empty() {
        return Err(ConfigError::Missing(ADMINS_ENV));
    }
    Ok(ids)
}
