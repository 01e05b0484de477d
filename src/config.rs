//! Process configuration from environment variables.

use crate::types::ChatId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {0}")]
    Missing(String),
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: String, value: String },
    #[error("could not read {var} file {path:?}: {source}")]
    Unreadable {
        var: String,
        path: String,
        source: std::io::Error,
    },
}

/// Webhook deployment settings; long-polling is used when absent.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Public base URL Telegram can reach, e.g. `https://bot.example.com`
    pub base_url: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    /// Channel all broadcasts go to
    pub channel_id: ChatId,
    pub spreadsheet_id: String,
    /// Service-account key file contents (JSON)
    pub service_account_json: String,
    /// Bot username for the contest deep link; resolved via getMe when unset
    pub bot_username: Option<String>,
    pub webhook: Option<WebhookConfig>,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// Required: `BOT_TOKEN`, `CHANNEL_ID`, `SPREADSHEET_ID`, and
    /// `CREDENTIALS_JSON` (either the service-account key JSON inline, or a
    /// path to the key file). Optional: `BOT_USERNAME`, and
    /// `WEBHOOK_BASE_URL` (+ `PORT`, default 8080) to select webhook mode.
    /// All missing required variables are reported in one error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut require = |name: &'static str| match env_nonempty(name) {
            Some(value) => value,
            None => {
                missing.push(name);
                String::new()
            }
        };

        let bot_token = require("BOT_TOKEN");
        let channel_raw = require("CHANNEL_ID");
        let spreadsheet_id = require("SPREADSHEET_ID");
        let credentials = require("CREDENTIALS_JSON");

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing.join(", ")));
        }

        let channel_id: ChatId = channel_raw.parse().map_err(|_| ConfigError::Invalid {
            var: "CHANNEL_ID".to_string(),
            value: channel_raw.clone(),
        })?;

        // Inline JSON or a path to the key file.
        let service_account_json = if credentials.trim_start().starts_with('{') {
            credentials
        } else {
            std::fs::read_to_string(&credentials).map_err(|source| ConfigError::Unreadable {
                var: "CREDENTIALS_JSON".to_string(),
                path: credentials.clone(),
                source,
            })?
        };

        let webhook = match env_nonempty("WEBHOOK_BASE_URL") {
            None => None,
            Some(base_url) => {
                let port = match env_nonempty("PORT") {
                    None => 8080,
                    Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                        var: "PORT".to_string(),
                        value: raw.clone(),
                    })?,
                };
                Some(WebhookConfig { base_url, port })
            }
        };

        Ok(Self {
            bot_token,
            channel_id,
            spreadsheet_id,
            service_account_json,
            bot_username: env_nonempty("BOT_USERNAME"),
            webhook,
        })
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
