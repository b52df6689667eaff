//! Usage: Bot configuration (TOML file + environment overrides for secrets).

use crate::shared::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "hh-vacancy-bot.toml";
pub const DEFAULT_DB_FILE: &str = "hh-vacancy-bot.db";

const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_HH_API_BASE: &str = "https://api.hh.ru";
const DEFAULT_HH_AUTHORIZE_URL: &str = "https://hh.ru/oauth/authorize";
const DEFAULT_HH_TOKEN_URL: &str = "https://api.hh.ru/token";

const DEFAULT_CALLBACK_BIND_HOST: &str = "127.0.0.1";
const DEFAULT_CALLBACK_PORT: u16 = 8400;
const DEFAULT_CALLBACK_PATH: &str = "/oauth/callback";

pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 300;
const MIN_AUTH_TIMEOUT_SECS: u64 = 10;
const MAX_AUTH_TIMEOUT_SECS: u64 = 3600;

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const MIN_SWEEP_INTERVAL_SECS: u64 = 5;
const MAX_SWEEP_INTERVAL_SECS: u64 = 3600;

const ENV_TELEGRAM_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
const ENV_HH_CLIENT_ID: &str = "HH_CLIENT_ID";
const ENV_HH_CLIENT_SECRET: &str = "HH_CLIENT_SECRET";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    pub telegram: TelegramSettings,
    pub database: DatabaseSettings,
    pub hh: HhSettings,
    pub oauth: OAuthCallbackSettings,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub token: String,
    pub api_base_url: String,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base_url: DEFAULT_TELEGRAM_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_FILE),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HhSettings {
    pub client_id: String,
    pub client_secret: String,
    /// OAuth scope; hh.ru issues full-profile grants, so this is usually empty.
    pub scope: String,
    pub api_base_url: String,
    pub authorize_url: String,
    pub token_url: String,
}

impl Default for HhSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            scope: String::new(),
            api_base_url: DEFAULT_HH_API_BASE.to_string(),
            authorize_url: DEFAULT_HH_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_HH_TOKEN_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthCallbackSettings {
    pub bind_host: String,
    pub bind_port: u16,
    /// Externally reachable base URL the provider redirects to, without trailing slash.
    pub public_base_url: String,
    pub callback_path: String,
    pub attempt_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for OAuthCallbackSettings {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_CALLBACK_BIND_HOST.to_string(),
            bind_port: DEFAULT_CALLBACK_PORT,
            public_base_url: format!("http://{DEFAULT_CALLBACK_BIND_HOST}:{DEFAULT_CALLBACK_PORT}"),
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            attempt_timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl OAuthCallbackSettings {
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}{}",
            self.public_base_url.trim_end_matches('/'),
            self.callback_path
        )
    }
}

impl BotSettings {
    /// Load settings from `path` (missing file means all defaults), then apply
    /// environment overrides and clamp numeric fields.
    pub fn load(path: &Path) -> AppResult<Self> {
        let mut settings = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| format!("CONFIG_ERROR: failed to read {}: {e}", path.display()))?;
            toml::from_str::<Self>(&raw)
                .map_err(|e| format!("CONFIG_ERROR: failed to parse {}: {e}", path.display()))?
        } else {
            Self::default()
        };

        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings.clamp();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(token) = get(ENV_TELEGRAM_TOKEN).map(|v| v.trim().to_string()) {
            if !token.is_empty() {
                self.telegram.token = token;
            }
        }
        if let Some(id) = get(ENV_HH_CLIENT_ID).map(|v| v.trim().to_string()) {
            if !id.is_empty() {
                self.hh.client_id = id;
            }
        }
        if let Some(secret) = get(ENV_HH_CLIENT_SECRET).map(|v| v.trim().to_string()) {
            if !secret.is_empty() {
                self.hh.client_secret = secret;
            }
        }
    }

    fn clamp(&mut self) {
        self.oauth.attempt_timeout_secs = self
            .oauth
            .attempt_timeout_secs
            .clamp(MIN_AUTH_TIMEOUT_SECS, MAX_AUTH_TIMEOUT_SECS);
        self.oauth.sweep_interval_secs = self
            .oauth
            .sweep_interval_secs
            .clamp(MIN_SWEEP_INTERVAL_SECS, MAX_SWEEP_INTERVAL_SECS);
    }

    /// Startup validation for fields without sensible defaults.
    pub fn validate(&self) -> AppResult<()> {
        if self.telegram.token.trim().is_empty() {
            return Err(format!(
                "CONFIG_ERROR: telegram token is not set (config [telegram].token or {ENV_TELEGRAM_TOKEN})"
            )
            .into());
        }
        if self.hh.client_id.trim().is_empty() || self.hh.client_secret.trim().is_empty() {
            return Err(format!(
                "CONFIG_ERROR: hh.ru client credentials are not set (config [hh] or {ENV_HH_CLIENT_ID}/{ENV_HH_CLIENT_SECRET})"
            )
            .into());
        }
        if !self.oauth.callback_path.starts_with('/') {
            return Err("CONFIG_ERROR: oauth.callback_path must start with '/'".into());
        }
        Ok(())
    }
}
