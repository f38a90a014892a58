//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` (or the file named by `BOT_CONFIG`) into strongly-typed
//! structs. Every section has defaults so a missing file still yields a
//! runnable configuration. Deployment env vars (`PORT`, `URL_OZON`,
//! `URL_TELEGRAM_BOT`, `DATABASE_URL`) override the file. Secrets are
//! referenced by env-var name and resolved at runtime.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::bot::DEFAULT_API_URL;
use crate::marketplace::ozon::DEFAULT_BASE_URL;
use crate::marketplace::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use crate::normalizer::DEFAULT_PREFIXES;

pub const CONFIG_PATH_ENV: &str = "BOT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ozon: OzonConfig,
    pub telegram: TelegramConfig,
    pub database: DatabaseConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Env var holding the webhook secret token. Unset disables the check.
    pub webhook_secret_env: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8181,
            webhook_secret_env: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OzonConfig {
    pub base_url: String,
    pub page_size: u64,
    pub max_pages: u64,
    pub timeout_secs: u64,
}

impl Default for OzonConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            timeout_secs: 30,
        }
    }
}

impl OzonConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_url: String,
    pub token_env: String,
    pub timeout_secs: u64,
    /// Date-picker web app opened by the arbitrary-range report button.
    pub report_webapp_url: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token_env: "TOKEN_TELEGRAM_BOT".to_string(),
            timeout_secs: 30,
            report_webapp_url: None,
        }
    }
}

impl TelegramConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://ozon_report_bot.db".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReportConfig {
    /// Hours east of UTC at which the reporting day starts.
    pub timezone_offset_hours: i32,
    /// Supplier prefixes stripped from product names, tried in order.
    pub product_prefixes: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timezone_offset_hours: 4,
            product_prefixes: DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise start from defaults; then
    /// apply env overrides.
    pub fn load_with_env(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Override file values from deployment variables looked up via `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT: {port}"))?;
        }
        if let Some(url) = get("URL_OZON") {
            self.ozon.base_url = url;
        }
        if let Some(url) = get("URL_TELEGRAM_BOT") {
            self.telegram.api_url = url;
        }
        if let Some(url) = get("DATABASE_URL") {
            self.database.url = url;
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    pub fn telegram_token(&self) -> Result<SecretString> {
        let token = Self::resolve_env(&self.telegram.token_env)
            .context("Telegram bot token is required")?;
        Ok(SecretString::new(token))
    }

    /// The webhook secret, if one is configured and set.
    pub fn webhook_secret(&self) -> Option<SecretString> {
        self.server
            .webhook_secret_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|s| !s.is_empty())
            .map(SecretString::new)
    }
}
