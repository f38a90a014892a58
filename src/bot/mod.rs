//! Telegram glue.
//!
//! - [`telegram`]: Bot API wire types
//! - [`keyboard`]: row/column keyboard grid builder
//! - [`conversation`]: pending free-text inputs per conversation
//! - [`dispatcher`]: routes updates to settings and report commands
//!
//! Outgoing calls go through the [`BotApi`] capability so the dispatcher can
//! be tested against a recording fake.

pub mod conversation;
pub mod dispatcher;
pub mod keyboard;
pub mod telegram;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use telegram::{AnswerCallbackQuery, ApiResponse, EditMessageText, SendMessage};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org/bot";

const USER_AGENT: &str = concat!("ozon-report-bot/", env!("CARGO_PKG_VERSION"));

/// Outgoing Bot API methods used by the dispatcher.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn send_message(&self, body: SendMessage) -> Result<()>;

    async fn edit_message_text(&self, body: EditMessageText) -> Result<()>;

    async fn answer_callback_query(&self, body: AnswerCallbackQuery) -> Result<()>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// Bot API over HTTPS. Method URLs are `{api_url}{token}/{method}`.
pub struct TelegramClient {
    http: Client,
    api_url: String,
    token: SecretString,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: SecretString, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build Telegram HTTP client")?;
        Ok(Self {
            http,
            api_url: api_url.to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}{}/{}", self.api_url, self.token.expose_secret(), method)
    }

    async fn call<T: Serialize + Sync>(&self, method: &str, body: &T) -> Result<()> {
        let resp = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            // reqwest errors carry the URL, which contains the token.
            .map_err(|e| anyhow::anyhow!("Telegram {method} request failed: {}", e.without_url()))?;

        let status = resp.status();
        let parsed: ApiResponse = resp
            .json()
            .await
            .with_context(|| format!("Telegram {method} returned an unreadable body ({status})"))?;

        if !parsed.ok {
            bail!(
                "Telegram {method} rejected ({status}): {}",
                parsed.description.unwrap_or_default()
            );
        }
        debug!(method, "Telegram call ok");
        Ok(())
    }
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn send_message(&self, body: SendMessage) -> Result<()> {
        self.call("sendMessage", &body).await
    }

    async fn edit_message_text(&self, body: EditMessageText) -> Result<()> {
        self.call("editMessageText", &body).await
    }

    async fn answer_callback_query(&self, body: AnswerCallbackQuery) -> Result<()> {
        self.call("answerCallbackQuery", &body).await
    }
}

// ---------------------------------------------------------------------------
// Recording fake
// ---------------------------------------------------------------------------
