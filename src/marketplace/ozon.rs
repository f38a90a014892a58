//! Ozon Seller API integration (FBO postings).
//!
//! API docs: https://docs.ozon.ru/api/seller/
//! Base URL: https://api-seller.ozon.ru
//! Auth: `Client-Id` and `Api-Key` headers, looked up per user from the
//! settings store on every call.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::OrderSource;
use crate::settings::SettingsStore;
use crate::types::{LineItem, Order, OrderFilter, OrderStatus, OzonCredentials, SourceError, UserId};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api-seller.ozon.ru";
const SOURCE_NAME: &str = "ozon";
const FBO_LIST_PATH: &str = "/v2/posting/fbo/list";
const ACTIONS_PATH: &str = "/v1/actions";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Wire types (Ozon JSON ↔ Rust)
// ---------------------------------------------------------------------------

/// Body of `POST /v2/posting/fbo/list`.
#[derive(Debug, Serialize)]
struct FboListRequest {
    dir: &'static str,
    filter: FboFilter,
    limit: u64,
    offset: u64,
    translit: bool,
    with: FboWith,
}

#[derive(Debug, Serialize)]
struct FboFilter {
    since: String,
    to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct FboWith {
    analytics_data: bool,
    financial_data: bool,
}

impl FboListRequest {
    fn new(filter: &OrderFilter, limit: u64, offset: u64) -> Self {
        Self {
            dir: "ASC",
            filter: FboFilter {
                since: filter.since_rfc3339(),
                to: filter.to_rfc3339(),
                status: filter.status.as_ref().map(|s| s.to_string()),
            },
            limit,
            offset,
            translit: false,
            with: FboWith {
                analytics_data: false,
                financial_data: false,
            },
        }
    }
}

/// Response of `POST /v2/posting/fbo/list`. Only the fields we use.
#[derive(Debug, Deserialize)]
struct FboListResponse {
    result: Vec<FboPosting>,
}

#[derive(Debug, Deserialize)]
struct FboPosting {
    #[serde(default)]
    order_id: i64,
    #[serde(default)]
    posting_number: String,
    status: String,
    #[serde(default)]
    products: Vec<FboProduct>,
}

#[derive(Debug, Deserialize)]
struct FboProduct {
    name: String,
    #[serde(default)]
    quantity: u64,
    /// Sent as a string ("1290.0000"); numbers are accepted too.
    #[serde(default, deserialize_with = "deserialize_price")]
    price: Decimal,
}

/// Parse a price given as a JSON string or number straight into `Decimal`.
fn deserialize_price<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    let raw = match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|e| D::Error::custom(format!("invalid price '{raw}': {e}")))
}

impl FboPosting {
    fn into_order(self) -> Order {
        let id = if self.posting_number.is_empty() {
            self.order_id.to_string()
        } else {
            self.posting_number
        };
        Order {
            id,
            status: OrderStatus::from(self.status),
            line_items: self
                .products
                .into_iter()
                .map(|p| LineItem {
                    product_name: p.name,
                    quantity: p.quantity,
                    unit_price: p.price,
                })
                .collect(),
        }
    }
}

fn parse_orders(body: &[u8]) -> Result<Vec<Order>, SourceError> {
    let parsed: FboListResponse =
        serde_json::from_slice(body).map_err(|e| SourceError::Malformed(e.to_string()))?;
    Ok(parsed.result.into_iter().map(FboPosting::into_order).collect())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Ozon Seller API client.
pub struct OzonClient {
    http: Client,
    base_url: String,
    settings: Arc<dyn SettingsStore>,
}

impl OzonClient {
    /// Create a client against `base_url` (no trailing slash required).
    pub fn new(base_url: &str, settings: Arc<dyn SettingsStore>) -> Result<Self> {
        Self::with_timeout(base_url, settings, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(
        base_url: &str,
        settings: Arc<dyn SettingsStore>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("ozon-report-bot/0.1.0")
            .build()
            .context("Failed to build HTTP client for Ozon")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn credentials(&self, user_id: UserId) -> Result<OzonCredentials, SourceError> {
        self.settings
            .get_credentials(user_id)
            .await
            .map_err(|e| SourceError::CredentialsLookup(e.to_string()))?
            .ok_or(SourceError::MissingCredentials(user_id))
    }
}

#[async_trait]
impl OrderSource for OzonClient {
    async fn list_orders(
        &self,
        user_id: UserId,
        filter: &OrderFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Order>, SourceError> {
        let creds = self.credentials(user_id).await?;
        let url = format!("{}{FBO_LIST_PATH}", self.base_url);
        let body = FboListRequest::new(filter, limit, offset);

        debug!(url = %url, user_id, offset, limit, "Requesting Ozon FBO postings");

        let resp = self
            .http
            .post(&url)
            .header("Client-Id", &creds.client_id)
            .header("Api-Key", creds.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        parse_orders(&bytes)
    }

    async fn check_connection(&self, user_id: UserId) -> Result<String, SourceError> {
        let creds = self.credentials(user_id).await?;
        let resp = self
            .http
            .get(format!("{}{ACTIONS_PATH}", self.base_url))
            .header("Client-Id", &creds.client_id)
            .header("Api-Key", creds.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        Ok(resp.status().to_string())
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
