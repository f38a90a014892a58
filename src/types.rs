//! Shared types for the report bot.
//!
//! These types form the data model used across all modules. Marketplace,
//! settings, report and bot modules depend on them without depending on
//! each other.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Telegram user id. Settings are owned per user.
pub type UserId = i64;

/// Telegram chat id.
pub type ChatId = i64;

// ---------------------------------------------------------------------------
// Order filter
// ---------------------------------------------------------------------------

/// Half-open time window `[since, to)` plus an optional status filter.
///
/// The same filter is sent unchanged on every page of a fetch; only
/// `limit` and `offset` vary between rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub since: DateTime<Utc>,
    pub to: DateTime<Utc>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn new(since: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { since, to, status: None }
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// RFC3339 with a `Z` suffix and second precision, the format the
    /// order API expects.
    pub fn since_rfc3339(&self) -> String {
        self.since.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn to_rfc3339(&self) -> String {
        self.to.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl fmt::Display for OrderFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.since_rfc3339(), self.to_rfc3339())?;
        if let Some(status) = &self.status {
            write!(f, " status={status}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Lifecycle state of a marketplace order.
///
/// Only `Cancelled` changes how the aggregator treats an order; the rest
/// are kept so filters and logs carry the real value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    AwaitingRegistration,
    AcceptanceInProgress,
    AwaitingApprove,
    AwaitingPackaging,
    AwaitingDeliver,
    Arbitration,
    ClientArbitration,
    Delivering,
    DriverPickup,
    Delivered,
    Cancelled,
    NotAccepted,
    SentBySeller,
    /// A status this build does not know about yet.
    Other(String),
}

impl OrderStatus {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrderStatus::Cancelled)
    }

    /// Wire representation used by the order API.
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::AwaitingRegistration => "awaiting_registration",
            OrderStatus::AcceptanceInProgress => "acceptance_in_progress",
            OrderStatus::AwaitingApprove => "awaiting_approve",
            OrderStatus::AwaitingPackaging => "awaiting_packaging",
            OrderStatus::AwaitingDeliver => "awaiting_deliver",
            OrderStatus::Arbitration => "arbitration",
            OrderStatus::ClientArbitration => "client_arbitration",
            OrderStatus::Delivering => "delivering",
            OrderStatus::DriverPickup => "driver_pickup",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::NotAccepted => "not_accepted",
            OrderStatus::SentBySeller => "sent_by_seller",
            OrderStatus::Other(s) => s.as_str(),
        }
    }
}

impl From<&str> for OrderStatus {
    fn from(s: &str) -> Self {
        match s {
            "awaiting_registration" => OrderStatus::AwaitingRegistration,
            "acceptance_in_progress" => OrderStatus::AcceptanceInProgress,
            "awaiting_approve" => OrderStatus::AwaitingApprove,
            "awaiting_packaging" => OrderStatus::AwaitingPackaging,
            "awaiting_deliver" => OrderStatus::AwaitingDeliver,
            "arbitration" => OrderStatus::Arbitration,
            "client_arbitration" => OrderStatus::ClientArbitration,
            "delivering" => OrderStatus::Delivering,
            "driver_pickup" => OrderStatus::DriverPickup,
            "delivered" => OrderStatus::Delivered,
            "cancelled" => OrderStatus::Cancelled,
            "not_accepted" => OrderStatus::NotAccepted,
            "sent_by_seller" => OrderStatus::SentBySeller,
            other => OrderStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        OrderStatus::from(s.as_str())
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One product position inside an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_name: String,
    pub quantity: u64,
    /// Price as reported by the marketplace for this position. Taken as-is
    /// (not multiplied by quantity) when summing revenue.
    pub unit_price: Decimal,
}

/// A marketplace order (FBO posting). Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    pub line_items: Vec<LineItem>,
}

impl Order {
    #[cfg(test)]
    pub fn sample(id: &str, status: OrderStatus, items: &[(&str, u64, Decimal)]) -> Self {
        Order {
            id: id.to_string(),
            status,
            line_items: items
                .iter()
                .map(|(name, qty, price)| LineItem {
                    product_name: name.to_string(),
                    quantity: *qty,
                    unit_price: *price,
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// User settings
// ---------------------------------------------------------------------------

/// A product group and its purchase price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductGroup {
    /// Normalized product name.
    pub name: String,
    pub purchase_price: Decimal,
}

/// Per-user pricing configuration consulted by the aggregator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Marketplace commission, percent of gross revenue.
    pub commission_percent: Decimal,
    /// Product groups in first-seen order.
    pub groups: Vec<ProductGroup>,
}

impl PricingConfig {
    pub fn purchase_price(&self, name: &str) -> Option<Decimal> {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.purchase_price)
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g.name == name)
    }

    /// Name → purchase price lookup table.
    pub fn purchase_prices(&self) -> HashMap<String, Decimal> {
        self.groups
            .iter()
            .map(|g| (g.name.clone(), g.purchase_price))
            .collect()
    }
}

/// Seller API credentials. The api key never appears in `Debug` output.
#[derive(Debug, Clone)]
pub struct OzonCredentials {
    pub client_id: String,
    pub api_key: SecretString,
}

// ---------------------------------------------------------------------------
// Consolidated report
// ---------------------------------------------------------------------------

/// Summary of all orders in one report window.
///
/// `total_quantity` counts every line item regardless of status, so
/// `total_quantity == cancelled_quantity + sum(per_product_quantity)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ConsolidatedReport {
    pub total_quantity: u64,
    pub cancelled_quantity: u64,
    pub gross_revenue: Decimal,
    pub net_of_commission: Decimal,
    pub net_of_commission_and_cost: Decimal,
    pub per_product_quantity: BTreeMap<String, u64>,
    pub cancelled_per_product_quantity: BTreeMap<String, u64>,
}

impl ConsolidatedReport {
    /// Quantity of non-cancelled items.
    pub fn active_quantity(&self) -> u64 {
        self.total_quantity - self.cancelled_quantity
    }

    pub fn is_empty(&self) -> bool {
        self.total_quantity == 0
    }
}

impl fmt::Display for ConsolidatedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "items={} cancelled={} gross={:.2} net={:.2} income={:.2}",
            self.total_quantity,
            self.cancelled_quantity,
            self.gross_revenue,
            self.net_of_commission,
            self.net_of_commission_and_cost,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failure of a single order-list call.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("No marketplace credentials configured for user {0}")]
    MissingCredentials(UserId),

    #[error("Credential lookup failed: {0}")]
    CredentialsLookup(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Order API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed order response: {0}")]
    Malformed(String),
}

/// Failure of the report pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Marketplace credentials unavailable for user {user_id}")]
    CredentialsUnavailable { user_id: UserId },

    #[error("Order fetch failed for {filter} at offset {offset}: {message}")]
    UpstreamFetchFailed {
        filter: String,
        offset: u64,
        message: String,
    },

    #[error("Malformed order response for {filter} at offset {offset}: {message}")]
    UpstreamMalformedResponse {
        filter: String,
        offset: u64,
        message: String,
    },

    #[error("Order fetch for {filter} did not finish within {max_pages} pages")]
    PageLimitExceeded { filter: String, max_pages: u64 },

    #[error("Failed to register product group '{group}' for user {user_id}: {message}")]
    SettingsUpsertFailed {
        user_id: UserId,
        group: String,
        message: String,
    },
}

impl ReportError {
    /// Attach the filter and offset of the failing page to a call error.
    ///
    /// Credentials missing on the first page mean the user is not set up.
    /// Losing them after pages were already fetched is a fetch failure.
    pub fn from_source(err: SourceError, user_id: UserId, filter: &OrderFilter, offset: u64) -> Self {
        match err {
            SourceError::MissingCredentials(_) if offset == 0 => {
                ReportError::CredentialsUnavailable { user_id }
            }
            SourceError::Malformed(message) => ReportError::UpstreamMalformedResponse {
                filter: filter.to_string(),
                offset,
                message,
            },
            other => ReportError::UpstreamFetchFailed {
                filter: filter.to_string(),
                offset,
                message: other.to_string(),
            },
        }
    }
}

/// Settings store failure.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
