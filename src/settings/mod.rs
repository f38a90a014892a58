//! Per-user settings persistence.
//!
//! Defines the `SettingsStore` capability consulted by the report pipeline
//! and written by the settings workflow. Two implementations:
//! - [`sqlite::SqliteSettingsStore`]: durable storage via sqlx
//! - [`memory::InMemorySettingsStore`]: process-local, used in tests
//!
//! Writes are per field and last-write-wins. In particular, a report run
//! registering new product groups can interleave with a concurrent report
//! or purchase-price edit for the same user; no cross-call isolation is
//! provided.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{OzonCredentials, PricingConfig, SettingsError, UserId};

/// Abstraction over the settings store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Create an empty settings record for the user if none exists.
    async fn register_user(&self, user_id: UserId) -> Result<(), SettingsError>;

    /// Commission and product groups, or `None` for an unknown user.
    async fn get_pricing_config(
        &self,
        user_id: UserId,
    ) -> Result<Option<PricingConfig>, SettingsError>;

    /// Add a product group with purchase price 0. No-op if it exists.
    async fn upsert_product_group(&self, user_id: UserId, name: &str) -> Result<(), SettingsError>;

    /// Marketplace credentials, or `None` unless both parts are set.
    async fn get_credentials(
        &self,
        user_id: UserId,
    ) -> Result<Option<OzonCredentials>, SettingsError>;

    async fn set_client_id(&self, user_id: UserId, client_id: &str) -> Result<(), SettingsError>;

    async fn set_api_key(&self, user_id: UserId, api_key: &str) -> Result<(), SettingsError>;

    async fn set_commission_percent(
        &self,
        user_id: UserId,
        percent: Decimal,
    ) -> Result<(), SettingsError>;

    /// Update a group's purchase price. Returns `false` if the group is unknown.
    async fn set_purchase_price(
        &self,
        user_id: UserId,
        name: &str,
        price: Decimal,
    ) -> Result<bool, SettingsError>;
}
