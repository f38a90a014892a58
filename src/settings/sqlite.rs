//! SQLite settings store.
//!
//! Two tables: `sellers` (one row per user: credentials and commission)
//! and `product_groups` (one row per user and group, ordered by first
//! insertion). Decimals are stored as TEXT to keep them exact.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

use super::SettingsStore;
use crate::types::{OzonCredentials, PricingConfig, ProductGroup, SettingsError, UserId};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sellers (
        user_id INTEGER PRIMARY KEY,
        client_id TEXT,
        api_key TEXT,
        commission_percent TEXT NOT NULL DEFAULT '0'
    )",
    "CREATE TABLE IF NOT EXISTS product_groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        purchase_price TEXT NOT NULL DEFAULT '0',
        UNIQUE (user_id, name)
    )",
];

/// Settings persisted in SQLite.
#[derive(Debug, Clone)]
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Open (creating if missing) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {url}"))?
            .create_if_missing(true);

        // An in-memory database lives only as long as its connection.
        let in_memory = url.contains(":memory:");
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await
        }
        .with_context(|| format!("Failed to open settings database: {url}"))?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url, "Settings database ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply settings schema")?;
        }
        Ok(())
    }
}

fn parse_decimal(raw: &str, what: &str) -> Result<Decimal, SettingsError> {
    Decimal::from_str(raw)
        .map_err(|e| SettingsError::InvalidValue(format!("{what} '{raw}': {e}")))
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn register_user(&self, user_id: UserId) -> Result<(), SettingsError> {
        sqlx::query("INSERT INTO sellers (user_id) VALUES (?) ON CONFLICT(user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_pricing_config(
        &self,
        user_id: UserId,
    ) -> Result<Option<PricingConfig>, SettingsError> {
        let Some(row) = sqlx::query("SELECT commission_percent FROM sellers WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let commission: String = row.try_get("commission_percent")?;

        let rows = sqlx::query(
            "SELECT name, purchase_price FROM product_groups WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name")?;
            let price: String = row.try_get("purchase_price")?;
            groups.push(ProductGroup {
                purchase_price: parse_decimal(&price, "purchase price")?,
                name,
            });
        }

        Ok(Some(PricingConfig {
            commission_percent: parse_decimal(&commission, "commission percent")?,
            groups,
        }))
    }

    async fn upsert_product_group(&self, user_id: UserId, name: &str) -> Result<(), SettingsError> {
        self.register_user(user_id).await?;
        let result = sqlx::query(
            "INSERT INTO product_groups (user_id, name, purchase_price) VALUES (?, ?, '0')
             ON CONFLICT(user_id, name) DO NOTHING",
        )
        .bind(user_id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            debug!(user_id, group = name, "Product group registered");
        }
        Ok(())
    }

    async fn get_credentials(
        &self,
        user_id: UserId,
    ) -> Result<Option<OzonCredentials>, SettingsError> {
        let row = sqlx::query("SELECT client_id, api_key FROM sellers WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let client_id: Option<String> = row.try_get("client_id")?;
        let api_key: Option<String> = row.try_get("api_key")?;
        match (client_id, api_key) {
            (Some(client_id), Some(api_key)) if !client_id.is_empty() && !api_key.is_empty() => {
                Ok(Some(OzonCredentials {
                    client_id,
                    api_key: SecretString::new(api_key),
                }))
            }
            _ => Ok(None),
        }
    }

    async fn set_client_id(&self, user_id: UserId, client_id: &str) -> Result<(), SettingsError> {
        sqlx::query(
            "INSERT INTO sellers (user_id, client_id) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET client_id = excluded.client_id",
        )
        .bind(user_id)
        .bind(client_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_api_key(&self, user_id: UserId, api_key: &str) -> Result<(), SettingsError> {
        sqlx::query(
            "INSERT INTO sellers (user_id, api_key) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET api_key = excluded.api_key",
        )
        .bind(user_id)
        .bind(api_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_commission_percent(
        &self,
        user_id: UserId,
        percent: Decimal,
    ) -> Result<(), SettingsError> {
        sqlx::query(
            "INSERT INTO sellers (user_id, commission_percent) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET commission_percent = excluded.commission_percent",
        )
        .bind(user_id)
        .bind(percent.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_purchase_price(
        &self,
        user_id: UserId,
        name: &str,
        price: Decimal,
    ) -> Result<bool, SettingsError> {
        let result = sqlx::query(
            "UPDATE product_groups SET purchase_price = ? WHERE user_id = ? AND name = ?",
        )
        .bind(price.to_string())
        .bind(user_id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
