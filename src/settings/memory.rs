//! In-memory settings store.

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::SecretString;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::SettingsStore;
use crate::types::{OzonCredentials, PricingConfig, ProductGroup, SettingsError, UserId};

#[derive(Debug, Clone, Default)]
struct SellerRecord {
    client_id: Option<String>,
    api_key: Option<String>,
    pricing: PricingConfig,
}

/// Settings held in a process-local map. Never fails.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    sellers: RwLock<HashMap<UserId, SellerRecord>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with one fully configured seller.
    pub fn with_seller(
        user_id: UserId,
        client_id: &str,
        api_key: &str,
        pricing: PricingConfig,
    ) -> Self {
        let mut sellers = HashMap::new();
        sellers.insert(
            user_id,
            SellerRecord {
                client_id: Some(client_id.to_string()),
                api_key: Some(api_key.to_string()),
                pricing,
            },
        );
        Self {
            sellers: RwLock::new(sellers),
        }
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn register_user(&self, user_id: UserId) -> Result<(), SettingsError> {
        self.sellers.write().await.entry(user_id).or_default();
        Ok(())
    }

    async fn get_pricing_config(
        &self,
        user_id: UserId,
    ) -> Result<Option<PricingConfig>, SettingsError> {
        Ok(self
            .sellers
            .read()
            .await
            .get(&user_id)
            .map(|s| s.pricing.clone()))
    }

    async fn upsert_product_group(&self, user_id: UserId, name: &str) -> Result<(), SettingsError> {
        let mut sellers = self.sellers.write().await;
        let pricing = &mut sellers.entry(user_id).or_default().pricing;
        if !pricing.has_group(name) {
            pricing.groups.push(ProductGroup {
                name: name.to_string(),
                purchase_price: Decimal::ZERO,
            });
        }
        Ok(())
    }

    async fn get_credentials(
        &self,
        user_id: UserId,
    ) -> Result<Option<OzonCredentials>, SettingsError> {
        let sellers = self.sellers.read().await;
        let Some(seller) = sellers.get(&user_id) else {
            return Ok(None);
        };
        match (&seller.client_id, &seller.api_key) {
            (Some(client_id), Some(api_key)) if !client_id.is_empty() && !api_key.is_empty() => {
                Ok(Some(OzonCredentials {
                    client_id: client_id.clone(),
                    api_key: SecretString::new(api_key.clone()),
                }))
            }
            _ => Ok(None),
        }
    }

    async fn set_client_id(&self, user_id: UserId, client_id: &str) -> Result<(), SettingsError> {
        self.sellers.write().await.entry(user_id).or_default().client_id =
            Some(client_id.to_string());
        Ok(())
    }

    async fn set_api_key(&self, user_id: UserId, api_key: &str) -> Result<(), SettingsError> {
        self.sellers.write().await.entry(user_id).or_default().api_key = Some(api_key.to_string());
        Ok(())
    }

    async fn set_commission_percent(
        &self,
        user_id: UserId,
        percent: Decimal,
    ) -> Result<(), SettingsError> {
        self.sellers
            .write()
            .await
            .entry(user_id)
            .or_default()
            .pricing
            .commission_percent = percent;
        Ok(())
    }

    async fn set_purchase_price(
        &self,
        user_id: UserId,
        name: &str,
        price: Decimal,
    ) -> Result<bool, SettingsError> {
        let mut sellers = self.sellers.write().await;
        let group = sellers
            .get_mut(&user_id)
            .and_then(|s| s.pricing.groups.iter_mut().find(|g| g.name == name));
        match group {
            Some(g) => {
                g.purchase_price = price;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
