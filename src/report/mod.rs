//! Report pipeline: orders into a consolidated sales report.
//!
//! Loads the user's pricing configuration, pages through the marketplace,
//! classifies every line item and sums quantities and money. Formatting
//! and report windows live in the submodules.

pub mod formatter;
pub mod period;

use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::marketplace::MarketplaceClient;
use crate::normalizer::ProductNameNormalizer;
use crate::settings::SettingsStore;
use crate::types::{ConsolidatedReport, Order, OrderFilter, PricingConfig, ReportError, UserId};

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Builds consolidated reports. Cheap to clone; holds no per-request state.
#[derive(Clone)]
pub struct ReportAggregator {
    settings: Arc<dyn SettingsStore>,
    marketplace: MarketplaceClient,
    normalizer: ProductNameNormalizer,
}

impl ReportAggregator {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        marketplace: MarketplaceClient,
        normalizer: ProductNameNormalizer,
    ) -> Self {
        Self {
            settings,
            marketplace,
            normalizer,
        }
    }

    pub fn marketplace(&self) -> &MarketplaceClient {
        &self.marketplace
    }

    /// Build the report for `user_id` over `filter`.
    ///
    /// A user without pricing configuration or marketplace credentials
    /// gets an empty report. Fetch failures abort the report; failures to
    /// register new product groups are logged and ignored.
    pub async fn build_report(
        &self,
        user_id: UserId,
        filter: &OrderFilter,
    ) -> Result<ConsolidatedReport, ReportError> {
        let pricing = match self.settings.get_pricing_config(user_id).await {
            Ok(Some(pricing)) => pricing,
            Ok(None) => {
                info!(user_id, "No pricing configuration, returning empty report");
                return Ok(ConsolidatedReport::default());
            }
            Err(e) => {
                warn!(user_id, error = %e, "Pricing configuration unavailable, returning empty report");
                return Ok(ConsolidatedReport::default());
            }
        };

        let orders = match self.marketplace.fetch_orders(user_id, filter).await {
            Ok(orders) => orders,
            Err(ReportError::CredentialsUnavailable { .. }) => {
                info!(user_id, "No marketplace credentials, returning empty report");
                return Ok(ConsolidatedReport::default());
            }
            Err(e) => return Err(e),
        };

        let report = self.summarize(user_id, &pricing, &orders).await;

        info!(
            user_id,
            window = %filter,
            orders = orders.len(),
            items = report.total_quantity,
            cancelled = report.cancelled_quantity,
            gross = %report.gross_revenue,
            "Report built"
        );

        Ok(report)
    }

    /// Classify and sum every line item.
    async fn summarize(
        &self,
        user_id: UserId,
        pricing: &PricingConfig,
        orders: &[Order],
    ) -> ConsolidatedReport {
        let purchase_prices = pricing.purchase_prices();
        let mut known: HashSet<String> = purchase_prices.keys().cloned().collect();
        let mut report = ConsolidatedReport::default();
        let mut purchase_total = Decimal::ZERO;

        for order in orders {
            let cancelled = order.status.is_cancelled();
            for item in &order.line_items {
                let name = self.normalizer.normalize(&item.product_name);

                if !known.contains(&name) {
                    self.register_group(user_id, &name).await;
                    known.insert(name.clone());
                }

                report.total_quantity += item.quantity;

                if cancelled {
                    report.cancelled_quantity += item.quantity;
                    *report
                        .cancelled_per_product_quantity
                        .entry(name)
                        .or_insert(0) += item.quantity;
                } else {
                    report.gross_revenue += item.unit_price;
                    purchase_total += purchase_prices.get(&name).copied().unwrap_or(Decimal::ZERO);
                    *report.per_product_quantity.entry(name).or_insert(0) += item.quantity;
                }
            }
        }

        let (net, income) = net_amounts(
            report.gross_revenue,
            pricing.commission_percent,
            purchase_total,
        );
        report.net_of_commission = net;
        report.net_of_commission_and_cost = income;
        report
    }

    /// Make a newly seen group available for purchase-price configuration.
    async fn register_group(&self, user_id: UserId, name: &str) {
        if let Err(e) = self.settings.upsert_product_group(user_id, name).await {
            let err = ReportError::SettingsUpsertFailed {
                user_id,
                group: name.to_string(),
                message: e.to_string(),
            };
            warn!(error = %err, "Continuing without product group registration");
        }
    }
}

/// Revenue after commission, and after commission and purchase cost.
pub fn net_amounts(
    gross: Decimal,
    commission_percent: Decimal,
    purchase_total: Decimal,
) -> (Decimal, Decimal) {
    let net = gross - commission_percent / Decimal::ONE_HUNDRED * gross;
    (net, net - purchase_total)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
