//! Mock marketplace for integration testing.
//!
//! Serves a fixed order list through `OrderSource`, honouring `limit` and
//! `offset` the way the real API does, and records every call.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ozon_report_bot::marketplace::OrderSource;
use ozon_report_bot::types::{LineItem, Order, OrderFilter, OrderStatus, SourceError, UserId};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub user_id: UserId,
    pub filter: OrderFilter,
    pub limit: u64,
    pub offset: u64,
}

/// A deterministic marketplace. Each user has their own order list.
#[derive(Default)]
pub struct MockMarketplace {
    orders: Mutex<HashMap<UserId, Vec<Order>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    /// Fail any call at or past this offset.
    fail_from_offset: Mutex<Option<u64>>,
}

impl MockMarketplace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_orders(&self, user_id: UserId, orders: Vec<Order>) {
        self.orders.lock().unwrap().insert(user_id, orders);
    }

    pub fn fail_from_offset(&self, offset: u64) {
        *self.fail_from_offset.lock().unwrap() = Some(offset);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, user_id: UserId) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.user_id == user_id)
            .collect()
    }
}

#[async_trait]
impl OrderSource for MockMarketplace {
    async fn list_orders(
        &self,
        user_id: UserId,
        filter: &OrderFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Order>, SourceError> {
        self.calls.lock().unwrap().push(RecordedCall {
            user_id,
            filter: filter.clone(),
            limit,
            offset,
        });
        if let Some(fail) = *self.fail_from_offset.lock().unwrap() {
            if offset >= fail {
                return Err(SourceError::Status {
                    status: 503,
                    body: "service unavailable".into(),
                });
            }
        }
        let orders = self.orders.lock().unwrap();
        let Some(all) = orders.get(&user_id) else {
            return Err(SourceError::MissingCredentials(user_id));
        };
        Ok(all
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn check_connection(&self, _user_id: UserId) -> Result<String, SourceError> {
        Ok("200 OK".into())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// `count` delivered single-item orders of `product`, priced 1 each.
pub fn uniform_orders(count: usize, product: &str) -> Vec<Order> {
    (0..count)
        .map(|i| Order {
            id: format!("{product}-{i}"),
            status: OrderStatus::Delivered,
            line_items: vec![LineItem {
                product_name: product.to_string(),
                quantity: 1,
                unit_price: Decimal::ONE,
            }],
        })
        .collect()
}

pub fn order(id: &str, status: OrderStatus, items: &[(&str, u64, Decimal)]) -> Order {
    Order {
        id: id.to_string(),
        status,
        line_items: items
            .iter()
            .map(|(name, quantity, price)| LineItem {
                product_name: name.to_string(),
                quantity: *quantity,
                unit_price: *price,
            })
            .collect(),
    }
}
