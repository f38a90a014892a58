//! Marketplace order retrieval.
//!
//! Defines the `OrderSource` trait (one page of orders per call) and the
//! `MarketplaceClient` that pages through a source until it is exhausted.
//! The Ozon Seller API implementation lives in [`ozon`].

pub mod ozon;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::types::{Order, OrderFilter, ReportError, SourceError, UserId};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Orders requested per page.
pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// Upper bound on page requests per fetch, including the final empty page.
pub const DEFAULT_MAX_PAGES: u64 = 500;

// ---------------------------------------------------------------------------
// OrderSource
// ---------------------------------------------------------------------------

/// Abstraction over an order-list endpoint.
///
/// Implementors perform exactly one remote call per `list_orders`.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Fetch one page of orders for `user_id`.
    async fn list_orders(
        &self,
        user_id: UserId,
        filter: &OrderFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Order>, SourceError>;

    /// Probe the API with the user's credentials and return the HTTP
    /// status line.
    async fn check_connection(&self, user_id: UserId) -> Result<String, SourceError>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// MarketplaceClient
// ---------------------------------------------------------------------------

/// Pages through an `OrderSource` and returns every order in the window.
#[derive(Clone)]
pub struct MarketplaceClient {
    source: Arc<dyn OrderSource>,
    page_size: u64,
    max_pages: u64,
}

impl MarketplaceClient {
    pub fn new(source: Arc<dyn OrderSource>) -> Self {
        Self::with_limits(source, DEFAULT_PAGE_SIZE, DEFAULT_MAX_PAGES)
    }

    pub fn with_limits(source: Arc<dyn OrderSource>, page_size: u64, max_pages: u64) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
        }
    }

    pub fn source(&self) -> &Arc<dyn OrderSource> {
        &self.source
    }

    /// Fetch all orders matching `filter`.
    ///
    /// Offsets start at 0 and grow by the page size; the first empty page
    /// ends the fetch. Any failing page fails the whole fetch, so callers
    /// never see a partial order list.
    pub async fn fetch_orders(
        &self,
        user_id: UserId,
        filter: &OrderFilter,
    ) -> Result<Vec<Order>, ReportError> {
        let mut orders = Vec::new();
        let mut offset = 0u64;

        for page in 0..self.max_pages {
            let batch = self
                .source
                .list_orders(user_id, filter, self.page_size, offset)
                .await
                .map_err(|e| ReportError::from_source(e, user_id, filter, offset))?;

            debug!(
                source = self.source.name(),
                user_id,
                page,
                offset,
                received = batch.len(),
                "Order page fetched"
            );

            if batch.is_empty() {
                info!(
                    source = self.source.name(),
                    user_id,
                    pages = page + 1,
                    orders = orders.len(),
                    "Order fetch complete"
                );
                return Ok(orders);
            }

            orders.extend(batch);
            offset += self.page_size;
        }

        warn!(
            source = self.source.name(),
            user_id,
            max_pages = self.max_pages,
            fetched = orders.len(),
            "Order fetch hit the page limit"
        );
        Err(ReportError::PageLimitExceeded {
            filter: filter.to_string(),
            max_pages: self.max_pages,
        })
    }
}

// ---------------------------------------------------------------------------
// Scripted source for unit tests
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
