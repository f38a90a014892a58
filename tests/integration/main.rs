//! Integration tests: report pipeline against a mock marketplace and a real
//! SQLite settings store, plus the Ozon HTTP contract against a local server.

mod mock_marketplace;
mod ozon_wire;
mod report_pipeline;
