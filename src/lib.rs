//! ozon_report_bot: Telegram sales reports for Ozon FBO sellers
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod bot;
pub mod config;
pub mod marketplace;
pub mod normalizer;
pub mod report;
pub mod server;
pub mod settings;
pub mod types;
