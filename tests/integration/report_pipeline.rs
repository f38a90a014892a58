//! End-to-end report pipeline: SQLite settings + mock marketplace.

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;

use ozon_report_bot::marketplace::MarketplaceClient;
use ozon_report_bot::normalizer::ProductNameNormalizer;
use ozon_report_bot::report::formatter::format_report;
use ozon_report_bot::report::period::ReportPeriod;
use ozon_report_bot::report::ReportAggregator;
use ozon_report_bot::settings::sqlite::SqliteSettingsStore;
use ozon_report_bot::settings::SettingsStore;
use ozon_report_bot::types::{OrderFilter, OrderStatus, ReportError, UserId};

use crate::mock_marketplace::{order, uniform_orders, MockMarketplace};

async fn setup() -> (Arc<SqliteSettingsStore>, Arc<MockMarketplace>, ReportAggregator) {
    let store = Arc::new(SqliteSettingsStore::connect("sqlite::memory:").await.unwrap());
    let market = Arc::new(MockMarketplace::new());
    let aggregator = ReportAggregator::new(
        store.clone(),
        MarketplaceClient::new(market.clone()),
        ProductNameNormalizer::default(),
    );
    (store, market, aggregator)
}

async fn configure(store: &SqliteSettingsStore, user_id: UserId, commission: rust_decimal::Decimal) {
    store.register_user(user_id).await.unwrap();
    store.set_client_id(user_id, "100500").await.unwrap();
    store.set_api_key(user_id, "key").await.unwrap();
    store.set_commission_percent(user_id, commission).await.unwrap();
}

fn today() -> OrderFilter {
    let now = Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap();
    ReportPeriod::Today.to_filter(now, 4).unwrap()
}

#[tokio::test]
async fn test_pages_until_empty() {
    let (store, market, aggregator) = setup().await;
    configure(&store, 1, dec!(0)).await;
    market.set_orders(1, uniform_orders(2003, "Widget"));

    let report = aggregator.build_report(1, &today()).await.unwrap();

    let offsets: Vec<u64> = market.calls().iter().map(|c| c.offset).collect();
    assert_eq!(offsets, vec![0, 1000, 2000, 3000]);
    assert!(market.calls().iter().all(|c| c.limit == 1000 && c.filter == today()));
    assert_eq!(report.total_quantity, 2003);
    assert_eq!(report.gross_revenue, dec!(2003));
}

#[tokio::test]
async fn test_report_and_group_discovery() {
    let (store, market, aggregator) = setup().await;
    configure(&store, 1, dec!(27)).await;
    store.upsert_product_group(1, "Zebra").await.unwrap();
    store.set_purchase_price(1, "Zebra", dec!(200)).await.unwrap();

    market.set_orders(
        1,
        vec![
            order("a", OrderStatus::Delivered, &[("Получешки Colibri Zebra", 2, dec!(1000))]),
            order("b", OrderStatus::Cancelled, &[("Полупальцы Colibri Tiger", 1, dec!(500))]),
            order("c", OrderStatus::AwaitingPackaging, &[]),
        ],
    );

    let report = aggregator.build_report(1, &today()).await.unwrap();
    assert_eq!(report.total_quantity, 3);
    assert_eq!(report.cancelled_quantity, 1);
    assert_eq!(report.net_of_commission, dec!(730));
    assert_eq!(report.net_of_commission_and_cost, dec!(530));

    // Tiger was only seen on a cancelled order but is still registered.
    let cfg = store.get_pricing_config(1).await.unwrap().unwrap();
    let names: Vec<&str> = cfg.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["Zebra", "Tiger"]);

    let text = format_report(&report);
    assert!(text.contains("<b>Итого доход: 530.00</b>"));
    assert!(text.contains("<i>Tiger: <b>1</b></i>"));
}

#[tokio::test]
async fn test_unknown_user_gets_empty_report() {
    let (_store, market, aggregator) = setup().await;
    market.set_orders(9, uniform_orders(5, "Widget"));

    let report = aggregator.build_report(9, &today()).await.unwrap();
    assert!(report.is_empty());
    assert!(market.calls().is_empty());
}

#[tokio::test]
async fn test_failure_after_first_page_is_not_partial() {
    let (store, market, aggregator) = setup().await;
    configure(&store, 1, dec!(10)).await;
    market.set_orders(1, uniform_orders(1500, "Widget"));
    market.fail_from_offset(1000);

    let err = aggregator.build_report(1, &today()).await.unwrap_err();
    match err {
        ReportError::UpstreamFetchFailed { offset, message, .. } => {
            assert_eq!(offset, 1000);
            assert!(message.contains("503"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_page_limit() {
    let (store, market, _) = setup().await;
    configure(&store, 1, dec!(0)).await;
    market.set_orders(1, uniform_orders(50, "Widget"));
    let aggregator = ReportAggregator::new(
        store.clone(),
        MarketplaceClient::with_limits(market.clone(), 10, 3),
        ProductNameNormalizer::default(),
    );

    let err = aggregator.build_report(1, &today()).await.unwrap_err();
    assert!(matches!(err, ReportError::PageLimitExceeded { max_pages: 3, .. }));
    assert_eq!(market.calls().len(), 3);
}

#[tokio::test]
async fn test_concurrent_reports_are_independent() {
    let (store, market, aggregator) = setup().await;
    for user in 1..=4 {
        configure(&store, user, dec!(0)).await;
        market.set_orders(user, uniform_orders(user as usize * 700, &format!("P{user}")));
    }
    let now = Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap();
    let yesterday = ReportPeriod::Yesterday.to_filter(now, 4).unwrap();

    let tasks = (1..=4).map(|user| {
        let aggregator = aggregator.clone();
        let filter = if user % 2 == 0 { today() } else { yesterday.clone() };
        async move { (user, aggregator.build_report(user, &filter).await.unwrap()) }
    });
    let results = futures::future::join_all(tasks).await;

    for (user, report) in results {
        assert_eq!(report.total_quantity, user as u64 * 700);
        assert_eq!(report.per_product_quantity.len(), 1);
        // Every non-empty page plus the terminating empty one.
        let pages = (user as u64 * 700 + 999) / 1000 + 1;
        assert_eq!(market.calls_for(user).len() as u64, pages);
    }
}

#[tokio::test]
async fn test_concurrent_group_upserts_converge() {
    let (store, market, aggregator) = setup().await;
    configure(&store, 1, dec!(0)).await;
    market.set_orders(
        1,
        vec![order("a", OrderStatus::Delivered, &[("Zebra", 1, dec!(1)), ("Tiger", 1, dec!(1))])],
    );

    let runs = (0..5).map(|_| {
        let aggregator = aggregator.clone();
        async move { aggregator.build_report(1, &today()).await }
    });
    for result in futures::future::join_all(runs).await {
        assert_eq!(result.unwrap().total_quantity, 2);
    }

    let cfg = store.get_pricing_config(1).await.unwrap().unwrap();
    assert_eq!(cfg.groups.len(), 2);
}
