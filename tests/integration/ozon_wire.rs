//! Ozon HTTP contract against a local stand-in server.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use ozon_report_bot::marketplace::ozon::OzonClient;
use ozon_report_bot::marketplace::{MarketplaceClient, OrderSource};
use ozon_report_bot::normalizer::ProductNameNormalizer;
use ozon_report_bot::report::ReportAggregator;
use ozon_report_bot::settings::memory::InMemorySettingsStore;
use ozon_report_bot::types::{OrderFilter, OrderStatus, PricingConfig, ReportError, SourceError};

const USER: i64 = 7;

#[derive(Default)]
struct Recorded {
    bodies: Vec<Value>,
    headers: Vec<(String, String)>,
}

type Shared = Arc<Mutex<Recorded>>;

/// Serves two postings on the first page, then an empty page.
async fn fbo_list(State(rec): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    {
        let mut rec = rec.lock().unwrap();
        rec.headers.push((header("client-id"), header("api-key")));
        rec.bodies.push(body.clone());
    }

    if header("api-key") != "good-key" {
        return (StatusCode::FORBIDDEN, Json(json!({"code": 7, "message": "Invalid Api-Key"})));
    }

    let result = if body["offset"] == 0 {
        json!([
            {
                "order_id": 1001,
                "posting_number": "1001-0001-1",
                "status": "delivered",
                "products": [
                    {"sku": 1, "name": "Получешки Colibri Zebra", "quantity": 2,
                     "offer_id": "z", "price": "1290.5000", "currency_code": "RUB"}
                ]
            },
            {
                "order_id": 1002,
                "posting_number": "1002-0001-1",
                "status": "cancelled",
                "products": [
                    {"sku": 2, "name": "Tiger", "quantity": 1, "price": 300, "currency_code": "RUB"}
                ]
            }
        ])
    } else {
        json!([])
    };
    (StatusCode::OK, Json(json!({ "result": result })))
}

async fn actions(headers: HeaderMap) -> StatusCode {
    match headers.get("api-key").and_then(|v| v.to_str().ok()) {
        Some("good-key") => StatusCode::OK,
        _ => StatusCode::FORBIDDEN,
    }
}

async fn spawn_server() -> (String, Shared) {
    let rec: Shared = Arc::default();
    let app = Router::new()
        .route("/v2/posting/fbo/list", post(fbo_list))
        .route("/v1/actions", get(actions))
        .route("/broken/v2/posting/fbo/list", post(|| async { "{\"result\": 5}" }))
        .with_state(rec.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), rec)
}

fn seller(api_key: &str) -> Arc<InMemorySettingsStore> {
    Arc::new(InMemorySettingsStore::with_seller(
        USER,
        "100500",
        api_key,
        PricingConfig {
            commission_percent: dec!(10),
            groups: Vec::new(),
        },
    ))
}

fn filter() -> OrderFilter {
    OrderFilter::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 6, 2, 20, 0, 0).unwrap(),
    )
}

#[tokio::test]
async fn test_request_shape_and_parsing() {
    let (base, rec) = spawn_server().await;
    let client = OzonClient::new(&format!("{base}/"), seller("good-key")).unwrap();

    let orders = client.list_orders(USER, &filter(), 1000, 0).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].id, "1001-0001-1");
    assert_eq!(orders[0].line_items[0].unit_price, dec!(1290.5));
    assert_eq!(orders[0].line_items[0].quantity, 2);
    assert_eq!(orders[1].status, OrderStatus::Cancelled);
    assert_eq!(orders[1].line_items[0].unit_price, dec!(300));

    let rec = rec.lock().unwrap();
    assert_eq!(rec.headers[0], ("100500".to_string(), "good-key".to_string()));
    let body = &rec.bodies[0];
    assert_eq!(body["dir"], "ASC");
    assert_eq!(body["filter"]["since"], "2024-06-01T20:00:00Z");
    assert_eq!(body["filter"]["to"], "2024-06-02T20:00:00Z");
    assert!(body["filter"].get("status").is_none());
    assert_eq!(body["limit"], 1000);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["translit"], false);
    assert_eq!(body["with"]["financial_data"], false);
}

#[tokio::test]
async fn test_full_report_over_http() {
    let (base, rec) = spawn_server().await;
    let store = seller("good-key");
    let client = OzonClient::new(&base, store.clone()).unwrap();
    let aggregator = ReportAggregator::new(
        store,
        MarketplaceClient::new(Arc::new(client)),
        ProductNameNormalizer::default(),
    );

    let report = aggregator.build_report(USER, &filter()).await.unwrap();
    assert_eq!(report.total_quantity, 3);
    assert_eq!(report.cancelled_quantity, 1);
    assert_eq!(report.gross_revenue, dec!(1290.5));
    assert_eq!(report.net_of_commission, dec!(1161.45));
    assert_eq!(report.per_product_quantity.get("Zebra"), Some(&2));

    let offsets: Vec<Value> = rec.lock().unwrap().bodies.iter().map(|b| b["offset"].clone()).collect();
    assert_eq!(offsets, vec![json!(0), json!(1000)]);
}

#[tokio::test]
async fn test_rejected_credentials() {
    let (base, _) = spawn_server().await;
    let store = seller("bad-key");
    let client = OzonClient::new(&base, store.clone()).unwrap();

    match client.list_orders(USER, &filter(), 1000, 0).await {
        Err(SourceError::Status { status, body }) => {
            assert_eq!(status, 403);
            assert!(body.contains("Invalid Api-Key"));
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let aggregator = ReportAggregator::new(
        store,
        MarketplaceClient::new(Arc::new(client)),
        ProductNameNormalizer::default(),
    );
    let err = aggregator.build_report(USER, &filter()).await.unwrap_err();
    assert!(matches!(err, ReportError::UpstreamFetchFailed { offset: 0, .. }));
}

#[tokio::test]
async fn test_malformed_response() {
    let (base, _) = spawn_server().await;
    let client = OzonClient::new(&format!("{base}/broken"), seller("good-key")).unwrap();

    let err = client.list_orders(USER, &filter(), 1000, 0).await.unwrap_err();
    assert!(matches!(err, SourceError::Malformed(_)));
}

#[tokio::test]
async fn test_missing_credentials_never_call_out() {
    let (base, rec) = spawn_server().await;
    let client = OzonClient::new(&base, Arc::new(InMemorySettingsStore::new())).unwrap();

    let err = client.list_orders(USER, &filter(), 1000, 0).await.unwrap_err();
    assert!(matches!(err, SourceError::MissingCredentials(USER)));
    assert!(rec.lock().unwrap().bodies.is_empty());
}

#[tokio::test]
async fn test_connection_check() {
    let (base, _) = spawn_server().await;

    let ok = OzonClient::new(&base, seller("good-key")).unwrap();
    assert_eq!(ok.check_connection(USER).await.unwrap(), "200 OK");

    let denied = OzonClient::new(&base, seller("bad-key")).unwrap();
    assert_eq!(denied.check_connection(USER).await.unwrap(), "403 Forbidden");
}
