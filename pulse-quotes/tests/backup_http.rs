//! HTTP-level tests for the eastmoney adapters against a local mock server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pulse_common::{BackupConfig, SnapshotConfig};
use pulse_quotes::data::{
    EastmoneyQuoteResolver, EastmoneySnapshotSource, Market, ProviderError, QuoteResolver,
    QuoteSource, SnapshotSource, StockIdentifier,
};

const QUOTE_PATH: &str = "/api/qt/stock/get";
const LIST_PATH: &str = "/api/qt/clist/get";

fn backup_config(server: &MockServer) -> BackupConfig {
    BackupConfig {
        endpoint: format!("{}{}", server.uri(), QUOTE_PATH),
        backoff_factor_ms: 10,
        ..Default::default()
    }
}

fn snapshot_config(server: &MockServer) -> SnapshotConfig {
    SnapshotConfig {
        endpoint: format!("{}{}", server.uri(), LIST_PATH),
        ..Default::default()
    }
}

fn inspur_payload() -> serde_json::Value {
    json!({"rc": 0, "data": {"f58": "浪潮信息", "f43": 3250, "f170": 85, "f47": 50000}})
}

fn shenzhen(code: &str) -> StockIdentifier {
    StockIdentifier::new(code, Market::Shenzhen)
}

// ============================================================================
// Backup Resolver
// ============================================================================

#[tokio::test]
async fn test_backup_sends_browser_headers_and_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(QUOTE_PATH))
        .and(header("referer", "https://data.eastmoney.com/"))
        .and(query_param("secid", "0.000977"))
        .and(query_param("ut", "7eea3edcaed734bea9cbfc24409ed989"))
        .and(query_param("invt", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(inspur_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = EastmoneyQuoteResolver::new(&backup_config(&server));
    let quote = resolver.resolve(&shenzhen("000977")).await.unwrap();

    assert_eq!(quote.name, "浪潮信息");
    assert_eq!(quote.price, 32.5);
    assert_eq!(quote.source, QuoteSource::Backup);

    let requests = server.received_requests().await.unwrap();
    let agent = requests[0].headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(agent.contains("Chrome"));
}

#[tokio::test]
async fn test_backup_retries_transient_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(QUOTE_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(QUOTE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(inspur_payload()))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = EastmoneyQuoteResolver::new(&backup_config(&server));
    let quote = resolver.resolve(&shenzhen("000977")).await;

    assert!(quote.is_some());
}

#[tokio::test]
async fn test_backup_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(QUOTE_PATH))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let resolver = EastmoneyQuoteResolver::new(&backup_config(&server));
    assert!(resolver.resolve(&shenzhen("000977")).await.is_none());
}

#[tokio::test]
async fn test_backup_does_not_retry_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(QUOTE_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = EastmoneyQuoteResolver::new(&backup_config(&server));
    assert!(resolver.resolve(&shenzhen("000977")).await.is_none());
}

#[tokio::test]
async fn test_backup_rejects_error_payloads() {
    for body in [
        json!({"rc": 102, "data": null}),
        json!({"rc": 0, "data": null}),
        json!({"rc": 0, "data": {}}),
        json!({"rc": 0, "data": {"f58": "停牌", "f43": "-"}}),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(QUOTE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = EastmoneyQuoteResolver::new(&backup_config(&server));
        assert!(resolver.resolve(&shenzhen("000977")).await.is_none());
    }
}

#[tokio::test]
async fn test_backup_rejects_non_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(QUOTE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>blocked</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let resolver = EastmoneyQuoteResolver::new(&backup_config(&server));
    assert!(resolver.resolve(&shenzhen("000977")).await.is_none());
}

#[tokio::test]
async fn test_backup_times_out_slow_responses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(QUOTE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(inspur_payload())
                .set_delay(Duration::from_secs(2)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let config = BackupConfig {
        timeout_secs: 1,
        ..backup_config(&server)
    };
    let resolver = EastmoneyQuoteResolver::new(&config);
    let start = std::time::Instant::now();

    assert!(resolver.resolve(&shenzhen("000977")).await.is_none());

    // Three attempts, each cut off at the 1s timeout.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_secs(6));
}

// ============================================================================
// Snapshot Source
// ============================================================================

#[tokio::test]
async fn test_snapshot_source_filters_by_market() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("fltt", "2"))
        .and(query_param("fields", "f12,f14,f2,f3,f5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rc": 0,
            "data": {"total": 3, "diff": [
                {"f12": "600133", "f14": "东湖高新", "f2": 10.85, "f3": 1.2, "f5": 120000},
                {"f12": "000977", "f14": "浪潮信息", "f2": 32.5, "f3": 0.85, "f5": 50000},
                {"f12": "300750", "f14": "宁德时代", "f2": 180.1, "f3": -0.4, "f5": 9000}
            ]}
        })))
        .mount(&server)
        .await;

    let source = EastmoneySnapshotSource::new(&snapshot_config(&server));

    let sz = source.fetch_snapshot(Market::Shenzhen).await.unwrap();
    assert_eq!(sz.len(), 2);
    assert_eq!(sz.find("000977").unwrap().name, "浪潮信息");
    assert!(sz.find("600133").is_none());

    let sh = source.fetch_snapshot(Market::Shanghai).await.unwrap();
    assert_eq!(sh.len(), 1);
}

#[tokio::test]
async fn test_snapshot_source_skips_http_for_foreign_markets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let source = EastmoneySnapshotSource::new(&snapshot_config(&server));

    assert!(source.fetch_snapshot(Market::Hk).await.unwrap().is_empty());
    assert!(source.fetch_snapshot(Market::Us).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_snapshot_source_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = EastmoneySnapshotSource::new(&snapshot_config(&server));
    let err = source.fetch_snapshot(Market::Shanghai).await.unwrap_err();

    assert_eq!(err, ProviderError::Status(503));
}

#[tokio::test]
async fn test_snapshot_source_sends_browser_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(header("referer", "https://data.eastmoney.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rc": 0,
            "data": {"total": 1, "diff": [
                {"f12": "600133", "f14": "东湖高新", "f2": 10.85, "f3": 1.2, "f5": 120000}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = EastmoneySnapshotSource::new(&snapshot_config(&server));
    assert_eq!(source.fetch_snapshot(Market::Shanghai).await.unwrap().len(), 1);

    let requests = server.received_requests().await.unwrap();
    let agent = requests[0].headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(agent.contains("Chrome"));
}

#[tokio::test]
async fn test_snapshot_source_pages_until_total() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("pn", "1"))
        .and(query_param("pz", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rc": 0,
            "data": {"total": 5, "diff": [
                {"f12": "600133", "f14": "东湖高新", "f2": 10.85, "f3": 1.2, "f5": 120000},
                {"f12": "000977", "f14": "浪潮信息", "f2": 32.5, "f3": 0.85, "f5": 50000}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("pn", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rc": 0,
            "data": {"total": 5, "diff": [
                {"f12": "600588", "f14": "用友网络", "f2": 12.3, "f3": -0.5, "f5": 88000},
                {"f12": "600000", "f14": "停牌", "f2": "-", "f3": "-", "f5": "-"}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("pn", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rc": 0,
            "data": {"total": 5, "diff": [
                {"f12": "601012", "f14": "隆基绿能", "f2": 18.2, "f3": 0.3, "f5": 70000}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = SnapshotConfig {
        page_size: 2,
        ..snapshot_config(&server)
    };
    let source = EastmoneySnapshotSource::new(&config);

    let sh = source.fetch_snapshot(Market::Shanghai).await.unwrap();
    let codes: Vec<&str> = sh.rows().iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["600133", "600588", "601012"]);
}

#[tokio::test]
async fn test_snapshot_source_stops_when_pages_run_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("pn", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rc": 0,
            "data": {"total": 10, "diff": [
                {"f12": "600133", "f14": "东湖高新", "f2": 10.85, "f3": 1.2, "f5": 120000}
            ]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("pn", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rc": 0, "data": null})))
        .expect(1)
        .mount(&server)
        .await;

    let config = SnapshotConfig {
        page_size: 1,
        ..snapshot_config(&server)
    };
    let source = EastmoneySnapshotSource::new(&config);

    assert_eq!(source.fetch_snapshot(Market::Shanghai).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_snapshot_source_times_out_slow_responses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"rc": 0, "data": {"total": 0, "diff": []}}))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = SnapshotConfig {
        timeout_secs: 1,
        ..snapshot_config(&server)
    };
    let source = EastmoneySnapshotSource::new(&config);

    match source.fetch_snapshot(Market::Shenzhen).await {
        Err(ProviderError::Network(msg)) => assert!(msg.starts_with("timeout")),
        other => panic!("Expected timeout, got {:?}", other),
    }
}
