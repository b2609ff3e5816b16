mod common;

use actix_web::test;
use common::{config, state};
use print_rest::http::build_app;
use print_rest_core::config::ServiceConfig;
use print_rest_core::contract::{MockBrowserEngine, MockLayoutEngine};
use serde_json::Value;
use tempfile::tempdir;

fn engines() -> (MockLayoutEngine, MockBrowserEngine) {
    let mut layout = MockLayoutEngine::new();
    layout.expect_version().returning(|| Some("WeasyPrint version 62.3".to_string()));
    let mut browser = MockBrowserEngine::new();
    browser.expect_version().returning(|| None);
    (layout, browser)
}

#[actix_web::test]
async fn test_health_reports_status_timestamp_and_pong() {
    let dir = tempdir().unwrap();
    let (layout, browser) = engines();
    let app = test::init_service(build_app(state(config(dir.path()), layout, browser))).await;

    let before = chrono::Utc::now().timestamp_millis();
    let req = test::TestRequest::get().uri("/api/v1.0/health?ping=hello").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let after = chrono::Utc::now().timestamp_millis();

    assert_eq!(body["status"], "OK");
    assert_eq!(body["pong"], "hello");
    let timestamp = body["timestamp"].as_i64().unwrap();
    assert!(before <= timestamp && timestamp <= after);
    // No key configured: every caller counts as authenticated.
    assert_eq!(body["weasyprint"], "WeasyPrint version 62.3");
    assert!(body["wkhtmltopdf"].is_null());
    assert!(body["service"].is_string());
}

#[actix_web::test]
async fn test_health_hides_versions_from_anonymous_callers() {
    let dir = tempdir().unwrap();
    let config = ServiceConfig {
        api_key: Some("k".to_string()),
        ..config(dir.path())
    };
    let (layout, browser) = engines();
    let app = test::init_service(build_app(state(config, layout, browser))).await;

    let req = test::TestRequest::get().uri("/api/v1.0/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "OK");
    assert!(body.get("pong").is_none());
    assert!(body.get("weasyprint").is_none());

    let req = test::TestRequest::get()
        .uri("/api/v1.0/health")
        .insert_header(("X_API_KEY", "k"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["weasyprint"], "WeasyPrint version 62.3");
}
