mod common;

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::test;
use common::{blank_pdf, config, page_count, state, MultipartBody};
use print_rest::http::build_app;
use print_rest_core::config::ServiceConfig;
use print_rest_core::contract::{BrowserSource, LayoutSource, MockBrowserEngine, MockLayoutEngine};
use print_rest_core::request::OutputMode;
use serde_json::Value;
use tempfile::tempdir;

fn layout_returning_pdf() -> MockLayoutEngine {
    let mut layout = MockLayoutEngine::new();
    layout.expect_render().returning(|_| Ok(blank_pdf(1, 100)));
    layout
}

fn print_request(body: MultipartBody) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/v1.0/print")
        .insert_header((header::CONTENT_TYPE, MultipartBody::content_type()))
        .set_payload(body.finish())
}

async fn message<B: MessageBody>(resp: ServiceResponse<B>) -> String {
    let body: Value = test::read_body_json(resp).await;
    body["message"].as_str().unwrap_or_default().to_string()
}

#[actix_web::test]
async fn test_print_html_upload_returns_pdf() {
    let dir = tempdir().unwrap();
    let mut layout = MockLayoutEngine::new();
    layout
        .expect_render()
        .withf(|job| {
            job.source == LayoutSource::Html("<h1>Invoice</h1>".to_string())
                && job.stylesheets.len() == 1
                && job.output == OutputMode::Pdf
        })
        .times(1)
        .returning(|_| Ok(blank_pdf(2, 100)));
    let app = test::init_service(build_app(state(config(dir.path()), layout, MockBrowserEngine::new()))).await;

    let body = MultipartBody::new()
        .file("html", "index.html", "text/html", b"<h1>Invoice</h1>")
        .text("template", "invoice")
        .text("file_name", "invoice.pdf");
    let resp = test::call_service(&app, print_request(body).to_request()).await;

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "application/pdf");
    assert_eq!(
        resp.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "inline; name=\"invoice\"; filename=\"invoice.pdf\""
    );
    let pdf = test::read_body(resp).await;
    assert_eq!(page_count(&pdf), 2);
}

#[actix_web::test]
async fn test_mode_from_query_string_selects_png() {
    let dir = tempdir().unwrap();
    let mut layout = MockLayoutEngine::new();
    layout
        .expect_render()
        .withf(|job| job.output == OutputMode::Png)
        .returning(|_| Ok(b"\x89PNG\r\n\x1a\nfake".to_vec()));
    let app = test::init_service(build_app(state(config(dir.path()), layout, MockBrowserEngine::new()))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1.0/print?mode=png")
        .insert_header((header::CONTENT_TYPE, MultipartBody::content_type()))
        .set_payload(MultipartBody::new().text("html", "<p>x</p>").finish())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
    assert_eq!(
        resp.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "inline; name=\"document\"; filename=\"document.png\""
    );
}

#[actix_web::test]
async fn test_url_encoded_form_with_wk_driver() {
    let dir = tempdir().unwrap();
    let mut browser = MockBrowserEngine::new();
    browser
        .expect_render()
        .withf(|job| job.source == BrowserSource::Url("https://example.com/".to_string()))
        .returning(|_| Ok(blank_pdf(1, 100)));
    let app = test::init_service(build_app(state(config(dir.path()), MockLayoutEngine::new(), browser))).await;

    let req = test::TestRequest::post()
        .uri("/api/v1.0/print")
        .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload("driver=wk&url=https%3A%2F%2Fexample.com%2F")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_missing_source_is_422() {
    let dir = tempdir().unwrap();
    let app = test::init_service(build_app(state(
        config(dir.path()),
        MockLayoutEngine::new(),
        MockBrowserEngine::new(),
    )))
    .await;

    let resp = test::call_service(&app, print_request(MultipartBody::new().text("template", "invoice")).to_request()).await;

    assert_eq!(resp.status(), 422);
    assert_eq!(
        message(resp).await,
        "Required argument 'html' or 'url' or report is missing."
    );
}

#[actix_web::test]
async fn test_unknown_driver_is_422() {
    let dir = tempdir().unwrap();
    let app = test::init_service(build_app(state(
        config(dir.path()),
        MockLayoutEngine::new(),
        MockBrowserEngine::new(),
    )))
    .await;

    let body = MultipartBody::new().text("html", "<p/>").text("driver", "chrome");
    let resp = test::call_service(&app, print_request(body).to_request()).await;
    assert_eq!(resp.status(), 422);
}

#[actix_web::test]
async fn test_malformed_data_set_is_400() {
    let dir = tempdir().unwrap();
    let app = test::init_service(build_app(state(
        config(dir.path()),
        MockLayoutEngine::new(),
        MockBrowserEngine::new(),
    )))
    .await;

    let body = MultipartBody::new().text("report", "letter.hbs").text("data_set", "[{\"name\":");
    let resp = test::call_service(&app, print_request(body).to_request()).await;
    assert_eq!(resp.status(), 400);

    let body = MultipartBody::new().text("report", "letter.hbs").text("data_set", "[]");
    let resp = test::call_service(&app, print_request(body).to_request()).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_report_batch_is_merged_in_record_order() {
    let dir = tempdir().unwrap();
    let mut layout = MockLayoutEngine::new();
    layout
        .expect_render()
        .times(2)
        .returning(|_| Ok(blank_pdf(1, 100)));
    let app = test::init_service(build_app(state(config(dir.path()), layout, MockBrowserEngine::new()))).await;

    let body = MultipartBody::new()
        .text("report", "letter.hbs")
        .text("data_set", r#"[{"name": "a"}, {"name": "b"}]"#);
    let resp = test::call_service(&app, print_request(body).to_request()).await;

    assert_eq!(resp.status(), 200);
    assert_eq!(page_count(&test::read_body(resp).await), 2);
}

#[actix_web::test]
async fn test_conversion_failure_is_500_with_message() {
    let dir = tempdir().unwrap();
    let mut layout = MockLayoutEngine::new();
    layout.expect_render().returning(|_| {
        Err(print_rest_core::contract::RenderError::Failed {
            status: Some(1),
            stderr: "layout exploded".into(),
        })
    });
    let app = test::init_service(build_app(state(config(dir.path()), layout, MockBrowserEngine::new()))).await;

    let resp = test::call_service(&app, print_request(MultipartBody::new().text("html", "<p/>")).to_request()).await;

    assert_eq!(resp.status(), 500);
    assert!(message(resp).await.contains("layout exploded"));
}

#[actix_web::test]
async fn test_api_key_is_enforced_when_configured() {
    let dir = tempdir().unwrap();
    let config = ServiceConfig {
        api_key: Some("s3cret".to_string()),
        ..config(dir.path())
    };
    let app = test::init_service(build_app(state(config, layout_returning_pdf(), MockBrowserEngine::new()))).await;

    let resp = test::call_service(&app, print_request(MultipartBody::new().text("html", "<p/>")).to_request()).await;
    assert_eq!(resp.status(), 401);

    let resp = test::call_service(
        &app,
        print_request(MultipartBody::new().text("html", "<p/>"))
            .insert_header(("X_API_KEY", "wrong"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 401);

    let resp = test::call_service(
        &app,
        print_request(MultipartBody::new().text("html", "<p/>"))
            .insert_header(("X_API_KEY", "s3cret"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_body_over_limit_is_rejected() {
    let dir = tempdir().unwrap();
    let config = ServiceConfig {
        max_upload_size: 64,
        ..config(dir.path())
    };
    let app = test::init_service(build_app(state(config, MockLayoutEngine::new(), MockBrowserEngine::new()))).await;

    let big = "x".repeat(1024);
    let resp = test::call_service(&app, print_request(MultipartBody::new().text("html", &big)).to_request()).await;
    assert_eq!(resp.status(), 413);
}
