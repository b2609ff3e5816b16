mod common;

use actix_web::http::header;
use actix_web::test;
use common::{blank_pdf, config, page_count, state, MultipartBody};
use print_rest::http::build_app;
use print_rest_core::contract::{MockBrowserEngine, MockLayoutEngine};
use tempfile::tempdir;

fn merge_request(body: MultipartBody) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/v1.0/merge")
        .insert_header((header::CONTENT_TYPE, MultipartBody::content_type()))
        .set_payload(body.finish())
}

#[actix_web::test]
async fn test_merge_with_page_grammar() {
    let dir = tempdir().unwrap();
    let app = test::init_service(build_app(state(
        config(dir.path()),
        MockLayoutEngine::new(),
        MockBrowserEngine::new(),
    )))
    .await;

    let body = MultipartBody::new()
        .file("files[]", "a.pdf", "application/pdf", &blank_pdf(5, 100))
        .file("files[]", "b.pdf", "application/pdf", &blank_pdf(2, 200))
        .text("pages", "a.pdf~0:2,4 b.pdf");
    let resp = test::call_service(&app, merge_request(body).to_request()).await;

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "application/pdf");
    assert_eq!(
        resp.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=merged.pdf"
    );
    assert_eq!(page_count(&test::read_body(resp).await), 5);
}

#[actix_web::test]
async fn test_merge_with_json_pages() {
    let dir = tempdir().unwrap();
    let app = test::init_service(build_app(state(
        config(dir.path()),
        MockLayoutEngine::new(),
        MockBrowserEngine::new(),
    )))
    .await;

    let body = MultipartBody::new()
        .file("files[]", "a.pdf", "application/pdf", &blank_pdf(3, 100))
        .file("files[]", "b.pdf", "application/pdf", &blank_pdf(1, 200))
        .text("pages", r#"[{"file": "b.pdf"}, {"file": "a.pdf", "range": "-1"}]"#);
    let resp = test::call_service(&app, merge_request(body).to_request()).await;

    assert_eq!(resp.status(), 200);
    assert_eq!(page_count(&test::read_body(resp).await), 2);
}

#[actix_web::test]
async fn test_merge_rejects_bad_uploads() {
    let dir = tempdir().unwrap();
    let app = test::init_service(build_app(state(
        config(dir.path()),
        MockLayoutEngine::new(),
        MockBrowserEngine::new(),
    )))
    .await;

    let resp = test::call_service(&app, merge_request(MultipartBody::new().text("pages", "")).to_request()).await;
    assert_eq!(resp.status(), 400, "no files");

    let body = MultipartBody::new().file("files[]", "notes.txt", "text/plain", b"hello");
    let resp = test::call_service(&app, merge_request(body).to_request()).await;
    assert_eq!(resp.status(), 400, "disallowed extension");

    let body = MultipartBody::new()
        .file("files[]", "a.pdf", "application/pdf", &blank_pdf(1, 100))
        .file("files[]", "a.png", "image/png", b"png");
    let resp = test::call_service(&app, merge_request(body).to_request()).await;
    assert_eq!(resp.status(), 400, "duplicate base name");
}

#[actix_web::test]
async fn test_merge_with_extreme_page_numbers() {
    let dir = tempdir().unwrap();
    let app = test::init_service(build_app(state(
        config(dir.path()),
        MockLayoutEngine::new(),
        MockBrowserEngine::new(),
    )))
    .await;

    let body = MultipartBody::new()
        .file("files[]", "a.pdf", "application/pdf", &blank_pdf(3, 100))
        .text("pages", "a.pdf~9223372036854775807");
    let resp = test::call_service(&app, merge_request(body).to_request()).await;
    assert_eq!(resp.status(), 400);

    let body = MultipartBody::new()
        .file("files[]", "a.pdf", "application/pdf", &blank_pdf(3, 100))
        .text("pages", "a.pdf~1::9223372036854775807");
    let resp = test::call_service(&app, merge_request(body).to_request()).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(page_count(&test::read_body(resp).await), 1);
}
