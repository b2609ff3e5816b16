#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use actix_web::web;
use lopdf::{dictionary, Document, Object};
use print_rest::http::AppState;
use print_rest_core::config::ServiceConfig;
use print_rest_core::contract::{MockBrowserEngine, MockLayoutEngine};
use print_rest_core::{PrintService, TemplateRegistry};

pub const BOUNDARY: &str = "print-rest-test-boundary";

/// A PDF with `pages` empty pages, each `width` points wide.
pub fn blank_pdf(pages: usize, width: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(width),
                    Object::Integer(100),
                ],
            }))
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

pub fn page_count(pdf: &[u8]) -> usize {
    Document::load_mem(pdf).unwrap().get_pages().len()
}

pub fn config(root: &Path) -> ServiceConfig {
    let config = ServiceConfig {
        template_directory: root.join("templates"),
        report_directory: root.join("reports"),
        workspace_directory: root.join("work"),
        ..ServiceConfig::default()
    };
    fs::create_dir_all(config.template_directory.join("invoice")).unwrap();
    fs::write(config.template_directory.join("invoice/style.css"), "h1 { color: red }").unwrap();
    fs::create_dir_all(&config.report_directory).unwrap();
    fs::write(config.report_directory.join("letter.hbs"), "<p>{{name}}</p>").unwrap();
    config
}

/// Application state around mock engines.
pub fn state(
    config: ServiceConfig,
    layout: MockLayoutEngine,
    browser: MockBrowserEngine,
) -> web::Data<AppState> {
    let registry = Arc::new(TemplateRegistry::new(false));
    registry.load(&config.template_directory).unwrap();
    let service = PrintService::with_engines(&config, registry, Arc::new(layout), Arc::new(browser));
    web::Data::new(AppState::new(service, config))
}

/// Minimal `multipart/form-data` encoder.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, content: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}
