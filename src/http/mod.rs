//! # http: the REST surface
//!
//! Three routes under `/api/v1.0`: `health`, `print` and `merge`. Handlers
//! only decode fields and encode responses; everything else is delegated to
//! [`PrintService`].

pub mod auth;
pub mod error;
pub mod fields;
pub mod health;
pub mod merge;
pub mod print;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::{middleware, web, App};
use print_rest_core::config::ServiceConfig;
use print_rest_core::PrintService;

/// Shared by every handler through `web::Data`.
pub struct AppState {
    pub service: Arc<PrintService>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(service: PrintService, config: ServiceConfig) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
        }
    }
}

/// Builds the application. Called once per server worker.
pub fn build_app(
    state: web::Data<AppState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let limit = state.config.max_upload_size;
    let cors = cors(&state.config);
    let cors_enabled = state.config.cors_enabled;

    App::new()
        .app_data(state)
        .app_data(web::FormConfig::default().limit(limit))
        .app_data(web::PayloadConfig::new(limit))
        .wrap(middleware::Condition::new(cors_enabled, cors))
        .wrap(middleware::Logger::default())
        .service(
            web::scope("/api/v1.0")
                .route("/health", web::get().to(health::health))
                .route("/print", web::post().to(print::print))
                .route("/merge", web::post().to(merge::merge)),
        )
}

fn cors(config: &ServiceConfig) -> Cors {
    let base = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .expose_headers([header::CONTENT_DISPOSITION]);
    let origins = config.cors_origins.trim();
    if origins.is_empty() || origins == "*" {
        return base.allow_any_origin();
    }
    origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .fold(base, |cors, origin| cors.allowed_origin(origin))
}
