use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use super::auth::is_authenticated;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    #[serde(default)]
    ping: Option<String>,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    /// Milliseconds since the Unix epoch.
    timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pong: Option<String>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    versions: Option<Versions>,
}

#[derive(Debug, Serialize)]
struct Versions {
    service: &'static str,
    weasyprint: Option<String>,
    wkhtmltopdf: Option<String>,
}

/// `GET /api/v1.0/health`. Never requires a key; engine versions are only
/// reported to authenticated callers.
pub async fn health(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<HealthQuery>,
) -> HttpResponse {
    let versions = if is_authenticated(&req, &state.config) {
        let (weasyprint, wkhtmltopdf) = state.service.engine_versions().await;
        Some(Versions {
            service: env!("CARGO_PKG_VERSION"),
            weasyprint,
            wkhtmltopdf,
        })
    } else {
        None
    };

    HttpResponse::Ok().json(Health {
        status: "OK",
        timestamp: chrono::Utc::now().timestamp_millis(),
        pong: query.into_inner().ping.filter(|p| !p.is_empty()),
        versions,
    })
}
