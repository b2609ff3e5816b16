use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use print_rest_core::config::ServiceConfig;
use tracing::warn;

use super::error::ApiError;
use super::AppState;

/// Header carrying the API key. Header names are case-insensitive.
pub const API_KEY_HEADER: &str = "x_api_key";

/// True when no key is configured or the request presents the configured key.
pub fn is_authenticated(req: &HttpRequest, config: &ServiceConfig) -> bool {
    match &config.api_key {
        None => true,
        Some(expected) => req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|presented| presented == expected),
    }
}

/// Extractor that rejects the request with 401 unless it is authenticated.
/// List it first among a handler's arguments so the body is never read for
/// rejected requests.
pub struct Authenticated;

impl FromRequest for Authenticated {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let authenticated = req
            .app_data::<web::Data<AppState>>()
            .is_some_and(|state| is_authenticated(req, &state.config));
        if authenticated {
            ready(Ok(Authenticated))
        } else {
            warn!(path = req.path(), "Rejected request without a valid API key");
            ready(Err(ApiError::Unauthorized))
        }
    }
}
