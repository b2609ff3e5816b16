use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use print_rest_core::PrintError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Everything a handler can fail with, rendered as `{"message": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing or invalid API key")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("Request body exceeds the limit of {0} bytes")]
    PayloadTooLarge(usize),
    #[error(transparent)]
    Print(#[from] PrintError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Print(err) => {
                StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }
        HttpResponse::build(status).json(json!({ "message": self.to_string() }))
    }
}
