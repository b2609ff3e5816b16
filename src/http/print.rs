use actix_web::http::header;
use actix_web::{web, HttpResponse};
use print_rest_core::request::PrintRequest;
use tracing::info;

use super::auth::Authenticated;
use super::error::ApiError;
use super::fields::FormFields;
use super::AppState;

/// `POST /api/v1.0/print`
pub async fn print(
    _auth: Authenticated,
    state: web::Data<AppState>,
    FormFields(fields): FormFields,
) -> Result<HttpResponse, ApiError> {
    let request = PrintRequest::from_fields(&fields)?;
    let document = state.service.print(request).await?;

    info!(
        bytes = document.content.len(),
        content_type = document.content_type(),
        "Serving printed document"
    );
    Ok(HttpResponse::Ok()
        .content_type(document.content_type())
        .insert_header((header::CONTENT_DISPOSITION, document.content_disposition()))
        .body(document.content))
}
