use actix_web::http::header;
use actix_web::{web, HttpResponse};
use print_rest_core::request::MergeRequest;

use super::auth::Authenticated;
use super::error::ApiError;
use super::fields::FormFields;
use super::AppState;

/// `POST /api/v1.0/merge`
pub async fn merge(
    _auth: Authenticated,
    state: web::Data<AppState>,
    FormFields(fields): FormFields,
) -> Result<HttpResponse, ApiError> {
    let request = MergeRequest::from_fields(&fields, &state.config.upload_extensions)?;
    let merged = state.service.merge(request).await?;
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header((header::CONTENT_DISPOSITION, "attachment; filename=merged.pdf"))
        .body(merged))
}
