//! Decodes query string plus multipart or url-encoded body into the
//! transport-neutral [`RequestFields`] the core works with.

use actix_multipart::Multipart;
use actix_web::dev::Payload;
use actix_web::http::StatusCode;
use actix_web::{web, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, LocalBoxFuture};
use futures::StreamExt;
use print_rest_core::request::{RequestFields, UploadedFile};
use tracing::debug;

use super::error::ApiError;
use super::AppState;

const MULTIPART: &str = "multipart/form-data";
const URL_ENCODED: &str = "application/x-www-form-urlencoded";

pub struct FormFields(pub RequestFields);

impl FromRequest for FormFields {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let mut fields = RequestFields::new();
        match web::Query::<Vec<(String, String)>>::from_query(req.query_string()) {
            Ok(query) => {
                for (name, value) in query.into_inner() {
                    fields.push_query(name, value);
                }
            }
            Err(e) => {
                return Box::pin(ready(Err(ApiError::BadRequest(format!(
                    "Malformed query string: {e}"
                )))))
            }
        }

        let limit = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.config.max_upload_size)
            .unwrap_or(usize::MAX);
        let content_type = req.content_type().to_ascii_lowercase();

        if content_type == MULTIPART {
            let multipart = Multipart::new(req.headers(), payload.take());
            Box::pin(async move { read_multipart(multipart, fields, limit).await.map(FormFields) })
        } else if content_type == URL_ENCODED {
            let form = web::Form::<Vec<(String, String)>>::from_request(req, payload);
            Box::pin(async move {
                let form = form.await.map_err(|e| {
                    if e.as_response_error().status_code() == StatusCode::PAYLOAD_TOO_LARGE {
                        ApiError::PayloadTooLarge(limit)
                    } else {
                        ApiError::BadRequest(format!("Malformed form body: {e}"))
                    }
                })?;
                for (name, value) in form.into_inner() {
                    fields.push_form(name, value);
                }
                Ok(FormFields(fields))
            })
        } else {
            Box::pin(ready(Ok(FormFields(fields))))
        }
    }
}

/// Parts with a file name become uploads; all other parts are text fields.
async fn read_multipart(
    mut multipart: Multipart,
    mut fields: RequestFields,
    limit: usize,
) -> Result<RequestFields, ApiError> {
    let mut total = 0usize;
    while let Some(field) = multipart.next().await {
        let mut field = field.map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?;
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content_type = field.content_type().map(|mime| mime.essence_str().to_string());

        let mut content = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?;
            total += chunk.len();
            if total > limit {
                return Err(ApiError::PayloadTooLarge(limit));
            }
            content.extend_from_slice(&chunk);
        }

        match file_name {
            // An empty file input.
            Some(file_name) if file_name.is_empty() && content.is_empty() => {}
            Some(file_name) => fields.push_file(
                name,
                UploadedFile {
                    file_name: Some(file_name),
                    content_type,
                    content,
                },
            ),
            None => fields.push_form(name, String::from_utf8_lossy(&content).into_owned()),
        }
    }
    debug!(bytes = total, "Read multipart body");
    Ok(fields)
}
