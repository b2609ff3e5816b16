//! Error taxonomy shared by every pipeline stage.
//!
//! Validation problems carry the HTTP status class they map to (400 for
//! malformed input, 422 for missing or unsupported arguments). Everything
//! else is a server-side failure. Authentication is decided by the HTTP
//! layer and never reaches the core.

use thiserror::Error;

use crate::registry::MetadataError;

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("{message}")]
    Validation { status: u16, message: String },

    #[error("conversion with driver '{driver}' ({source_kind}) failed: {reason}")]
    Conversion {
        driver: String,
        source_kind: String,
        reason: String,
    },

    #[error("workspace error: {0}")]
    Resource(String),

    #[error("PDF processing failed: {0}")]
    Pdf(String),

    #[error(transparent)]
    TemplateMetadata(#[from] MetadataError),

    #[error("report rendering failed: {0}")]
    Report(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PrintError {
    /// Malformed input (400).
    pub fn bad_request(message: impl Into<String>) -> Self {
        PrintError::Validation {
            status: 400,
            message: message.into(),
        }
    }

    /// Missing or unsupported argument (422).
    pub fn unprocessable(message: impl Into<String>) -> Self {
        PrintError::Validation {
            status: 422,
            message: message.into(),
        }
    }

    /// Denied by the URL access policy (403).
    pub fn forbidden(message: impl Into<String>) -> Self {
        PrintError::Validation {
            status: 403,
            message: message.into(),
        }
    }

    /// HTTP status class for this error.
    pub fn status(&self) -> u16 {
        match self {
            PrintError::Validation { status, .. } => *status,
            PrintError::Report(_) => 400,
            _ => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status() < 500
    }
}

impl From<lopdf::Error> for PrintError {
    fn from(err: lopdf::Error) -> Self {
        PrintError::Pdf(err.to_string())
    }
}
