use lopdf::encryption::{EncryptionState, EncryptionVersion, Permissions};
use lopdf::{Document, Object, StringFormat};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::PrintError;

/// The owner password paired with a user password. Derived, not supplied,
/// for compatibility with existing clients.
pub fn owner_password(password: &str) -> String {
    format!("{password}owner")
}

/// Protects `pdf` with `password` as the user password and
/// [`owner_password`] as the owner password (RC4, 128-bit key). Without a
/// password the input is returned unchanged.
pub fn encrypt_pdf(pdf: Vec<u8>, password: Option<&str>) -> Result<Vec<u8>, PrintError> {
    let Some(password) = password else {
        return Ok(pdf);
    };

    let mut document = Document::load_mem(&pdf)?;
    ensure_file_id(&mut document);

    let owner = owner_password(password);
    let version = EncryptionVersion::V2 {
        document: &document,
        owner_password: &owner,
        user_password: password,
        key_length: 128,
        permissions: Permissions::all(),
    };
    let state = EncryptionState::try_from(version).map_err(|e| {
        error!(error = %e, "Cannot derive encryption state");
        PrintError::Pdf(format!("cannot encrypt PDF: {e}"))
    })?;
    document
        .encrypt(&state)
        .map_err(|e| PrintError::Pdf(format!("cannot encrypt PDF: {e}")))?;

    let mut output = Vec::new();
    document
        .save_to(&mut output)
        .map_err(|e| PrintError::Pdf(format!("cannot write encrypted PDF: {e}")))?;
    debug!(bytes = output.len(), "Encrypted PDF");
    Ok(output)
}

// The standard security handler keys off the first file identifier.
fn ensure_file_id(document: &mut Document) {
    if document.trailer.get(b"ID").is_ok() {
        return;
    }
    let id = Object::String(Uuid::new_v4().as_bytes().to_vec(), StringFormat::Hexadecimal);
    document.trailer.set("ID", Object::Array(vec![id.clone(), id]));
}
