//! Checks specific to uploaded file metadata

use super::models::File;
use crate::validation::{ErrorKind, FieldError};

/// MIME types a file record may carry.
pub const ALLOWED_FILE_TYPES: &[&str] = &["application/pdf", "application/msword"];

pub const UNSUPPORTED_TYPE_MESSAGE: &str = "You can only update PDF or Word docs.";

pub fn is_allowed_type(content_type: &str) -> bool {
    ALLOWED_FILE_TYPES.iter().any(|allowed| *allowed == content_type)
}

/// Rejects any type outside [`ALLOWED_FILE_TYPES`], including a missing one.
pub fn validate_file_type(file: &File) -> Option<FieldError> {
    match file.file_type.as_deref() {
        Some(content_type) if is_allowed_type(content_type) => None,
        _ => Some(FieldError::new(ErrorKind::UnsupportedType, UNSUPPORTED_TYPE_MESSAGE)),
    }
}
