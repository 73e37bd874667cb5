//! Input validation shared by the catalog forms
//!
//! - ISBN-13 format and checksum
//! - Text normalization used for per-user uniqueness
//! - Image upload size/type/content checks

mod isbn;
mod normalize;
mod upload;

pub use isbn::{isbn13_check_digit, isbn13_field, validate_isbn13, IsbnError};
pub use normalize::normalize_text;
pub use upload::{
    validate_extension, validate_file_size, validate_image_content, validate_upload, Upload,
    UploadError,
};

use crate::errors::FormErrors;

/// Run an upload through the validators, reporting failures on `field`
pub fn check_upload(
    field: &str,
    upload: &Upload,
    media: &crate::config::MediaConfig,
) -> Result<(), FormErrors> {
    validate_upload(upload, media)
        .map(|_| ())
        .map_err(|e| FormErrors::single(field, e.to_string()))
}
