//! Image upload validation
//!
//! Runs before anything is written: size, extension, then a full decode to
//! make sure the bytes really are a JPEG or PNG image.

use crate::config::MediaConfig;
use image::ImageFormat;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Max. upload file size {limit_mb} MB.")]
    TooLarge { size: usize, limit_mb: usize },

    #[error("File extension \"{extension}\" is not allowed. Allowed extensions are: {allowed}.")]
    Extension { extension: String, allowed: String },

    #[error("Unsupported image format.")]
    UnsupportedFormat,

    #[error("Invalid image file.")]
    InvalidImage,
}

/// An uploaded file as received from a multipart form
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Lower-cased extension of the client file name
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    }
}

pub fn validate_file_size(upload: &Upload, max_bytes: usize) -> Result<(), UploadError> {
    if upload.size() > max_bytes {
        return Err(UploadError::TooLarge {
            size: upload.size(),
            limit_mb: max_bytes / (1024 * 1024),
        });
    }
    Ok(())
}

pub fn validate_extension(upload: &Upload, allowed: &[String]) -> Result<(), UploadError> {
    let extension = upload.extension();
    if allowed.iter().any(|a| a.eq_ignore_ascii_case(&extension)) {
        Ok(())
    } else {
        Err(UploadError::Extension {
            extension,
            allowed: allowed.join(", "),
        })
    }
}

/// Sniff the content and decode it fully
pub fn validate_image_content(upload: &Upload) -> Result<ImageFormat, UploadError> {
    let format = image::guess_format(&upload.bytes).map_err(|_| UploadError::InvalidImage)?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(UploadError::UnsupportedFormat);
    }

    image::load_from_memory_with_format(&upload.bytes, format)
        .map_err(|_| UploadError::InvalidImage)?;

    Ok(format)
}

/// Run every upload validator in order, stopping at the first failure
pub fn validate_upload(upload: &Upload, media: &MediaConfig) -> Result<ImageFormat, UploadError> {
    validate_file_size(upload, media.max_upload_bytes)?;
    validate_extension(upload, &media.allowed_extensions)?;
    validate_image_content(upload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::encoded;

    #[test]
    fn test_rejects_oversized_upload() {
        let upload = Upload::new("big.jpg", vec![0u8; 5 * 1024 * 1024]);
        let err = validate_upload(&upload, &MediaConfig::default()).unwrap_err();
        assert_eq!(
            err,
            UploadError::TooLarge {
                size: 5 * 1024 * 1024,
                limit_mb: 2
            }
        );
        assert_eq!(err.to_string(), "Max. upload file size 2 MB.");
    }

    #[test]
    fn test_rejects_extension() {
        let upload = Upload::new("cover.gif", encoded(10, 10, ImageFormat::Png));
        assert!(matches!(
            validate_upload(&upload, &MediaConfig::default()),
            Err(UploadError::Extension { .. })
        ));
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let upload = Upload::new("Cover.JPEG", encoded(10, 10, ImageFormat::Jpeg));
        assert_eq!(
            validate_upload(&upload, &MediaConfig::default()),
            Ok(ImageFormat::Jpeg)
        );
    }

    #[test]
    fn test_rejects_garbage_with_image_extension() {
        let upload = Upload::new("cover.png", b"definitely not a png".to_vec());
        assert_eq!(
            validate_upload(&upload, &MediaConfig::default()),
            Err(UploadError::InvalidImage)
        );
    }

    #[test]
    fn test_rejects_truncated_png() {
        let mut bytes = encoded(40, 40, ImageFormat::Png);
        bytes.truncate(bytes.len() / 2);
        let upload = Upload::new("cover.png", bytes);
        assert_eq!(validate_image_content(&upload), Err(UploadError::InvalidImage));
    }

    #[test]
    fn test_accepts_small_jpeg() {
        let upload = Upload::new("photo.jpg", encoded(320, 480, ImageFormat::Jpeg));
        assert!(upload.size() < 2 * 1024 * 1024);
        assert_eq!(
            validate_upload(&upload, &MediaConfig::default()),
            Ok(ImageFormat::Jpeg)
        );
    }
}
