//! ISBN-13 checksum validation

use regex_lite::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static ISBN13_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{13}$").expect("static ISBN pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IsbnError {
    #[error("Invalid ISBN-13 format.")]
    InvalidFormat,

    #[error("Invalid ISBN-13 checksum.")]
    InvalidChecksum,
}

impl IsbnError {
    pub fn code(&self) -> &'static str {
        match self {
            IsbnError::InvalidFormat => "invalid_format",
            IsbnError::InvalidChecksum => "invalid_checksum",
        }
    }
}

/// Expected check digit for the first twelve digits of an ISBN-13.
///
/// Digits at even positions weigh 1, odd positions weigh 3.
pub fn isbn13_check_digit(digits: &[u8; 12]) -> u8 {
    let total: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| u32::from(*d) * if i % 2 == 1 { 3 } else { 1 })
        .sum();
    ((10 - (total % 10)) % 10) as u8
}

/// Validate an ISBN-13 string
pub fn validate_isbn13(value: &str) -> Result<(), IsbnError> {
    if !ISBN13_FORMAT.is_match(value) {
        return Err(IsbnError::InvalidFormat);
    }

    let digits: Vec<u8> = value.bytes().map(|b| b - b'0').collect();
    let mut head = [0u8; 12];
    head.copy_from_slice(&digits[..12]);

    if isbn13_check_digit(&head) != digits[12] {
        return Err(IsbnError::InvalidChecksum);
    }

    Ok(())
}

/// Adapter for `#[validate(custom(function = ...))]`
pub fn isbn13_field(value: &str) -> Result<(), validator::ValidationError> {
    validate_isbn13(value).map_err(|e| {
        validator::ValidationError::new(e.code()).with_message(e.to_string().into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_isbn() {
        assert_eq!(validate_isbn13("9780306406157"), Ok(()));
        assert_eq!(validate_isbn13("9781861972712"), Ok(()));
    }

    #[test]
    fn test_bad_checksum() {
        assert_eq!(
            validate_isbn13("9780306406158"),
            Err(IsbnError::InvalidChecksum)
        );
    }

    #[test]
    fn test_bad_format() {
        assert_eq!(validate_isbn13("978030640615"), Err(IsbnError::InvalidFormat));
        assert_eq!(validate_isbn13("97803064061577"), Err(IsbnError::InvalidFormat));
        assert_eq!(validate_isbn13("978-0306406157"), Err(IsbnError::InvalidFormat));
        assert_eq!(validate_isbn13(""), Err(IsbnError::InvalidFormat));
        // Non-ASCII digits are not accepted
        assert_eq!(validate_isbn13("٩٧٨٠٣٠٦٤٠٦١٥٧"), Err(IsbnError::InvalidFormat));
    }

    #[test]
    fn test_check_digit_wraps_to_zero() {
        // 9 + 7*3 + 8 + 2 = 40
        assert_eq!(isbn13_check_digit(&[9, 7, 8, 0, 2, 0, 0, 0, 0, 0, 0, 0]), 0);
        assert_eq!(validate_isbn13("9780200000000"), Ok(()));
        assert_eq!(isbn13_check_digit(&[9, 7, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0]), 2);
        assert_eq!(validate_isbn13("9780000000002"), Ok(()));
        assert_eq!(validate_isbn13("9780000000005"), Err(IsbnError::InvalidChecksum));
    }

    #[test]
    fn test_field_adapter_message() {
        let err = isbn13_field("123").unwrap_err();
        assert_eq!(err.code, "invalid_format");
        assert_eq!(err.message.unwrap(), "Invalid ISBN-13 format.");
    }
}
