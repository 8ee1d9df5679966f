//! Field validation, run before anything is written.

use crate::error::ValidationError;
use crate::models::{Attachment, NewAttachment};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use std::fmt::Display;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z\s\-']{2,50}$").expect("valid name regex"));

/// The mime types accepted for OD attachments.
pub const ATTACHMENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "application/pdf"];

/// The default attachment size limit, in megabytes.
pub const DEFAULT_ATTACHMENT_MAX_MB: usize = 5;

pub fn email(value: &str) -> Result<(), ValidationError> {
    if EMAIL.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(value.to_string()))
    }
}

pub fn name(value: &str) -> Result<(), ValidationError> {
    if NAME.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(value.to_string()))
    }
}

/// Fails with [`ValidationError::MissingField`] if `value` is blank.
pub fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed)
    }
}

/// Fails if `to` comes before `from`. Equal ends are a valid one-day range.
pub fn date_range<T: PartialOrd + Display>(from: &T, to: &T) -> Result<(), ValidationError> {
    if from <= to {
        Ok(())
    } else {
        Err(ValidationError::InvertedRange {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Checks an upload against the size limit and allowed types, then encodes it for
/// inline storage.
pub fn attachment(upload: &NewAttachment, max_mb: usize) -> Result<Attachment, ValidationError> {
    let max = max_mb * 1024 * 1024;
    if upload.bytes.len() > max {
        return Err(ValidationError::AttachmentTooLarge {
            size: upload.bytes.len(),
            max,
        });
    }

    let mime_type = upload.mime_type.trim().to_lowercase();
    if !ATTACHMENT_TYPES.contains(&mime_type.as_str()) {
        return Err(ValidationError::AttachmentType(upload.mime_type.clone()));
    }

    Ok(Attachment {
        data: STANDARD.encode(&upload.bytes),
        mime_type,
        file_name: upload.file_name.clone(),
    })
}

/// Password strength rules for the credential-set flow.
pub fn password(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::WeakPassword("Password is required"));
    }
    if value.chars().count() < 8 {
        return Err(ValidationError::WeakPassword(
            "Password must be at least 8 characters long",
        ));
    }
    if !value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::WeakPassword(
            "Password must contain at least one uppercase letter",
        ));
    }
    if !value.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ValidationError::WeakPassword(
            "Password must contain at least one lowercase letter",
        ));
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::WeakPassword(
            "Password must contain at least one number",
        ));
    }
    Ok(())
}
