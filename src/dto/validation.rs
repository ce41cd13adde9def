//! Validation helpers for DTOs.

use url::Url;
use validator::ValidationError;

/// Validates that an image reference is an embedded `data:image/...` URL or
/// an `http(s)` link.
///
/// # Examples
///
/// ```ignore
/// validate_image_ref("data:image/jpeg;base64,/9j/4AAQ") // Ok
/// validate_image_ref("https://cdn.example/photo.jpg")   // Ok
/// validate_image_ref("file:///tmp/photo.jpg")           // Err - scheme
/// ```
pub fn validate_image_ref(image: &str) -> Result<(), ValidationError> {
    let image = image.trim();
    if image.is_empty() {
        let mut err = ValidationError::new("image_required");
        err.message = Some("An image is required".into());
        return Err(err);
    }

    if let Some(rest) = image.strip_prefix("data:") {
        if rest.starts_with("image/") && rest.contains(',') {
            return Ok(());
        }
        let mut err = ValidationError::new("image_data_url");
        err.message = Some("Data URLs must carry an image/* payload".into());
        return Err(err);
    }

    match Url::parse(image) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => {
            let mut err = ValidationError::new("image_url");
            err.message = Some("Image must be a data URL or an http(s) link".into());
            Err(err)
        }
    }
}

/// Validates that a base URL (used in QR codes) is an absolute http(s) URL.
pub fn validate_base_url(base: &str) -> Result<(), ValidationError> {
    match Url::parse(base.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => {
            let mut err = ValidationError::new("base_url");
            err.message = Some("Base URL must be an absolute http(s) URL".into());
            Err(err)
        }
    }
}
