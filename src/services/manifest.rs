//! Parsing of the JSON manifest a record's `uri` points at.

use serde_json::Value;

/// Extract the `image` URL from a manifest body.
pub fn parse_manifest(body: &[u8]) -> Result<String, ManifestError> {
    let value: Value = serde_json::from_slice(body)?;
    let object = value.as_object().ok_or(ManifestError::NotAnObject)?;

    match object.get("image") {
        None | Some(Value::Null) => Err(ManifestError::MissingImage),
        Some(Value::String(url)) if !url.trim().is_empty() => Ok(url.clone()),
        Some(_) => Err(ManifestError::InvalidImage),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Manifest is not a JSON object")]
    NotAnObject,

    #[error("Manifest has no 'image' field")]
    MissingImage,

    #[error("Manifest 'image' field is not a non-empty string")]
    InvalidImage,
}
