use fairway_types::NonEmptyText;

/// The proxy request carried no usable backend credential.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("API key is required")]
pub struct MissingApiKey;

/// Checks that the caller supplied a non-blank API key.
///
/// The key is forwarded to the backend as-is; its validity is the backend's concern.
pub fn require_api_key(provided: Option<&str>) -> Result<NonEmptyText, MissingApiKey> {
    provided
        .and_then(|key| NonEmptyText::new(key).ok())
        .ok_or(MissingApiKey)
}
