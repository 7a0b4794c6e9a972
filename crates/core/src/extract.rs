//! Recovery of a [`StructuredRecord`] from free-form backend text.
//!
//! The backend is asked for JSON but may wrap it in markdown fences or surround it with prose.
//! Recovery is a fixed, order-preserving heuristic:
//!
//! 1. strip every ```` ```json ```` opening fence (plus trailing whitespace), then every bare
//!    ```` ``` ```` fence (plus trailing whitespace), anywhere in the text;
//! 2. take the span from the first `{` to the last `}` inclusive;
//! 3. decode that span as JSON and coerce it into a record.
//!
//! Text holding two separate objects therefore fails as malformed, because the span covers
//! both. This is a known limitation and must stay as is.

use crate::dispatch::RawBackendResponse;
use crate::error::ExtractionError;
use crate::record::StructuredRecord;
use regex::Regex;
use std::sync::LazyLock;

static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\s*").expect("opening fence pattern is valid"));
static BARE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\s*").expect("bare fence pattern is valid"));

/// Removes markdown code fences anywhere in `text`.
pub fn strip_fences(text: &str) -> String {
    let without_openers = OPENING_FENCE.replace_all(text, "");
    BARE_FENCE.replace_all(&without_openers, "").into_owned()
}

/// Returns the inclusive span between the first `{` and the last `}`.
fn object_span(text: &str) -> Result<&str, ExtractionError> {
    let start = text.find('{').ok_or(ExtractionError::NoObjectFound)?;
    let end = text.rfind('}').ok_or(ExtractionError::NoObjectFound)?;
    if end < start {
        return Err(ExtractionError::NoObjectFound);
    }
    Ok(&text[start..=end])
}

/// Extracts a record from the concatenated text of a backend answer.
///
/// # Errors
///
/// - `ExtractionError::NoObjectFound` if no `{ ... }` span exists after fence stripping.
/// - `ExtractionError::MalformedJson` if the span does not decode as a JSON object.
pub fn extract(text: &str) -> Result<StructuredRecord, ExtractionError> {
    let cleaned = strip_fences(text);
    let span = object_span(&cleaned)?;
    serde_json::from_str(span).map_err(|e| ExtractionError::MalformedJson(e.to_string()))
}

/// Extracts a record from the text blocks of a backend response, joined in order.
pub fn extract_response(response: &RawBackendResponse) -> Result<StructuredRecord, ExtractionError> {
    extract(&response.text())
}
