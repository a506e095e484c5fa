//! Structured-output decoding with documented fallbacks
//!
//! Every stage that expects structured JSON from the generation service
//! decodes through this helper. A malformed payload substitutes the stage's
//! documented fallback value; stage failure is reserved for unrecoverable
//! conditions (missing artifacts, exhausted retries).

use serde::de::DeserializeOwned;

/// Decode a structured generation response, substituting `fallback` when the
/// payload does not parse as `T`. The fallback closure receives the raw
/// response so stages can treat the text itself as the field value.
pub fn decode_or_fallback<T, F>(raw: &str, fallback: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce(&str) -> T,
{
    match serde_json::from_str::<T>(raw) {
        Ok(value) => value,
        Err(e) => {
            log::warn!(
                "Structured output did not match the expected shape ({}), using fallback",
                e
            );
            fallback(raw)
        }
    }
}
