//! Size bounds applied to everything written into a job row.
//!
//! Both the control plane and the runner write `error`, and the runner writes
//! `result`; the limits live here so the two processes cannot disagree.

use serde_json::{Value, json};

/// Largest serialized `result` stored verbatim, in bytes.
pub const MAX_RESULT_BYTES: usize = 10_000;

/// Longest `error` stored, in characters.
pub const MAX_ERROR_CHARS: usize = 500;

/// Longest upstream-failure detail echoed back to API callers.
pub const MAX_ERROR_DETAIL_CHARS: usize = 200;

/// Stored in place of a result whose serialized form exceeds [`MAX_RESULT_BYTES`].
pub fn truncated_result_marker() -> Value {
    json!({ "error": "Result too large", "truncated": true })
}

/// Truncate `message` to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

/// Bound an error description to [`MAX_ERROR_CHARS`].
pub fn bound_error(message: &str) -> String {
    truncate_chars(message, MAX_ERROR_CHARS)
}

/// Shape and bound a handler result for storage.
///
/// Non-object values are wrapped as `{"result": value}`. If the serialized
/// document is larger than [`MAX_RESULT_BYTES`] the truncation marker is
/// returned instead; an oversized payload is never handed back.
pub fn bound_result(result: Value) -> Value {
    let result = match result {
        Value::Object(_) => result,
        other => json!({ "result": other }),
    };

    match serde_json::to_vec(&result) {
        Ok(bytes) if bytes.len() <= MAX_RESULT_BYTES => result,
        _ => truncated_result_marker(),
    }
}
