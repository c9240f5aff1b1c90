//! Request identification.
//!
//! Every request gets an `x-request-id` (UUID v4) unless the caller sent one;
//! the same value is echoed on the response and recorded on the trace span.

use axum::http::HeaderMap;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The request ID from `headers`, if present and valid UTF-8.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}
