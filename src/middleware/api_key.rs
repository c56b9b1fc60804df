use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::error::ClarityError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Ensure a privileged request carries the configured key in `x-api-key`.
/// With no key configured every request passes.
pub fn ensure_api_key(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ClarityError> {
    let Some(expected) = expected.filter(|k| !k.is_empty()) else {
        return Ok(());
    };

    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(ClarityError::Unauthorized)
    }
}

/// Rate-limit key for an inbound request: the forwarded client address.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
