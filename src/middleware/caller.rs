use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use axum_extra::extract::cookie::CookieJar;

use crate::error::ClarityError;
use crate::router::ClarityState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ID_QUERY: &str = "userId";
pub const USER_ID_COOKIE: &str = "clarity_user_id";

/// Resolve who is calling.
/// Checked in order:
/// - Header: `x-user-id: ...`
/// - Query string: `?userId=...`
/// - Cookie: `clarity_user_id=...`
/// - the configured demo user, if any
pub fn resolve_user_id(
    headers: &HeaderMap,
    query: Option<&str>,
    fallback: Option<&str>,
) -> Option<String> {
    let non_empty = |v: &str| {
        let v = v.trim();
        (!v.is_empty()).then(|| v.to_string())
    };

    if let Some(id) = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(non_empty)
    {
        return Some(id);
    }

    if let Some(qs) = query
        && let Some(id) = url::form_urlencoded::parse(qs.as_bytes())
            .find(|(k, _)| *k == USER_ID_QUERY)
            .and_then(|(_, v)| non_empty(&*v))
    {
        return Some(id);
    }

    if let Some(id) = CookieJar::from_headers(headers)
        .get(USER_ID_COOKIE)
        .and_then(|c| non_empty(c.value()))
    {
        return Some(id);
    }

    fallback.and_then(non_empty)
}

/// The resolved caller identity. Rejects with 400 when nothing identifies the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

impl FromRequestParts<ClarityState> for CallerId {
    type Rejection = ClarityError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ClarityState,
    ) -> Result<Self, Self::Rejection> {
        resolve_user_id(
            &parts.headers,
            parts.uri.query(),
            state.config.demo_user_id.as_deref(),
        )
        .map(CallerId)
        .ok_or(ClarityError::MissingUserId)
    }
}
