use axum::{Json, extract::State, http::HeaderMap};
use serde::Serialize;
use tracing::warn;

use crate::error::ClarityError;
use crate::middleware::{client_key, ensure_api_key};
use crate::router::ClarityState;
use crate::service::rates::{RefreshSummary, refresh_exchange_rates};

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub summary: RefreshSummary,
}

/// GET /api/exchange-rates/refresh
///
/// Key check first, then the per-caller limit, then a single upstream fetch.
pub async fn refresh_rates(
    State(state): State<ClarityState>,
    headers: HeaderMap,
) -> Result<Json<RefreshResponse>, ClarityError> {
    ensure_api_key(&headers, state.config.fx_refresh_api_key.as_deref())?;

    let caller = client_key(&headers);
    if !state.limiter.check(&caller) {
        warn!(caller = %caller, "FX refresh rate limited");
        return Err(ClarityError::RateLimited);
    }

    let summary =
        refresh_exchange_rates(&state.storage, &state.fx, &state.config.fx_currencies).await?;
    Ok(Json(RefreshResponse { ok: true, summary }))
}
