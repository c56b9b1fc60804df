use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::ClarityError;

/// Raw provider payload; only `rates` is required.
#[derive(Debug, Deserialize)]
struct LatestRatesPayload {
    rates: Option<HashMap<String, f64>>,
}

/// Client for the upstream "latest rates relative to USD" endpoint.
///
/// One GET per call, no retry. A local quota guards the provider; when it
/// is exhausted the call fails instead of waiting.
#[derive(Clone)]
pub struct FxApi {
    client: reqwest::Client,
    url: Url,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl FxApi {
    pub fn new(url: Url, timeout: Duration, per_minute: u32) -> Result<Self, ClarityError> {
        let client = reqwest::Client::builder()
            .user_agent("clarity-fx/1.0")
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()?;
        let quota = Quota::per_minute(NonZeroU32::new(per_minute.max(1)).unwrap_or(NonZeroU32::MIN));
        Ok(Self {
            client,
            url,
            limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetch the provider's current table of units per 1 USD.
    pub async fn fetch_latest_usd_rates(&self) -> Result<HashMap<String, Decimal>, ClarityError> {
        if self.limiter.check().is_err() {
            warn!(url = %self.url, "FX provider quota exhausted; refusing outbound call");
            return Err(ClarityError::UpstreamThrottled);
        }

        let resp = self
            .client
            .get(self.url.clone())
            .header("Cache-Control", "no-store")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClarityError::UpstreamStatus(status));
        }

        let payload: LatestRatesPayload = resp.json().await?;
        let rates = payload
            .rates
            .ok_or_else(|| ClarityError::MalformedFxPayload("missing `rates`".to_string()))?;

        let parsed: HashMap<String, Decimal> = rates
            .into_iter()
            .filter_map(|(code, rate)| match Decimal::try_from(rate) {
                Ok(d) => Some((code, d)),
                Err(_) => {
                    debug!(code = %code, rate, "skipping non-representable rate");
                    None
                }
            })
            .collect();
        debug!(count = parsed.len(), "FX rates fetched");
        Ok(parsed)
    }
}
