use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::api::FxApi;
use crate::db::ClarityStorage;
use crate::error::ClarityError;
use crate::types::{ExchangeRate, RateMap};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub updated: usize,
    pub last_updated: DateTime<Utc>,
}

/// Build the per-request rate map from everything in the cache.
pub async fn load_rate_map(storage: &ClarityStorage) -> Result<RateMap, ClarityError> {
    let rows = storage.list_exchange_rates().await?;
    Ok(RateMap::from_rates(&rows))
}

/// Pull the latest table and upsert the tracked currencies.
///
/// Codes the provider does not return, or returns with a non-positive rate,
/// are left untouched in the cache.
pub async fn refresh_exchange_rates(
    storage: &ClarityStorage,
    api: &FxApi,
    currencies: &[String],
) -> Result<RefreshSummary, ClarityError> {
    let latest = api.fetch_latest_usd_rates().await?;
    let now = Utc::now();

    let updates: Vec<ExchangeRate> = currencies
        .iter()
        .filter_map(|code| {
            latest
                .get(code)
                .filter(|rate| **rate > Decimal::ZERO)
                .map(|rate| ExchangeRate {
                    currency_code: code.clone(),
                    rate_to_usd: *rate,
                    last_updated: now,
                })
        })
        .collect();

    let updated = storage.upsert_exchange_rates(&updates).await?;
    info!(
        updated,
        tracked = currencies.len(),
        source = %api.url(),
        "exchange rates refreshed"
    );
    Ok(RefreshSummary {
        updated,
        last_updated: now,
    })
}
