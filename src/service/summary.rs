use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::service::normalizer::{NormalizedSubscription, round_money};
use crate::types::SubscriptionStatus;

pub const UNCATEGORIZED: &str = "Uncategorized";

/// Dashboard totals over a set of normalized subscriptions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendSummary {
    pub total_monthly_spend: Decimal,
    pub spend_by_category: BTreeMap<String, Decimal>,
    pub status_counts: BTreeMap<SubscriptionStatus, usize>,
}

/// Fold normalized subscriptions into totals.
///
/// Sums are exact decimals and each figure is rounded once at the end, so
/// the per-category figures always add up to the total.
pub fn summarize(subs: &[NormalizedSubscription]) -> SpendSummary {
    let mut total = Decimal::ZERO;
    let mut by_category: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut status_counts: BTreeMap<SubscriptionStatus, usize> = BTreeMap::new();

    for sub in subs {
        total = total.saturating_add(sub.normalized_monthly_cost);

        let category = sub
            .subscription
            .category
            .clone()
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        let spend = by_category.entry(category).or_default();
        *spend = spend.saturating_add(sub.normalized_monthly_cost);

        *status_counts.entry(sub.subscription.status).or_default() += 1;
    }

    SpendSummary {
        total_monthly_spend: round_money(total),
        spend_by_category: by_category
            .into_iter()
            .map(|(k, v)| (k, round_money(v)))
            .collect(),
        status_counts,
    }
}
