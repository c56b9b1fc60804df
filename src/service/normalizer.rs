//! Currency and billing-cycle normalization.
//!
//! Everything here is pure: callers load the rate map once per request and
//! fold the per-subscription `missing_rates` into their own warning set.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::types::{BillingCycle, RateMap, Subscription};

/// Outcome of a single currency conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyConversion {
    pub amount: Decimal,
    pub converted: bool,
    /// Codes absent from the rate map, source first.
    pub missing: Vec<String>,
}

/// Convert `amount` from `source` to `target` through the USD pivot.
///
/// When either rate is unknown, or the result would not fit in a `Decimal`,
/// the amount is echoed back unconverted.
pub fn normalize_currency(
    amount: Decimal,
    source: &str,
    target: &str,
    rates: &RateMap,
) -> CurrencyConversion {
    let source_rate = rates.get(source);
    let target_rate = rates.get(target);

    match (source_rate, target_rate) {
        (Some(source_rate), Some(target_rate)) => {
            match amount
                .checked_div(source_rate)
                .and_then(|usd| usd.checked_mul(target_rate))
            {
                Some(converted) => CurrencyConversion {
                    amount: converted,
                    converted: true,
                    missing: Vec::new(),
                },
                // Out of decimal range: echoed back unconverted, nothing missing.
                None => CurrencyConversion {
                    amount,
                    converted: false,
                    missing: Vec::new(),
                },
            }
        }
        _ => {
            let missing = [(source, source_rate), (target, target_rate)]
                .into_iter()
                .filter(|(_, rate)| rate.is_none())
                .map(|(code, _)| code.to_string())
                .collect();
            CurrencyConversion {
                amount,
                converted: false,
                missing,
            }
        }
    }
}

/// Factor turning one billing period's cost into a monthly equivalent.
pub fn monthly_multiplier(cycle: BillingCycle) -> Decimal {
    match cycle {
        BillingCycle::Weekly => Decimal::from(52) / Decimal::from(12),
        BillingCycle::Monthly => Decimal::ONE,
        BillingCycle::Quarterly => Decimal::ONE / Decimal::from(3),
        BillingCycle::Yearly => Decimal::ONE / Decimal::from(12),
    }
}

/// Round to cents, halves away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A subscription with its cost expressed in the viewer's base currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSubscription {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub normalized_cost: Decimal,
    pub normalized_monthly_cost: Decimal,
    pub was_converted: bool,
    pub display_note: Option<String>,
    pub missing_rates: Vec<String>,
}

pub fn normalize_subscription(
    sub: Subscription,
    base_currency: &str,
    rates: &RateMap,
) -> NormalizedSubscription {
    let source = sub.currency.as_str().to_string();
    let conversion = normalize_currency(sub.cost, &source, base_currency, rates);

    let normalized_cost = round_money(conversion.amount);
    let normalized_monthly_cost =
        round_money(conversion.amount.saturating_mul(monthly_multiplier(sub.billing_cycle)));

    let display_note = (conversion.converted && source != base_currency).then(|| {
        format!(
            "Approx {base_currency} {:.2} ({source}->{base_currency})",
            normalized_cost
        )
    });

    NormalizedSubscription {
        subscription: sub,
        normalized_cost,
        normalized_monthly_cost,
        was_converted: conversion.converted,
        display_note,
        missing_rates: conversion.missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CurrencyCode, SubscriptionStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn rates() -> RateMap {
        [("EUR", dec!(0.5))].into_iter().collect()
    }

    fn subscription(cost: Decimal, currency: &str, cycle: BillingCycle) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: "1".to_string(),
            user_id: "u".to_string(),
            name: "Test".to_string(),
            provider: Some("Prov".to_string()),
            cost,
            currency: CurrencyCode::parse(currency).unwrap(),
            billing_cycle: cycle,
            status: SubscriptionStatus::Active,
            start_date: now,
            next_bill_date: now,
            category: None,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn converts_when_both_rates_exist() {
        let res = normalize_currency(dec!(10), "EUR", "USD", &rates());
        assert!(res.converted);
        assert_eq!(res.amount, dec!(20));
        assert!(res.missing.is_empty());
    }

    #[test]
    fn reports_missing_source_rate() {
        let res = normalize_currency(dec!(10), "GBP", "USD", &rates());
        assert!(!res.converted);
        assert_eq!(res.amount, dec!(10));
        assert_eq!(res.missing, vec!["GBP".to_string()]);
    }

    #[test]
    fn reports_both_missing_codes_source_first() {
        let res = normalize_currency(dec!(7.5), "GBP", "JPY", &rates());
        assert!(!res.converted);
        assert_eq!(res.amount, dec!(7.5));
        assert_eq!(res.missing, vec!["GBP".to_string(), "JPY".to_string()]);
    }

    #[test]
    fn same_currency_still_goes_through_pivot() {
        let res = normalize_currency(dec!(12.34), "EUR", "EUR", &rates());
        assert!(res.converted);
        assert_eq!(res.amount, dec!(12.34));
    }

    #[test]
    fn conversion_round_trips_through_usd() {
        let rates: RateMap = [("EUR", dec!(0.94)), ("JPY", dec!(149.5)), ("GBP", dec!(0.82))]
            .into_iter()
            .collect();
        for (a, b) in [("EUR", "JPY"), ("JPY", "GBP"), ("GBP", "USD"), ("USD", "EUR")] {
            let there = normalize_currency(dec!(123.45), a, b, &rates);
            let back = normalize_currency(there.amount, b, a, &rates);
            assert_eq!(round_money(back.amount), dec!(123.45), "{a}->{b}->{a}");
        }
    }

    #[test]
    fn out_of_range_conversion_is_left_unconverted() {
        let rates: RateMap = [("KRW", dec!(1350))].into_iter().collect();
        let res = normalize_currency(Decimal::MAX, "USD", "KRW", &rates);
        assert!(!res.converted);
        assert_eq!(res.amount, Decimal::MAX);
        assert!(res.missing.is_empty());
    }

    #[test]
    fn huge_weekly_cost_does_not_overflow() {
        let sub = subscription(Decimal::MAX, "USD", BillingCycle::Weekly);
        let rates: RateMap = [("KRW", dec!(1350))].into_iter().collect();
        let n = normalize_subscription(sub, "KRW", &rates);
        assert!(!n.was_converted);
        assert!(n.display_note.is_none());
        assert_eq!(n.normalized_monthly_cost, Decimal::MAX);
    }

    #[test]
    fn maps_cycles_to_monthly_equivalents() {
        assert_eq!(
            monthly_multiplier(BillingCycle::Weekly).round_dp(4),
            dec!(4.3333)
        );
        assert_eq!(monthly_multiplier(BillingCycle::Monthly), Decimal::ONE);
        assert_eq!(
            monthly_multiplier(BillingCycle::Quarterly).round_dp(4),
            dec!(0.3333)
        );
        assert_eq!(
            monthly_multiplier(BillingCycle::Yearly).round_dp(4),
            dec!(0.0833)
        );
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(2.344)), dec!(2.34));
    }

    #[test]
    fn calculates_normalized_monthly_cost() {
        let sub = subscription(dec!(10), "EUR", BillingCycle::Monthly);
        let res = normalize_subscription(sub, "USD", &rates());
        assert_eq!(res.normalized_monthly_cost, dec!(20.00));
        assert_eq!(res.normalized_cost, dec!(20.00));
        assert!(res.was_converted);
        assert_eq!(res.display_note.as_deref(), Some("Approx USD 20.00 (EUR->USD)"));
        assert!(res.missing_rates.is_empty());
    }

    #[test]
    fn includes_missing_rates_when_absent() {
        let sub = subscription(dec!(10), "EUR", BillingCycle::Monthly);
        let res = normalize_subscription(sub, "GBP", &rates());
        assert!(res.missing_rates.contains(&"GBP".to_string()));
        assert!(!res.was_converted);
        assert_eq!(res.normalized_cost, dec!(10));
        assert_eq!(res.display_note, None);
    }

    #[test]
    fn no_note_when_already_in_base_currency() {
        let sub = subscription(dec!(99), "USD", BillingCycle::Quarterly);
        let res = normalize_subscription(sub, "USD", &rates());
        assert!(res.was_converted);
        assert_eq!(res.display_note, None);
        assert_eq!(res.normalized_monthly_cost, dec!(33.00));
    }

    #[test]
    fn monthly_cost_scales_from_unrounded_conversion() {
        // 3.49 EUR weekly at 0.94 EUR/USD -> 3.712765.. USD -> 16.0886.. monthly
        let rates: RateMap = [("EUR", dec!(0.94))].into_iter().collect();
        let sub = subscription(dec!(3.49), "EUR", BillingCycle::Weekly);
        let res = normalize_subscription(sub, "USD", &rates);
        assert_eq!(res.normalized_cost, dec!(3.71));
        assert_eq!(res.normalized_monthly_cost, dec!(16.09));
    }
}
