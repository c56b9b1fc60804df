use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::currency::CurrencyCode;

/// How often a subscription bills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingCycle {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl BillingCycle {
    pub const ALL: [BillingCycle; 4] = [
        BillingCycle::Weekly,
        BillingCycle::Monthly,
        BillingCycle::Quarterly,
        BillingCycle::Yearly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BillingCycle::Weekly => "WEEKLY",
            BillingCycle::Monthly => "MONTHLY",
            BillingCycle::Quarterly => "QUARTERLY",
            BillingCycle::Yearly => "YEARLY",
        }
    }
}

impl FromStr for BillingCycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!("Invalid billingCycle '{wanted}' (expected WEEKLY, MONTHLY, QUARTERLY or YEARLY)")
            })
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Cancelled,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 3] = [
        SubscriptionStatus::Active,
        SubscriptionStatus::Paused,
        SubscriptionStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Paused => "PAUSED",
            SubscriptionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!("Invalid status '{wanted}' (expected ACTIVE, PAUSED or CANCELLED)")
            })
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub provider: Option<String>,
    pub cost: Decimal,
    pub currency: CurrencyCode,
    pub billing_cycle: BillingCycle,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub next_bill_date: DateTime<Utc>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated field set for a subscription that does not exist yet
/// (or the full replacement values of an update).
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubscription {
    pub name: String,
    pub provider: Option<String>,
    pub cost: Decimal,
    pub currency: CurrencyCode,
    pub billing_cycle: BillingCycle,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub next_bill_date: DateTime<Utc>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl NewSubscription {
    /// Materialize into a full record owned by `user_id`.
    pub fn into_subscription(
        self,
        id: impl Into<String>,
        user_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Subscription {
        Subscription {
            id: id.into(),
            user_id: user_id.into(),
            name: self.name,
            provider: self.provider,
            cost: self.cost,
            currency: self.currency,
            billing_cycle: self.billing_cycle,
            status: self.status,
            start_date: self.start_date,
            next_bill_date: self.next_bill_date,
            category: self.category,
            description: self.description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A user with the currency all totals are shown in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub base_currency: CurrencyCode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("weekly".parse::<BillingCycle>(), Ok(BillingCycle::Weekly));
        assert_eq!(" YEARLY ".parse::<BillingCycle>(), Ok(BillingCycle::Yearly));
        assert_eq!(
            "Paused".parse::<SubscriptionStatus>(),
            Ok(SubscriptionStatus::Paused)
        );
        assert!("fortnightly".parse::<BillingCycle>().is_err());
        assert!("EXPIRED".parse::<SubscriptionStatus>().is_err());
    }

    #[test]
    fn enums_serialize_as_upper_case() {
        assert_eq!(
            serde_json::to_string(&BillingCycle::Quarterly).unwrap(),
            r#""QUARTERLY""#
        );
        assert_eq!(
            serde_json::to_string(&SubscriptionStatus::Cancelled).unwrap(),
            r#""CANCELLED""#
        );
    }
}
