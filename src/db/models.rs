use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use std::str::FromStr;
use tracing::warn;

use crate::types::{
    Alert, AlertSeverity, BillingCycle, CurrencyCode, ExchangeRate, Subscription,
    SubscriptionStatus, User,
};

/// Fixed-width UTC timestamps so TEXT ordering matches time ordering.
pub fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_ts(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn decode_decimal(raw: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn decode_parsed<T: FromStr<Err = String>>(raw: &str) -> Result<T, sqlx::Error> {
    raw.parse::<T>().map_err(|e| sqlx::Error::Decode(e.into()))
}

/// Unknown stored cycles are read as monthly (multiplier 1).
fn decode_cycle(raw: &str) -> BillingCycle {
    raw.parse::<BillingCycle>().unwrap_or_else(|e| {
        warn!(cycle = raw, error = %e, "unknown stored billing cycle, reading as MONTHLY");
        BillingCycle::Monthly
    })
}

fn decode_currency(raw: &str) -> Result<CurrencyCode, sqlx::Error> {
    CurrencyCode::parse(raw).map_err(|e| sqlx::Error::Decode(e.into()))
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: String,
    pub email: String,
    pub base_currency: String,
}

impl TryFrom<DbUser> for User {
    type Error = sqlx::Error;

    fn try_from(d: DbUser) -> Result<Self, Self::Error> {
        Ok(User {
            id: d.id,
            email: d.email,
            base_currency: decode_currency(&d.base_currency)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbSubscription {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub provider: Option<String>,
    pub cost: String,
    pub currency: String,
    pub billing_cycle: String,
    pub status: String,
    pub start_date: String,
    pub next_bill_date: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<DbSubscription> for Subscription {
    type Error = sqlx::Error;

    fn try_from(d: DbSubscription) -> Result<Self, Self::Error> {
        Ok(Subscription {
            cost: decode_decimal(&d.cost)?,
            currency: decode_currency(&d.currency)?,
            billing_cycle: decode_cycle(&d.billing_cycle),
            status: decode_parsed::<SubscriptionStatus>(&d.status)?,
            start_date: decode_ts(&d.start_date)?,
            next_bill_date: decode_ts(&d.next_bill_date)?,
            created_at: decode_ts(&d.created_at)?,
            updated_at: decode_ts(&d.updated_at)?,
            id: d.id,
            user_id: d.user_id,
            name: d.name,
            provider: d.provider,
            category: d.category,
            description: d.description,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbExchangeRate {
    pub currency_code: String,
    pub rate_to_usd: String,
    pub last_updated: String,
}

impl TryFrom<DbExchangeRate> for ExchangeRate {
    type Error = sqlx::Error;

    fn try_from(d: DbExchangeRate) -> Result<Self, Self::Error> {
        Ok(ExchangeRate {
            rate_to_usd: decode_decimal(&d.rate_to_usd)?,
            last_updated: decode_ts(&d.last_updated)?,
            currency_code: d.currency_code,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbAlert {
    pub id: String,
    pub user_id: String,
    pub subscription_id: Option<String>,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub trigger_date: String,
    pub is_read: i64,
}

impl TryFrom<DbAlert> for Alert {
    type Error = sqlx::Error;

    fn try_from(d: DbAlert) -> Result<Self, Self::Error> {
        Ok(Alert {
            severity: decode_parsed::<AlertSeverity>(&d.severity)?,
            trigger_date: decode_ts(&d.trigger_date)?,
            is_read: d.is_read != 0,
            id: d.id,
            user_id: d.user_id,
            subscription_id: d.subscription_id,
            alert_type: d.alert_type,
            message: d.message,
        })
    }
}
