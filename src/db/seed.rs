use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::info;

use crate::db::ClarityStorage;
use crate::error::ClarityError;
use crate::types::{
    Alert, AlertSeverity, BillingCycle, CurrencyCode, ExchangeRate, NewSubscription,
    SubscriptionStatus, User,
};

pub const DEMO_USER_ID: &str = "demo-user";
const DEMO_USER_EMAIL: &str = "demo@clarity.test";
const DEMO_BASE_CURRENCY: &str = "GBP";
const DEMO_ALERT_ID: &str = "demo-alert-renewal";

/// Units per 1 USD used until the first refresh.
const INITIAL_RATES: [(&str, &str); 20] = [
    ("USD", "1.0"),
    ("EUR", "0.94"),
    ("GBP", "0.82"),
    ("JPY", "149.5"),
    ("CAD", "1.37"),
    ("AUD", "1.56"),
    ("CHF", "0.90"),
    ("CNY", "7.30"),
    ("HKD", "7.82"),
    ("NZD", "1.70"),
    ("SEK", "11.0"),
    ("KRW", "1350.0"),
    ("SGD", "1.37"),
    ("NOK", "11.1"),
    ("MXN", "18.0"),
    ("INR", "83.2"),
    ("RUB", "93.5"),
    ("ZAR", "19.0"),
    ("TRY", "28.0"),
    ("BRL", "5.05"),
];

struct DemoSubscription {
    name: &'static str,
    cost: &'static str,
    currency: &'static str,
    cycle: BillingCycle,
    start: (i32, u32, u32),
    next: (i32, u32, u32),
    status: SubscriptionStatus,
    category: &'static str,
    description: &'static str,
}

const DEMO_SUBSCRIPTIONS: [DemoSubscription; 7] = [
    DemoSubscription {
        name: "Netflix",
        cost: "15.99",
        currency: "USD",
        cycle: BillingCycle::Monthly,
        start: (2024, 9, 1),
        next: (2025, 7, 1),
        status: SubscriptionStatus::Active,
        category: "Streaming",
        description: "4K family plan paid in USD",
    },
    DemoSubscription {
        name: "Spotify",
        cost: "12.99",
        currency: "EUR",
        cycle: BillingCycle::Monthly,
        start: (2024, 8, 12),
        next: (2025, 7, 12),
        status: SubscriptionStatus::Active,
        category: "Music",
        description: "Personal plan billed in EUR",
    },
    DemoSubscription {
        name: "Adobe Creative Cloud",
        cost: "599.00",
        currency: "GBP",
        cycle: BillingCycle::Yearly,
        start: (2024, 12, 1),
        next: (2025, 12, 1),
        status: SubscriptionStatus::Active,
        category: "Design",
        description: "Annual prepaid license in base currency",
    },
    DemoSubscription {
        name: "Duolingo Super",
        cost: "3.49",
        currency: "EUR",
        cycle: BillingCycle::Weekly,
        start: (2025, 3, 15),
        next: (2025, 6, 22),
        status: SubscriptionStatus::Paused,
        category: "Education",
        description: "Weekly plan",
    },
    DemoSubscription {
        name: "Atlassian Jira",
        cost: "36.00",
        currency: "USD",
        cycle: BillingCycle::Monthly,
        start: (2024, 10, 3),
        next: (2025, 7, 3),
        status: SubscriptionStatus::Active,
        category: "Productivity",
        description: "Team plan for product delivery",
    },
    DemoSubscription {
        name: "Figma",
        cost: "12000",
        currency: "JPY",
        cycle: BillingCycle::Monthly,
        start: (2024, 11, 10),
        next: (2025, 7, 10),
        status: SubscriptionStatus::Active,
        category: "Design",
        description: "Billed in JPY",
    },
    DemoSubscription {
        name: "Notion",
        cost: "99.00",
        currency: "USD",
        cycle: BillingCycle::Quarterly,
        start: (2025, 1, 5),
        next: (2025, 7, 5),
        status: SubscriptionStatus::Active,
        category: "Knowledge",
        description: "Quarterly billing for business workspace",
    },
];

fn seed_error(what: impl std::fmt::Display) -> ClarityError {
    ClarityError::SeedData(what.to_string())
}

fn demo_date(ymd: (i32, u32, u32)) -> Result<chrono::DateTime<Utc>, ClarityError> {
    NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .ok_or_else(|| seed_error(format!("{ymd:?}")))
}

/// Upsert the starter rate table and rebuild the demo user's subscriptions.
pub async fn seed_demo(storage: &ClarityStorage) -> Result<(), ClarityError> {
    let now = Utc::now();
    let rates = INITIAL_RATES
        .iter()
        .map(|(code, rate)| {
            Ok(ExchangeRate {
                currency_code: code.to_string(),
                rate_to_usd: Decimal::from_str(rate).map_err(seed_error)?,
                last_updated: now,
            })
        })
        .collect::<Result<Vec<_>, ClarityError>>()?;
    let written = storage.upsert_exchange_rates(&rates).await?;
    info!(count = written, "seeded exchange rates");

    let user = User {
        id: DEMO_USER_ID.to_string(),
        email: DEMO_USER_EMAIL.to_string(),
        base_currency: CurrencyCode::parse(DEMO_BASE_CURRENCY).map_err(seed_error)?,
    };
    storage.upsert_user(&user).await?;

    for existing in storage.list_subscriptions(&user.id).await? {
        storage.delete_subscription(&user.id, &existing.id).await?;
    }

    let subs = DEMO_SUBSCRIPTIONS
        .iter()
        .map(|d| {
            Ok(NewSubscription {
                name: d.name.to_string(),
                provider: Some(d.name.split_whitespace().next().unwrap_or(d.name).to_string()),
                cost: Decimal::from_str(d.cost).map_err(seed_error)?,
                currency: CurrencyCode::parse(d.currency).map_err(seed_error)?,
                billing_cycle: d.cycle,
                status: d.status,
                start_date: demo_date(d.start)?,
                next_bill_date: demo_date(d.next)?,
                category: Some(d.category.to_string()),
                description: Some(d.description.to_string()),
            })
        })
        .collect::<Result<Vec<_>, ClarityError>>()?;
    let ids = storage.insert_subscriptions(&user.id, subs, now).await?;
    info!(user_id = %user.id, count = ids.len(), "seeded demo subscriptions");

    if let Some(first) = ids.first() {
        storage
            .insert_alert(&Alert {
                id: DEMO_ALERT_ID.to_string(),
                user_id: user.id.clone(),
                subscription_id: Some(first.clone()),
                alert_type: "RENEWAL".to_string(),
                severity: AlertSeverity::Info,
                message: format!("{} renews soon", DEMO_SUBSCRIPTIONS[0].name),
                trigger_date: now,
                is_read: false,
            })
            .await?;
    }
    Ok(())
}
