//! CSV import: parse, validate each row on its own, preview, optionally commit.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

use crate::db::ClarityStorage;
use crate::error::ClarityError;
use crate::service::normalizer::{NormalizedSubscription, normalize_subscription};
use crate::types::{
    BillingCycle, CurrencyCode, NewSubscription, RateMap, Subscription, SubscriptionStatus,
};

/// Unvalidated subscription fields, as they arrive from a CSV row or a JSON body.
///
/// Blank values are treated exactly like absent ones.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSubscriptionFields {
    pub name: Option<String>,
    pub provider: Option<String>,
    pub cost: Option<String>,
    pub currency: Option<String>,
    pub billing_cycle: Option<String>,
    pub start_date: Option<String>,
    pub next_bill_date: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl From<&Subscription> for RawSubscriptionFields {
    fn from(sub: &Subscription) -> Self {
        Self {
            name: Some(sub.name.clone()),
            provider: sub.provider.clone(),
            cost: Some(sub.cost.to_string()),
            currency: Some(sub.currency.to_string()),
            billing_cycle: Some(sub.billing_cycle.to_string()),
            start_date: Some(sub.start_date.to_rfc3339()),
            next_bill_date: Some(sub.next_bill_date.to_rfc3339()),
            status: Some(sub.status.to_string()),
            category: sub.category.clone(),
            description: sub.description.clone(),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn owned(value: &Option<String>) -> Option<String> {
    present(value).map(str::to_string)
}

/// Largest cost a single subscription may carry.
pub const MAX_COST: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Parse a non-negative amount; plain and scientific notation are accepted.
pub fn parse_cost(raw: &str) -> Result<Decimal, String> {
    let cost = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| format!("Invalid cost '{raw}'"))?;
    if cost.is_sign_negative() && !cost.is_zero() {
        return Err("Cost must be zero or greater".to_string());
    }
    if cost > MAX_COST {
        return Err("Cost is too large".to_string());
    }
    Ok(cost)
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS[.fff]` (UTC) and `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_optional_date(
    field: &str,
    value: &Option<String>,
    errors: &mut Vec<String>,
) -> Option<DateTime<Utc>> {
    let raw = present(value)?;
    let parsed = parse_date(raw);
    if parsed.is_none() {
        errors.push(format!("{field} '{raw}' is not a valid date"));
    }
    parsed
}

impl RawSubscriptionFields {
    /// Validate every field, collecting all problems instead of stopping at the first.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<NewSubscription, Vec<String>> {
        let mut errors = Vec::new();

        let name = owned(&self.name);
        if name.is_none() {
            errors.push("Name is required".to_string());
        }

        let cost = match present(&self.cost) {
            Some(raw) => parse_cost(raw).map_err(|e| errors.push(e)).ok(),
            None => {
                errors.push("Cost is required".to_string());
                None
            }
        };

        let currency = match present(&self.currency) {
            Some(raw) => CurrencyCode::parse(raw).map_err(|e| errors.push(e)).ok(),
            None => {
                errors.push("Currency is required".to_string());
                None
            }
        };

        let billing_cycle = match present(&self.billing_cycle) {
            Some(raw) => BillingCycle::from_str(raw)
                .map_err(|e| errors.push(e))
                .ok(),
            None => Some(BillingCycle::Monthly),
        };

        let status = match present(&self.status) {
            Some(raw) => SubscriptionStatus::from_str(raw)
                .map_err(|e| errors.push(e))
                .ok(),
            None => Some(SubscriptionStatus::Active),
        };

        let start = parse_optional_date("startDate", &self.start_date, &mut errors);
        let next = parse_optional_date("nextBillDate", &self.next_bill_date, &mut errors);

        let (Some(name), Some(cost), Some(currency), Some(billing_cycle), Some(status)) =
            (name, cost, currency, billing_cycle, status)
        else {
            return Err(errors);
        };
        if !errors.is_empty() {
            return Err(errors);
        }

        let next_bill_date = next.or(start).unwrap_or(now);
        let start_date = start.unwrap_or(next_bill_date);

        Ok(NewSubscription {
            name,
            provider: owned(&self.provider),
            cost,
            currency,
            billing_cycle,
            status,
            start_date,
            next_bill_date,
            category: owned(&self.category),
            description: owned(&self.description),
        })
    }
}

/// A rejected CSV row; `row` is the 1-based data row number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub total_rows: usize,
    pub valid: usize,
    pub invalid: usize,
    pub created: usize,
    pub committed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub preview: Vec<NormalizedSubscription>,
    pub stats: ImportStats,
    pub errors: Vec<RowError>,
}

/// Validated import, not yet persisted.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub total_rows: usize,
    pub valid: Vec<NewSubscription>,
    pub preview: Vec<NormalizedSubscription>,
    pub errors: Vec<RowError>,
}

impl ImportPlan {
    pub fn into_outcome(self, created: usize, committed: bool) -> ImportOutcome {
        ImportOutcome {
            stats: ImportStats {
                total_rows: self.total_rows,
                valid: self.valid.len(),
                invalid: self.errors.len(),
                created,
                committed,
            },
            preview: self.preview,
            errors: self.errors,
        }
    }
}

/// Who the import is for and how to price it.
pub struct ImportContext<'a> {
    pub user_id: &'a str,
    pub base_currency: &'a str,
    pub rates: &'a RateMap,
    pub now: DateTime<Utc>,
}

fn read_rows(csv_text: &str) -> Result<Vec<RawSubscriptionFields>, ClarityError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());

    reader
        .deserialize::<RawSubscriptionFields>()
        .collect::<Result<Vec<_>, csv::Error>>()
        .map_err(|e| {
            debug!(error = %e, "CSV parse failed");
            ClarityError::validation("Unable to parse CSV")
        })
}

/// Parse and validate a CSV payload without touching storage.
pub fn plan_import(csv_text: &str, ctx: &ImportContext<'_>) -> Result<ImportPlan, ClarityError> {
    if csv_text.trim().is_empty() {
        return Err(ClarityError::validation("CSV payload is empty"));
    }
    let rows = read_rows(csv_text)?;

    let mut valid = Vec::new();
    let mut preview = Vec::new();
    let mut errors = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        match row.validate(ctx.now) {
            Ok(new_sub) => {
                let stub = new_sub.clone().into_subscription(
                    format!("preview-{index}"),
                    ctx.user_id,
                    ctx.now,
                );
                preview.push(normalize_subscription(stub, ctx.base_currency, ctx.rates));
                valid.push(new_sub);
            }
            Err(messages) => errors.push(RowError {
                row: index + 1,
                message: messages.join("; "),
            }),
        }
    }

    Ok(ImportPlan {
        total_rows: rows.len(),
        valid,
        preview,
        errors,
    })
}

/// Validate, and when `commit` is set persist every valid row in one transaction.
pub async fn run_import(
    storage: &ClarityStorage,
    csv_text: &str,
    ctx: &ImportContext<'_>,
    commit: bool,
) -> Result<ImportOutcome, ClarityError> {
    let plan = plan_import(csv_text, ctx)?;

    let mut created = 0;
    if commit && !plan.valid.is_empty() {
        let ids = storage
            .insert_subscriptions(ctx.user_id, plan.valid.clone(), ctx.now)
            .await?;
        created = ids.len();
    }

    info!(
        user_id = ctx.user_id,
        total = plan.total_rows,
        invalid = plan.errors.len(),
        created,
        commit,
        "CSV import processed"
    );
    Ok(plan.into_outcome(created, commit))
}
