use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::db::ClarityStorage;
use crate::error::ClarityError;
use crate::middleware::CallerId;
use crate::router::ClarityState;
use crate::service::importer::RawSubscriptionFields;
use crate::service::normalizer::{NormalizedSubscription, normalize_subscription};
use crate::service::rates::load_rate_map;
use crate::service::summary::{SpendSummary, summarize};
use crate::types::{Alert, AuditAction, AuditEntry, RateMap, Subscription, User};

/// The caller's profile plus the rate map for this request.
pub struct UserContext {
    pub user: User,
    pub rates: RateMap,
}

pub async fn load_user_context(
    storage: &ClarityStorage,
    user_id: &str,
) -> Result<UserContext, ClarityError> {
    let (user, rates) = futures::try_join!(storage.get_user(user_id), load_rate_map(storage))?;
    let user = user.ok_or_else(|| ClarityError::UserNotFound(user_id.to_string()))?;
    Ok(UserContext { user, rates })
}

impl UserContext {
    pub fn normalize(&self, sub: Subscription) -> NormalizedSubscription {
        normalize_subscription(sub, self.user.base_currency.as_str(), &self.rates)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMeta {
    pub base_currency: String,
    pub count: usize,
    pub missing_rates: Vec<String>,
    #[serde(flatten)]
    pub summary: SpendSummary,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub data: Vec<NormalizedSubscription>,
    pub alerts: Vec<Alert>,
    pub meta: DashboardMeta,
}

/// GET /api/subscriptions
pub async fn list_subscriptions(
    State(state): State<ClarityState>,
    CallerId(user_id): CallerId,
) -> Result<Json<DashboardResponse>, ClarityError> {
    let ctx = load_user_context(&state.storage, &user_id).await?;
    let (subs, alerts) = futures::try_join!(
        state.storage.list_subscriptions(&user_id),
        state.storage.list_alerts(&user_id)
    )?;

    let normalized: Vec<NormalizedSubscription> =
        subs.into_iter().map(|s| ctx.normalize(s)).collect();

    let missing_rates: BTreeSet<String> = normalized
        .iter()
        .flat_map(|n| n.missing_rates.iter().cloned())
        .collect();
    let summary = summarize(&normalized);

    debug!(
        user_id = %user_id,
        count = normalized.len(),
        missing = missing_rates.len(),
        "dashboard computed"
    );

    Ok(Json(DashboardResponse {
        meta: DashboardMeta {
            base_currency: ctx.user.base_currency.to_string(),
            count: normalized.len(),
            missing_rates: missing_rates.into_iter().collect(),
            summary,
        },
        data: normalized,
        alerts,
    }))
}

/// A cost may arrive as a JSON number or a numeric string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CostValue {
    Number(serde_json::Number),
    Text(String),
}

impl CostValue {
    fn into_raw(self) -> String {
        match self {
            CostValue::Number(n) => n.to_string(),
            CostValue::Text(s) => s,
        }
    }
}

/// JSON body for create and partial update.
///
/// On update only the fields present are changed; a blank string clears an
/// optional field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubscriptionInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<CostValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_cycle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_bill_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SubscriptionInput {
    /// Overlay the provided fields onto `base`.
    pub fn apply_to(self, base: RawSubscriptionFields) -> RawSubscriptionFields {
        RawSubscriptionFields {
            name: self.name.or(base.name),
            provider: self.provider.or(base.provider),
            cost: self.cost.map(CostValue::into_raw).or(base.cost),
            currency: self.currency.or(base.currency),
            billing_cycle: self.billing_cycle.or(base.billing_cycle),
            start_date: self.start_date.or(base.start_date),
            next_bill_date: self.next_bill_date.or(base.next_bill_date),
            status: self.status.or(base.status),
            category: self.category.or(base.category),
            description: self.description.or(base.description),
        }
    }
}

fn validation_error(messages: Vec<String>) -> ClarityError {
    ClarityError::Validation(messages.join("; "))
}

/// POST /api/subscriptions
pub async fn create_subscription(
    State(state): State<ClarityState>,
    CallerId(user_id): CallerId,
    Json(input): Json<SubscriptionInput>,
) -> Result<impl IntoResponse, ClarityError> {
    let ctx = load_user_context(&state.storage, &user_id).await?;
    let now = Utc::now();

    let new_sub = input
        .apply_to(RawSubscriptionFields::default())
        .validate(now)
        .map_err(validation_error)?;
    let created = state
        .storage
        .insert_subscription(&user_id, new_sub, now)
        .await?;

    info!(user_id = %user_id, subscription_id = %created.id, "subscription created");
    state
        .storage
        .log_audit(AuditEntry {
            user_id: user_id.clone(),
            subscription_id: Some(created.id.clone()),
            action: AuditAction::Create,
            payload: serde_json::to_value(&created).ok(),
        })
        .await;

    Ok((StatusCode::CREATED, Json(ctx.normalize(created))))
}

/// GET /api/subscriptions/{id}
pub async fn get_subscription(
    State(state): State<ClarityState>,
    CallerId(user_id): CallerId,
    Path(id): Path<String>,
) -> Result<Json<NormalizedSubscription>, ClarityError> {
    let ctx = load_user_context(&state.storage, &user_id).await?;
    let sub = state
        .storage
        .get_subscription(&user_id, &id)
        .await?
        .ok_or_else(|| ClarityError::SubscriptionNotFound(id.clone()))?;
    Ok(Json(ctx.normalize(sub)))
}

/// PATCH /api/subscriptions/{id}
pub async fn update_subscription(
    State(state): State<ClarityState>,
    CallerId(user_id): CallerId,
    Path(id): Path<String>,
    Json(input): Json<SubscriptionInput>,
) -> Result<Json<NormalizedSubscription>, ClarityError> {
    let ctx = load_user_context(&state.storage, &user_id).await?;
    let existing = state
        .storage
        .get_subscription(&user_id, &id)
        .await?
        .ok_or_else(|| ClarityError::SubscriptionNotFound(id.clone()))?;

    let now = Utc::now();
    let changes = serde_json::to_value(&input).ok();
    let validated = input
        .apply_to(RawSubscriptionFields::from(&existing))
        .validate(now)
        .map_err(validation_error)?;

    let mut updated = validated.into_subscription(existing.id, existing.user_id, existing.created_at);
    updated.updated_at = now;

    if !state.storage.update_subscription(&updated).await? {
        return Err(ClarityError::SubscriptionNotFound(id));
    }

    info!(user_id = %user_id, subscription_id = %updated.id, "subscription updated");
    state
        .storage
        .log_audit(AuditEntry {
            user_id: user_id.clone(),
            subscription_id: Some(updated.id.clone()),
            action: AuditAction::Update,
            payload: changes,
        })
        .await;

    Ok(Json(ctx.normalize(updated)))
}

/// DELETE /api/subscriptions/{id}
pub async fn delete_subscription(
    State(state): State<ClarityState>,
    CallerId(user_id): CallerId,
    Path(id): Path<String>,
) -> Result<StatusCode, ClarityError> {
    if !state.storage.delete_subscription(&user_id, &id).await? {
        return Err(ClarityError::SubscriptionNotFound(id));
    }

    info!(user_id = %user_id, subscription_id = %id, "subscription deleted");
    state
        .storage
        .log_audit(AuditEntry {
            user_id,
            subscription_id: Some(id.clone()),
            action: AuditAction::Delete,
            payload: Some(json!({ "id": id })),
        })
        .await;

    Ok(StatusCode::NO_CONTENT)
}
