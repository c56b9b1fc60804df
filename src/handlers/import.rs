use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::error::ClarityError;
use crate::handlers::subscriptions::load_user_context;
use crate::middleware::CallerId;
use crate::router::ClarityState;
use crate::service::importer::{ImportContext, ImportOutcome, run_import};
use crate::types::{AuditAction, AuditEntry};

#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    pub commit: Option<String>,
}

impl ImportQuery {
    fn should_commit(&self) -> bool {
        self.commit.as_deref() == Some("true")
    }
}

/// POST /api/subscriptions/import[?commit=true]
///
/// Body is raw CSV text. Without `commit=true` nothing is written.
pub async fn import_subscriptions(
    State(state): State<ClarityState>,
    CallerId(user_id): CallerId,
    Query(query): Query<ImportQuery>,
    body: String,
) -> Result<Json<ImportOutcome>, ClarityError> {
    let ctx = load_user_context(&state.storage, &user_id).await?;

    let import_ctx = ImportContext {
        user_id: &user_id,
        base_currency: ctx.user.base_currency.as_str(),
        rates: &ctx.rates,
        now: Utc::now(),
    };
    let outcome = run_import(&state.storage, &body, &import_ctx, query.should_commit()).await?;

    if outcome.stats.created > 0 {
        state
            .storage
            .log_audit(AuditEntry {
                user_id: user_id.clone(),
                subscription_id: None,
                action: AuditAction::Import,
                payload: Some(json!({
                    "created": outcome.stats.created,
                    "invalid": outcome.stats.invalid,
                })),
            })
            .await;
    }

    Ok(Json(outcome))
}
