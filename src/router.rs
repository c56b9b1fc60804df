use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::api::FxApi;
use crate::config::Config;
use crate::db::ClarityStorage;
use crate::error::ClarityError;
use crate::handlers::{exchange_rates, import, subscriptions};
use crate::service::rate_limit::SlidingWindowLimiter;

#[derive(Clone)]
pub struct ClarityState {
    pub storage: ClarityStorage,
    pub fx: FxApi,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub config: Arc<Config>,
}

impl ClarityState {
    pub fn new(storage: ClarityStorage, config: Arc<Config>) -> Result<Self, ClarityError> {
        let fx = FxApi::new(
            config.fx_url.clone(),
            config.fx_timeout(),
            config.fx_upstream_per_minute,
        )?;
        let limiter = Arc::new(SlidingWindowLimiter::new(
            config.refresh_rate_limit,
            config.refresh_rate_window(),
        ));
        Ok(Self {
            storage,
            fx,
            limiter,
            config,
        })
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub fn clarity_router(state: ClarityState) -> Router {
    let import_limit = state.config.import_body_limit;

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/subscriptions",
            get(subscriptions::list_subscriptions).post(subscriptions::create_subscription),
        )
        .route(
            "/api/subscriptions/import",
            post(import::import_subscriptions).layer(DefaultBodyLimit::max(import_limit)),
        )
        .route(
            "/api/subscriptions/{id}",
            get(subscriptions::get_subscription)
                .patch(subscriptions::update_subscription)
                .delete(subscriptions::delete_subscription),
        )
        .route(
            "/api/exchange-rates/refresh",
            get(exchange_rates::refresh_rates),
        )
        .with_state(state)
}
