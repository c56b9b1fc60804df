use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use clarity::config::Config;
use clarity::db::{ClarityStorage, seed};
use clarity::router::{ClarityState, clarity_router};

const DEMO: &str = seed::DEMO_USER_ID;

async fn spawn_app(cfg: Config) -> (Router, ClarityStorage) {
    let storage = ClarityStorage::connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");
    seed::seed_demo(&storage).await.expect("seed failed");
    let state = ClarityState::new(storage.clone(), Arc::new(cfg)).expect("state");
    (clarity_router(state), storage)
}

fn unreachable_fx() -> Config {
    Config {
        fx_url: "http://127.0.0.1:9/latest".parse().expect("url"),
        fx_timeout_secs: 2,
        ..Config::default()
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.expect("request failed");
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::empty()).expect("failed to build request")
}

fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", DEMO)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

fn csv_req(uri: &str, csv: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", DEMO)
        .header("content-type", "text/csv")
        .body(Body::from(csv.to_string()))
        .expect("failed to build request")
}

#[tokio::test]
async fn dashboard_returns_normalized_subscriptions_and_meta() {
    let (app, _) = spawn_app(Config::default()).await;

    let (status, body) = send(&app, get("/api/subscriptions", Some(DEMO))).await;
    assert_eq!(status, StatusCode::OK);

    let meta = &body["meta"];
    assert_eq!(meta["baseCurrency"], "GBP");
    assert_eq!(meta["count"], 7);
    assert_eq!(meta["statusCounts"]["ACTIVE"], 6);
    assert_eq!(meta["statusCounts"]["PAUSED"], 1);
    assert_eq!(meta["missingRates"].as_array().map(Vec::len), Some(0));
    assert!(meta["totalMonthlySpend"].as_f64().unwrap_or_default() > 0.0);
    assert!(meta["spendByCategory"]["Design"].is_number());

    let data = body["data"].as_array().expect("data array");
    assert_eq!(data.len(), 7);
    // ordered by next bill date; the weekly plan renews first
    assert_eq!(data[0]["name"], "Duolingo Super");
    assert_eq!(data[0]["wasConverted"], true);
    assert!(data[0]["displayNote"].as_str().unwrap_or("").starts_with("Approx GBP"));

    let adobe = data
        .iter()
        .find(|s| s["name"] == "Adobe Creative Cloud")
        .expect("adobe present");
    assert_eq!(adobe["wasConverted"], false);
    assert!(adobe["displayNote"].is_null());

    assert_eq!(body["alerts"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["alerts"][0]["type"], "RENEWAL");
}

#[tokio::test]
async fn caller_identity_is_required_and_must_exist() {
    let (app, _) = spawn_app(Config::default()).await;

    let (status, body) = send(&app, get("/api/subscriptions", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_USER_ID");

    let (status, body) = send(&app, get("/api/subscriptions", Some("ghost"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = send(&app, get("/api/subscriptions?userId=demo-user", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 7);
}

#[tokio::test]
async fn configured_demo_user_is_used_as_fallback() {
    let cfg = Config {
        demo_user_id: Some(DEMO.to_string()),
        ..Config::default()
    };
    let (app, _) = spawn_app(cfg).await;

    let (status, body) = send(&app, get("/api/subscriptions", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["baseCurrency"], "GBP");
}

#[tokio::test]
async fn subscription_crud_round_trip_is_audited() {
    let (app, storage) = spawn_app(Config::default()).await;

    let (status, created) = send(
        &app,
        json_req(
            "POST",
            "/api/subscriptions",
            serde_json::json!({
                "name": "Hulu",
                "cost": "7.99",
                "currency": "usd",
                "billingCycle": "monthly",
                "category": "Streaming"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["currency"], "USD");
    assert_eq!(created["billingCycle"], "MONTHLY");
    assert_eq!(created["status"], "ACTIVE");
    let id = created["id"].as_str().expect("id").to_string();

    let (status, fetched) = send(&app, get(&format!("/api/subscriptions/{id}"), Some(DEMO))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Hulu");

    let (status, patched) = send(
        &app,
        json_req(
            "PATCH",
            &format!("/api/subscriptions/{id}"),
            serde_json::json!({ "cost": 9.5, "status": "paused" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["cost"], 9.5);
    assert_eq!(patched["status"], "PAUSED");
    assert_eq!(patched["name"], "Hulu");
    assert_eq!(patched["createdAt"], created["createdAt"]);

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/subscriptions/{id}"))
        .header("x-user-id", DEMO)
        .body(Body::empty())
        .expect("failed to build request");
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, get(&format!("/api/subscriptions/{id}"), Some(DEMO))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    assert_eq!(storage.count_audit(DEMO).await.expect("count"), 3);
}

#[tokio::test]
async fn invalid_create_reports_every_problem() {
    let (app, storage) = spawn_app(Config::default()).await;

    let (status, body) = send(
        &app,
        json_req(
            "POST",
            "/api/subscriptions",
            serde_json::json!({ "cost": -1, "currency": "usd" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let message = body["error"]["message"].as_str().unwrap_or("");
    assert!(message.contains("Name is required"));
    assert!(message.contains("Cost must be zero or greater"));

    assert_eq!(storage.count_audit(DEMO).await.expect("count"), 0);
}

#[tokio::test]
async fn import_previews_then_commits_valid_rows() {
    let (app, storage) = spawn_app(Config::default()).await;
    let csv = "name,cost,currency,billingCycle,category\n\
               Hulu,7.99,USD,MONTHLY,Streaming\n\
               Broken,-3,EUR,MONTHLY,\n\
               Dropbox,119.88,USD,yearly,Storage\n";

    let (status, preview) = send(&app, csv_req("/api/subscriptions/import", csv)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["stats"]["totalRows"], 3);
    assert_eq!(preview["stats"]["valid"], 2);
    assert_eq!(preview["stats"]["invalid"], 1);
    assert_eq!(preview["stats"]["created"], 0);
    assert_eq!(preview["stats"]["committed"], false);
    assert_eq!(preview["errors"][0]["row"], 2);
    assert_eq!(preview["preview"][0]["id"], "preview-0");
    assert_eq!(preview["preview"][1]["id"], "preview-2");
    assert_eq!(storage.list_subscriptions(DEMO).await.expect("list").len(), 7);

    let (status, committed) =
        send(&app, csv_req("/api/subscriptions/import?commit=true", csv)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(committed["stats"]["created"], 2);
    assert_eq!(committed["stats"]["committed"], true);
    assert_eq!(storage.list_subscriptions(DEMO).await.expect("list").len(), 9);
    assert_eq!(storage.count_audit(DEMO).await.expect("count"), 1);
}

#[tokio::test]
async fn import_rejects_empty_and_oversized_payloads() {
    let cfg = Config {
        import_body_limit: 256,
        ..Config::default()
    };
    let (app, _) = spawn_app(cfg).await;

    let (status, body) = send(&app, csv_req("/api/subscriptions/import", "   \n")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "CSV payload is empty");

    let oversized = format!("name,cost,currency\n{}", "Netflix,1,USD\n".repeat(64));
    let (status, _) = send(&app, csv_req("/api/subscriptions/import", &oversized)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn refresh_requires_the_configured_key() {
    let cfg = Config {
        fx_refresh_api_key: Some("s3cret".to_string()),
        ..unreachable_fx()
    };
    let (app, _) = spawn_app(cfg).await;

    let (status, body) = send(&app, get("/api/exchange-rates/refresh", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let wrong = Request::builder()
        .uri("/api/exchange-rates/refresh")
        .header("x-api-key", "nope")
        .body(Body::empty())
        .expect("failed to build request");
    let (status, _) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_failures_map_to_bad_gateway_then_rate_limit() {
    let cfg = Config {
        refresh_rate_limit: 2,
        ..unreachable_fx()
    };
    let (app, storage) = spawn_app(cfg).await;
    let before = storage.list_exchange_rates().await.expect("rates");

    for _ in 0..2 {
        let (status, body) = send(&app, get("/api/exchange-rates/refresh", None)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "FX_REFRESH_FAILED");
    }

    let (status, body) = send(&app, get("/api/exchange-rates/refresh", None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");

    // a different caller has its own window
    let other = Request::builder()
        .uri("/api/exchange-rates/refresh")
        .header("x-forwarded-for", "10.0.0.9")
        .body(Body::empty())
        .expect("failed to build request");
    let (status, _) = send(&app, other).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    // a failed refresh leaves the cache untouched
    let after = storage.list_exchange_rates().await.expect("rates");
    assert_eq!(before, after);
}

#[tokio::test]
async fn health_is_open() {
    let (app, _) = spawn_app(Config::default()).await;
    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn oversized_cost_is_rejected_before_storage() {
    let (app, storage) = spawn_app(Config::default()).await;

    let (status, body) = send(
        &app,
        json_req(
            "POST",
            "/api/subscriptions",
            serde_json::json!({
                "name": "Whale",
                "cost": "79228162514264337593543950335",
                "currency": "USD",
                "billingCycle": "WEEKLY"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Cost is too large");
    assert_eq!(storage.list_subscriptions(DEMO).await.expect("list").len(), 7);

    let (status, _) = send(&app, get("/api/subscriptions", Some(DEMO))).await;
    assert_eq!(status, StatusCode::OK);
}
