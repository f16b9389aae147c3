//! HTTP layer tests
//!
//! Drives the router end to end over the in-process store:
//! - Bearer token authentication and role checks
//! - Status codes and error codes for ledger failures
//! - Movement, reversal and alert endpoints

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use optica_ledger::config::{
    Config, DatabaseConfig, JwtConfig, LedgerConfig, ServerConfig,
};
use optica_ledger::middleware::{encode_token, Claims};
use optica_ledger::store::MemoryLedgerStore;
use optica_ledger::{create_app, AppState};
use serde_json::{json, Value};
use shared::Role;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "api-test-secret";

// ============================================================================
// Helpers
// ============================================================================

fn test_config() -> Config {
    Config {
        environment: "test".to_string(),
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout_secs: 1,
        },
        jwt: JwtConfig {
            secret: SECRET.to_string(),
        },
        ledger: LedgerConfig::default(),
    }
}

fn app() -> Router {
    let store = Arc::new(MemoryLedgerStore::new());
    create_app(AppState::new(store, test_config()))
}

fn token(role: Role) -> String {
    encode_token(
        &Claims::new(Uuid::new_v4(), role, chrono::Duration::hours(1)),
        SECRET,
    )
    .unwrap()
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn key_json() -> Value {
    json!({
        "product_id": Uuid::new_v4(),
        "branch_id": Uuid::new_v4(),
        "color_id": Uuid::new_v4(),
        "brand_id": Uuid::new_v4(),
    })
}

fn with(mut base: Value, extra: Value) -> Value {
    if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    base
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/v1/alerts", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_bad_token_is_rejected() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/v1/alerts", Some("not-a-jwt"), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_health_is_public() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_staff_cannot_create_records() {
    let app = app();
    let staff = token(Role::Staff);
    let (status, body) = send(&app, "POST", "/api/v1/stock", Some(&staff), Some(key_json())).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_PERMISSIONS");
}

// ============================================================================
// Ledger flows
// ============================================================================

#[tokio::test]
async fn test_stock_movement_reversal_flow() {
    let app = app();
    let admin = token(Role::Admin);
    let staff = token(Role::Staff);
    let key = key_json();

    let (status, record) = send(
        &app,
        "POST",
        "/api/v1/stock",
        Some(&admin),
        Some(with(key.clone(), json!({ "min_quantity": 5 }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["quantity"], 0);
    let record_id = record["id"].as_str().unwrap().to_string();

    let (status, inbound) = send(
        &app,
        "POST",
        "/api/v1/movements",
        Some(&staff),
        Some(with(key.clone(), json!({ "kind": "inbound", "delta": 20, "reason": "delivery" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(inbound["quantity_after"], 20);

    let (status, sale) = send(
        &app,
        "POST",
        "/api/v1/movements",
        Some(&staff),
        Some(with(key.clone(), json!({ "kind": "salida", "delta": -16, "reason": "sale" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sale["quantity_after"], 4);
    let sale_id = sale["id"].as_str().unwrap().to_string();

    // Low stock shows up as "bajo"
    let (status, alerts) = send(&app, "GET", "/api/v1/alerts", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alerts["data"][0]["record_id"], record_id.as_str());
    assert_eq!(alerts["data"][0]["status"], "bajo");

    // Staff may not reverse
    let reverse_uri = format!("/api/v1/movements/{}/reverse", sale_id);
    let (status, _) = send(
        &app,
        "POST",
        &reverse_uri,
        Some(&staff),
        Some(json!({ "reason": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, compensation) = send(
        &app,
        "POST",
        &reverse_uri,
        Some(&admin),
        Some(json!({ "reason": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(compensation["delta"], 16);
    assert_eq!(compensation["kind"], "adjustment");

    let (status, body) = send(
        &app,
        "POST",
        &reverse_uri,
        Some(&admin),
        Some(json!({ "reason": "again" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_REVERSED");

    let (status, record) = send(
        &app,
        "GET",
        &format!("/api/v1/stock/{}", record_id),
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["quantity"], 20);

    let (status, history) = send(
        &app,
        "GET",
        &format!("/api/v1/stock/{}/movements", record_id),
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 3);
    assert_eq!(history[1]["reversed"], true);

    let (status, report) = send(
        &app,
        "GET",
        &format!("/api/v1/stock/{}/reconciliation", record_id),
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["consistent"], true);
}

#[tokio::test]
async fn test_insufficient_stock_is_unprocessable() {
    let app = app();
    let admin = token(Role::Admin);
    let key = key_json();

    send(&app, "POST", "/api/v1/stock", Some(&admin), Some(key.clone())).await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/movements",
        Some(&admin),
        Some(with(key, json!({ "kind": "outbound", "delta": -1, "reason": "sale" }))),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
}

#[tokio::test]
async fn test_staff_adjustment_forbidden() {
    let app = app();
    let admin = token(Role::Admin);
    let staff = token(Role::Staff);
    let key = key_json();

    send(&app, "POST", "/api/v1/stock", Some(&admin), Some(key.clone())).await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/movements",
        Some(&staff),
        Some(with(key, json!({ "kind": "adjustment", "delta": 3, "reason": "count" }))),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_movements_rejected() {
    let app = app();
    let admin = token(Role::Admin);
    let key = key_json();
    send(&app, "POST", "/api/v1/stock", Some(&admin), Some(key.clone())).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/movements",
        Some(&admin),
        Some(with(key.clone(), json!({ "kind": "inbound", "delta": -5, "reason": "oops" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_MOVEMENT");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/movements",
        Some(&admin),
        Some(with(key, json!({ "kind": "inbound", "delta": 5, "reason": "" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_lookup_and_annul() {
    let app = app();
    let admin = token(Role::Admin);
    let key = key_json();

    let (_, record) = send(&app, "POST", "/api/v1/stock", Some(&admin), Some(key.clone())).await;
    let record_id = record["id"].as_str().unwrap().to_string();

    let lookup_uri = format!(
        "/api/v1/stock/lookup?product_id={}&branch_id={}&color_id={}&brand_id={}",
        key["product_id"].as_str().unwrap(),
        key["branch_id"].as_str().unwrap(),
        key["color_id"].as_str().unwrap(),
        key["brand_id"].as_str().unwrap(),
    );
    let (status, found) = send(&app, "GET", &lookup_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], record_id.as_str());

    let (status, duplicate) =
        send(&app, "POST", "/api/v1/stock", Some(&admin), Some(key.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(duplicate["error"]["code"], "DUPLICATE_RECORD");

    let record_uri = format!("/api/v1/stock/{}", record_id);
    let (status, annulled) = send(&app, "DELETE", &record_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!annulled["annulled_at"].is_null());

    let (status, body) = send(&app, "GET", &lookup_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "RECORD_NOT_FOUND");

    let (status, _) = send(&app, "DELETE", &record_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_alert_status_filter_and_cursor() {
    let app = app();
    let admin = token(Role::Admin);
    for _ in 0..3 {
        send(
            &app,
            "POST",
            "/api/v1/stock",
            Some(&admin),
            Some(with(key_json(), json!({ "min_quantity": 2 }))),
        )
        .await;
    }

    let (status, page) = send(
        &app,
        "GET",
        "/api/v1/alerts?status=agotado&limit=2",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["data"][0]["status"], "agotado");
    let cursor = page["next_cursor"].as_str().unwrap().to_string();

    let (status, rest) = send(
        &app,
        "GET",
        &format!("/api/v1/alerts?status=agotado&limit=2&after={}", cursor),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rest["data"].as_array().unwrap().len(), 1);
    assert!(rest["next_cursor"].is_null());

    let (status, body) = send(&app, "GET", "/api/v1/alerts?status=meh", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_movement_is_not_found() {
    let app = app();
    let staff = token(Role::Staff);
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/movements/{}", Uuid::new_v4()),
        Some(&staff),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "MOVEMENT_NOT_FOUND");
}

#[tokio::test]
async fn test_reconciliation_sweep_is_admin_only() {
    let app = app();
    let (status, _) = send(
        &app,
        "GET",
        "/api/v1/reconciliation",
        Some(&token(Role::Staff)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "GET",
        "/api/v1/reconciliation",
        Some(&token(Role::Admin)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}
