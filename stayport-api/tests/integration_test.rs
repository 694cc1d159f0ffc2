use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use stayport_api::notifications::Notifier;
use stayport_api::state::{AppState, CookieConfig, SecurityConfig};
use stayport_api::stripe::{sign_payload, StripeClient};
use stayport_api::{app, catalog};
use stayport_core::token::TokenCacheStore;
use stayport_pms::{PmsClient, PmsConfig};
use stayport_store::app_config::NotificationSettings;
use stayport_store::portal_codes::PortalCodeStore;
use stayport_store::rate_limit::RateLimiter;
use stayport_store::sessions::SessionStore;
use stayport_store::token_cache::MemoryTokenCache;
use stayport_store::upsell_requests::UpsellLedger;
use stayport_store::RedisClient;
use tower::util::ServiceExt;

const WEBHOOK_SECRET: &str = "whsec_test";

/// State wired against unreachable backends: the store client points at a
/// closed port, so every handler path that degrades without the store is
/// exercised for real.
async fn test_state() -> AppState {
    let redis = Arc::new(
        RedisClient::new("redis://127.0.0.1:1")
            .await
            .expect("client construction does not connect"),
    );
    let token_cache: Arc<dyn TokenCacheStore> = Arc::new(MemoryTokenCache::new());

    let pms = Arc::new(PmsClient::new(
        PmsConfig {
            api_url: "http://127.0.0.1:1/v1".to_string(),
            oauth_url: "http://127.0.0.1:1/oauth2/token".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            access_token_override: Some("manual-token".to_string()),
            portal_code_field_id: "field-1".to_string(),
        },
        token_cache,
    ));

    let http = reqwest::Client::new();
    let stripe = Arc::new(StripeClient::new(
        http.clone(),
        "sk_test_123".to_string(),
        WEBHOOK_SECRET.to_string(),
        "http://127.0.0.1:1/v1".to_string(),
        "http://localhost:3000".to_string(),
    ));
    let notifier = Arc::new(Notifier::new(http, NotificationSettings::default()));

    AppState {
        redis: redis.clone(),
        sessions: Arc::new(SessionStore::new(redis.clone(), 60 * 60 * 24)),
        portal_codes: Arc::new(PortalCodeStore::new(redis.clone())),
        ledger: Arc::new(UpsellLedger::new(redis.clone())),
        limiter: Arc::new(RateLimiter::new(redis.clone(), true)),
        pms,
        stripe,
        notifier,
        catalog: Arc::new(catalog::build(&[])),
        security: SecurityConfig {
            admin_secret: Some("admin-secret".to_string()),
            cron_secret: Some("cron-secret".to_string()),
            pms_webhook_secret: Some("hook-secret".to_string()),
        },
        cookies: CookieConfig { secure: false },
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_demo_login_issues_session_cookie() {
    let app = app(test_state().await);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth",
            serde_json::json!({ "code": "DEMO123" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|h| h.to_str().ok())
        .expect("session cookie is set");
    assert!(cookie.contains("guest_session=demo"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));

    let body = body_json(response).await;
    assert_eq!(body["session"]["is_demo"], true);
    assert_eq!(body["reservation"]["confirmation_code"], "DEMO123");
}

#[tokio::test]
async fn test_login_requires_a_code() {
    let app = app(test_state().await);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth",
            serde_json::json!({ "code": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_introspection_with_demo_cookie() {
    let app = app(test_state().await);

    let request = Request::builder()
        .method("GET")
        .uri("/api/auth/session")
        .header(header::COOKIE, "guest_session=demo")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["session"]["guest_name"], "Jordan Smith");
}

#[tokio::test]
async fn test_session_introspection_without_session_clears_cookie() {
    let app = app(test_state().await);

    let request = Request::builder()
        .method("GET")
        .uri("/api/auth/session")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|h| h.to_str().ok())
        .expect("removal cookie is set");
    assert!(cookie.contains("guest_session="));

    let body = body_json(response).await;
    assert_eq!(body["authenticated"], false);
}

#[tokio::test]
async fn test_logout_is_idempotent_without_a_session() {
    let app = app(test_state().await);

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/auth/session")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_checkout_rejects_empty_cart_before_any_external_call() {
    let app = app(test_state().await);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/upsells/checkout",
            serde_json::json!({ "items": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No items provided");
}

#[tokio::test]
async fn test_checkout_rejects_cart_of_unknown_items() {
    let app = app(test_state().await);

    let request = Request::builder()
        .method("POST")
        .uri("/api/upsells/checkout")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, "guest_session=demo")
        .body(Body::from(
            serde_json::json!({ "items": [{ "upsell_id": "jet-ski" }] }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No valid items found");
}

#[tokio::test]
async fn test_catalog_scopes_pool_heating_to_demo_listing() {
    let app = app(test_state().await);

    let request = Request::builder()
        .method("GET")
        .uri("/api/upsells")
        .header(header::COOKIE, "guest_session=demo")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let ids: Vec<&str> = body["upsells"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"pool-heating"));
    assert!(ids.contains(&"early-checkin"));
}

#[tokio::test]
async fn test_demo_reservation_fetch_makes_no_external_calls() {
    let app = app(test_state().await);

    let request = Request::builder()
        .method("GET")
        .uri("/api/reservation")
        .header(header::COOKIE, "guest_session=demo")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["reservation"]["id"], "demo-reservation-001");
    assert_eq!(body["payments"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_admin_endpoint_rejects_missing_bearer() {
    let app = app(test_state().await);

    let request = Request::builder()
        .method("GET")
        .uri("/api/admin/generate-codes")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cron_endpoint_rejects_wrong_bearer() {
    let app = app(test_state().await);

    let request = Request::builder()
        .method("POST")
        .uri("/api/cron/upsell-reminders")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stripe_webhook_requires_signature() {
    let app = app(test_state().await);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/webhooks/stripe",
            serde_json::json!({ "type": "charge.captured", "data": { "object": {} } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stripe_webhook_rejects_bad_signature() {
    let app = app(test_state().await);

    let payload = serde_json::json!({ "type": "charge.captured", "data": { "object": {} } });
    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header(header::CONTENT_TYPE, "application/json")
        .header(
            "stripe-signature",
            format!("t={},v1={}", chrono::Utc::now().timestamp(), "0".repeat(64)),
        )
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stripe_webhook_acknowledges_signed_unhandled_events() {
    let app = app(test_state().await);

    let payload =
        serde_json::json!({ "type": "payment_intent.created", "data": { "object": {} } })
            .to_string();
    let now = chrono::Utc::now().timestamp();
    let signature = format!(
        "t={},v1={}",
        now,
        sign_payload(WEBHOOK_SECRET, now, payload.as_bytes())
    );

    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header(header::CONTENT_TYPE, "application/json")
        .header("stripe-signature", signature)
        .body(Body::from(payload))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn test_pms_webhook_ping() {
    let app = app(test_state().await);

    let request = Request::builder()
        .method("GET")
        .uri("/api/webhooks/pms")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_pms_webhook_rejects_wrong_secret() {
    let app = app(test_state().await);

    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/pms")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-webhook-secret", "wrong")
        .body(Body::from(
            serde_json::json!({ "event": "reservation.new", "_id": "res-1" }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_pms_webhook_reports_store_failure() {
    // Store is unreachable in this harness, so provisioning a new code
    // must surface as a server-side failure rather than a silent success.
    let app = app(test_state().await);

    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/pms")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-webhook-secret", "hook-secret")
        .body(Body::from(
            serde_json::json!({ "event": "reservation.new", "_id": "res-1" }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_pms_webhook_ignores_unrelated_events() {
    let app = app(test_state().await);

    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/pms")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-webhook-secret", "hook-secret")
        .body(Body::from(
            serde_json::json!({ "event": "listing.updated", "_id": "listing-1" }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Event ignored");
}
