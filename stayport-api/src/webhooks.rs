use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use stayport_core::upsell::{UpsellRequest, UpsellRequestItem, UpsellStatus};
use tracing::{error, info, warn};

use crate::catalog;
use crate::state::AppState;
use crate::stripe::{verify_webhook_signature, CheckoutSession, WebhookEvent};
use crate::upsells::CartItem;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/webhooks/stripe", post(stripe_webhook))
        .route("/api/webhooks/pms", post(pms_webhook).get(pms_webhook_ping))
}

// ============================================================================
// Stripe
// ============================================================================

/// POST /api/webhooks/stripe. Signature-checked event ingestion. Once the
/// signature is good the handler always acknowledges with 200, even when
/// internal processing fails: the provider would otherwise retry-storm a
/// handler that will fail the same way every time.
async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers.get("stripe-signature").and_then(|h| h.to_str().ok()) else {
        error!("Stripe webhook without signature header");
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "No signature" })))
            .into_response();
    };

    if let Err(err) = verify_webhook_signature(
        state.stripe.webhook_secret(),
        signature,
        &body,
        Utc::now().timestamp(),
    ) {
        error!("Stripe webhook signature verification failed: {}", err);
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid signature" })),
        )
            .into_response();
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            error!("Unparseable Stripe webhook payload: {}", err);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid payload" })),
            )
                .into_response();
        }
    };

    info!("Received Stripe webhook: {}", event.event_type);
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            if let Err(err) = handle_checkout_completed(&state, event.data.object).await {
                error!("Error processing checkout session: {}", err);
            }
        }
        "charge.captured" => {
            if let Err(err) = handle_charge_captured(&state, event.data.object).await {
                error!("Error processing captured charge: {}", err);
            }
        }
        other => info!("Ignoring Stripe event type {}", other),
    }

    Json(json!({ "received": true })).into_response()
}

async fn handle_checkout_completed(
    state: &AppState,
    object: serde_json::Value,
) -> anyhow::Result<()> {
    let session: CheckoutSession = serde_json::from_value(object)?;

    // Only checkouts this portal created carry a cart in their metadata
    let Some(items_metadata) = session.metadata.get("items") else {
        info!("Checkout session without upsell metadata, ignoring");
        return Ok(());
    };

    let cart: Vec<CartItem> = match serde_json::from_str(items_metadata) {
        Ok(cart) => cart,
        Err(err) => {
            warn!("Failed to parse cart metadata: {}", err);
            return Ok(());
        }
    };

    let reservation_id = session
        .metadata
        .get("reservation_id")
        .cloned()
        .unwrap_or_else(|| "Unknown".to_string());

    let items: Vec<UpsellRequestItem> = cart
        .iter()
        .map(|item| {
            let (name, price, currency) = match catalog::find(&state.catalog, &item.upsell_id) {
                Some(upsell) => {
                    let (name, price) = upsell.resolve_line(item.option_id.as_deref());
                    (name, price, upsell.currency.clone())
                }
                None => ("Unknown Item".to_string(), 0.0, "USD".to_string()),
            };
            UpsellRequestItem {
                upsell_id: item.upsell_id.clone(),
                option_id: item.option_id.clone(),
                name,
                price,
                currency,
            }
        })
        .collect();

    let total_amount = session.amount_total.unwrap_or(0) as f64 / 100.0;
    let currency = session.currency.clone().unwrap_or_else(|| "usd".to_string());

    // Enrich from the platform, best-effort: the notification goes out with
    // whatever details we could get.
    let mut guest_name = None;
    let mut property_name = None;
    let mut check_in_date = None;
    if reservation_id != "Unknown" && !crate::demo::is_demo_reservation(&reservation_id) {
        match state.pms.reservation_by_id(&reservation_id).await {
            Ok(Some(reservation)) => {
                check_in_date = reservation.check_in_date();
                guest_name = Some(reservation.guest_name.clone());
                if !reservation.listing_id.is_empty() {
                    match state.pms.listing(&reservation.listing_id).await {
                        Ok(Some(property)) => property_name = Some(property.nickname),
                        Ok(None) => {}
                        Err(err) => error!("Error fetching property details: {}", err),
                    }
                }
            }
            Ok(None) => warn!("Reservation {} not found upstream", reservation_id),
            Err(err) => error!("Error fetching reservation details: {}", err),
        }
    }

    let payment_intent_id = session
        .payment_intent_id()
        .unwrap_or("Unknown")
        .to_string();
    let customer_email = session.customer_details.and_then(|d| d.email);

    let request = UpsellRequest {
        id: payment_intent_id.clone(),
        reservation_id: reservation_id.clone(),
        items,
        total_amount,
        currency,
        payment_intent_id,
        customer_email,
        guest_name,
        property_name,
        check_in_date,
        status: UpsellStatus::Pending,
        created_at: Utc::now(),
        approved_at: None,
    };

    state.notifier.upsell_authorized(&request).await;

    if let Err(err) = state.ledger.store(&request).await {
        error!("Failed to store upsell request {}: {}", request.id, err);
    }

    if request.customer_email.is_some() {
        state.notifier.guest_confirmation(&request).await;
    }

    info!(
        "Processed checkout completion for reservation {}",
        reservation_id
    );
    Ok(())
}

async fn handle_charge_captured(
    state: &AppState,
    object: serde_json::Value,
) -> anyhow::Result<()> {
    let payment_intent_id = match &object["payment_intent"] {
        serde_json::Value::String(id) => Some(id.clone()),
        serde_json::Value::Object(obj) => {
            obj.get("id").and_then(|v| v.as_str()).map(str::to_string)
        }
        _ => None,
    };
    let Some(payment_intent_id) = payment_intent_id else {
        info!("Charge captured without payment intent, ignoring");
        return Ok(());
    };

    let Some(request) = state.ledger.find_by_payment_intent(&payment_intent_id).await? else {
        info!(
            "No upsell request found for payment intent {}",
            payment_intent_id
        );
        return Ok(());
    };

    // Replays land here as no-ops; the transition is one-way
    state
        .ledger
        .update_status(&request.id, UpsellStatus::Approved, Some(Utc::now()))
        .await?;
    info!("Updated upsell request {} to approved", request.id);

    if request.customer_email.is_some() {
        let approved = UpsellRequest {
            status: UpsellStatus::Approved,
            ..request
        };
        state.notifier.guest_charge_approved(&approved).await;
    }

    Ok(())
}

// ============================================================================
// Property-management platform
// ============================================================================

/// POST /api/webhooks/pms. Reservation events trigger portal-code
/// provisioning, and the code is re-synced into the platform on every
/// event so a previously failed sync heals itself.
async fn pms_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    if let Some(expected) = &state.security.pms_webhook_secret {
        let provided = headers.get("x-webhook-secret").and_then(|h| h.to_str().ok());
        if provided != Some(expected.as_str()) {
            error!("PMS webhook secret mismatch");
            return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" })))
                .into_response();
        }
    }

    let event_type = payload["event"]
        .as_str()
        .or_else(|| payload["type"].as_str());
    if let Some(event_type) = event_type {
        if !event_type.contains("reservation") && !event_type.contains("created") {
            info!("Ignoring non-reservation event: {}", event_type);
            return Json(json!({ "message": "Event ignored" })).into_response();
        }
    }

    let reservation = payload
        .get("reservation")
        .or_else(|| payload.pointer("/data/reservation"))
        .unwrap_or(&payload);
    let reservation_id = reservation["_id"]
        .as_str()
        .or_else(|| reservation["id"].as_str())
        .or_else(|| reservation["reservationId"].as_str());

    let Some(reservation_id) = reservation_id else {
        error!("No reservation ID found in webhook payload");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No reservation ID" })),
        )
            .into_response();
    };

    let (portal_code, created) = match state
        .portal_codes
        .lookup_by_reservation(reservation_id)
        .await
    {
        Some(code) => {
            info!(
                "Reservation {} already has portal code {}, ensuring platform sync",
                reservation_id, code
            );
            (code, false)
        }
        None => {
            let code = state.portal_codes.generate_unique_code().await;
            if !state.portal_codes.store_code(reservation_id, &code).await {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Failed to store portal code",
                        "reservation_id": reservation_id,
                    })),
                )
                    .into_response();
            }
            info!(
                "Generated portal code {} for reservation {}",
                code, reservation_id
            );
            (code, true)
        }
    };

    match state.pms.sync_portal_code(reservation_id, &portal_code).await {
        Ok(()) => Json(json!({
            "message": if created { "Portal code created and synced" } else { "Portal code synced" },
            "reservation_id": reservation_id,
            "portal_code": portal_code,
            "pms_synced": true,
        }))
        .into_response(),
        Err(err) => {
            // The code is stored; a later event or the admin sweep re-syncs it
            warn!("Portal code stored but platform sync failed: {}", err);
            Json(json!({
                "message": if created {
                    "Portal code created (platform sync failed)"
                } else {
                    "Portal code exists (platform sync failed)"
                },
                "reservation_id": reservation_id,
                "portal_code": portal_code,
                "pms_synced": false,
                "pms_error": err.to_string(),
            }))
            .into_response()
        }
    }
}

/// The platform probes the endpoint with a GET before enabling delivery.
async fn pms_webhook_ping() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "message": "PMS webhook endpoint" }))
}
