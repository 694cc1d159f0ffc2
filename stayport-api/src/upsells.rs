use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use stayport_core::upsell::{Upsell, UpsellCategory, UpsellRequest};
use tracing::error;

use crate::auth::require_session;
use crate::catalog;
use crate::error::AppError;
use crate::state::AppState;
use crate::stripe::CheckoutLine;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/upsells", get(list_catalog))
        .route("/api/upsells/checkout", post(create_checkout))
        .route("/api/upsells/requests", get(request_history))
        .route("/api/upsells/session", get(checkout_session_lookup))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CatalogQuery {
    category: Option<UpsellCategory>,
}

#[derive(Debug, Serialize)]
struct CatalogResponse {
    upsells: Vec<Upsell>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CartItem {
    pub upsell_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    items: Vec<CartItem>,
}

#[derive(Debug, Serialize)]
struct CheckoutResponse {
    url: String,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    upsells: Vec<UpsellRequest>,
}

#[derive(Debug, Deserialize)]
struct SessionLookupQuery {
    session_id: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/upsells. The catalog, scoped to the guest's listing when a
/// session is present.
async fn list_catalog(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CatalogQuery>,
) -> Response {
    let listing_id = match crate::auth::resolve_session(&state, &jar).await {
        crate::auth::SessionResolution::Active { data, .. }
        | crate::auth::SessionResolution::Demo(data) => Some(data.listing_id),
        crate::auth::SessionResolution::None => None,
    };

    let upsells = catalog::for_guest(
        &state.catalog,
        listing_id.as_deref(),
        query.category.as_ref(),
    );
    Json(CatalogResponse { upsells }).into_response()
}

/// POST /api/upsells/checkout. Creates the hosted checkout session.
/// Validation happens before any session or upstream work.
async fn create_checkout(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<CheckoutRequest>,
) -> Response {
    if req.items.is_empty() {
        return AppError::ValidationError("No items provided".to_string()).into_response();
    }

    let (session, jar) = match require_session(&state, jar).await {
        Ok(ok) => ok,
        Err(response) => return response,
    };

    let mut lines = Vec::new();
    for item in &req.items {
        let Some(upsell) = catalog::find(&state.catalog, &item.upsell_id) else {
            continue;
        };
        let (name, price) = upsell.resolve_line(item.option_id.as_deref());
        lines.push(CheckoutLine {
            name,
            amount_cents: (price * 100.0).round() as i64,
            currency: upsell.currency.clone(),
        });
    }

    if lines.is_empty() {
        return AppError::ValidationError("No valid items found".to_string()).into_response();
    }

    let cart_metadata = match serde_json::to_string(&req.items) {
        Ok(metadata) => metadata,
        Err(err) => {
            return AppError::InternalServerError(format!("Cart encoding failed: {}", err))
                .into_response()
        }
    };

    match state
        .stripe
        .create_checkout_session(&lines, &session.reservation_id, &cart_metadata)
        .await
    {
        Ok(checkout) => match checkout.url {
            Some(url) => (jar, Json(CheckoutResponse { url })).into_response(),
            None => AppError::InternalServerError(
                "Checkout session created without a redirect URL".to_string(),
            )
            .into_response(),
        },
        Err(err) => {
            error!("Checkout error: {}", err);
            AppError::InternalServerError("Failed to create checkout session".to_string())
                .into_response()
        }
    }
}

/// GET /api/upsells/requests. Ledger history for the session's reservation.
async fn request_history(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (session, jar) = match require_session(&state, jar).await {
        Ok(ok) => ok,
        Err(response) => return response,
    };

    match state.ledger.list_for_reservation(&session.reservation_id).await {
        Ok(upsells) => (jar, Json(HistoryResponse { upsells })).into_response(),
        Err(err) => {
            AppError::InternalServerError(format!("Failed to fetch upsell requests: {}", err))
                .into_response()
        }
    }
}

/// GET /api/upsells/session. Lets the success page recover which
/// reservation a completed checkout belonged to.
async fn checkout_session_lookup(
    State(state): State<AppState>,
    Query(query): Query<SessionLookupQuery>,
) -> Response {
    match state
        .stripe
        .retrieve_checkout_session(&query.session_id)
        .await
    {
        Ok(checkout) => Json(serde_json::json!({
            "reservation_id": checkout.metadata.get("reservation_id"),
        }))
        .into_response(),
        Err(err) => {
            error!("Error fetching checkout session: {}", err);
            AppError::InternalServerError("Failed to fetch session".to_string()).into_response()
        }
    }
}
