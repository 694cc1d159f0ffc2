use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use stayport_core::reservation::Reservation;
use stayport_core::session::SessionData;
use stayport_pms::PmsError;
use stayport_store::rate_limit::AUTH_POLICY;
use stayport_store::sessions::new_session_data;
use tracing::{error, info};

use crate::demo::{demo_reservation, demo_session, is_demo_code, DEMO_SESSION_ID};
use crate::error::AppError;
use crate::middleware::rate_limit::client_ip;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "guest_session";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth", post(login))
        .route("/api/auth/session", get(session_info).delete(logout))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginRequest {
    code: String,
}

#[derive(Debug, Serialize)]
struct SessionView {
    reservation_id: String,
    confirmation_code: String,
    guest_name: String,
    listing_id: String,
    is_demo: bool,
}

impl From<&SessionData> for SessionView {
    fn from(data: &SessionData) -> Self {
        Self {
            reservation_id: data.reservation_id.clone(),
            confirmation_code: data.confirmation_code.clone(),
            guest_name: data.guest_name.clone(),
            listing_id: data.listing_id.clone(),
            is_demo: data.is_demo,
        }
    }
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    session: SessionView,
    reservation: Reservation,
}

#[derive(Debug, Serialize)]
struct SessionInfoResponse {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionView>,
}

// ============================================================================
// Cookie helpers
// ============================================================================

fn session_cookie(state: &AppState, session_id: &str) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_secure(state.cookies.secure);
    cookie.set_max_age(time::Duration::seconds(
        state.sessions.ttl_seconds() as i64
    ));
    cookie
}

pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build())
}

// ============================================================================
// Session resolution
// ============================================================================

pub enum SessionResolution {
    Active { session_id: String, data: SessionData },
    Demo(SessionData),
    None,
}

/// Resolve the session cookie against the store. The demo sentinel id is
/// recognized without any store call so the demo flow never depends on it.
pub async fn resolve_session(state: &AppState, jar: &CookieJar) -> SessionResolution {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return SessionResolution::None;
    };
    let session_id = cookie.value().to_string();

    if session_id == DEMO_SESSION_ID {
        return SessionResolution::Demo(demo_session());
    }

    match state.sessions.get(&session_id).await {
        Some(data) => SessionResolution::Active { session_id, data },
        None => SessionResolution::None,
    }
}

/// Guard for session-scoped handlers. A dead or missing session clears the
/// cookie so the client never keeps pointing at expired state.
pub async fn require_session(
    state: &AppState,
    jar: CookieJar,
) -> Result<(SessionData, CookieJar), Response> {
    match resolve_session(state, &jar).await {
        SessionResolution::Active { data, .. } | SessionResolution::Demo(data) => Ok((data, jar)),
        SessionResolution::None => {
            let jar = clear_session_cookie(jar);
            Err((
                StatusCode::UNAUTHORIZED,
                jar,
                Json(serde_json::json!({ "error": "Not authenticated" })),
            )
                .into_response())
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let code = req.code.trim().to_string();
    if code.is_empty() {
        return Err(AppError::ValidationError(
            "Confirmation code is required".to_string(),
        ));
    }

    // The demo flow touches neither the store nor the platform, so it
    // skips the throttle as well
    if is_demo_code(&code) {
        let data = demo_session();
        let jar = jar.add(session_cookie(&state, DEMO_SESSION_ID));
        return Ok((
            jar,
            Json(LoginResponse {
                session: SessionView::from(&data),
                reservation: demo_reservation(),
            }),
        ));
    }

    // Throttle before touching any upstream
    let ip = client_ip(&headers);
    let decision = state.limiter.check(&ip, &AUTH_POLICY).await;
    if !decision.allowed {
        return Err(AppError::RateLimited {
            reset_at: decision.reset_at,
        });
    }

    // A portal code resolves locally to a reservation id; anything else is
    // treated as the platform's own confirmation code.
    let reservation = match state.portal_codes.lookup_by_code(&code).await {
        Some(reservation_id) => state
            .pms
            .reservation_by_id(&reservation_id)
            .await
            .map_err(login_upstream_error)?,
        None => state
            .pms
            .reservation_by_confirmation_code(&code)
            .await
            .map_err(login_upstream_error)?,
    };

    let Some(reservation) = reservation else {
        return Err(AppError::NotFoundError(
            "Reservation not found. Please check your confirmation code.".to_string(),
        ));
    };

    let data = new_session_data(
        &reservation.id,
        &reservation.confirmation_code,
        &reservation.guest_name,
        &reservation.listing_id,
        false,
    );
    let Some(session_id) = state.sessions.create(&data).await else {
        return Err(AppError::ServiceUnavailable(
            "Session store unavailable".to_string(),
        ));
    };

    info!(
        "Guest {} authenticated for reservation {}",
        data.guest_name, data.reservation_id
    );
    let jar = jar.add(session_cookie(&state, &session_id));
    Ok((
        jar,
        Json(LoginResponse {
            session: SessionView::from(&data),
            reservation,
        }),
    ))
}

fn login_upstream_error(err: PmsError) -> AppError {
    match err {
        PmsError::RateLimited => {
            error!("Login blocked: platform token quota exhausted");
            AppError::ServiceUnavailable(
                "Reservation platform temporarily unavailable".to_string(),
            )
        }
        other => AppError::InternalServerError(format!("Reservation lookup failed: {}", other)),
    }
}

/// GET /api/auth/session. Introspection plus a sliding refresh of both the
/// store TTL and the cookie max-age.
async fn session_info(State(state): State<AppState>, jar: CookieJar) -> Response {
    match resolve_session(&state, &jar).await {
        SessionResolution::Demo(data) => (
            jar,
            Json(SessionInfoResponse {
                authenticated: true,
                session: Some(SessionView::from(&data)),
            }),
        )
            .into_response(),
        SessionResolution::Active { session_id, data } => {
            state.sessions.refresh(&session_id).await;
            let jar = jar.add(session_cookie(&state, &session_id));
            (
                jar,
                Json(SessionInfoResponse {
                    authenticated: true,
                    session: Some(SessionView::from(&data)),
                }),
            )
                .into_response()
        }
        SessionResolution::None => (
            StatusCode::UNAUTHORIZED,
            clear_session_cookie(jar),
            Json(SessionInfoResponse {
                authenticated: false,
                session: None,
            }),
        )
            .into_response(),
    }
}

/// DELETE /api/auth/session. Idempotent logout.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let session_id = cookie.value().to_string();
        if session_id != DEMO_SESSION_ID {
            state.sessions.destroy(&session_id).await;
        }
    }

    let jar = clear_session_cookie(jar);
    (jar, Json(serde_json::json!({ "success": true }))).into_response()
}
