use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/generate-codes", get(generate_codes))
        .route("/api/admin/sync-pms", post(sync_codes))
        .route("/api/admin/debug/reservation/{id}", get(debug_reservation))
}

/// Shared bearer-secret gate for the maintenance surfaces. An unset secret
/// rejects everything rather than letting the surface fall open.
pub fn require_bearer(headers: &HeaderMap, expected: &Option<String>) -> Result<(), AppError> {
    let Some(expected) = expected else {
        warn!("Maintenance endpoint called but no secret is configured");
        return Err(AppError::AuthenticationError("Unauthorized".to_string()));
    };

    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    if provided != Some(expected.as_str()) {
        return Err(AppError::AuthenticationError("Unauthorized".to_string()));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CodeRow {
    reservation_id: String,
    confirmation_code: String,
    guest_name: String,
    check_in: String,
    check_out: String,
    property: String,
    status: String,
    portal_code: String,
    is_new: bool,
}

/// GET /api/admin/generate-codes. Provision portal codes for every future
/// reservation that lacks one and report the full roster.
async fn generate_codes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_bearer(&headers, &state.security.admin_secret)?;

    let reservations = state.pms.future_reservations().await.map_err(|err| {
        AppError::InternalServerError(format!("Failed to list reservations: {}", err))
    })?;

    let mut results = Vec::with_capacity(reservations.len());
    for reservation in reservations {
        let (portal_code, is_new) = match state
            .portal_codes
            .lookup_by_reservation(&reservation.id)
            .await
        {
            Some(code) => (code, false),
            None => {
                let code = state.portal_codes.generate_unique_code().await;
                if !state.portal_codes.store_code(&reservation.id, &code).await {
                    error!(
                        "Failed to store portal code for reservation {}",
                        reservation.id
                    );
                    continue;
                }
                (code, true)
            }
        };

        results.push(CodeRow {
            reservation_id: reservation.id,
            confirmation_code: reservation.confirmation_code,
            guest_name: reservation.guest_name,
            check_in: reservation.check_in,
            check_out: reservation.check_out,
            property: reservation.property,
            status: reservation.status,
            portal_code,
            is_new,
        });
    }

    results.sort_by(|a, b| a.check_in.cmp(&b.check_in));

    // Tab-separated block for pasting into a spreadsheet
    let mut export = vec![
        "Guest Name\tConfirmation Code\tPortal Code\tCheck-In\tCheck-Out\tProperty\tStatus"
            .to_string(),
    ];
    export.extend(results.iter().map(|r| {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            r.guest_name,
            r.confirmation_code,
            r.portal_code,
            r.check_in,
            r.check_out,
            r.property,
            r.status
        )
    }));

    let new_codes = results.iter().filter(|r| r.is_new).count();
    Ok(Json(json!({
        "message": format!(
            "Generated portal codes for {} new reservations ({} total future reservations)",
            new_codes,
            results.len()
        ),
        "count": results.len(),
        "new_codes": new_codes,
        "results": results,
        "export": export.join("\n"),
    })))
}

#[derive(Debug, Serialize)]
struct SyncRow {
    reservation_id: String,
    portal_code: String,
    synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// POST /api/admin/sync-pms. Push every stored code for upcoming stays
/// back into the platform's custom field.
async fn sync_codes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_bearer(&headers, &state.security.admin_secret)?;

    let reservations = state.pms.future_reservations().await.map_err(|err| {
        AppError::InternalServerError(format!("Failed to list reservations: {}", err))
    })?;

    let mut results = Vec::new();
    for reservation in reservations {
        let Some(portal_code) = state
            .portal_codes
            .lookup_by_reservation(&reservation.id)
            .await
        else {
            continue;
        };

        let row = match state
            .pms
            .sync_portal_code(&reservation.id, &portal_code)
            .await
        {
            Ok(()) => SyncRow {
                reservation_id: reservation.id,
                portal_code,
                synced: true,
                error: None,
            },
            Err(err) => SyncRow {
                reservation_id: reservation.id,
                portal_code,
                synced: false,
                error: Some(err.to_string()),
            },
        };
        results.push(row);
    }

    let synced = results.iter().filter(|r| r.synced).count();
    Ok(Json(json!({
        "message": format!("Synced {} of {} portal codes", synced, results.len()),
        "synced": synced,
        "total": results.len(),
        "results": results,
    })))
}

/// GET /api/admin/debug/reservation/{id}. Raw upstream payload for
/// operator troubleshooting. The deliberate exception to the rule that
/// upstream bodies never reach a response.
async fn debug_reservation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_bearer(&headers, &state.security.admin_secret)?;

    match state.pms.reservation_raw(&id).await {
        Ok(payload) => Ok(Json(payload)),
        Err(err) => Ok(Json(json!({ "error": err.to_string() }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_bearer_accepts_matching_secret() {
        let expected = Some("s3cret".to_string());
        assert!(require_bearer(&headers_with("s3cret"), &expected).is_ok());
    }

    #[test]
    fn test_bearer_rejects_mismatch_and_missing() {
        let expected = Some("s3cret".to_string());
        assert!(require_bearer(&headers_with("wrong"), &expected).is_err());
        assert!(require_bearer(&HeaderMap::new(), &expected).is_err());
    }

    #[test]
    fn test_unset_secret_rejects() {
        assert!(require_bearer(&headers_with("anything"), &None).is_err());
    }
}
