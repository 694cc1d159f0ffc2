use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use chrono::{Days, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::admin::require_bearer;
use crate::error::AppError;
use crate::state::AppState;

const SWEEP_LOCK_KEY: &str = "upsell_reminders:lock";
/// Well past any observed sweep duration; the lock expires on its own.
const SWEEP_LOCK_TTL_SECONDS: u64 = 600;
/// Reminders fire for check-ins exactly this many days out.
const REMINDER_LEAD_DAYS: u64 = 3;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/cron/upsell-reminders", post(upsell_reminders))
}

/// POST /api/cron/upsell-reminders. Daily sweep over the reminder index.
/// A SET-NX-EX lock keeps overlapping scheduler invocations from sending
/// duplicate reminders.
async fn upsell_reminders(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    require_bearer(&headers, &state.security.cron_secret)?;

    let holder = Uuid::new_v4().to_string();
    match state
        .redis
        .set_nx_ex(SWEEP_LOCK_KEY, &holder, SWEEP_LOCK_TTL_SECONDS)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            info!("Reminder sweep already running, skipping");
            return Ok(Json(json!({ "success": true, "skipped": true })));
        }
        Err(err) => {
            return Err(AppError::ServiceUnavailable(format!(
                "Reminder sweep lock unavailable: {}",
                err
            )));
        }
    }

    let target_day = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(REMINDER_LEAD_DAYS))
        .expect("date within range");
    let start_ms = target_day
        .and_hms_opt(0, 0, 0)
        .expect("midnight is valid")
        .and_utc()
        .timestamp_millis();
    let end_ms = start_ms + 24 * 60 * 60 * 1000 - 1;

    info!("Checking for upsell reminders for check-ins on {}", target_day);

    let requests = state
        .ledger
        .list_pending_in_range(start_ms, end_ms)
        .await
        .map_err(|err| AppError::InternalServerError(format!("Reminder sweep failed: {}", err)))?;
    info!("Found {} upsells to remind about", requests.len());

    let mut sent = 0;
    for request in &requests {
        let (Some(approved_at), Some(check_in)) = (request.approved_at, request.check_in_date)
        else {
            continue;
        };

        // Guests notified at approval time within the lead window don't
        // need a second nudge.
        let check_in_midnight = check_in
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid")
            .and_utc();
        let days_between = (check_in_midnight - approved_at).num_days();
        if days_between >= REMINDER_LEAD_DAYS as i64 {
            state.notifier.upsell_reminder(request).await;
            sent += 1;
            info!("Sent reminder for upsell {}", request.id);
        } else {
            info!(
                "Skipping upsell {} - approved less than {} days before check-in",
                request.id, REMINDER_LEAD_DAYS
            );
        }
    }

    Ok(Json(json!({
        "success": true,
        "message": format!("Sent {} upsell reminders", sent),
        "checked_date": target_day.to_string(),
        "total_found": requests.len(),
        "sent_count": sent,
    })))
}
