use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use stayport_core::reservation::{Payment, Reservation};
use tracing::error;

use crate::auth::require_session;
use crate::demo::{demo_payments, demo_reservation};
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/reservation", get(reservation_details))
}

#[derive(Debug, Serialize)]
struct ReservationResponse {
    reservation: Reservation,
    payments: Vec<Payment>,
}

/// GET /api/reservation. The reservation id always comes from the
/// server-side session, never from the client.
async fn reservation_details(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (session, jar) = match require_session(&state, jar).await {
        Ok(ok) => ok,
        Err(response) => return response,
    };

    if session.is_demo {
        return (
            jar,
            Json(ReservationResponse {
                reservation: demo_reservation(),
                payments: demo_payments(),
            }),
        )
            .into_response();
    }

    let reservation = match state.pms.reservation_by_id(&session.reservation_id).await {
        Ok(Some(reservation)) => reservation,
        Ok(None) => {
            return AppError::NotFoundError("Reservation not found".to_string()).into_response()
        }
        Err(err) => {
            return AppError::InternalServerError(format!(
                "Failed to fetch reservation: {}",
                err
            ))
            .into_response()
        }
    };

    // Listing and payments are best-effort decoration
    let listing = match state.pms.listing(&reservation.listing_id).await {
        Ok(listing) => listing,
        Err(err) => {
            error!("Failed to fetch listing details: {}", err);
            None
        }
    };
    let payments = match state.pms.payments(&session.reservation_id).await {
        Ok(payments) => payments,
        Err(err) => {
            error!("Failed to fetch payments: {}", err);
            Vec::new()
        }
    };

    let reservation = Reservation {
        listing,
        ..reservation
    };

    (
        jar,
        Json(ReservationResponse {
            reservation,
            payments,
        }),
    )
        .into_response()
}
