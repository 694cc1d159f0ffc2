use chrono::{Duration, Utc};
use stayport_core::reservation::{
    Address, Money, Payment, PaymentStatus, Picture, Property, Reservation,
};
use stayport_core::session::SessionData;

/// Sentinel session id carried by the demo cookie. Never resolved against
/// the store, so the demo flow works with the store down or unconfigured.
pub const DEMO_SESSION_ID: &str = "demo";
pub const DEMO_RESERVATION_ID: &str = "demo-reservation-001";
pub const DEMO_LISTING_ID: &str = "demo-property-001";
pub const DEMO_CONFIRMATION_CODE: &str = "DEMO123";

pub fn is_demo_code(code: &str) -> bool {
    let code = code.to_uppercase();
    code == "DEMO" || code == "DEMO123"
}

pub fn is_demo_reservation(reservation_id: &str) -> bool {
    reservation_id.starts_with("demo-")
}

fn future_date(days_from_now: i64) -> String {
    (Utc::now() + Duration::days(days_from_now))
        .format("%Y-%m-%d")
        .to_string()
}

fn past_date(days_ago: i64) -> String {
    (Utc::now() - Duration::days(days_ago)).to_rfc3339()
}

pub fn demo_property() -> Property {
    Property {
        id: DEMO_LISTING_ID.to_string(),
        nickname: "Desert Oasis Retreat".to_string(),
        title: "Stunning 4BR Desert Oasis with Pool & Mountain Views".to_string(),
        address: Address {
            full: "1234 Saguaro Canyon Drive, Tucson, AZ 85750".to_string(),
            street: "1234 Saguaro Canyon Drive".to_string(),
            city: "Tucson".to_string(),
            state: "AZ".to_string(),
            zipcode: "85750".to_string(),
            country: "US".to_string(),
        },
        picture: Some(Picture {
            thumbnail: "https://images.unsplash.com/photo-1564013799919-ab600027ffc6?w=400"
                .to_string(),
            regular: "https://images.unsplash.com/photo-1564013799919-ab600027ffc6?w=1200"
                .to_string(),
        }),
        wifi_name: "DesertOasis_Guest".to_string(),
        wifi_password: "Welcome2Tucson!".to_string(),
        check_in_instructions: "The lockbox code will be sent 24 hours before check-in."
            .to_string(),
        house_rules: "No smoking. No parties. Quiet hours 10pm-8am.".to_string(),
    }
}

pub fn demo_reservation() -> Reservation {
    Reservation {
        id: DEMO_RESERVATION_ID.to_string(),
        confirmation_code: DEMO_CONFIRMATION_CODE.to_string(),
        guest_name: "Jordan Smith".to_string(),
        guest_email: "jordan.smith@example.com".to_string(),
        check_in: future_date(2),
        check_out: future_date(7),
        check_in_time: "16:00".to_string(),
        check_out_time: "11:00".to_string(),
        status: "confirmed".to_string(),
        listing_id: DEMO_LISTING_ID.to_string(),
        listing: Some(demo_property()),
        money: Some(Money {
            total_paid: 850.0,
            balance_due: 425.0,
            currency: "USD".to_string(),
        }),
    }
}

pub fn demo_payments() -> Vec<Payment> {
    vec![
        Payment {
            id: "demo-payment-001".to_string(),
            amount: 425.0,
            currency: "USD".to_string(),
            status: PaymentStatus::Paid,
            date: past_date(14),
            description: "Initial deposit".to_string(),
            scheduled_date: None,
        },
        Payment {
            id: "demo-payment-002".to_string(),
            amount: 425.0,
            currency: "USD".to_string(),
            status: PaymentStatus::Paid,
            date: past_date(7),
            description: "Second payment".to_string(),
            scheduled_date: None,
        },
        Payment {
            id: "demo-payment-003".to_string(),
            amount: 425.0,
            currency: "USD".to_string(),
            status: PaymentStatus::Scheduled,
            date: Utc::now().to_rfc3339(),
            description: "Final payment".to_string(),
            scheduled_date: Some(future_date(1)),
        },
    ]
}

pub fn demo_session() -> SessionData {
    SessionData {
        reservation_id: DEMO_RESERVATION_ID.to_string(),
        confirmation_code: DEMO_CONFIRMATION_CODE.to_string(),
        guest_name: "Jordan Smith".to_string(),
        listing_id: DEMO_LISTING_ID.to_string(),
        is_demo: true,
        created_at: Utc::now().timestamp_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_code_detection() {
        assert!(is_demo_code("DEMO"));
        assert!(is_demo_code("demo123"));
        assert!(is_demo_code("Demo"));
        assert!(!is_demo_code("ABC123"));
    }

    #[test]
    fn test_demo_reservation_is_upcoming() {
        let reservation = demo_reservation();
        let today = Utc::now().format("%Y-%m-%d").to_string();
        assert!(reservation.check_in > today);
        assert!(reservation.check_out > reservation.check_in);
        assert!(is_demo_reservation(&reservation.id));
    }
}
