use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A reservation as the portal sees it, flattened from the management
/// platform's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub confirmation_code: String,
    pub guest_name: String,
    pub guest_email: String,
    pub check_in: String,
    pub check_out: String,
    pub check_in_time: String,
    pub check_out_time: String,
    pub status: String,
    pub listing_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<Property>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub money: Option<Money>,
}

impl Reservation {
    /// Check-in day as a date, if the platform sent one we can parse.
    /// Accepts both plain dates and RFC 3339 timestamps.
    pub fn check_in_date(&self) -> Option<NaiveDate> {
        let day = self.check_in.split('T').next().unwrap_or(&self.check_in);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Money {
    pub total_paid: f64,
    pub balance_due: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub nickname: String,
    pub title: String,
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<Picture>,
    #[serde(default)]
    pub wifi_name: String,
    #[serde(default)]
    pub wifi_password: String,
    #[serde(default)]
    pub check_in_instructions: String,
    #[serde(default)]
    pub house_rules: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    pub full: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Picture {
    pub thumbnail: String,
    pub regular: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Failed,
    Scheduled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub date: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_in_date_parses_plain_and_timestamped() {
        let mut res = Reservation {
            id: "r1".into(),
            confirmation_code: "ABC123".into(),
            guest_name: "Guest".into(),
            guest_email: String::new(),
            check_in: "2026-03-14".into(),
            check_out: "2026-03-18".into(),
            check_in_time: "15:00".into(),
            check_out_time: "11:00".into(),
            status: "confirmed".into(),
            listing_id: "l1".into(),
            listing: None,
            money: None,
        };
        assert_eq!(
            res.check_in_date(),
            NaiveDate::from_ymd_opt(2026, 3, 14)
        );

        res.check_in = "2026-03-14T15:00:00.000Z".into();
        assert_eq!(
            res.check_in_date(),
            NaiveDate::from_ymd_opt(2026, 3, 14)
        );

        res.check_in = "soon".into();
        assert_eq!(res.check_in_date(), None);
    }
}
