use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use stayport_core::reservation::{
    Address, Money, Payment, PaymentStatus, Picture, Property, Reservation,
};
use stayport_core::token::TokenCacheStore;
use tracing::{error, info};

use crate::token::AccessTokenSource;
use crate::{PmsConfig, PmsError};

/// Property-management platform client. A thin adapter: it flattens the
/// platform's payloads into domain types and otherwise stays out of the way.
pub struct PmsClient {
    http: reqwest::Client,
    config: PmsConfig,
    tokens: AccessTokenSource,
}

// ============================================================================
// Raw upstream payloads
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawReservation {
    #[serde(rename = "_id")]
    id: String,
    confirmation_code: Option<String>,
    guesty_confirmation_code: Option<String>,
    guest: Option<RawGuest>,
    check_in: Option<String>,
    check_out: Option<String>,
    check_in_date_localized: Option<String>,
    check_out_date_localized: Option<String>,
    status: Option<String>,
    listing_id: Option<String>,
    listing: Option<RawListingSummary>,
    money: Option<RawMoney>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawGuest {
    full_name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawListingSummary {
    nickname: Option<String>,
    title: Option<String>,
    default_check_in_time: Option<String>,
    default_check_out_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawMoney {
    total_paid: Option<f64>,
    balance_due: Option<f64>,
    currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawListing {
    #[serde(rename = "_id")]
    id: String,
    nickname: Option<String>,
    title: Option<String>,
    address: Option<RawAddress>,
    picture: Option<RawPicture>,
    custom_fields: Option<Vec<RawCustomField>>,
    wifi_network: Option<String>,
    wifi_password: Option<String>,
    check_in_instructions: Option<String>,
    house_rules: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAddress {
    full: Option<String>,
    street: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zipcode: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPicture {
    thumbnail: Option<String>,
    regular: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawCustomField {
    field_id: String,
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawPayment {
    #[serde(rename = "_id")]
    id: String,
    amount: Option<f64>,
    currency: Option<String>,
    status: Option<String>,
    created_at: Option<String>,
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResults<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

/// Compact row used by the admin sweep endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationSummary {
    pub id: String,
    pub confirmation_code: String,
    pub guest_name: String,
    pub check_in: String,
    pub check_out: String,
    pub property: String,
    pub status: String,
}

// ============================================================================
// Client
// ============================================================================

impl PmsClient {
    pub fn new(config: PmsConfig, cache: Arc<dyn TokenCacheStore>) -> Self {
        let http = reqwest::Client::new();
        let tokens = AccessTokenSource::new(http.clone(), config.clone(), cache);
        Self {
            http,
            config,
            tokens,
        }
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, PmsError> {
        let token = self.tokens.bearer_token().await?;
        let url = format!("{}{}", self.config.api_url, path);

        let response = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(&token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Platform API error: {} {} ({})", status.as_u16(), path, body);
            return Err(PmsError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    fn map_reservation(raw: RawReservation) -> Reservation {
        let guest = raw.guest.unwrap_or_default();
        let listing = raw.listing.unwrap_or_default();
        Reservation {
            id: raw.id,
            confirmation_code: raw
                .confirmation_code
                .or(raw.guesty_confirmation_code)
                .unwrap_or_default(),
            guest_name: guest.full_name.unwrap_or_else(|| "Guest".to_string()),
            guest_email: guest.email.unwrap_or_default(),
            check_in: raw
                .check_in
                .or(raw.check_in_date_localized)
                .unwrap_or_default(),
            check_out: raw
                .check_out
                .or(raw.check_out_date_localized)
                .unwrap_or_default(),
            check_in_time: listing
                .default_check_in_time
                .unwrap_or_else(|| "15:00".to_string()),
            check_out_time: listing
                .default_check_out_time
                .unwrap_or_else(|| "11:00".to_string()),
            status: raw.status.unwrap_or_default(),
            listing_id: raw.listing_id.unwrap_or_default(),
            listing: None,
            money: raw.money.map(|m| Money {
                total_paid: m.total_paid.unwrap_or(0.0),
                balance_due: m.balance_due.unwrap_or(0.0),
                currency: m.currency.unwrap_or_else(|| "USD".to_string()),
            }),
        }
    }

    /// Reservation search by the platform's native booking identifier.
    pub async fn reservation_by_confirmation_code(
        &self,
        confirmation_code: &str,
    ) -> Result<Option<Reservation>, PmsError> {
        let filters = serde_json::json!([
            { "operator": "$in", "field": "confirmationCode", "value": [confirmation_code] }
        ]);

        let payload = self
            .get_json("/reservations", &[("filters", filters.to_string())])
            .await?;
        let results: SearchResults<RawReservation> =
            serde_json::from_value(payload).map_err(|e| PmsError::Payload(e.to_string()))?;

        info!(
            "Reservation search returned {} result(s)",
            results.results.len()
        );
        Ok(results.results.into_iter().next().map(Self::map_reservation))
    }

    pub async fn reservation_by_id(&self, id: &str) -> Result<Option<Reservation>, PmsError> {
        match self.get_json(&format!("/reservations/{}", id), &[]).await {
            Ok(payload) => {
                let raw: RawReservation = serde_json::from_value(payload)
                    .map_err(|e| PmsError::Payload(e.to_string()))?;
                Ok(Some(Self::map_reservation(raw)))
            }
            Err(PmsError::Upstream { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn listing(&self, listing_id: &str) -> Result<Option<Property>, PmsError> {
        let payload = match self.get_json(&format!("/listings/{}", listing_id), &[]).await {
            Ok(payload) => payload,
            Err(PmsError::Upstream { status: 404, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };

        let raw: RawListing =
            serde_json::from_value(payload).map_err(|e| PmsError::Payload(e.to_string()))?;

        let custom_fields = raw.custom_fields.unwrap_or_default();
        let wifi_name = scrape_custom_field(&custom_fields, &["wifi", "name"])
            .or(raw.wifi_network)
            .unwrap_or_default();
        let wifi_password = scrape_custom_field(&custom_fields, &["wifi", "password"])
            .or(raw.wifi_password)
            .unwrap_or_default();

        let title = raw.title.unwrap_or_default();
        let address = raw.address.unwrap_or_default();
        Ok(Some(Property {
            id: raw.id,
            nickname: raw.nickname.unwrap_or_else(|| title.clone()),
            title,
            address: Address {
                full: address.full.unwrap_or_default(),
                street: address.street.unwrap_or_default(),
                city: address.city.unwrap_or_default(),
                state: address.state.unwrap_or_default(),
                zipcode: address.zipcode.unwrap_or_default(),
                country: address.country.unwrap_or_default(),
            },
            picture: raw.picture.map(|p| Picture {
                thumbnail: p.thumbnail.unwrap_or_default(),
                regular: p.regular.unwrap_or_default(),
            }),
            wifi_name,
            wifi_password,
            check_in_instructions: raw.check_in_instructions.unwrap_or_default(),
            house_rules: raw.house_rules.unwrap_or_default(),
        }))
    }

    pub async fn payments(&self, reservation_id: &str) -> Result<Vec<Payment>, PmsError> {
        let payload = self
            .get_json(&format!("/reservations/{}/payments", reservation_id), &[])
            .await?;
        let raw: Vec<RawPayment> =
            serde_json::from_value(payload).map_err(|e| PmsError::Payload(e.to_string()))?;

        Ok(raw
            .into_iter()
            .map(|p| Payment {
                id: p.id,
                amount: p.amount.unwrap_or(0.0),
                currency: p.currency.unwrap_or_else(|| "USD".to_string()),
                status: map_payment_status(p.status.as_deref()),
                date: p.created_at.unwrap_or_default(),
                description: p.note.unwrap_or_else(|| "Payment".to_string()),
                scheduled_date: None,
            })
            .collect())
    }

    /// Confirmed reservations with a check-in today or later; the admin
    /// sweep works off this page.
    pub async fn future_reservations(&self) -> Result<Vec<ReservationSummary>, PmsError> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let filters = serde_json::json!([
            { "operator": "$gte", "field": "checkInDateLocalized", "value": today },
            { "operator": "$eq", "field": "status", "value": "confirmed" }
        ]);

        let payload = self
            .get_json(
                "/reservations",
                &[
                    ("filters", filters.to_string()),
                    ("limit", "100".to_string()),
                    (
                        "fields",
                        "_id,confirmationCode,guestyConfirmationCode,guest.fullName,\
                         checkInDateLocalized,checkOutDateLocalized,listing.nickname,status"
                            .to_string(),
                    ),
                ],
            )
            .await?;

        let results: SearchResults<RawReservation> =
            serde_json::from_value(payload).map_err(|e| PmsError::Payload(e.to_string()))?;

        Ok(results
            .results
            .into_iter()
            .map(|raw| ReservationSummary {
                id: raw.id,
                confirmation_code: raw
                    .confirmation_code
                    .or(raw.guesty_confirmation_code)
                    .unwrap_or_default(),
                guest_name: raw
                    .guest
                    .and_then(|g| g.full_name)
                    .unwrap_or_else(|| "Guest".to_string()),
                check_in: raw.check_in_date_localized.or(raw.check_in).unwrap_or_default(),
                check_out: raw
                    .check_out_date_localized
                    .or(raw.check_out)
                    .unwrap_or_default(),
                property: raw
                    .listing
                    .and_then(|l| l.nickname.or(l.title))
                    .unwrap_or_default(),
                status: raw.status.unwrap_or_default(),
            })
            .collect())
    }

    /// Mirror a portal code into the reservation's custom field.
    pub async fn sync_portal_code(
        &self,
        reservation_id: &str,
        portal_code: &str,
    ) -> Result<(), PmsError> {
        let token = self.tokens.bearer_token().await?;
        let url = format!(
            "{}/reservations/{}/custom-fields",
            self.config.api_url, reservation_id
        );
        let body = serde_json::json!({
            "customFields": [
                { "fieldId": self.config.portal_code_field_id, "value": portal_code }
            ]
        });

        let response = self
            .http
            .put(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                "Portal code sync failed for reservation {}: {} {}",
                reservation_id,
                status.as_u16(),
                body
            );
            return Err(PmsError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            "Synced portal code {} to reservation {}",
            portal_code, reservation_id
        );
        Ok(())
    }

    /// Raw reservation payload for the operator debug surface. The one
    /// place upstream bodies are allowed through unfiltered.
    pub async fn reservation_raw(&self, id: &str) -> Result<serde_json::Value, PmsError> {
        self.get_json(&format!("/reservations/{}", id), &[]).await
    }
}

fn map_payment_status(status: Option<&str>) -> PaymentStatus {
    match status {
        Some("succeeded") | Some("paid") => PaymentStatus::Paid,
        Some("failed") => PaymentStatus::Failed,
        Some("scheduled") => PaymentStatus::Scheduled,
        _ => PaymentStatus::Pending,
    }
}

/// Find a custom field whose id mentions every given fragment.
fn scrape_custom_field(fields: &[RawCustomField], fragments: &[&str]) -> Option<String> {
    fields
        .iter()
        .find(|f| {
            let id = f.field_id.to_lowercase();
            fragments.iter().all(|fragment| id.contains(fragment))
        })
        .and_then(|f| f.value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_reservation_defaults() {
        let raw: RawReservation = serde_json::from_value(serde_json::json!({
            "_id": "res-1",
            "confirmationCode": "ABC123",
            "guest": { "fullName": "Jordan Smith" },
            "checkIn": "2026-09-01T15:00:00.000Z",
            "checkOut": "2026-09-05T11:00:00.000Z",
            "status": "confirmed",
            "listingId": "listing-1",
            "money": { "totalPaid": 850.0, "balanceDue": 425.0 }
        }))
        .unwrap();

        let reservation = PmsClient::map_reservation(raw);
        assert_eq!(reservation.id, "res-1");
        assert_eq!(reservation.guest_name, "Jordan Smith");
        assert_eq!(reservation.check_in_time, "15:00");
        assert_eq!(reservation.money.as_ref().unwrap().currency, "USD");
    }

    #[test]
    fn test_map_reservation_missing_guest() {
        let raw: RawReservation =
            serde_json::from_value(serde_json::json!({ "_id": "res-2" })).unwrap();
        let reservation = PmsClient::map_reservation(raw);
        assert_eq!(reservation.guest_name, "Guest");
        assert_eq!(reservation.confirmation_code, "");
    }

    #[test]
    fn test_payment_status_mapping() {
        assert_eq!(map_payment_status(Some("succeeded")), PaymentStatus::Paid);
        assert_eq!(map_payment_status(Some("failed")), PaymentStatus::Failed);
        assert_eq!(
            map_payment_status(Some("scheduled")),
            PaymentStatus::Scheduled
        );
        assert_eq!(map_payment_status(None), PaymentStatus::Pending);
    }

    #[test]
    fn test_custom_field_scrape() {
        let fields = vec![
            RawCustomField {
                field_id: "listing_wifi_name".into(),
                value: Some("CasaGuest".into()),
            },
            RawCustomField {
                field_id: "listing_wifi_password".into(),
                value: Some("sunny-days".into()),
            },
        ];
        assert_eq!(
            scrape_custom_field(&fields, &["wifi", "name"]).as_deref(),
            Some("CasaGuest")
        );
        assert_eq!(
            scrape_custom_field(&fields, &["wifi", "password"]).as_deref(),
            Some("sunny-days")
        );
        assert_eq!(scrape_custom_field(&fields, &["lockbox"]), None);
    }
}
