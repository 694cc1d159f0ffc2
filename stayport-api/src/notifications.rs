use serde_json::json;
use stayport_core::upsell::UpsellRequest;
use stayport_store::app_config::NotificationSettings;
use tracing::{error, info, warn};

/// Outbound operator and guest notifications. Everything here is
/// fire-and-forget: failures are logged with context and never surface to
/// the guest-facing response.
pub struct Notifier {
    http: reqwest::Client,
    settings: NotificationSettings,
}

impl Notifier {
    pub fn new(http: reqwest::Client, settings: NotificationSettings) -> Self {
        Self { http, settings }
    }

    /// Operator alert for a fresh authorization: email and chat fan out
    /// concurrently.
    pub async fn upsell_authorized(&self, request: &UpsellRequest) {
        let subject = format!("Upsell Authorization - Reservation {}", request.reservation_id);
        let body = operator_summary(request);
        let chat_text = format!(
            "New upsell authorization\n{}",
            operator_summary(request)
        );

        let email_to = self.settings.email_to.clone();
        tokio::join!(
            async {
                if let Some(to) = email_to.as_deref() {
                    self.send_email(to, &subject, &body).await;
                } else {
                    warn!("Operator email target not configured, skipping email notification");
                }
            },
            self.send_chat(&chat_text),
        );
    }

    /// Guest-facing confirmation that the authorization was received.
    pub async fn guest_confirmation(&self, request: &UpsellRequest) {
        let Some(email) = request.customer_email.as_deref() else {
            return;
        };
        let subject = "We received your add-on request".to_string();
        let body = guest_summary(
            request,
            "We've received your request. Your card has been authorized but not charged; \
             we'll confirm shortly.",
        );
        self.send_email(email, &subject, &body).await;
    }

    /// Guest-facing note that the hold was captured.
    pub async fn guest_charge_approved(&self, request: &UpsellRequest) {
        let Some(email) = request.customer_email.as_deref() else {
            return;
        };
        let subject = "Your add-on request was approved".to_string();
        let body = guest_summary(
            request,
            "Good news! Your request was approved and your card has been charged.",
        );
        self.send_email(email, &subject, &body).await;
    }

    /// Chat reminder ahead of an imminent check-in.
    pub async fn upsell_reminder(&self, request: &UpsellRequest) {
        let text = format!(
            "Upsell reminder: {} checks in {} at {}\n{}",
            request.guest_name.as_deref().unwrap_or("Guest"),
            request
                .check_in_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "soon".to_string()),
            request.property_name.as_deref().unwrap_or("Property"),
            items_block(request),
        );
        self.send_chat(&text).await;
    }

    async fn send_email(&self, to: &str, subject: &str, text: &str) {
        let Some(api_key) = self.settings.email_api_key.as_deref() else {
            warn!("Email API key not configured, skipping email notification");
            return;
        };

        let payload = json!({
            "from": self.settings.email_from,
            "to": to,
            "subject": subject,
            "text": text,
        });

        match self
            .http
            .post(&self.settings.email_api_url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!("Email notification sent to {}", to);
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!("Email notification failed: {} {}", status, body);
            }
            Err(err) => error!("Email notification failed: {}", err),
        }
    }

    async fn send_chat(&self, text: &str) {
        let Some(url) = self.settings.chat_webhook_url.as_deref() else {
            warn!("Chat webhook not configured, skipping chat notification");
            return;
        };

        match self.http.post(url).json(&json!({ "text": text })).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Chat notification sent");
            }
            Ok(response) => error!("Chat notification failed: {}", response.status()),
            Err(err) => error!("Chat notification failed: {}", err),
        }
    }
}

fn items_block(request: &UpsellRequest) -> String {
    request
        .items
        .iter()
        .map(|item| format!("- {}: {} {:.2}", item.name, item.currency, item.price))
        .collect::<Vec<_>>()
        .join("\n")
}

fn operator_summary(request: &UpsellRequest) -> String {
    format!(
        "Guest: {}\nProperty: {}\nCheck-in: {}\nCustomer email: {}\n\nItems:\n{}\n\n\
         Total authorized: {} {:.2}\nPayment intent: {}\n\n\
         This is an authorization only; the card has not been charged.",
        request.guest_name.as_deref().unwrap_or("N/A"),
        request.property_name.as_deref().unwrap_or("N/A"),
        request
            .check_in_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "N/A".to_string()),
        request.customer_email.as_deref().unwrap_or("N/A"),
        items_block(request),
        request.currency.to_uppercase(),
        request.total_amount,
        request.payment_intent_id,
    )
}

fn guest_summary(request: &UpsellRequest, lede: &str) -> String {
    format!(
        "Hi {},\n\n{}\n\nItems:\n{}\n\nTotal: {} {:.2}\n",
        request.guest_name.as_deref().unwrap_or("there"),
        lede,
        items_block(request),
        request.currency.to_uppercase(),
        request.total_amount,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stayport_core::upsell::{UpsellRequestItem, UpsellStatus};

    fn request() -> UpsellRequest {
        UpsellRequest {
            id: "pi_1".into(),
            reservation_id: "res-1".into(),
            items: vec![UpsellRequestItem {
                upsell_id: "pool-heating".into(),
                option_id: Some("pool-heat-83".into()),
                name: "Pool Heating - 83F".into(),
                price: 125.0,
                currency: "USD".into(),
            }],
            total_amount: 125.0,
            currency: "usd".into(),
            payment_intent_id: "pi_1".into(),
            customer_email: Some("guest@example.com".into()),
            guest_name: Some("Jordan".into()),
            property_name: Some("Desert Oasis".into()),
            check_in_date: None,
            status: UpsellStatus::Pending,
            created_at: Utc::now(),
            approved_at: None,
        }
    }

    #[test]
    fn test_operator_summary_contents() {
        let summary = operator_summary(&request());
        assert!(summary.contains("Jordan"));
        assert!(summary.contains("Pool Heating - 83F"));
        assert!(summary.contains("USD 125.00"));
        assert!(summary.contains("authorization only"));
    }

    #[test]
    fn test_items_block_one_line_per_item() {
        assert_eq!(items_block(&request()).lines().count(), 1);
    }
}
