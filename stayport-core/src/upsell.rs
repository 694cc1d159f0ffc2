use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Categories the catalog groups add-ons under
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpsellCategory {
    PoolHeating,
    EarlyCheckin,
    LateCheckout,
    Extras,
    Service,
}

/// A purchasable add-on as presented to the guest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upsell {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Base price, or the single price when there are no options.
    pub price: f64,
    pub currency: String,
    pub category: UpsellCategory,
    /// When set, the item is only offered at these listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_ids: Option<Vec<String>>,
    /// When present, the guest must pick exactly one option.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<UpsellOption>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsellOption {
    pub id: String,
    pub label: String,
    pub price: f64,
}

impl Upsell {
    pub fn offered_at(&self, listing_id: &str) -> bool {
        match &self.listing_ids {
            Some(ids) => ids.iter().any(|id| id == listing_id),
            None => true,
        }
    }

    /// Resolve the charged name/price for a cart line, honoring a selected
    /// option when the item has options.
    pub fn resolve_line(&self, option_id: Option<&str>) -> (String, f64) {
        if let (Some(options), Some(option_id)) = (&self.options, option_id) {
            if let Some(option) = options.iter().find(|o| o.id == option_id) {
                return (format!("{} - {}", self.name, option.label), option.price);
            }
        }
        (self.name.clone(), self.price)
    }
}

/// Lifecycle of an authorization request. Transitions are one-way:
/// `Pending` moves to exactly one terminal state and stays there.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpsellStatus {
    Pending,
    Approved,
    Declined,
    Expired,
}

impl UpsellStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UpsellStatus::Pending)
    }
}

/// Outcome of applying a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Applied,
    /// Replayed transition into the state the record already holds.
    NoOp,
}

#[derive(Debug, thiserror::Error)]
pub enum UpsellError {
    #[error("Upsell request not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: UpsellStatus,
        to: UpsellStatus,
    },
}

/// One line of an authorization request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsellRequestItem {
    pub upsell_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_id: Option<String>,
    pub name: String,
    pub price: f64,
    pub currency: String,
}

/// A guest's authorized-but-not-captured purchase, keyed by the payment
/// intent that holds the funds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsellRequest {
    pub id: String,
    pub reservation_id: String,
    pub items: Vec<UpsellRequestItem>,
    pub total_amount: f64,
    pub currency: String,
    pub payment_intent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_in_date: Option<NaiveDate>,
    pub status: UpsellStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

impl UpsellRequest {
    /// Validate a status change against the one-way lifecycle.
    pub fn plan_transition(&self, to: UpsellStatus) -> Result<StatusChange, UpsellError> {
        if self.status == to {
            return Ok(StatusChange::NoOp);
        }
        if self.status.is_terminal() || to == UpsellStatus::Pending {
            return Err(UpsellError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        Ok(StatusChange::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(status: UpsellStatus) -> UpsellRequest {
        UpsellRequest {
            id: "pi_123".into(),
            reservation_id: "res-1".into(),
            items: vec![],
            total_amount: 100.0,
            currency: "usd".into(),
            payment_intent_id: "pi_123".into(),
            customer_email: None,
            guest_name: None,
            property_name: None,
            check_in_date: None,
            status,
            created_at: Utc::now(),
            approved_at: None,
        }
    }

    #[test]
    fn test_pending_reaches_each_terminal_state() {
        for to in [
            UpsellStatus::Approved,
            UpsellStatus::Declined,
            UpsellStatus::Expired,
        ] {
            let req = request(UpsellStatus::Pending);
            assert_eq!(req.plan_transition(to).unwrap(), StatusChange::Applied);
        }
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let req = request(UpsellStatus::Approved);
        assert!(req.plan_transition(UpsellStatus::Declined).is_err());
        assert!(req.plan_transition(UpsellStatus::Pending).is_err());
    }

    #[test]
    fn test_replayed_terminal_transition_is_noop() {
        let req = request(UpsellStatus::Approved);
        assert_eq!(
            req.plan_transition(UpsellStatus::Approved).unwrap(),
            StatusChange::NoOp
        );
    }

    #[test]
    fn test_option_resolution() {
        let upsell = Upsell {
            id: "pool-heating".into(),
            name: "Pool Heating".into(),
            description: String::new(),
            price: 100.0,
            currency: "USD".into(),
            category: UpsellCategory::PoolHeating,
            listing_ids: None,
            options: Some(vec![UpsellOption {
                id: "pool-heat-85".into(),
                label: "85F".into(),
                price: 150.0,
            }]),
        };

        let (name, price) = upsell.resolve_line(Some("pool-heat-85"));
        assert_eq!(name, "Pool Heating - 85F");
        assert_eq!(price, 150.0);

        // Unknown option falls back to the base line
        let (name, price) = upsell.resolve_line(Some("nope"));
        assert_eq!(name, "Pool Heating");
        assert_eq!(price, 100.0);
    }
}
