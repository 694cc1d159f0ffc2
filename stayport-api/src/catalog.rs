use stayport_core::upsell::{Upsell, UpsellCategory, UpsellOption};

use crate::demo::DEMO_LISTING_ID;

/// Build the add-on catalog. Pool heating is only offered at listings with
/// a pool; everything else is offered portfolio-wide.
pub fn build(pool_listing_ids: &[String]) -> Vec<Upsell> {
    let mut pool_listings: Vec<String> = pool_listing_ids.to_vec();
    if !pool_listings.iter().any(|id| id == DEMO_LISTING_ID) {
        pool_listings.push(DEMO_LISTING_ID.to_string());
    }

    vec![
        Upsell {
            id: "pool-heating".to_string(),
            name: "Pool Heating".to_string(),
            description: "Looking for a warmer swimming experience? Select your preferred \
                          temperature. Please request at least 3 days in advance."
                .to_string(),
            price: 100.0,
            currency: "USD".to_string(),
            category: UpsellCategory::PoolHeating,
            listing_ids: Some(pool_listings),
            options: Some(vec![
                UpsellOption {
                    id: "pool-heat-80".to_string(),
                    label: "80\u{b0}F - Comfortable".to_string(),
                    price: 100.0,
                },
                UpsellOption {
                    id: "pool-heat-83".to_string(),
                    label: "83\u{b0}F - Toasty".to_string(),
                    price: 125.0,
                },
                UpsellOption {
                    id: "pool-heat-85".to_string(),
                    label: "85\u{b0}F - Luxurious".to_string(),
                    price: 150.0,
                },
            ]),
        },
        Upsell {
            id: "early-checkin".to_string(),
            name: "Early Check-In".to_string(),
            description: "Request to check in early. This is a request and not guaranteed; \
                          a hold is placed and charged only if approved."
                .to_string(),
            price: 20.0,
            currency: "USD".to_string(),
            category: UpsellCategory::EarlyCheckin,
            listing_ids: None,
            options: Some(vec![
                UpsellOption {
                    id: "early-checkin-2hr".to_string(),
                    label: "2 hours early".to_string(),
                    price: 20.0,
                },
                UpsellOption {
                    id: "early-checkin-4hr".to_string(),
                    label: "4 hours early".to_string(),
                    price: 40.0,
                },
                UpsellOption {
                    id: "early-checkin-6hr".to_string(),
                    label: "6 hours early".to_string(),
                    price: 60.0,
                },
            ]),
        },
        Upsell {
            id: "late-checkout".to_string(),
            name: "Late Check-Out".to_string(),
            description: "Request to check out late. This is a request and not guaranteed; \
                          a hold is placed and charged only if approved."
                .to_string(),
            price: 20.0,
            currency: "USD".to_string(),
            category: UpsellCategory::LateCheckout,
            listing_ids: None,
            options: Some(vec![
                UpsellOption {
                    id: "late-checkout-2hr".to_string(),
                    label: "2 hours late".to_string(),
                    price: 20.0,
                },
                UpsellOption {
                    id: "late-checkout-4hr".to_string(),
                    label: "4 hours late".to_string(),
                    price: 40.0,
                },
                UpsellOption {
                    id: "late-checkout-6hr".to_string(),
                    label: "6 hours late".to_string(),
                    price: 60.0,
                },
            ]),
        },
        Upsell {
            id: "mid-stay-clean".to_string(),
            name: "Mid-Stay Cleaning".to_string(),
            description: "A full clean and linen refresh during your stay.".to_string(),
            price: 150.0,
            currency: "USD".to_string(),
            category: UpsellCategory::Service,
            listing_ids: None,
            options: None,
        },
        Upsell {
            id: "firewood-bundle".to_string(),
            name: "Firewood Bundle".to_string(),
            description: "Two bundles of seasoned firewood delivered before check-in."
                .to_string(),
            price: 35.0,
            currency: "USD".to_string(),
            category: UpsellCategory::Extras,
            listing_ids: None,
            options: None,
        },
    ]
}

pub fn find<'a>(catalog: &'a [Upsell], upsell_id: &str) -> Option<&'a Upsell> {
    catalog.iter().find(|u| u.id == upsell_id)
}

/// Filter the catalog for a guest: listing scoping plus an optional
/// category narrowing.
pub fn for_guest(
    catalog: &[Upsell],
    listing_id: Option<&str>,
    category: Option<&UpsellCategory>,
) -> Vec<Upsell> {
    catalog
        .iter()
        .filter(|u| listing_id.map_or(true, |id| u.offered_at(id)))
        .filter(|u| category.map_or(true, |c| &u.category == c))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_heating_scoped_to_pool_listings() {
        let catalog = build(&["listing-with-pool".to_string()]);
        let with_pool = for_guest(&catalog, Some("listing-with-pool"), None);
        let without_pool = for_guest(&catalog, Some("listing-no-pool"), None);

        assert!(with_pool.iter().any(|u| u.id == "pool-heating"));
        assert!(!without_pool.iter().any(|u| u.id == "pool-heating"));
        // Unscoped items show everywhere
        assert!(without_pool.iter().any(|u| u.id == "early-checkin"));
    }

    #[test]
    fn test_demo_listing_always_has_a_pool() {
        let catalog = build(&[]);
        let demo = for_guest(&catalog, Some(DEMO_LISTING_ID), None);
        assert!(demo.iter().any(|u| u.id == "pool-heating"));
    }

    #[test]
    fn test_category_filter() {
        let catalog = build(&[]);
        let services = for_guest(&catalog, None, Some(&UpsellCategory::Service));
        assert!(!services.is_empty());
        assert!(services
            .iter()
            .all(|u| u.category == UpsellCategory::Service));
    }

    #[test]
    fn test_find_by_id() {
        let catalog = build(&[]);
        assert!(find(&catalog, "late-checkout").is_some());
        assert!(find(&catalog, "jet-ski").is_none());
    }
}
