//! Payment webhook types.

use serde::{Deserialize, Serialize};

/// The only event type that triggers fulfilment.
pub const CHECKOUT_COMPLETED: &str = "checkout.completed";

/// Suffix the storefront appends to package ids sold as top-ups.
pub const TOPUP_SUFFIX: &str = "-topup";

/// A completed checkout as reported by the payment processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Event type, e.g. `checkout.completed`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Processor checkout session id. Unique per purchase.
    pub session_id: String,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: String,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    /// Total in minor currency units.
    #[serde(default)]
    pub amount_total: Option<u64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub is_top_up: bool,
    #[serde(default)]
    pub sim_iccid: Option<String>,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub partner_code: Option<String>,
}

impl PaymentEvent {
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_COMPLETED
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status.eq_ignore_ascii_case("paid")
    }

    /// Package id with any top-up suffix removed.
    pub fn base_package_id(&self) -> Option<&str> {
        self.package_id
            .as_deref()
            .map(|id| id.split(TOPUP_SUFFIX).next().unwrap_or(id))
            .filter(|id| !id.is_empty())
    }

    /// Amount in major units.
    pub fn price(&self) -> f64 {
        self.amount_total.unwrap_or(0) as f64 / 100.0
    }

    /// Upper-cased event currency, else `fallback`.
    pub fn currency_or(&self, fallback: &str) -> String {
        self.currency
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(fallback)
            .to_ascii_uppercase()
    }

    pub fn email(&self) -> &str {
        self.customer_email.as_deref().unwrap_or("no-email@example.com")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(json: &str) -> PaymentEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_minimal_event() {
        let e = event(r#"{"type":"checkout.completed","session_id":"cs_1","payment_status":"paid"}"#);
        assert!(e.is_checkout_completed());
        assert!(e.is_paid());
        assert!(!e.is_top_up);
        assert_eq!(e.base_package_id(), None);
        assert_eq!(e.email(), "no-email@example.com");
    }

    #[test]
    fn test_topup_suffix_stripped() {
        let e = event(
            r#"{"type":"checkout.completed","session_id":"cs_2","payment_status":"paid",
                "package_id":"fr-1gb-topup","is_top_up":true,"sim_iccid":"8944"}"#,
        );
        assert_eq!(e.base_package_id(), Some("fr-1gb"));
    }

    #[test]
    fn test_price_and_currency() {
        let e = event(
            r#"{"type":"checkout.completed","session_id":"cs_3","payment_status":"unpaid",
                "amount_total":1299,"currency":"usd"}"#,
        );
        assert!(!e.is_paid());
        assert!((e.price() - 12.99).abs() < f64::EPSILON);
        assert_eq!(e.currency_or("EUR"), "USD");

        let e = event(r#"{"type":"x","session_id":"cs_4","payment_status":"paid"}"#);
        assert_eq!(e.currency_or("eur"), "EUR");
    }
}
