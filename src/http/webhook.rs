//! Payment processor webhook.
//!
//! Any non-2xx reply makes the processor redeliver, so only genuine
//! fulfilment failures return 5xx.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::auth::webhook_secret_matches;
use crate::http::server::AppState;
use crate::payments::{process_payment, Fulfilment, FulfilmentError, PaymentEvent};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WebhookReply {
    pub received: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookReply {
    fn rejected(error: impl Into<String>) -> Self {
        Self {
            received: false,
            status: None,
            processed: None,
            error: Some(error.into()),
        }
    }

    fn handled(fulfilment: &Fulfilment) -> Self {
        Self {
            received: true,
            status: Some(fulfilment.status().to_string()),
            processed: Some(matches!(
                fulfilment,
                Fulfilment::Esim { .. } | Fulfilment::Topup { .. }
            )),
            error: None,
        }
    }

    fn failed(error: &FulfilmentError) -> Self {
        Self {
            received: true,
            status: None,
            processed: Some(false),
            error: Some(error.to_string()),
        }
    }
}

/// `POST /api/webhooks/payment`.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<PaymentEvent>, JsonRejection>,
) -> (StatusCode, Json<WebhookReply>) {
    if !webhook_secret_matches(&headers, &state.config.payments.webhook_secret) {
        tracing::warn!("Webhook rejected: missing or invalid secret");
        return (
            StatusCode::UNAUTHORIZED,
            Json(WebhookReply::rejected("invalid webhook secret")),
        );
    }

    let Json(event) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Webhook payload rejected");
            return (
                StatusCode::BAD_REQUEST,
                Json(WebhookReply::rejected(rejection.body_text())),
            );
        }
    };

    let outcome = process_payment(
        &event,
        state.reseller.as_ref(),
        state.store.as_ref(),
        &state.config.payments.default_currency,
    )
    .await;

    match outcome {
        Ok(fulfilment) => (StatusCode::OK, Json(WebhookReply::handled(&fulfilment))),
        Err(e @ FulfilmentError::InProgress(_)) => (StatusCode::CONFLICT, Json(WebhookReply::failed(&e))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(WebhookReply::failed(&e)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_shapes() {
        let done = WebhookReply::handled(&Fulfilment::Esim {
            order_id: "1".into(),
            iccid: None,
        });
        assert_eq!(done.status.as_deref(), Some("fulfilled"));
        assert_eq!(done.processed, Some(true));

        let skipped = serde_json::to_value(WebhookReply::handled(&Fulfilment::NotPaid)).unwrap();
        assert_eq!(
            skipped,
            serde_json::json!({ "received": true, "status": "payment_not_paid", "processed": false })
        );
    }
}
