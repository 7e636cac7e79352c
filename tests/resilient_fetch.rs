//! Resilient fetch against a real socket.

use std::time::Duration;

use serde_json::Value;

use esim_gateway::http::RequestDescriptor;
use esim_gateway::resilience::{resilient_fetch, CallError, RetryPolicy};

mod common;
use common::MockResponse;

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(max_retries)
        .with_initial_delay(Duration::from_millis(5))
        .with_max_delay(Duration::from_millis(20))
}

#[tokio::test]
async fn test_recovers_after_two_503s() {
    let backend = common::start_programmable_backend(|_, i| {
        if i < 2 {
            MockResponse::text(503, "overloaded")
        } else {
            MockResponse::json(200, r#"{"data":{"ok":true}}"#)
        }
    })
    .await;
    let client = reqwest::Client::new();

    let result = resilient_fetch::<Value>(
        &client,
        &RequestDescriptor::get(format!("{}/packages", backend.url())),
        &policy(3),
    )
    .await;

    assert!(result.is_success());
    assert_eq!(result.attempts, 3);
    assert_eq!(result.last_status, Some(200));
    assert_eq!(result.data().unwrap()["data"]["ok"], true);
    assert_eq!(backend.hits(), 3);
}

#[tokio::test]
async fn test_gateway_page_then_json() {
    let backend = common::start_programmable_backend(|_, i| {
        if i == 0 {
            MockResponse::html(502, "<html><body>502 Bad Gateway</body></html>")
        } else {
            MockResponse::json(200, r#"{"ok":true}"#)
        }
    })
    .await;

    let result = resilient_fetch::<Value>(
        &reqwest::Client::new(),
        &RequestDescriptor::get(format!("{}/orders/1", backend.url())),
        &policy(1),
    )
    .await;

    assert!(result.is_success());
    assert_eq!(result.attempts, 2);
}

#[tokio::test]
async fn test_persistent_404_is_not_retried() {
    let backend =
        common::start_programmable_backend(|_, _| MockResponse::json(404, r#"{"message":"not found"}"#)).await;

    let result = resilient_fetch::<Value>(
        &reqwest::Client::new(),
        &RequestDescriptor::get(format!("{}/orders/404", backend.url())),
        &policy(3),
    )
    .await;

    assert!(!result.is_success());
    assert_eq!(result.attempts, 1);
    assert_eq!(result.last_status, Some(404));
    assert!(result.error().unwrap().contains("404"));
    assert_eq!(result.raw_text(), Some(r#"{"message":"not found"}"#));
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_html_with_200_status() {
    let backend = common::start_programmable_backend(|_, _| {
        MockResponse::html(200, "<!DOCTYPE html><html><title>Maintenance</title></html>")
    })
    .await;

    let result = resilient_fetch::<Value>(
        &reqwest::Client::new(),
        &RequestDescriptor::get(backend.url()),
        &policy(2),
    )
    .await;

    assert_eq!(result.attempts, 1);
    assert!(result.error().unwrap().contains("HTML"));
    assert!(result.raw_text().unwrap().starts_with("<!DOCTYPE html>"));
}

#[tokio::test]
async fn test_connection_refused_without_network_retry() {
    let addr = common::closed_port().await;

    let result = resilient_fetch::<Value>(
        &reqwest::Client::new(),
        &RequestDescriptor::get(format!("http://{}/token", addr)),
        &policy(3).with_retry_on_network_error(false),
    )
    .await;

    assert_eq!(result.attempts, 1);
    assert_eq!(result.last_status, None);
    assert!(matches!(result.outcome, Err(CallError::Network(_))));
    assert!(result.error().unwrap().starts_with("Network error: "));
}

#[tokio::test]
async fn test_connection_refused_exhausts_budget() {
    let addr = common::closed_port().await;

    let result = resilient_fetch::<Value>(
        &reqwest::Client::new(),
        &RequestDescriptor::get(format!("http://{}/token", addr)),
        &policy(2),
    )
    .await;

    assert_eq!(result.attempts, 3);
    assert!(!result.is_success());
}

#[tokio::test]
async fn test_post_body_and_headers_replayed() {
    let backend = common::start_programmable_backend(|_, i| {
        if i == 0 {
            MockResponse::text(500, "boom")
        } else {
            MockResponse::json(201, r#"{"data":{"id":9}}"#)
        }
    })
    .await;
    let request = RequestDescriptor::post(format!("{}/orders", backend.url()))
        .idempotency_key("order-fr-1gb-abc")
        .json(&serde_json::json!({ "package_id": "fr-1gb" }))
        .unwrap();

    let result = resilient_fetch::<Value>(&reqwest::Client::new(), &request, &policy(1)).await;

    assert!(result.is_success());
    let seen = backend.requests();
    assert_eq!(seen.len(), 2);
    for r in &seen {
        assert_eq!(r.method, "POST");
        assert_eq!(r.header("idempotency-key"), Some("order-fr-1gb-abc"));
        assert_eq!(r.body, r#"{"package_id":"fr-1gb"}"#);
    }
}
