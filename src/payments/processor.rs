//! Payment fulfilment pipeline.
//!
//! A paid checkout becomes either a new eSIM order or a top-up on an
//! installed SIM. Every outcome other than an error is final; errors are
//! reported so the processor redelivers the event.

use thiserror::Error;
use tracing::{error, info, warn};

use crate::http::transport::Transport;
use crate::observability::metrics;
use crate::payments::store::{unix_now, OrderRecord, OrderStore, StoreError, TopupRecord, TransactionKind};
use crate::payments::types::PaymentEvent;
use crate::reseller::{OrderRequest, ResellerClient, ResellerError, TopupRequest};
use crate::resilience::idempotency::generate_idempotency_key;
use crate::resilience::timeouts::Sleeper;

/// What happened to a delivered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fulfilment {
    Unhandled(String),
    NotPaid,
    AlreadyFulfilled,
    Esim {
        order_id: String,
        iccid: Option<String>,
    },
    Topup {
        topup_id: Option<String>,
        iccid: String,
    },
}

impl Fulfilment {
    pub fn status(&self) -> &'static str {
        match self {
            Fulfilment::Unhandled(_) => "event_unhandled",
            Fulfilment::NotPaid => "payment_not_paid",
            Fulfilment::AlreadyFulfilled => "already_fulfilled",
            Fulfilment::Esim { .. } | Fulfilment::Topup { .. } => "fulfilled",
        }
    }
}

#[derive(Debug, Error)]
pub enum FulfilmentError {
    #[error("session {0} carries no package id")]
    MissingPackage(String),

    #[error("top-up session {0} carries no ICCID")]
    MissingIccid(String),

    #[error("session {0} is already being fulfilled")]
    InProgress(String),

    #[error(transparent)]
    Reseller(#[from] ResellerError),

    #[error("order store: {0}")]
    Store(#[from] StoreError),
}

/// Fulfil one payment event.
pub async fn process_payment<T: Transport, S: Sleeper>(
    event: &PaymentEvent,
    client: &ResellerClient<T, S>,
    store: &dyn OrderStore,
    default_currency: &str,
) -> Result<Fulfilment, FulfilmentError> {
    let session_id = event.session_id.as_str();
    let kind = if event.is_top_up {
        TransactionKind::Topup
    } else {
        TransactionKind::Esim
    };

    if !event.is_checkout_completed() {
        info!(session_id, event_type = %event.event_type, "Ignoring unhandled payment event");
        return Ok(Fulfilment::Unhandled(event.event_type.clone()));
    }
    if !event.is_paid() {
        info!(session_id, status = %event.payment_status, "Session not paid yet");
        metrics::record_fulfilment(kind.as_str(), "skipped");
        return Ok(Fulfilment::NotPaid);
    }
    if store.is_fulfilled(session_id) {
        info!(session_id, "Session already fulfilled; ignoring redelivery");
        metrics::record_fulfilment(kind.as_str(), "duplicate");
        return Ok(Fulfilment::AlreadyFulfilled);
    }
    if !store.try_claim(session_id) {
        warn!(session_id, "Concurrent delivery for session in progress");
        return Err(FulfilmentError::InProgress(session_id.to_string()));
    }

    // The first delivery may have finished between the check and the claim.
    let outcome = if store.is_fulfilled(session_id) {
        Ok(Fulfilment::AlreadyFulfilled)
    } else {
        match kind {
            TransactionKind::Topup => fulfil_topup(event, client, store, default_currency).await,
            TransactionKind::Esim => fulfil_esim(event, client, store, default_currency).await,
        }
    };
    store.release(session_id);

    match &outcome {
        Ok(fulfilment) => {
            info!(session_id, kind = kind.as_str(), status = fulfilment.status(), "Payment processed");
            metrics::record_fulfilment(kind.as_str(), "fulfilled");
        }
        Err(e) => {
            error!(session_id, kind = kind.as_str(), error = %e, "Payment fulfilment failed");
            metrics::record_fulfilment(kind.as_str(), "failed");
        }
    }
    outcome
}

async fn fulfil_topup<T: Transport, S: Sleeper>(
    event: &PaymentEvent,
    client: &ResellerClient<T, S>,
    store: &dyn OrderStore,
    default_currency: &str,
) -> Result<Fulfilment, FulfilmentError> {
    let session_id = &event.session_id;
    let iccid = event
        .sim_iccid
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FulfilmentError::MissingIccid(session_id.clone()))?;
    let package_id = event
        .base_package_id()
        .ok_or_else(|| FulfilmentError::MissingPackage(session_id.clone()))?;

    let key = store.idempotency_key(session_id, &|| {
        generate_idempotency_key("topup", [iccid, package_id, session_id.as_str()])
    })?;

    info!(session_id = %session_id, iccid, package_id, idempotency_key = %key, "Creating top-up");
    let created = client
        .create_topup(
            &TopupRequest {
                iccid: iccid.to_string(),
                package_id: package_id.to_string(),
                description: Some(format!("Top-up from payment session {}", session_id)),
            },
            &key,
        )
        .await?;
    let topup_id = created.data.reference();
    let currency = event.currency_or(default_currency);
    let now = unix_now();

    // Top-up detail first: the order record is what marks the session fulfilled.
    store.insert_topup(TopupRecord {
        topup_id: topup_id.clone(),
        iccid: iccid.to_string(),
        session_id: session_id.clone(),
        email: event.email().to_string(),
        package_id: package_id.to_string(),
        amount: event.price(),
        currency: currency.clone(),
        created_at: now,
    })?;
    store.insert_order(OrderRecord {
        session_id: session_id.clone(),
        kind: TransactionKind::Topup,
        package_id: package_id.to_string(),
        email: event.email().to_string(),
        customer_name: event.customer_name.clone(),
        reseller_order_id: topup_id.clone().unwrap_or_else(|| package_id.to_string()),
        iccid: Some(iccid.to_string()),
        qr_code_url: None,
        install_url: None,
        price: event.price(),
        currency,
        promo_code: event.promo_code.clone(),
        partner_code: event.partner_code.clone(),
        created_at: now,
    })?;

    Ok(Fulfilment::Topup {
        topup_id,
        iccid: iccid.to_string(),
    })
}

async fn fulfil_esim<T: Transport, S: Sleeper>(
    event: &PaymentEvent,
    client: &ResellerClient<T, S>,
    store: &dyn OrderStore,
    default_currency: &str,
) -> Result<Fulfilment, FulfilmentError> {
    let session_id = &event.session_id;
    let package_id = event
        .base_package_id()
        .ok_or_else(|| FulfilmentError::MissingPackage(session_id.clone()))?;

    // Reused on redelivery so the reseller can drop a repeat of an order it already took.
    let key = store.idempotency_key(session_id, &|| {
        generate_idempotency_key("order", [package_id, session_id.as_str()])
    })?;
    let mut request = OrderRequest::sim(package_id);
    request.description = Some(format!("Order from payment session {}", session_id));

    info!(session_id = %session_id, package_id, idempotency_key = %key, "Creating eSIM order");
    let placed = client.create_order(&request, &key).await?;
    let order = placed.data;
    let sim = order.sims.first();
    if sim.is_none() {
        warn!(session_id = %session_id, order_id = %order.id, "Order returned no SIM");
    }

    let iccid = sim.map(|s| s.iccid.clone());
    store.insert_order(OrderRecord {
        session_id: session_id.clone(),
        kind: TransactionKind::Esim,
        package_id: package_id.to_string(),
        email: event.email().to_string(),
        customer_name: event.customer_name.clone(),
        reseller_order_id: order.id.to_string(),
        iccid: iccid.clone(),
        qr_code_url: sim.and_then(|s| s.qrcode_url.clone()),
        install_url: sim.and_then(|s| s.direct_apple_installation_url.clone()),
        price: event.price(),
        currency: event.currency_or(default_currency),
        promo_code: event.promo_code.clone(),
        partner_code: event.partner_code.clone(),
        created_at: unix_now(),
    })?;

    Ok(Fulfilment::Esim {
        order_id: order.id.to_string(),
        iccid,
    })
}
