//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, timeout)
//! - Guard proxy routes with the gateway key
//! - Serve until the shutdown coordinator fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::auth::require_api_key;
use crate::http::request::{MakeRequestUuidV4, X_REQUEST_ID};
use crate::http::transport::ReqwestTransport;
use crate::http::{proxy, webhook};
use crate::payments::OrderStore;
use crate::reseller::ResellerClient;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub reseller: Arc<ResellerClient<ReqwestTransport>>,
    pub store: Arc<dyn OrderStore>,
    pub config: Arc<GatewayConfig>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<GatewayConfig>,
}

impl HttpServer {
    pub fn new(
        config: GatewayConfig,
        reseller: Arc<ResellerClient<ReqwestTransport>>,
        store: Arc<dyn OrderStore>,
    ) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            reseller,
            store,
            config: config.clone(),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let protected = Router::new()
            .route("/api/reseller", post(proxy::reseller_proxy))
            .route("/api/topups/{iccid}", get(proxy::topups))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

        let mut router = Router::new().route("/health", get(health)).merge(protected);
        if config.payments.enabled {
            router = router.route("/api/webhooks/payment", post(webhook::payment_webhook));
        }

        let layers = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id());

        router.with_state(state).layer(layers)
    }

    /// The assembled router, for in-process serving.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            webhook_enabled = self.config.payments.enabled,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
