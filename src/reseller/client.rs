//! Reseller API client.
//!
//! Every operation goes through the [`ResilientExecutor`] with the retry
//! profile for its family. The bearer token is fetched on demand, cached in
//! the injected [`TokenCache`] and refreshed by at most one caller at a time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::schema::{ResellerConfig, RetryProfilesConfig};
use crate::http::request::RequestDescriptor;
use crate::http::transport::{ReqwestTransport, Transport, TransportError};
use crate::observability::metrics;
use crate::reseller::token::{AccessToken, Clock, InMemoryTokenCache, SystemClock, TokenCache};
use crate::reseller::types::{
    Envelope, Order, OrderRequest, Package, ResellerError, ResellerResult, TokenData, Topup,
    TopupRequest, Usage,
};
use crate::resilience::executor::{ExecutionResult, ResilientExecutor};
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts::{Sleeper, TokioSleeper};

/// Upper bound on how long a fetched token is trusted, whatever `expires_in` says.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// OAuth client credentials.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Retry policies per operation family.
#[derive(Debug, Clone)]
pub struct RetryProfiles {
    pub token: RetryPolicy,
    pub read: RetryPolicy,
    pub order: RetryPolicy,
    pub topup: RetryPolicy,
}

impl From<&RetryProfilesConfig> for RetryProfiles {
    fn from(config: &RetryProfilesConfig) -> Self {
        Self {
            token: RetryPolicy::from(&config.token),
            read: RetryPolicy::from(&config.read),
            order: RetryPolicy::from(&config.order),
            topup: RetryPolicy::from(&config.topup),
        }
    }
}

impl Default for RetryProfiles {
    fn default() -> Self {
        Self::from(&RetryProfilesConfig::default())
    }
}

pub struct ResellerClient<T, S = TokioSleeper> {
    base_url: String,
    credentials: Credentials,
    executor: ResilientExecutor<T, S>,
    cache: Arc<dyn TokenCache>,
    clock: Arc<dyn Clock>,
    profiles: RetryProfiles,
    refresh_margin: Duration,
    refresh_lock: Mutex<()>,
}

impl ResellerClient<ReqwestTransport> {
    /// Client over `reqwest` with an in-memory token cache.
    pub fn from_config(config: &ResellerConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::with_timeout(Duration::from_secs(config.attempt_timeout_secs))?;
        let client = Self::new(
            &config.base_url,
            Credentials::new(&config.client_id, &config.client_secret),
            ResilientExecutor::new(transport),
            Arc::new(InMemoryTokenCache::new()),
        )
        .with_profiles(RetryProfiles::from(&config.retry))
        .with_refresh_margin(Duration::from_secs(config.token_refresh_margin_secs));
        Ok(client)
    }
}

impl<T: Transport, S: Sleeper> ResellerClient<T, S> {
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        executor: ResilientExecutor<T, S>,
        cache: Arc<dyn TokenCache>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            executor,
            cache,
            clock: Arc::new(SystemClock),
            profiles: RetryProfiles::default(),
            refresh_margin: Duration::from_secs(60),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_profiles(mut self, profiles: RetryProfiles) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Clock used to stamp token expiry. Share it with the cache.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn executor(&self) -> &ResilientExecutor<T, S> {
        &self.executor
    }

    /// A valid bearer token, fetching a new one if the cache has none.
    pub async fn access_token(&self) -> ResellerResult<String> {
        if let Some(token) = self.cache.get() {
            return Ok(token.value);
        }

        let _refresh = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(token) = self.cache.get() {
            return Ok(token.value);
        }

        let request = RequestDescriptor::post(self.url("/token"))
            .accept_json()
            .form([
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
            ]);
        let envelope: Envelope<TokenData> = self.call("token", &request, &self.profiles.token).await?;

        let lifetime = Duration::from_secs(envelope.data.expires_in)
            .min(MAX_TOKEN_LIFETIME)
            .saturating_sub(self.refresh_margin);
        let now = self.clock.now();
        let expires_at = now.checked_add(lifetime).unwrap_or(now);
        let token = AccessToken::new(envelope.data.access_token, expires_at);
        self.cache.set(token.clone());

        info!(valid_for_secs = lifetime.as_secs(), "Reseller access token refreshed");
        Ok(token.value)
    }

    /// Packages on sale for an ISO country code.
    pub async fn packages(&self, country_code: &str) -> ResellerResult<Vec<Package>> {
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("country_code", country_code)
            .finish();
        let request = self.authorized(Method::GET, &format!("/packages?{}", query)).await?;
        let envelope: Envelope<Vec<Package>> = self.call("packages", &request, &self.profiles.read).await?;
        Ok(envelope.data)
    }

    /// Place an order. `idempotency_key` must be generated once per logical
    /// order and reused on any redelivery.
    pub async fn create_order(
        &self,
        order: &OrderRequest,
        idempotency_key: &str,
    ) -> ResellerResult<Envelope<Order>> {
        let request = self
            .authorized(Method::POST, "/orders")
            .await?
            .idempotency_key(idempotency_key)
            .json(order)
            .map_err(|source| ResellerError::Encode {
                operation: "create_order",
                source,
            })?;
        self.call("create_order", &request, &self.profiles.order).await
    }

    pub async fn order(&self, order_id: &str) -> ResellerResult<Envelope<Order>> {
        let path = format!("/orders/{}", path_segment(order_id)?);
        let request = self.authorized(Method::GET, &path).await?;
        self.call("order", &request, &self.profiles.read).await
    }

    /// Add a package to an installed SIM. Same key rules as [`Self::create_order`].
    pub async fn create_topup(
        &self,
        topup: &TopupRequest,
        idempotency_key: &str,
    ) -> ResellerResult<Envelope<Topup>> {
        path_segment(&topup.iccid)?;
        let request = self
            .authorized(Method::POST, "/orders/topups")
            .await?
            .idempotency_key(idempotency_key)
            .json(topup)
            .map_err(|source| ResellerError::Encode {
                operation: "create_topup",
                source,
            })?;
        self.call("create_topup", &request, &self.profiles.topup).await
    }

    /// Top-ups available for a SIM, as returned upstream.
    pub async fn topups(&self, iccid: &str) -> ResellerResult<Value> {
        let path = format!("/sims/{}/topups", path_segment(iccid)?);
        let request = self.authorized(Method::GET, &path).await?;
        let envelope: Envelope<Value> = self.call("topups", &request, &self.profiles.read).await?;
        Ok(envelope.data)
    }

    pub async fn usage(&self, iccid: &str) -> ResellerResult<Usage> {
        let path = format!("/sims/{}/usage", path_segment(iccid)?);
        let request = self.authorized(Method::GET, &path).await?;
        let envelope: Envelope<Usage> = self.call("usage", &request, &self.profiles.read).await?;
        Ok(envelope.data)
    }

    /// Relay an arbitrary API call on the caller's behalf.
    ///
    /// Token failures are errors; the upstream outcome itself comes back
    /// unescalated so the caller can mirror its status.
    pub async fn forward(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
    ) -> ResellerResult<ExecutionResult<Value>> {
        validate_endpoint(endpoint)?;
        let mut request = self.authorized(method, endpoint).await?;
        if let Some(body) = body {
            request = request.json(body).map_err(|source| ResellerError::Encode {
                operation: "forward",
                source,
            })?;
        }

        let result = self.executor.execute::<Value>(&request, &self.profiles.read).await;
        metrics::record_call("forward", result.is_success(), result.attempts);
        if let Err(e) = &result.outcome {
            error!(
                endpoint,
                attempts = result.attempts,
                status = ?result.last_status,
                error = %e,
                "Forwarded reseller call failed"
            );
            if let Some(raw) = e.raw_text() {
                debug!(endpoint, raw_response = raw, "Upstream response body");
            }
        }
        Ok(result)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn authorized(&self, method: Method, path: &str) -> ResellerResult<RequestDescriptor> {
        let token = self.access_token().await?;
        Ok(RequestDescriptor::new(method, self.url(path))
            .accept_json()
            .bearer(&token))
    }

    async fn call<R: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: &RequestDescriptor,
        policy: &RetryPolicy,
    ) -> ResellerResult<R> {
        let result = self.executor.execute::<R>(request, policy).await;
        metrics::record_call(operation, result.is_success(), result.attempts);

        result.into_result().map_err(|source| {
            error!(
                operation,
                attempts = source.attempts,
                status = ?source.last_status,
                error = %source.error,
                "Reseller call failed"
            );
            if let Some(raw) = source.raw_text() {
                debug!(operation, raw_response = raw, "Upstream response body");
            }
            ResellerError::Call { operation, source }
        })
    }
}

/// Reject identifiers that would change the request path.
fn path_segment(id: &str) -> ResellerResult<&str> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(id)
    } else {
        Err(ResellerError::InvalidIdentifier(id.to_string()))
    }
}

/// A relative API path: leading `/`, no scheme, no parent segments.
pub fn validate_endpoint(endpoint: &str) -> ResellerResult<()> {
    let valid = endpoint.starts_with('/')
        && !endpoint.starts_with("//")
        && !endpoint.contains("://")
        && !endpoint.split(['/', '?']).any(|segment| segment == "..");
    if valid {
        Ok(())
    } else {
        Err(ResellerError::InvalidEndpoint(endpoint.to_string()))
    }
}
