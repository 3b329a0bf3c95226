//! HTTP client for the local sidecar.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use carlink_core::{
    HttpCallRequest, HttpCallResponse, Result, RpcRequest, RpcResponse, ServiceDescriptor,
    SidecarConfig, SidecarError,
};

use crate::protocol::{self, Endpoints};

/// How long between health check polls in [`SidecarClient::wait_for_healthy`].
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Client for the sidecar's registry, RPC gateway and HTTP passthrough.
///
/// Every call is a single independent request/response exchange. Nothing is
/// retried and nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct SidecarClient {
    client: Client,
    endpoints: Endpoints,
}

impl SidecarClient {
    pub fn new(config: &SidecarConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| SidecarError::Config(format!("Failed to build HTTP client: {e}")))?;
        Self::with_client(client, config)
    }

    /// Use a preconfigured reqwest client (proxies, custom timeouts, ...).
    pub fn with_client(client: Client, config: &SidecarConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            endpoints: Endpoints::from_config(config),
        })
    }

    /// Client for a sidecar at `base_address` with default endpoint paths.
    pub fn from_address(base_address: impl Into<String>) -> Result<Self> {
        Self::new(&SidecarConfig::with_base_address(base_address))
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    // ── Registry ────────────────────────────────────────────────

    /// Register a service with the sidecar registry.
    #[instrument(skip(self, service), fields(service = service.name().unwrap_or_default()))]
    pub async fn register(&self, service: &ServiceDescriptor) -> Result<HttpCallResponse> {
        let resp = self
            .client
            .post(&self.endpoints.registry)
            .json(service)
            .send()
            .await?;
        let result = expect_success(resp).await?;
        debug!(status = result.status, "Service registered");
        Ok(result)
    }

    /// Register a service that expires unless re-registered within `ttl`.
    #[instrument(skip(self, service), fields(service = service.name().unwrap_or_default()))]
    pub async fn register_with_ttl(
        &self,
        service: &ServiceDescriptor,
        ttl: Duration,
    ) -> Result<HttpCallResponse> {
        let resp = self
            .client
            .post(&self.endpoints.registry)
            .query(&[(protocol::TTL_QUERY, protocol::format_ttl(ttl))])
            .json(service)
            .send()
            .await?;
        let result = expect_success(resp).await?;
        debug!(status = result.status, "Service registered with ttl");
        Ok(result)
    }

    /// Remove a service from the sidecar registry.
    #[instrument(skip(self, service), fields(service = service.name().unwrap_or_default()))]
    pub async fn deregister(&self, service: &ServiceDescriptor) -> Result<HttpCallResponse> {
        let resp = self
            .client
            .delete(&self.endpoints.registry)
            .json(service)
            .send()
            .await?;
        let result = expect_success(resp).await?;
        debug!(status = result.status, "Service deregistered");
        Ok(result)
    }

    /// Look up every registered version of a service. Unknown services
    /// yield an empty list.
    #[instrument(skip(self))]
    pub async fn get_service(&self, name: &str) -> Result<Vec<ServiceDescriptor>> {
        if name.is_empty() {
            return Err(SidecarError::InvalidRequest("invalid service".into()));
        }
        let resp = self
            .client
            .get(&self.endpoints.registry)
            .query(&[(protocol::SERVICE_QUERY, name)])
            .send()
            .await?;
        let services = decode_services(resp).await?;
        debug!("Found {} versions", services.len());
        Ok(services)
    }

    /// List all services known to the registry.
    #[instrument(skip(self))]
    pub async fn list_services(&self) -> Result<Vec<ServiceDescriptor>> {
        let resp = self.client.get(&self.endpoints.registry).send().await?;
        let services = decode_services(resp).await?;
        debug!("Found {} services", services.len());
        Ok(services)
    }

    // ── RPC gateway ─────────────────────────────────────────────

    /// Call `method` on `service` through the RPC gateway.
    #[instrument(skip(self, request))]
    pub async fn rpc_call(
        &self,
        service: &str,
        method: &str,
        request: Value,
    ) -> Result<RpcResponse> {
        self.rpc(&RpcRequest::new(service, method, request)).await
    }

    /// Like [`rpc_call`](Self::rpc_call), but against a specific node.
    #[instrument(skip(self, request))]
    pub async fn rpc_call_remote(
        &self,
        address: &str,
        service: &str,
        method: &str,
        request: Value,
    ) -> Result<RpcResponse> {
        self.rpc(&RpcRequest::new(service, method, request).with_address(address)).await
    }

    /// Typed RPC call: serializes `request` and decodes the result into `R`.
    #[instrument(skip(self, request))]
    pub async fn rpc_call_as<T, R>(&self, service: &str, method: &str, request: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request =
            serde_json::to_value(request).map_err(|e| SidecarError::Encode(e.to_string()))?;
        let body = self.send_rpc(&RpcRequest::new(service, method, request)).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Send a prepared RPC request and decode the JSON object it returns.
    pub async fn rpc(&self, request: &RpcRequest) -> Result<RpcResponse> {
        let body = self.send_rpc(request).await?;
        let response: RpcResponse = serde_json::from_slice(&body)?;
        debug!(fields = response.len(), "RPC response decoded");
        Ok(response)
    }

    async fn send_rpc(&self, request: &RpcRequest) -> Result<Vec<u8>> {
        request.validate()?;
        let resp = self
            .client
            .post(&self.endpoints.rpc)
            .json(request)
            .send()
            .await?;
        Ok(expect_success(resp).await?.body)
    }

    // ── HTTP passthrough ────────────────────────────────────────

    /// POST `body` verbatim to `path` on the sidecar and hand back the raw
    /// response. A non-2xx status is not an error here.
    pub async fn http_call(
        &self,
        path: &str,
        body: impl Into<Vec<u8>>,
    ) -> Result<HttpCallResponse> {
        self.http_call_with(HttpCallRequest::new(path, body)).await
    }

    #[instrument(skip(self, request), fields(path = %request.path, bytes = request.body.len()))]
    pub async fn http_call_with(&self, request: HttpCallRequest) -> Result<HttpCallResponse> {
        request.validate()?;
        let url = self.endpoints.http_call(&request.path);
        let mut builder = self.client.post(&url).body(request.body);
        if let Some(content_type) = request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let result = read_response(builder.send().await?).await?;
        debug!(status = result.status, "HTTP call completed");
        Ok(result)
    }

    // ── Health ──────────────────────────────────────────────────

    /// Check sidecar health.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<HttpCallResponse> {
        let resp = self.client.get(&self.endpoints.health).send().await?;
        expect_success(resp).await
    }

    /// Poll the health endpoint until the sidecar reports healthy or
    /// `timeout` elapses. Each attempt is bounded by the remaining time, so a
    /// sidecar that accepts connections but never answers cannot stall this.
    /// On expiry the last failure is returned, or `Timeout` if no attempt
    /// completed.
    pub async fn wait_for_healthy(&self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut last_error = None;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.health()).await {
                Ok(Ok(_)) => return Ok(()),
                Ok(Err(e)) if tokio::time::Instant::now() >= deadline => return Err(e),
                Ok(Err(e)) => {
                    debug!(error = %e, "Sidecar not ready yet");
                    last_error = Some(e);
                }
                Err(_) => return Err(last_error.unwrap_or(SidecarError::Timeout(timeout))),
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            tokio::time::sleep(HEALTH_POLL_INTERVAL.min(remaining)).await;
        }
    }
}

async fn read_response(resp: Response) -> Result<HttpCallResponse> {
    let status = resp.status().as_u16();
    let body = resp.bytes().await?.to_vec();
    Ok(HttpCallResponse { status, body })
}

async fn expect_success(resp: Response) -> Result<HttpCallResponse> {
    let result = read_response(resp).await?;
    if !result.is_success() {
        return Err(SidecarError::from_status(result.status, &result.body));
    }
    Ok(result)
}

async fn decode_services(resp: Response) -> Result<Vec<ServiceDescriptor>> {
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(Vec::new());
    }
    let result = expect_success(resp).await?;
    let services: Option<Vec<ServiceDescriptor>> = serde_json::from_slice(&result.body)?;
    Ok(services.unwrap_or_default())
}
