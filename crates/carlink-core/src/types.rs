//! Values exchanged with the sidecar.
//!
//! Payloads are schema-less: descriptors and RPC bodies are JSON maps and
//! the passthrough body is raw bytes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SidecarError};

// ── Registry ────────────────────────────────────────────────────

/// Opaque description of a service as understood by the sidecar registry.
///
/// The client never interprets the contents, it only serializes them. The
/// usual shape is `{"name", "version", "metadata", "nodes": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceDescriptor(Map<String, Value>);

impl ServiceDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the descriptor of a single-node service.
    pub fn with_node(name: &str, node: ServiceNode) -> Self {
        let mut map = Map::new();
        map.insert("name".into(), Value::String(name.to_string()));
        map.insert("nodes".into(), Value::Array(vec![node.into_value()]));
        Self(map)
    }

    /// Set (or replace) a top-level field.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The `name` field, if present and a string.
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ServiceDescriptor {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for ServiceDescriptor {
    type Error = SidecarError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(SidecarError::InvalidRequest(format!(
                "service descriptor must be a JSON object, got {other}"
            ))),
        }
    }
}

/// A single node of a service, as registered with the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNode {
    pub id: String,
    pub address: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ServiceNode {
    pub fn new(id: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            port,
            metadata: Map::new(),
        }
    }

    fn into_value(self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), Value::String(self.id));
        map.insert("address".into(), Value::String(self.address));
        map.insert("port".into(), Value::from(self.port));
        if !self.metadata.is_empty() {
            map.insert("metadata".into(), Value::Object(self.metadata));
        }
        Value::Object(map)
    }
}

// ── RPC gateway ─────────────────────────────────────────────────

/// Body of a call through the sidecar's RPC gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    pub service: String,
    pub method: String,
    pub request: Value,
    /// Node to call directly instead of letting the sidecar pick one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl RpcRequest {
    pub fn new(service: impl Into<String>, method: impl Into<String>, request: Value) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            request,
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Reject requests the gateway would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        if self.service.is_empty() {
            return Err(SidecarError::InvalidRequest("invalid service".into()));
        }
        if self.method.is_empty() {
            return Err(SidecarError::InvalidRequest("invalid method".into()));
        }
        if matches!(self.address.as_deref(), Some("")) {
            return Err(SidecarError::InvalidRequest("invalid address".into()));
        }
        Ok(())
    }
}

/// Method-specific result of an RPC call. No schema is enforced.
pub type RpcResponse = Map<String, Value>;

// ── HTTP passthrough ────────────────────────────────────────────

/// A raw call forwarded by the sidecar to `base_address + path`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpCallRequest {
    pub path: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl HttpCallRequest {
    pub fn new(path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            body: body.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(SidecarError::InvalidRequest(format!(
                "path must begin with '/': {:?}",
                self.path
            )));
        }
        Ok(())
    }
}

/// Raw sidecar response, returned without interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCallResponse {
    pub status: u16,
    /// Body bytes exactly as received.
    pub body: Vec<u8>,
}

impl HttpCallResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as text. Fails instead of substituting invalid UTF-8.
    pub fn text(&self) -> Result<&str> {
        Ok(std::str::from_utf8(&self.body)?)
    }

    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

// ── Errors ──────────────────────────────────────────────────────

/// Structured error body emitted by the sidecar on failed calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicroError {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub status: String,
}

impl MicroError {
    /// Parse a sidecar error body. Plain-text bodies yield `None`.
    pub fn parse(body: &str) -> Option<Self> {
        let err: MicroError = serde_json::from_str(body).ok()?;
        if err.id.is_empty() && err.code == 0 && err.detail.is_empty() {
            return None;
        }
        Some(err)
    }
}
