//! Endpoint layout and small wire-format helpers for the sidecar HTTP API.

use std::time::Duration;

use carlink_core::SidecarConfig;

/// Query parameter naming the service on registry lookups.
pub const SERVICE_QUERY: &str = "service";

/// Query parameter carrying the registration TTL.
pub const TTL_QUERY: &str = "ttl";

/// Absolute URIs of the sidecar endpoints, fixed once at client construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Base for passthrough calls; a call path is appended verbatim.
    pub http: String,
    pub registry: String,
    pub rpc: String,
    pub health: String,
}

impl Endpoints {
    pub fn from_config(config: &SidecarConfig) -> Self {
        let http = config.base_address.trim_end_matches('/').to_string();
        Self {
            registry: format!("{http}{}", config.registry_path),
            rpc: format!("{http}{}", config.rpc_path),
            health: format!("{http}{}", config.health_path),
            http,
        }
    }

    /// Target of a passthrough call. `path` is expected to start with '/'.
    pub fn http_call(&self, path: &str) -> String {
        format!("{}{}", self.http, path)
    }
}

/// Render a TTL in the duration syntax the sidecar parses (`30s`, `1500ms`).
pub fn format_ttl(ttl: Duration) -> String {
    if ttl.subsec_nanos() == 0 {
        format!("{}s", ttl.as_secs())
    } else if ttl.subsec_nanos() % 1_000_000 == 0 {
        format!("{}ms", ttl.as_millis())
    } else {
        format!("{}ns", ttl.as_nanos())
    }
}
