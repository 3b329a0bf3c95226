// In-process stand-in for the sidecar: records every request it receives
// and answers with canned responses keyed by path.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use carlink_core::SidecarConfig;
use carlink_sidecar::SidecarClient;

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Clone, Default)]
pub struct FakeSidecar {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    responses: Arc<Mutex<HashMap<String, (u16, Vec<u8>)>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
}

#[allow(dead_code)]
impl FakeSidecar {
    /// Answer requests to `path` with `status` and `body`. Unconfigured
    /// paths get an empty 200.
    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.respond_bytes(path, status, body.as_bytes());
    }

    pub fn respond_bytes(&self, path: &str, status: u16, body: &[u8]) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_vec()));
    }

    /// Hold every answer on `path` back for `delay`.
    pub fn delay(&self, path: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(path.to_string(), delay);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn record(
    State(sidecar): State<FakeSidecar>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    sidecar.requests.lock().unwrap().push(RecordedRequest {
        method,
        path: path.clone(),
        query: uri.query().map(str::to_string),
        content_type,
        body,
    });

    let delay = sidecar.delays.lock().unwrap().get(&path).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let (status, body) = sidecar
        .responses
        .lock()
        .unwrap()
        .get(&path)
        .cloned()
        .unwrap_or((200, Vec::new()));
    (StatusCode::from_u16(status).unwrap(), body).into_response()
}

/// Start a fake sidecar on an ephemeral port and a client pointed at it.
pub async fn start() -> (FakeSidecar, SidecarClient, JoinHandle<()>) {
    start_with(|_| {}).await
}

/// Like [`start`], letting the test adjust the client config first.
pub async fn start_with(
    configure: impl FnOnce(&mut SidecarConfig),
) -> (FakeSidecar, SidecarClient, JoinHandle<()>) {
    let sidecar = FakeSidecar::default();
    let router = Router::new().fallback(record).with_state(sidecar.clone());

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let mut config = SidecarConfig::with_base_address(format!("http://{addr}"));
    configure(&mut config);
    let client = SidecarClient::new(&config).unwrap();
    (sidecar, client, handle)
}

/// A client pointed at a port nothing listens on.
#[allow(dead_code)]
pub async fn unreachable_client() -> SidecarClient {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    SidecarClient::from_address(format!("http://{addr}")).unwrap()
}
