use thiserror::Error;

use crate::types::MicroError;

#[derive(Error, Debug)]
pub enum SidecarError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Sidecar transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Sidecar returned {status}: {}", status_detail(.error, .body))]
    Status {
        status: u16,
        body: String,
        error: Option<MicroError>,
    },

    #[error("Failed to encode request: {0}")]
    Encode(String),

    #[error("Failed to decode sidecar response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Sidecar response is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Sidecar did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SidecarError {
    /// Build a `Status` error from a non-2xx response body, keeping the
    /// structured sidecar error when the body carries one.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body).into_owned();
        let error = MicroError::parse(&body);
        SidecarError::Status {
            status,
            body,
            error,
        }
    }

    /// Whether the failure happened talking to the sidecar, either at the
    /// network layer or as a non-success status.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SidecarError::Transport(_) | SidecarError::Status { .. } | SidecarError::Timeout(_)
        )
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, SidecarError::Decode(_) | SidecarError::Utf8(_))
    }

    /// HTTP status returned by the sidecar, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            SidecarError::Status { status, .. } => Some(*status),
            SidecarError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn status_detail<'a>(error: &'a Option<MicroError>, body: &'a str) -> &'a str {
    match error {
        Some(e) if !e.detail.is_empty() => &e.detail,
        _ => body.trim(),
    }
}

pub type Result<T> = std::result::Result<T, SidecarError>;
