use async_trait::async_trait;
use thiserror::Error;

use crate::report::events::StateChange;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Control plane rejected submission with status {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

impl TransportError {
    /// Whether another attempt could succeed without any change on our
    /// side.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Rejected { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            Self::Encode(_) | Self::Endpoint(_) => false,
        }
    }
}

/// Delivers changes to the control plane.
///
/// `Ok(())` means the control plane confirmed the submission, not merely
/// that it was attempted. Only then is the change acknowledged.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn submit(&self, change: &StateChange) -> Result<(), TransportError>;
}

/// Used when no control plane is configured. Every change is logged and
/// confirmed.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn submit(&self, change: &StateChange) -> Result<(), TransportError> {
        log::info!("State change: {change}");
        Ok(())
    }
}
