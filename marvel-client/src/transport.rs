use async_trait::async_trait;
use surf::Client;
use surf::Url;
use utils::surf_logging::SurfLogging;

use crate::error::TransportError;

/// Issues GET requests and hands back the raw body of a successful response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: Url) -> Result<String, TransportError>;
}

/// HTTP transport over surf, with request logging.
#[derive(Clone)]
pub struct SurfTransport {
    http: Client,
}

impl Default for SurfTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfTransport {
    pub fn new() -> Self {
        Self {
            http: Client::new().with(SurfLogging),
        }
    }
}

#[async_trait]
impl Transport for SurfTransport {
    async fn get(&self, url: Url) -> Result<String, TransportError> {
        let mut response = self
            .http
            .get(url)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status as u16));
        }

        response
            .body_string()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}
