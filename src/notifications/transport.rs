//! HTTP transport for notification requests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};

use crate::error::NotificationError;
use crate::Result;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Response returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

/// Sends one notification request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `body` to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or timeout.
    async fn send(
        &self,
        method: &Method,
        url: &Url,
        headers: &[(String, String)],
        body: String,
    ) -> std::result::Result<TransportResponse, NotificationError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: &Method,
        url: &Url,
        headers: &[(String, String)],
        body: String,
    ) -> std::result::Result<TransportResponse, NotificationError> {
        let transport_err = |e: reqwest::Error| NotificationError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let mut request = self.client.request(method.clone(), url.clone());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.body(body).send().await.map_err(transport_err)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_err)?;

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(DEFAULT_TIMEOUT).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
        let url = Url::parse("http://127.0.0.1:9/hook").unwrap();

        let err = transport
            .send(&Method::POST, &url, &[], "x".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Transport { .. }));
    }
}
