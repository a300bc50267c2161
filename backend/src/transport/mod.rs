//! Outbound transport capabilities
//!
//! The core talks to the outside world through three narrow seams: an HTTP
//! transport, an SMS sender, and (in `services::social`) a platform metadata
//! fetcher. Concrete implementations are injected at wiring time; tests
//! inject fakes and never touch the network.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ApiError;

/// Per-call timeout for Account Aggregator endpoints
pub const AA_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-call timeout for BBPS and GSP endpoints
pub const BILLER_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-call timeout for the UIDAI auth endpoint
pub const UIDAI_TIMEOUT: Duration = Duration::from_secs(15);

/// Transport-level failures; mapped to the upstream error kinds
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(d) => {
                ApiError::UpstreamTimeout(format!("timed out after {}s", d.as_secs()))
            }
            TransportError::Unreachable(msg) => ApiError::UpstreamUnreachable(msg),
            TransportError::Status { status, body } => {
                ApiError::UpstreamUnreachable(format!("status {}: {}", status, body))
            }
        }
    }
}

/// A successful upstream response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Narrow HTTP capability the pipelines depend on
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;

    async fn post_xml(
        &self,
        url: &str,
        body: String,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;

    async fn get(
        &self,
        url: &str,
        headers: &[(&str, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// One-method SMS delivery contract; vendors plug in behind it
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), TransportError>;
}

/// Production HTTP transport backed by a shared reqwest client
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn map_err(err: reqwest::Error, timeout: Duration) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(timeout)
        } else {
            TransportError::Unreachable(err.to_string())
        }
    }

    async fn read_response(
        response: reqwest::Response,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Self::map_err(e, timeout))?;
        if status >= 500 {
            return Err(TransportError::Status { status, body });
        }
        Ok(HttpResponse { status, body })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.post(url).timeout(timeout).json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = request.send().await.map_err(|e| Self::map_err(e, timeout))?;
        Self::read_response(response, timeout).await
    }

    async fn post_xml(
        &self,
        url: &str,
        body: String,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| Self::map_err(e, timeout))?;
        Self::read_response(response, timeout).await
    }

    async fn get(
        &self,
        url: &str,
        headers: &[(&str, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = request.send().await.map_err(|e| Self::map_err(e, timeout))?;
        Self::read_response(response, timeout).await
    }
}

/// Development SMS sender: logs instead of delivering. The OTP itself is
/// never written to the log.
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send(&self, phone: &str, _message: &str) -> Result<(), TransportError> {
        let masked = if phone.len() > 4 {
            format!("******{}", &phone[phone.len() - 4..])
        } else {
            "******".to_string()
        };
        tracing::info!(phone = %masked, "SMS dispatched via log sender");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sms_sender_accepts_any_number() {
        let sender = LogSmsSender;
        assert!(sender.send("9876543210", "your code is 123456").await.is_ok());
    }

    #[test]
    fn test_transport_error_maps_to_api_error() {
        let err: ApiError = TransportError::Timeout(Duration::from_secs(30)).into();
        assert!(matches!(err, ApiError::UpstreamTimeout(_)));

        let err: ApiError = TransportError::Unreachable("refused".into()).into();
        assert!(matches!(err, ApiError::UpstreamUnreachable(_)));
    }
}
