//! Transport from the gateway to the loan service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use thiserror::Error;

/// Errors that can occur when contacting the loan service.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("loan service unreachable: {0}")]
    Unreachable(String),
    #[error("failed to read loan service reply: {0}")]
    Body(String),
}

/// Raw HTTP reply from the loan service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

/// Posts an encoded envelope and returns the raw reply.
#[async_trait]
pub trait LoanServiceTransport: Send + Sync {
    async fn post_envelope(&self, envelope: String) -> Result<TransportReply, TransportError>;
}

/// reqwest-backed transport.
pub struct HttpLoanServiceTransport {
    client: Client,
    url: String,
}

impl HttpLoanServiceTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl LoanServiceTransport for HttpLoanServiceTransport {
    async fn post_envelope(&self, envelope: String) -> Result<TransportReply, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(envelope)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(TransportReply { status, body })
    }
}
