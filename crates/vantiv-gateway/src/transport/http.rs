//! HTTP Transaction API
//!
//! Posts request documents to the processor's online endpoint.

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use vantiv_core::{GatewayConfig, PaymentError, ResponseDocument, Result};

use super::TransactionApi;
use crate::request::OnlineRequest;

/// Root attribute value of a well-formed, schema-valid request
const VALID_FORMAT: &str = "0";

/// Transaction API over HTTPS
pub struct HttpTransactionApi {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransactionApi {
    /// Build a client honoring the configured endpoint, proxy and timeout
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| PaymentError::Config(format!("invalid proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| PaymentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint().to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TransactionApi for HttpTransactionApi {
    async fn execute(&self, request: &OnlineRequest) -> anyhow::Result<ResponseDocument> {
        let body = request.to_xml()?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=UTF-8")
            .body(body)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?
            .error_for_status()?;

        let text = response.text().await.context("reading response body")?;
        let document = ResponseDocument::parse(&text)?;

        let root = document.root();
        if let Some(status) = root.attribute("response").filter(|s| *s != VALID_FORMAT) {
            bail!(
                "request rejected with status {status}: {}",
                root.attribute("message").unwrap_or_default()
            );
        }

        Ok(document)
    }

    fn name(&self) -> &str {
        "Vantiv"
    }
}
