//! JSON protocol over HTTP
//!
//! Every call is a single POST of the encoded message; the response body
//! carries the encoded reply.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use url::Url;

use crate::error::{Error, Result};
use crate::wire::{self, json, MessageHeader, SendMessageRequest, SEND_MESSAGE};

use super::ApplicationService;

const THRIFT_CONTENT_TYPE: &str = "application/x-thrift";

/// HTTP client for the application service
pub struct HttpServiceClient {
    http_client: reqwest::Client,
    url: Url,
    seq: i32,
}

impl HttpServiceClient {
    /// Create a client for `url`
    ///
    /// Returns [`Error::InvalidArgument`] unless `url` is an absolute
    /// `http` or `https` URL.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| Error::InvalidArgument(format!("invalid URL {:?}: {}", url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidArgument(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(THRIFT_CONTENT_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static(THRIFT_CONTENT_TYPE));

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url,
            seq: 0,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ApplicationService for HttpServiceClient {
    async fn send_message(&mut self, request: &SendMessageRequest) -> Result<()> {
        self.seq = self.seq.wrapping_add(1);
        let header = MessageHeader::call(SEND_MESSAGE, self.seq);
        let payload = json::encode_message(&header, &request.to_call_args()).to_string();

        let response = self
            .http_client
            .post(self.url.clone())
            .body(payload)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Delivery(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let text = response.text().await?;
        let reply: serde_json::Value = serde_json::from_str(&text)?;
        let (reply_header, body) = json::decode_message(&reply)?;
        wire::check_reply(&header, &reply_header, &body)
    }

    async fn close(&mut self) {
        // connections belong to reqwest's pool, dropped with the client
        tracing::trace!(url = %self.url, "Released HTTP client");
    }
}
