//! Transports to the Herald application service
//!
//! An [`Endpoint`] describes where the service lives. A [`TransportProvider`]
//! turns that description into a connected [`ApplicationService`] handle on
//! demand; nothing here keeps a connection open between calls.
//!
//! ## Supported endpoints
//!
//! | Endpoint | Handle |
//! |----------|--------|
//! | `Tcp` | [`TcpServiceClient`], binary protocol over a socket |
//! | `HttpThrift` | [`HttpServiceClient`], JSON protocol over HTTP POST |
//! | `HttpRest` | not supported, `get()` fails with [`Error::Transport`] |

mod http;
mod tcp;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::wire::SendMessageRequest;

pub use http::HttpServiceClient;
pub use tcp::TcpServiceClient;

/// Host of the production Herald service
pub const PRODUCTION_HOSTNAME: &str = "application-srv.herald.tech";

/// Port of the production Herald service
pub const PRODUCTION_PORT: u16 = 7005;

/// Default connect and call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

/// Where the remote service can be reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Endpoint {
    /// Raw TCP socket, binary protocol
    Tcp { hostname: String, port: u16 },
    /// HTTP POST carrying the same contract
    HttpThrift { url: String },
    /// REST API; no client in this crate speaks it
    HttpRest { url: String },
}

impl Endpoint {
    pub fn tcp(hostname: impl Into<String>, port: u16) -> Self {
        Endpoint::Tcp {
            hostname: hostname.into(),
            port,
        }
    }

    pub fn http_thrift(url: impl Into<String>) -> Self {
        Endpoint::HttpThrift { url: url.into() }
    }

    /// The production TCP endpoint
    pub fn production() -> Self {
        Endpoint::tcp(PRODUCTION_HOSTNAME, PRODUCTION_PORT)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::production()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { hostname, port } => write!(f, "tcp://{}:{}", hostname, port),
            Endpoint::HttpThrift { url } => write!(f, "thrift+{}", url),
            Endpoint::HttpRest { url } => write!(f, "rest+{}", url),
        }
    }
}

/// A connected handle to the application service
#[async_trait]
pub trait ApplicationService: Send {
    /// Deliver one message and wait for the service to acknowledge it
    async fn send_message(&mut self, request: &SendMessageRequest) -> Result<()>;

    /// Release the underlying connection. Failures are logged, never returned.
    async fn close(&mut self);
}

/// Produces a fresh [`ApplicationService`] handle per call
#[async_trait]
pub trait TransportProvider: Send + Sync {
    async fn get(&self) -> Result<Box<dyn ApplicationService>>;
}

/// Provider that dispatches on a configured [`Endpoint`]
#[derive(Debug, Clone)]
pub struct EndpointProvider {
    endpoint: Endpoint,
    timeout: Duration,
}

impl EndpointProvider {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl TransportProvider for EndpointProvider {
    async fn get(&self) -> Result<Box<dyn ApplicationService>> {
        match &self.endpoint {
            Endpoint::Tcp { hostname, port } => {
                let client = TcpServiceClient::connect(hostname, *port, self.timeout).await?;
                Ok(Box::new(client))
            }
            Endpoint::HttpThrift { url } => {
                let client = HttpServiceClient::new(url, self.timeout)?;
                Ok(Box::new(client))
            }
            Endpoint::HttpRest { .. } => Err(Error::Transport(format!(
                "endpoint not supported: {}",
                self.endpoint
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_get_tcp_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });

        let provider = EndpointProvider::new(Endpoint::tcp("127.0.0.1", port));
        let mut service = provider.get().await.unwrap();
        service.close().await;

        assert!(accept.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_get_http_thrift_endpoint() {
        let provider = EndpointProvider::new(Endpoint::http_thrift("http://localhost:7026/herald"));
        assert!(provider.get().await.is_ok());
    }

    #[tokio::test]
    async fn test_get_rest_endpoint_is_unsupported() {
        let provider = EndpointProvider::new(Endpoint::HttpRest {
            url: "https://herald.example.com/api".to_string(),
        });
        assert!(matches!(provider.get().await, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_get_with_bad_url() {
        let provider = EndpointProvider::new(Endpoint::http_thrift("3f9a0c77d1e2b4a5968c0d1e2f3a4b5c6d7e8f90a1b2c"));
        assert!(matches!(
            provider.get().await,
            Err(Error::InvalidArgument(_))
        ));

        let provider = EndpointProvider::new(Endpoint::http_thrift("ftp://files.example.com"));
        assert!(matches!(
            provider.get().await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_get_with_bad_tcp_endpoint() {
        let provider = EndpointProvider::new(Endpoint::tcp("", 7005));
        assert!(matches!(
            provider.get().await,
            Err(Error::InvalidArgument(_))
        ));

        let provider = EndpointProvider::new(Endpoint::tcp("localhost", 0));
        assert!(matches!(
            provider.get().await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_get_with_nothing_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let provider = EndpointProvider::new(Endpoint::tcp("127.0.0.1", port))
            .with_timeout(Duration::from_secs(2));
        assert!(matches!(provider.get().await, Err(Error::Network { .. })));
    }

    #[test]
    fn test_parse_endpoint_from_toml() {
        let endpoint: Endpoint =
            toml::from_str("type = \"tcp\"\nhostname = \"localhost\"\nport = 7010").unwrap();
        assert_eq!(endpoint, Endpoint::tcp("localhost", 7010));

        let endpoint: Endpoint =
            toml::from_str("type = \"http_thrift\"\nurl = \"https://herald.example.com\"").unwrap();
        assert_eq!(endpoint, Endpoint::http_thrift("https://herald.example.com"));
    }

    #[test]
    fn test_default_is_production() {
        assert_eq!(
            Endpoint::default(),
            Endpoint::tcp(PRODUCTION_HOSTNAME, PRODUCTION_PORT)
        );
        assert_eq!(
            Endpoint::default().to_string(),
            "tcp://application-srv.herald.tech:7005"
        );
    }
}
