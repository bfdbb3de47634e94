//! Client construction
//!
//! ```no_run
//! use herald_core::{Client, Messenger};
//!
//! # fn main() -> herald_core::Result<()> {
//! let client = Client::builder()
//!     .with_application_token("your-application-token")?
//!     .with_endpoint("localhost", 7005)?
//!     .build()?;
//!
//! client.send_high_priority_message("Service Started", "all systems go")?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::client::Client;
use crate::config::{Config, IdentityConfig};
use crate::error::{Error, Result};
use crate::executor::{Executor, SingleWorkerExecutor};
use crate::identity::HostIdentity;
use crate::transport::{Endpoint, EndpointProvider, TransportProvider, DEFAULT_TIMEOUT};

/// Builder for [`Client`]
#[derive(Clone)]
pub struct Builder {
    endpoint: Endpoint,
    application_token: Option<String>,
    executor: Option<Arc<dyn Executor>>,
    provider: Option<Arc<dyn TransportProvider>>,
    timeout: Duration,
    identity: IdentityConfig,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Production endpoint, default executor, no token
    pub fn new() -> Self {
        Self {
            endpoint: Endpoint::default(),
            application_token: None,
            executor: None,
            provider: None,
            timeout: DEFAULT_TIMEOUT,
            identity: IdentityConfig::default(),
        }
    }

    /// Start from a loaded [`Config`]
    pub fn from_config(config: &Config) -> Result<Self> {
        config.client.validate()?;

        let mut builder = Self::new()
            .with_endpoint_descriptor(config.client.endpoint.clone())
            .with_timeout(config.client.timeout())
            .with_identity(config.identity.clone());
        builder.application_token = config.client.application_token.clone();

        Ok(builder)
    }

    /// Fails with [`Error::InvalidArgument`] if `token` is empty
    pub fn with_application_token(mut self, token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(Error::invalid("application token cannot be empty"));
        }
        self.application_token = Some(token.to_string());
        Ok(self)
    }

    /// Use a TCP endpoint
    ///
    /// Fails with [`Error::InvalidArgument`] on an empty hostname or port 0.
    pub fn with_endpoint(self, hostname: &str, port: u16) -> Result<Self> {
        if hostname.is_empty() {
            return Err(Error::invalid("hostname cannot be empty"));
        }
        if port == 0 {
            return Err(Error::invalid("port must be between 1 and 65535"));
        }
        Ok(self.with_endpoint_descriptor(Endpoint::tcp(hostname, port)))
    }

    pub fn with_endpoint_descriptor(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Run deliveries on `executor` instead of a dedicated worker thread
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Replace endpoint-based connections entirely
    pub fn with_transport_provider(mut self, provider: Arc<dyn TransportProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_identity(mut self, identity: IdentityConfig) -> Self {
        self.identity = identity;
        self
    }

    pub fn build(self) -> Result<Client> {
        let token = match self.application_token.as_deref() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => return Err(Error::Config("application token is required".to_string())),
        };

        if let Endpoint::Tcp { hostname, port } = &self.endpoint {
            if hostname.is_empty() || *port == 0 {
                return Err(Error::Config(format!(
                    "invalid endpoint: {}",
                    self.endpoint
                )));
            }
        }

        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".to_string()));
        }

        let executor: Arc<dyn Executor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(SingleWorkerExecutor::new()?),
        };

        let provider: Arc<dyn TransportProvider> = match self.provider {
            Some(provider) => provider,
            None => Arc::new(EndpointProvider::new(self.endpoint.clone()).with_timeout(self.timeout)),
        };

        let client = Client::new(provider, executor, &token, HostIdentity::discover())?;
        apply_identity(&client, &self.identity)?;

        tracing::debug!(endpoint = %self.endpoint, hostname = %client.hostname(), "Herald client ready");

        Ok(client)
    }
}

fn apply_identity(client: &Client, identity: &IdentityConfig) -> Result<()> {
    if let Some(hostname) = &identity.hostname {
        client.set_hostname(hostname)?;
    }
    if let Some(device_name) = &identity.device_name {
        client.set_device_name(device_name)?;
    }
    if let Some(prefix) = &identity.body_prefix {
        client.set_body_prefix(prefix);
    }
    if let Some(suffix) = &identity.body_suffix {
        client.set_body_suffix(suffix);
    }
    Ok(())
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("endpoint", &self.endpoint)
            .field("has_token", &self.application_token.is_some())
            .field("custom_executor", &self.executor.is_some())
            .field("custom_provider", &self.provider.is_some())
            .field("timeout", &self.timeout)
            .field("identity", &self.identity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingProvider;

    #[test]
    fn test_build_requires_token() {
        assert!(matches!(Builder::new().build(), Err(Error::Config(_))));
        assert!(matches!(
            Builder::new().with_application_token(""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_with_endpoint_validates() {
        assert!(Builder::new().with_endpoint("", 7005).is_err());
        assert!(Builder::new().with_endpoint("localhost", 0).is_err());
        assert!(Builder::new().with_endpoint("localhost", 7005).is_ok());
    }

    #[test]
    fn test_build_rejects_invalid_descriptor() {
        let result = Builder::new()
            .with_application_token("token")
            .unwrap()
            .with_endpoint_descriptor(Endpoint::tcp("", 7005))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_build_rejects_zero_timeout() {
        let result = Builder::new()
            .with_application_token("token")
            .unwrap()
            .with_transport_provider(Arc::new(RecordingProvider::default()))
            .with_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_build_with_defaults() {
        let client = Builder::new()
            .with_application_token("token")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(client.operating_system(), std::env::consts::OS);
        assert_eq!(client.body_prefix(), "");
    }

    #[test]
    fn test_identity_overrides_applied() {
        let client = Builder::new()
            .with_application_token("token")
            .unwrap()
            .with_transport_provider(Arc::new(RecordingProvider::default()))
            .with_identity(IdentityConfig {
                hostname: Some("web-01".to_string()),
                device_name: Some("rack-4".to_string()),
                body_prefix: Some("[ci] ".to_string()),
                body_suffix: None,
            })
            .build()
            .unwrap();

        assert_eq!(client.hostname(), "web-01");
        assert_eq!(client.device_name(), "rack-4");
        assert_eq!(client.body_prefix(), "[ci] ");
        assert_eq!(client.body_suffix(), "");
    }

    #[test]
    fn test_empty_identity_override_rejected() {
        let result = Builder::new()
            .with_application_token("token")
            .unwrap()
            .with_identity(IdentityConfig {
                hostname: Some(String::new()),
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_from_config() {
        let config: Config = toml::from_str(
            r#"
[client]
application_token = "from-file"

[client.endpoint]
type = "tcp"
hostname = "localhost"
port = 7010

[identity]
device_name = "build-agent"
"#,
        )
        .unwrap();

        let builder = Builder::from_config(&config).unwrap();
        assert_eq!(builder.endpoint, Endpoint::tcp("localhost", 7010));

        let client = builder.build().unwrap();
        assert_eq!(client.device_name(), "build-agent");
    }

    #[test]
    fn test_from_config_without_token() {
        assert!(matches!(
            Builder::from_config(&Config::default()),
            Err(Error::Config(_))
        ));
    }
}
