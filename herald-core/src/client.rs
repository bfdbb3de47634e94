//! The Herald client
//!
//! A [`Client`] holds the application token, the host identity sent with every
//! message, a [`TransportProvider`] and an [`Executor`]. It is cheap to clone;
//! clones share the same identity fields and executor.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;

use crate::builder::Builder;
use crate::error::{Error, Result};
use crate::executor::{panic_reason, Executor};
use crate::format::Arg;
use crate::identity::HostIdentity;
use crate::priority::Priority;
use crate::request::MessageRequest;
use crate::transport::TransportProvider;
use crate::wire::{ApplicationToken, SendMessageRequest};

/// Anything messages can be started from
///
/// Implemented by [`Client`] and by the do-nothing
/// [`NoOpClient`](crate::noop::NoOpClient), so code can hold either.
pub trait Messenger: Send + Sync {
    /// Start a new message: empty title and body, low priority
    fn begin(&self) -> MessageRequest;

    /// Build and send a message in one call
    ///
    /// An empty `body` leaves the body empty.
    fn send_message(&self, priority: Priority, title: &str, body: &str, args: &[Arg<'_>]) -> Result<()> {
        let mut request = self.begin().titled(title)?.with_priority(priority);
        if !body.is_empty() {
            request = request.with_body(body, args);
        }
        request.send()
    }

    fn send_low_priority_message(&self, title: &str, body: &str) -> Result<()> {
        self.send_message(Priority::Low, title, body, &[])
    }

    fn send_medium_priority_message(&self, title: &str, body: &str) -> Result<()> {
        self.send_message(Priority::Medium, title, body, &[])
    }

    fn send_high_priority_message(&self, title: &str, body: &str) -> Result<()> {
        self.send_message(Priority::High, title, body, &[])
    }
}

struct Shared {
    provider: Arc<dyn TransportProvider>,
    executor: Arc<dyn Executor>,
    token: ApplicationToken,
    operating_system: String,
    ipv4_address: String,
    hostname: RwLock<String>,
    device_name: RwLock<String>,
    body_prefix: RwLock<String>,
    body_suffix: RwLock<String>,
}

/// Client that delivers messages to the Herald service
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Assemble a client from its parts
    ///
    /// Most callers want [`Client::builder`]. Fails with
    /// [`Error::InvalidArgument`] if `token` is empty.
    pub fn new(
        provider: Arc<dyn TransportProvider>,
        executor: Arc<dyn Executor>,
        token: &str,
        identity: HostIdentity,
    ) -> Result<Self> {
        if token.is_empty() {
            return Err(Error::invalid("application token cannot be empty"));
        }

        Ok(Self {
            shared: Arc::new(Shared {
                provider,
                executor,
                token: ApplicationToken {
                    token_id: token.to_string(),
                },
                operating_system: identity.operating_system,
                ipv4_address: identity.ipv4_address,
                hostname: RwLock::new(identity.network_name.clone()),
                device_name: RwLock::new(identity.network_name),
                body_prefix: RwLock::new(String::new()),
                body_suffix: RwLock::new(String::new()),
            }),
        })
    }

    pub fn hostname(&self) -> String {
        self.shared.hostname.read().clone()
    }

    /// Fails with [`Error::InvalidArgument`] on an empty string
    pub fn set_hostname(&self, hostname: &str) -> Result<()> {
        if hostname.is_empty() {
            return Err(Error::invalid("hostname cannot be empty"));
        }
        *self.shared.hostname.write() = hostname.to_string();
        Ok(())
    }

    pub fn device_name(&self) -> String {
        self.shared.device_name.read().clone()
    }

    /// Fails with [`Error::InvalidArgument`] on an empty string
    pub fn set_device_name(&self, device_name: &str) -> Result<()> {
        if device_name.is_empty() {
            return Err(Error::invalid("device name cannot be empty"));
        }
        *self.shared.device_name.write() = device_name.to_string();
        Ok(())
    }

    pub fn body_prefix(&self) -> String {
        self.shared.body_prefix.read().clone()
    }

    /// Text placed before every message body; may be empty
    pub fn set_body_prefix(&self, prefix: &str) {
        *self.shared.body_prefix.write() = prefix.to_string();
    }

    pub fn body_suffix(&self) -> String {
        self.shared.body_suffix.read().clone()
    }

    /// Text placed after every message body; may be empty
    pub fn set_body_suffix(&self, suffix: &str) {
        *self.shared.body_suffix.write() = suffix.to_string();
    }

    pub fn operating_system(&self) -> &str {
        &self.shared.operating_system
    }

    pub fn ipv4_address(&self) -> &str {
        &self.shared.ipv4_address
    }

    /// Enrich `request` and queue it for delivery
    pub(crate) fn dispatch(&self, request: &MessageRequest) -> Result<()> {
        let record = self.enrich(request);

        tracing::debug!(
            title = %record.title,
            urgency = ?record.urgency,
            "Queueing message"
        );

        let provider = Arc::clone(&self.shared.provider);
        self.shared
            .executor
            .execute(Box::pin(deliver(provider, record)))
    }

    fn enrich(&self, request: &MessageRequest) -> SendMessageRequest {
        let shared = &self.shared;
        let body = format!(
            "{}{}{}",
            shared.body_prefix.read(),
            request.text(),
            shared.body_suffix.read()
        );

        SendMessageRequest {
            application_token: shared.token.clone(),
            body,
            title: request.title().to_string(),
            urgency: request.priority().to_urgency(),
            time_of_message: Utc::now().timestamp_millis(),
            hostname: self.hostname(),
            ipv4_address: shared.ipv4_address.clone(),
            operating_system_name: shared.operating_system.clone(),
            device_name: self.device_name(),
        }
    }
}

impl Messenger for Client {
    fn begin(&self) -> MessageRequest {
        MessageRequest::new(self.clone())
    }
}

/// Runs on the executor; never reports back to the caller
async fn deliver(provider: Arc<dyn TransportProvider>, record: SendMessageRequest) {
    let mut service = match provider.get().await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, title = %record.title, "No connection to Herald service, message dropped");
            return;
        }
    };

    // a panicking call must not skip close()
    match AssertUnwindSafe(service.send_message(&record)).catch_unwind().await {
        Ok(Ok(())) => tracing::debug!(title = %record.title, "Message delivered"),
        Ok(Err(e)) => tracing::error!(error = %e, title = %record.title, "Failed to deliver message"),
        Err(panic) => tracing::error!(
            reason = %panic_reason(panic.as_ref()),
            title = %record.title,
            "Transport panicked while delivering message"
        ),
    }

    service.close().await;
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("token", &self.shared.token)
            .field("hostname", &self.hostname())
            .field("device_name", &self.device_name())
            .field("ipv4_address", &self.shared.ipv4_address)
            .field("operating_system", &self.shared.operating_system)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SingleWorkerExecutor;
    use crate::testing::RecordingProvider;
    use crate::wire::Urgency;

    fn identity() -> HostIdentity {
        HostIdentity {
            network_name: "10.0.0.7".to_string(),
            ipv4_address: "10.0.0.7".to_string(),
            operating_system: "linux".to_string(),
        }
    }

    fn client_with(provider: &RecordingProvider) -> (Client, Arc<SingleWorkerExecutor>) {
        let executor = Arc::new(SingleWorkerExecutor::new().unwrap());
        let client = Client::new(
            Arc::new(provider.clone()),
            executor.clone(),
            "token-abc",
            identity(),
        )
        .unwrap();
        (client, executor)
    }

    #[test]
    fn test_send_makes_one_remote_call() {
        let provider = RecordingProvider::default();
        let (client, executor) = client_with(&provider);

        client
            .begin()
            .titled("Disk Almost Full")
            .unwrap()
            .with_body("usage at {}%", &[Arg::from(&91)])
            .with_priority(Priority::High)
            .send()
            .unwrap();
        executor.shutdown();

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.application_token.token_id, "token-abc");
        assert_eq!(call.title, "Disk Almost Full");
        assert_eq!(call.body, "usage at 91%");
        assert_eq!(call.urgency, Urgency::High);
        assert_eq!(call.hostname, "10.0.0.7");
        assert_eq!(call.device_name, "10.0.0.7");
        assert_eq!(call.operating_system_name, "linux");
        assert!((Utc::now().timestamp_millis() - call.time_of_message).abs() < 1000);
        assert_eq!(provider.closes(), 1);
    }

    #[test]
    fn test_remote_failure_is_swallowed() {
        let provider = RecordingProvider::failing();
        let (client, executor) = client_with(&provider);

        let result = client.begin().titled("Payment Failed").unwrap().send();
        executor.shutdown();

        assert!(result.is_ok());
        assert_eq!(provider.calls().len(), 1);
        assert!(provider.closes() >= 1);
    }

    #[test]
    fn test_panicking_transport_is_still_closed() {
        let provider = RecordingProvider::panicking();
        let (client, executor) = client_with(&provider);

        assert!(client.begin().titled("Payment Failed").unwrap().send().is_ok());
        assert!(client.begin().titled("Second Try").unwrap().send().is_ok());
        executor.shutdown();

        assert_eq!(provider.calls().len(), 2);
        assert_eq!(provider.closes(), 2);
    }

    #[test]
    fn test_unavailable_transport_makes_no_call() {
        let provider = RecordingProvider::unavailable();
        let (client, executor) = client_with(&provider);

        assert!(client.begin().titled("Started").unwrap().send().is_ok());
        executor.shutdown();

        assert!(provider.calls().is_empty());
        assert_eq!(provider.closes(), 0);
    }

    #[test]
    fn test_identity_overrides_reach_the_record() {
        let provider = RecordingProvider::default();
        let (client, executor) = client_with(&provider);

        client.set_hostname("web-01").unwrap();
        client.set_device_name("rack-4").unwrap();
        client.begin().titled("Started").unwrap().send().unwrap();
        executor.shutdown();

        let calls = provider.calls();
        assert_eq!(calls[0].hostname, "web-01");
        assert_eq!(calls[0].device_name, "rack-4");
    }

    #[test]
    fn test_empty_identity_is_rejected() {
        let provider = RecordingProvider::default();
        let (client, _executor) = client_with(&provider);

        client.set_hostname("web-01").unwrap();
        assert!(matches!(client.set_hostname(""), Err(Error::InvalidArgument(_))));
        assert_eq!(client.hostname(), "web-01");

        client.set_device_name("rack-4").unwrap();
        assert!(matches!(client.set_device_name(""), Err(Error::InvalidArgument(_))));
        assert_eq!(client.device_name(), "rack-4");
    }

    #[test]
    fn test_prefix_and_suffix_wrap_body() {
        let provider = RecordingProvider::default();
        let (client, executor) = client_with(&provider);

        client.set_body_prefix("[prod] ");
        client.set_body_suffix(" (eu-west)");
        client
            .begin()
            .titled("Deploy Done")
            .unwrap()
            .with_body("version {}", &[Arg::from(&"1.4.2")])
            .send()
            .unwrap();
        executor.shutdown();

        assert_eq!(provider.calls()[0].body, "[prod] version 1.4.2 (eu-west)");
    }

    #[test]
    fn test_timestamp_captured_at_send() {
        let provider = RecordingProvider::default();
        let (client, executor) = client_with(&provider);

        let before = Utc::now().timestamp_millis();
        client.begin().titled("Tick").unwrap().send().unwrap();
        let after = Utc::now().timestamp_millis();
        executor.shutdown();

        let ts = provider.calls()[0].time_of_message;
        assert!(ts >= before && ts <= after);
    }

    #[test]
    fn test_send_after_executor_shutdown_fails() {
        let provider = RecordingProvider::default();
        let (client, executor) = client_with(&provider);
        executor.shutdown();

        let result = client.begin().titled("Too Late").unwrap().send();
        assert!(matches!(result, Err(Error::Rejected(_))));
    }

    #[test]
    fn test_convenience_sends() {
        let provider = RecordingProvider::default();
        let (client, executor) = client_with(&provider);

        client.send_low_priority_message("Low One", "a").unwrap();
        client.send_medium_priority_message("Medium One", "").unwrap();
        client.send_high_priority_message("High One", "c").unwrap();
        assert!(matches!(
            client.send_message(Priority::Low, "", "body", &[]),
            Err(Error::InvalidArgument(_))
        ));
        executor.shutdown();

        let calls = provider.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].urgency, Urgency::Low);
        assert_eq!(calls[1].urgency, Urgency::Medium);
        assert_eq!(calls[1].body, "");
        assert_eq!(calls[2].urgency, Urgency::High);
        assert_eq!(calls[2].body, "c");
    }

    #[test]
    fn test_empty_token_rejected() {
        let executor = Arc::new(SingleWorkerExecutor::new().unwrap());
        let result = Client::new(
            Arc::new(RecordingProvider::default()),
            executor,
            "",
            identity(),
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let provider = RecordingProvider::default();
        let (client, _executor) = client_with(&provider);
        let debug = format!("{:?}", client);
        assert!(!debug.contains("token-abc"));
        assert!(debug.contains("10.0.0.7"));
    }
}
