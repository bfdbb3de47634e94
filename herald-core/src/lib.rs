//! # herald-core
//!
//! Client library for sending event messages ("deploy finished", "payment
//! failed") to the Herald collection service without blocking the caller.
//!
//! This library provides:
//! - An immutable, chainable [`MessageRequest`] API
//! - Enrichment of each message with host identity and a timestamp
//! - Fire-and-forget delivery on a background [`Executor`]
//! - Pluggable transports: binary protocol over TCP, JSON protocol over HTTP
//! - Configuration and logging infrastructure
//!
//! Delivery failures are logged with `tracing` and never reach the caller.
//!
//! ## Example
//!
//! ```rust,no_run
//! use herald_core::{Arg, Messenger, Priority};
//!
//! # fn main() -> herald_core::Result<()> {
//! let client = herald_core::create("your-application-token")?;
//!
//! client
//!     .begin()
//!     .titled("Payment Failed")?
//!     .with_body("Order {} was declined", &[Arg::from(&1042)])
//!     .with_priority(Priority::High)
//!     .send()?;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use builder::Builder;
pub use client::{Client, Messenger};
pub use config::Config;
pub use error::{Error, Result};
pub use executor::{Executor, SingleWorkerExecutor, TokioExecutor};
pub use format::Arg;
pub use noop::{NoOpClient, NO_OP};
pub use priority::Priority;
pub use request::MessageRequest;
pub use transport::{ApplicationService, Endpoint, EndpointProvider, TransportProvider};

// Public modules
pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod format;
pub mod identity;
pub mod logging;
pub mod noop;
pub mod priority;
pub mod request;
pub mod transport;
pub mod wire;

#[cfg(test)]
mod testing;

/// Client for the production endpoint with the default executor
pub fn create(application_token: &str) -> Result<Client> {
    Builder::new()
        .with_application_token(application_token)?
        .build()
}

/// The shared client that sends nothing
pub fn no_op() -> &'static NoOpClient {
    &NO_OP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_rejects_empty_token() {
        assert!(matches!(create(""), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_create_defaults() {
        let client = create("token").unwrap();
        assert_eq!(client.begin().priority(), Priority::Low);
    }

    #[test]
    fn test_no_op_is_shared() {
        assert!(std::ptr::eq(no_op(), &NO_OP));
        assert!(no_op().send_high_priority_message("Any", "thing").is_ok());
    }
}
