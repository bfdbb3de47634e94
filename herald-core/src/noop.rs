//! A client that sends nothing
//!
//! Useful in tests or when messaging is switched off. Requests started from
//! it skip validation and `send()` always succeeds.

use crate::client::Messenger;
use crate::error::Result;
use crate::format::Arg;
use crate::priority::Priority;
use crate::request::MessageRequest;

/// Shared do-nothing client
pub static NO_OP: NoOpClient = NoOpClient;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpClient;

impl Messenger for NoOpClient {
    fn begin(&self) -> MessageRequest {
        MessageRequest::discarded()
    }

    fn send_message(&self, _priority: Priority, _title: &str, _body: &str, _args: &[Arg<'_>]) -> Result<()> {
        Ok(())
    }
}
