//! Immutable message requests
//!
//! A [`MessageRequest`] is a value. Every mutator borrows the receiver and
//! returns a new request, so a half-built request can be reused as a template:
//!
//! ```no_run
//! use herald_core::{Messenger, Priority};
//!
//! # fn main() -> herald_core::Result<()> {
//! let client = herald_core::create("your-application-token")?;
//!
//! let alert = client.begin().with_priority(Priority::High);
//! alert.titled("Database Down")?.send()?;
//! alert.titled("Cache Down")?.send()?;
//! # Ok(())
//! # }
//! ```

use std::fmt;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::format::{format_body, Arg};
use crate::priority::Priority;

/// Titles must be at least this many characters
pub const MIN_TITLE_LENGTH: usize = 3;

/// Titles must be shorter than this many characters
pub const MAX_TITLE_LENGTH: usize = 40;

#[derive(Clone)]
enum Target {
    Client(Client),
    /// Requests from the no-op client; nothing is validated or sent
    Discard,
}

/// A message being built
#[derive(Clone)]
pub struct MessageRequest {
    target: Target,
    title: String,
    text: String,
    priority: Priority,
}

impl MessageRequest {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            target: Target::Client(client),
            title: String::new(),
            text: String::new(),
            priority: Priority::Low,
        }
    }

    pub(crate) const fn discarded() -> Self {
        Self {
            target: Target::Discard,
            title: String::new(),
            text: String::new(),
            priority: Priority::Low,
        }
    }

    fn is_discarded(&self) -> bool {
        matches!(self.target, Target::Discard)
    }

    /// Set the title
    ///
    /// Fails with [`Error::InvalidArgument`] unless the title has between
    /// [`MIN_TITLE_LENGTH`] and `MAX_TITLE_LENGTH - 1` characters.
    pub fn titled(&self, title: &str) -> Result<Self> {
        if self.is_discarded() {
            return Ok(self.clone());
        }

        let len = title.chars().count();
        if len == 0 {
            return Err(Error::invalid("title cannot be empty"));
        }
        if len < MIN_TITLE_LENGTH {
            return Err(Error::invalid(format!(
                "title too short: {} characters, minimum is {}",
                len, MIN_TITLE_LENGTH
            )));
        }
        if len >= MAX_TITLE_LENGTH {
            return Err(Error::invalid(format!(
                "title too long: {} characters, must be under {}",
                len, MAX_TITLE_LENGTH
            )));
        }

        Ok(Self {
            title: title.to_string(),
            ..self.clone()
        })
    }

    /// Set the body from a `{}` template and its arguments
    ///
    /// See [`crate::format`] for the placeholder rules.
    pub fn with_body(&self, message: &str, args: &[Arg<'_>]) -> Self {
        if self.is_discarded() {
            return self.clone();
        }

        Self {
            text: format_body(message, args),
            ..self.clone()
        }
    }

    pub fn with_priority(&self, priority: Priority) -> Self {
        if self.is_discarded() {
            return self.clone();
        }

        Self {
            priority,
            ..self.clone()
        }
    }

    /// Hand the message to the client for delivery
    ///
    /// Returns once the message is queued. Delivery failures are logged by
    /// the client and never reported here.
    pub fn send(self) -> Result<()> {
        match &self.target {
            Target::Client(client) => client.dispatch(&self),
            Target::Discard => Ok(()),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }
}

impl fmt::Debug for MessageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRequest")
            .field("title", &self.title)
            .field("text", &self.text)
            .field("priority", &self.priority)
            .field("discarded", &self.is_discarded())
            .finish()
    }
}
