//! Wire records for the Herald application service
//!
//! The remote service speaks the Thrift `ApplicationService` contract. Only the
//! `sendMessage` call is modelled here, along with a small [`Value`] tree that
//! both protocol codecs encode from and decode into.
//!
//! ## Protocols
//!
//! - [`binary`]: strict binary protocol, used over raw TCP sockets
//! - [`json`]: JSON protocol, used over HTTP

pub mod binary;
pub mod json;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the remote call that delivers a message
pub const SEND_MESSAGE: &str = "sendMessage";

/// Thrift type ids
pub mod ttype {
    pub const STOP: u8 = 0;
    pub const BOOL: u8 = 2;
    pub const BYTE: u8 = 3;
    pub const DOUBLE: u8 = 4;
    pub const I16: u8 = 6;
    pub const I32: u8 = 8;
    pub const I64: u8 = 10;
    pub const STRING: u8 = 11;
    pub const STRUCT: u8 = 12;
    pub const MAP: u8 = 13;
    pub const SET: u8 = 14;
    pub const LIST: u8 = 15;
}

/// Nesting limit applied while decoding untrusted replies
pub(crate) const MAX_DEPTH: usize = 64;

/// Size limit for any single string or container read off the wire
pub(crate) const MAX_LENGTH: usize = 16 * 1024 * 1024;

/// Wire-level urgency of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Urgency {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Urgency {
    /// The integer code sent on the wire
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Urgency::Low),
            2 => Some(Urgency::Medium),
            3 => Some(Urgency::High),
            _ => None,
        }
    }
}

/// Token identifying the sending application
#[derive(Clone, PartialEq, Eq)]
pub struct ApplicationToken {
    pub token_id: String,
}

impl std::fmt::Debug for ApplicationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationToken")
            .field("token_id", &"<redacted>")
            .finish()
    }
}

/// Enriched message record sent with every `sendMessage` call
///
/// | id | field |
/// |----|-------|
/// | 1 | `application_token` |
/// | 2 | `body` |
/// | 3 | `title` |
/// | 4 | `urgency` |
/// | 5 | `time_of_message` |
/// | 6 | `hostname` |
/// | 7 | `ipv4_address` |
/// | 8 | `operating_system_name` |
/// | 9 | `device_name` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub application_token: ApplicationToken,
    /// Prefix + text + suffix
    pub body: String,
    pub title: String,
    pub urgency: Urgency,
    /// Milliseconds since the Unix epoch, captured when `send()` ran
    pub time_of_message: i64,
    pub hostname: String,
    pub ipv4_address: String,
    pub operating_system_name: String,
    pub device_name: String,
}

impl SendMessageRequest {
    /// Encode as a struct value
    pub fn to_value(&self) -> Value {
        Value::Struct(vec![
            (
                1,
                Value::Struct(vec![(1, Value::string(&self.application_token.token_id))]),
            ),
            (2, Value::string(&self.body)),
            (3, Value::string(&self.title)),
            (4, Value::I32(self.urgency.code())),
            (5, Value::I64(self.time_of_message)),
            (6, Value::string(&self.hostname)),
            (7, Value::string(&self.ipv4_address)),
            (8, Value::string(&self.operating_system_name)),
            (9, Value::string(&self.device_name)),
        ])
    }

    /// Decode from a struct value, as a service implementation would
    pub fn from_value(value: &Value) -> Result<Self> {
        let string_field = |id: i16| -> Result<String> {
            value
                .field(id)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| protocol_violation(format!("missing string field {}", id)))
        };

        let token_id = value
            .field(1)
            .and_then(|token| token.field(1))
            .and_then(Value::as_str)
            .ok_or_else(|| protocol_violation("missing application token"))?
            .to_string();

        let urgency = match value.field(4) {
            Some(Value::I32(code)) => Urgency::from_code(*code)
                .ok_or_else(|| protocol_violation(format!("unknown urgency {}", code)))?,
            _ => return Err(protocol_violation("missing urgency")),
        };

        let time_of_message = match value.field(5) {
            Some(Value::I64(ts)) => *ts,
            _ => return Err(protocol_violation("missing time_of_message")),
        };

        Ok(Self {
            application_token: ApplicationToken { token_id },
            body: string_field(2)?,
            title: string_field(3)?,
            urgency,
            time_of_message,
            hostname: string_field(6)?,
            ipv4_address: string_field(7)?,
            operating_system_name: string_field(8)?,
            device_name: string_field(9)?,
        })
    }

    /// Argument struct of the `sendMessage` call
    pub fn to_call_args(&self) -> Value {
        Value::Struct(vec![(1, self.to_value())])
    }
}

/// Kind of a protocol message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Call = 1,
    Reply = 2,
    Exception = 3,
    Oneway = 4,
}

impl MessageKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(MessageKind::Call),
            2 => Some(MessageKind::Reply),
            3 => Some(MessageKind::Exception),
            4 => Some(MessageKind::Oneway),
            _ => None,
        }
    }
}

/// Header preceding every protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub kind: MessageKind,
    pub seq: i32,
}

impl MessageHeader {
    pub fn call(name: &str, seq: i32) -> Self {
        Self {
            name: name.to_string(),
            kind: MessageKind::Call,
            seq,
        }
    }

    pub fn reply(name: &str, seq: i32) -> Self {
        Self {
            name: name.to_string(),
            kind: MessageKind::Reply,
            seq,
        }
    }
}

/// A decoded protocol value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    Double(f64),
    I16(i16),
    I32(i32),
    I64(i64),
    Binary(Vec<u8>),
    Struct(Vec<(i16, Value)>),
    Map {
        key_type: u8,
        value_type: u8,
        entries: Vec<(Value, Value)>,
    },
    Set {
        elem_type: u8,
        items: Vec<Value>,
    },
    List {
        elem_type: u8,
        items: Vec<Value>,
    },
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::Binary(s.as_bytes().to_vec())
    }

    /// Thrift type id of this value
    pub fn type_id(&self) -> u8 {
        match self {
            Value::Bool(_) => ttype::BOOL,
            Value::Byte(_) => ttype::BYTE,
            Value::Double(_) => ttype::DOUBLE,
            Value::I16(_) => ttype::I16,
            Value::I32(_) => ttype::I32,
            Value::I64(_) => ttype::I64,
            Value::Binary(_) => ttype::STRING,
            Value::Struct(_) => ttype::STRUCT,
            Value::Map { .. } => ttype::MAP,
            Value::Set { .. } => ttype::SET,
            Value::List { .. } => ttype::LIST,
        }
    }

    /// Look up a struct field by id
    pub fn field(&self, id: i16) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields
                .iter()
                .find(|(field_id, _)| *field_id == id)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Binary(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }
}

pub(crate) fn protocol_violation(message: impl std::fmt::Display) -> Error {
    Error::Delivery(format!("protocol violation: {}", message))
}

/// Check the reply to a `sendMessage` call
///
/// Success is field 0 of the result struct. Any other field is a declared
/// exception; an `Exception` message carries an application exception.
pub(crate) fn check_reply(call: &MessageHeader, reply: &MessageHeader, body: &Value) -> Result<()> {
    if reply.name != call.name {
        return Err(protocol_violation(format!(
            "reply for {:?} while waiting on {:?}",
            reply.name, call.name
        )));
    }
    if reply.seq != call.seq {
        return Err(protocol_violation(format!(
            "out of order reply (expected seq {}, got {})",
            call.seq, reply.seq
        )));
    }

    match reply.kind {
        MessageKind::Reply => {}
        MessageKind::Exception => {
            let message = body.field(1).and_then(Value::as_str).unwrap_or("unknown");
            return Err(Error::Delivery(format!(
                "remote application exception: {}",
                message
            )));
        }
        other => {
            return Err(protocol_violation(format!("unexpected {:?} message", other)));
        }
    }

    match body {
        Value::Struct(fields) => match fields.first() {
            Some((0, _)) => Ok(()),
            Some((id, exception)) => {
                let message = exception
                    .field(1)
                    .and_then(Value::as_str)
                    .unwrap_or("no message");
                Err(Error::Delivery(format!(
                    "{} raised declared exception {}: {}",
                    call.name, id, message
                )))
            }
            None => Err(Error::Delivery(format!("{} returned no result", call.name))),
        },
        _ => Err(protocol_violation("reply body is not a struct")),
    }
}
