//! Strict binary protocol
//!
//! Encoding builds a contiguous buffer so a call goes out in one write.
//! Decoding reads straight from an async stream since replies are not framed.

use bytes::{BufMut, Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;

use super::{protocol_violation, ttype, MessageHeader, MessageKind, Value, MAX_DEPTH, MAX_LENGTH};

const VERSION_MASK: u32 = 0xffff_0000;
const VERSION_1: u32 = 0x8001_0000;

/// Encode a complete message: header followed by its body struct
pub fn encode_message(header: &MessageHeader, body: &Value) -> Bytes {
    let mut buf = BytesMut::with_capacity(256);
    buf.put_u32(VERSION_1 | header.kind as u32);
    put_binary(&mut buf, header.name.as_bytes());
    buf.put_i32(header.seq);
    put_value(&mut buf, body);
    buf.freeze()
}

fn put_binary(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_i32(bytes.len() as i32);
    buf.put_slice(bytes);
}

fn put_value(buf: &mut BytesMut, value: &Value) {
    match value {
        Value::Bool(b) => buf.put_u8(u8::from(*b)),
        Value::Byte(b) => buf.put_i8(*b),
        Value::Double(d) => buf.put_f64(*d),
        Value::I16(n) => buf.put_i16(*n),
        Value::I32(n) => buf.put_i32(*n),
        Value::I64(n) => buf.put_i64(*n),
        Value::Binary(bytes) => put_binary(buf, bytes),
        Value::Struct(fields) => {
            for (id, field) in fields {
                buf.put_u8(field.type_id());
                buf.put_i16(*id);
                put_value(buf, field);
            }
            buf.put_u8(ttype::STOP);
        }
        Value::Map {
            key_type,
            value_type,
            entries,
        } => {
            buf.put_u8(*key_type);
            buf.put_u8(*value_type);
            buf.put_i32(entries.len() as i32);
            for (key, value) in entries {
                put_value(buf, key);
                put_value(buf, value);
            }
        }
        Value::Set { elem_type, items } | Value::List { elem_type, items } => {
            buf.put_u8(*elem_type);
            buf.put_i32(items.len() as i32);
            for item in items {
                put_value(buf, item);
            }
        }
    }
}

/// Read one message from the stream
///
/// Accepts both the strict (versioned) and the old unversioned header.
pub async fn read_message<R>(reader: &mut R) -> Result<(MessageHeader, Value)>
where
    R: AsyncRead + Unpin + Send,
{
    let first = reader.read_i32().await?;

    let (name, kind_code) = if first < 0 {
        let word = first as u32;
        if word & VERSION_MASK != VERSION_1 {
            return Err(protocol_violation(format!("bad version 0x{:08x}", word)));
        }
        let name = read_string(reader).await?;
        (name, (word & 0xff) as u8)
    } else {
        let name = read_exact_string(reader, checked_len(first)?).await?;
        let kind = reader.read_u8().await?;
        (name, kind)
    };

    let kind = MessageKind::from_code(kind_code)
        .ok_or_else(|| protocol_violation(format!("unknown message type {}", kind_code)))?;
    let seq = reader.read_i32().await?;
    let body = read_value(reader, ttype::STRUCT, 0).await?;

    Ok((MessageHeader { name, kind, seq }, body))
}

fn checked_len(len: i32) -> Result<usize> {
    usize::try_from(len)
        .ok()
        .filter(|len| *len <= MAX_LENGTH)
        .ok_or_else(|| protocol_violation(format!("bad length {}", len)))
}

async fn read_bytes<R>(reader: &mut R, len: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + Send,
{
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes).await?;
    Ok(bytes)
}

async fn read_exact_string<R>(reader: &mut R, len: usize) -> Result<String>
where
    R: AsyncRead + Unpin + Send,
{
    let bytes = read_bytes(reader, len).await?;
    String::from_utf8(bytes).map_err(|_| protocol_violation("message name is not UTF-8"))
}

async fn read_string<R>(reader: &mut R) -> Result<String>
where
    R: AsyncRead + Unpin + Send,
{
    let len = checked_len(reader.read_i32().await?)?;
    read_exact_string(reader, len).await
}

fn read_value<'a, R>(reader: &'a mut R, ty: u8, depth: usize) -> BoxFuture<'a, Result<Value>>
where
    R: AsyncRead + Unpin + Send,
{
    async move {
        if depth > MAX_DEPTH {
            return Err(protocol_violation("nesting too deep"));
        }

        let value = match ty {
            ttype::BOOL => Value::Bool(reader.read_u8().await? != 0),
            ttype::BYTE => Value::Byte(reader.read_i8().await?),
            ttype::DOUBLE => Value::Double(reader.read_f64().await?),
            ttype::I16 => Value::I16(reader.read_i16().await?),
            ttype::I32 => Value::I32(reader.read_i32().await?),
            ttype::I64 => Value::I64(reader.read_i64().await?),
            ttype::STRING => {
                let len = checked_len(reader.read_i32().await?)?;
                Value::Binary(read_bytes(reader, len).await?)
            }
            ttype::STRUCT => {
                let mut fields = Vec::new();
                loop {
                    let field_type = reader.read_u8().await?;
                    if field_type == ttype::STOP {
                        break;
                    }
                    let id = reader.read_i16().await?;
                    let field = read_value(reader, field_type, depth + 1).await?;
                    fields.push((id, field));
                }
                Value::Struct(fields)
            }
            ttype::MAP => {
                let key_type = reader.read_u8().await?;
                let value_type = reader.read_u8().await?;
                let len = checked_len(reader.read_i32().await?)?;
                let mut entries = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    let key = read_value(reader, key_type, depth + 1).await?;
                    let value = read_value(reader, value_type, depth + 1).await?;
                    entries.push((key, value));
                }
                Value::Map {
                    key_type,
                    value_type,
                    entries,
                }
            }
            ttype::SET | ttype::LIST => {
                let elem_type = reader.read_u8().await?;
                let len = checked_len(reader.read_i32().await?)?;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(read_value(reader, elem_type, depth + 1).await?);
                }
                if ty == ttype::SET {
                    Value::Set { elem_type, items }
                } else {
                    Value::List { elem_type, items }
                }
            }
            other => return Err(protocol_violation(format!("unknown type id {}", other))),
        };

        Ok(value)
    }
    .boxed()
}
