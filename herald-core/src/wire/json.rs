//! JSON protocol
//!
//! A message is `[1, name, kind, seq, body]`. Struct fields are keyed by id,
//! each wrapped in an object naming its type:
//!
//! ```text
//! [1,"sendMessage",1,3,{"1":{"rec":{"2":{"str":"body"},"4":{"i32":2}}}}]
//! ```
//!
//! Strings are carried as JSON strings. Binary payloads are not used by this
//! contract and are decoded as UTF-8.

use serde_json::{json, Map, Number};

use crate::error::Result;

use super::{protocol_violation, ttype, MessageHeader, MessageKind, Value, MAX_DEPTH};

const VERSION: i64 = 1;

fn type_name(type_id: u8) -> &'static str {
    match type_id {
        ttype::BOOL => "tf",
        ttype::BYTE => "i8",
        ttype::I16 => "i16",
        ttype::I32 => "i32",
        ttype::I64 => "i64",
        ttype::DOUBLE => "dbl",
        ttype::STRUCT => "rec",
        ttype::STRING => "str",
        ttype::MAP => "map",
        ttype::SET => "set",
        _ => "lst",
    }
}

fn type_id(name: &str) -> Option<u8> {
    let id = match name {
        "tf" => ttype::BOOL,
        "i8" => ttype::BYTE,
        "i16" => ttype::I16,
        "i32" => ttype::I32,
        "i64" => ttype::I64,
        "dbl" => ttype::DOUBLE,
        "rec" => ttype::STRUCT,
        "str" => ttype::STRING,
        "map" => ttype::MAP,
        "set" => ttype::SET,
        "lst" => ttype::LIST,
        _ => return None,
    };
    Some(id)
}

/// Encode a complete message
pub fn encode_message(header: &MessageHeader, body: &Value) -> serde_json::Value {
    let kind = header.kind as u8;
    json!([VERSION, header.name, kind, header.seq, encode_value(body)])
}

fn encode_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Bool(b) => json!(u8::from(*b)),
        Value::Byte(n) => json!(n),
        Value::I16(n) => json!(n),
        Value::I32(n) => json!(n),
        Value::I64(n) => json!(n),
        Value::Double(d) => Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| json!(d.to_string())),
        Value::Binary(bytes) => json!(String::from_utf8_lossy(bytes)),
        Value::Struct(fields) => {
            let mut object = Map::new();
            for (id, field) in fields {
                let mut wrapper = Map::new();
                wrapper.insert(type_name(field.type_id()).to_string(), encode_value(field));
                object.insert(id.to_string(), serde_json::Value::Object(wrapper));
            }
            serde_json::Value::Object(object)
        }
        Value::Map {
            key_type,
            value_type,
            entries,
        } => {
            let mut object = Map::new();
            for (key, value) in entries {
                let key = match encode_value(key) {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                object.insert(key, encode_value(value));
            }
            json!([
                type_name(*key_type),
                type_name(*value_type),
                entries.len(),
                object
            ])
        }
        Value::Set { elem_type, items } | Value::List { elem_type, items } => {
            let mut array = vec![json!(type_name(*elem_type)), json!(items.len())];
            array.extend(items.iter().map(encode_value));
            serde_json::Value::Array(array)
        }
    }
}

/// Decode a complete message
pub fn decode_message(message: &serde_json::Value) -> Result<(MessageHeader, Value)> {
    let parts = message
        .as_array()
        .filter(|parts| parts.len() == 5)
        .ok_or_else(|| protocol_violation("message is not a 5 element array"))?;

    if parts[0].as_i64() != Some(VERSION) {
        return Err(protocol_violation(format!("bad version {}", parts[0])));
    }
    let name = parts[1]
        .as_str()
        .ok_or_else(|| protocol_violation("message name is not a string"))?
        .to_string();
    let kind = parts[2]
        .as_u64()
        .and_then(|code| u8::try_from(code).ok())
        .and_then(MessageKind::from_code)
        .ok_or_else(|| protocol_violation(format!("unknown message type {}", parts[2])))?;
    let seq = parts[3]
        .as_i64()
        .and_then(|seq| i32::try_from(seq).ok())
        .ok_or_else(|| protocol_violation(format!("bad sequence id {}", parts[3])))?;
    let body = decode_value(ttype::STRUCT, &parts[4], 0)?;

    Ok((MessageHeader { name, kind, seq }, body))
}

fn as_int(json: &serde_json::Value) -> Result<i64> {
    match json {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| protocol_violation(format!("expected integer, got {}", json)))
}

fn narrow<T: TryFrom<i64>>(json: &serde_json::Value) -> Result<T> {
    T::try_from(as_int(json)?).map_err(|_| protocol_violation(format!("{} out of range", json)))
}

fn container_header<'a>(
    json: &'a serde_json::Value,
    header_len: usize,
) -> Result<&'a [serde_json::Value]> {
    json.as_array()
        .filter(|parts| parts.len() >= header_len)
        .map(Vec::as_slice)
        .ok_or_else(|| protocol_violation("malformed container"))
}

fn element_type(json: &serde_json::Value) -> Result<u8> {
    json.as_str()
        .and_then(type_id)
        .ok_or_else(|| protocol_violation(format!("unknown type name {}", json)))
}

fn decode_value(ty: u8, json: &serde_json::Value, depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(protocol_violation("nesting too deep"));
    }

    let value = match ty {
        ttype::BOOL => Value::Bool(as_int(json)? != 0),
        ttype::BYTE => Value::Byte(narrow(json)?),
        ttype::I16 => Value::I16(narrow(json)?),
        ttype::I32 => Value::I32(narrow(json)?),
        ttype::I64 => Value::I64(as_int(json)?),
        ttype::DOUBLE => {
            let d = match json {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.parse().ok(),
                _ => None,
            };
            Value::Double(d.ok_or_else(|| protocol_violation("expected double"))?)
        }
        ttype::STRING => match json {
            serde_json::Value::String(s) => Value::string(s),
            other => return Err(protocol_violation(format!("expected string, got {}", other))),
        },
        ttype::STRUCT => {
            let object = json
                .as_object()
                .ok_or_else(|| protocol_violation("struct is not an object"))?;
            let mut fields = Vec::with_capacity(object.len());
            for (key, wrapper) in object {
                let id: i16 = key
                    .parse()
                    .map_err(|_| protocol_violation(format!("bad field id {:?}", key)))?;
                let (name, inner) = wrapper
                    .as_object()
                    .and_then(|w| w.iter().next())
                    .ok_or_else(|| protocol_violation(format!("field {} has no type", id)))?;
                let field_type = type_id(name)
                    .ok_or_else(|| protocol_violation(format!("unknown type name {:?}", name)))?;
                fields.push((id, decode_value(field_type, inner, depth + 1)?));
            }
            fields.sort_by_key(|(id, _)| *id);
            Value::Struct(fields)
        }
        ttype::MAP => {
            let parts = container_header(json, 4)?;
            let key_type = element_type(&parts[0])?;
            let value_type = element_type(&parts[1])?;
            let object = parts[3]
                .as_object()
                .ok_or_else(|| protocol_violation("map entries are not an object"))?;
            let mut entries = Vec::with_capacity(object.len());
            for (key, value) in object {
                let key = decode_value(key_type, &serde_json::Value::String(key.clone()), depth + 1)?;
                entries.push((key, decode_value(value_type, value, depth + 1)?));
            }
            Value::Map {
                key_type,
                value_type,
                entries,
            }
        }
        ttype::SET | ttype::LIST => {
            let parts = container_header(json, 2)?;
            let elem_type = element_type(&parts[0])?;
            let items = parts[2..]
                .iter()
                .map(|item| decode_value(elem_type, item, depth + 1))
                .collect::<Result<Vec<_>>>()?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::tests::sample_request;
    use crate::wire::{SendMessageRequest, SEND_MESSAGE};

    #[test]
    fn test_call_layout() {
        let request = sample_request();
        let encoded = encode_message(&MessageHeader::call(SEND_MESSAGE, 3), &request.to_call_args());

        assert_eq!(encoded[0], 1);
        assert_eq!(encoded[1], "sendMessage");
        assert_eq!(encoded[2], 1);
        assert_eq!(encoded[3], 3);

        let record = &encoded[4]["1"]["rec"];
        assert_eq!(record["1"]["rec"]["1"]["str"], "token-123");
        assert_eq!(record["2"]["str"], "Disk usage at 91%");
        assert_eq!(record["3"]["str"], "Disk Almost Full");
        assert_eq!(record["4"]["i32"], 2);
        assert_eq!(record["5"]["i64"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_decode_call() {
        let request = sample_request();
        let header = MessageHeader::call(SEND_MESSAGE, 11);
        let text = encode_message(&header, &request.to_call_args()).to_string();

        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        let (decoded_header, args) = decode_message(&parsed).unwrap();

        assert_eq!(decoded_header, header);
        assert_eq!(
            SendMessageRequest::from_value(args.field(1).unwrap()).unwrap(),
            request
        );
    }

    #[test]
    fn test_decode_reply_with_containers() {
        let reply = json!([
            1,
            "sendMessage",
            2,
            4,
            {
                "0": {"rec": {"1": {"lst": ["str", 2, "a", "b"]}}},
                "7": {"map": ["str", "i64", 1, {"count": 3}]},
                "8": {"tf": 1}
            }
        ]);

        let (header, body) = decode_message(&reply).unwrap();
        assert_eq!(header, MessageHeader::reply(SEND_MESSAGE, 4));
        assert_eq!(
            body.field(0).and_then(|r| r.field(1)),
            Some(&Value::List {
                elem_type: ttype::STRING,
                items: vec![Value::string("a"), Value::string("b")],
            })
        );
        assert_eq!(body.field(8), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_message(&json!({"not": "a message"})).is_err());
        assert!(decode_message(&json!([2, "sendMessage", 2, 1, {}])).is_err());
        assert!(decode_message(&json!([1, "sendMessage", 9, 1, {}])).is_err());
        assert!(decode_message(&json!([1, "sendMessage", 2, 1, {"0": {"zzz": 1}}])).is_err());
    }
}
