//! JSON envelope codec
//!
//! Encodes calls and replies the way JSON method channels frame them:
//!
//! - call: `{"method": "groth16Verify", "args": {...}}`
//! - success: `[result]`
//! - error: `[code, message, details]`
//! - not implemented: empty payload
//!
//! JSON has no byte type, so byte buffers travel as `{"$bytes": "<base64>"}`.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Map, Number};

use crate::error::{CodecError, ErrorReply};
use crate::router::{MethodCall, MethodResponse};
use crate::value::Value;

const BYTES_KEY: &str = "$bytes";

/// Convert a channel value to JSON
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => {
            Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
        }
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(bytes) => {
            let mut wrapped = Map::new();
            wrapped.insert(
                BYTES_KEY.to_string(),
                serde_json::Value::String(STANDARD.encode(bytes)),
            );
            serde_json::Value::Object(wrapped)
        }
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect::<Map<_, _>>(),
        ),
    }
}

/// Convert JSON to a channel value
pub fn from_json(json: serde_json::Value) -> Result<Value, CodecError> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::List(
            items
                .into_iter()
                .map(from_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        serde_json::Value::Object(map) => {
            if map.len() == 1 {
                if let Some(serde_json::Value::String(encoded)) = map.get(BYTES_KEY) {
                    return Ok(Value::Bytes(STANDARD.decode(encoded)?));
                }
            }
            Value::Map(
                map.into_iter()
                    .map(|(k, v)| from_json(v).map(|v| (k, v)))
                    .collect::<Result<BTreeMap<_, _>, _>>()?,
            )
        }
    })
}

/// Encode a call envelope
pub fn encode_call(call: &MethodCall) -> Result<Vec<u8>, CodecError> {
    let envelope = json!({
        "method": call.method,
        "args": to_json(&call.arguments),
    });
    Ok(serde_json::to_vec(&envelope)?)
}

/// Decode a call envelope
pub fn decode_call(payload: &[u8]) -> Result<MethodCall, CodecError> {
    let serde_json::Value::Object(mut envelope) = serde_json::from_slice(payload)? else {
        return Err(CodecError::Envelope {
            reason: "call envelope is not an object".into(),
        });
    };

    let method = match envelope.remove("method") {
        Some(serde_json::Value::String(method)) => method,
        _ => {
            return Err(CodecError::Envelope {
                reason: "missing method name".into(),
            })
        }
    };
    let arguments = from_json(envelope.remove("args").unwrap_or_default())?;

    Ok(MethodCall { method, arguments })
}

/// Encode a reply envelope
pub fn encode_response(response: &MethodResponse) -> Result<Vec<u8>, CodecError> {
    let envelope = match response {
        MethodResponse::Success(value) => json!([to_json(value)]),
        MethodResponse::Error(reply) => json!([
            reply.code,
            reply.message,
            reply.details.as_ref().map_or(serde_json::Value::Null, to_json),
        ]),
        MethodResponse::NotImplemented => return Ok(Vec::new()),
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Decode a reply envelope
pub fn decode_response(payload: &[u8]) -> Result<MethodResponse, CodecError> {
    if payload.is_empty() {
        return Ok(MethodResponse::NotImplemented);
    }

    let serde_json::Value::Array(items) = serde_json::from_slice(payload)? else {
        return Err(CodecError::Envelope {
            reason: "reply envelope is not an array".into(),
        });
    };

    let mut items = items.into_iter();
    match (items.next(), items.next(), items.next(), items.next()) {
        (Some(result), None, None, None) => Ok(MethodResponse::Success(from_json(result)?)),
        (
            Some(serde_json::Value::String(code)),
            Some(message),
            Some(details),
            None,
        ) => {
            let message = match message {
                serde_json::Value::String(message) => message,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            let details = match from_json(details)? {
                Value::Null => None,
                details => Some(details),
            };
            Ok(MethodResponse::Error(ErrorReply {
                code,
                message,
                details,
            }))
        }
        _ => Err(CodecError::Envelope {
            reason: "reply envelope must hold one or three items".into(),
        }),
    }
}
