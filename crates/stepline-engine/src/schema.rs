//! Typed input shapes for handlers.
//!
//! A handler declares its inputs as a `serde` struct; [`normalize`]
//! validates the resolved `with` mapping against it and returns the
//! coerced, defaulted form the handler will receive.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EngineError, EngineResult};

/// Deserialize resolved inputs into a handler's input struct.
pub fn parse_inputs<T: DeserializeOwned>(raw: &Map<String, Value>) -> EngineResult<T> {
    serde_json::from_value(Value::Object(raw.clone())).map_err(|e| EngineError::InvalidInput(e.to_string()))
}

/// Validate inputs against `T` and return the normalized mapping.
pub fn normalize<T>(raw: Map<String, Value>) -> EngineResult<Map<String, Value>>
where
    T: DeserializeOwned + Serialize,
{
    let typed: T = parse_inputs(&raw)?;
    match serde_json::to_value(typed)? {
        Value::Object(map) => Ok(map),
        other => Err(EngineError::InvalidInput(format!(
            "input shape must serialize to a mapping, got {}",
            other
        ))),
    }
}

/// Accept strings, numbers, booleans and null (as `""`) for a string field.
pub fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!("expected a string, got {}", other))),
    }
}
