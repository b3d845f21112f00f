//! Field records
//!
//! A record is the serde view of a configuration object: a JSON object keyed
//! by field identifier. Sources, the merge engine and the change tracker all
//! work on records so no per-type reflection is needed.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{Result, SmartConfError};

/// Field identifier → value
pub type Record = serde_json::Map<String, Value>;

/// Serialize a configuration object into its field record.
pub fn to_record<T: Serialize>(value: &T) -> Result<Record> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(SmartConfError::schema(
            std::any::type_name::<T>(),
            format!("expected a struct, serialized as {}", value_kind(&other)),
        )),
    }
}

/// Rebuild a configuration object from its field record.
pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Human-readable rendering: strings without quotes, null as `<unset>`.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "<unset>".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
