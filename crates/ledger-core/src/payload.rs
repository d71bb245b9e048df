//! Loose shape check for transaction payloads submitted for mining.
//!
//! ```json
//! [
//!   { "transaction": { "from": "alice", "to": "bob", "amount": 113 } },
//!   ...
//! ]
//! ```
//! `from`, `to` and `amount` are mandatory and must not be falsy
//! (null, false, zero, empty string, empty list or object).
use crate::Data;
use serde_json::Value;
use thiserror::Error;

pub const REQUIRED_FIELDS: [&str; 3] = ["from", "to", "amount"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload must be a non-empty JSON array")]
    NotAList,
    #[error("entry {0} has no 'transaction' object")]
    MissingTransaction(usize),
    #[error("entry {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },
}

/// Checks every entry and hands back the list on success.
pub fn check_post_data(payload: &Value) -> Result<&[Value], PayloadError> {
    let entries = match payload.as_array() {
        Some(entries) if !entries.is_empty() => entries,
        _ => return Err(PayloadError::NotAList),
    };

    for (index, entry) in entries.iter().enumerate() {
        let tx = entry
            .get("transaction")
            .and_then(Value::as_object)
            .ok_or(PayloadError::MissingTransaction(index))?;
        for field in REQUIRED_FIELDS {
            if !tx.get(field).is_some_and(is_truthy) {
                return Err(PayloadError::MissingField { index, field });
            }
        }
    }
    Ok(entries)
}

/// Block data wrapping a checked payload: `{"transactions": [...]}`.
pub fn into_block_data(entries: &[Value]) -> Data {
    let mut data = Data::new();
    data.insert("transactions".into(), Value::Array(entries.to_vec()));
    data
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
