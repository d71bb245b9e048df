//! Canonical block serialization and SHA-256 digests.
//!
//! The serialized form is the compatibility contract between peers: two nodes
//! agree on a block's hash only if they produce these exact bytes.
use crate::{Block, Data};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// `timestamp:'<t>',nonce:'<n>',previous hash:'<p>',data:'<sorted json>'`
pub fn serialize(block: &Block) -> String {
    Preimage::of(block).with_nonce(block.nonce())
}

/// Lowercase hex SHA-256 of [`serialize`].
pub fn digest(block: &Block) -> String {
    Preimage::of(block).digest(block.nonce())
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json(data: &Data) -> String {
    sorted(&Value::Object(data.clone())).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|key| (key.clone(), sorted(&map[key])))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// A block's serialized form split around the nonce, so a nonce search only
/// formats the number on each trial.
#[derive(Clone, Debug)]
pub struct Preimage {
    head: String,
    tail: String,
}

impl Preimage {
    pub fn of(block: &Block) -> Self {
        Self {
            head: format!("timestamp:'{}',nonce:'", block.timestamp()),
            tail: format!(
                "',previous hash:'{}',data:'{}'",
                block.prev_hash(),
                canonical_json(block.data())
            ),
        }
    }

    pub fn with_nonce(&self, nonce: u64) -> String {
        format!("{}{}{}", self.head, nonce, self.tail)
    }

    pub fn digest(&self, nonce: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.head.as_bytes());
        hasher.update(nonce.to_string().as_bytes());
        hasher.update(self.tail.as_bytes());
        hex::encode(hasher.finalize())
    }
}
