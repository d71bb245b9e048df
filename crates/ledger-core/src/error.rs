use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("field '{field}' has already been set and cannot be modified")]
    ImmutableField { field: &'static str },

    #[error("malformed timestamp: {0:?}")]
    MalformedTimestamp(String),

    #[error("nonce search exhausted {limit} candidates without meeting the difficulty")]
    MiningExhausted { limit: u64 },

    #[error("block no longer extends the tip (expected prev hash {expected}, found {found})")]
    StaleBlock { expected: String, found: String },

    #[error("block hash {hash} does not satisfy the proof of work")]
    Unmined { hash: String },

    #[error("malformed chain: {0}")]
    MalformedChain(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
