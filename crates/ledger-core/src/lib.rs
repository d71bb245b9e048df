pub mod chain;
pub mod codec;
pub mod constants;
pub mod error;
pub mod mine;
pub mod payload;

pub use chain::{Chain, ChainFault, Validation};
pub use error::{LedgerError, Result};

use chrono::{NaiveDateTime, Utc};
use constants::{GENESIS_PREV_HASH, TIMESTAMP_FORMAT};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Application payload carried by a block. Keys are sorted when hashed.
pub type Data = Map<String, Value>;

/// Wire form of a block. The key set is what peers exchange and agree on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BlockRecord {
    pub index: u64,
    pub timestamp: String,
    pub nonce: u64,
    pub prev_hash: String,
    pub hash: String,
    pub data: Data,
}

/// A requested rewrite of one block field, see [`Block::try_set`].
#[derive(Clone, Debug)]
pub enum FieldUpdate {
    Index(u64),
    Nonce(u64),
    Timestamp(String),
    PrevHash(String),
    Data(Data),
}

/// A ledger entry. `timestamp`, `prev_hash` and `data` are written once, at
/// construction; only the miner moves `nonce`/`hash` and only the chain moves `index`.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    index: u64,
    timestamp: String,
    nonce: u64,
    prev_hash: String,
    data: Data,
    hash: String,
}

impl Block {
    /// New unmined block stamped with the current UTC time.
    pub fn new(prev_hash: impl Into<String>, data: Data) -> Self {
        Self::with_timestamp(prev_hash, data, now_timestamp())
    }

    pub fn with_timestamp(
        prev_hash: impl Into<String>,
        data: Data,
        timestamp: impl Into<String>,
    ) -> Self {
        let mut block = Self {
            index: 0,
            timestamp: timestamp.into(),
            nonce: 0,
            prev_hash: prev_hash.into(),
            data,
            hash: String::new(),
        };
        block.hash = codec::digest(&block);
        block
    }

    /// The content-constant first block: empty data, `"0000"` prev hash, nonce 0.
    pub fn genesis(timestamp: impl Into<String>) -> Self {
        Self::with_timestamp(GENESIS_PREV_HASH, Data::new(), timestamp)
    }

    /// Rebuild a block exactly as a peer sent it. The stored nonce and hash are
    /// kept as-is so validation can tell whether they still match the contents.
    pub fn from_record(record: BlockRecord) -> Self {
        Self {
            index: record.index,
            timestamp: record.timestamp,
            nonce: record.nonce,
            prev_hash: record.prev_hash,
            data: record.data,
            hash: record.hash,
        }
    }

    pub fn to_record(&self) -> BlockRecord {
        BlockRecord {
            index: self.index,
            timestamp: self.timestamp.clone(),
            nonce: self.nonce,
            prev_hash: self.prev_hash.clone(),
            hash: self.hash.clone(),
            data: self.data.clone(),
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn prev_hash(&self) -> &str {
        &self.prev_hash
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    /// The stored digest. Use [`Block::compute_hash`] for the digest of the current contents.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn compute_hash(&self) -> String {
        codec::digest(self)
    }

    pub fn is_mined(&self) -> bool {
        pow::meets_difficulty(&self.hash)
    }

    /// Apply a field rewrite. `Index` and `Nonce` are accepted (a new nonce
    /// rehashes the block); the write-once fields fail with
    /// [`LedgerError::ImmutableField`] and leave the block untouched.
    pub fn try_set(&mut self, update: FieldUpdate) -> Result<()> {
        match update {
            FieldUpdate::Index(index) => self.set_index(index),
            FieldUpdate::Nonce(nonce) => {
                self.nonce = nonce;
                self.hash = codec::digest(self);
            }
            FieldUpdate::Timestamp(_) => {
                return Err(LedgerError::ImmutableField { field: "timestamp" })
            }
            FieldUpdate::PrevHash(_) => {
                return Err(LedgerError::ImmutableField { field: "prev_hash" })
            }
            FieldUpdate::Data(_) => return Err(LedgerError::ImmutableField { field: "data" }),
        }
        Ok(())
    }

    pub(crate) fn set_index(&mut self, index: u64) {
        self.index = index;
    }

    /// Fix the winning nonce and its already computed digest.
    pub(crate) fn stamp(&mut self, nonce: u64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }
}

/// Current UTC time in the block timestamp format (`DD/MM/YYYY, HH:MM:SS`).
pub fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

pub fn timestamp_is_valid(timestamp: &str) -> bool {
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).is_ok()
}

pub mod pow {
    use crate::constants::POW_PREFIX;

    /// Fixed difficulty: the hex digest must open with [`POW_PREFIX`].
    pub fn meets_difficulty(digest: &str) -> bool {
        digest.starts_with(POW_PREFIX)
    }

    /// Leading `'0'` hex characters of a digest.
    pub fn count_leading_zero_nibbles(digest: &str) -> usize {
        digest.chars().take_while(|c| *c == '0').count()
    }
}
