use crate::{
    codec,
    constants::GENESIS_TIMESTAMP,
    mine, pow, timestamp_is_valid, Block, BlockRecord, Data, LedgerError, Result,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

/// Length reported by [`Chain::validate`] for a chain that failed validation.
pub const INVALID_LENGTH: i64 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validation {
    pub ok: bool,
    pub length: i64,
}

/// First invariant a chain was found to violate.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChainFault {
    #[error("chain has no genesis block")]
    Empty,
    #[error("first block is not the canonical genesis block")]
    Genesis,
    #[error("block {index} does not link to its predecessor")]
    BrokenLink { index: usize },
    #[error("block {index} stored hash does not match its contents")]
    HashMismatch { index: usize },
    #[error("block {index} does not satisfy the proof of work")]
    Unproven { index: usize },
    #[error("block {index} has a malformed timestamp")]
    MalformedTimestamp { index: usize },
}

/// Ordered, hash-linked sequence of blocks starting at genesis.
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
    size: usize,
    genesis: Block,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    /// A chain seeded with the fixed-timestamp genesis block.
    pub fn new() -> Self {
        Self::with_genesis(Block::genesis(GENESIS_TIMESTAMP))
    }

    pub fn with_genesis(genesis: Block) -> Self {
        let mut chain = Self::empty(genesis);
        chain.append(chain.genesis.clone());
        chain
    }

    fn empty(genesis: Block) -> Self {
        Self {
            blocks: Vec::new(),
            size: 0,
            genesis,
        }
    }

    /// Parse a serialized peer chain, checked against the default genesis.
    pub fn reconstruct(serialized: &str) -> Result<Self> {
        Self::reconstruct_with(&Block::genesis(GENESIS_TIMESTAMP), serialized)
    }

    pub fn reconstruct_with(genesis: &Block, serialized: &str) -> Result<Self> {
        let records: Vec<BlockRecord> = serde_json::from_str(serialized)?;
        Ok(Self::from_records(genesis, records))
    }

    /// Same as [`Chain::reconstruct_with`] for an already parsed JSON list.
    pub fn from_value(genesis: &Block, value: Value) -> Result<Self> {
        let records: Vec<BlockRecord> = serde_json::from_value(value)?;
        Ok(Self::from_records(genesis, records))
    }

    /// Rebuilds every block field by field, keeping the stored nonce and hash.
    /// Nothing is re-mined or checked here; see [`Chain::validate`].
    pub fn from_records(genesis: &Block, records: Vec<BlockRecord>) -> Self {
        let mut chain = Self::empty(genesis.clone());
        for record in records {
            chain.append(Block::from_record(record));
        }
        chain
    }

    pub fn genesis_block(&self) -> &Block {
        &self.genesis
    }

    /// Stamps the block with the next index and pushes it. No validation.
    pub fn append(&mut self, mut block: Block) {
        block.set_index(self.size as u64);
        self.size += 1;
        self.blocks.push(block);
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn records(&self) -> Vec<BlockRecord> {
        self.blocks.iter().map(Block::to_record).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.records())?)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.records())?)
    }

    /// Swap in a whole chain, never a partial one.
    pub fn replace(&mut self, other: Chain) {
        *self = other;
    }

    /// Walks the chain and returns its length, or the first violated invariant.
    pub fn check(&self) -> std::result::Result<usize, ChainFault> {
        let Some((first, rest)) = self.blocks.split_first() else {
            return Err(ChainFault::Empty);
        };

        if codec::digest(first) != codec::digest(&self.genesis) || first.hash() != self.genesis.hash()
        {
            return Err(ChainFault::Genesis);
        }

        let mut prev = first;
        for (offset, block) in rest.iter().enumerate() {
            let index = offset + 1;
            if block.prev_hash() != prev.hash() {
                return Err(ChainFault::BrokenLink { index });
            }
            if block.hash() != codec::digest(block) {
                return Err(ChainFault::HashMismatch { index });
            }
            if !pow::meets_difficulty(block.hash()) {
                return Err(ChainFault::Unproven { index });
            }
            if !timestamp_is_valid(block.timestamp()) {
                return Err(ChainFault::MalformedTimestamp { index });
            }
            prev = block;
        }
        Ok(self.blocks.len())
    }

    /// Pass/fail over the whole chain: `length` is the block count, or
    /// [`INVALID_LENGTH`] when any invariant is broken.
    pub fn validate(&self) -> Validation {
        match self.check() {
            Ok(length) => Validation {
                ok: true,
                length: length as i64,
            },
            Err(fault) => {
                debug!(%fault, "chain failed validation");
                Validation {
                    ok: false,
                    length: INVALID_LENGTH,
                }
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().ok
    }

    /// Validated length, or [`INVALID_LENGTH`].
    pub fn valid_len(&self) -> i64 {
        self.validate().length
    }

    /// Mines `data` into a block on top of the current tip without appending it.
    pub fn mine_data(&self, data: Data) -> Result<Block> {
        let tip = self
            .tip()
            .ok_or_else(|| LedgerError::MalformedChain("chain has no tip to extend".into()))?;
        mine::mine(Block::new(tip.hash(), data))
    }

    /// Appends a block mined elsewhere, provided it still extends the tip and
    /// carries a valid proof of work.
    pub fn append_mined(&mut self, block: Block) -> Result<()> {
        let expected = self.tip().map(|tip| tip.hash().to_string()).unwrap_or_default();
        if block.prev_hash() != expected {
            return Err(LedgerError::StaleBlock {
                expected,
                found: block.prev_hash().to_string(),
            });
        }
        if block.hash() != codec::digest(&block) || !block.is_mined() {
            return Err(LedgerError::Unmined {
                hash: block.hash().to_string(),
            });
        }
        self.append(block);
        info!(size = self.size, "appended mined block");
        Ok(())
    }
}
