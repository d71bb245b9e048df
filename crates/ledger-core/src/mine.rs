use crate::{
    codec::Preimage,
    constants::MAX_NONCE,
    pow::{count_leading_zero_nibbles, meets_difficulty},
    Block, LedgerError, Result,
};
use rayon::prelude::*;
use tracing::{debug, info};

/// Searches nonces from 0 until the block's digest meets the difficulty.
/// Returns the block with the winning nonce and hash fixed; appending it is up to the caller.
pub fn mine(block: Block) -> Result<Block> {
    mine_bounded(block, MAX_NONCE)
}

/// Like [`mine`], giving up with [`LedgerError::MiningExhausted`] after `limit` trials.
pub fn mine_bounded(mut block: Block, limit: u64) -> Result<Block> {
    let preimage = Preimage::of(&block);
    debug!(prev_hash = %block.prev_hash(), limit, "starting nonce search");

    for nonce in 0..limit {
        let hash = preimage.digest(nonce);
        if meets_difficulty(&hash) {
            block.stamp(nonce, hash);
            info!(
                leading_zeros = count_leading_zero_nibbles(block.hash()),
                "Mined block with nonce {} and hash {}",
                nonce,
                block.hash()
            );
            return Ok(block);
        }
    }
    Err(LedgerError::MiningExhausted { limit })
}

/// Splits the nonce range across rayon's pool. The ordered search returns the
/// same smallest winning nonce as [`mine_bounded`].
pub fn mine_parallel(mut block: Block, limit: u64) -> Result<Block> {
    let preimage = Preimage::of(&block);

    let found = (0..limit).into_par_iter().find_map_first(|nonce| {
        let hash = preimage.digest(nonce);
        meets_difficulty(&hash).then_some((nonce, hash))
    });

    let (nonce, hash) = found.ok_or(LedgerError::MiningExhausted { limit })?;
    block.stamp(nonce, hash);
    info!(
        leading_zeros = count_leading_zero_nibbles(block.hash()),
        "Mined block with nonce {} and hash {}",
        nonce,
        block.hash()
    );
    Ok(block)
}
