pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const GENESIS_PREV_HASH: &str = "0000";
/// Fixed so that independently started nodes agree on the genesis digest.
pub const GENESIS_TIMESTAMP: &str = "01/01/1970, 00:00:00";
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";
pub const POW_PREFIX: &str = "0000";
pub const MAX_NONCE: u64 = 1 << 32;
