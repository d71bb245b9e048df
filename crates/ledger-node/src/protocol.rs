use ledger_core::BlockRecord;

pub const GET_CHAIN: &str = "GET CHAIN";
pub const SHUTDOWN: &str = "SHUTDOWN";
pub const EXITING: &str = "EXITING";
pub const BLOCKCHAIN_ACCEPTED: &str = "BLOCKCHAIN ACCEPTED";
pub const BLOCKCHAIN_REJECTED: &str = "BLOCKCHAIN REJECTED";
pub const INVALID_JSON: &str = "INVALID JSON";
pub const SERVER_ERROR: &str = "SERVER ERROR";

/// An inbound payload, classified.
#[derive(Debug, PartialEq)]
pub enum Inbound {
    GetChain,
    Shutdown,
    Candidate(Vec<BlockRecord>),
    Invalid,
}

impl Inbound {
    /// Commands match case-insensitively; anything else must be a JSON list of blocks.
    pub fn parse(payload: &str) -> Self {
        if payload.eq_ignore_ascii_case(GET_CHAIN) {
            return Self::GetChain;
        }
        if payload.eq_ignore_ascii_case(SHUTDOWN) {
            return Self::Shutdown;
        }
        match serde_json::from_str(payload) {
            Ok(records) => Self::Candidate(records),
            Err(_) => Self::Invalid,
        }
    }
}

/// Outcome of offering a competing chain to the local node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected,
}

impl Verdict {
    pub fn as_reply(self) -> &'static str {
        match self {
            Self::Accepted => BLOCKCHAIN_ACCEPTED,
            Self::Rejected => BLOCKCHAIN_REJECTED,
        }
    }
}
