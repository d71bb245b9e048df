use ledger_core::LedgerError;
use std::{io, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("peer did not answer within {0:?}")]
    Timeout(Duration),

    #[error("malformed frame header {0:?}")]
    BadHeader(String),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("frame payload is not valid UTF-8")]
    NotUtf8,

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("peer registry: {0:#}")]
    Registry(anyhow::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
