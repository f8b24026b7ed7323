//! Error types for the tally accumulator.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseHashError {
    #[error("expected 64 hex characters, got {0}")] BadLength(usize),
    #[error("invalid hex character: {0:?}")] BadCharacter(char),
}

/// Failures decoding a persisted node. Encoding is infallible.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated input: need {need} bytes, have {have}")] Truncated { need: usize, have: usize },
    #[error("{0} trailing bytes after node")] TrailingBytes(usize),
    #[error("invalid node flag: {0:#04x}")] InvalidNodeFlag(u8),
    #[error("entry count {count} exceeds remaining input of {have} bytes")] EntryCountOverflow { count: u32, have: usize },
}

/// Failures in the key/value substrate beneath the store adapter.
///
/// Transient retries are the backend's responsibility; anything surfacing
/// here is treated as a hard fault by the coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("backend: {0}")] Backend(String),
    #[error("invalid head value: expected 32 bytes, got {0}")] InvalidHead(usize),
}

/// Coordinator-level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccError {
    #[error("head names a missing node: {0}")] MissingHeadNode(String),
    #[error("block height overflow at {0}")] HeightOverflow(u64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TallyError {
    #[error(transparent)] Codec(#[from] CodecError),
    #[error(transparent)] Store(#[from] StoreError),
    #[error(transparent)] Acc(#[from] AccError),
}
