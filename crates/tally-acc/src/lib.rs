//! # tally-acc — Block coordinator: chain accumulation, flush, RocksDB.
//!
//! Composes the accumulator subsystems into a running coordinator:
//! - [`chain::ChainAcc`] — per-chain Merkle accumulation within one block
//! - [`accumulator::Accumulator`] — the coordinator state machine pumping
//!   the entry feed and sealing directory blocks on control signals
//! - [`storage::RocksStore`] — persistent node storage backed by RocksDB
//! - [`config::AccConfig`] — coordinator configuration

pub mod accumulator;
pub mod chain;
pub mod config;
pub mod storage;

pub use accumulator::{AccHandles, Accumulator};
pub use config::AccConfig;
pub use storage::RocksStore;
