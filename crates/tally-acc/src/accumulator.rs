//! The block coordinator.
//!
//! An [`Accumulator`] consumes a stream of pre-validated entry hashes,
//! routes each to its chain's Merkle accumulator, and on every end-of-block
//! control signal seals the block: per-chain leaf-list nodes are persisted,
//! their roots fold into a directory node, the head pointer advances, and
//! the directory root is published on the root feed.
//!
//! The coordinator owns the chain map exclusively. Producers, the block
//! closer, and root consumers interact only through the three bounded
//! channels returned by [`Accumulator::new`]. Flush runs synchronously in
//! the coordinator task; no entries are consumed while a block is sealing.

use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tally_core::constants::{CHAIN_MAP_CAPACITY, CONTROL_CAPACITY, NODE_VERSION, ROOT_FEED_CAPACITY};
use tally_core::error::{AccError, TallyError};
use tally_core::merkle_dag::MerkleDag;
use tally_core::node::{DirectoryEntry, Node, NodeBody};
use tally_core::store::{KvStore, NodeStore};
use tally_core::types::{EntryHash, Hash256};

use crate::chain::ChainAcc;
use crate::config::AccConfig;

/// Channel endpoints handed to the coordinator's collaborators.
pub struct AccHandles {
    /// Producers push `(chain_id, entry_hash)` tuples here; sends block
    /// while the feed is full.
    pub entries: mpsc::Sender<EntryHash>,
    /// `true` ends the current block. Dropping all senders shuts the
    /// coordinator down.
    pub control: mpsc::Sender<bool>,
    /// One directory root per sealed block, in height order.
    pub roots: mpsc::Receiver<Hash256>,
}

/// The block coordinator.
pub struct Accumulator<S: KvStore> {
    store: NodeStore<S>,
    /// Identity of this accumulator; key of its head cell and `chain_id`
    /// of every directory node it writes.
    acc_id: Hash256,
    /// Height the next sealed block will carry.
    height: u64,
    /// Chains with entries in the current block.
    chains: HashMap<Hash256, ChainAcc>,
    /// Content hash of the latest persisted directory node.
    previous: Option<Hash256>,
    /// Timestamp floor: directory timestamps never decrease, even if the
    /// wall clock steps backward.
    last_timestamp_ns: i64,
    total_entries: u64,
    started: Instant,
    entry_rx: mpsc::Receiver<EntryHash>,
    /// False once the entry feed closed; the coordinator then only waits
    /// on control.
    entries_open: bool,
    control_rx: mpsc::Receiver<bool>,
    root_tx: mpsc::Sender<Hash256>,
}

impl<S: KvStore> Accumulator<S> {
    /// Initialize a coordinator against a store.
    ///
    /// Resolves the head cell for `acc_id`: if a head exists, the directory
    /// node it names is loaded and the next block continues the series at
    /// `head.block_height + 1`; otherwise the series starts at height 0.
    /// Returns the coordinator plus the channel endpoints for producers,
    /// the block closer, and root consumers.
    ///
    /// # Errors
    ///
    /// - [`TallyError::Store`] if the substrate fails (a clean "no head"
    ///   is not a failure)
    /// - [`TallyError::Codec`] if the head node does not decode
    /// - [`AccError::MissingHeadNode`] if the head names an absent node
    pub fn new(
        store: S,
        acc_id: Hash256,
        config: &AccConfig,
    ) -> Result<(Self, AccHandles), TallyError> {
        let store = NodeStore::new(store);

        let mut height = 0u64;
        let mut previous = None;
        let mut last_timestamp_ns = 0i64;
        if let Some(head_hash) = store.head(&acc_id)? {
            let head = store
                .node(&head_hash)?
                .ok_or_else(|| AccError::MissingHeadNode(head_hash.to_string()))?;
            height = head
                .block_height
                .checked_add(1)
                .ok_or(AccError::HeightOverflow(head.block_height))?;
            last_timestamp_ns = head.timestamp_ns;
            previous = Some(head_hash);
        }

        info!(
            height,
            resumed = previous.is_some(),
            "starting accumulator"
        );

        let (entry_tx, entry_rx) = mpsc::channel(config.entry_feed_capacity);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let (root_tx, root_rx) = mpsc::channel(ROOT_FEED_CAPACITY);

        let acc = Self {
            store,
            acc_id,
            height,
            chains: HashMap::with_capacity(CHAIN_MAP_CAPACITY),
            previous,
            last_timestamp_ns,
            total_entries: 0,
            started: Instant::now(),
            entry_rx,
            entries_open: true,
            control_rx,
            root_tx,
        };
        let handles = AccHandles {
            entries: entry_tx,
            control: control_tx,
            roots: root_rx,
        };
        Ok((acc, handles))
    }

    /// Height the next sealed block will carry.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// This accumulator's identity.
    pub fn acc_id(&self) -> Hash256 {
        self.acc_id
    }

    /// Consume the coordinator, yielding its store.
    pub fn into_store(self) -> NodeStore<S> {
        self.store
    }

    /// Run the coordinator until the control channel closes.
    ///
    /// Blocks on the entry feed and the control channel together; a `true`
    /// control value seals the current block (possibly empty) and publishes
    /// its directory root. A closed entry feed stops ingestion but blocks
    /// are still sealed on demand until the control channel closes too.
    ///
    /// # Errors
    ///
    /// Store or height failures during a flush are fatal: the coordinator
    /// halts without advancing, leaving the last durable head authoritative.
    pub async fn run(&mut self) -> Result<(), TallyError> {
        loop {
            tokio::select! {
                ctl = self.control_rx.recv() => match ctl {
                    Some(true) => {
                        // Everything already enqueued on the feed belongs to
                        // this block; entries racing the signal may land in
                        // either.
                        self.drain_pending_entries();
                        let root = self.flush()?;
                        if self.root_tx.send(root).await.is_err() {
                            warn!(%root, "root feed closed; discarding directory root");
                        }
                    }
                    Some(false) => debug!("ignoring false control signal"),
                    None => {
                        info!("control channel closed, shutting down");
                        return Ok(());
                    }
                },
                entry = self.entry_rx.recv(), if self.entries_open => match entry {
                    Some(entry) => self.ingest(entry),
                    None => {
                        debug!("entry feed closed; awaiting final control signal");
                        self.entries_open = false;
                    }
                },
            }
        }
    }

    /// Ingest every entry already sitting in the feed, without waiting.
    fn drain_pending_entries(&mut self) {
        use mpsc::error::TryRecvError;
        loop {
            match self.entry_rx.try_recv() {
                Ok(entry) => self.ingest(entry),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.entries_open = false;
                    break;
                }
            }
        }
    }

    /// Route one entry to its chain, creating the chain accumulator on
    /// first sight within this block.
    fn ingest(&mut self, entry: EntryHash) {
        let chain = self
            .chains
            .entry(entry.chain_id)
            .or_insert_with(|| ChainAcc::new(entry.chain_id, self.height));
        chain.push(entry.entry_hash);
        self.total_entries += 1;
    }

    /// Seal the current block and return its directory root.
    ///
    /// Persists every live chain's leaf-list node, folds the per-chain
    /// commitments into a fresh Merkle DAG in ascending chain-ID order,
    /// persists the directory node, and moves the head pointer last so a
    /// crash mid-flush never publishes a half-written block.
    fn flush(&mut self) -> Result<Hash256, TallyError> {
        let next_height = self
            .height
            .checked_add(1)
            .ok_or(AccError::HeightOverflow(self.height))?;
        let timestamp_ns = self.next_timestamp();

        let chains = std::mem::replace(&mut self.chains, HashMap::with_capacity(CHAIN_MAP_CAPACITY));
        let chain_count = chains.len();
        let mut block_entries = 0usize;

        let mut rows = Vec::with_capacity(chain_count);
        for (_, chain) in chains {
            block_entries += chain.len();
            let node = chain.into_node(timestamp_ns);
            rows.push(DirectoryEntry {
                chain_id: node.chain_id,
                md_root: node.list_md_root,
            });
            self.store.put_node(&node)?;
        }

        // Canonical directory order: ascending by chain ID bytes. This, not
        // arrival order, defines the block commitment.
        rows.sort_by(|a, b| a.chain_id.cmp(&b.chain_id));

        let mut dir_md = MerkleDag::new();
        for row in &rows {
            dir_md.add(row.commitment());
        }
        let root = dir_md.root();

        let directory = Node {
            version: NODE_VERSION,
            chain_id: self.acc_id,
            block_height: self.height,
            sequence: self.height,
            timestamp_ns,
            previous: self.previous.unwrap_or(Hash256::ZERO),
            list_md_root: root,
            body: NodeBody::Directory(rows),
        };
        let dir_hash = self.store.put_node(&directory)?;
        self.store.set_head(&self.acc_id, &dir_hash)?;

        info!(
            height = self.height,
            chains = chain_count,
            entries = block_entries,
            total_entries = self.total_entries,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            %root,
            "sealed directory block"
        );

        self.previous = Some(dir_hash);
        self.height = next_height;
        Ok(root)
    }

    /// Wall-clock nanoseconds, clamped to never run backward across blocks.
    fn next_timestamp(&mut self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);
        let ts = now.max(self.last_timestamp_ns);
        self.last_timestamp_ns = ts;
        ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::error::{CodecError, StoreError};
    use tally_core::store::{MemoryStore, Namespace};

    fn h(byte: u8) -> Hash256 {
        Hash256([byte; 32])
    }

    // --- Initialization against the store ---

    #[test]
    fn fresh_store_starts_at_height_zero() {
        let (acc, _handles) =
            Accumulator::new(MemoryStore::new(), h(0xAC), &AccConfig::default()).unwrap();
        assert_eq!(acc.height(), 0);
        assert_eq!(acc.acc_id(), h(0xAC));
    }

    #[test]
    fn head_naming_missing_node_is_fatal() {
        let mut store = NodeStore::new(MemoryStore::new());
        store.set_head(&h(0xAC), &h(0x01)).unwrap();

        let err = Accumulator::new(store.into_inner(), h(0xAC), &AccConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, TallyError::Acc(AccError::MissingHeadNode(_))));
    }

    #[test]
    fn corrupt_head_node_surfaces_codec_error() {
        let mut inner = MemoryStore::new();
        inner
            .put(Namespace::Node, h(0x01).as_ref(), b"not a node")
            .unwrap();
        inner
            .put(Namespace::NodeHead, h(0xAC).as_ref(), h(0x01).as_ref())
            .unwrap();

        let err = Accumulator::new(inner, h(0xAC), &AccConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, TallyError::Codec(CodecError::Truncated { .. })));
    }

    #[test]
    fn malformed_head_cell_is_store_error() {
        let mut inner = MemoryStore::new();
        inner
            .put(Namespace::NodeHead, h(0xAC).as_ref(), b"way too short")
            .unwrap();

        let err = Accumulator::new(inner, h(0xAC), &AccConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, TallyError::Store(StoreError::InvalidHead(_))));
    }

    #[test]
    fn resume_continues_after_existing_head() {
        let mut store = NodeStore::new(MemoryStore::new());
        let head = Node {
            version: NODE_VERSION,
            chain_id: h(0xAC),
            block_height: 41,
            sequence: 41,
            timestamp_ns: 7,
            previous: Hash256::ZERO,
            list_md_root: Hash256::ZERO,
            body: NodeBody::Directory(vec![]),
        };
        let head_hash = store.put_node(&head).unwrap();
        store.set_head(&h(0xAC), &head_hash).unwrap();

        let (acc, _handles) =
            Accumulator::new(store.into_inner(), h(0xAC), &AccConfig::default()).unwrap();
        assert_eq!(acc.height(), 42);
    }

    #[test]
    fn resume_at_max_height_overflows() {
        let mut store = NodeStore::new(MemoryStore::new());
        let head = Node {
            version: NODE_VERSION,
            chain_id: h(0xAC),
            block_height: u64::MAX,
            sequence: u64::MAX,
            timestamp_ns: 7,
            previous: Hash256::ZERO,
            list_md_root: Hash256::ZERO,
            body: NodeBody::Directory(vec![]),
        };
        let head_hash = store.put_node(&head).unwrap();
        store.set_head(&h(0xAC), &head_hash).unwrap();

        let err = Accumulator::new(store.into_inner(), h(0xAC), &AccConfig::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            TallyError::Acc(AccError::HeightOverflow(u64::MAX))
        ));
    }
}
