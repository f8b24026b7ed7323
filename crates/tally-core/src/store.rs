//! Key/value store interface and the typed node-store façade.
//!
//! The accumulator persists through two logical namespaces:
//!
//! - [`Namespace::Node`] — content-addressed node records, keyed by
//!   [`Node::hash`]. Writes are idempotent: the same key always carries the
//!   same bytes.
//! - [`Namespace::NodeHead`] — one mutable cell per accumulator identity,
//!   naming the most recently written directory node. Overwritten on every
//!   flush, always last.
//!
//! [`MemoryStore`] is suitable for tests; the production accumulator uses
//! RocksDB (tally-acc).

use std::collections::HashMap;

use crate::error::{StoreError, TallyError};
use crate::node::Node;
use crate::types::Hash256;

/// Logical key space within the substrate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Content-addressed node records.
    Node,
    /// Head pointer cells, keyed by accumulator identity.
    NodeHead,
}

/// Byte-addressable key/value substrate.
///
/// Absence on `get` is not an error. Implementations handle their own
/// retry policy below this interface; an `Err` here is a hard fault.
pub trait KvStore: Send {
    /// Write a value. Overwrites any previous value under the key.
    fn put(&mut self, ns: Namespace, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Read a value. Returns `None` when the key is absent.
    fn get(&self, ns: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Typed façade over a [`KvStore`] for node records and head pointers.
#[derive(Clone, Debug)]
pub struct NodeStore<S> {
    inner: S,
}

impl<S: KvStore> NodeStore<S> {
    /// Wrap a substrate.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Unwrap the substrate.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Persist a node under its content hash and return that hash.
    pub fn put_node(&mut self, node: &Node) -> Result<Hash256, StoreError> {
        let hash = node.hash();
        self.inner
            .put(Namespace::Node, hash.as_ref(), &node.encode())?;
        Ok(hash)
    }

    /// Fetch and decode a node by content hash.
    ///
    /// Absence yields `Ok(None)`; a present-but-undecodable record is a
    /// [`TallyError::Codec`], which callers treat as corruption.
    pub fn node(&self, hash: &Hash256) -> Result<Option<Node>, TallyError> {
        match self.inner.get(Namespace::Node, hash.as_ref())? {
            Some(bytes) => Ok(Some(Node::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Read the head pointer for an accumulator identity.
    pub fn head(&self, chain_id: &Hash256) -> Result<Option<Hash256>, StoreError> {
        match self.inner.get(Namespace::NodeHead, chain_id.as_ref())? {
            Some(bytes) => {
                let arr: [u8; 32] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::InvalidHead(bytes.len()))?;
                Ok(Some(Hash256(arr)))
            }
            None => Ok(None),
        }
    }

    /// Point the head cell at a directory node. Called last in a flush.
    pub fn set_head(&mut self, chain_id: &Hash256, node_hash: &Hash256) -> Result<(), StoreError> {
        self.inner
            .put(Namespace::NodeHead, chain_id.as_ref(), node_hash.as_ref())
    }
}

/// In-memory store for testing.
///
/// Plain `HashMap`s, no persistence, no crash recovery.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    nodes: HashMap<Vec<u8>, Vec<u8>>,
    heads: HashMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of node records held.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn map(&self, ns: Namespace) -> &HashMap<Vec<u8>, Vec<u8>> {
        match ns {
            Namespace::Node => &self.nodes,
            Namespace::NodeHead => &self.heads,
        }
    }
}

impl KvStore for MemoryStore {
    fn put(&mut self, ns: Namespace, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let map = match ns {
            Namespace::Node => &mut self.nodes,
            Namespace::NodeHead => &mut self.heads,
        };
        map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, ns: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.map(ns).get(key).cloned())
    }
}
