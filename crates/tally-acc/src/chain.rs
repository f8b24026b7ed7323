//! Per-chain accumulation within a single block.

use tally_core::constants::NODE_VERSION;
use tally_core::merkle_dag::MerkleDag;
use tally_core::node::{Node, NodeBody};
use tally_core::types::Hash256;

/// Accumulates one chain's entries for the current block.
///
/// Created lazily on the first entry seen for a chain and consumed at
/// flush, when [`into_node`](Self::into_node) seals the collected leaves
/// into a leaf-list node.
#[derive(Clone, Debug)]
pub struct ChainAcc {
    chain_id: Hash256,
    block_height: u64,
    md: MerkleDag,
}

impl ChainAcc {
    /// Start accumulating a chain at the given block height.
    pub fn new(chain_id: Hash256, block_height: u64) -> Self {
        Self {
            chain_id,
            block_height,
            md: MerkleDag::new(),
        }
    }

    /// Append an entry hash in arrival order.
    pub fn push(&mut self, entry_hash: Hash256) {
        self.md.add(entry_hash);
    }

    /// Number of entries collected so far.
    pub fn len(&self) -> usize {
        self.md.len()
    }

    /// Whether no entries have been collected.
    pub fn is_empty(&self) -> bool {
        self.md.is_empty()
    }

    /// Seal into a leaf-list node carrying the flush timestamp.
    ///
    /// Leaf-list series are not chained, so `previous` is zero and
    /// `sequence` is zero.
    pub fn into_node(self, timestamp_ns: i64) -> Node {
        let list_md_root = self.md.root();
        Node {
            version: NODE_VERSION,
            chain_id: self.chain_id,
            block_height: self.block_height,
            sequence: 0,
            timestamp_ns,
            previous: Hash256::ZERO,
            list_md_root,
            body: NodeBody::Leaves(self.md.into_leaves()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::merkle_dag::pair_hash;

    fn h(byte: u8) -> Hash256 {
        Hash256([byte; 32])
    }

    #[test]
    fn seals_leaves_in_arrival_order() {
        let mut chain = ChainAcc::new(h(0xC1), 4);
        chain.push(h(1));
        chain.push(h(2));
        chain.push(h(3));
        assert_eq!(chain.len(), 3);

        let node = chain.into_node(99);
        assert_eq!(node.chain_id, h(0xC1));
        assert_eq!(node.block_height, 4);
        assert_eq!(node.sequence, 0);
        assert_eq!(node.timestamp_ns, 99);
        assert_eq!(node.previous, Hash256::ZERO);
        assert!(!node.is_directory());
        assert_eq!(node.body, NodeBody::Leaves(vec![h(1), h(2), h(3)]));
    }

    #[test]
    fn root_matches_streamed_merkle_dag() {
        let mut chain = ChainAcc::new(h(0xC1), 0);
        chain.push(h(1));
        chain.push(h(2));
        chain.push(h(3));

        let node = chain.into_node(0);
        let expected = pair_hash(&pair_hash(&h(1), &h(2)), &h(3));
        assert_eq!(node.list_md_root, expected);
    }

    #[test]
    fn empty_chain_seals_to_zero_root() {
        let chain = ChainAcc::new(h(0xC1), 0);
        assert!(chain.is_empty());
        let node = chain.into_node(0);
        assert_eq!(node.list_md_root, Hash256::ZERO);
        assert_eq!(node.body, NodeBody::Leaves(vec![]));
    }

    #[test]
    fn single_entry_root_is_the_entry() {
        let mut chain = ChainAcc::new(h(0xC1), 0);
        chain.push(h(0xE1));
        let node = chain.into_node(0);
        assert_eq!(node.list_md_root, h(0xE1));
    }
}
