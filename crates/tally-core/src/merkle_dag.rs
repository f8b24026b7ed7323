//! Online SHA-256 Merkle DAG accumulator.
//!
//! Streams leaves in and maintains only a per-level frontier of pending
//! subtree roots, so memory for the tree structure is O(log N) while the
//! ordered leaf list is retained for persistence. The root folds the
//! occupied frontier entries from the lowest level upward.
//!
//! Leaves enter the tree as-is (no leaf prefix): an accumulator holding a
//! single leaf has that leaf as its root, and an empty accumulator has
//! [`Hash256::ZERO`].

use sha2::{Digest, Sha256};

use crate::types::Hash256;

/// Combine two digests: `SHA-256(left || right)` over the 64-byte
/// concatenation.
pub fn pair_hash(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Hash256(hasher.finalize().into())
}

/// Online binary Merkle accumulator.
///
/// `frontier[k]`, when occupied, is the root of a complete subtree covering
/// `2^k` consecutive leaves that has not yet been merged into a larger
/// subtree. Adding a leaf carries it upward, merging with each occupied
/// level, until it lands in an empty slot; amortized O(1) per leaf.
#[derive(Clone, Debug, Default)]
pub struct MerkleDag {
    /// Every leaf ever added, in arrival order.
    leaves: Vec<Hash256>,
    /// Pending subtree root per tree level.
    frontier: Vec<Option<Hash256>>,
}

impl MerkleDag {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a leaf, merging completed subtrees up the frontier.
    pub fn add(&mut self, leaf: Hash256) {
        self.leaves.push(leaf);

        let mut cur = leaf;
        for slot in self.frontier.iter_mut() {
            match slot.take() {
                Some(left) => cur = pair_hash(&left, &cur),
                None => {
                    *slot = Some(cur);
                    return;
                }
            }
        }
        self.frontier.push(Some(cur));
    }

    /// Current root: the fold of all occupied frontier entries, lowest level
    /// first, each higher level hashed as `H(higher || acc)`.
    ///
    /// Does not mutate the frontier; safe to call repeatedly and between
    /// adds. Returns [`Hash256::ZERO`] when no leaves have been added.
    pub fn root(&self) -> Hash256 {
        let mut acc: Option<Hash256> = None;
        for pending in self.frontier.iter().flatten() {
            acc = Some(match acc {
                None => *pending,
                Some(lower) => pair_hash(pending, &lower),
            });
        }
        acc.unwrap_or(Hash256::ZERO)
    }

    /// The ordered leaf list.
    pub fn leaves(&self) -> &[Hash256] {
        &self.leaves
    }

    /// Consume the accumulator, yielding the ordered leaf list.
    pub fn into_leaves(self) -> Vec<Hash256> {
        self.leaves
    }

    /// Number of leaves added so far.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether no leaves have been added.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn h(byte: u8) -> Hash256 {
        Hash256([byte; 32])
    }

    fn dag_of(leaves: &[Hash256]) -> MerkleDag {
        let mut md = MerkleDag::new();
        for leaf in leaves {
            md.add(*leaf);
        }
        md
    }

    /// Reference root computation working from the binary decomposition of
    /// the leaf count: each 1-bit of `n` (highest first) claims a perfect
    /// subtree reduced pairwise, then the subtree roots fold lowest-first.
    fn reference_root(leaves: &[Hash256]) -> Hash256 {
        if leaves.is_empty() {
            return Hash256::ZERO;
        }

        let mut subtree_roots = Vec::new();
        let mut rest = leaves;
        while !rest.is_empty() {
            let size = 1usize << (usize::BITS - 1 - rest.len().leading_zeros());
            let (head, tail) = rest.split_at(size);
            let mut layer = head.to_vec();
            while layer.len() > 1 {
                layer = layer
                    .chunks(2)
                    .map(|pair| pair_hash(&pair[0], &pair[1]))
                    .collect();
            }
            subtree_roots.push(layer[0]);
            rest = tail;
        }

        // Highest subtree first in the vec; fold from the lowest.
        let mut acc = *subtree_roots.last().unwrap();
        for higher in subtree_roots.iter().rev().skip(1) {
            acc = pair_hash(higher, &acc);
        }
        acc
    }

    // --- pair_hash ---

    #[test]
    fn pair_hash_deterministic() {
        assert_eq!(pair_hash(&h(1), &h(2)), pair_hash(&h(1), &h(2)));
    }

    #[test]
    fn pair_hash_order_matters() {
        assert_ne!(pair_hash(&h(1), &h(2)), pair_hash(&h(2), &h(1)));
    }

    // --- Edge cases ---

    #[test]
    fn empty_root_is_zero() {
        let md = MerkleDag::new();
        assert_eq!(md.root(), Hash256::ZERO);
        assert!(md.is_empty());
        assert_eq!(md.len(), 0);
    }

    #[test]
    fn single_leaf_root_is_the_leaf() {
        let md = dag_of(&[h(0xAA)]);
        assert_eq!(md.root(), h(0xAA));
    }

    #[test]
    fn two_leaves() {
        let md = dag_of(&[h(1), h(2)]);
        assert_eq!(md.root(), pair_hash(&h(1), &h(2)));
    }

    #[test]
    fn three_leaves_folds_odd_leaf_last() {
        // Level 1 holds H(l1||l2), level 0 holds l3; root = H(level1 || l3).
        let md = dag_of(&[h(1), h(2), h(3)]);
        let expected = pair_hash(&pair_hash(&h(1), &h(2)), &h(3));
        assert_eq!(md.root(), expected);
    }

    #[test]
    fn four_leaves_balanced() {
        let md = dag_of(&[h(1), h(2), h(3), h(4)]);
        let expected = pair_hash(&pair_hash(&h(1), &h(2)), &pair_hash(&h(3), &h(4)));
        assert_eq!(md.root(), expected);
    }

    #[test]
    fn matches_reference_for_small_counts() {
        for count in 0..=33usize {
            let leaves: Vec<Hash256> = (0..count).map(|i| h(i as u8)).collect();
            let md = dag_of(&leaves);
            assert_eq!(
                md.root(),
                reference_root(&leaves),
                "mismatch at count={count}"
            );
        }
    }

    // --- Root is non-mutating ---

    #[test]
    fn root_is_repeatable_between_adds() {
        let mut md = MerkleDag::new();
        for i in 0..7 {
            md.add(h(i));
            let first = md.root();
            assert_eq!(md.root(), first);
        }
        // Interleaved root calls must not change the final answer.
        let plain = dag_of(&(0..7).map(h).collect::<Vec<_>>());
        assert_eq!(md.root(), plain.root());
    }

    // --- Leaf list ---

    #[test]
    fn leaves_preserve_arrival_order() {
        let input = vec![h(9), h(3), h(7), h(3)];
        let md = dag_of(&input);
        assert_eq!(md.leaves(), input.as_slice());
        assert_eq!(md.len(), 4);
    }

    #[test]
    fn duplicate_leaves_are_kept() {
        let md = dag_of(&[h(5), h(5)]);
        assert_eq!(md.len(), 2);
        assert_eq!(md.root(), pair_hash(&h(5), &h(5)));
    }

    // --- Determinism / order sensitivity ---

    #[test]
    fn same_leaves_same_root() {
        let leaves: Vec<Hash256> = (0..20).map(h).collect();
        assert_eq!(dag_of(&leaves).root(), dag_of(&leaves).root());
    }

    #[test]
    fn different_order_different_root() {
        let a = dag_of(&[h(1), h(2), h(3)]);
        let b = dag_of(&[h(2), h(1), h(3)]);
        assert_ne!(a.root(), b.root());
    }

    proptest! {
        #[test]
        fn prop_root_matches_reference(seeds in proptest::collection::vec(any::<u8>(), 0..64)) {
            let leaves: Vec<Hash256> = seeds.iter().map(|s| h(*s)).collect();
            prop_assert_eq!(dag_of(&leaves).root(), reference_root(&leaves));
        }

        #[test]
        fn prop_append_changes_root(seeds in proptest::collection::vec(any::<u8>(), 1..32), extra: u8) {
            let leaves: Vec<Hash256> = seeds.iter().map(|s| h(*s)).collect();
            let before = dag_of(&leaves).root();
            let mut md = dag_of(&leaves);
            md.add(h(extra));
            prop_assert_ne!(before, md.root());
        }
    }
}
