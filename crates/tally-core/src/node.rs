//! Persisted node records and their binary codec.
//!
//! A [`Node`] is either a per-chain **leaf-list node** (the ordered entry
//! hashes one chain collected during one block) or a per-block **directory
//! node** (the sorted per-chain commitments for the whole block). Nodes are
//! written once at flush and never mutated; the directory series forms a
//! hash-linked chain through `previous`.
//!
//! The encoding is an explicit fixed layout (header fields in declaration
//! order, little-endian integers, then a u32 entry count and raw entries)
//! so that [`Node::hash`] is stable across platforms and releases.

use sha2::{Digest, Sha256};

use crate::constants::NODE_HEADER_LEN;
use crate::error::CodecError;
use crate::merkle_dag::pair_hash;
use crate::types::Hash256;

/// Wire flag for a leaf-list node.
const FLAG_LEAF_LIST: u8 = 0;
/// Wire flag for a directory node.
const FLAG_DIRECTORY: u8 = 1;

/// One row of a directory node: a chain and its Merkle root for the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Chain the row describes.
    pub chain_id: Hash256,
    /// Root of that chain's leaf-list Merkle DAG for the block.
    pub md_root: Hash256,
}

impl DirectoryEntry {
    /// The leaf this row contributes to the directory Merkle DAG:
    /// `H(chain_id || md_root)`, binding the label into the commitment.
    pub fn commitment(&self) -> Hash256 {
        pair_hash(&self.chain_id, &self.md_root)
    }
}

/// Variable part of a node record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeBody {
    /// Ordered entry hashes of one chain in one block.
    Leaves(Vec<Hash256>),
    /// Per-chain commitments, strictly ascending by chain ID.
    Directory(Vec<DirectoryEntry>),
}

/// A persisted node record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    /// Record format version.
    pub version: u16,
    /// For leaf-list nodes, the chain; for directory nodes, the
    /// accumulator's identity.
    pub chain_id: Hash256,
    /// Block the node was sealed in.
    pub block_height: u64,
    /// Position in this node's series. Equals `block_height` for directory
    /// nodes; leaf-list series are not tracked and carry zero.
    pub sequence: u64,
    /// Wall-clock nanoseconds at flush, non-decreasing across blocks.
    pub timestamp_ns: i64,
    /// Hash of the prior node in this series, zero if none.
    pub previous: Hash256,
    /// Merkle DAG root over this node's body.
    pub list_md_root: Hash256,
    /// The committed contents.
    pub body: NodeBody,
}

impl Node {
    /// Whether this is a directory node.
    pub fn is_directory(&self) -> bool {
        matches!(self.body, NodeBody::Directory(_))
    }

    /// Serialize to the fixed binary layout. Infallible.
    pub fn encode(&self) -> Vec<u8> {
        let (flag, count, entry_len) = match &self.body {
            NodeBody::Leaves(leaves) => (FLAG_LEAF_LIST, leaves.len(), 32),
            NodeBody::Directory(entries) => (FLAG_DIRECTORY, entries.len(), 64),
        };

        let mut out = Vec::with_capacity(NODE_HEADER_LEN + 4 + count * entry_len);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(self.chain_id.as_bytes());
        out.extend_from_slice(&self.block_height.to_le_bytes());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.extend_from_slice(&self.timestamp_ns.to_le_bytes());
        out.extend_from_slice(self.previous.as_bytes());
        out.push(flag);
        out.extend_from_slice(self.list_md_root.as_bytes());
        out.extend_from_slice(&(count as u32).to_le_bytes());

        match &self.body {
            NodeBody::Leaves(leaves) => {
                for leaf in leaves {
                    out.extend_from_slice(leaf.as_bytes());
                }
            }
            NodeBody::Directory(entries) => {
                for entry in entries {
                    out.extend_from_slice(entry.chain_id.as_bytes());
                    out.extend_from_slice(entry.md_root.as_bytes());
                }
            }
        }
        out
    }

    /// Parse a node from its binary layout.
    ///
    /// # Errors
    ///
    /// [`CodecError`] on truncated input, an unknown node flag, an entry
    /// count larger than the remaining input, or trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader { buf: bytes, pos: 0 };

        let version = r.u16()?;
        let chain_id = r.hash()?;
        let block_height = r.u64()?;
        let sequence = r.u64()?;
        let timestamp_ns = r.i64()?;
        let previous = r.hash()?;
        let flag = r.u8()?;
        let list_md_root = r.hash()?;
        let count = r.u32()?;

        let entry_len = match flag {
            FLAG_LEAF_LIST => 32usize,
            FLAG_DIRECTORY => 64,
            other => return Err(CodecError::InvalidNodeFlag(other)),
        };
        let remaining = bytes.len() - r.pos;
        if (count as usize).checked_mul(entry_len).map_or(true, |n| n > remaining) {
            return Err(CodecError::EntryCountOverflow {
                count,
                have: remaining,
            });
        }

        let body = match flag {
            FLAG_LEAF_LIST => {
                let mut leaves = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    leaves.push(r.hash()?);
                }
                NodeBody::Leaves(leaves)
            }
            _ => {
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let chain_id = r.hash()?;
                    let md_root = r.hash()?;
                    entries.push(DirectoryEntry { chain_id, md_root });
                }
                NodeBody::Directory(entries)
            }
        };

        if r.pos != bytes.len() {
            return Err(CodecError::TrailingBytes(bytes.len() - r.pos));
        }

        Ok(Self {
            version,
            chain_id,
            block_height,
            sequence,
            timestamp_ns,
            previous,
            list_md_root,
            body,
        })
    }

    /// Content hash: SHA-256 over the full serialization.
    pub fn hash(&self) -> Hash256 {
        Hash256(Sha256::digest(self.encode()).into())
    }
}

/// Bounds-checked sequential reader over the input buffer.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(CodecError::Truncated {
                need: end,
                have: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn hash(&mut self) -> Result<Hash256, CodecError> {
        Ok(Hash256(self.take(32)?.try_into().unwrap()))
    }
}
