//! RocksDB-backed persistent node storage.
//!
//! Implements [`KvStore`] using RocksDB column families for the two store
//! namespaces: content-addressed node records and head pointer cells.

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, Options, DB};

use tally_core::error::StoreError;
use tally_core::store::{KvStore, Namespace};

// --- Column family names ---

const CF_NODES: &str = "nodes";
const CF_NODE_HEAD: &str = "node_head";

/// All column family names.
const ALL_CFS: &[&str] = &[CF_NODES, CF_NODE_HEAD];

/// RocksDB-backed persistent node storage.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path.
    ///
    /// Creates both column families if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { db })
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// Get a column family handle.
    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Backend(format!("missing column family: {name}")))
    }

    /// Column family name for a namespace.
    fn cf_name(ns: Namespace) -> &'static str {
        match ns {
            Namespace::Node => CF_NODES,
            Namespace::NodeHead => CF_NODE_HEAD,
        }
    }
}

impl KvStore for RocksStore {
    fn put(&mut self, ns: Namespace, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let cf = self.cf_handle(Self::cf_name(ns))?;
        self.db
            .put_cf(cf, key, value)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn get(&self, ns: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let cf = self.cf_handle(Self::cf_name(ns))?;
        self.db
            .get_cf(cf, key)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
