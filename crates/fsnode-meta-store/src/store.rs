//! Metabase handle, error type and low-level table helpers.
//!
//! Every public operation runs in a single redb transaction: reads see one
//! consistent snapshot, and all keys written by one Put, Delete or Inhume
//! become visible together. redb serializes write transactions, so
//! concurrent deletes never race on a parent's reference count.

use crate::keys;
use crate::tables::METABASE;
use fsnode_common::{Address, ContainerId, Error, SplitInfo};
use redb::{Database, ReadableTable};
use std::path::Path;
use tracing::debug;

/// Error type for metabase operations
#[derive(Debug, thiserror::Error)]
pub enum MetabaseError {
    #[error("object not found: {0}")]
    NotFound(Address),
    #[error("object already removed: {0}")]
    AlreadyRemoved(Address),
    #[error("object is virtual: {0}")]
    SplitInfo(Box<SplitInfo>),
    #[error("container not found: {0}")]
    ContainerNotFound(ContainerId),
    #[error("corrupted index entry: {0}")]
    Corrupted(String),
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for MetabaseError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl MetabaseError {
    #[must_use]
    pub fn split_info(info: SplitInfo) -> Self {
        Self::SplitInfo(Box::new(info))
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ContainerNotFound(_))
    }

    /// Convert into the shared taxonomy, wrapping store failures with the
    /// operation and address they occurred on
    pub fn context(self, op: &'static str, address: impl ToString) -> Error {
        match self {
            Self::NotFound(a) => Error::ObjectNotFound(a),
            Self::AlreadyRemoved(a) => Error::AlreadyRemoved(a),
            Self::SplitInfo(si) => Error::SplitInfo(si),
            Self::ContainerNotFound(cid) => Error::ContainerNotFound(cid),
            other => Error::storage(op, address, other),
        }
    }
}

impl From<MetabaseError> for Error {
    fn from(e: MetabaseError) -> Self {
        e.context("metabase", "-")
    }
}

pub type MetabaseResult<T> = Result<T, MetabaseError>;

/// Writable view of the metabase table inside a write transaction
pub(crate) type KvTable<'txn> = redb::Table<'txn, &'static [u8], &'static [u8]>;

/// Secondary-index engine over one node's local object set
pub struct Metabase {
    db: Database,
}

impl Metabase {
    /// Open (or create) the metabase at the given path.
    pub fn open(path: impl AsRef<Path>) -> MetabaseResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create the table eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(METABASE)?;
        }
        write_txn.commit()?;

        debug!(path = %path.display(), "Opened metabase");
        Ok(Self { db })
    }

    /// Run `f` against a read-only snapshot
    pub(crate) fn read<T>(
        &self,
        f: impl FnOnce(&redb::ReadOnlyTable<&'static [u8], &'static [u8]>) -> MetabaseResult<T>,
    ) -> MetabaseResult<T> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(METABASE)?;
        f(&table)
    }

    /// Run `f` in a write transaction, committing only when it succeeds
    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&mut KvTable<'_>) -> MetabaseResult<T>,
    ) -> MetabaseResult<T> {
        let write_txn = self.db.begin_write()?;
        let result = {
            let mut table = write_txn.open_table(METABASE)?;
            f(&mut table)
        };
        match result {
            Ok(value) => {
                write_txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                write_txn.abort()?;
                Err(e)
            }
        }
    }
}

// ---- Generic helpers ----

pub(crate) fn get_value<T>(table: &T, key: &[u8]) -> MetabaseResult<Option<Vec<u8>>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    Ok(table.get(key)?.map(|v| v.value().to_vec()))
}

pub(crate) fn has_key<T>(table: &T, key: &[u8]) -> MetabaseResult<bool>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    Ok(table.get(key)?.is_some())
}

/// Visit every entry whose key starts with `prefix`, in key order.
/// The visitor returns `true` to stop.
pub(crate) fn scan_prefix<T, F>(table: &T, prefix: &[u8], mut visit: F) -> MetabaseResult<()>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
    F: FnMut(&[u8], &[u8]) -> MetabaseResult<bool>,
{
    for entry in table.range::<&[u8]>(prefix..)? {
        let (k, v) = entry?;
        let key = k.value();
        if !key.starts_with(prefix) {
            break;
        }
        if visit(key, v.value())? {
            break;
        }
    }
    Ok(())
}

/// First key at or after `from`
pub(crate) fn seek<T>(table: &T, from: &[u8]) -> MetabaseResult<Option<Vec<u8>>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    match table.range::<&[u8]>(from..)?.next() {
        Some(entry) => Ok(Some(entry?.0.value().to_vec())),
        None => Ok(None),
    }
}

pub(crate) fn read_id_list<T>(table: &T, key: &[u8]) -> MetabaseResult<Vec<fsnode_common::ObjectId>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    get_value(table, key)?.map_or_else(|| Ok(Vec::new()), |data| keys::decode_id_list(&data))
}

pub(crate) fn put_value(table: &mut KvTable<'_>, key: &[u8], value: &[u8]) -> MetabaseResult<()> {
    table.insert(key, value)?;
    Ok(())
}

pub(crate) fn remove_key(table: &mut KvTable<'_>, key: &[u8]) -> MetabaseResult<()> {
    table.remove(key)?;
    Ok(())
}
