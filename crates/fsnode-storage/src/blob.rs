//! Partitioned payload store
//!
//! Payloads live in `partitions` redb tables keyed by the 64-byte address.
//! The partition is `xxh64(address) % partitions`; its index, as two
//! big-endian bytes, is the location pointer recorded in the metabase.
//! Each record is a CRC32C of the payload followed by the payload itself.

use fsnode_common::Address;
use fsnode_common::checksum::compute_crc32c;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Size of the checksum prefix of every record
const CRC_SIZE: usize = 4;

/// Size of an encoded location pointer
pub const LOCATION_SIZE: usize = 2;

/// Error type for payload store operations
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("partition count must be non-zero")]
    NoPartitions,
    #[error("invalid location pointer: {0:02x?}")]
    InvalidLocation(Vec<u8>),
    #[error("payload of {address} is corrupted: {reason}")]
    Corrupted { address: Address, reason: String },
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
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::TransactionError> for BlobError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Payload store statistics
#[derive(Debug, Default)]
pub struct BlobStats {
    pub reads: AtomicU64,
    pub writes: AtomicU64,
    pub deletes: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
    pub checksum_errors: AtomicU64,
}

/// Full payloads of locally stored objects
pub struct BlobStore {
    db: Database,
    partitions: u16,
    stats: BlobStats,
}

impl BlobStore {
    /// Open (or create) the store with the given number of partitions.
    pub fn open(path: impl AsRef<Path>, partitions: u16) -> BlobResult<Self> {
        if partitions == 0 {
            return Err(BlobError::NoPartitions);
        }
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        for index in 0..partitions {
            let name = partition_name(index);
            let _t = write_txn.open_table(partition_table(&name))?;
        }
        write_txn.commit()?;

        debug!(path = %path.display(), partitions, "Opened blob store");
        Ok(Self {
            db,
            partitions,
            stats: BlobStats::default(),
        })
    }

    #[must_use]
    pub const fn partitions(&self) -> u16 {
        self.partitions
    }

    #[must_use]
    pub const fn stats(&self) -> &BlobStats {
        &self.stats
    }

    /// Partition the payload of `address` is written to
    #[must_use]
    pub fn partition_for(&self, address: &Address) -> u16 {
        let hash = xxhash_rust::xxh64::xxh64(&address.to_bytes(), 0);
        // The remainder is below `partitions`, which is a u16
        u16::try_from(hash % u64::from(self.partitions)).unwrap_or_default()
    }

    /// Store `payload`, returning the location pointer.
    ///
    /// Writing the same address twice overwrites the record in place.
    pub fn put(&self, address: &Address, payload: &[u8]) -> BlobResult<[u8; LOCATION_SIZE]> {
        let index = self.partition_for(address);
        let mut record = Vec::with_capacity(CRC_SIZE + payload.len());
        record.extend_from_slice(&compute_crc32c(payload).to_le_bytes());
        record.extend_from_slice(payload);

        let name = partition_name(index);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(partition_table(&name))?;
            table.insert(address.to_bytes().as_slice(), record.as_slice())?;
        }
        write_txn.commit()?;

        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_written
            .fetch_add(payload.len() as u64, Ordering::Relaxed);
        Ok(encode_location(index))
    }

    /// Payload of `address`, or `None` when it is not stored.
    ///
    /// `location` selects the partition; without one the hashed partition
    /// is used.
    pub fn get(&self, address: &Address, location: Option<&[u8]>) -> BlobResult<Option<Vec<u8>>> {
        let index = self.resolve(address, location)?;
        let name = partition_name(index);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(partition_table(&name))?;
        let Some(record) = table.get(address.to_bytes().as_slice())? else {
            return Ok(None);
        };
        let record = record.value();

        let Some((crc, payload)) = record.split_first_chunk::<CRC_SIZE>() else {
            return Err(self.corrupted(address, format!("record of {} bytes", record.len())));
        };
        let stored = u32::from_le_bytes(*crc);
        let computed = compute_crc32c(payload);
        if stored != computed {
            return Err(self.corrupted(
                address,
                format!("crc32c mismatch: stored={stored:08x}, computed={computed:08x}"),
            ));
        }

        self.stats.reads.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_read
            .fetch_add(payload.len() as u64, Ordering::Relaxed);
        Ok(Some(payload.to_vec()))
    }

    /// Drop the payload of `address`; `false` when none was stored
    pub fn delete(&self, address: &Address, location: Option<&[u8]>) -> BlobResult<bool> {
        let index = self.resolve(address, location)?;
        let name = partition_name(index);
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(partition_table(&name))?;
            table.remove(address.to_bytes().as_slice())?.is_some()
        };
        write_txn.commit()?;

        if removed {
            self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    /// Number of payloads held by each partition
    pub fn partition_sizes(&self) -> BlobResult<Vec<u64>> {
        let read_txn = self.db.begin_read()?;
        (0..self.partitions)
            .map(|index| {
                let name = partition_name(index);
                let table = read_txn.open_table(partition_table(&name))?;
                Ok(table.len()?)
            })
            .collect()
    }

    fn resolve(&self, address: &Address, location: Option<&[u8]>) -> BlobResult<u16> {
        match location {
            Some(loc) => {
                let index = decode_location(loc)?;
                if index >= self.partitions {
                    return Err(BlobError::InvalidLocation(loc.to_vec()));
                }
                Ok(index)
            }
            None => Ok(self.partition_for(address)),
        }
    }

    fn corrupted(&self, address: &Address, reason: String) -> BlobError {
        self.stats.checksum_errors.fetch_add(1, Ordering::Relaxed);
        warn!(%address, %reason, "Corrupted payload record");
        BlobError::Corrupted {
            address: *address,
            reason,
        }
    }
}

fn partition_name(index: u16) -> String {
    format!("partition-{index:04}")
}

fn partition_table(name: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(name)
}

#[must_use]
pub const fn encode_location(index: u16) -> [u8; LOCATION_SIZE] {
    index.to_be_bytes()
}

pub fn decode_location(location: &[u8]) -> BlobResult<u16> {
    location
        .try_into()
        .map(u16::from_be_bytes)
        .map_err(|_| BlobError::InvalidLocation(location.to_vec()))
}
