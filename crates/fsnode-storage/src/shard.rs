//! Local shard: one metabase and one payload store.

use crate::blob::{BlobError, BlobStore};
use fsnode_common::{Address, Config, ContainerId, Error, Object, Range, Result};
use fsnode_meta_store::{GraveyardEntry, Metabase, SearchFilters};
use tracing::{debug, info, warn};

/// Objects stored on this node
pub struct Shard {
    metabase: Metabase,
    blobs: BlobStore,
}

impl Shard {
    /// Open the shard described by `config`, creating missing files.
    pub fn open(config: &Config) -> Result<Self> {
        let metabase_path = config.metabase_path();
        let metabase = Metabase::open(&metabase_path)
            .map_err(|e| e.context("open", metabase_path.display()))?;
        let blob_path = config.blob_path();
        let blobs = BlobStore::open(&blob_path, config.blob.partitions)
            .map_err(|e| blob_error("open", blob_path.display(), e))?;

        info!(
            data_dir = %config.node.data_dir.display(),
            partitions = config.blob.partitions,
            "Opened shard"
        );
        Ok(Self { metabase, blobs })
    }

    #[must_use]
    pub const fn metabase(&self) -> &Metabase {
        &self.metabase
    }

    #[must_use]
    pub const fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Store `obj` with its payload.
    ///
    /// Storing an object twice has no further effect. Buried addresses are
    /// rejected with `AlreadyRemoved`.
    pub fn put(&self, obj: &Object) -> Result<()> {
        let address = obj.address();
        let payload = obj.payload.as_deref().unwrap_or_default();
        if payload.len() as u64 != obj.payload_length() {
            return Err(Error::invalid_argument(format!(
                "payload of {address} has {} bytes, header declares {}",
                payload.len(),
                obj.payload_length()
            )));
        }
        if self
            .metabase
            .is_buried(&address)
            .map_err(|e| e.context("put", address))?
        {
            return Err(Error::AlreadyRemoved(address));
        }

        let location = self
            .blobs
            .put(&address, payload)
            .map_err(|e| blob_error("put", address, e))?;
        if let Err(e) = self.metabase.put(obj, Some(&location), None) {
            self.drop_unindexed_blob(&address, &location);
            return Err(e.context("put", address));
        }
        debug!(%address, size = payload.len(), "Stored object");
        Ok(())
    }

    /// Remove a payload no metabase record points to
    fn drop_unindexed_blob(&self, address: &Address, location: &[u8]) {
        match self.metabase.location(address) {
            Ok(None) => {
                if let Err(e) = self.blobs.delete(address, Some(location)) {
                    warn!(%address, error = %e, "Failed to drop unindexed payload");
                }
            }
            Ok(Some(_)) => {}
            Err(e) => warn!(%address, error = %e, "Cannot check payload index"),
        }
    }

    /// Full object stored at `address`.
    ///
    /// Virtual objects fail with the `SplitInfo` condition.
    pub fn get(&self, address: &Address) -> Result<Object> {
        let mut obj = self.head(address, true)?;
        let payload = self.payload(address, "get")?;
        if !obj.header.payload_hash.verify(&payload) {
            warn!(%address, "Payload hash mismatch");
            return Err(Error::ChecksumMismatch {
                expected: obj.header.payload_hash.to_hex(),
                actual: hex_sha256(&payload),
            });
        }
        obj.payload = Some(payload);
        Ok(obj)
    }

    /// Header of the object at `address`.
    ///
    /// Non-raw lookups of a virtual object return its logical header.
    pub fn head(&self, address: &Address, raw: bool) -> Result<Object> {
        self.metabase
            .get(address, raw)
            .map_err(|e| e.context("head", address))
    }

    /// Bytes `range` of the payload stored at `address`
    pub fn get_range(&self, address: &Address, range: &Range) -> Result<Vec<u8>> {
        let header = self.head(address, true)?;
        let size = header.payload_length();
        if !range.fits(size) {
            return Err(Error::RangeOutOfBounds {
                offset: range.offset,
                length: range.length,
                size,
            });
        }
        let payload = self.payload(address, "range")?;
        range
            .slice(&payload)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::storage("range", address, "stored payload is shorter than its header"))
    }

    /// Whether the object at `address` is stored
    pub fn exists(&self, address: &Address) -> Result<bool> {
        self.metabase
            .exists(address)
            .map_err(|e| e.context("exists", address))
    }

    /// Remove objects together with their payloads
    pub fn delete(&self, addresses: &[Address]) -> Result<()> {
        let mut locations = Vec::with_capacity(addresses.len());
        for address in addresses {
            let location = self
                .metabase
                .location(address)
                .map_err(|e| e.context("delete", address))?;
            locations.push((*address, location));
        }

        self.metabase
            .delete(addresses)
            .map_err(|e| e.context("delete", addresses.len()))?;

        for (address, location) in locations {
            if location.is_none() {
                continue;
            }
            self.blobs
                .delete(&address, location.as_deref())
                .map_err(|e| blob_error("delete", address, e))?;
        }
        Ok(())
    }

    /// Bury `addresses`; payloads stay until the addresses are deleted
    pub fn inhume(&self, tombstone: Option<&Address>, addresses: &[Address]) -> Result<()> {
        self.metabase
            .inhume(tombstone, addresses)
            .map_err(|e| e.context("inhume", addresses.len()))
    }

    pub fn graveyard(&self) -> Result<Vec<GraveyardEntry>> {
        self.metabase
            .graveyard()
            .map_err(|e| e.context("graveyard", "-"))
    }

    pub fn select(&self, cid: &ContainerId, filters: &SearchFilters) -> Result<Vec<Address>> {
        self.metabase
            .select(cid, filters)
            .map_err(|e| e.context("select", cid))
    }

    pub fn containers(&self) -> Result<Vec<ContainerId>> {
        self.metabase
            .containers()
            .map_err(|e| e.context("containers", "-"))
    }

    pub fn container_size(&self, cid: &ContainerId) -> Result<u64> {
        self.metabase
            .container_size(cid)
            .map_err(|e| e.context("container_size", cid))
    }

    fn payload(&self, address: &Address, op: &'static str) -> Result<Vec<u8>> {
        let location = self
            .metabase
            .location(address)
            .map_err(|e| e.context(op, address))?;
        self.blobs
            .get(address, location.as_deref())
            .map_err(|e| blob_error(op, address, e))?
            .ok_or_else(|| Error::storage(op, address, "payload missing"))
    }
}

fn blob_error(op: &'static str, address: impl ToString, e: BlobError) -> Error {
    match e {
        BlobError::Io(io) => Error::DiskIo(io),
        other => Error::storage(op, address, other),
    }
}

fn hex_sha256(data: &[u8]) -> String {
    fsnode_common::Checksum::sha256(data).to_hex()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsnode_common::{ObjectType, OwnerId, SplitId};
    use fsnode_meta_store::Filter;
    use tempfile::TempDir;

    fn open() -> (TempDir, Shard) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.node.data_dir = dir.path().to_path_buf();
        config.blob.partitions = 3;
        let shard = Shard::open(&config).unwrap();
        (dir, shard)
    }

    fn object(cid: ContainerId, payload: &[u8]) -> Object {
        Object::new(cid, OwnerId::new(rand::random()), ObjectType::Regular)
            .with_payload(payload.to_vec())
    }

    #[test]
    fn test_put_get_head() {
        let (_dir, shard) = open();
        let cid = ContainerId::new(rand::random());
        let obj = object(cid, b"some payload").with_attribute("Name", "file");

        shard.put(&obj).unwrap();
        shard.put(&obj).unwrap();

        assert_eq!(shard.get(&obj.address()).unwrap(), obj);
        assert_eq!(shard.head(&obj.address(), false).unwrap(), obj.cut_payload());
        assert_eq!(shard.container_size(&cid).unwrap(), 12);
        assert_eq!(shard.containers().unwrap(), vec![cid]);
        let found = shard
            .select(&cid, &SearchFilters::new().with(Filter::equal("Name", "file")))
            .unwrap();
        assert_eq!(found, vec![obj.address()]);
    }

    #[test]
    fn test_get_range() {
        let (_dir, shard) = open();
        let obj = object(ContainerId::new(rand::random()), b"0123456789");
        shard.put(&obj).unwrap();

        let data = shard.get_range(&obj.address(), &Range::new(2, 5)).unwrap();
        assert_eq!(data, b"23456");
        assert_eq!(
            shard.get_range(&obj.address(), &Range::new(10, 0)).unwrap(),
            b""
        );
        assert!(matches!(
            shard.get_range(&obj.address(), &Range::new(8, 3)),
            Err(Error::RangeOutOfBounds { size: 10, .. })
        ));
        assert!(matches!(
            shard.get_range(&obj.address(), &Range::new(u64::MAX, 2)),
            Err(Error::RangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_virtual_object_signals_split_info() {
        let (_dir, shard) = open();
        let cid = ContainerId::new(rand::random());
        let owner = OwnerId::new(rand::random());
        let parent = Object::new(cid, owner, ObjectType::Regular)
            .with_payload(b"whole".to_vec())
            .cut_payload();
        let last = Object::new(cid, owner, ObjectType::Regular)
            .with_payload(b"whole".to_vec())
            .with_split_id(SplitId::new())
            .with_parent(&parent);
        shard.put(&last).unwrap();

        let err = shard.get(&parent.address()).unwrap_err();
        let si = err.as_split_info().unwrap();
        assert_eq!(si.last_part, Some(last.object_id));
        assert_eq!(shard.head(&parent.address(), false).unwrap(), parent);
    }

    #[test]
    fn test_delete_drops_payload() {
        let (_dir, shard) = open();
        let obj = object(ContainerId::new(rand::random()), b"bytes");
        shard.put(&obj).unwrap();
        let address = obj.address();
        let partition = shard.blobs().partition_for(&address);

        shard.delete(&[address]).unwrap();
        assert!(matches!(shard.get(&address), Err(Error::ObjectNotFound(_))));
        assert_eq!(shard.blobs().partition_sizes().unwrap()[usize::from(partition)], 0);
    }

    #[test]
    fn test_inhume_rejects_further_puts() {
        let (_dir, shard) = open();
        let obj = object(ContainerId::new(rand::random()), b"bytes");
        shard.put(&obj).unwrap();

        shard.inhume(None, &[obj.address()]).unwrap();
        assert!(matches!(shard.get(&obj.address()), Err(Error::AlreadyRemoved(_))));
        assert!(matches!(shard.put(&obj), Err(Error::AlreadyRemoved(_))));
        assert_eq!(shard.graveyard().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_index_drops_payload() {
        let (_dir, shard) = open();
        let cid = ContainerId::new(rand::random());
        let owner = OwnerId::new(rand::random());
        let parent = Object::new(cid, owner, ObjectType::Regular)
            .with_payload(b"whole".to_vec())
            .cut_payload();
        shard.inhume(None, &[parent.address()]).unwrap();

        let last = Object::new(cid, owner, ObjectType::Regular)
            .with_payload(b"whole".to_vec())
            .with_split_id(SplitId::new())
            .with_parent(&parent);
        assert!(matches!(shard.put(&last), Err(Error::AlreadyRemoved(_))));

        let partition = shard.blobs().partition_for(&last.address());
        assert_eq!(shard.blobs().partition_sizes().unwrap()[usize::from(partition)], 0);
        assert!(matches!(shard.get(&last.address()), Err(Error::ObjectNotFound(_))));
    }

    #[test]
    fn test_put_rejects_length_mismatch() {
        let (_dir, shard) = open();
        let mut obj = object(ContainerId::new(rand::random()), b"bytes");
        obj.payload = Some(b"byte".to_vec());
        assert!(matches!(shard.put(&obj), Err(Error::InvalidArgument(_))));
    }
}
