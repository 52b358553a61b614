//! Container enumeration and payload size accounting.

use crate::keys;
use crate::store::{get_value, seek, Metabase, MetabaseError, MetabaseResult};
use crate::tables::{
    CONTAINER_PREFIX, OBJECT_PREFIX, PARENT_PREFIX, STORAGE_GROUP_PREFIX, TOMBSTONE_PREFIX,
};
use fsnode_common::ContainerId;
use std::collections::BTreeSet;

/// Buckets whose presence makes a container known
const CONTAINER_BUCKETS: [u8; 5] = [
    CONTAINER_PREFIX,
    OBJECT_PREFIX,
    TOMBSTONE_PREFIX,
    STORAGE_GROUP_PREFIX,
    PARENT_PREFIX,
];

impl Metabase {
    /// Every container with a size aggregate or any indexed object, sorted.
    ///
    /// Each bucket is probed once per distinct container by seeking past
    /// the current container's key range.
    pub fn containers(&self) -> MetabaseResult<Vec<ContainerId>> {
        self.read(|table| {
            let mut found = BTreeSet::new();
            for prefix in CONTAINER_BUCKETS {
                let mut cursor = vec![prefix];
                while let Some(key) = seek(table, &cursor)? {
                    if key.first() != Some(&prefix) {
                        break;
                    }
                    let cid = keys::parse_container(&key)?;
                    found.insert(cid);
                    match keys::next_container(&cid) {
                        Some(next) => cursor = keys::bucket(prefix, &next),
                        None => break,
                    }
                }
            }
            Ok(found.into_iter().collect())
        })
    }

    /// Sum of payload lengths of live regular objects in `cid`
    pub fn container_size(&self, cid: &ContainerId) -> MetabaseResult<u64> {
        self.read(|table| match get_value(table, &keys::container_size(cid))? {
            Some(data) => keys::decode_size(&data),
            None => Err(MetabaseError::ContainerNotFound(*cid)),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::MetabaseError;
    use crate::fixtures::{open, random_cid, regular, split};
    use fsnode_common::ContainerId;

    #[test]
    fn test_containers_enumerates_each_once() {
        let (_dir, mb) = open();
        let mut expected: Vec<ContainerId> = (0..3).map(|_| random_cid()).collect();
        for cid in &expected {
            for i in 0..3u8 {
                mb.put(&regular(*cid, &[i; 8]), None, None).unwrap();
            }
        }
        // a container known only through a split object
        let virtual_cid = random_cid();
        let s = split(virtual_cid, &[b"p1", b"p2"]);
        mb.put(&s.link, None, None).unwrap();
        expected.push(virtual_cid);
        expected.sort();

        assert_eq!(mb.containers().unwrap(), expected);
    }

    #[test]
    fn test_container_size_not_found() {
        let (_dir, mb) = open();
        let cid = random_cid();
        assert!(matches!(
            mb.container_size(&cid),
            Err(MetabaseError::ContainerNotFound(_))
        ));
        mb.put(&regular(cid, b"xyz"), None, None).unwrap();
        assert_eq!(mb.container_size(&cid).unwrap(), 3);
    }
}
