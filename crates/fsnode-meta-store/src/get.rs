//! Point lookups: Get, Exists and the location pointer.

use crate::keys;
use crate::store::{get_value, has_key, read_id_list, Metabase, MetabaseError, MetabaseResult};
use fsnode_common::{Address, Object, SplitInfo};
use redb::ReadableTable;

impl Metabase {
    /// Fetch the stored header of the object at `address`.
    ///
    /// Buried addresses fail with `AlreadyRemoved`. When only chunks of the
    /// object are known, `raw` callers get the `SplitInfo` condition while
    /// others receive the logical header embedded in the last chunk.
    pub fn get(&self, address: &Address, raw: bool) -> MetabaseResult<Object> {
        self.read(|table| get_in(table, address, true, raw))
    }

    /// Whether the object at `address` is stored.
    ///
    /// Fails with `AlreadyRemoved` for buried addresses and with `SplitInfo`
    /// for virtual objects.
    pub fn exists(&self, address: &Address) -> MetabaseResult<bool> {
        self.read(|table| exists_in(table, address))
    }

    /// Physical location pointer recorded by Put
    pub fn location(&self, address: &Address) -> MetabaseResult<Option<Vec<u8>>> {
        self.read(|table| get_value(table, &keys::location(address)))
    }

    /// Whether `address` is in the graveyard
    pub fn is_buried(&self, address: &Address) -> MetabaseResult<bool> {
        self.read(|table| has_key(table, &keys::graveyard(address)))
    }
}

pub(crate) fn exists_in<T>(table: &T, address: &Address) -> MetabaseResult<bool>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    if has_key(table, &keys::graveyard(address))? {
        return Err(MetabaseError::AlreadyRemoved(*address));
    }
    if has_key(table, &keys::primary(address))? {
        return Ok(true);
    }
    if has_key(table, &keys::parent(address))? {
        if let Some(si) = root_split_info(table, address)? {
            return Err(MetabaseError::split_info(si));
        }
        return Ok(false);
    }
    if has_key(table, &keys::tombstone(address))? {
        return Ok(true);
    }
    has_key(table, &keys::storage_group(address))
}

pub(crate) fn get_in<T>(
    table: &T,
    address: &Address,
    check_graveyard: bool,
    raw: bool,
) -> MetabaseResult<Object>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    if check_graveyard && has_key(table, &keys::graveyard(address))? {
        return Err(MetabaseError::AlreadyRemoved(*address));
    }
    for key in [
        keys::primary(address),
        keys::tombstone(address),
        keys::storage_group(address),
    ] {
        if let Some(data) = get_value(table, &key)? {
            return Ok(bincode::deserialize(&data)?);
        }
    }
    get_virtual(table, address, raw)
}

fn get_virtual<T>(table: &T, address: &Address, raw: bool) -> MetabaseResult<Object>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    if raw {
        return match root_split_info(table, address)? {
            Some(si) => Err(MetabaseError::split_info(si)),
            None => Err(MetabaseError::NotFound(*address)),
        };
    }
    let children = read_id_list(table, &keys::parent(address))?;
    // Middle chunks carry no parent header; take the newest one that does.
    for child_id in children.iter().rev() {
        let child_addr = Address::new(address.container_id, *child_id);
        let Some(data) = get_value(table, &keys::primary(&child_addr))? else {
            return Err(MetabaseError::Corrupted(format!(
                "child {child_addr} listed under {address} is missing"
            )));
        };
        let child: Object = bincode::deserialize(&data)?;
        if let Some(parent) = child.parent() {
            return Ok(parent.clone());
        }
    }
    Err(MetabaseError::NotFound(*address))
}

/// Split info stored under the root key, if the root key exists
pub(crate) fn root_split_info<T>(table: &T, address: &Address) -> MetabaseResult<Option<SplitInfo>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    get_value(table, &keys::root(address))?
        .map(|data| keys::decode_root(&data))
        .transpose()
}

#[cfg(test)]
mod tests {
    use crate::MetabaseError;
    use crate::fixtures::{open, random_cid, regular, split};
    use fsnode_common::{Address, ObjectId};

    #[test]
    fn test_not_found_vs_already_removed() {
        let (_dir, mb) = open();
        let cid = random_cid();
        let obj = regular(cid, b"doomed");
        mb.put(&obj, None, None).unwrap();

        mb.inhume(None, &[obj.address()]).unwrap();
        assert!(matches!(
            mb.get(&obj.address(), false),
            Err(MetabaseError::AlreadyRemoved(_))
        ));
        assert!(matches!(
            mb.exists(&obj.address()),
            Err(MetabaseError::AlreadyRemoved(_))
        ));

        let never = Address::new(cid, ObjectId::new([42; 32]));
        assert!(matches!(mb.get(&never, false), Err(MetabaseError::NotFound(_))));
        assert!(!mb.exists(&never).unwrap());
    }

    #[test]
    fn test_split_discovery() {
        let (_dir, mb) = open();
        let cid = random_cid();
        let s = split(cid, &[b"first", b"second", b"third"]);
        for chunk in &s.chunks {
            mb.put(chunk, None, None).unwrap();
        }
        mb.put(&s.link, None, None).unwrap();

        let err = mb.exists(&s.parent.address()).unwrap_err();
        let MetabaseError::SplitInfo(si) = err else {
            panic!("expected split info, got {err:?}");
        };
        assert_eq!(si.link, Some(s.link.object_id));

        assert!(matches!(
            mb.get(&s.parent.address(), true),
            Err(MetabaseError::SplitInfo(_))
        ));

        // non-raw lookups resolve the logical header from a chunk
        let parent = mb.get(&s.parent.address(), false).unwrap();
        assert_eq!(parent, s.parent);
        assert_eq!(parent.payload_length(), 16);
        assert!(parent.payload.is_none());
    }

    #[test]
    fn test_tombstone_and_storage_group_lookup() {
        let (_dir, mb) = open();
        let cid = random_cid();
        let ts = fsnode_common::Object::new(
            cid,
            crate::fixtures::random_owner(),
            fsnode_common::ObjectType::Tombstone,
        );
        mb.put(&ts, None, None).unwrap();
        assert!(mb.exists(&ts.address()).unwrap());
        assert_eq!(mb.get(&ts.address(), true).unwrap(), ts.cut_payload());
    }
}
