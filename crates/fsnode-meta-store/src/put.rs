//! Idempotent object insertion.

use crate::get::{exists_in, root_split_info};
use crate::keys;
use crate::store::{
    get_value, put_value, read_id_list, KvTable, Metabase, MetabaseError, MetabaseResult,
};
use crate::tables::ZERO_VALUE;
use fsnode_common::{Address, ContainerId, Object, ObjectType, SplitInfo};
use tracing::debug;

impl Metabase {
    /// Index `obj`.
    ///
    /// `location` is the physical-location pointer of the payload. A
    /// `split_info` marks a placeholder insert of a virtual parent. Chunks
    /// carrying a parent header insert that parent as a placeholder first.
    /// Re-inserting an existing object only refreshes the location pointer
    /// or merges the split info.
    pub fn put(
        &self,
        obj: &Object,
        location: Option<&[u8]>,
        split_info: Option<&SplitInfo>,
    ) -> MetabaseResult<()> {
        self.write(|table| put_in(table, obj, location, split_info))?;
        debug!(address = %obj.address(), object_type = %obj.object_type(), "Indexed object");
        Ok(())
    }
}

fn put_in(
    table: &mut KvTable<'_>,
    obj: &Object,
    location: Option<&[u8]>,
    split_info: Option<&SplitInfo>,
) -> MetabaseResult<()> {
    let address = obj.address();
    let is_parent = split_info.is_some();

    let exists = match exists_in(&*table, &address) {
        Ok(found) => found,
        Err(MetabaseError::SplitInfo(_)) => true,
        Err(e) => return Err(e),
    };
    if exists {
        if let Some(si) = split_info {
            update_split_info(table, &address, si)?;
        } else if let Some(loc) = location {
            put_value(table, &keys::location(&address), loc)?;
        }
        return Ok(());
    }

    if !is_parent && let Some(parent) = obj.parent() {
        let parent_si = SplitInfo::from_child(obj).unwrap_or_default();
        put_in(table, parent, None, Some(&parent_si))?;
    }

    let record = bincode::serialize(&obj.cut_payload())?;
    if is_parent {
        put_value(table, &keys::parent_header(&address), &record)?;
    } else {
        put_value(table, &keys::unique(obj.object_type(), &address), &record)?;
        if let Some(loc) = location {
            put_value(table, &keys::location(&address), loc)?;
        }
    }
    if obj.object_type() == ObjectType::Regular && !obj.has_parent() {
        put_value(table, &keys::root(&address), &keys::encode_root(split_info)?)?;
    }

    for (key, oid) in keys::list_indexes(obj) {
        let mut list = read_id_list(&*table, &key)?;
        if !list.contains(&oid) {
            list.push(oid);
            put_value(table, &key, &keys::encode_id_list(&list))?;
        }
    }

    for key in keys::fake_bucket_keys(obj) {
        put_value(table, &key, ZERO_VALUE)?;
    }

    if obj.object_type() == ObjectType::Regular && !is_parent {
        change_container_size(table, &obj.container_id(), obj.payload_length(), true)?;
    }
    Ok(())
}

/// Merge `si` into the split info stored for a virtual object
fn update_split_info(
    table: &mut KvTable<'_>,
    address: &Address,
    si: &SplitInfo,
) -> MetabaseResult<()> {
    let mut merged = root_split_info(&*table, address)?.unwrap_or_default();
    merged.merge(si);
    put_value(table, &keys::root(address), &keys::encode_root(Some(&merged))?)
}

/// Add or subtract `delta` from the container size aggregate, clamping at zero
pub(crate) fn change_container_size(
    table: &mut KvTable<'_>,
    cid: &ContainerId,
    delta: u64,
    increase: bool,
) -> MetabaseResult<()> {
    let key = keys::container_size(cid);
    let current = match get_value(&*table, &key)? {
        Some(data) => keys::decode_size(&data)?,
        None => 0,
    };
    let updated = if increase {
        current.saturating_add(delta)
    } else {
        current.saturating_sub(delta)
    };
    put_value(table, &key, &updated.to_le_bytes())
}
