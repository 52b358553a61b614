//! Batch deletion with parent reference counting.

use crate::get::get_in;
use crate::keys;
use crate::put::change_container_size;
use crate::store::{
    get_value, has_key, put_value, remove_key, KvTable, Metabase, MetabaseError, MetabaseResult,
};
use fsnode_common::{Address, Object, ObjectType};
use std::collections::HashMap;
use tracing::debug;

/// Per-parent bookkeeping for one Delete call
struct ReferenceNumber {
    /// Parent list length when the parent was first seen
    all: usize,
    /// Chunks of this parent deleted by this call
    current: usize,
    /// Parent header, when some deleted chunk embedded it
    object: Option<Object>,
}

impl Metabase {
    /// Remove `addresses` and every index entry they own.
    ///
    /// A virtual parent is purged once this call has deleted every chunk
    /// still listed under it. Deleting a virtual address fails the whole
    /// batch with the `SplitInfo` condition.
    pub fn delete(&self, addresses: &[Address]) -> MetabaseResult<()> {
        let removed = self.write(|table| {
            let mut ref_counter: HashMap<Address, ReferenceNumber> = HashMap::new();
            let mut removed = 0usize;
            for address in addresses {
                if delete_one(table, address, &mut ref_counter)? {
                    removed += 1;
                }
            }
            for (parent_addr, rn) in ref_counter {
                if rn.current == rn.all {
                    debug!(parent = %parent_addr, "Purging virtual parent");
                    let parent = match rn.object {
                        Some(parent) => Some(parent),
                        None => stored_parent_header(table, &parent_addr)?,
                    };
                    match parent {
                        Some(parent) => delete_object(table, &parent, true)?,
                        None => delete_address_keys(table, &parent_addr, true)?,
                    }
                }
            }
            Ok(removed)
        })?;
        debug!(requested = addresses.len(), removed, "Deleted objects");
        Ok(())
    }
}

/// Delete one address; `false` when nothing was stored there
fn delete_one(
    table: &mut KvTable<'_>,
    address: &Address,
    ref_counter: &mut HashMap<Address, ReferenceNumber>,
) -> MetabaseResult<bool> {
    let buried = has_key(&*table, &keys::graveyard(address))?;
    remove_key(table, &keys::graveyard(address))?;

    let obj = match get_in(&*table, address, false, true) {
        Ok(obj) => obj,
        Err(MetabaseError::NotFound(_)) => return Ok(false),
        Err(e) => return Err(e),
    };

    if let Some(parent_id) = obj.parent_id() {
        let parent_addr = Address::new(address.container_id, parent_id);
        if !ref_counter.contains_key(&parent_addr) {
            let all = parent_length(table, &parent_addr)?;
            ref_counter.insert(
                parent_addr,
                ReferenceNumber {
                    all,
                    current: 0,
                    object: None,
                },
            );
        }
        if let Some(rn) = ref_counter.get_mut(&parent_addr) {
            rn.current += 1;
            if rn.object.is_none() {
                rn.object = obj.parent().cloned();
            }
        }
    }

    // Buried objects were already subtracted by Inhume
    if obj.object_type() == ObjectType::Regular && !buried {
        change_container_size(table, &obj.container_id(), obj.payload_length(), false)?;
    }

    delete_object(table, &obj, false)?;
    Ok(true)
}

fn delete_object(table: &mut KvTable<'_>, obj: &Object, is_parent: bool) -> MetabaseResult<()> {
    let address = obj.address();
    if !is_parent {
        remove_key(table, &keys::unique(obj.object_type(), &address))?;
    }
    delete_address_keys(table, &address, is_parent)?;

    for (key, oid) in keys::list_indexes(obj) {
        let Some(data) = get_value(&*table, &key)? else {
            continue;
        };
        let mut list = keys::decode_id_list(&data)?;
        list.retain(|id| *id != oid);
        if list.is_empty() {
            remove_key(table, &key)?;
        } else {
            put_value(table, &key, &keys::encode_id_list(&list))?;
        }
    }

    for key in keys::fake_bucket_keys(obj) {
        remove_key(table, &key)?;
    }
    Ok(())
}

/// Keys derivable from the address alone
fn delete_address_keys(
    table: &mut KvTable<'_>,
    address: &Address,
    is_parent: bool,
) -> MetabaseResult<()> {
    if is_parent {
        remove_key(table, &keys::parent(address))?;
        remove_key(table, &keys::parent_header(address))?;
    }
    remove_key(table, &keys::location(address))?;
    remove_key(table, &keys::root(address))?;
    remove_key(table, &keys::graveyard(address))?;
    remove_key(table, &keys::to_move_it(address))
}

/// Header recorded when the parent placeholder was inserted
fn stored_parent_header(table: &KvTable<'_>, parent: &Address) -> MetabaseResult<Option<Object>> {
    get_value(table, &keys::parent_header(parent))?
        .map(|data| bincode::deserialize(&data))
        .transpose()
        .map_err(Into::into)
}

fn parent_length(table: &KvTable<'_>, parent: &Address) -> MetabaseResult<usize> {
    match get_value(table, &keys::parent(parent))? {
        Some(data) => Ok(keys::decode_id_list(&data)?.len()),
        None => Ok(0),
    }
}
