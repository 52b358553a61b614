//! Key and value encodings for the metabase keyspace.

use crate::store::{MetabaseError, MetabaseResult};
use crate::tables::{
    ATTRIBUTE_PREFIX, CONTAINER_PREFIX, GRAVEYARD_PREFIX, LOCATION_PREFIX, OBJECT_PREFIX,
    OWNER_PREFIX, PARENT_HEADER_PREFIX, PARENT_PREFIX, PAYLOAD_HASH_PREFIX, ROOT_PREFIX,
    SPLIT_PREFIX, STORAGE_GROUP_PREFIX, TO_MOVE_IT_PREFIX, TOMBSTONE_PREFIX,
};
use fsnode_common::types::ID_SIZE;
use fsnode_common::{Address, Attribute, ContainerId, Object, ObjectId, ObjectType, SplitInfo};

/// Length of a bucket prefix followed by a container id
pub const BUCKET_LEN: usize = 1 + ID_SIZE;

/// `prefix | cid`
#[must_use]
pub fn bucket(prefix: u8, cid: &ContainerId) -> Vec<u8> {
    let mut key = Vec::with_capacity(BUCKET_LEN + ID_SIZE);
    key.push(prefix);
    key.extend_from_slice(cid.as_bytes());
    key
}

/// `prefix | cid | suffix`
#[must_use]
pub fn bucket_key(prefix: u8, cid: &ContainerId, suffix: &[u8]) -> Vec<u8> {
    let mut key = bucket(prefix, cid);
    key.extend_from_slice(suffix);
    key
}

/// `prefix | cid | oid`
#[must_use]
pub fn address_key(prefix: u8, address: &Address) -> Vec<u8> {
    bucket_key(prefix, &address.container_id, address.object_id.as_bytes())
}

#[must_use]
pub fn container_size(cid: &ContainerId) -> Vec<u8> {
    bucket(CONTAINER_PREFIX, cid)
}

#[must_use]
pub fn primary(address: &Address) -> Vec<u8> {
    address_key(OBJECT_PREFIX, address)
}

#[must_use]
pub fn tombstone(address: &Address) -> Vec<u8> {
    address_key(TOMBSTONE_PREFIX, address)
}

#[must_use]
pub fn storage_group(address: &Address) -> Vec<u8> {
    address_key(STORAGE_GROUP_PREFIX, address)
}

#[must_use]
pub fn graveyard(address: &Address) -> Vec<u8> {
    address_key(GRAVEYARD_PREFIX, address)
}

#[must_use]
pub fn root(address: &Address) -> Vec<u8> {
    address_key(ROOT_PREFIX, address)
}

/// Parent list key of the logical object at `address`
#[must_use]
pub fn parent(address: &Address) -> Vec<u8> {
    address_key(PARENT_PREFIX, address)
}

/// Header of a virtual parent, kept until the parent is purged
#[must_use]
pub fn parent_header(address: &Address) -> Vec<u8> {
    address_key(PARENT_HEADER_PREFIX, address)
}

#[must_use]
pub fn location(address: &Address) -> Vec<u8> {
    address_key(LOCATION_PREFIX, address)
}

#[must_use]
pub fn to_move_it(address: &Address) -> Vec<u8> {
    address_key(TO_MOVE_IT_PREFIX, address)
}

/// Unique key of an object, chosen by its type
#[must_use]
pub fn unique(object_type: ObjectType, address: &Address) -> Vec<u8> {
    match object_type {
        ObjectType::Regular => primary(address),
        ObjectType::Tombstone => tombstone(address),
        ObjectType::StorageGroup => storage_group(address),
    }
}

/// Bucket prefixes holding objects of the given type
#[must_use]
pub const fn type_prefixes(object_type: ObjectType) -> &'static [u8] {
    match object_type {
        ObjectType::Regular => &[OBJECT_PREFIX, PARENT_PREFIX],
        ObjectType::Tombstone => &[TOMBSTONE_PREFIX],
        ObjectType::StorageGroup => &[STORAGE_GROUP_PREFIX],
    }
}

/// Buckets whose keys enumerate every address of a container
pub const ALL_OBJECT_PREFIXES: [u8; 4] = [
    OBJECT_PREFIX,
    PARENT_PREFIX,
    TOMBSTONE_PREFIX,
    STORAGE_GROUP_PREFIX,
];

/// `cid | key | 0x00` under the attribute bucket
#[must_use]
pub fn attribute_bucket(cid: &ContainerId, attr_key: &str) -> Vec<u8> {
    let mut key = bucket(ATTRIBUTE_PREFIX, cid);
    key.extend_from_slice(attr_key.as_bytes());
    key.push(0x00);
    key
}

#[must_use]
pub fn attribute(address: &Address, attr: &Attribute) -> Vec<u8> {
    let mut key = attribute_bucket(&address.container_id, &attr.key);
    key.extend_from_slice(attr.value.as_bytes());
    key.extend_from_slice(address.object_id.as_bytes());
    key
}

#[must_use]
pub fn owner(obj: &Object) -> Vec<u8> {
    let mut key = bucket(OWNER_PREFIX, &obj.container_id());
    key.extend_from_slice(obj.header.owner_id.as_bytes());
    key.extend_from_slice(obj.object_id.as_bytes());
    key
}

/// List indexes an object belongs to: payload hash, parent and split
#[must_use]
pub fn list_indexes(obj: &Object) -> Vec<(Vec<u8>, ObjectId)> {
    let cid = obj.container_id();
    let mut indexes = vec![(
        bucket_key(PAYLOAD_HASH_PREFIX, &cid, &obj.header.payload_hash.sum),
        obj.object_id,
    )];
    if let Some(parent_id) = obj.parent_id() {
        indexes.push((parent(&Address::new(cid, parent_id)), obj.object_id));
    }
    if let Some(split_id) = obj.split_id() {
        indexes.push((
            bucket_key(SPLIT_PREFIX, &cid, split_id.as_bytes()),
            obj.object_id,
        ));
    }
    indexes
}

/// Marker keys used only for owner and attribute scans
#[must_use]
pub fn fake_bucket_keys(obj: &Object) -> Vec<Vec<u8>> {
    let address = obj.address();
    let mut keys = vec![owner(obj)];
    keys.extend(obj.header.attributes.iter().map(|a| attribute(&address, a)));
    keys
}

/// Address from a `prefix | cid | ... | oid` key
pub fn parse_address(key: &[u8]) -> MetabaseResult<Address> {
    if key.len() < BUCKET_LEN + ID_SIZE {
        return Err(MetabaseError::Corrupted(format!(
            "key too short for an address: {}",
            hex::encode(key)
        )));
    }
    let cid = ContainerId::from_slice(&key[1..BUCKET_LEN])
        .map_err(|e| MetabaseError::Corrupted(e.to_string()))?;
    let oid = ObjectId::from_slice(&key[key.len() - ID_SIZE..])
        .map_err(|e| MetabaseError::Corrupted(e.to_string()))?;
    Ok(Address::new(cid, oid))
}

/// Container id from any bucket key
pub fn parse_container(key: &[u8]) -> MetabaseResult<ContainerId> {
    key.get(1..BUCKET_LEN)
        .and_then(|b| ContainerId::from_slice(b).ok())
        .ok_or_else(|| {
            MetabaseError::Corrupted(format!("key without container: {}", hex::encode(key)))
        })
}

/// Encode an id list: u32 LE count followed by the ids
#[must_use]
pub fn encode_id_list(ids: &[ObjectId]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + ids.len() * ID_SIZE);
    out.extend_from_slice(&u32::try_from(ids.len()).unwrap_or(u32::MAX).to_le_bytes());
    for id in ids {
        out.extend_from_slice(id.as_bytes());
    }
    out
}

pub fn decode_id_list(data: &[u8]) -> MetabaseResult<Vec<ObjectId>> {
    let corrupted = || MetabaseError::Corrupted(format!("bad id list of {} bytes", data.len()));
    let (count, rest) = data.split_first_chunk::<4>().ok_or_else(corrupted)?;
    let count = u32::from_le_bytes(*count) as usize;
    if rest.len() != count * ID_SIZE {
        return Err(corrupted());
    }
    rest.chunks_exact(ID_SIZE)
        .map(|c| ObjectId::from_slice(c).map_err(|e| MetabaseError::Corrupted(e.to_string())))
        .collect()
}

pub fn decode_size(data: &[u8]) -> MetabaseResult<u64> {
    data.try_into()
        .map(u64::from_le_bytes)
        .map_err(|_| MetabaseError::Corrupted(format!("bad size of {} bytes", data.len())))
}

/// Root value: empty for a complete object, encoded split info otherwise
pub fn encode_root(split_info: Option<&SplitInfo>) -> MetabaseResult<Vec<u8>> {
    Ok(split_info.map(bincode::serialize).transpose()?.unwrap_or_default())
}

pub fn decode_root(data: &[u8]) -> MetabaseResult<SplitInfo> {
    if data.is_empty() {
        return Ok(SplitInfo::default());
    }
    Ok(bincode::deserialize(data)?)
}

/// Next container id in byte order, `None` after the maximum
#[must_use]
pub fn next_container(cid: &ContainerId) -> Option<ContainerId> {
    let mut bytes = *cid.as_bytes();
    for b in bytes.iter_mut().rev() {
        if *b == u8::MAX {
            *b = 0;
        } else {
            *b += 1;
            return Some(ContainerId::new(bytes));
        }
    }
    None
}
