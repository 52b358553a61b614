//! Predicate search over the metabase indexes.
//!
//! Fast filters are answered from index buckets; every matching address
//! gets its hit counter bumped, and only addresses hit by every fast filter
//! survive. Slow filters are then evaluated against the decoded header.

use crate::filter::{keys as fk, Filter, SearchFilters};
use crate::get::{exists_in, get_in};
use crate::keys::{self, ALL_OBJECT_PREFIXES};
use crate::matcher::MatchType;
use crate::store::{get_value, has_key, scan_prefix, Metabase, MetabaseError, MetabaseResult};
use crate::tables::{
    OBJECT_PREFIX, OWNER_PREFIX, PARENT_PREFIX, PAYLOAD_HASH_PREFIX, ROOT_PREFIX, SPLIT_PREFIX,
    STORAGE_GROUP_PREFIX, TOMBSTONE_PREFIX,
};
use fsnode_common::types::ID_SIZE;
use fsnode_common::{Address, ContainerId, ObjectId, ObjectType, SplitId};
use redb::ReadableTable;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Hit counters keyed by address
type AddressCache = HashMap<Address, usize>;

impl Metabase {
    /// Addresses in `cid` matching every filter, in no particular order
    pub fn select(&self, cid: &ContainerId, filters: &SearchFilters) -> MetabaseResult<Vec<Address>> {
        if blindly_process(filters) {
            return Ok(Vec::new());
        }
        let Some(groups) = group_filters(filters) else {
            return Ok(Vec::new());
        };
        if groups.container_id.is_some_and(|c| c != *cid) {
            return Ok(Vec::new());
        }

        let result = self.read(|table| {
            let mut cache = AddressCache::new();
            let mut expected = groups.fast.len();
            if expected == 0 {
                expected = 1;
                select_all(table, cid, &mut cache)?;
            } else {
                for (fnum, filter) in groups.fast.iter().enumerate() {
                    select_fast(table, cid, filter, &mut cache, fnum)?;
                }
            }

            let mut result = Vec::new();
            for (address, hits) in cache {
                if hits != expected || has_key(table, &keys::graveyard(&address))? {
                    continue;
                }
                if match_slow_filters(table, &address, &groups.slow)? {
                    result.push(address);
                }
            }
            Ok(result)
        })?;
        debug!(container = %cid, filters = filters.len(), found = result.len(), "Selected objects");
        Ok(result)
    }
}

struct FilterGroups<'a> {
    container_id: Option<ContainerId>,
    fast: Vec<&'a Filter>,
    slow: Vec<&'a Filter>,
}

/// A NotPresent filter on a reserved key would expose internal markers
fn blindly_process(filters: &SearchFilters) -> bool {
    filters
        .iter()
        .any(|f| f.match_type == MatchType::NotPresent && f.is_reserved())
}

/// `None` when a container filter cannot be parsed
fn group_filters(filters: &SearchFilters) -> Option<FilterGroups<'_>> {
    let mut groups = FilterGroups {
        container_id: None,
        fast: Vec::new(),
        slow: Vec::new(),
    };
    for filter in filters {
        if filter.key == fk::CONTAINER_ID {
            groups.container_id = Some(filter.value.parse().ok()?);
        } else if filter.is_slow() {
            groups.slow.push(filter);
        } else {
            groups.fast.push(filter);
        }
    }
    Some(groups)
}

/// Count a hit for `address` from filter number `fnum`
fn mark_address(cache: &mut AddressCache, fnum: usize, address: Address) {
    match cache.get_mut(&address) {
        Some(hits) if *hits == fnum => *hits += 1,
        None if fnum == 0 => {
            cache.insert(address, 1);
        }
        _ => {}
    }
}

fn select_all<T>(table: &T, cid: &ContainerId, cache: &mut AddressCache) -> MetabaseResult<()>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    for prefix in [OBJECT_PREFIX, TOMBSTONE_PREFIX, STORAGE_GROUP_PREFIX, PARENT_PREFIX] {
        select_all_from_bucket(table, cid, prefix, cache, 0)?;
    }
    Ok(())
}

fn select_all_from_bucket<T>(
    table: &T,
    cid: &ContainerId,
    prefix: u8,
    cache: &mut AddressCache,
    fnum: usize,
) -> MetabaseResult<()>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    scan_prefix(table, &keys::bucket(prefix, cid), |key, _| {
        mark_address(cache, fnum, keys::parse_address(key)?);
        Ok(false)
    })
}

fn select_fast<T>(
    table: &T,
    cid: &ContainerId,
    filter: &Filter,
    cache: &mut AddressCache,
    fnum: usize,
) -> MetabaseResult<()>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    match filter.key.as_str() {
        fk::OBJECT_ID => select_object_id(table, cid, filter, cache, fnum),
        fk::OWNER_ID => select_from_fkbt(table, cid, &keys::bucket(OWNER_PREFIX, cid), filter, cache, fnum),
        fk::PAYLOAD_HASH => select_from_list(table, cid, PAYLOAD_HASH_PREFIX, filter, cache, fnum),
        fk::OBJECT_TYPE => {
            for prefix in prefixes_for_type(filter.match_type, &filter.value) {
                select_all_from_bucket(table, cid, prefix, cache, fnum)?;
            }
            Ok(())
        }
        fk::PARENT => select_from_list(table, cid, PARENT_PREFIX, filter, cache, fnum),
        fk::SPLIT_ID => select_from_list(table, cid, SPLIT_PREFIX, filter, cache, fnum),
        fk::ROOT => select_all_from_bucket(table, cid, ROOT_PREFIX, cache, fnum),
        fk::PHY => {
            for prefix in [OBJECT_PREFIX, TOMBSTONE_PREFIX, STORAGE_GROUP_PREFIX] {
                select_all_from_bucket(table, cid, prefix, cache, fnum)?;
            }
            Ok(())
        }
        attr_key => {
            let attr_bucket = keys::attribute_bucket(cid, attr_key);
            if filter.match_type == MatchType::NotPresent {
                select_outside_fkbt(table, cid, &attr_bucket, cache, fnum)
            } else {
                select_from_fkbt(table, cid, &attr_bucket, filter, cache, fnum)
            }
        }
    }
}

/// Scan a marker bucket `bucket | value | oid`, matching the value part
fn select_from_fkbt<T>(
    table: &T,
    cid: &ContainerId,
    bucket: &[u8],
    filter: &Filter,
    cache: &mut AddressCache,
    fnum: usize,
) -> MetabaseResult<()>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    scan_prefix(table, bucket, |key, _| {
        if key.len() < bucket.len() + ID_SIZE {
            return Ok(false);
        }
        let value = &key[bucket.len()..key.len() - ID_SIZE];
        if filter.match_type.matches(&filter.key, value, &filter.value) {
            let oid = object_id_suffix(key)?;
            mark_address(cache, fnum, Address::new(*cid, oid));
        }
        Ok(false)
    })
}

/// Every address of the container that lacks the attribute
fn select_outside_fkbt<T>(
    table: &T,
    cid: &ContainerId,
    attr_bucket: &[u8],
    cache: &mut AddressCache,
    fnum: usize,
) -> MetabaseResult<()>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let mut excludes = HashSet::new();
    scan_prefix(table, attr_bucket, |key, _| {
        excludes.insert(keys::parse_address(key)?);
        Ok(false)
    })?;
    for prefix in ALL_OBJECT_PREFIXES {
        scan_prefix(table, &keys::bucket(prefix, cid), |key, _| {
            let address = keys::parse_address(key)?;
            if !excludes.contains(&address) {
                mark_address(cache, fnum, address);
            }
            Ok(false)
        })?;
    }
    Ok(())
}

fn select_object_id<T>(
    table: &T,
    cid: &ContainerId,
    filter: &Filter,
    cache: &mut AddressCache,
    fnum: usize,
) -> MetabaseResult<()>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let append = |cache: &mut AddressCache, oid: ObjectId| -> MetabaseResult<()> {
        let address = Address::new(*cid, oid);
        match exists_in(table, &address) {
            Ok(true) | Err(MetabaseError::SplitInfo(_)) => mark_address(cache, fnum, address),
            Ok(false) | Err(MetabaseError::AlreadyRemoved(_)) => {}
            Err(e) => return Err(e),
        }
        Ok(())
    };

    if filter.match_type == MatchType::StringEqual {
        if let Ok(oid) = filter.value.parse::<ObjectId>() {
            append(cache, oid)?;
        }
        return Ok(());
    }

    let mut candidates = Vec::new();
    for prefix in ALL_OBJECT_PREFIXES {
        scan_prefix(table, &keys::bucket(prefix, cid), |key, _| {
            let oid = object_id_suffix(key)?;
            if filter.match_type.matches(&filter.key, oid.as_bytes(), &filter.value) {
                candidates.push(oid);
            }
            Ok(false)
        })?;
    }
    for oid in candidates {
        append(cache, oid)?;
    }
    Ok(())
}

/// Match against list buckets `bucket | value → [oid]`
fn select_from_list<T>(
    table: &T,
    cid: &ContainerId,
    prefix: u8,
    filter: &Filter,
    cache: &mut AddressCache,
    fnum: usize,
) -> MetabaseResult<()>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let bucket = keys::bucket(prefix, cid);
    let mut list = Vec::new();
    if filter.match_type == MatchType::StringEqual {
        let Some(suffix) = list_key_suffix(&filter.key, &filter.value) else {
            return Ok(());
        };
        if let Some(data) = get_value(table, &keys::bucket_key(prefix, cid, &suffix))? {
            list = keys::decode_id_list(&data)?;
        }
    } else {
        scan_prefix(table, &bucket, |key, value| {
            if filter.match_type.matches(&filter.key, &key[bucket.len()..], &filter.value) {
                list.extend(keys::decode_id_list(value)?);
            }
            Ok(false)
        })?;
    }
    for oid in list {
        mark_address(cache, fnum, Address::new(*cid, oid));
    }
    Ok(())
}

/// Binary key suffix of a list bucket for an equality filter value
fn list_key_suffix(key: &str, value: &str) -> Option<Vec<u8>> {
    match key {
        fk::SPLIT_ID => value.parse::<SplitId>().ok().map(|s| s.as_bytes().to_vec()),
        fk::PAYLOAD_HASH | fk::PARENT => hex::decode(value).ok(),
        _ => Some(value.as_bytes().to_vec()),
    }
}

fn prefixes_for_type(match_type: MatchType, value: &str) -> Vec<u8> {
    let types: Vec<ObjectType> = match match_type {
        MatchType::StringEqual => value.parse().into_iter().collect(),
        MatchType::StringNotEqual => ObjectType::ALL
            .into_iter()
            .filter(|t| t.as_str() != value)
            .collect(),
        _ => Vec::new(),
    };
    types
        .into_iter()
        .flat_map(|t| keys::type_prefixes(t).iter().copied())
        .collect()
}

fn match_slow_filters<T>(table: &T, address: &Address, slow: &[&Filter]) -> MetabaseResult<bool>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    if slow.is_empty() {
        return Ok(true);
    }
    let obj = match get_in(table, address, true, false) {
        Ok(obj) => obj,
        Err(MetabaseError::NotFound(_) | MetabaseError::AlreadyRemoved(_) | MetabaseError::SplitInfo(_)) => {
            return Ok(false);
        }
        Err(e) => return Err(e),
    };
    for filter in slow {
        let data = match filter.key.as_str() {
            fk::VERSION => obj.header.version.to_string().into_bytes(),
            fk::HOMOMORPHIC_HASH => obj.header.homomorphic_hash.sum.clone(),
            fk::CREATION_EPOCH => obj.header.creation_epoch.to_le_bytes().to_vec(),
            fk::PAYLOAD_LENGTH => obj.header.payload_length.to_le_bytes().to_vec(),
            _ => continue,
        };
        if !filter.match_type.matches(&filter.key, &data, &filter.value) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn object_id_suffix(key: &[u8]) -> MetabaseResult<ObjectId> {
    key.len()
        .checked_sub(ID_SIZE)
        .and_then(|start| ObjectId::from_slice(&key[start..]).ok())
        .ok_or_else(|| MetabaseError::Corrupted(format!("key without object id: {}", hex::encode(key))))
}
