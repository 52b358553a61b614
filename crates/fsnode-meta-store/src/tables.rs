//! Redb table definition and bucket prefixes for the metabase.
//!
//! The whole index lives in one ordered table. Every key starts with a
//! one-byte bucket prefix followed by the 32-byte container id.

use redb::TableDefinition;

/// All metabase keys: bucket prefix | container id | suffix → value
pub const METABASE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("metabase");

/// Container size aggregate: cid → u64 LE
pub const CONTAINER_PREFIX: u8 = 0x00;
/// Regular objects: cid | oid → header record
pub const OBJECT_PREFIX: u8 = 0x01;
/// Buried addresses: cid | oid → tombstone address or GC mark
pub const GRAVEYARD_PREFIX: u8 = 0x02;
/// Tombstone objects: cid | oid → header record
pub const TOMBSTONE_PREFIX: u8 = 0x03;
/// Storage group objects: cid | oid → header record
pub const STORAGE_GROUP_PREFIX: u8 = 0x04;
/// Root objects: cid | oid → empty or split info
pub const ROOT_PREFIX: u8 = 0x05;
/// Parent lists: cid | parent oid → [chunk oid]
pub const PARENT_PREFIX: u8 = 0x06;
/// Physical location pointers: cid | oid → pointer bytes
pub const LOCATION_PREFIX: u8 = 0x07;
/// Relocation marks: cid | oid → zero value
pub const TO_MOVE_IT_PREFIX: u8 = 0x08;
/// Payload hash lists: cid | hash → [oid]
pub const PAYLOAD_HASH_PREFIX: u8 = 0x09;
/// Split lists: cid | split id → [oid]
pub const SPLIT_PREFIX: u8 = 0x0a;
/// Owner markers: cid | owner | oid → zero value
pub const OWNER_PREFIX: u8 = 0x0b;
/// Attribute markers: cid | key | 0x00 | value | oid → zero value
pub const ATTRIBUTE_PREFIX: u8 = 0x0c;
/// Virtual parent headers: cid | oid → header record
pub const PARENT_HEADER_PREFIX: u8 = 0x0d;

/// Value stored under marker keys
pub const ZERO_VALUE: &[u8] = &[0xFF];

/// Graveyard value for addresses buried by the garbage collector
pub const GC_MARK: &[u8] = b"GCMARK";
