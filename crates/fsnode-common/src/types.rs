//! Core type definitions for fsnode
//!
//! This module defines the identifiers and object model shared by the
//! metabase, the payload store and the retrieval engine.

use crate::checksum::Checksum;
use derive_more::{From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Size of container and object identifiers in bytes
pub const ID_SIZE: usize = 32;

/// Size of owner identifiers in bytes
pub const OWNER_ID_SIZE: usize = 25;

/// Error returned when parsing an identifier from text fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

macro_rules! fixed_id {
    ($(#[$meta:meta])* $name:ident, $size:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, From, Into)]
        pub struct $name([u8; $size]);

        impl $name {
            /// Create from raw bytes
            #[must_use]
            pub const fn new(bytes: [u8; $size]) -> Self {
                Self(bytes)
            }

            /// Create from a byte slice of the exact size
            pub fn from_slice(bytes: &[u8]) -> Result<Self, IdParseError> {
                let arr: [u8; $size] =
                    bytes.try_into().map_err(|_| IdParseError::InvalidLength {
                        expected: $size,
                        actual: bytes.len(),
                    })?;
                Ok(Self(arr))
            }

            /// Get as bytes
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $size] {
                &self.0
            }

            /// Hex representation
            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s).map_err(|e| IdParseError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

fixed_id!(
    /// Identifier of a container (a named set of objects sharing a placement policy)
    ContainerId,
    ID_SIZE
);

fixed_id!(
    /// Identifier of an object inside a container
    ObjectId,
    ID_SIZE
);

fixed_id!(
    /// Identifier of an object owner
    OwnerId,
    OWNER_ID_SIZE
);

/// Groups all chunks produced by one split operation
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
pub struct SplitId(Uuid);

impl SplitId {
    /// Size of the binary form in bytes
    pub const SIZE: usize = 16;

    /// Generate a new random split ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from the binary form
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdParseError> {
        Uuid::from_slice(bytes)
            .map(Self)
            .map_err(|_| IdParseError::InvalidLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            })
    }

    /// Get as bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for SplitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SplitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SplitId({})", self.0)
    }
}

impl fmt::Display for SplitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SplitId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| IdParseError::InvalidHex(e.to_string()))
    }
}

/// Object address: container plus object identifier
///
/// Ordered byte-wise, container first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub container_id: ContainerId,
    pub object_id: ObjectId,
}

impl Address {
    /// Size of the binary form in bytes
    pub const SIZE: usize = 2 * ID_SIZE;

    #[must_use]
    pub const fn new(container_id: ContainerId, object_id: ObjectId) -> Self {
        Self {
            container_id,
            object_id,
        }
    }

    /// Binary form: container bytes followed by object bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..ID_SIZE].copy_from_slice(self.container_id.as_bytes());
        out[ID_SIZE..].copy_from_slice(self.object_id.as_bytes());
        out
    }

    /// Parse the binary form produced by [`Address::to_bytes`]
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdParseError> {
        if bytes.len() != Self::SIZE {
            return Err(IdParseError::InvalidLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            container_id: ContainerId::from_slice(&bytes[..ID_SIZE])?,
            object_id: ObjectId::from_slice(&bytes[ID_SIZE..])?,
        })
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container_id, self.object_id)
    }
}

impl FromStr for Address {
    type Err = IdParseError;

    /// Parses `<container hex>/<object hex>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (cid, oid) = s
            .split_once('/')
            .ok_or_else(|| IdParseError::InvalidHex(format!("missing '/' in address {s}")))?;
        Ok(Self::new(cid.parse()?, oid.parse()?))
    }
}

/// Object format version
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const CURRENT: Self = Self { major: 2, minor: 11 };
}

impl Default for Version {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}", self.major, self.minor)
    }
}

/// Kind of object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    #[default]
    Regular,
    Tombstone,
    StorageGroup,
}

impl ObjectType {
    pub const ALL: [Self; 3] = [Self::Regular, Self::Tombstone, Self::StorageGroup];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "REGULAR",
            Self::Tombstone => "TOMBSTONE",
            Self::StorageGroup => "STORAGE_GROUP",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown object type: {s}"))
    }
}

/// User-defined key/value attribute
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Split-related header fields of a chunk
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitHeader {
    /// ID of the logical object this chunk belongs to
    pub parent_id: Option<ObjectId>,
    /// Previous chunk in the chain
    pub previous: Option<ObjectId>,
    /// Header of the logical object (payload never present)
    pub parent: Option<Box<Object>>,
    /// All chunk IDs in order; present only on the link chunk
    pub children: Vec<ObjectId>,
    pub split_id: Option<SplitId>,
}

/// Object header
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: Version,
    pub container_id: ContainerId,
    pub owner_id: OwnerId,
    pub creation_epoch: u64,
    pub payload_length: u64,
    pub payload_hash: Checksum,
    pub object_type: ObjectType,
    pub homomorphic_hash: Checksum,
    pub attributes: Vec<Attribute>,
    pub split: SplitHeader,
}

/// Object: identifier, header and (possibly absent) payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub object_id: ObjectId,
    pub header: Header,
    pub payload: Option<Vec<u8>>,
}

impl Object {
    /// Create an empty object of the given type
    #[must_use]
    pub fn new(container_id: ContainerId, owner_id: OwnerId, object_type: ObjectType) -> Self {
        let mut obj = Self {
            object_id: ObjectId::default(),
            header: Header {
                version: Version::CURRENT,
                container_id,
                owner_id,
                creation_epoch: 0,
                payload_length: 0,
                payload_hash: Checksum::sha256(&[]),
                object_type,
                homomorphic_hash: Checksum::default(),
                attributes: Vec::new(),
                split: SplitHeader::default(),
            },
            payload: Some(Vec::new()),
        };
        obj.seal();
        obj
    }

    /// Set the payload, its length and checksum, then recompute the ID
    #[must_use]
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.header.payload_length = payload.len() as u64;
        self.header.payload_hash = Checksum::sha256(&payload);
        self.payload = Some(payload);
        self.seal();
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.attributes.push(Attribute::new(key, value));
        self.seal();
        self
    }

    #[must_use]
    pub fn with_creation_epoch(mut self, epoch: u64) -> Self {
        self.header.creation_epoch = epoch;
        self.seal();
        self
    }

    #[must_use]
    pub fn with_homomorphic_hash(mut self, hash: Checksum) -> Self {
        self.header.homomorphic_hash = hash;
        self.seal();
        self
    }

    /// Attach the header of the logical object this chunk belongs to
    #[must_use]
    pub fn with_parent(mut self, parent: &Self) -> Self {
        self.header.split.parent_id = Some(parent.object_id);
        self.header.split.parent = Some(Box::new(parent.cut_payload()));
        self.seal();
        self
    }

    /// Name the logical object without embedding its header (middle chunks)
    #[must_use]
    pub fn with_parent_id(mut self, parent_id: ObjectId) -> Self {
        self.header.split.parent_id = Some(parent_id);
        self.seal();
        self
    }

    #[must_use]
    pub fn with_split_id(mut self, split_id: SplitId) -> Self {
        self.header.split.split_id = Some(split_id);
        self.seal();
        self
    }

    #[must_use]
    pub fn with_previous(mut self, previous: ObjectId) -> Self {
        self.header.split.previous = Some(previous);
        self.seal();
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<ObjectId>) -> Self {
        self.header.split.children = children;
        self.seal();
        self
    }

    /// Recompute the object ID from the header
    pub fn seal(&mut self) {
        self.object_id = self.calculate_id();
    }

    /// SHA-256 over the encoded header
    #[must_use]
    pub fn calculate_id(&self) -> ObjectId {
        let encoded = bincode::serialize(&self.header).unwrap_or_default();
        ObjectId::new(crate::checksum::sha256(&encoded))
    }

    #[must_use]
    pub const fn address(&self) -> Address {
        Address::new(self.header.container_id, self.object_id)
    }

    #[must_use]
    pub const fn container_id(&self) -> ContainerId {
        self.header.container_id
    }

    #[must_use]
    pub const fn object_type(&self) -> ObjectType {
        self.header.object_type
    }

    #[must_use]
    pub const fn payload_length(&self) -> u64 {
        self.header.payload_length
    }

    /// ID of the logical object, from the split header or the embedded parent
    #[must_use]
    pub fn parent_id(&self) -> Option<ObjectId> {
        self.header
            .split
            .parent_id
            .or_else(|| self.header.split.parent.as_ref().map(|p| p.object_id))
    }

    /// Embedded header of the logical object
    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.header.split.parent.as_deref()
    }

    #[must_use]
    pub fn has_parent(&self) -> bool {
        self.parent_id().is_some()
    }

    #[must_use]
    pub const fn previous_id(&self) -> Option<ObjectId> {
        self.header.split.previous
    }

    #[must_use]
    pub fn children(&self) -> &[ObjectId] {
        &self.header.split.children
    }

    #[must_use]
    pub const fn split_id(&self) -> Option<SplitId> {
        self.header.split.split_id
    }

    /// Link chunk: carries the parent header and lists all of its siblings
    #[must_use]
    pub fn is_link(&self) -> bool {
        self.parent().is_some() && !self.children().is_empty()
    }

    /// Last chunk: carries the parent header but no children list
    #[must_use]
    pub fn is_last_part(&self) -> bool {
        self.parent().is_some() && self.children().is_empty()
    }

    /// Copy without payload
    #[must_use]
    pub fn cut_payload(&self) -> Self {
        Self {
            object_id: self.object_id,
            header: self.header.clone(),
            payload: None,
        }
    }

    /// Payload bytes (empty when absent)
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or_default()
    }
}

/// Describes how to reach the physical chunks of a virtual object
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitInfo {
    pub split_id: Option<SplitId>,
    pub last_part: Option<ObjectId>,
    pub link: Option<ObjectId>,
}

impl SplitInfo {
    /// Split info that a chunk contributes to its parent
    #[must_use]
    pub fn from_child(child: &Object) -> Option<Self> {
        if child.is_link() {
            Some(Self {
                split_id: child.split_id(),
                last_part: None,
                link: Some(child.object_id),
            })
        } else if child.is_last_part() {
            Some(Self {
                split_id: child.split_id(),
                last_part: Some(child.object_id),
                link: None,
            })
        } else {
            None
        }
    }

    /// Union of the fields; present values are never replaced by absent ones
    pub fn merge(&mut self, other: &Self) {
        if other.split_id.is_some() {
            self.split_id = other.split_id;
        }
        if other.last_part.is_some() {
            self.last_part = other.last_part;
        }
        if other.link.is_some() {
            self.link = other.link;
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.split_id.is_none() && self.last_part.is_none() && self.link.is_none()
    }
}

impl fmt::Display for SplitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |o: Option<ObjectId>| o.map_or_else(|| "-".to_string(), |id| id.to_hex());
        write!(
            f,
            "split_id={} last_part={} link={}",
            self.split_id
                .map_or_else(|| "-".to_string(), |s| s.to_string()),
            opt(self.last_part),
            opt(self.link)
        )
    }
}

/// Window over a logical payload
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub offset: u64,
    pub length: u64,
}

impl Range {
    #[must_use]
    pub const fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Exclusive end, `None` on overflow
    #[must_use]
    pub const fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }

    /// Whether the range fits in a payload of `size` bytes
    #[must_use]
    pub fn fits(&self, size: u64) -> bool {
        self.end().is_some_and(|end| end <= size)
    }

    /// Part of the window `self` that falls inside a chunk covering
    /// `[chunk_offset, chunk_offset + chunk_size)`, relative to the chunk.
    #[must_use]
    pub fn overlap(&self, chunk_offset: u64, chunk_size: u64) -> Option<Self> {
        let end = self.end()?;
        let chunk_end = chunk_offset.checked_add(chunk_size)?;
        let from = self.offset.max(chunk_offset);
        let to = end.min(chunk_end);
        (from < to).then(|| Self::new(from - chunk_offset, to - from))
    }

    /// Slice `data` by this range, `None` when it does not fit
    #[must_use]
    pub fn slice<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        let start = usize::try_from(self.offset).ok()?;
        let end = usize::try_from(self.end()?).ok()?;
        data.get(start..end)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, +{})", self.offset, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_container() -> ContainerId {
        ContainerId::new(rand::random())
    }

    fn random_owner() -> OwnerId {
        OwnerId::new(rand::random())
    }

    #[test]
    fn test_id_hex_roundtrip() {
        let cid = random_container();
        let parsed: ContainerId = cid.to_hex().parse().unwrap();
        assert_eq!(cid, parsed);
        assert!("zz".parse::<ObjectId>().is_err());
        assert_eq!(
            "abcd".parse::<ObjectId>().unwrap_err(),
            IdParseError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn test_address_parse_and_order() {
        let a = Address::new(ContainerId::new([1; 32]), ObjectId::new([9; 32]));
        let b = Address::new(ContainerId::new([2; 32]), ObjectId::new([0; 32]));
        assert!(a < b);
        let parsed: Address = a.to_string().parse().unwrap();
        assert_eq!(a, parsed);
        assert_eq!(Address::from_slice(&a.to_bytes()).unwrap(), a);
    }

    #[test]
    fn test_object_id_tracks_header() {
        let obj = Object::new(random_container(), random_owner(), ObjectType::Regular);
        let with_payload = obj.clone().with_payload(b"hello".to_vec());
        assert_ne!(obj.object_id, with_payload.object_id);
        assert_eq!(with_payload.payload_length(), 5);
        assert_eq!(with_payload.calculate_id(), with_payload.object_id);
    }

    #[test]
    fn test_split_info_from_child() {
        let cid = random_container();
        let owner = random_owner();
        let parent = Object::new(cid, owner, ObjectType::Regular);
        let split_id = SplitId::new();
        let last = Object::new(cid, owner, ObjectType::Regular)
            .with_parent(&parent)
            .with_split_id(split_id);
        let link = Object::new(cid, owner, ObjectType::Regular)
            .with_parent(&parent)
            .with_split_id(split_id)
            .with_children(vec![last.object_id]);

        let si = SplitInfo::from_child(&last).unwrap();
        assert_eq!(si.last_part, Some(last.object_id));
        assert_eq!(si.link, None);

        let si = SplitInfo::from_child(&link).unwrap();
        assert_eq!(si.link, Some(link.object_id));
        assert!(SplitInfo::from_child(&parent).is_none());
    }

    #[test]
    fn test_split_info_merge_keeps_present_fields() {
        let mut a = SplitInfo {
            split_id: Some(SplitId::new()),
            last_part: Some(ObjectId::new([1; 32])),
            link: None,
        };
        let b = SplitInfo {
            split_id: None,
            last_part: None,
            link: Some(ObjectId::new([2; 32])),
        };
        a.merge(&b);
        assert!(a.split_id.is_some());
        assert_eq!(a.last_part, Some(ObjectId::new([1; 32])));
        assert_eq!(a.link, Some(ObjectId::new([2; 32])));
    }

    #[test]
    fn test_range_overlap() {
        let window = Range::new(15, 10);
        // chunk [0, 10) is before the window
        assert_eq!(window.overlap(0, 10), None);
        // chunk [10, 30) contains it
        assert_eq!(window.overlap(10, 20), Some(Range::new(5, 10)));
        // chunk [20, 40) holds the tail
        assert_eq!(window.overlap(20, 20), Some(Range::new(0, 5)));
        assert!(window.fits(25));
        assert!(!window.fits(24));
        assert!(!Range::new(u64::MAX, 1).fits(u64::MAX));
    }
}
