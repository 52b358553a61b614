//! fsnode storage - the local shard
//!
//! A shard couples two stores:
//! - `BlobStore`: full payloads spread over partition tables
//! - `Metabase`: headers and secondary indexes, with a location pointer
//!   naming the partition that holds each payload

pub mod blob;
pub mod shard;

// Re-exports
pub use blob::{BlobError, BlobResult, BlobStats, BlobStore};
pub use shard::Shard;
