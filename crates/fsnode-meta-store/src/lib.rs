//! fsnode metabase - secondary indexes over the local object set
//!
//! This crate keeps every index of a storage node's objects in one redb
//! table: unique header records, root and parent lists for split objects,
//! payload-hash and split lists, owner and attribute markers, the graveyard
//! and per-container size aggregates. It answers exact lookups and
//! predicate searches over them.

pub mod containers;
pub mod delete;
pub mod filter;
pub mod get;
pub mod inhume;
pub mod keys;
pub mod matcher;
pub mod movable;
pub mod put;
pub mod select;
pub mod store;
pub mod tables;

// Re-exports
pub use filter::{Filter, SearchFilters};
pub use inhume::GraveyardEntry;
pub use matcher::MatchType;
pub use store::{Metabase, MetabaseError, MetabaseResult};
