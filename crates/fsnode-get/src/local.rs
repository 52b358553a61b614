//! Access to objects stored on this node.

use fsnode_common::{Address, Object, Range, Result};
use fsnode_storage::Shard;

/// Local object source consulted before any remote node.
///
/// Failures follow the shared taxonomy: `ObjectNotFound`,
/// `AlreadyRemoved`, `SplitInfo` for virtual objects and
/// `RangeOutOfBounds`.
pub trait LocalStorage: Send + Sync {
    /// Full object with payload
    fn get(&self, address: &Address) -> Result<Object>;
    /// Header only
    fn head(&self, address: &Address, raw: bool) -> Result<Object>;
    /// Payload window
    fn get_range(&self, address: &Address, range: &Range) -> Result<Vec<u8>>;
}

impl LocalStorage for Shard {
    fn get(&self, address: &Address) -> Result<Object> {
        Self::get(self, address)
    }

    fn head(&self, address: &Address, raw: bool) -> Result<Object> {
        Self::head(self, address, raw)
    }

    fn get_range(&self, address: &Address, range: &Range) -> Result<Vec<u8>> {
        Self::get_range(self, address, range)
    }
}
