//! Fetching objects from other storage nodes.

use crate::traverser::NodeAddress;
use async_trait::async_trait;
use fsnode_common::{Address, Error, Object, Range, Result};
use fsnode_storage::Shard;
use std::collections::HashMap;
use std::sync::Arc;

/// Shape of a remote fetch, mirroring the local request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteRequest {
    pub address: Address,
    /// Payload window; the answer's payload holds only these bytes
    pub range: Option<Range>,
    /// Header only, no payload
    pub head_only: bool,
    pub raw: bool,
}

/// Transport to other nodes.
///
/// Remote failures use the shared taxonomy so the engine can tell a
/// virtual object (`SplitInfo`) and a removed one (`AlreadyRemoved`) from
/// an unreachable or empty node.
#[async_trait]
pub trait RemoteObjectClient: Send + Sync {
    async fn get(&self, node: &NodeAddress, request: &RemoteRequest) -> Result<Object>;
}

/// Client that answers from shards opened in this process, one per node
#[derive(Clone, Default)]
pub struct ShardClient {
    nodes: HashMap<NodeAddress, Arc<Shard>>,
}

impl ShardClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_node(mut self, node: NodeAddress, shard: Arc<Shard>) -> Self {
        self.nodes.insert(node, shard);
        self
    }

    /// Known node addresses, sorted
    #[must_use]
    pub fn nodes(&self) -> Vec<NodeAddress> {
        let mut nodes: Vec<_> = self.nodes.keys().cloned().collect();
        nodes.sort();
        nodes
    }
}

#[async_trait]
impl RemoteObjectClient for ShardClient {
    async fn get(&self, node: &NodeAddress, request: &RemoteRequest) -> Result<Object> {
        let shard = self
            .nodes
            .get(node)
            .ok_or_else(|| Error::remote(node, "unknown node"))?;
        let address = &request.address;
        if request.head_only {
            return shard.head(address, request.raw);
        }
        match request.range {
            Some(range) => {
                let mut obj = shard.head(address, true)?;
                obj.payload = Some(shard.get_range(address, &range)?);
                Ok(obj)
            }
            None => shard.get(address),
        }
    }
}
