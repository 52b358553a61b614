//! Placement traversal: which nodes to ask, batch by batch.

use async_trait::async_trait;
use fsnode_common::{Address, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Network address of a storage node
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAddress(pub String);

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lazy iterator over candidate nodes for one address at one epoch.
///
/// An empty batch means the candidates are exhausted.
pub trait Traverser: Send {
    fn next(&mut self) -> Vec<NodeAddress>;
}

/// Builds a fresh traverser per address and epoch
#[async_trait]
pub trait TraverserGenerator: Send + Sync {
    async fn generate(&self, address: &Address, epoch: u64) -> Result<Box<dyn Traverser>>;
}

/// Current network map epoch
pub trait EpochSource: Send + Sync {
    fn current_epoch(&self) -> u64;
}

/// Epoch source that never advances
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedEpoch(pub u64);

impl EpochSource for FixedEpoch {
    fn current_epoch(&self) -> u64 {
        self.0
    }
}

/// Traverser over a precomputed list of batches
#[derive(Clone, Debug, Default)]
pub struct StaticTraverser {
    batches: VecDeque<Vec<NodeAddress>>,
}

impl StaticTraverser {
    #[must_use]
    pub fn new(batches: Vec<Vec<NodeAddress>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }
}

impl Traverser for StaticTraverser {
    fn next(&mut self) -> Vec<NodeAddress> {
        self.batches.pop_front().unwrap_or_default()
    }
}

/// Placement fixed per epoch, the same for every address.
///
/// Epochs without an entry fall back to `default` when one is set, and
/// fail otherwise.
#[derive(Clone, Debug, Default)]
pub struct StaticTraverserGenerator {
    epochs: HashMap<u64, Vec<Vec<NodeAddress>>>,
    default: Option<Vec<Vec<NodeAddress>>>,
}

impl StaticTraverserGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Same single batch of nodes at every epoch
    #[must_use]
    pub fn uniform(nodes: Vec<NodeAddress>) -> Self {
        Self {
            epochs: HashMap::new(),
            default: Some(vec![nodes]),
        }
    }

    #[must_use]
    pub fn with_epoch(mut self, epoch: u64, batches: Vec<Vec<NodeAddress>>) -> Self {
        self.epochs.insert(epoch, batches);
        self
    }
}

#[async_trait]
impl TraverserGenerator for StaticTraverserGenerator {
    async fn generate(&self, address: &Address, epoch: u64) -> Result<Box<dyn Traverser>> {
        let batches = self
            .epochs
            .get(&epoch)
            .or(self.default.as_ref())
            .ok_or_else(|| Error::internal(format!("no placement for {address} at epoch {epoch}")))?;
        Ok(Box::new(StaticTraverser::new(batches.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsnode_common::{ContainerId, ObjectId};

    #[tokio::test]
    async fn test_static_generator() {
        let address = Address::new(ContainerId::new([1; 32]), ObjectId::new([2; 32]));
        let generator = StaticTraverserGenerator::new()
            .with_epoch(7, vec![vec!["a".into(), "b".into()], vec!["c".into()]]);

        let mut traverser = generator.generate(&address, 7).await.unwrap();
        assert_eq!(traverser.next().len(), 2);
        assert_eq!(traverser.next(), vec![NodeAddress::from("c")]);
        assert!(traverser.next().is_empty());
        assert!(generator.generate(&address, 6).await.is_err());

        let uniform = StaticTraverserGenerator::uniform(vec!["x".into()]);
        let mut traverser = uniform.generate(&address, 123).await.unwrap();
        assert_eq!(traverser.next(), vec![NodeAddress::from("x")]);
    }
}
