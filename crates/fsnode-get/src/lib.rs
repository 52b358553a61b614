//! fsnode retrieval engine
//!
//! Answers Get, Head and GetRange for an address:
//! - the local shard is tried first
//! - a virtual object is reassembled from its chunks, fetched through the
//!   same pipeline
//! - otherwise candidate nodes from the placement traverser are queried,
//!   epoch by epoch, up to the configured lookback depth
//!
//! Payload reaches the caller through an `ObjectWriter` in ascending
//! offset order.

mod assemble;
mod exec;
pub mod local;
pub mod metrics;
pub mod prm;
pub mod remote;
pub mod service;
pub mod traverser;
pub mod writer;

// Re-exports
pub use local::LocalStorage;
pub use metrics::{GetMetrics, GetMetricsSnapshot};
pub use prm::GetPrm;
pub use remote::{RemoteObjectClient, RemoteRequest, ShardClient};
pub use service::GetService;
pub use traverser::{
    EpochSource, FixedEpoch, NodeAddress, StaticTraverser, StaticTraverserGenerator, Traverser,
    TraverserGenerator,
};
pub use writer::{ObjectWriter, SimpleObjectWriter};
