//! Request parameters shared by Get, Head and GetRange.

use fsnode_common::Address;
use tokio_util::sync::CancellationToken;

/// Parameters of one retrieval request
#[derive(Clone, Debug)]
pub struct GetPrm {
    pub address: Address,
    /// Report virtual objects as split info instead of assembling them
    pub raw: bool,
    /// Never leave this node
    pub local: bool,
    /// Placement epoch to start from; 0 asks the epoch source
    pub netmap_epoch: u64,
    pub cancel: CancellationToken,
}

impl GetPrm {
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            address,
            raw: false,
            local: false,
            netmap_epoch: 0,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub const fn with_raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    #[must_use]
    pub const fn with_local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    #[must_use]
    pub const fn with_epoch(mut self, epoch: u64) -> Self {
        self.netmap_epoch = epoch;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
