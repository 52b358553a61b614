//! Error types for fsnode
//!
//! This module defines the common error types used throughout the system.

use crate::types::{Address, ContainerId, IdParseError, ObjectId, SplitInfo};
use thiserror::Error;

/// Common result type for fsnode operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for fsnode
#[derive(Debug, Error)]
pub enum Error {
    #[error("object not found: {0}")]
    ObjectNotFound(Address),

    #[error("container not found: {0}")]
    ContainerNotFound(ContainerId),

    #[error("object already removed: {0}")]
    AlreadyRemoved(Address),

    /// The address names a virtual object; the payload must be assembled
    /// from the chunks described by the split info.
    #[error("object is virtual: {0}")]
    SplitInfo(Box<SplitInfo>),

    #[error("range out of bounds: offset {offset}, length {length}, payload size {size}")]
    RangeOutOfBounds { offset: u64, length: u64, size: u64 },

    #[error("malformed child {child}: {reason}")]
    MalformedChild { child: ObjectId, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("storage error during {op} of {address}: {message}")]
    Storage {
        op: &'static str,
        address: String,
        message: String,
    },

    #[error("disk I/O error: {0}")]
    DiskIo(#[from] std::io::Error),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("remote node {node}: {message}")]
    Remote { node: String, message: String },

    #[error("request timeout")]
    Timeout,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdParseError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a storage error with operation context
    pub fn storage(op: &'static str, address: impl ToString, msg: impl ToString) -> Self {
        Self::Storage {
            op,
            address: address.to_string(),
            message: msg.to_string(),
        }
    }

    /// Create a remote error
    pub fn remote(node: impl ToString, msg: impl ToString) -> Self {
        Self::Remote {
            node: node.to_string(),
            message: msg.to_string(),
        }
    }

    /// Create a split info error
    #[must_use]
    pub fn split_info(info: SplitInfo) -> Self {
        Self::SplitInfo(Box::new(info))
    }

    /// Check if this is a retryable error
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Remote { .. })
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound(_) | Self::ContainerNotFound(_))
    }

    /// Check if the object was removed
    #[must_use]
    pub const fn is_already_removed(&self) -> bool {
        matches!(self, Self::AlreadyRemoved(_))
    }

    /// Split info carried by this error, if any
    #[must_use]
    pub fn as_split_info(&self) -> Option<&SplitInfo> {
        match self {
            Self::SplitInfo(info) => Some(info),
            _ => None,
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
