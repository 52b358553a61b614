//! fsnode common - Shared types and utilities
//!
//! This crate provides the object model, error definitions, checksums
//! and configuration used across all fsnode components.

pub mod checksum;
pub mod config;
pub mod error;
pub mod types;

pub use checksum::{Checksum, ChecksumCalculator, ChecksumKind};
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
