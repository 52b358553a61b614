//! Match registry: predicates over raw indexed values.
//!
//! Values are first rendered as text according to the filter key they were
//! indexed under, then compared with the filter value.

use crate::filter::keys as filter_keys;
use fsnode_common::SplitId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of comparison a search filter performs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    /// Never matches
    #[default]
    Unspecified,
    StringEqual,
    StringNotEqual,
    /// The attribute is absent
    NotPresent,
    CommonPrefix,
    NumGT,
    NumGE,
    NumLT,
    NumLE,
}

impl MatchType {
    /// Compare an indexed value against the filter value
    #[must_use]
    pub fn matches(self, key: &str, value: &[u8], filter: &str) -> bool {
        let Some(value) = stringify_value(key, value) else {
            return false;
        };
        match self {
            Self::Unspecified | Self::NotPresent => false,
            Self::StringEqual => value == filter,
            Self::StringNotEqual => value != filter,
            Self::CommonPrefix => value.starts_with(filter),
            Self::NumGT => numeric(&value, filter, |a, b| a > b),
            Self::NumGE => numeric(&value, filter, |a, b| a >= b),
            Self::NumLT => numeric(&value, filter, |a, b| a < b),
            Self::NumLE => numeric(&value, filter, |a, b| a <= b),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::StringEqual => "STRING_EQUAL",
            Self::StringNotEqual => "STRING_NOT_EQUAL",
            Self::NotPresent => "NOT_PRESENT",
            Self::CommonPrefix => "COMMON_PREFIX",
            Self::NumGT => "NUM_GT",
            Self::NumGE => "NUM_GE",
            Self::NumLT => "NUM_LT",
            Self::NumLE => "NUM_LE",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Unspecified,
            Self::StringEqual,
            Self::StringNotEqual,
            Self::NotPresent,
            Self::CommonPrefix,
            Self::NumGT,
            Self::NumGE,
            Self::NumLT,
            Self::NumLE,
        ]
        .into_iter()
        .find(|m| m.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("unknown match type: {s}"))
    }
}

fn numeric(value: &str, filter: &str, cmp: impl Fn(u64, u64) -> bool) -> bool {
    match (value.parse::<u64>(), filter.parse::<u64>()) {
        (Ok(a), Ok(b)) => cmp(a, b),
        _ => false,
    }
}

/// Render a raw indexed value as the text a filter compares against
///
/// Binary identifiers render as hex, epochs and lengths as decimal.
/// `None` when the bytes cannot be rendered for the key.
#[must_use]
pub fn stringify_value(key: &str, value: &[u8]) -> Option<String> {
    match key {
        filter_keys::PAYLOAD_HASH
        | filter_keys::HOMOMORPHIC_HASH
        | filter_keys::OBJECT_ID
        | filter_keys::OWNER_ID
        | filter_keys::CONTAINER_ID
        | filter_keys::PARENT => Some(hex::encode(value)),
        filter_keys::CREATION_EPOCH | filter_keys::PAYLOAD_LENGTH => {
            let bytes: [u8; 8] = value.try_into().ok()?;
            Some(u64::from_le_bytes(bytes).to_string())
        }
        filter_keys::SPLIT_ID => SplitId::from_slice(value).ok().map(|s| s.to_string()),
        _ => std::str::from_utf8(value).ok().map(str::to_string),
    }
}
