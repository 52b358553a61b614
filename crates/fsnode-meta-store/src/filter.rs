//! Search filters for `Metabase::select`.

use crate::matcher::MatchType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Well-known filter keys
pub mod keys {
    /// Keys starting with this prefix address header fields, not attributes
    pub const RESERVED_PREFIX: &str = "$Object:";

    pub const VERSION: &str = "$Object:version";
    pub const OBJECT_ID: &str = "$Object:objectID";
    pub const CONTAINER_ID: &str = "$Object:containerID";
    pub const OWNER_ID: &str = "$Object:ownerID";
    pub const CREATION_EPOCH: &str = "$Object:creationEpoch";
    pub const PAYLOAD_LENGTH: &str = "$Object:payloadLength";
    pub const PAYLOAD_HASH: &str = "$Object:payloadHash";
    pub const OBJECT_TYPE: &str = "$Object:objectType";
    pub const HOMOMORPHIC_HASH: &str = "$Object:homomorphicHash";
    pub const PARENT: &str = "$Object:split.parent";
    pub const SPLIT_ID: &str = "$Object:split.splitID";
    /// Objects without a parent
    pub const ROOT: &str = "$Object:ROOT";
    /// Physically stored objects
    pub const PHY: &str = "$Object:PHY";
}

/// One search predicate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub key: String,
    pub match_type: MatchType,
    pub value: String,
}

impl Filter {
    pub fn new(key: impl Into<String>, match_type: MatchType, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            match_type,
            value: value.into(),
        }
    }

    pub fn equal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, MatchType::StringEqual, value)
    }

    /// Root objects only
    #[must_use]
    pub fn root() -> Self {
        Self::new(keys::ROOT, MatchType::Unspecified, "")
    }

    /// Physically stored objects only
    #[must_use]
    pub fn phy() -> Self {
        Self::new(keys::PHY, MatchType::Unspecified, "")
    }

    /// Filters that need the decoded header to evaluate
    #[must_use]
    pub fn is_slow(&self) -> bool {
        matches!(
            self.key.as_str(),
            keys::VERSION | keys::CREATION_EPOCH | keys::PAYLOAD_LENGTH | keys::HOMOMORPHIC_HASH
        )
    }

    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.key.starts_with(keys::RESERVED_PREFIX)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.match_type {
            MatchType::NotPresent => return write!(f, "!{}", self.key),
            MatchType::Unspecified => return f.write_str(&self.key),
            MatchType::StringEqual => "=",
            MatchType::StringNotEqual => "!=",
            MatchType::CommonPrefix => "^=",
            MatchType::NumGT => ">",
            MatchType::NumGE => ">=",
            MatchType::NumLT => "<",
            MatchType::NumLE => "<=",
        };
        write!(f, "{}{}{}", self.key, op, self.value)
    }
}

impl FromStr for Filter {
    type Err = String;

    /// Parses `key=v`, `key!=v`, `key^=v`, `key>v`, `key>=v`, `key<v`,
    /// `key<=v`, `!key` or a bare `key` (ROOT/PHY style properties).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(key) = s.strip_prefix('!') {
            return Ok(Self::new(key, MatchType::NotPresent, ""));
        }
        const OPS: [(&str, MatchType); 7] = [
            ("!=", MatchType::StringNotEqual),
            ("^=", MatchType::CommonPrefix),
            (">=", MatchType::NumGE),
            ("<=", MatchType::NumLE),
            ("=", MatchType::StringEqual),
            (">", MatchType::NumGT),
            ("<", MatchType::NumLT),
        ];
        let found = OPS
            .iter()
            .filter_map(|(op, mt)| s.find(op).map(|pos| (pos, *op, *mt)))
            .min_by_key(|(pos, op, _)| (*pos, std::cmp::Reverse(op.len())));
        match found {
            Some((pos, op, match_type)) => {
                let key = &s[..pos];
                if key.is_empty() {
                    return Err(format!("filter without key: {s}"));
                }
                Ok(Self::new(key, match_type, &s[pos + op.len()..]))
            }
            None if s.is_empty() => Err("empty filter".to_string()),
            None => Ok(Self::new(s, MatchType::Unspecified, "")),
        }
    }
}

/// Ordered set of filters combined with AND
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    filters: Vec<Filter>,
}

impl SearchFilters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn add(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    pub fn add_object_type(&mut self, match_type: MatchType, object_type: fsnode_common::ObjectType) {
        self.add(Filter::new(keys::OBJECT_TYPE, match_type, object_type.as_str()));
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, Filter> {
        self.filters.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl From<Vec<Filter>> for SearchFilters {
    fn from(filters: Vec<Filter>) -> Self {
        Self { filters }
    }
}

impl FromIterator<Filter> for SearchFilters {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Self {
            filters: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SearchFilters {
    type Item = &'a Filter;
    type IntoIter = std::slice::Iter<'a, Filter>;

    fn into_iter(self) -> Self::IntoIter {
        self.filters.iter()
    }
}
