//! Mapped JSONPath rules.
//!
//! A rule is a JSONPath query optionally followed by a regex mapping:
//!
//! ```text
//! <jsonpath>[/<regex>/<replacement>[/<L|U>]]
//! ```
//!
//! The path must start with `$.` or `$[`. Inside the path and the mapping a
//! backslash escapes the next character, so `\/` is a literal slash.

mod escape;
mod mapping;

pub use mapping::{CaseFold, Mapping};

use crate::path::{JsonPath, PathError};
use escape::split_escaped;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// A parsed rule mapping a document to zero or more strings.
///
/// Rules are parsed once (usually at configuration load) and then
/// evaluated against many documents. Evaluation only reads compiled state,
/// so a rule can be shared between threads.
#[derive(Debug, Clone)]
pub struct MappedJsonPath {
    /// Rule text exactly as given
    raw: String,
    /// Compiled path portion
    path: JsonPath,
    /// Optional regex mapping
    mapping: Option<Mapping>,
}

impl MappedJsonPath {
    /// Parse a rule.
    pub fn new(rule: impl Into<String>) -> Result<Self, RuleError> {
        let raw = rule.into();
        let (path_text, mapping_text) = split_rule(&raw)?;

        let path = JsonPath::parse(path_text).map_err(|source| RuleError::InvalidPath {
            path: path_text.to_string(),
            source,
        })?;

        let mapping = if mapping_text.is_empty() {
            None
        } else {
            Some(Mapping::parse(mapping_text)?)
        };

        Ok(Self { raw, path, mapping })
    }

    /// Parse a rule from its text encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RuleError> {
        let text = std::str::from_utf8(bytes).map_err(RuleError::InvalidUtf8)?;
        Self::new(text)
    }

    /// Get the original rule text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Get the original rule text as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    /// Get the compiled path.
    pub fn path(&self) -> &JsonPath {
        &self.path
    }

    /// Get the mapping, if the rule has one.
    pub fn mapping(&self) -> Option<&Mapping> {
        self.mapping.as_ref()
    }

    /// Evaluate the rule against a decoded document.
    ///
    /// Only string matches are kept. With a mapping, strings the regex does
    /// not match are dropped and the rest are rewritten. Results keep the
    /// path's match order and are not deduplicated. Never fails: anything
    /// that doesn't fit simply produces no value.
    pub fn eval(&self, document: &JsonValue) -> Vec<String> {
        self.path
            .select(document)
            .into_iter()
            .filter_map(JsonValue::as_str)
            .filter_map(|value| match &self.mapping {
                Some(mapping) => mapping.apply(value),
                None => Some(value.to_string()),
            })
            .collect()
    }
}

/// Split a rule into its path and its mapping suffix (which keeps the
/// leading `/`). The suffix is empty when the rule has no mapping.
pub(crate) fn split_rule(rule: &str) -> Result<(&str, &str), RuleError> {
    if rule.is_empty() {
        return Err(RuleError::Empty);
    }
    if !rule.starts_with("$.") && !rule.starts_with("$[") {
        return Err(RuleError::MissingPrefix);
    }

    let pieces = split_escaped(rule, '/')?;
    let path = pieces[0];
    Ok((path, &rule[path.len()..]))
}

impl PartialEq for MappedJsonPath {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for MappedJsonPath {}

impl FromStr for MappedJsonPath {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for MappedJsonPath {
    type Error = RuleError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for MappedJsonPath {
    type Error = RuleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for MappedJsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for MappedJsonPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for MappedJsonPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur while parsing a rule.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("rule is empty")]
    Empty,

    #[error("rule must start with `$.` or `$[`")]
    MissingPrefix,

    #[error("mapping must start with `/`")]
    MissingMappingDelimiter,

    #[error("unterminated escape sequence")]
    UnterminatedEscape,

    #[error("mapping must have 2 or 3 parts, got {0}")]
    PartCount(usize),

    #[error("unknown flag {0:?}, expected `L` or `U`")]
    UnknownFlag(String),

    #[error("invalid path {path:?}: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: PathError,
    },

    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule is not valid UTF-8: {0}")]
    InvalidUtf8(#[source] std::str::Utf8Error),
}
