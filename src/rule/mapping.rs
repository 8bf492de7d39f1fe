//! The `/regex/replacement/flag` suffix of a rule.

use super::escape::{split_escaped, unescape_delimiter};
use super::RuleError;
use regex::Regex;

/// Compiled regex filter, replacement and case directive.
#[derive(Debug, Clone)]
pub struct Mapping {
    /// Values that don't match are dropped
    pattern: Regex,
    /// Replacement template, `$1` / `${name}` expand to capture groups
    replacement: String,
    case: CaseFold,
}

/// Case transformation applied after replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseFold {
    #[default]
    None,
    /// `L` flag
    Lower,
    /// `U` flag
    Upper,
}

impl Mapping {
    /// Parse a mapping suffix such as `/([^@]+)@.*/$1/L`.
    pub fn parse(mapping: &str) -> Result<Self, RuleError> {
        if !mapping.starts_with('/') {
            return Err(RuleError::MissingMappingDelimiter);
        }

        let mut parts = split_mapping_parts(mapping)?;
        let case = match parts.len() {
            2 => CaseFold::None,
            3 => CaseFold::from_flag(&parts[2])?,
            n => return Err(RuleError::PartCount(n)),
        };
        parts.truncate(2);
        let replacement = parts.pop().unwrap_or_default();
        let pattern_text = parts.pop().unwrap_or_default();

        let pattern = Regex::new(&pattern_text).map_err(|source| RuleError::InvalidRegex {
            pattern: pattern_text.clone(),
            source,
        })?;

        Ok(Self {
            pattern,
            replacement,
            case,
        })
    }

    /// Get the compiled pattern.
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Get the replacement template.
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Get the case directive.
    pub fn case(&self) -> CaseFold {
        self.case
    }

    /// Filter and rewrite a single value.
    ///
    /// Returns `None` when the pattern does not match anywhere in `value`;
    /// such values are dropped rather than passed through.
    pub fn apply(&self, value: &str) -> Option<String> {
        if !self.pattern.is_match(value) {
            return None;
        }
        let replaced = self.pattern.replace_all(value, self.replacement.as_str());
        Some(self.case.apply(replaced.into_owned()))
    }
}

impl CaseFold {
    fn from_flag(flag: &str) -> Result<Self, RuleError> {
        match flag {
            "L" => Ok(Self::Lower),
            "U" => Ok(Self::Upper),
            other => Err(RuleError::UnknownFlag(other.to_string())),
        }
    }

    /// Apply the case transformation.
    pub fn apply(self, value: String) -> String {
        match self {
            Self::None => value,
            Self::Lower => value.to_lowercase(),
            Self::Upper => value.to_uppercase(),
        }
    }
}

/// Strip the leading `/` and split the rest on unescaped `/`.
pub(crate) fn split_mapping_parts(mapping: &str) -> Result<Vec<String>, RuleError> {
    let body = mapping.strip_prefix('/').unwrap_or(mapping);

    Ok(split_escaped(body, '/')?
        .into_iter()
        .map(|part| unescape_delimiter(part, '/'))
        .collect())
}
