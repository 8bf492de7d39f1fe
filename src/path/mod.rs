//! Compiled JSONPath expressions.
//!
//! Supported syntax:
//!
//! - `$.field`, `$.field.subfield`, `$.a\/b` (backslash escapes a character)
//! - `$['quoted key']`, `$["with.dots"]`, `$['a', 'b']`
//! - `$.items[0]`, `$.items[-1]`, `$.items[1:3]`, `$.items[::-1]`
//! - `$.items[*]`, `$.*`, `$..name`, `$..[0]`
//! - `$.items[?(@.kind == 'email' && @.verified)]`

mod filter;
mod parser;

use filter::FilterExpr;
use parser::Parser;
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// A parsed JSONPath expression.
///
/// Parsing happens once; [`JsonPath::select`] only reads the compiled
/// segments, so a path can be shared freely between threads.
#[derive(Debug, Clone)]
pub struct JsonPath {
    /// Source text of the expression
    expression: String,
    /// Compiled segments, applied left to right
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    /// Apply selectors to the children of each node
    Child(Vec<Selector>),
    /// Apply selectors to each node and all of its descendants
    Descendant(Vec<Selector>),
}

#[derive(Debug, Clone, PartialEq)]
enum Selector {
    Name(String),
    Wildcard,
    Index(i64),
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    Filter(FilterExpr),
}

impl JsonPath {
    /// Parse a JSONPath expression.
    pub fn parse(expression: &str) -> Result<Self, PathError> {
        let segments = Parser::new(expression).parse_path()?;

        Ok(Self {
            expression: expression.to_string(),
            segments,
        })
    }

    /// Get the original expression text.
    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// Select all nodes matched by this path, in document order.
    pub fn select<'a>(&self, root: &'a JsonValue) -> Vec<&'a JsonValue> {
        let mut nodes = vec![root];

        for segment in &self.segments {
            let mut next = Vec::new();
            for node in nodes {
                segment.apply(root, node, &mut next);
            }
            if next.is_empty() {
                return next;
            }
            nodes = next;
        }

        nodes
    }
}

impl Segment {
    fn apply<'a>(&self, root: &'a JsonValue, node: &'a JsonValue, out: &mut Vec<&'a JsonValue>) {
        match self {
            Self::Child(selectors) => {
                for selector in selectors {
                    selector.apply(root, node, out);
                }
            }
            Self::Descendant(selectors) => {
                let mut stack = vec![node];
                while let Some(current) = stack.pop() {
                    for selector in selectors {
                        selector.apply(root, current, out);
                    }
                    // Reverse push keeps the traversal pre-order.
                    match current {
                        JsonValue::Array(items) => stack.extend(items.iter().rev()),
                        JsonValue::Object(map) => stack.extend(map.values().rev()),
                        _ => {}
                    }
                }
            }
        }
    }
}

impl Selector {
    fn apply<'a>(&self, root: &'a JsonValue, node: &'a JsonValue, out: &mut Vec<&'a JsonValue>) {
        match self {
            Self::Name(name) => {
                if let Some(value) = node.as_object().and_then(|map| map.get(name)) {
                    out.push(value);
                }
            }
            Self::Wildcard => out.extend(children(node)),
            Self::Index(index) => {
                if let JsonValue::Array(items) = node {
                    if let Some(value) = normalize_index(*index, items.len()).and_then(|i| items.get(i)) {
                        out.push(value);
                    }
                }
            }
            Self::Slice { start, end, step } => {
                if let JsonValue::Array(items) = node {
                    for i in slice_indices(*start, *end, *step, items.len()) {
                        out.push(&items[i]);
                    }
                }
            }
            Self::Filter(expr) => {
                out.extend(children(node).filter(|child| expr.test(root, child)));
            }
        }
    }
}

/// Iterate over array elements or object member values.
fn children(node: &JsonValue) -> Box<dyn Iterator<Item = &JsonValue> + '_> {
    match node {
        JsonValue::Array(items) => Box::new(items.iter()),
        JsonValue::Object(map) => Box::new(map.values()),
        _ => Box::new(std::iter::empty()),
    }
}

/// Resolve a possibly negative index against an array length.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { len + index } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

/// Compute the element indices selected by a slice, Python style.
fn slice_indices(start: Option<i64>, end: Option<i64>, step: Option<i64>, len: usize) -> Vec<usize> {
    let step = step.unwrap_or(1);
    let Ok(len) = i64::try_from(len) else {
        return vec![];
    };
    let normalize = |i: i64| if i >= 0 { i } else { len + i };

    let mut indices = Vec::new();
    if step > 0 {
        let lower = start.map_or(0, normalize).clamp(0, len);
        let upper = end.map_or(len, normalize).clamp(0, len);
        let mut next = Some(lower);
        while let Some(i) = next.filter(|&i| i < upper) {
            indices.extend(usize::try_from(i).ok());
            next = i.checked_add(step);
        }
    } else if step < 0 {
        let upper = start.map_or(len - 1, normalize).clamp(-1, len - 1);
        let lower = end.map_or(-1, normalize).clamp(-1, len - 1);
        let mut next = Some(upper);
        while let Some(i) = next.filter(|&i| i > lower) {
            indices.extend(usize::try_from(i).ok());
            next = i.checked_add(step);
        }
    }
    indices
}

impl FromStr for JsonPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Errors that can occur while parsing a JSONPath expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("expected {expected} at offset {offset}, found end of path")]
    UnexpectedEnd {
        expected: &'static str,
        offset: usize,
    },

    #[error("expected {expected} at offset {offset}, found {found:?}")]
    Unexpected {
        expected: &'static str,
        found: char,
        offset: usize,
    },

    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },

    #[error("invalid number {text:?} at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("filter nested deeper than {limit} levels at offset {offset}")]
    TooDeep { limit: usize, offset: usize },
}
