//! Filter predicates (`[?...]`) and their evaluation.

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum FilterExpr {
    Or(Vec<FilterExpr>),
    And(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    /// True when the query selects a node, whatever its value
    Exists(Query),
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Operand {
    Literal(JsonValue),
    Query(Query),
}

/// A query that selects at most one node.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Query {
    pub(super) root: QueryRoot,
    pub(super) selectors: Vec<SingularSelector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum QueryRoot {
    /// `@`, the node under test
    Current,
    /// `$`, the document root
    Root,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum SingularSelector {
    Name(String),
    Index(i64),
}

impl FilterExpr {
    /// Test the predicate against `current`.
    pub(super) fn test(&self, root: &JsonValue, current: &JsonValue) -> bool {
        match self {
            Self::Or(terms) => terms.iter().any(|t| t.test(root, current)),
            Self::And(terms) => terms.iter().all(|t| t.test(root, current)),
            Self::Not(inner) => !inner.test(root, current),
            Self::Exists(query) => query.resolve(root, current).is_some(),
            Self::Compare { left, op, right } => {
                let left = left.resolve(root, current);
                let right = right.resolve(root, current);
                compare(left, *op, right)
            }
        }
    }
}

impl Operand {
    fn resolve<'a>(&'a self, root: &'a JsonValue, current: &'a JsonValue) -> Option<&'a JsonValue> {
        match self {
            Self::Literal(value) => Some(value),
            Self::Query(query) => query.resolve(root, current),
        }
    }
}

impl Query {
    fn resolve<'a>(&self, root: &'a JsonValue, current: &'a JsonValue) -> Option<&'a JsonValue> {
        let start = match self.root {
            QueryRoot::Current => current,
            QueryRoot::Root => root,
        };

        self.selectors
            .iter()
            .try_fold(start, |node, selector| match selector {
                SingularSelector::Name(name) => node.as_object()?.get(name),
                SingularSelector::Index(index) => {
                    let items = node.as_array()?;
                    let index = super::normalize_index(*index, items.len())?;
                    items.get(index)
                }
            })
    }
}

/// Compare two optional nodes. A missing node only equals another missing node.
fn compare(left: Option<&JsonValue>, op: CmpOp, right: Option<&JsonValue>) -> bool {
    match op {
        CmpOp::Eq => equal(left, right),
        CmpOp::Ne => !equal(left, right),
        CmpOp::Lt => less(left, right),
        CmpOp::Le => less(left, right) || equal(left, right),
        CmpOp::Gt => less(right, left),
        CmpOp::Ge => less(right, left) || equal(left, right),
    }
}

fn equal(left: Option<&JsonValue>, right: Option<&JsonValue>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(l), Some(r)) => values_equal(l, r),
        _ => false,
    }
}

fn values_equal(left: &JsonValue, right: &JsonValue) -> bool {
    match (left, right) {
        (JsonValue::Number(l), JsonValue::Number(r)) => l.as_f64() == r.as_f64(),
        (JsonValue::Array(l), JsonValue::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r).all(|(a, b)| values_equal(a, b))
        }
        (JsonValue::Object(l), JsonValue::Object(r)) => {
            l.len() == r.len()
                && l.iter()
                    .all(|(k, v)| r.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => left == right,
    }
}

/// Ordering is only defined between two numbers or two strings.
fn less(left: Option<&JsonValue>, right: Option<&JsonValue>) -> bool {
    match (left, right) {
        (Some(JsonValue::Number(l)), Some(JsonValue::Number(r))) => {
            matches!((l.as_f64(), r.as_f64()), (Some(l), Some(r)) if l < r)
        }
        (Some(JsonValue::String(l)), Some(JsonValue::String(r))) => l < r,
        _ => false,
    }
}
