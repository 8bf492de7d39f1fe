//! Recursive-descent parser for JSONPath expressions.

use super::filter::{CmpOp, FilterExpr, Operand, Query, QueryRoot, SingularSelector};
use super::{PathError, Segment, Selector};
use serde_json::Value as JsonValue;

/// Maximum nesting of `!` and `(` inside a filter.
pub(super) const MAX_FILTER_DEPTH: usize = 64;

pub(super) struct Parser<'a> {
    input: &'a str,
    /// Byte offset of the next unread character
    pos: usize,
    /// Current `!`/`(` nesting inside a filter
    depth: usize,
}

impl<'a> Parser<'a> {
    pub(super) fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    /// Parse a complete `$...` expression.
    pub(super) fn parse_path(mut self) -> Result<Vec<Segment>, PathError> {
        if self.input.is_empty() {
            return Err(PathError::Empty);
        }
        self.expect('$', "`$`")?;

        let mut segments = Vec::new();
        while let Some(c) = self.peek() {
            let segment = match c {
                '.' => {
                    self.bump();
                    if self.eat('.') {
                        Segment::Descendant(self.parse_descendant_selectors()?)
                    } else {
                        Segment::Child(vec![self.parse_dot_selector()?])
                    }
                }
                '[' => Segment::Child(self.parse_bracket()?),
                _ => return Err(self.error("`.` or `[`")),
            };
            segments.push(segment);
        }

        Ok(segments)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char, expected: &'static str) -> Result<(), PathError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.pos += 1;
        }
    }

    fn error(&self, expected: &'static str) -> PathError {
        match self.peek() {
            Some(found) => PathError::Unexpected {
                expected,
                found,
                offset: self.pos,
            },
            None => PathError::UnexpectedEnd {
                expected,
                offset: self.pos,
            },
        }
    }

    fn parse_descendant_selectors(&mut self) -> Result<Vec<Selector>, PathError> {
        if self.peek() == Some('[') {
            self.parse_bracket()
        } else {
            Ok(vec![self.parse_dot_selector()?])
        }
    }

    fn parse_dot_selector(&mut self) -> Result<Selector, PathError> {
        if self.eat('*') {
            Ok(Selector::Wildcard)
        } else {
            Ok(Selector::Name(self.parse_name()?))
        }
    }

    /// Parse an unquoted member name. A backslash takes the next character literally.
    fn parse_name(&mut self) -> Result<String, PathError> {
        let mut name = String::new();

        while let Some(c) = self.peek() {
            if c == '\\' {
                let offset = self.pos;
                self.bump();
                match self.bump() {
                    Some(escaped) => name.push(escaped),
                    None => return Err(PathError::InvalidEscape { offset }),
                }
            } else if is_name_char(c) {
                self.bump();
                name.push(c);
            } else {
                break;
            }
        }

        if name.is_empty() {
            return Err(self.error("member name"));
        }
        Ok(name)
    }

    fn parse_bracket(&mut self) -> Result<Vec<Selector>, PathError> {
        self.expect('[', "`[`")?;
        self.skip_ws();

        let mut selectors = vec![self.parse_selector()?];
        loop {
            self.skip_ws();
            if !self.eat(',') {
                break;
            }
            self.skip_ws();
            selectors.push(self.parse_selector()?);
        }

        self.expect(']', "`]`")?;
        Ok(selectors)
    }

    fn parse_selector(&mut self) -> Result<Selector, PathError> {
        match self.peek() {
            Some('\'' | '"') => Ok(Selector::Name(self.parse_string()?)),
            Some('*') => {
                self.bump();
                Ok(Selector::Wildcard)
            }
            Some('?') => {
                self.bump();
                self.skip_ws();
                Ok(Selector::Filter(self.parse_or()?))
            }
            Some(c) if c == '-' || c == ':' || c.is_ascii_digit() => self.parse_index_or_slice(),
            _ => Err(self.error("selector")),
        }
    }

    fn parse_index_or_slice(&mut self) -> Result<Selector, PathError> {
        let start = self.parse_optional_int()?;
        self.skip_ws();

        if !self.eat(':') {
            return match start {
                Some(index) => Ok(Selector::Index(index)),
                None => Err(self.error("index")),
            };
        }

        self.skip_ws();
        let end = self.parse_optional_int()?;
        self.skip_ws();
        let step = if self.eat(':') {
            self.skip_ws();
            self.parse_optional_int()?
        } else {
            None
        };

        Ok(Selector::Slice { start, end, step })
    }

    fn parse_optional_int(&mut self) -> Result<Option<i64>, PathError> {
        let start = self.pos;
        self.eat('-');
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }

        let text = &self.input[start..self.pos];
        if text.is_empty() {
            return Ok(None);
        }
        text.parse()
            .map(Some)
            .map_err(|_| PathError::InvalidNumber {
                text: text.to_string(),
                offset: start,
            })
    }

    /// Parse a single- or double-quoted string with JSON-style escapes.
    fn parse_string(&mut self) -> Result<String, PathError> {
        let offset = self.pos;
        let quote = self.bump().ok_or(PathError::UnterminatedString { offset })?;
        let mut value = String::new();

        loop {
            let c = self
                .bump()
                .ok_or(PathError::UnterminatedString { offset })?;
            if c == quote {
                return Ok(value);
            }
            if c != '\\' {
                value.push(c);
                continue;
            }

            let escape_offset = self.pos - 1;
            let escaped = self
                .bump()
                .ok_or(PathError::UnterminatedString { offset })?;
            match escaped {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                'b' => value.push('\u{8}'),
                'f' => value.push('\u{c}'),
                'u' => value.push(self.parse_unicode_escape(escape_offset)?),
                other => value.push(other),
            }
        }
    }

    /// Parse the hex digits of a `\uXXXX` escape, joining surrogate pairs.
    fn parse_unicode_escape(&mut self, offset: usize) -> Result<char, PathError> {
        let high = self.parse_hex4(offset)?;
        if !(0xD800..0xDC00).contains(&high) {
            return char::from_u32(high).ok_or(PathError::InvalidEscape { offset });
        }

        if !self.eat_str("\\u") {
            return Err(PathError::InvalidEscape { offset });
        }
        let low = self.parse_hex4(offset)?;
        if !(0xDC00..0xE000).contains(&low) {
            return Err(PathError::InvalidEscape { offset });
        }
        let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
        char::from_u32(code).ok_or(PathError::InvalidEscape { offset })
    }

    fn parse_hex4(&mut self, offset: usize) -> Result<u32, PathError> {
        let digits = self
            .rest()
            .get(..4)
            .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or(PathError::InvalidEscape { offset })?;
        let code =
            u32::from_str_radix(digits, 16).map_err(|_| PathError::InvalidEscape { offset })?;
        self.pos += 4;
        Ok(code)
    }

    fn parse_or(&mut self) -> Result<FilterExpr, PathError> {
        let mut terms = vec![self.parse_and()?];
        loop {
            self.skip_ws();
            if !self.eat_str("||") {
                break;
            }
            terms.push(self.parse_and()?);
        }

        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            FilterExpr::Or(terms)
        })
    }

    fn parse_and(&mut self) -> Result<FilterExpr, PathError> {
        let mut terms = vec![self.parse_unary()?];
        loop {
            self.skip_ws();
            if !self.eat_str("&&") {
                break;
            }
            terms.push(self.parse_unary()?);
        }

        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            FilterExpr::And(terms)
        })
    }

    fn parse_unary(&mut self) -> Result<FilterExpr, PathError> {
        self.skip_ws();

        if self.rest().starts_with('!') && !self.rest().starts_with("!=") {
            self.enter()?;
            self.bump();
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(FilterExpr::Not(Box::new(inner)));
        }

        if self.peek() == Some('(') {
            self.enter()?;
            self.bump();
            let expr = self.parse_or()?;
            self.skip_ws();
            self.expect(')', "`)`")?;
            self.depth -= 1;
            return Ok(expr);
        }

        self.parse_comparison()
    }

    fn enter(&mut self) -> Result<(), PathError> {
        if self.depth >= MAX_FILTER_DEPTH {
            return Err(PathError::TooDeep {
                limit: MAX_FILTER_DEPTH,
                offset: self.pos,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_comparison(&mut self) -> Result<FilterExpr, PathError> {
        let left = self.parse_operand()?;
        self.skip_ws();

        let Some(op) = self.parse_cmp_op() else {
            return match left {
                Operand::Query(query) => Ok(FilterExpr::Exists(query)),
                Operand::Literal(_) => Err(self.error("comparison operator")),
            };
        };

        self.skip_ws();
        let right = self.parse_operand()?;
        Ok(FilterExpr::Compare { left, op, right })
    }

    fn parse_cmp_op(&mut self) -> Option<CmpOp> {
        // Two-character operators first so `<=` is not read as `<`.
        let ops = [
            ("==", CmpOp::Eq),
            ("!=", CmpOp::Ne),
            ("<=", CmpOp::Le),
            (">=", CmpOp::Ge),
            ("<", CmpOp::Lt),
            (">", CmpOp::Gt),
        ];
        ops.into_iter()
            .find(|(token, _)| self.eat_str(token))
            .map(|(_, op)| op)
    }

    fn parse_operand(&mut self) -> Result<Operand, PathError> {
        match self.peek() {
            Some('@') => {
                self.bump();
                Ok(Operand::Query(self.parse_query(QueryRoot::Current)?))
            }
            Some('$') => {
                self.bump();
                Ok(Operand::Query(self.parse_query(QueryRoot::Root)?))
            }
            Some('\'' | '"') => Ok(Operand::Literal(JsonValue::String(self.parse_string()?))),
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_number().map(Operand::Literal),
            Some(c) if c.is_ascii_alphabetic() => self.parse_keyword().map(Operand::Literal),
            _ => Err(self.error("operand")),
        }
    }

    /// Parse the name and index steps of a singular query after `@` or `$`.
    fn parse_query(&mut self, root: QueryRoot) -> Result<Query, PathError> {
        let mut selectors = Vec::new();

        loop {
            match self.peek() {
                Some('.') => {
                    self.bump();
                    selectors.push(SingularSelector::Name(self.parse_name()?));
                }
                Some('[') => {
                    self.bump();
                    self.skip_ws();
                    let selector = match self.peek() {
                        Some('\'' | '"') => SingularSelector::Name(self.parse_string()?),
                        _ => match self.parse_optional_int()? {
                            Some(index) => SingularSelector::Index(index),
                            None => return Err(self.error("name or index")),
                        },
                    };
                    self.skip_ws();
                    self.expect(']', "`]`")?;
                    selectors.push(selector);
                }
                _ => break,
            }
        }

        Ok(Query { root, selectors })
    }

    fn parse_number(&mut self) -> Result<JsonValue, PathError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.bump();
        }

        let text = &self.input[start..self.pos];
        serde_json::from_str::<serde_json::Number>(text)
            .map(JsonValue::Number)
            .map_err(|_| PathError::InvalidNumber {
                text: text.to_string(),
                offset: start,
            })
    }

    fn parse_keyword(&mut self) -> Result<JsonValue, PathError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            self.bump();
        }

        match &self.input[start..self.pos] {
            "true" => Ok(JsonValue::Bool(true)),
            "false" => Ok(JsonValue::Bool(false)),
            "null" => Ok(JsonValue::Null),
            _ => {
                self.pos = start;
                Err(self.error("`true`, `false` or `null`"))
            }
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}
