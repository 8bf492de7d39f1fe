//! Backslash-aware splitting shared by the rule and mapping parsers.

use super::RuleError;

/// Split `input` on every `delimiter` not escaped by a preceding backslash.
///
/// Pieces are borrowed unchanged, escapes included. A trailing backslash
/// with nothing left to escape is rejected.
pub(crate) fn split_escaped(input: &str, delimiter: char) -> Result<Vec<&str>, RuleError> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (idx, c) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == delimiter {
            pieces.push(&input[start..idx]);
            start = idx + c.len_utf8();
        }
    }

    if escaped {
        return Err(RuleError::UnterminatedEscape);
    }
    pieces.push(&input[start..]);
    Ok(pieces)
}

/// Turn escaped delimiters back into bare ones. Other escapes are kept as
/// written so regex escapes like `\d` reach the regex compiler intact.
pub(crate) fn unescape_delimiter(piece: &str, delimiter: char) -> String {
    let mut out = String::with_capacity(piece.len());
    let mut chars = piece.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if next == delimiter => out.push(next),
            Some(next) => {
                out.push(c);
                out.push(next);
            }
            None => out.push(c),
        }
    }

    out
}
