//! Lexical helpers for text-level SQL handling.

use super::types::Dialect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Code,
    StringLiteral,
    QuotedIdentifier,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub kind: SegmentKind,
    pub text: &'a str,
}

/// Split SQL into code and non-code runs. Concatenating the segments yields
/// the input unchanged; an unterminated literal or comment runs to the end.
pub fn segments(sql: &str) -> Vec<Segment<'_>> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let (kind, end) = match bytes[i] {
            b'\'' => (SegmentKind::StringLiteral, quoted_end(bytes, i, b'\'')),
            b'"' => (SegmentKind::QuotedIdentifier, quoted_end(bytes, i, b'"')),
            b'`' => (SegmentKind::QuotedIdentifier, quoted_end(bytes, i, b'`')),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                let end = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map(|p| i + p)
                    .unwrap_or(bytes.len());
                (SegmentKind::Comment, end)
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = sql[i + 2..]
                    .find("*/")
                    .map(|p| i + 2 + p + 2)
                    .unwrap_or(bytes.len());
                (SegmentKind::Comment, end)
            }
            _ => {
                i += 1;
                continue;
            }
        };
        push(sql, &mut out, start, i, SegmentKind::Code);
        push(sql, &mut out, i, end, kind);
        start = end;
        i = end;
    }
    push(sql, &mut out, start, bytes.len(), SegmentKind::Code);
    out
}

fn push<'a>(sql: &'a str, out: &mut Vec<Segment<'a>>, from: usize, to: usize, kind: SegmentKind) {
    if to > from {
        out.push(Segment {
            kind,
            text: &sql[from..to],
        });
    }
}

// Index one past the closing quote; a doubled quote is an escape.
fn quoted_end(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

pub fn quote_ident(name: &str, dialect: Dialect) -> String {
    match dialect.quote_char() {
        '[' => format!("[{}]", name.replace(']', "]]")),
        q => {
            let q = q.to_string();
            format!("{q}{}{q}", name.replace(&q, &format!("{q}{q}")))
        }
    }
}

/// Escape a value for use inside a single-quoted SQL literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// The SQL with string literals and comments each replaced by a single space.
/// Quoted identifiers are kept.
pub fn code_only(sql: &str) -> String {
    segments(sql)
        .into_iter()
        .map(|segment| match segment.kind {
            SegmentKind::StringLiteral | SegmentKind::Comment => " ",
            SegmentKind::Code | SegmentKind::QuotedIdentifier => segment.text,
        })
        .collect()
}

/// Strip quoting from an identifier as written (`"SalesLead"`, `[dbo].[x]`).
pub fn bare_identifier(name: &str) -> String {
    name.split('.')
        .last()
        .unwrap_or(name)
        .trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
        .to_string()
}
