//! Turns query text into span clauses using the index-time tokenizer.
//!
//! Escaped `*`, `?` and `"` are swapped for private-use placeholders before
//! tokenizing so they survive as literal characters; [`restore`] swaps them
//! back.

use codesearch_store::{Query, SpanClause};
use codesearch_tokenizer::{is_wildcard_marker, tokenize, Token};

pub const ESCAPED_STAR: char = '\u{E000}';
pub const ESCAPED_QUESTION: char = '\u{E001}';
pub const ESCAPED_QUOTE: char = '\u{E002}';

fn placeholder_for(c: char) -> Option<char> {
    match c {
        '*' => Some(ESCAPED_STAR),
        '?' => Some(ESCAPED_QUESTION),
        '"' => Some(ESCAPED_QUOTE),
        _ => None,
    }
}

fn is_placeholder(c: char) -> bool {
    matches!(c, ESCAPED_STAR | ESCAPED_QUESTION | ESCAPED_QUOTE)
}

/// Resolve backslash escapes of a raw value: `\*`, `\?` and `\"` become
/// placeholders, `\\` a backslash; any other backslash is kept as is.
pub fn escape_to_placeholders(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some(next) if placeholder_for(next).is_some() => {
                out.extend(placeholder_for(next));
                chars.next();
            }
            Some('\\') => {
                out.push('\\');
                chars.next();
            }
            _ => out.push('\\'),
        }
    }
    out
}

pub fn restore(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ESCAPED_STAR => '*',
            ESCAPED_QUESTION => '?',
            ESCAPED_QUOTE => '"',
            other => other,
        })
        .collect()
}

/// Whether `text` holds an unescaped wildcard marker.
pub fn has_wildcard(text: &str) -> bool {
    text.chars().any(is_wildcard_marker)
}

fn is_marker_token(token: &Token) -> bool {
    token.is_special() && token.text.chars().all(is_wildcard_marker)
}

fn is_literal(token: &Token) -> bool {
    token.text.chars().any(is_placeholder)
}

/// Markers glue to words and to other markers, never to punctuation.
fn joins(prev: &Token, token: &Token) -> bool {
    if prev.end != token.start || is_literal(prev) || is_literal(token) {
        return false;
    }
    match (is_marker_token(prev), is_marker_token(token)) {
        (true, true) => true,
        (true, false) => !token.is_special(),
        (false, true) => !prev.is_special(),
        (false, false) => false,
    }
}

/// Span clauses for `text` (placeholders already applied).
///
/// Wildcard markers merge with the words they touch into one wildcard
/// clause, so `foo*bar` stays a single pattern. A marker on its own matches
/// any one token. Tokens carrying an escaped character never merge and are
/// split back into literal terms.
pub fn span_clauses(text: &str) -> Vec<SpanClause> {
    let tokens = tokenize(text);
    let mut groups: Vec<Vec<&Token>> = Vec::new();
    for token in &tokens {
        let merge = groups
            .last()
            .and_then(|group| group.last())
            .is_some_and(|prev| joins(prev, token));
        match groups.last_mut() {
            Some(group) if merge => group.push(token),
            _ => groups.push(vec![token]),
        }
    }

    let mut clauses = Vec::new();
    for group in groups {
        if group.iter().any(|t| is_marker_token(t)) {
            let pattern: String = group.iter().map(|t| t.text.as_str()).collect();
            clauses.push(SpanClause::Wildcard(pattern));
            continue;
        }
        for token in group {
            if is_literal(token) {
                clauses.extend(
                    tokenize(&restore(&token.text))
                        .into_iter()
                        .map(|t| SpanClause::Term(t.text)),
                );
            } else {
                clauses.push(SpanClause::Term(token.text.clone()));
            }
        }
    }
    clauses
}

pub fn starts_with_wildcard(pattern: &str) -> bool {
    pattern.chars().next().is_some_and(is_wildcard_marker)
}

/// Narrowest query matching `clauses` in order with no gaps.
pub fn ordered_span_query(field: &str, mut clauses: Vec<SpanClause>) -> Option<Query> {
    match clauses.len() {
        0 => return None,
        1 => {
            return Some(match clauses.remove(0) {
                SpanClause::Term(term) => Query::term(field, term),
                SpanClause::Wildcard(pattern) => Query::wildcard(field, pattern),
            })
        }
        _ => {}
    }
    let terms: Option<Vec<String>> = clauses
        .iter()
        .map(|clause| match clause {
            SpanClause::Term(term) => Some(term.clone()),
            SpanClause::Wildcard(_) => None,
        })
        .collect();
    Some(match terms {
        Some(terms) => Query::Phrase {
            field: field.to_string(),
            terms,
        },
        None => Query::SpanNear {
            field: field.to_string(),
            clauses,
            slop: 0,
        },
    })
}
