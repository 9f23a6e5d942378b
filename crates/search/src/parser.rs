//! Field-aware query language.
//!
//! ```text
//! query   := or
//! or      := and ("OR" and)*
//! and     := unary (["AND"] unary)*        implicit operator is AND
//! unary   := ("NOT" | "-" | "+")? primary
//! primary := "(" or ")" | field ":" primary | "\"" phrase "\"" | word
//! ```
//!
//! `field:` only switches fields for names the parser knows; any other
//! `name:` stays part of the word. A backslash escapes the next character.

use crate::analysis::{
    escape_to_placeholders, has_wildcard, ordered_span_query, restore, span_clauses,
    starts_with_wildcard, ESCAPED_QUESTION, ESCAPED_QUOTE, ESCAPED_STAR,
};
use crate::error::{Result, SearchError};
use codesearch_indexer::fields;
use codesearch_store::{Occur, Query, SpanClause};
use std::collections::HashMap;

/// How a field's values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    /// Tokenized with the index-time tokenizer.
    Text,
    /// Whole value. `extension` values are lowercased and lose a leading dot.
    Keyword { extension: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lexeme {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Field(String),
    /// Quoted text, escapes already turned into placeholders.
    Quoted(String),
    /// Bare word, escapes already turned into placeholders.
    Word(String),
}

#[derive(Debug, Clone)]
struct Spanned {
    lexeme: Lexeme,
    position: usize,
}

#[derive(Debug, Clone)]
pub struct QueryParser {
    default_field: String,
    fields: HashMap<String, FieldMode>,
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::for_code_index()
    }
}

impl QueryParser {
    pub fn new(default_field: impl Into<String>) -> Self {
        let default_field = default_field.into();
        let mut fields = HashMap::new();
        fields.insert(default_field.clone(), FieldMode::Text);
        Self {
            default_field,
            fields,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, mode: FieldMode) -> Self {
        self.fields.insert(name.into(), mode);
        self
    }

    /// Parser over the content index schema, defaulting to `content`.
    pub fn for_code_index() -> Self {
        Self::new(fields::CONTENT)
            .with_field(fields::CONTENT_CS, FieldMode::Text)
            .with_field(fields::FILE_NAME, FieldMode::Text)
            .with_field(fields::FILE_PATH, FieldMode::Text)
            .with_field(fields::FILE_EXTENSION, FieldMode::Keyword { extension: true })
            .with_field(fields::FILE_PATH_EXACT, FieldMode::Keyword { extension: false })
            .with_field(fields::CODE_PK, FieldMode::Keyword { extension: false })
    }

    pub fn field_mode(&self, field: &str) -> Option<FieldMode> {
        self.fields.get(field).copied()
    }

    pub fn parse(&self, input: &str) -> Result<Query> {
        let lexemes = self.lex(input)?;
        if lexemes.is_empty() {
            return Err(SearchError::InvalidRequest("query is empty".to_string()));
        }
        let mut cursor = Cursor {
            parser: self,
            lexemes,
            pos: 0,
            end: input.len(),
        };
        let query = cursor.parse_or(&self.default_field)?;
        if let Some(extra) = cursor.peek() {
            return Err(SearchError::parse(extra.position, "unexpected ')'"));
        }
        Ok(query)
    }

    /// Query for an already lexed bare word.
    pub(crate) fn word_query(&self, field: &str, text: &str, position: usize) -> Result<Query> {
        match self.field_mode(field).unwrap_or(FieldMode::Text) {
            FieldMode::Keyword { extension } => keyword_query(field, text, extension, position),
            FieldMode::Text => {
                let clauses = span_clauses(text);
                if let Some(SpanClause::Wildcard(pattern)) = clauses.first() {
                    if starts_with_wildcard(pattern) {
                        return Err(leading_wildcard(position));
                    }
                }
                ordered_span_query(field, clauses)
                    .ok_or_else(|| SearchError::parse(position, "term has no searchable tokens"))
            }
        }
    }

    /// Query for an exact phrase. A wildcard in the first token is refused.
    pub(crate) fn phrase_query(&self, field: &str, text: &str, position: usize) -> Result<Query> {
        match self.field_mode(field).unwrap_or(FieldMode::Text) {
            FieldMode::Keyword { extension } => keyword_query(field, text, extension, position),
            FieldMode::Text => {
                let clauses = span_clauses(text);
                if matches!(clauses.first(), Some(SpanClause::Wildcard(_))) {
                    return Err(SearchError::NotSupported(
                        "a wildcard in the first phrase token cannot be searched".to_string(),
                    ));
                }
                ordered_span_query(field, clauses)
                    .ok_or_else(|| SearchError::parse(position, "phrase has no searchable tokens"))
            }
        }
    }

    fn lex(&self, input: &str) -> Result<Vec<Spanned>> {
        let mut out = Vec::new();
        let mut chars = input.char_indices().peekable();
        while let Some(&(pos, c)) = chars.peek() {
            match c {
                c if c.is_whitespace() => {
                    chars.next();
                }
                '(' | ')' => {
                    chars.next();
                    let lexeme = if c == '(' { Lexeme::LParen } else { Lexeme::RParen };
                    out.push(Spanned { lexeme, position: pos });
                }
                '"' => {
                    chars.next();
                    let mut raw = String::new();
                    let mut closed = false;
                    while let Some((_, c)) = chars.next() {
                        match c {
                            '\\' => {
                                raw.push('\\');
                                if let Some((_, next)) = chars.next() {
                                    raw.push(next);
                                }
                            }
                            '"' => {
                                closed = true;
                                break;
                            }
                            other => raw.push(other),
                        }
                    }
                    if !closed {
                        return Err(SearchError::parse(pos, "unterminated quote"));
                    }
                    out.push(Spanned {
                        lexeme: Lexeme::Quoted(escape_to_placeholders(&raw)),
                        position: pos,
                    });
                }
                '+' | '-' if starts_word(input, pos + 1) => {
                    chars.next();
                    let lexeme = if c == '+' { Lexeme::Plus } else { Lexeme::Minus };
                    out.push(Spanned { lexeme, position: pos });
                }
                _ => {
                    let mut word = String::new();
                    let mut escaped = false;
                    while let Some(&(_, c)) = chars.peek() {
                        if c.is_whitespace() || matches!(c, '(' | ')' | '"') {
                            break;
                        }
                        chars.next();
                        match c {
                            '\\' => {
                                escaped = true;
                                match chars.next() {
                                    Some((_, '*')) => word.push(ESCAPED_STAR),
                                    Some((_, '?')) => word.push(ESCAPED_QUESTION),
                                    Some((_, '"')) => word.push(ESCAPED_QUOTE),
                                    Some((_, next)) => word.push(next),
                                    None => word.push('\\'),
                                }
                            }
                            ':' if !escaped && self.fields.contains_key(&word) => {
                                out.push(Spanned {
                                    lexeme: Lexeme::Field(std::mem::take(&mut word)),
                                    position: pos,
                                });
                                break;
                            }
                            other => word.push(other),
                        }
                    }
                    if word.is_empty() {
                        continue;
                    }
                    let lexeme = match (escaped, word.as_str()) {
                        (false, "AND") | (false, "&&") => Lexeme::And,
                        (false, "OR") | (false, "||") => Lexeme::Or,
                        (false, "NOT") => Lexeme::Not,
                        _ => Lexeme::Word(word),
                    };
                    out.push(Spanned { lexeme, position: pos });
                }
            }
        }
        Ok(out)
    }
}

fn starts_word(input: &str, offset: usize) -> bool {
    input[offset..]
        .chars()
        .next()
        .is_some_and(|c| !c.is_whitespace() && c != ')')
}

fn leading_wildcard(position: usize) -> SearchError {
    SearchError::NotSupported(format!(
        "leading wildcard at offset {position} cannot be searched"
    ))
}

fn keyword_query(field: &str, text: &str, extension: bool, position: usize) -> Result<Query> {
    let wildcard = has_wildcard(text);
    let mut value = if wildcard {
        text.to_string()
    } else {
        restore(text)
    };
    if extension {
        value = value.trim().trim_start_matches('.').to_lowercase();
    }
    if value.is_empty() {
        return Err(SearchError::parse(position, format!("empty value for {field}")));
    }
    if !wildcard {
        return Ok(Query::term(field, value));
    }
    if starts_with_wildcard(&value) {
        return Err(leading_wildcard(position));
    }
    Ok(Query::wildcard(field, restore(&value)))
}

struct Cursor<'a> {
    parser: &'a QueryParser,
    lexemes: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<&Spanned> {
        self.lexemes.get(self.pos)
    }

    fn next(&mut self) -> Option<Spanned> {
        let item = self.lexemes.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn position(&self) -> usize {
        self.peek().map_or(self.end, |s| s.position)
    }

    fn parse_or(&mut self, field: &str) -> Result<Query> {
        let mut alternatives = vec![self.parse_and(field)?];
        while matches!(self.peek().map(|s| &s.lexeme), Some(Lexeme::Or)) {
            self.next();
            alternatives.push(self.parse_and(field)?);
        }
        if alternatives.len() == 1 {
            return Ok(alternatives.remove(0));
        }
        Ok(Query::should(alternatives))
    }

    fn parse_and(&mut self, field: &str) -> Result<Query> {
        let mut clauses: Vec<(Occur, Query)> = Vec::new();
        loop {
            match self.peek().map(|s| &s.lexeme) {
                None | Some(Lexeme::RParen) | Some(Lexeme::Or) => break,
                Some(Lexeme::And) => {
                    self.next();
                }
                Some(_) => clauses.push(self.parse_unary(field)?),
            }
        }
        if clauses.is_empty() {
            return Err(SearchError::parse(self.position(), "expected a term"));
        }
        if clauses.iter().all(|(occur, _)| *occur == Occur::MustNot) {
            clauses.insert(0, (Occur::Must, Query::All));
        }
        if clauses.len() == 1 && clauses[0].0 == Occur::Must {
            return Ok(clauses.remove(0).1);
        }
        Ok(Query::Boolean(clauses))
    }

    fn parse_unary(&mut self, field: &str) -> Result<(Occur, Query)> {
        let occur = match self.peek().map(|s| &s.lexeme) {
            Some(Lexeme::Not) | Some(Lexeme::Minus) => Occur::MustNot,
            Some(Lexeme::Plus) => Occur::Must,
            _ => return Ok((Occur::Must, self.parse_primary(field)?)),
        };
        self.next();
        Ok((occur, self.parse_primary(field)?))
    }

    fn parse_primary(&mut self, field: &str) -> Result<Query> {
        let position = self.position();
        let Some(Spanned { lexeme, position }) = self.next() else {
            return Err(SearchError::parse(position, "unexpected end of query"));
        };
        match lexeme {
            Lexeme::LParen => {
                let inner = self.parse_or(field)?;
                match self.next() {
                    Some(Spanned {
                        lexeme: Lexeme::RParen,
                        ..
                    }) => Ok(inner),
                    _ => Err(SearchError::parse(position, "unbalanced '('")),
                }
            }
            Lexeme::Field(name) => self.parse_primary(&name),
            Lexeme::Quoted(text) => self.parser.phrase_query(field, &text, position),
            Lexeme::Word(text) => self.parser.word_query(field, &text, position),
            other => Err(SearchError::parse(
                position,
                format!("unexpected {}", describe(&other)),
            )),
        }
    }
}

fn describe(lexeme: &Lexeme) -> &'static str {
    match lexeme {
        Lexeme::LParen => "'('",
        Lexeme::RParen => "')'",
        Lexeme::And => "AND",
        Lexeme::Or => "OR",
        Lexeme::Not => "NOT",
        Lexeme::Plus => "'+'",
        Lexeme::Minus => "'-'",
        Lexeme::Field(_) => "field",
        Lexeme::Quoted(_) => "phrase",
        Lexeme::Word(_) => "word",
    }
}
