use crate::document::FieldKind;
use crate::error::Result;
use crate::schema::BoundSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use tantivy::query::{
    AllQuery, BooleanQuery, EmptyQuery, Occur as TantivyOccur, PhraseQuery,
    Query as TantivyQuery, RegexPhraseQuery, RegexQuery, TermQuery,
};
use tantivy::schema::{Field, IndexRecordOption};

/// A field name and a value to look up in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    pub field: String,
    pub value: String,
}

impl Term {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// The indexed term this key denotes, or `None` when it can never match.
    pub(crate) fn to_tantivy(&self, schema: &BoundSchema) -> Option<tantivy::Term> {
        let (field, kind) = schema.resolve(&self.field)?;
        exact_term(field, kind, &self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

impl From<Occur> for TantivyOccur {
    fn from(occur: Occur) -> Self {
        match occur {
            Occur::Must => TantivyOccur::Must,
            Occur::Should => TantivyOccur::Should,
            Occur::MustNot => TantivyOccur::MustNot,
        }
    }
}

/// One position of a span query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanClause {
    Term(String),
    Wildcard(String),
}

/// Structured query, independent of any open index.
///
/// Values targeting [`FieldKind::Text`] fields are lowercased when the query
/// is compiled against a schema, so callers never need to know a field's
/// case mode. Queries naming a field the schema lacks match nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Query {
    All,
    Term(Term),
    Prefix(Term),
    Wildcard(Term),
    Phrase {
        field: String,
        terms: Vec<String>,
    },
    /// Clauses in order, at most `slop` extra positions apart.
    SpanNear {
        field: String,
        clauses: Vec<SpanClause>,
        slop: u32,
    },
    Boolean(Vec<(Occur, Query)>),
}

impl Query {
    pub fn term(field: &str, value: impl Into<String>) -> Self {
        Self::Term(Term::new(field, value))
    }

    pub fn prefix(field: &str, value: impl Into<String>) -> Self {
        Self::Prefix(Term::new(field, value))
    }

    pub fn wildcard(field: &str, pattern: impl Into<String>) -> Self {
        Self::Wildcard(Term::new(field, pattern))
    }

    pub fn must(clauses: impl IntoIterator<Item = Query>) -> Self {
        Self::Boolean(clauses.into_iter().map(|q| (Occur::Must, q)).collect())
    }

    pub fn should(clauses: impl IntoIterator<Item = Query>) -> Self {
        Self::Boolean(clauses.into_iter().map(|q| (Occur::Should, q)).collect())
    }

    pub(crate) fn compile(&self, schema: &BoundSchema) -> Result<Box<dyn TantivyQuery>> {
        let compiled: Box<dyn TantivyQuery> = match self {
            Self::All => Box::new(AllQuery),
            Self::Term(term) => match term.to_tantivy(schema) {
                Some(term) => Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
                None => Box::new(EmptyQuery),
            },
            Self::Prefix(term) => {
                pattern_query(schema, term, |value| format!("{}.*", regex::escape(value)))?
            }
            Self::Wildcard(term) => pattern_query(schema, term, glob_to_regex)?,
            Self::Phrase { field, terms } => {
                let clauses: Vec<SpanClause> =
                    terms.iter().cloned().map(SpanClause::Term).collect();
                span_query(schema, field, &clauses, 0)?
            }
            Self::SpanNear {
                field,
                clauses,
                slop,
            } => span_query(schema, field, clauses, *slop)?,
            Self::Boolean(clauses) => {
                let mut subqueries: Vec<(TantivyOccur, Box<dyn TantivyQuery>)> =
                    Vec::with_capacity(clauses.len() + 1);
                // Exclusions alone select nothing in tantivy.
                let only_excludes = !clauses.is_empty()
                    && clauses.iter().all(|(occur, _)| *occur == Occur::MustNot);
                if only_excludes {
                    subqueries.push((TantivyOccur::Must, Box::new(AllQuery)));
                }
                for (occur, query) in clauses {
                    subqueries.push(((*occur).into(), query.compile(schema)?));
                }
                Box::new(BooleanQuery::new(subqueries))
            }
        };
        Ok(compiled)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "*:*"),
            Self::Term(t) => write!(f, "{}:{}", t.field, t.value),
            Self::Prefix(t) => write!(f, "{}:{}*", t.field, t.value),
            Self::Wildcard(t) => write!(f, "{}:{}", t.field, t.value),
            Self::Phrase { field, terms } => write!(f, "{field}:\"{}\"", terms.join(" ")),
            Self::SpanNear {
                field,
                clauses,
                slop,
            } => {
                let parts: Vec<&str> = clauses
                    .iter()
                    .map(|c| match c {
                        SpanClause::Term(v) | SpanClause::Wildcard(v) => v.as_str(),
                    })
                    .collect();
                write!(f, "spanNear({field}:[{}], slop={slop})", parts.join(", "))
            }
            Self::Boolean(clauses) => {
                write!(f, "(")?;
                for (idx, (occur, query)) in clauses.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    match occur {
                        Occur::Must => write!(f, "+{query}")?,
                        Occur::Should => write!(f, "{query}")?,
                        Occur::MustNot => write!(f, "-{query}")?,
                    }
                }
                write!(f, ")")
            }
        }
    }
}

fn normalize(kind: FieldKind, value: &str) -> String {
    match kind {
        FieldKind::Text => value.to_lowercase(),
        _ => value.to_string(),
    }
}

fn exact_term(field: Field, kind: FieldKind, value: &str) -> Option<tantivy::Term> {
    match kind {
        FieldKind::Int => value
            .parse::<i64>()
            .ok()
            .map(|parsed| tantivy::Term::from_field_i64(field, parsed)),
        _ => Some(tantivy::Term::from_field_text(field, &normalize(kind, value))),
    }
}

/// Anchored regex equivalent of a glob where `*` spans any run of characters
/// and `?` exactly one.
pub(crate) fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    out
}

fn pattern_query(
    schema: &BoundSchema,
    term: &Term,
    to_regex: impl Fn(&str) -> String,
) -> Result<Box<dyn TantivyQuery>> {
    match schema.resolve(&term.field) {
        Some((field, kind)) if kind != FieldKind::Int => {
            let pattern = to_regex(&normalize(kind, &term.value));
            Ok(Box::new(RegexQuery::from_pattern(&pattern, field)?))
        }
        _ => Ok(Box::new(EmptyQuery)),
    }
}

fn clause_pattern(clause: &SpanClause, kind: FieldKind) -> String {
    match clause {
        SpanClause::Term(value) => regex::escape(&normalize(kind, value)),
        SpanClause::Wildcard(pattern) => glob_to_regex(&normalize(kind, pattern)),
    }
}

fn span_query(
    schema: &BoundSchema,
    field_name: &str,
    clauses: &[SpanClause],
    slop: u32,
) -> Result<Box<dyn TantivyQuery>> {
    let Some((field, kind)) = schema.resolve(field_name) else {
        return Ok(Box::new(EmptyQuery));
    };
    match clauses {
        [] => Ok(Box::new(EmptyQuery)),
        [SpanClause::Term(value)] => match exact_term(field, kind, value) {
            Some(term) => Ok(Box::new(TermQuery::new(term, IndexRecordOption::Basic))),
            None => Ok(Box::new(EmptyQuery)),
        },
        [SpanClause::Wildcard(pattern)] => pattern_query(
            schema,
            &Term::new(field_name, pattern.as_str()),
            glob_to_regex,
        ),
        // Positions exist only for tokenized fields.
        _ if !kind.is_tokenized() => Ok(Box::new(EmptyQuery)),
        _ => {
            let exact: Option<Vec<tantivy::Term>> = clauses
                .iter()
                .map(|clause| match clause {
                    SpanClause::Term(value) => exact_term(field, kind, value),
                    SpanClause::Wildcard(_) => None,
                })
                .collect();
            if let Some(terms) = exact {
                let mut phrase = PhraseQuery::new(terms);
                phrase.set_slop(slop);
                return Ok(Box::new(phrase));
            }
            let patterns = clauses
                .iter()
                .map(|clause| clause_pattern(clause, kind))
                .collect();
            let mut phrase = RegexPhraseQuery::new(field, patterns);
            phrase.set_slop(slop);
            Ok(Box::new(phrase))
        }
    }
}
