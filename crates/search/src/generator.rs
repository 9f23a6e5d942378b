use crate::analysis::escape_to_placeholders;
use crate::error::{Result, SearchError};
use crate::parser::QueryParser;
use codesearch_indexer::fields;
use codesearch_protocol::SearchRequest;
use codesearch_store::Query;
use log::debug;

/// Builds store queries from [`SearchRequest`]s.
#[derive(Debug, Clone, Default)]
pub struct QueryGenerator {
    parser: QueryParser,
}

impl QueryGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `code_pk` wins over every other criterion. Otherwise each filled
    /// field contributes one required clause: query syntax in the default
    /// mode, an exact in-order phrase when `phrase_query` is set.
    pub fn generate(&self, request: &SearchRequest) -> Result<Query> {
        if let Some(pk) = non_blank(&request.code_pk) {
            return Ok(Query::term(fields::CODE_PK, pk));
        }

        let content_field = if request.case_sensitive {
            fields::CONTENT_CS
        } else {
            fields::CONTENT
        };
        let criteria: Vec<(&str, &str)> = [
            (content_field, &request.content),
            (fields::FILE_NAME, &request.file_name),
            (fields::FILE_EXTENSION, &request.file_extension),
            (fields::FILE_PATH, &request.file_path),
        ]
        .into_iter()
        .filter_map(|(field, value)| non_blank(value).map(|value| (field, value)))
        .collect();

        if criteria.is_empty() {
            return Err(SearchError::InvalidRequest(
                "at least one search field must be filled".to_string(),
            ));
        }

        let query = if request.phrase_query {
            let mut clauses = criteria
                .iter()
                .map(|(field, value)| {
                    self.parser
                        .phrase_query(field, &escape_to_placeholders(value), 0)
                })
                .collect::<Result<Vec<_>>>()?;
            if clauses.len() == 1 {
                clauses.remove(0)
            } else {
                Query::must(clauses)
            }
        } else {
            let text = criteria
                .iter()
                .map(|(field, value)| format!("{field}:({value})"))
                .collect::<Vec<_>>()
                .join(" AND ");
            self.parser.parse(&text)?
        };
        debug!("Generated query {query}");
        Ok(query)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesearch_store::{Occur, SpanClause};
    use pretty_assertions::assert_eq;

    fn request() -> SearchRequest {
        SearchRequest::default()
    }

    #[test]
    fn code_pk_short_circuits() {
        let req = SearchRequest {
            code_pk: Some(" abc ".to_string()),
            content: Some("ignored".to_string()),
            ..request()
        };
        assert_eq!(
            QueryGenerator::new().generate(&req).unwrap(),
            Query::term("code_pk", "abc")
        );
    }

    #[test]
    fn empty_request_is_rejected() {
        let req = SearchRequest {
            content: Some("  ".to_string()),
            ..request()
        };
        assert!(matches!(
            QueryGenerator::new().generate(&req),
            Err(SearchError::InvalidRequest(_))
        ));
    }

    #[test]
    fn fields_are_joined_with_and() {
        let req = SearchRequest {
            content: Some("foo OR bar".to_string()),
            file_extension: Some(".CS".to_string()),
            ..request()
        };
        assert_eq!(
            QueryGenerator::new().generate(&req).unwrap(),
            Query::must([
                Query::should([
                    Query::term("content", "foo"),
                    Query::term("content", "bar")
                ]),
                Query::term("file_extension", "cs"),
            ])
        );
    }

    #[test]
    fn case_sensitive_content_uses_its_own_field() {
        let req = SearchRequest {
            content: Some("Foo".to_string()),
            case_sensitive: true,
            ..request()
        };
        assert_eq!(
            QueryGenerator::new().generate(&req).unwrap(),
            Query::term("content_cs", "Foo")
        );
    }

    #[test]
    fn phrase_mode_ignores_query_syntax() {
        let req = SearchRequest {
            content: Some("a OR (b)".to_string()),
            phrase_query: true,
            ..request()
        };
        assert_eq!(
            QueryGenerator::new().generate(&req).unwrap(),
            Query::Phrase {
                field: "content".to_string(),
                terms: ["a", "OR", "(", "b", ")"].map(String::from).to_vec(),
            }
        );
    }

    #[test]
    fn phrase_mode_with_wildcards_is_an_ordered_span() {
        let req = SearchRequest {
            content: Some("new Foo*(".to_string()),
            phrase_query: true,
            ..request()
        };
        assert_eq!(
            QueryGenerator::new().generate(&req).unwrap(),
            Query::SpanNear {
                field: "content".to_string(),
                clauses: vec![
                    SpanClause::Term("new".to_string()),
                    SpanClause::Wildcard("Foo*".to_string()),
                    SpanClause::Term("(".to_string()),
                ],
                slop: 0,
            }
        );

        let leading = SearchRequest {
            content: Some("Fo?o bar".to_string()),
            phrase_query: true,
            ..request()
        };
        assert!(matches!(
            QueryGenerator::new().generate(&leading),
            Err(SearchError::NotSupported(_))
        ));
    }

    #[test]
    fn phrase_mode_escapes_are_literal() {
        let req = SearchRequest {
            content: Some(r#"say \"hi\*\""#.to_string()),
            file_name: Some("main".to_string()),
            phrase_query: true,
            ..request()
        };
        assert_eq!(
            QueryGenerator::new().generate(&req).unwrap(),
            Query::Boolean(vec![
                (
                    Occur::Must,
                    Query::Phrase {
                        field: "content".to_string(),
                        terms: ["say", "\"", "hi", "*", "\""].map(String::from).to_vec(),
                    }
                ),
                (Occur::Must, Query::term("file_name", "main")),
            ])
        );
    }
}
