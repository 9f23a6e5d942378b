use crate::error::{Result, SearchError};
use codesearch_indexer::hint_fields;
use codesearch_protocol::HintRequest;
use codesearch_store::{Document, Query};

/// Prefix lookup over the hint index. Case-insensitive requests match the
/// lowercased twin of each word; the original casing is returned either way.
pub fn hint_query(request: &HintRequest) -> Result<Query> {
    let prefix = request.prefix.trim();
    if prefix.is_empty() {
        return Err(SearchError::InvalidRequest(
            "hint prefix must not be empty".to_string(),
        ));
    }
    Ok(if request.case_sensitive {
        Query::prefix(hint_fields::WORD, prefix)
    } else {
        Query::prefix(hint_fields::WORD_LOWER, prefix.to_lowercase())
    })
}

/// Words of the hits, shortest first, at most `limit` of them.
pub fn collect_hints(hits: &[Document], limit: usize) -> Vec<String> {
    let mut words: Vec<String> = hits
        .iter()
        .filter_map(|doc| doc.get_str(hint_fields::WORD))
        .map(str::to_string)
        .collect();
    words.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    words.dedup();
    words.truncate(limit);
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesearch_indexer::document::hint_document;
    use pretty_assertions::assert_eq;

    fn request(prefix: &str, case_sensitive: bool) -> HintRequest {
        HintRequest {
            prefix: prefix.to_string(),
            case_sensitive,
            limit: 20,
        }
    }

    #[test]
    fn case_mode_picks_the_field() {
        assert_eq!(
            hint_query(&request("Foo", true)).unwrap(),
            Query::prefix("word", "Foo")
        );
        assert_eq!(
            hint_query(&request(" Foo ", false)).unwrap(),
            Query::prefix("word_lower", "foo")
        );
        assert!(hint_query(&request("  ", false)).is_err());
    }

    #[test]
    fn hints_are_sorted_and_limited() {
        let hits: Vec<Document> = ["configure", "Config", "config", "configuration"]
            .iter()
            .map(|w| hint_document(w))
            .collect();
        assert_eq!(
            collect_hints(&hits, 3),
            vec!["Config", "config", "configure"]
        );
    }
}
