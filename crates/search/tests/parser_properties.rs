use codesearch_search::{QueryParser, SearchError};
use codesearch_store::{Occur, Query};
use proptest::prelude::*;

proptest! {
    #[test]
    fn arbitrary_input_never_panics(input in "\\PC{0,40}") {
        let _ = QueryParser::for_code_index().parse(&input);
    }

    #[test]
    fn plain_words_are_required_terms(words in prop::collection::vec("[a-z][a-z0-9_]{0,8}", 2..6)) {
        let query = QueryParser::for_code_index().parse(&words.join(" ")).unwrap();
        match query {
            Query::Boolean(clauses) => {
                prop_assert_eq!(clauses.len(), words.len());
                for ((occur, clause), word) in clauses.iter().zip(&words) {
                    prop_assert_eq!(*occur, Occur::Must);
                    prop_assert_eq!(clause, &Query::term("content", word.clone()));
                }
            }
            other => prop_assert!(false, "unexpected query {other}"),
        }
    }

    #[test]
    fn leading_wildcards_are_refused(word in "[a-z]{1,8}", marker in "[*?]") {
        let result = QueryParser::for_code_index().parse(&format!("{marker}{word}"));
        prop_assert!(matches!(result, Err(SearchError::NotSupported(_))));
    }
}
