use codesearch_tokenizer::{classify, extract_words, tokenize, CharClass};
use proptest::prelude::*;

fn sample_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            "[a-zA-Z0-9_]{1,6}",
            "[ \t\r\n]{1,2}",
            "[!-/:-@\\[-`{-~]",
            Just("\u{3000}".to_string()),
            "[一-龥]{1,4}",
            Just("。".to_string()),
        ],
        0..40,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn tokens_cover_every_non_space_char_once(text in sample_text()) {
        let tokens = tokenize(&text);
        let mut last_end = 0;
        let mut covered = String::new();
        for token in &tokens {
            prop_assert!(token.start >= last_end);
            prop_assert!(token.end > token.start);
            prop_assert_eq!(&text[token.start..token.end], token.text.as_str());
            prop_assert!(text[last_end..token.start]
                .chars()
                .all(|c| classify(c) == CharClass::Space));
            covered.push_str(&token.text);
            last_end = token.end;
        }
        let expected: String = text
            .chars()
            .filter(|c| classify(*c) != CharClass::Space)
            .collect();
        prop_assert_eq!(covered, expected);
    }

    #[test]
    fn extracted_words_never_contain_separators(text in sample_text()) {
        let words = extract_words(Some(&text)).unwrap();
        for word in words {
            prop_assert!(!word.is_empty());
            prop_assert!(word.chars().all(|c| classify(c) == CharClass::Word));
        }
    }
}
