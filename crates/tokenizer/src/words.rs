use crate::error::{Result, TokenizerError};
use crate::tokenizer::CodeTokenizer;
use std::collections::HashSet;

/// Shortest word kept as an autocomplete hint.
pub const HINT_WORD_MIN_LEN: usize = 4;

/// Longest word kept as an autocomplete hint; bounds prefix lookups.
pub const HINT_WORD_MAX_LEN: usize = 199;

/// Distinct word runs of `text`, punctuation excluded.
///
/// No length filter is applied; see [`hint_candidates`].
pub fn extract_words(text: Option<&str>) -> Result<HashSet<String>> {
    let text = text.ok_or_else(|| TokenizerError::invalid_argument("text must not be null"))?;
    Ok(CodeTokenizer::new(text)
        .filter(|token| !token.is_special())
        .map(|token| token.text)
        .collect())
}

pub fn is_hint_candidate(word: &str) -> bool {
    let len = word.chars().count();
    (HINT_WORD_MIN_LEN..=HINT_WORD_MAX_LEN).contains(&len)
}

/// Words of `text` that qualify as hint words.
pub fn hint_candidates(text: &str) -> HashSet<String> {
    CodeTokenizer::new(text)
        .filter(|token| !token.is_special() && is_hint_candidate(&token.text))
        .map(|token| token.text)
        .collect()
}
