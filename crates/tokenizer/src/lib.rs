//! # Codesearch Tokenizer
//!
//! Code-aware tokenization shared by indexing and querying.
//!
//! ```text
//! "foo.bar(baz) 例句"
//!     │
//!     ├──> tokenize()        foo  .  bar  (  baz  )  例句
//!     │                      (word runs + one token per ASCII punctuation)
//!     │
//!     └──> extract_words()   {foo, bar, baz, 例句}
//!                            (word runs only, feeds the hint vocabulary)
//! ```
//!
//! Runs of word characters are never segmented further, whatever their
//! script: `这是一个例句` is a single token.
//!
//! ## Example
//!
//! ```rust
//! use codesearch_tokenizer::{extract_words, tokenize};
//!
//! let tokens = tokenize("call(fooBar)");
//! assert_eq!(tokens[1].text, "(");
//!
//! let words = extract_words(Some("call(fooBar)")).unwrap();
//! assert!(words.contains("fooBar"));
//! ```

mod error;
mod tokenizer;
mod words;

pub use error::{Result, TokenizerError};
pub use tokenizer::{
    analyze, classify, is_wildcard_marker, tokenize, CharClass, CodeTokenizer, Token, TokenKind,
};
pub use words::{
    extract_words, hint_candidates, is_hint_candidate, HINT_WORD_MAX_LEN, HINT_WORD_MIN_LEN,
};
