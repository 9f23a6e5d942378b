//! [`CodeTokenizer`] exposed to tantivy.

use codesearch_tokenizer::CodeTokenizer;
use tantivy::tokenizer::{Token, TokenStream, Tokenizer};
use tantivy::Index;

/// Tokenizer name of lowercased text fields.
pub const CODE_TOKENIZER: &str = "code";
/// Tokenizer name of case-preserving text fields.
pub const CODE_CS_TOKENIZER: &str = "code_cs";

#[derive(Clone, Copy, Debug)]
pub(crate) struct CodeAnalyzer {
    lowercase: bool,
}

impl CodeAnalyzer {
    pub(crate) const fn new(lowercase: bool) -> Self {
        Self { lowercase }
    }
}

impl Tokenizer for CodeAnalyzer {
    type TokenStream<'a> = CodeTokenStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        let tokens = CodeTokenizer::new(text)
            .enumerate()
            .map(|(position, token)| Token {
                offset_from: token.start,
                offset_to: token.end,
                position,
                text: if self.lowercase {
                    token.text.to_lowercase()
                } else {
                    token.text
                },
                position_length: 1,
            })
            .collect();
        CodeTokenStream {
            tokens,
            index: 0,
            token: Token::default(),
        }
    }
}

pub(crate) struct CodeTokenStream {
    tokens: Vec<Token>,
    index: usize,
    token: Token,
}

impl TokenStream for CodeTokenStream {
    fn advance(&mut self) -> bool {
        if self.index < self.tokens.len() {
            self.token = std::mem::take(&mut self.tokens[self.index]);
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }
}

/// Make both code tokenizers available to `index`. Needed after every
/// create or open, tantivy does not persist tokenizers.
pub(crate) fn register_code_tokenizers(index: &Index) {
    let manager = index.tokenizers();
    manager.register(CODE_TOKENIZER, CodeAnalyzer::new(true));
    manager.register(CODE_CS_TOKENIZER, CodeAnalyzer::new(false));
}
