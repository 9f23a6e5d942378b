use std::collections::VecDeque;
use unicode_segmentation::{USentenceBoundIndices, UnicodeSegmentation};

/// Ideographic space (U+3000), treated like an ASCII blank.
const IDEOGRAPHIC_SPACE: char = '\u{3000}';

/// How a single character participates in tokenization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    /// ASCII punctuation: emitted as a one-character token.
    Special,
    /// Separator: ends the current word, never emitted.
    Space,
    /// Letters, digits, underscore and every non-ASCII character.
    Word,
}

/// Classify a character.
///
/// Specialness is decided by the explicit ASCII range table
/// (33–47, 58–64, 91–96, 123–126) and nothing else.
pub fn classify(c: char) -> CharClass {
    match c {
        ' ' | '\t' | '\r' | '\n' | IDEOGRAPHIC_SPACE => CharClass::Space,
        '\u{21}'..='\u{2F}' | '\u{3A}'..='\u{40}' | '\u{5B}'..='\u{60}' | '\u{7B}'..='\u{7E}' => {
            if c == '_' {
                CharClass::Word
            } else {
                CharClass::Special
            }
        }
        _ => CharClass::Word,
    }
}

/// `*` and `?`, the wildcard markers of the query language.
///
/// Both are special characters, so the tokenizer always emits them as
/// tokens of their own.
pub const fn is_wildcard_marker(c: char) -> bool {
    matches!(c, '*' | '?')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Special,
}

/// A token with byte offsets into the text it was produced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub kind: TokenKind,
}

impl Token {
    pub fn is_special(&self) -> bool {
        self.kind == TokenKind::Special
    }
}

/// Streaming tokenizer for source code and prose.
///
/// Input is consumed one Unicode sentence at a time so that at most one
/// sentence worth of tokens is buffered. A word that straddles a sentence
/// boundary is still emitted as a single token, and all offsets are absolute
/// byte offsets into the original text.
pub struct CodeTokenizer<'a> {
    text: &'a str,
    sentences: USentenceBoundIndices<'a>,
    run_start: Option<usize>,
    pending: VecDeque<Token>,
    finished: bool,
}

impl<'a> CodeTokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            sentences: text.split_sentence_bound_indices(),
            run_start: None,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Restart the tokenizer over new input.
    pub fn reset(&mut self, text: &'a str) {
        self.text = text;
        self.sentences = text.split_sentence_bound_indices();
        self.run_start = None;
        self.pending.clear();
        self.finished = false;
    }

    fn scan_sentence(&mut self, offset: usize, sentence: &str) {
        for (idx, c) in sentence.char_indices() {
            let pos = offset + idx;
            match classify(c) {
                CharClass::Space => self.flush_run(pos),
                CharClass::Special => {
                    self.flush_run(pos);
                    let end = pos + c.len_utf8();
                    self.pending.push_back(Token {
                        text: c.to_string(),
                        start: pos,
                        end,
                        kind: TokenKind::Special,
                    });
                }
                CharClass::Word => {
                    self.run_start.get_or_insert(pos);
                }
            }
        }
    }

    fn flush_run(&mut self, end: usize) {
        if let Some(start) = self.run_start.take() {
            self.pending.push_back(Token {
                text: self.text[start..end].to_string(),
                start,
                end,
                kind: TokenKind::Word,
            });
        }
    }
}

impl Iterator for CodeTokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(token);
            }
            if self.finished {
                return None;
            }
            match self.sentences.next() {
                Some((offset, sentence)) => self.scan_sentence(offset, sentence),
                None => {
                    self.flush_run(self.text.len());
                    self.finished = true;
                }
            }
        }
    }
}

/// Tokenize `text` into word runs and single punctuation tokens.
pub fn tokenize(text: &str) -> Vec<Token> {
    CodeTokenizer::new(text).collect()
}

/// Token texts as they are indexed, optionally lowercased.
pub fn analyze(text: &str, lowercase: bool) -> Vec<String> {
    CodeTokenizer::new(text)
        .map(|token| {
            if lowercase {
                token.text.to_lowercase()
            } else {
                token.text
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(input: &str) -> Vec<String> {
        tokenize(input).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn classifies_ascii_ranges() {
        assert_eq!(classify('!'), CharClass::Special);
        assert_eq!(classify('/'), CharClass::Special);
        assert_eq!(classify(':'), CharClass::Special);
        assert_eq!(classify('@'), CharClass::Special);
        assert_eq!(classify('['), CharClass::Special);
        assert_eq!(classify('`'), CharClass::Special);
        assert_eq!(classify('{'), CharClass::Special);
        assert_eq!(classify('~'), CharClass::Special);
        assert_eq!(classify('_'), CharClass::Word);
        assert_eq!(classify('0'), CharClass::Word);
        assert_eq!(classify('z'), CharClass::Word);
        assert_eq!(classify('中'), CharClass::Word);
        assert_eq!(classify('\u{3000}'), CharClass::Space);
        assert_eq!(classify('\t'), CharClass::Space);
    }

    #[test]
    fn splits_code_into_words_and_punctuation() {
        assert_eq!(
            texts("let x_1 = foo.bar(\"baz\");"),
            vec!["let", "x_1", "=", "foo", ".", "bar", "(", "\"", "baz", "\"", ")", ";"]
        );
    }

    #[test]
    fn keeps_cjk_runs_whole() {
        assert_eq!(
            texts("It's a content for test\n这是一个例句,我知道了"),
            vec![
                "It", "'", "s", "a", "content", "for", "test", "这是一个例句", ",", "我知道了"
            ]
        );
    }

    #[test]
    fn offsets_are_absolute_across_sentences() {
        let input = "First sentence. Second one! third";
        for token in tokenize(input) {
            assert_eq!(&input[token.start..token.end], token.text);
        }
        let last = tokenize(input).pop().unwrap();
        assert_eq!(last.text, "third");
        assert_eq!(last.start, input.len() - "third".len());
    }

    #[test]
    fn word_spanning_sentence_boundary_stays_one_token() {
        // U+3002 is a sentence terminator but a word character here.
        assert_eq!(texts("例句。我知道"), vec!["例句。我知道"]);
    }

    #[test]
    fn reset_restarts_over_new_input() {
        let mut tokenizer = CodeTokenizer::new("alpha beta");
        assert_eq!(tokenizer.next().map(|t| t.text), Some("alpha".to_string()));
        tokenizer.reset("gamma");
        let rest: Vec<String> = tokenizer.map(|t| t.text).collect();
        assert_eq!(rest, vec!["gamma"]);
    }

    #[test]
    fn analyze_lowercases_on_request() {
        assert_eq!(analyze("Foo.BAR", true), vec!["foo", ".", "bar"]);
        assert_eq!(analyze("Foo.BAR", false), vec!["Foo", ".", "BAR"]);
    }

    #[test]
    fn empty_and_blank_input_yield_nothing() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" \t\r\n\u{3000}").is_empty());
    }
}
