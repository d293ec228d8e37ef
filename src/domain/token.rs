//! Whitespace tokenizer for the screening expression language.
//!
//! Every operand, operator and parenthesis must be separated by whitespace.
//! Compound tokens such as `ma(5)` or `ma_short.shift(3)` contain no spaces and
//! stay whole. The tokenizer never fails; classification happens in the compiler.

/// A raw lexical unit with its byte offset in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme<'a> {
    pub text: &'a str,
    pub position: usize,
}

pub fn tokenize(input: &str) -> Vec<Lexeme<'_>> {
    let mut lexemes = Vec::new();
    let mut start: Option<usize> = None;

    for (i, ch) in input.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(s)) => {
                lexemes.push(Lexeme {
                    text: &input[s..i],
                    position: s,
                });
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }

    if let Some(s) = start {
        lexemes.push(Lexeme {
            text: &input[s..],
            position: s,
        });
    }

    lexemes
}
