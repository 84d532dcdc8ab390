//! Value tokenizer for PIX lines
//!
//! Tokens are produced lazily from the remainder of a line; the reader
//! drives it one value at a time.

use std::iter::Peekable;
use std::str::CharIndices;

/// A lexical token inside a value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f32),
    /// `&HHHHHHHH`
    Hex(f32),
    Str(String),
    Word(String),
    Open,
    Close,
}

pub(crate) struct Lexer<'a> {
    text: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().peekable(),
        }
    }

    fn skip_ws(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    /// Consume a run of characters that can appear in a bare token.
    fn take_bare(&mut self, start: usize) -> &'a str {
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if c.is_whitespace() || c == '(' || c == ')' || c == '"' {
                break;
            }
            end = i + c.len_utf8();
            self.chars.next();
        }
        &self.text[start..end]
    }

    fn lex_string(&mut self) -> Result<Token, String> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err("unterminated string".to_string()),
                Some((_, '"')) => return Ok(Token::Str(out)),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, '"')) => out.push('"'),
                    Some((_, '\\')) => out.push('\\'),
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, other)) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => return Err("unterminated string".to_string()),
                },
                Some((_, c)) => out.push(c),
            }
        }
    }

    /// `true` once only whitespace remains.
    pub(crate) fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.chars.peek().is_none()
    }
}

/// Parse the digits after `&`.
pub(crate) fn parse_hex_float(digits: &str) -> Option<f32> {
    if digits.is_empty() || digits.len() > 8 {
        return None;
    }
    u32::from_str_radix(digits, 16).ok().map(f32::from_bits)
}

fn classify_bare(word: &str) -> Result<Token, String> {
    if let Some(digits) = word.strip_prefix('&') {
        return parse_hex_float(digits)
            .map(Token::Hex)
            .ok_or_else(|| format!("invalid hex float '{word}'"));
    }

    let first = word.chars().next().unwrap_or(' ');
    let numeric_start = first.is_ascii_digit() || first == '-' || first == '+' || first == '.';
    if !numeric_start {
        return Ok(Token::Word(word.to_string()));
    }

    let digits = word.strip_prefix(['-', '+']).unwrap_or(word);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return word
            .parse::<i64>()
            .map(Token::Int)
            .map_err(|_| format!("integer '{word}' out of range"));
    }
    word.parse::<f32>()
        .map(Token::Float)
        .map_err(|_| format!("invalid number '{word}'"))
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_ws();
        let &(start, c) = self.chars.peek()?;
        match c {
            '(' => {
                self.chars.next();
                Some(Ok(Token::Open))
            }
            ')' => {
                self.chars.next();
                Some(Ok(Token::Close))
            }
            '"' => {
                self.chars.next();
                Some(self.lex_string())
            }
            _ => {
                let word = self.take_bare(start);
                Some(classify_bare(word))
            }
        }
    }
}
