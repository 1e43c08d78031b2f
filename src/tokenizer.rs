//! Configuration tokenizer.
//!
//! Splits configuration text into whitespace-delimited tokens. `{` and `}` are
//! always tokens of their own, `#` and `//` start a comment that runs to the
//! end of the line, and double quotes group a token containing spaces.
//!
//! ```text
//! # sprite config
//! include "common sprites.cfg"
//! ship {
//!     file ship.png
//!     box { 0 0 32 32 }
//! }
//! ```
//!
//! Readers walk sections with [`Tokenizer::token`], which stops (returns
//! `None`) at the closing brace of the current section without consuming it,
//! and [`Tokenizer::close_brace`], which consumes up to and including that
//! brace.

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    text: String,
    quoted: bool,
}

impl Token {
    fn is(&self, symbol: &str) -> bool {
        !self.quoted && self.text == symbol
    }
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    tokens: Vec<Token>,
    pos: usize,
}

fn lex(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut current = String::new();

    fn flush(current: &mut String, tokens: &mut Vec<Token>) {
        if !current.is_empty() {
            tokens.push(Token {
                text: std::mem::take(current),
                quoted: false,
            });
        }
    }

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => flush(&mut current, &mut tokens),
            '#' => {
                flush(&mut current, &mut tokens);
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'/') => {
                flush(&mut current, &mut tokens);
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '{' | '}' => {
                flush(&mut current, &mut tokens);
                tokens.push(Token {
                    text: ch.to_string(),
                    quoted: false,
                });
            }
            '"' => {
                flush(&mut current, &mut tokens);
                let mut text = String::new();
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    text.push(c);
                }
                tokens.push(Token { text, quoted: true });
            }
            c => current.push(c),
        }
    }
    flush(&mut current, &mut tokens);
    tokens
}

impl Tokenizer {
    pub fn new(source: &str) -> Self {
        Self {
            tokens: lex(source),
            pos: 0,
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Next token, or `None` at a closing brace (left in place) or end of input.
    pub fn token(&mut self) -> Option<String> {
        let token = self.tokens.get(self.pos)?;
        if token.is("}") {
            return None;
        }
        self.pos += 1;
        Some(token.text.clone())
    }

    /// Consume a single token of any kind, closing braces included.
    pub fn skip_token(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    /// Consume `{` if it is next.
    pub fn open_brace(&mut self) -> bool {
        match self.tokens.get(self.pos) {
            Some(token) if token.is("{") => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    /// Skip the rest of the current section, consuming its closing brace.
    ///
    /// Nested sections are skipped whole. Returns `false` if the input ended
    /// first.
    pub fn close_brace(&mut self) -> bool {
        let mut depth = 0usize;
        while let Some(token) = self.tokens.get(self.pos) {
            self.pos += 1;
            if token.is("{") {
                depth += 1;
            } else if token.is("}") {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
            }
        }
        false
    }

    /// Next token as a float; 0 when missing or malformed.
    pub fn token_f32(&mut self) -> f32 {
        self.token()
            .and_then(|t| t.parse::<f32>().ok())
            .unwrap_or(0.0)
    }

    /// Next token as an integer; fractional input is truncated, 0 when missing.
    pub fn token_i32(&mut self) -> i32 {
        self.token()
            .and_then(|t| {
                t.parse::<i32>()
                    .ok()
                    .or_else(|| t.parse::<f32>().ok().map(|f| f as i32))
            })
            .unwrap_or(0)
    }
}
