//! Lexical analysis: splitting one stage of a command line into words.
//!
//! Quoting only groups characters; quotes never reach the emitted words. A backslash
//! makes the next character literal and is otherwise dropped. Unterminated quotes and
//! a trailing backslash are tolerated: whatever was collected is emitted as the last word.

/// A single word produced by [`tokenize`].
pub type Token = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    Single,
    Double,
}

impl Quote {
    fn from_char(ch: char) -> Option<Self> {
        match ch {
            '\'' => Some(Quote::Single),
            '"' => Some(Quote::Double),
            _ => None,
        }
    }
}

struct Tokenizer {
    tokens: Vec<Token>,
    buffer: String,
    quote: Option<Quote>,
    escaped: bool,
}

impl Tokenizer {
    fn new() -> Self {
        Tokenizer {
            tokens: Vec::new(),
            buffer: String::new(),
            quote: None,
            escaped: false,
        }
    }

    fn feed(&mut self, ch: char) {
        if self.escaped {
            self.buffer.push(ch);
            self.escaped = false;
            return;
        }
        if ch == '\\' {
            self.escaped = true;
            return;
        }
        if let Some(quote) = Quote::from_char(ch) {
            match self.quote {
                Some(open) if open == quote => self.quote = None,
                Some(_) => self.buffer.push(ch),
                None => self.quote = Some(quote),
            }
            return;
        }
        match ch {
            ' ' | '\t' if self.quote.is_none() => self.flush(),
            c => self.buffer.push(c),
        }
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            self.tokens.push(std::mem::take(&mut self.buffer));
        }
    }

    fn finish(mut self) -> Vec<Token> {
        self.flush();
        self.tokens
    }
}

/// Split `line` into words, honoring single quotes, double quotes and backslash escapes.
pub fn tokenize(line: &str) -> Vec<Token> {
    let mut tokenizer = Tokenizer::new();
    for ch in line.chars() {
        tokenizer.feed(ch);
    }
    tokenizer.finish()
}

/// Drop the first word starting with `#` and everything after it.
pub fn strip_comment(mut tokens: Vec<Token>) -> Vec<Token> {
    if let Some(idx) = tokens.iter().position(|t| t.starts_with('#')) {
        tokens.truncate(idx);
    }
    tokens
}
