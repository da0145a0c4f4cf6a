//! Tokenizer for the C++ subset found in motion scripts.
//!
//! It only needs to be precise enough to find array declarations, call sites
//! and numeric expressions; everything else passes through as punctuation or
//! identifiers. Block comments, string and character literals are skipped.
//! Line comments are kept as tokens because the generator stores block names
//! in them.

/// A numeric literal such as `500`, `0.29f`, `1e-3` or `.5F`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NumberLit {
    pub value: f64,
    /// No fractional part or exponent was written.
    pub integer: bool,
    /// A trailing `f`/`F` unit suffix was present.
    pub float_suffix: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Number(NumberLit),
    Punct(char),
    /// Text of a `//` comment, without the slashes, trimmed.
    LineComment(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based source line where the token starts.
    pub line: usize,
}

impl Token {
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<NumberLit> {
        match self.kind {
            TokenKind::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::LineComment(_))
    }
}

/// Splits `source` into tokens. Never fails: unknown characters become punctuation.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer {
        chars: source.char_indices().peekable(),
        src: source,
        line: 1,
        out: Vec::new(),
    };
    lexer.run();
    lexer.out
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    line: usize,
    out: Vec<Token>,
}

impl Lexer<'_> {
    fn run(&mut self) {
        while let Some(&(pos, c)) = self.chars.peek() {
            match c {
                '\n' => {
                    self.line += 1;
                    self.chars.next();
                }
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '/' if self.src[pos..].starts_with("//") => self.line_comment(pos),
                '/' if self.src[pos..].starts_with("/*") => self.block_comment(),
                '"' | '\'' => self.quoted(c),
                c if c.is_ascii_digit() => self.number(pos),
                '.' if self.src[pos + 1..].starts_with(|d: char| d.is_ascii_digit()) => {
                    self.number(pos)
                }
                c if c.is_alphabetic() || c == '_' => self.ident(pos),
                c => {
                    self.chars.next();
                    self.push(TokenKind::Punct(c));
                }
            }
        }
    }

    fn push(&mut self, kind: TokenKind) {
        self.out.push(Token {
            kind,
            line: self.line,
        });
    }

    fn line_comment(&mut self, start: usize) {
        let mut end = self.src.len();
        while let Some(&(pos, c)) = self.chars.peek() {
            if c == '\n' {
                end = pos;
                break;
            }
            self.chars.next();
        }
        let text = self.src[start + 2..end].trim().to_string();
        self.push(TokenKind::LineComment(text));
    }

    fn block_comment(&mut self) {
        self.chars.next();
        self.chars.next();
        let mut prev = '\0';
        for (_, c) in self.chars.by_ref() {
            if c == '\n' {
                self.line += 1;
            }
            if prev == '*' && c == '/' {
                return;
            }
            prev = c;
        }
    }

    fn quoted(&mut self, quote: char) {
        self.chars.next();
        let mut escaped = false;
        for (_, c) in self.chars.by_ref() {
            match c {
                '\n' => {
                    // Unterminated literal; resume on the next line.
                    self.line += 1;
                    return;
                }
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                c if c == quote => return,
                _ => {}
            }
        }
    }

    fn ident(&mut self, start: usize) {
        let mut end = start;
        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                end = pos + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        self.push(TokenKind::Ident(self.src[start..end].to_string()));
    }

    fn number(&mut self, start: usize) {
        if self.src[start..].starts_with("0x") || self.src[start..].starts_with("0X") {
            return self.hex_number(start);
        }

        let mut end = start;
        let mut integer = true;
        let mut prev = '\0';
        while let Some(&(pos, c)) = self.chars.peek() {
            let exponent_sign = (c == '+' || c == '-') && (prev == 'e' || prev == 'E');
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                if c == '.' || c == 'e' || c == 'E' {
                    integer = false;
                }
                end = pos + 1;
                prev = c;
                self.chars.next();
            } else {
                break;
            }
        }

        let mut float_suffix = false;
        while let Some(&(_, c)) = self.chars.peek() {
            match c {
                'f' | 'F' => {
                    float_suffix = true;
                    self.chars.next();
                }
                'u' | 'U' | 'l' | 'L' => {
                    self.chars.next();
                }
                _ => break,
            }
        }

        let text = &self.src[start..end];
        let value = text.trim_end_matches(['e', 'E']).parse::<f64>().unwrap_or(0.0);
        self.push(TokenKind::Number(NumberLit {
            value,
            integer,
            float_suffix,
        }));
    }

    fn hex_number(&mut self, start: usize) {
        self.chars.next();
        self.chars.next();
        let digits_start = start + 2;
        let mut end = digits_start;
        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_ascii_hexdigit() {
                end = pos + 1;
                self.chars.next();
            } else {
                break;
            }
        }
        let value = u64::from_str_radix(&self.src[digits_start..end], 16).unwrap_or(0);
        self.push(TokenKind::Number(NumberLit {
            value: value as f64,
            integer: true,
            float_suffix: false,
        }));
    }
}
