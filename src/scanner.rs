use crate::diagnostic::{self, Position, SourceFile, Span};
use multipeek::{multipeek, MultiPeek};
use std::fmt::Formatter;
use std::str::{Chars, FromStr};
use std::sync::Arc;

/// Scan Bolton source text into a sequence of tokens.
///
/// `source_name` only shows up in diagnostics (e.g. `<stdin>` for code submitted over the
/// network, or the script name for `RUN`).
pub fn tokenize(source_name: &str, text: &str) -> Result<Tokens, LexError> {
    let file = SourceFile::new(source_name, text);
    let tokens = Scanner::new(&file).scan_tokens()?;
    Ok(Tokens { file, tokens })
}

/// The output of the scanner: a token sequence, always terminated by [`TokenKind::Eof`],
/// together with the file it was scanned from.
#[derive(Debug)]
pub struct Tokens {
    pub(crate) file: Arc<SourceFile>,
    pub(crate) tokens: Vec<Token>,
}

impl Tokens {
    pub fn file(&self) -> &Arc<SourceFile> {
        &self.file
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }
}

struct Scanner<'a> {
    file: &'a Arc<SourceFile>,
    source: MultiPeek<Chars<'a>>,
    position: Position,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    fn new(file: &'a Arc<SourceFile>) -> Self {
        Self {
            file,
            source: multipeek(file.text().chars()),
            position: Position::default(),
            tokens: Vec::new(),
        }
    }

    fn scan_tokens(mut self) -> Result<Vec<Token>, LexError> {
        while let Some(c) = self.peek() {
            let start = self.position;
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '#' => {
                    // Comments run until the end of the line; the line break is still a token.
                    self.advance_while(|c| c != '\n');
                }
                ';' | '\n' => self.single(TokenKind::Newline),
                '+' => self.single(TokenKind::Plus),
                '*' => self.single(TokenKind::Mul),
                '/' => self.single(TokenKind::Div),
                '^' => self.single(TokenKind::Pow),
                '(' => self.single(TokenKind::LeftParen),
                ')' => self.single(TokenKind::RightParen),
                '[' => self.single(TokenKind::LeftSquare),
                ']' => self.single(TokenKind::RightSquare),
                ',' => self.single(TokenKind::Comma),
                '-' => self.one_or_two('>', TokenKind::Minus, TokenKind::Arrow),
                '=' => self.one_or_two('=', TokenKind::Equal, TokenKind::EqualEqual),
                '<' => self.one_or_two('=', TokenKind::Less, TokenKind::LessEqual),
                '>' => self.one_or_two('=', TokenKind::Greater, TokenKind::GreaterEqual),
                '!' => {
                    self.advance();
                    if self.advance_on_match('=') {
                        self.push(TokenKind::BangEqual, start);
                    } else {
                        return Err(self.error(
                            LexErrorKind::ExpectedCharacter("'=' (after '!')"),
                            start,
                        ));
                    }
                }
                '"' => self.string(start)?,
                d if d.is_ascii_digit() => self.number(start),
                c if Self::is_alpha(c) => self.identifier(start),
                c => {
                    self.advance();
                    return Err(self.error(LexErrorKind::IllegalCharacter(c), start));
                }
            }
        }
        let end = self.position;
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(end, end.next_column()),
        });
        Ok(self.tokens)
    }

    fn string(&mut self, start: Position) -> Result<(), LexError> {
        // Eat the opening `"`
        self.advance();
        let mut literal = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(self.error(
                        LexErrorKind::ExpectedCharacter("'\"' (to close the string)"),
                        start,
                    ))
                }
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => literal.push('\n'),
                    Some('t') => literal.push('\t'),
                    Some(c) => literal.push(c),
                    None => {
                        return Err(self.error(
                            LexErrorKind::ExpectedCharacter("'\"' (to close the string)"),
                            start,
                        ))
                    }
                },
                Some(c) => literal.push(c),
            }
        }
        self.push(TokenKind::String(literal), start);
        Ok(())
    }

    fn number(&mut self, start: Position) {
        let mut lexeme = String::new();
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            if c == '.' && !seen_dot {
                seen_dot = true;
            } else if !c.is_ascii_digit() {
                break;
            }
            lexeme.push(c);
            self.advance();
        }
        let kind = match (seen_dot, i64::from_str(&lexeme)) {
            (false, Ok(n)) => TokenKind::Int(n),
            // Digits-only literals can only fail to parse as `i64` by overflowing:
            // fall back to a float rather than rejecting the program.
            _ => TokenKind::Float(f64::from_str(&lexeme).unwrap_or(f64::INFINITY)),
        };
        self.push(kind, start);
    }

    fn identifier(&mut self, start: Position) {
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if !(Self::is_alpha(c) || c.is_ascii_digit()) {
                break;
            }
            lexeme.push(c);
            self.advance();
        }
        let kind = match Keyword::from_str(&lexeme) {
            Ok(keyword) => TokenKind::Keyword(keyword),
            Err(_) => TokenKind::Identifier(lexeme),
        };
        self.push(kind, start);
    }

    fn is_alpha(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_'
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.position;
        self.advance();
        self.push(kind, start);
    }

    fn one_or_two(&mut self, second: char, one: TokenKind, two: TokenKind) {
        let start = self.position;
        self.advance();
        if self.advance_on_match(second) {
            self.push(two, start);
        } else {
            self.push(one, start);
        }
    }

    fn push(&mut self, kind: TokenKind, start: Position) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, self.position),
        });
    }

    fn error(&self, kind: LexErrorKind, start: Position) -> LexError {
        LexError {
            kind,
            span: Span::new(start, self.position),
            file: Arc::clone(self.file),
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.source.next()?;
        self.position.advance(c);
        Some(c)
    }

    fn advance_on_match(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn advance_while<F>(&mut self, f: F)
    where
        F: Fn(char) -> bool,
    {
        while let Some(c) = self.peek() {
            if !f(c) {
                break;
            }
            self.advance();
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.source.peek().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Keyword {
    Var,
    And,
    Or,
    Not,
    If,
    Elif,
    Else,
    For,
    To,
    Step,
    While,
    Fun,
    Then,
    End,
    Return,
    Continue,
    Break,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn discriminant(&self) -> TokenDiscriminant {
        TokenDiscriminant::from(&self.kind)
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let line = self.span.start.line + 1;
        match &self.kind {
            TokenKind::Int(n) => write!(f, "{line} - Int {n}"),
            TokenKind::Float(n) => write!(f, "{line} - Float {n}"),
            TokenKind::String(s) => write!(f, "{line} - String {s:?}"),
            TokenKind::Identifier(i) => write!(f, "{line} - Identifier {i}"),
            TokenKind::Keyword(k) => write!(f, "{line} - Keyword {k}"),
            kind => write!(f, "{line} - {:?}", TokenDiscriminant::from(kind)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, strum_macros::EnumDiscriminants)]
#[strum_discriminants(name(TokenDiscriminant))]
pub enum TokenKind {
    // Literals
    Int(i64),
    Float(f64),
    String(String),
    Identifier(String),
    Keyword(Keyword),

    // Single-character tokens
    Plus,
    Minus,
    Mul,
    Div,
    Pow,
    LeftParen,
    RightParen,
    LeftSquare,
    RightSquare,
    Comma,
    Equal,
    Less,
    Greater,

    // Two-character tokens
    Arrow,
    EqualEqual,
    BangEqual,
    LessEqual,
    GreaterEqual,

    // Both `;` and a line break end a statement
    Newline,

    // End of file
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexErrorKind {
    #[error("Illegal Character: '{0}'")]
    IllegalCharacter(char),
    #[error("Expected Character: {0}")]
    ExpectedCharacter(&'static str),
}

/// The scanner ran into text it could not turn into a token.
#[derive(Debug, thiserror::Error)]
#[error("{}", diagnostic::report(.kind, .span, .file))]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
    pub file: Arc<SourceFile>,
}
