use logos::Logos;
use std::fmt;

use crate::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")] // Skip whitespace
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    // Keywords. Literal tokens outrank the identifier regex on equal length,
    // so `define` is a keyword while `defined` is an identifier.
    #[token("print-num")]
    PrintNum,
    #[token("print-bool")]
    PrintBool,
    #[token("define")]
    Define,
    #[token("fun")]
    Fun,
    #[token("if")]
    If,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("mod")]
    Mod,

    // Operator symbols
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token(">")]
    Greater,
    #[token("<")]
    Less,
    #[token("=")]
    Equal,

    #[token("#t", |_| true)]
    #[token("#f", |_| false)]
    Boolean(bool),
    #[regex(r"0|-?[1-9][0-9]*", |lex| {
        let slice = lex.slice();
        slice
            .parse::<i64>()
            .map_err(|_| LexerErrorKind::IntegerOutOfRange(slice.to_string()))
    })]
    Number(i64),
    #[regex(r"[a-z][a-z0-9-]*", |lex| lex.slice().to_string())]
    Identifier(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl TokenKind {
    /// Every keyword and operator spelling, used by the REPL completer.
    pub const KEYWORDS: &'static [&'static str] = &[
        "print-num",
        "print-bool",
        "define",
        "fun",
        "if",
        "and",
        "or",
        "not",
        "mod",
    ];
}

// Display reproduces the source spelling, which is what syntax errors quote.
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::PrintNum => "print-num",
            TokenKind::PrintBool => "print-bool",
            TokenKind::Define => "define",
            TokenKind::Fun => "fun",
            TokenKind::If => "if",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::Mod => "mod",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Greater => ">",
            TokenKind::Less => "<",
            TokenKind::Equal => "=",
            TokenKind::Boolean(b) => {
                if *b {
                    "#t"
                } else {
                    "#f"
                }
            }
            TokenKind::Number(n) => return write!(f, "{}", n),
            TokenKind::Identifier(s) => s,
        };
        f.write_str(text)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

#[derive(thiserror::Error, Default, Debug, Clone, PartialEq)]
pub enum LexerErrorKind {
    #[error("unexpected '{0}'")]
    InvalidCharacter(char),
    #[error("integer literal '{0}' is out of range")]
    IntegerOutOfRange(String),
    #[default]
    #[error("invalid token")]
    InvalidToken,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

// Result type alias for convenience
type LexerResult<T> = Result<T, LexerError>;

/// Tokenizes the whole input. Whitespace is discarded; any character that
/// starts no token is reported instead of being skipped.
pub fn tokenize(input: &str) -> LexerResult<Vec<Token>> {
    let mut lexer = TokenKind::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start, range.end);
        match result {
            Ok(kind) => tokens.push(Token { kind, span }),
            Err(LexerErrorKind::InvalidToken) => {
                // logos reports the unmatched slice; name its first character
                let error = match lexer.slice().chars().next() {
                    Some(c) => LexerErrorKind::InvalidCharacter(c),
                    None => LexerErrorKind::InvalidToken,
                };
                return Err(LexerError { error, span });
            }
            Err(error) => return Err(LexerError { error, span }),
        }
    }
    Ok(tokens)
}
