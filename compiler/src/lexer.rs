// Lexer for device layout text.
//
// Tokenizes the layout template carried in a device record: header lines
// (`name`, `version`, `target`, `type`), array declarations, and gate lines.
// Uses the `logos` crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Layout token types.
///
/// Keywords and symbols are matched as fixed strings. Numbers and
/// placeholders carry parsed values. Identifiers carry no value — use the
/// span to retrieve the text from the source.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+|#[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("name")]
    Name,
    #[token("version")]
    Version,
    #[token("target")]
    Target,
    #[token("type")]
    Type,
    #[token("array")]
    Array,
    #[token("pi")]
    Pi,

    // ── Symbols ──
    #[token("|")]
    Pipe,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("-")]
    Minus,

    // ── Literals ──
    /// Numeric literal (int, float, exponent, negative).
    #[regex(r"-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", parse_number)]
    Number(f64),

    /// Template placeholder, e.g. `{bs_array}`. Stores the inner name.
    #[regex(r"\{[a-zA-Z_][a-zA-Z0-9_]*\}", parse_placeholder)]
    Placeholder(String),

    // ── Identifier ──
    //
    // Placed after keywords — logos prioritises fixed `#[token]` matches
    // over regex for the same length, so `name` matches Name, not Ident.
    /// Identifier: `[a-zA-Z_][a-zA-Z0-9_]*`
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ── Structure ──
    /// One or more newlines (significant — every line is one statement).
    #[regex(r"\n+")]
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name => write!(f, "name"),
            Token::Version => write!(f, "version"),
            Token::Target => write!(f, "target"),
            Token::Type => write!(f, "type"),
            Token::Array => write!(f, "array"),
            Token::Pi => write!(f, "pi"),
            Token::Pipe => write!(f, "|"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Equals => write!(f, "="),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Minus => write!(f, "-"),
            Token::Number(v) => write!(f, "{v}"),
            Token::Placeholder(s) => write!(f, "{{{s}}}"),
            Token::Ident => write!(f, "<ident>"),
            Token::Newline => write!(f, "<newline>"),
        }
    }
}

// ── Callbacks ──

fn parse_number(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_placeholder(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    Some(slice[1..slice.len() - 1].to_string()) // strip braces
}

// ── Public API ──

/// Lex a layout string into tokens.
///
/// Returns all successfully parsed tokens together with any errors for
/// unrecognised characters. Lexing is non-fatal: errors are collected and
/// the lexer continues past bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──
