//=====================================================
// File: tokenizer.rs
//=====================================================
// Author: AML Contributors
// License: MIT
// Goal: AML lexer implementation
// Objective: Transform UTF-8 source text into a token stream with accurate
//            line/column tracking for downstream diagnostics
//=====================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 1-based source location attached to every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals and names
    Identifier(String),
    Number(f64),
    Str(String),
    True,
    False,
    Null,

    // Keywords
    Var,
    Func,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Break,
    Continue,
    ImportPy,
    ImportAml,
    As,
    Try,
    Catch,
    Raise,
    Namespace,
    Spawn,
    Parallel,
    Meta,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power,
    Not,
    AndAnd,
    OrOr,
    Assign,
    EqualEqual,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,

    Eof,
}

impl TokenKind {
    /// Short token description used in parse diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Identifier(name) => format!("identifier '{name}'"),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::Str(s) => format!("string {s:?}"),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("{other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self { kind, position }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unterminated string literal starting at {position}")]
    UnterminatedString { position: Position },
    #[error("invalid escape sequence '\\{escape}' at {position}")]
    InvalidEscape { escape: char, position: Position },
    #[error("unexpected character '{ch}' at {position}")]
    UnexpectedChar { ch: char, position: Position },
    #[error("malformed number literal at {position}")]
    MalformedNumber { position: Position },
}

fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "var" => TokenKind::Var,
        "func" => TokenKind::Func,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "return" => TokenKind::Return,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "import_py" => TokenKind::ImportPy,
        "import_aml" => TokenKind::ImportAml,
        "as" => TokenKind::As,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "raise" => TokenKind::Raise,
        "namespace" => TokenKind::Namespace,
        "spawn" => TokenKind::Spawn,
        "parallel" => TokenKind::Parallel,
        "meta" => TokenKind::Meta,
        // The original grammar accepts both capitalizations.
        "true" | "True" => TokenKind::True,
        "false" | "False" => TokenKind::False,
        "null" => TokenKind::Null,
        _ => return None,
    };
    Some(kind)
}

/// Single-pass lexer over AML source text.
///
/// Whitespace and `//` line comments are discarded; positions stay accurate
/// across them. The token stream is produced once per call to [`Tokenizer::tokenize`].
pub struct Tokenizer {
    chars: Vec<char>,
    current: usize,
    line: usize,
    column: usize,
}

impl Tokenizer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            current: 0,
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_layout();
            let position = self.position();
            let Some(ch) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, position));
                return Ok(tokens);
            };

            let kind = if ch.is_ascii_digit() {
                self.lex_number()?
            } else if ch == '"' {
                self.lex_string()?
            } else if ch.is_alphabetic() || ch == '_' {
                self.lex_word()
            } else {
                self.lex_operator()?
            };
            tokens.push(Token::new(kind, position));
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.current + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.current += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Consume `expected` when it is next; report whether it was consumed.
    fn matches(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_layout(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind, LexError> {
        let position = self.position();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        // Decimal part only when a digit follows the dot, so member access on
        // call results (`f(1).x`) keeps working.
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| LexError::MalformedNumber { position })
    }

    fn lex_string(&mut self) -> Result<TokenKind, LexError> {
        let start = self.position();
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => {
                    return Err(LexError::UnterminatedString { position: start });
                }
                Some('"') => return Ok(TokenKind::Str(value)),
                Some('\\') => {
                    let escape_pos = self.position();
                    match self.advance() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('\\') => value.push('\\'),
                        Some('"') => value.push('"'),
                        Some('0') => value.push('\0'),
                        Some(other) => {
                            return Err(LexError::InvalidEscape {
                                escape: other,
                                position: escape_pos,
                            });
                        }
                        None => return Err(LexError::UnterminatedString { position: start }),
                    }
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn lex_word(&mut self) -> TokenKind {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }
        keyword(&word).unwrap_or(TokenKind::Identifier(word))
    }

    fn lex_operator(&mut self) -> Result<TokenKind, LexError> {
        let position = self.position();
        let ch = self.advance().expect("caller checked a character is present");
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => {
                if self.matches('*') {
                    TokenKind::Power
                } else {
                    TokenKind::Star
                }
            }
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '!' => {
                if self.matches('=') {
                    TokenKind::NotEqual
                } else {
                    TokenKind::Not
                }
            }
            '&' => {
                if self.matches('&') {
                    TokenKind::AndAnd
                } else {
                    return Err(LexError::UnexpectedChar { ch, position });
                }
            }
            '|' => {
                if self.matches('|') {
                    TokenKind::OrOr
                } else {
                    return Err(LexError::UnexpectedChar { ch, position });
                }
            }
            '=' => {
                if self.matches('=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Assign
                }
            }
            '<' => {
                if self.matches('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.matches('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            other => return Err(LexError::UnexpectedChar { ch: other, position }),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Tokenizer::new(source)
            .tokenize()
            .expect("tokenize")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_declaration_with_operators() {
        assert_eq!(
            kinds("var total = 1 + 2.5"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier("total".into()),
                TokenKind::Assign,
                TokenKind::Number(1.0),
                TokenKind::Plus,
                TokenKind::Number(2.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn line_comments_are_discarded_but_positions_advance() {
        let tokens = Tokenizer::new("// header\nvar x").tokenize().expect("tokenize");
        assert_eq!(tokens[0].kind, TokenKind::Var);
        assert_eq!(tokens[0].position, Position::new(2, 1));
    }

    #[test]
    fn string_escapes_are_decoded() {
        assert_eq!(
            kinds(r#""a\tb\n""#),
            vec![TokenKind::Str("a\tb\n".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_string_reports_start_position() {
        let err = Tokenizer::new("\n  \"oops").tokenize().unwrap_err();
        assert_eq!(
            err,
            LexError::UnterminatedString {
                position: Position::new(2, 3)
            }
        );
    }

    #[test]
    fn invalid_escape_is_rejected() {
        let err = Tokenizer::new(r#""bad \q""#).tokenize().unwrap_err();
        assert!(matches!(err, LexError::InvalidEscape { escape: 'q', .. }));
    }

    #[test]
    fn dotted_and_compound_operators() {
        assert_eq!(
            kinds("a.b != c && d || !e ** 2"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Dot,
                TokenKind::Identifier("b".into()),
                TokenKind::NotEqual,
                TokenKind::Identifier("c".into()),
                TokenKind::AndAnd,
                TokenKind::Identifier("d".into()),
                TokenKind::OrOr,
                TokenKind::Not,
                TokenKind::Identifier("e".into()),
                TokenKind::Power,
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lone_ampersand_is_an_error() {
        assert!(matches!(
            Tokenizer::new("a & b").tokenize(),
            Err(LexError::UnexpectedChar { ch: '&', .. })
        ));
    }
}
