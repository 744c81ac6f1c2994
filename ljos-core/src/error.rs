use std::path::PathBuf;

use thiserror::Error;

use crate::lexer::Token;

/// A lexical error. Lexing stops at the first one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message} at {line}:{column}")]
pub struct LexError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl LexError {
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        LexError {
            message: message.into(),
            line,
            column,
        }
    }
}

/// A syntax error, carrying the token the parser choked on.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message} at {}:{}", token.span.line, token.span.column)]
pub struct ParseError {
    pub message: String,
    pub token: Token,
}

impl ParseError {
    pub fn new(message: impl Into<String>, token: Token) -> Self {
        ParseError {
            message: message.into(),
            token,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("circular 'extends' chain through {}", .0.display())]
    CircularExtends(PathBuf),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read source: {0}")]
    SourceIo(#[from] std::io::Error),
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {}", display_parse_errors(.0))]
    Parse(Vec<ParseError>),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

fn display_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
