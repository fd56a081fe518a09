use std::fmt;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::scanner::token::{Span, Token, TokenKind};

/// The ` at end` / ` at 'lexeme'` part of a parse or resolution diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    AtEnd,
    At(String),
}

impl ErrorLocation {
    pub fn of(token: &Token) -> Self {
        if token.kind == TokenKind::Eof {
            Self::AtEnd
        } else {
            Self::At(token.lexeme.clone())
        }
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtEnd => write!(f, " at end"),
            Self::At(lexeme) => write!(f, " at '{lexeme}'"),
        }
    }
}

// ============= Compile-time errors (with miette diagnostics) =============

#[derive(Error, Debug, Diagnostic)]
pub enum CompileError {
    #[error("[line {line}] Error: {message}")]
    #[diagnostic(code(lox::scan))]
    Scan {
        message: String,
        line: usize,
        #[label("here")]
        span: SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("[line {line}] Error{location}: {message}")]
    #[diagnostic(code(lox::parse))]
    Parse {
        message: String,
        line: usize,
        location: ErrorLocation,
        #[label("here")]
        span: SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("[line {line}] Error{location}: {message}")]
    #[diagnostic(code(lox::resolve))]
    Resolve {
        message: String,
        line: usize,
        location: ErrorLocation,
        #[label("here")]
        span: SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },
}

impl CompileError {
    pub fn scan(message: impl Into<String>, line: usize, span: Span) -> Self {
        Self::Scan {
            message: message.into(),
            line,
            span: span.into(),
            src: miette::NamedSource::new("input", String::new()),
        }
    }

    pub fn parse(
        message: impl Into<String>,
        line: usize,
        location: ErrorLocation,
        span: Span,
    ) -> Self {
        Self::Parse {
            message: message.into(),
            line,
            location,
            span: span.into(),
            src: miette::NamedSource::new("input", String::new()),
        }
    }

    pub fn resolve(
        message: impl Into<String>,
        line: usize,
        location: ErrorLocation,
        span: Span,
    ) -> Self {
        Self::Resolve {
            message: message.into(),
            line,
            location,
            span: span.into(),
            src: miette::NamedSource::new("input", String::new()),
        }
    }

    /// Attach source code for fancy miette diagnostics.
    pub fn with_source_code(self, name: impl Into<String>, source: impl Into<String>) -> Self {
        let src = miette::NamedSource::new(name.into(), source.into());
        match self {
            Self::Scan {
                message,
                line,
                span,
                ..
            } => Self::Scan {
                message,
                line,
                span,
                src,
            },
            Self::Parse {
                message,
                line,
                location,
                span,
                ..
            } => Self::Parse {
                message,
                line,
                location,
                span,
                src,
            },
            Self::Resolve {
                message,
                line,
                location,
                span,
                ..
            } => Self::Resolve {
                message,
                line,
                location,
                span,
                src,
            },
        }
    }
}

// ============= Runtime errors =============

#[derive(Error, Debug)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
    pub span: Option<Span>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
        }
    }

    /// Render the reporting format: the message, then `[line N]` on its own
    /// line when the error carries a location.
    pub fn display_with_line(&self, source: &str) -> String {
        match self.span {
            Some(span) => {
                let line = offset_to_line(source, span.offset);
                format!("{}\n[line {line}]", self.message)
            }
            None => self.message.clone(),
        }
    }
}

/// 0-based line of a byte offset: the number of newlines before it.
pub fn offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
}
