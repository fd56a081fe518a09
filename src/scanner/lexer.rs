use winnow::combinator::alt;
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::stream::{LocatingSlice, Location};
use winnow::token::{any, take_till, take_while};

use crate::error::CompileError;
use crate::scanner::token::{Literal, Span, Token, TokenKind, keyword_kind};

type Input<'a> = LocatingSlice<&'a str>;

fn whitespace_and_comments(input: &mut Input<'_>) -> ModalResult<()> {
    loop {
        let before = input.current_token_start();
        take_while(0.., |c: char| {
            c == ' ' || c == '\t' || c == '\r' || c == '\n'
        })
        .void()
        .parse_next(input)?;

        if input.starts_with("//") {
            take_while(0.., |c: char| c != '\n')
                .void()
                .parse_next(input)?;
        } else if input.current_token_start() == before {
            break;
        }
    }
    Ok(())
}

/// Strings are raw: no escape sequences, and they may span multiple lines.
fn string_literal(input: &mut Input<'_>) -> ModalResult<Token> {
    let start = input.current_token_start();
    '"'.parse_next(input)?;
    let content: &str = take_till(0.., '"').parse_next(input)?;
    let value = content.to_string();
    '"'.parse_next(input)?;
    let end = input.current_token_start();
    let span = Span::new(start, end - start);
    Ok(Token::new(
        TokenKind::String,
        format!("\"{value}\""),
        Some(Literal::Str(value)),
        0,
        span,
    ))
}

fn number_literal(input: &mut Input<'_>) -> ModalResult<Token> {
    let start = input.current_token_start();
    let whole: &str = take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    let mut lexeme = whole.to_string();

    let checkpoint = input.checkpoint();
    let dot_result: Result<char, winnow::error::ErrMode<ContextError>> = '.'.parse_next(input);
    if dot_result.is_ok() {
        match take_while::<_, _, ContextError>(1.., |c: char| c.is_ascii_digit()).parse_next(input)
        {
            Ok(frac) => {
                lexeme.push('.');
                lexeme.push_str(frac);
            }
            Err(_) => {
                input.reset(&checkpoint);
            }
        }
    }

    let end = input.current_token_start();
    let value: f64 = lexeme.parse().expect("lexer only accepts digit sequences");
    Ok(Token::new(
        TokenKind::Number,
        lexeme,
        Some(Literal::Number(value)),
        0,
        Span::new(start, end - start),
    ))
}

fn identifier_or_keyword(input: &mut Input<'_>) -> ModalResult<Token> {
    let start = input.current_token_start();
    let first: char = any
        .verify(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .parse_next(input)?;
    let rest: &str =
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)?;
    let end = input.current_token_start();
    let mut lexeme = String::with_capacity(1 + rest.len());
    lexeme.push(first);
    lexeme.push_str(rest);
    let kind = keyword_kind(&lexeme).unwrap_or(TokenKind::Identifier);
    Ok(Token::new(kind, lexeme, None, 0, Span::new(start, end - start)))
}

fn two_char_token(input: &mut Input<'_>) -> ModalResult<Token> {
    let start = input.current_token_start();
    let (kind, lexeme) = alt((
        "!=".value((TokenKind::BangEqual, "!=")),
        "==".value((TokenKind::EqualEqual, "==")),
        ">=".value((TokenKind::GreaterEqual, ">=")),
        "<=".value((TokenKind::LessEqual, "<=")),
    ))
    .parse_next(input)?;
    Ok(Token::new(kind, lexeme, None, 0, Span::new(start, 2)))
}

fn single_char_token(input: &mut Input<'_>) -> ModalResult<Token> {
    let start = input.current_token_start();
    let c = any
        .verify(|c: &char| "(){}.,;-+/*!=<>?:".contains(*c))
        .parse_next(input)?;
    let kind = match c {
        '(' => TokenKind::LeftParen,
        ')' => TokenKind::RightParen,
        '{' => TokenKind::LeftBrace,
        '}' => TokenKind::RightBrace,
        ',' => TokenKind::Comma,
        '.' => TokenKind::Dot,
        '-' => TokenKind::Minus,
        '+' => TokenKind::Plus,
        ';' => TokenKind::Semicolon,
        '/' => TokenKind::Slash,
        '*' => TokenKind::Star,
        '!' => TokenKind::Bang,
        '=' => TokenKind::Equal,
        '<' => TokenKind::Less,
        '>' => TokenKind::Greater,
        '?' => TokenKind::Question,
        ':' => TokenKind::Colon,
        _ => unreachable!("verify guarantees valid char"),
    };
    Ok(Token::new(kind, c.to_string(), None, 0, Span::new(start, 1)))
}

fn scan_token(input: &mut Input<'_>) -> ModalResult<Token> {
    alt((
        string_literal,
        number_literal,
        identifier_or_keyword,
        two_char_token,
        single_char_token,
    ))
    .parse_next(input)
}

/// Scan all tokens from source. Lexical errors are collected and scanning
/// continues, so several of them can surface in one pass; the token vector is
/// produced either way and always ends with a single EOF token.
pub fn scan(source: &str) -> (Vec<Token>, Vec<CompileError>) {
    let newlines: Vec<usize> = source
        .bytes()
        .enumerate()
        .filter(|&(_, b)| b == b'\n')
        .map(|(i, _)| i)
        .collect();
    // 0-based: a token's line is the number of newlines before its offset.
    let line_at = |offset: usize| newlines.partition_point(|&pos| pos < offset);

    let mut input = LocatingSlice::new(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    loop {
        if whitespace_and_comments(&mut input).is_err() {
            break;
        }
        if input.is_empty() {
            break;
        }
        match scan_token(&mut input) {
            Ok(mut token) => {
                token.line = line_at(token.span.offset);
                tokens.push(token);
            }
            Err(_) => {
                let offset = input.current_token_start();
                if input.starts_with("\"") {
                    // An unterminated string swallows the rest of the input.
                    let _ = take_while::<_, _, ContextError>(0.., |_| true).parse_next(&mut input);
                    let end = input.current_token_start();
                    errors.push(CompileError::scan(
                        "Unterminated string.",
                        line_at(end),
                        Span::new(offset, end - offset),
                    ));
                } else {
                    let skipped = any::<_, ContextError>.parse_next(&mut input).ok();
                    let len = skipped.map_or(1, char::len_utf8);
                    errors.push(CompileError::scan(
                        "Unexpected character.",
                        line_at(offset),
                        Span::new(offset, len),
                    ));
                }
            }
        }
    }

    let eof_offset = source.len();
    tokens.push(Token::new(
        TokenKind::Eof,
        "",
        None,
        line_at(eof_offset),
        Span::new(eof_offset, 0),
    ));

    (tokens, errors)
}
