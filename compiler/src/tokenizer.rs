use crate::{error::ProtoError, utils::quote};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub static ref TOKEN_REGEX: Regex = Regex::new(concat!(
        r"(?P<comment>//[^\n]*|/\*(?s:.*?)\*/)",
        r#"|(?P<string>"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*')"#,
        r"|(?P<float>(?:\d+\.\d*|\.\d+)(?:[eE][+-]?\d+)?|\d+[eE][+-]?\d+)",
        r"|(?P<int>0[xX][0-9A-Fa-f]+|\d+)",
        r"|(?P<ident>\.?[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)",
        r"|(?P<symbol>[=;{}\[\]()<>,+\-.:])",
        r"|(?P<space>\s+)",
    ))
    .unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Integer,
    Float,
    String,
    Symbol,
    Comment,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind:   TokenKind,
    pub text:   String,
    pub line:   usize,
    pub column: usize,
}

impl Token {
    pub fn is(&self, text: &str) -> bool {
        self.kind != TokenKind::String && self.kind != TokenKind::Comment && self.text == text
    }

    /// Line of the last character of the token.
    pub fn end_line(&self) -> usize {
        self.line + self.text.matches('\n').count()
    }
}

/// Splits schema source into tokens. Comments are kept, whitespace is not,
/// and the list always ends with an empty `Eof` token.
pub fn tokenize_schema(file: &str, text: &str) -> Result<Vec<Token>, ProtoError> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut column = 1;
    let mut last_end = 0;

    let lexical = |unexpected: &str, line, column| ProtoError::Lexical {
        file: file.to_string(),
        msg: format!("Unexpected text {}", quote(unexpected)),
        line,
        column,
    };

    for caps in TOKEN_REGEX.captures_iter(text) {
        let Some(mat) = caps.get(0) else { continue };
        if mat.start() > last_end {
            return Err(lexical(&text[last_end..mat.start()], line, column));
        }
        let part = mat.as_str();

        let kind = if caps.name("comment").is_some() {
            Some(TokenKind::Comment)
        } else if caps.name("string").is_some() {
            Some(TokenKind::String)
        } else if caps.name("float").is_some() {
            Some(TokenKind::Float)
        } else if caps.name("int").is_some() {
            Some(TokenKind::Integer)
        } else if caps.name("ident").is_some() {
            Some(TokenKind::Identifier)
        } else if caps.name("symbol").is_some() {
            Some(TokenKind::Symbol)
        } else {
            None
        };
        if let Some(kind) = kind {
            tokens.push(Token {
                kind,
                text: part.to_string(),
                line,
                column,
            });
        }

        let newline_count = part.matches('\n').count();
        if newline_count > 0 {
            line += newline_count;
            if let Some(last_line_part) = part.split('\n').last() {
                column = last_line_part.chars().count() + 1;
            }
        } else {
            column += part.chars().count();
        }
        last_end = mat.end();
    }

    if last_end != text.len() {
        return Err(lexical(&text[last_end..], line, column));
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        line,
        column,
    });
    Ok(tokens)
}
