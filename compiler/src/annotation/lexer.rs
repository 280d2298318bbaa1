use crate::{error::AnnotationError, utils::unescape};
use brine_proto_schema::{Literal, Pos};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    At,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Equals,
    Identifier(String),
    Literal(Literal),
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::At => "\"@\"".to_string(),
            TokenKind::LParen => "\"(\"".to_string(),
            TokenKind::RParen => "\")\"".to_string(),
            TokenKind::LBrace => "\"{\"".to_string(),
            TokenKind::RBrace => "\"}\"".to_string(),
            TokenKind::Comma => "\",\"".to_string(),
            TokenKind::Dot => "\".\"".to_string(),
            TokenKind::Equals => "\"=\"".to_string(),
            TokenKind::Identifier(name) => format!("identifier \"{}\"", name),
            TokenKind::Literal(literal) => format!("literal {:?}", literal),
            TokenKind::Eof => "end of comment".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos:  Pos,
}

pub fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Scanner over the text of one documentation comment.
///
/// Lines are counted from `first_line`, the line of the comment in its file,
/// so positions point into the schema source. Columns are 1-based within the
/// comment text.
pub struct AnnotationLexer {
    chars:  Vec<char>,
    index:  usize,
    line:   u32,
    column: u32,
    legacy: bool,
}

impl AnnotationLexer {
    pub fn new(text: &str, first_line: u32, legacy: bool) -> Self {
        AnnotationLexer {
            chars: text.chars().collect(),
            index: 0,
            line: first_line.max(1),
            column: 1,
            legacy,
        }
    }

    pub fn pos(&self) -> Pos {
        Pos::new(self.line, self.column)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.index).copied()?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek_at(0).is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// The next character that is not whitespace, and the one after it,
    /// without consuming anything.
    pub fn peek_significant(&self) -> (Option<char>, Option<char>) {
        let mut i = self.index;
        while self.chars.get(i).is_some_and(|c| c.is_whitespace()) {
            i += 1;
        }
        (self.chars.get(i).copied(), self.chars.get(i + 1).copied())
    }

    /// Skips free text up to the next `@` that starts an annotation. An `@`
    /// only counts at the start of the text or after whitespace, so e-mail
    /// addresses stay prose. Returns `false` at the end of the text.
    pub fn skip_noise(&mut self) -> Result<bool, AnnotationError> {
        let mut line_start = self.index == 0 || self.chars[self.index - 1] == '\n';
        let mut previous_blank = self.index == 0 || self.chars[self.index - 1].is_whitespace();
        while let Some(c) = self.peek_at(0) {
            if c == '@' && previous_blank {
                if self.legacy && !line_start {
                    return Err(AnnotationError::Syntax {
                        msg: "annotations must start on an empty line".to_string(),
                        pos: self.pos(),
                    });
                }
                return Ok(true);
            }
            if c == '\n' {
                line_start = true;
            } else if !c.is_whitespace() {
                line_start = false;
            }
            previous_blank = c.is_whitespace();
            self.bump();
        }
        Ok(false)
    }

    pub fn next_token(&mut self) -> Result<Token, AnnotationError> {
        self.skip_whitespace();
        let pos = self.pos();
        let Some(c) = self.peek_at(0) else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos,
            });
        };

        let punct = match c {
            '@' => Some(TokenKind::At),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            ',' => Some(TokenKind::Comma),
            '=' => Some(TokenKind::Equals),
            '.' if !self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => Some(TokenKind::Dot),
            _ => None,
        };
        if let Some(kind) = punct {
            self.bump();
            return Ok(Token { kind, pos });
        }

        let kind = if is_identifier_start(c) {
            self.identifier()
        } else if c.is_ascii_digit() || c == '.' || (c == '-' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit() || d == '.')) {
            TokenKind::Literal(self.number(pos)?)
        } else if c == '"' {
            TokenKind::Literal(Literal::String(self.quoted('"', pos)?))
        } else if c == '\'' {
            let text = self.quoted('\'', pos)?;
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => TokenKind::Literal(Literal::Char(ch)),
                _ => {
                    return Err(AnnotationError::Lexical {
                        msg: format!("invalid character literal '{}'", text),
                        pos,
                    })
                }
            }
        } else {
            return Err(AnnotationError::Lexical {
                msg: format!("illegal character {:?}", c),
                pos,
            });
        };
        Ok(Token { kind, pos })
    }

    fn identifier(&mut self) -> TokenKind {
        let mut name = String::new();
        while let Some(c) = self.peek_at(0).filter(|&c| is_identifier_part(c)) {
            name.push(c);
            self.bump();
        }
        match name.as_str() {
            "true" => TokenKind::Literal(Literal::Bool(true)),
            "false" => TokenKind::Literal(Literal::Bool(false)),
            "null" => TokenKind::Literal(Literal::Null),
            _ => TokenKind::Identifier(name),
        }
    }

    fn quoted(&mut self, quote: char, pos: Pos) -> Result<String, AnnotationError> {
        self.bump();
        let mut body = String::new();
        loop {
            match self.peek_at(0) {
                None | Some('\n') => {
                    return Err(AnnotationError::Lexical {
                        msg: if quote == '"' {
                            "unterminated string literal".to_string()
                        } else {
                            "unterminated character literal".to_string()
                        },
                        pos,
                    })
                }
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    body.push('\\');
                    self.bump();
                    if let Some(escaped) = self.peek_at(0).filter(|&c| c != '\n') {
                        body.push(escaped);
                        self.bump();
                    }
                }
                Some(c) => {
                    body.push(c);
                    self.bump();
                }
            }
        }
        unescape(&body).map_err(|msg| AnnotationError::Lexical { msg, pos })
    }

    /// Java style numeric literals: an optional minus sign, decimal, hex or
    /// octal digits, and an `L`, `F` or `D` suffix.
    fn number(&mut self, pos: Pos) -> Result<Literal, AnnotationError> {
        let mut text = String::new();
        while let Some(c) = self
            .peek_at(0)
            .filter(|&c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '+' || c == '_')
        {
            // A sign only continues a literal right after an exponent marker
            if (c == '-' || c == '+') && !text.is_empty() {
                let after_exponent = text.ends_with(['e', 'E']) && !is_hex(&text);
                if !after_exponent {
                    break;
                }
            }
            text.push(c);
            self.bump();
        }
        parse_number(&text).ok_or_else(|| AnnotationError::Lexical {
            msg: format!("malformed number {}", text),
            pos,
        })
    }
}

fn is_hex(text: &str) -> bool {
    let digits = text.trim_start_matches('-');
    digits.starts_with("0x") || digits.starts_with("0X")
}

fn parse_number(text: &str) -> Option<Literal> {
    let cleaned = text.replace('_', "");
    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    if body.is_empty() {
        return None;
    }

    if is_hex(body) {
        let (digits, long) = strip_long_suffix(&body[2..]);
        return integer(u64::from_str_radix(digits, 16).ok()?, negative, long, true);
    }

    let floating = body.contains(['.', 'e', 'E'])
        || body.ends_with(['f', 'F', 'd', 'D']);
    if floating {
        let (digits, suffix) = match body.chars().last() {
            Some(c @ ('f' | 'F' | 'd' | 'D')) => (&body[..body.len() - 1], Some(c)),
            _ => (body, None),
        };
        if !digits.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+')) {
            return None;
        }
        let value: f64 = digits.parse().ok()?;
        let value = if negative { -value } else { value };
        return Some(match suffix {
            Some('f' | 'F') => Literal::Float(value as f32),
            _ => Literal::Double(value),
        });
    }

    let (digits, long) = strip_long_suffix(body);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return integer(u64::from_str_radix(&digits[1..], 8).ok()?, negative, long, true);
    }
    integer(digits.parse().ok()?, negative, long, false)
}

fn strip_long_suffix(digits: &str) -> (&str, bool) {
    match digits.strip_suffix(['l', 'L']) {
        Some(rest) => (rest, true),
        None => (digits, false),
    }
}

/// Hex and octal literals may spell the full unsigned width, which wraps into
/// the negative range as in Java.
fn integer(magnitude: u64, negative: bool, long: bool, radix_literal: bool) -> Option<Literal> {
    if long {
        let value = if radix_literal && !negative {
            magnitude as i64
        } else if negative {
            (-(magnitude as i128)).try_into().ok()?
        } else {
            i64::try_from(magnitude).ok()?
        };
        return Some(Literal::Long(value));
    }
    let value = if radix_literal && !negative {
        u32::try_from(magnitude).ok()? as i32
    } else if negative {
        i32::try_from(-(magnitude as i64)).ok()?
    } else {
        i32::try_from(magnitude).ok()?
    };
    Some(Literal::Int(value))
}
