use crate::error::ProtoError;

/// Renders `text` as a JSON string literal, for error messages.
pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("{:?}", text))
}

pub fn syntax_error(file: &str, msg: impl Into<String>, line: usize, column: usize) -> ProtoError {
    ProtoError::Syntax {
        file: file.to_string(),
        msg: msg.into(),
        line,
        column,
    }
}

/// Parses an integer literal in decimal, hex (`0x`) or octal (leading `0`)
/// notation, without sign.
pub fn parse_int_literal(text: &str) -> Option<u64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') {
        u64::from_str_radix(&text[1..], 8).ok()
    } else {
        text.parse().ok()
    }
}

/// Resolves the backslash escapes of a quoted literal body.
pub fn unescape(body: &str) -> Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(e) = chars.next() else {
            return Err("dangling escape at end of literal".to_string());
        };
        match e {
            'a' => out.push('\u{7}'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{b}'),
            '\\' | '\'' | '"' | '?' => out.push(e),
            'x' | 'X' => {
                let mut digits = String::new();
                while digits.len() < 2 && chars.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                    digits.extend(chars.next());
                }
                let code = u32::from_str_radix(&digits, 16)
                    .map_err(|_| "invalid hex escape".to_string())?;
                out.extend(char::from_u32(code));
            }
            'u' => {
                let digits: String = (0..4).filter_map(|_| chars.next()).collect();
                let c = u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("invalid unicode escape \\u{}", digits))?;
                out.push(c);
            }
            '0'..='7' => {
                let mut code = e.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(code));
            }
            other => return Err(format!("invalid escape \\{}", other)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_literals() {
        assert_eq!(parse_int_literal("42"), Some(42));
        assert_eq!(parse_int_literal("0x1F"), Some(31));
        assert_eq!(parse_int_literal("017"), Some(15));
        assert_eq!(parse_int_literal("0"), Some(0));
        assert_eq!(parse_int_literal("09"), None);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#"a\n\"b\"\x41\101é"#).unwrap(), "a\n\"b\"AAé");
        assert!(unescape(r"\q").is_err());
    }
}
