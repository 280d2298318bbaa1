use super::lexer::{is_identifier_start, AnnotationLexer, Token, TokenKind};
use crate::error::AnnotationError;
use brine_proto_schema::{Annotation, Attribute, Pos, Value, DEFAULT_ATTRIBUTE};

/// Recursive descent parser for the annotations of one comment.
///
/// Tokens are pulled lazily: after the name of a top-level annotation only
/// the next visible character is inspected, so the prose that follows is
/// never tokenized.
pub struct AnnotationParser<'a> {
    lexer:         AnnotationLexer,
    peeked:        Option<Token>,
    is_repeatable: &'a dyn Fn(&str) -> bool,
}

impl<'a> AnnotationParser<'a> {
    pub fn new(lexer: AnnotationLexer, is_repeatable: &'a dyn Fn(&str) -> bool) -> Self {
        AnnotationParser {
            lexer,
            peeked: None,
            is_repeatable,
        }
    }

    /// Every annotation of the text, in source order. A name may only repeat
    /// when `is_repeatable` says so.
    pub fn parse_all(mut self) -> Result<Vec<Annotation>, AnnotationError> {
        let mut annotations: Vec<Annotation> = Vec::new();
        while self.lexer.skip_noise()? {
            let at = self.next()?;
            let annotation = self.annotation(at.pos)?;
            if annotations.iter().any(|a| a.name == annotation.name) && !(self.is_repeatable)(&annotation.name) {
                return Err(AnnotationError::Syntax {
                    msg: format!("duplicate annotation @{}", annotation.name),
                    pos: annotation.pos,
                });
            }
            annotations.push(annotation);
        }
        Ok(annotations)
    }

    fn next(&mut self) -> Result<Token, AnnotationError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.lexer.next_token(),
        }
    }

    fn peek(&mut self) -> Result<&Token, AnnotationError> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.lexer.next_token()?,
        };
        Ok(self.peeked.insert(token))
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, AnnotationError> {
        let token = self.next()?;
        if token.kind != kind {
            return Err(unexpected(&token, &kind.describe()));
        }
        Ok(token)
    }

    fn identifier(&mut self) -> Result<(String, Pos), AnnotationError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Identifier(name) => Ok((name, token.pos)),
            _ => Err(unexpected(&token, "identifier")),
        }
    }

    /// `Name ('.' Name)* attrs?`, the `@` already consumed. Only characters are
    /// looked at between the name parts, no tokens are buffered.
    fn annotation(&mut self, pos: Pos) -> Result<Annotation, AnnotationError> {
        let (mut name, _) = self.identifier()?;
        loop {
            match self.lexer.peek_significant() {
                (Some('.'), Some(c)) if is_identifier_start(c) => {
                    self.expect(TokenKind::Dot)?;
                    let (part, _) = self.identifier()?;
                    name.push('.');
                    name.push_str(&part);
                }
                _ => break,
            }
        }

        let mut annotation = Annotation::new(name, pos);
        if self.lexer.peek_significant().0 == Some('(') {
            self.expect(TokenKind::LParen)?;
            self.attributes(&mut annotation)?;
        }
        Ok(annotation)
    }

    /// Everything after `(`: empty, a single shorthand value, or a list of
    /// `name = value` pairs.
    fn attributes(&mut self, annotation: &mut Annotation) -> Result<(), AnnotationError> {
        let first = self.next()?;
        match first.kind {
            TokenKind::RParen => return Ok(()),
            TokenKind::Identifier(ref name) if self.peek()?.kind == TokenKind::Equals => {
                let name = name.clone();
                self.next()?;
                let value = self.value()?;
                annotation.attributes.push(Attribute {
                    name,
                    pos: first.pos,
                    value,
                });
                while self.peek()?.kind == TokenKind::Comma {
                    self.next()?;
                    let (name, pos) = self.identifier()?;
                    self.expect(TokenKind::Equals)?;
                    let value = self.value()?;
                    if annotation.attribute(&name).is_some() {
                        return Err(AnnotationError::Syntax {
                            msg: format!("duplicate attribute \"{}\" in @{}", name, annotation.name),
                            pos,
                        });
                    }
                    annotation.attributes.push(Attribute { name, pos, value });
                }
            }
            _ => {
                let pos = first.pos;
                let value = self.value_from(first)?;
                annotation.attributes.push(Attribute {
                    name: DEFAULT_ATTRIBUTE.to_string(),
                    pos,
                    value,
                });
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(())
    }

    fn value(&mut self) -> Result<Value, AnnotationError> {
        let token = self.next()?;
        self.value_from(token)
    }

    fn value_from(&mut self, token: Token) -> Result<Value, AnnotationError> {
        match token.kind {
            TokenKind::Literal(literal) => Ok(Value::Literal(literal)),
            TokenKind::Identifier(mut name) => {
                while self.peek()?.kind == TokenKind::Dot {
                    self.next()?;
                    let (part, _) = self.identifier()?;
                    name.push('.');
                    name.push_str(&part);
                }
                Ok(Value::Identifier(name))
            }
            TokenKind::LBrace => {
                let mut items = Vec::new();
                if self.peek()?.kind == TokenKind::RBrace {
                    self.next()?;
                    return Ok(Value::Array(items));
                }
                loop {
                    items.push(self.value()?);
                    let token = self.next()?;
                    match token.kind {
                        TokenKind::Comma => continue,
                        TokenKind::RBrace => break,
                        _ => return Err(unexpected(&token, "\",\" or \"}\"")),
                    }
                }
                Ok(Value::Array(items))
            }
            TokenKind::At => {
                let nested = self.annotation(token.pos)?;
                Ok(Value::Annotation(Box::new(nested)))
            }
            _ => Err(unexpected(&token, "a value")),
        }
    }
}

fn unexpected(token: &Token, expected: &str) -> AnnotationError {
    AnnotationError::Syntax {
        msg: format!("Expected {} but found {}", expected, token.kind.describe()),
        pos: token.pos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brine_proto_schema::Literal;

    fn parse(text: &str) -> Result<Vec<Annotation>, AnnotationError> {
        let never = |_: &str| false;
        AnnotationParser::new(AnnotationLexer::new(text, 1, false), &never).parse_all()
    }

    #[test]
    fn test_named_attributes_keep_order() {
        let parsed = parse("@Foo(x=1, y={true,false})").unwrap();
        assert_eq!(parsed.len(), 1);
        let foo = &parsed[0];
        assert_eq!(foo.name, "Foo");
        let names: Vec<_> = foo.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(foo.get("x"), Some(&Value::int(1)));
        assert_eq!(
            foo.get("y"),
            Some(&Value::Array(vec![Value::bool(true), Value::bool(false)]))
        );
    }

    #[test]
    fn test_shorthand_forms() {
        let parsed = parse(
            "Prose first.\n@Plain and more prose\n@Lit(\"s\")\n@Id(com.example.KIND)\n@Outer(@Inner(n = 2L))",
        )
        .unwrap();
        assert_eq!(parsed[0].name, "Plain");
        assert!(parsed[0].attributes.is_empty());
        assert_eq!(parsed[1].value(), Some(&Value::string("s")));
        assert_eq!(parsed[2].value(), Some(&Value::identifier("com.example.KIND")));
        let inner = parsed[3].value().and_then(Value::as_annotation).unwrap();
        assert_eq!(inner.name, "Inner");
        assert_eq!(inner.get("n"), Some(&Value::Literal(Literal::Long(2))));
    }

    #[test]
    fn test_qualified_name_stops_at_sentence_end() {
        let parsed = parse("@org.example.Tag. Followed by text").unwrap();
        assert_eq!(parsed[0].name, "org.example.Tag");
        assert_eq!(parsed[0].pos, Pos::new(1, 1));
    }

    #[test]
    fn test_duplicates() {
        let err = parse("@A\n@A").unwrap_err();
        assert_eq!(
            err,
            AnnotationError::Syntax {
                msg: "duplicate annotation @A".into(),
                pos: Pos::new(2, 1),
            }
        );
        assert!(matches!(
            parse("@A(x=1, x=2)"),
            Err(AnnotationError::Syntax { pos, .. }) if pos == Pos::new(1, 9)
        ));

        let repeatable = |name: &str| name == "Tag";
        let parsed = AnnotationParser::new(AnnotationLexer::new("@Tag(1) @Tag(2)", 1, false), &repeatable)
            .parse_all()
            .unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse("@A(x=)"), Err(AnnotationError::Syntax { .. })));
        assert!(matches!(parse("@A(x=1"), Err(AnnotationError::Syntax { .. })));
        assert!(matches!(parse("@A({1 2})"), Err(AnnotationError::Syntax { .. })));
        assert!(matches!(parse("@(x)"), Err(AnnotationError::Syntax { .. })));
    }
}
