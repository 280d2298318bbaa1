use crate::{
    error::ProtoError,
    reserved::{ReservationSource, ReservedProcessor, ReservedRange},
    tokenizer::{Token, TokenKind},
    utils::{parse_int_literal, quote, syntax_error, unescape},
};
use brine_proto_schema::{
    Documentation, EnumBuilder, EnumValueBuilder, ExtendBuilder, FieldBuilder, FileBuilder, Import,
    Label, Location, MessageBuilder, OneOfBuilder, OptionValue, ReservedNumbers, Syntax,
    MAX_FIELD_NUMBER,
};

/// Parses the tokens of one schema file into a `FileBuilder` with full names
/// assigned. Comment tokens become the documentation of the definition that
/// follows them.
pub fn parse_schema(file: &str, tokens: &[Token]) -> Result<FileBuilder, ProtoError> {
    let (code, docs) = attach_documentation(tokens);
    let mut parser = Parser {
        file,
        tokens: code,
        docs,
        index: 0,
    };
    parser.parse_file()
}

struct Parser<'a> {
    file:   &'a str,
    tokens: Vec<Token>,
    docs:   Vec<Option<Documentation>>,
    index:  usize,
}

impl<'a> Parser<'a> {
    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.index.min(last)]
    }

    fn location(&self) -> Location {
        let tok = self.current();
        Location::new(tok.line, tok.column)
    }

    fn documentation(&self) -> Option<Documentation> {
        self.docs.get(self.index).cloned().flatten()
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        tok
    }

    fn peek_is(&self, text: &str) -> bool {
        self.current().is(text)
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.peek_is(text) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, msg: impl Into<String>) -> ProtoError {
        let tok = self.current();
        syntax_error(self.file, msg, tok.line, tok.column)
    }

    fn expect(&mut self, text: &str) -> Result<Token, ProtoError> {
        if !self.peek_is(text) {
            return Err(self.error(format!(
                "Expected {} but found {}",
                quote(text),
                describe(self.current())
            )));
        }
        Ok(self.advance())
    }

    fn unexpected_token(&self) -> ProtoError {
        self.error(format!("Unexpected token {}", describe(self.current())))
    }

    fn expect_identifier(&mut self) -> Result<Token, ProtoError> {
        if self.current().kind != TokenKind::Identifier {
            return Err(self.error(format!(
                "Expected identifier but found {}",
                describe(self.current())
            )));
        }
        Ok(self.advance())
    }

    fn expect_string(&mut self) -> Result<String, ProtoError> {
        if self.current().kind != TokenKind::String {
            return Err(self.error(format!(
                "Expected string but found {}",
                describe(self.current())
            )));
        }
        let mut out = String::new();
        while self.current().kind == TokenKind::String {
            let body = string_body(self.current());
            out.push_str(&unescape(body).map_err(|msg| self.error(msg))?);
            self.advance();
        }
        Ok(out)
    }

    /// An integer with optional sign.
    fn integer(&mut self) -> Result<i64, ProtoError> {
        let negative = if self.eat("-") {
            true
        } else {
            self.eat("+");
            false
        };
        let tok = self.current().clone();
        if tok.kind != TokenKind::Integer {
            return Err(self.error(format!("Expected integer but found {}", describe(&tok))));
        }
        let magnitude = parse_int_literal(&tok.text)
            .and_then(|m| i128::try_from(m).ok())
            .ok_or_else(|| self.error(format!("Invalid integer {}", quote(&tok.text))))?;
        let value = if negative { -magnitude } else { magnitude };
        let value = i64::try_from(value)
            .map_err(|_| self.error(format!("Integer {} is out of range", quote(&tok.text))))?;
        self.advance();
        Ok(value)
    }

    fn int32(&mut self) -> Result<i32, ProtoError> {
        let location = self.location();
        let value = self.integer()?;
        i32::try_from(value).map_err(|_| {
            syntax_error(
                self.file,
                format!("Integer {} does not fit in 32 bits", value),
                location.line,
                location.column,
            )
        })
    }

    fn parse_file(&mut self) -> Result<FileBuilder, ProtoError> {
        let mut builder = FileBuilder::new(self.file);

        if self.eat("syntax") {
            self.expect("=")?;
            let location = self.location();
            builder.syntax = match self.expect_string()?.as_str() {
                "proto2" => Syntax::Proto2,
                "proto3" => Syntax::Proto3,
                other => {
                    return Err(syntax_error(
                        self.file,
                        format!("Unknown syntax {}", quote(other)),
                        location.line,
                        location.column,
                    ))
                }
            };
            self.expect(";")?;
        }

        let mut package_seen = false;
        loop {
            if self.current().kind == TokenKind::Eof {
                break;
            }
            let text = self.current().text.clone();
            match text.as_str() {
                "package" => {
                    if package_seen {
                        return Err(self.error("Multiple package definitions"));
                    }
                    package_seen = true;
                    self.advance();
                    builder.package = self.expect_identifier()?.text;
                    self.expect(";")?;
                }
                "import" => {
                    let location = self.location();
                    self.advance();
                    let public = self.eat("public");
                    let weak = !public && self.eat("weak");
                    let mut import = Import::new(self.expect_string()?, location);
                    import.public = public;
                    import.weak = weak;
                    builder.imports.push(import);
                    self.expect(";")?;
                }
                "option" => {
                    let (name, value) = self.option_statement()?;
                    builder.options.insert(name, value);
                }
                "message" => builder.messages.push(self.message()?),
                "enum" => builder.enums.push(self.enumeration()?),
                "extend" => builder.extends.push(self.extend()?),
                ";" => {
                    self.advance();
                }
                _ => return Err(self.unexpected_token()),
            }
        }

        builder.assign_full_names();
        Ok(builder)
    }

    /// `option name = constant ;`
    fn option_statement(&mut self) -> Result<(String, OptionValue), ProtoError> {
        self.expect("option")?;
        let name = self.option_name()?;
        self.expect("=")?;
        let value = self.constant()?;
        self.expect(";")?;
        Ok((name, value))
    }

    /// `ident` or `(full.ident)` followed by `.sub.fields`.
    fn option_name(&mut self) -> Result<String, ProtoError> {
        let mut name = if self.eat("(") {
            let inner = self.expect_identifier()?.text;
            self.expect(")")?;
            format!("({})", inner)
        } else {
            self.expect_identifier()?.text
        };
        while self.current().kind == TokenKind::Identifier && self.current().text.starts_with('.') {
            name.push_str(&self.advance().text);
        }
        Ok(name)
    }

    fn constant(&mut self) -> Result<OptionValue, ProtoError> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::String => Ok(OptionValue::String(self.expect_string()?)),
            TokenKind::Identifier => {
                self.advance();
                Ok(match tok.text.as_str() {
                    "true" => OptionValue::Bool(true),
                    "false" => OptionValue::Bool(false),
                    "inf" => OptionValue::Float(f64::INFINITY),
                    "nan" => OptionValue::Float(f64::NAN),
                    _ => OptionValue::Identifier(tok.text),
                })
            }
            TokenKind::Float => {
                self.advance();
                self.float(&tok.text, false)
            }
            TokenKind::Integer => Ok(OptionValue::Int(self.integer()?)),
            TokenKind::Symbol if tok.text == "-" || tok.text == "+" => {
                let negative = tok.text == "-";
                let next = self.tokens.get(self.index + 1).cloned();
                match next {
                    Some(n) if n.kind == TokenKind::Float => {
                        self.advance();
                        self.advance();
                        self.float(&n.text, negative)
                    }
                    Some(n) if n.kind == TokenKind::Identifier && (n.text == "inf" || n.text == "nan") => {
                        self.advance();
                        self.advance();
                        let value = if n.text == "inf" { f64::INFINITY } else { f64::NAN };
                        Ok(OptionValue::Float(if negative { -value } else { value }))
                    }
                    _ => Ok(OptionValue::Int(self.integer()?)),
                }
            }
            _ => Err(self.error(format!("Expected constant but found {}", describe(&tok)))),
        }
    }

    fn float(&self, text: &str, negative: bool) -> Result<OptionValue, ProtoError> {
        let value: f64 = text
            .parse()
            .map_err(|_| self.error(format!("Invalid number {}", quote(text))))?;
        Ok(OptionValue::Float(if negative { -value } else { value }))
    }

    fn message(&mut self) -> Result<MessageBuilder, ProtoError> {
        let documentation = self.documentation();
        self.expect("message")?;
        let location = self.location();
        let name = self.expect_identifier()?.text;
        let mut message = MessageBuilder::new(name.clone(), location);
        message.documentation = documentation;
        self.expect("{")?;

        let mut reserved = ReservedProcessor::new(name, MAX_FIELD_NUMBER);
        while !self.eat("}") {
            if self.current().kind == TokenKind::Eof {
                return Err(self.error("Expected \"}\" but found end of file"));
            }
            let text = self.current().text.clone();
            match text.as_str() {
                "message" => message.messages.push(self.message()?),
                "enum" => message.enums.push(self.enumeration()?),
                "oneof" => message.oneofs.push(self.oneof()?),
                "extend" => message.extends.push(self.extend()?),
                "reserved" => self.reserved(&mut reserved, 1, MAX_FIELD_NUMBER)?,
                "extensions" => self.extensions(&mut message.extension_ranges)?,
                "option" => {
                    let (name, value) = self.option_statement()?;
                    message.options.insert(name, value);
                }
                ";" => {
                    self.advance();
                }
                _ => message.fields.push(self.field(None)?),
            }
        }

        let (numbers, names) = reserved.finish();
        message.reserved_numbers = numbers;
        message.reserved_names = names;
        Ok(message)
    }

    /// `label? type name = number [options] ;`. Members of a `oneof` pass
    /// their label in and are written without one.
    fn field(&mut self, forced_label: Option<Label>) -> Result<FieldBuilder, ProtoError> {
        let documentation = self.documentation();
        let location = self.location();
        let label = match forced_label {
            Some(label) => label,
            None if self.eat("optional") => Label::Optional,
            None if self.eat("required") => Label::Required,
            None if self.eat("repeated") => Label::Repeated,
            None => Label::Optional,
        };
        let type_name = self.expect_identifier()?.text;
        let name = self.expect_identifier()?.text;
        self.expect("=")?;
        let number = self.int32()?;

        let mut field = FieldBuilder::new(name, number, label, type_name, location);
        field.documentation = documentation;
        if self.eat("[") {
            loop {
                let name = self.option_name()?;
                self.expect("=")?;
                let value = self.constant()?;
                if name == "default" {
                    field.default_value = Some(value);
                } else {
                    field.options.insert(name, value);
                }
                if !self.eat(",") {
                    break;
                }
            }
            self.expect("]")?;
        }
        self.expect(";")?;
        Ok(field)
    }

    fn oneof(&mut self) -> Result<OneOfBuilder, ProtoError> {
        self.expect("oneof")?;
        let location = self.location();
        let mut oneof = OneOfBuilder::new(self.expect_identifier()?.text, location);
        self.expect("{")?;
        while !self.eat("}") {
            if self.current().kind == TokenKind::Eof {
                return Err(self.error("Expected \"}\" but found end of file"));
            }
            if self.peek_is("option") {
                let (name, value) = self.option_statement()?;
                oneof.options.insert(name, value);
            } else if !self.eat(";") {
                oneof.fields.push(self.field(Some(Label::OneOf))?);
            }
        }
        Ok(oneof)
    }

    fn enumeration(&mut self) -> Result<EnumBuilder, ProtoError> {
        let documentation = self.documentation();
        self.expect("enum")?;
        let location = self.location();
        let name = self.expect_identifier()?.text;
        let mut e = EnumBuilder::new(name.clone(), location);
        e.documentation = documentation;
        self.expect("{")?;

        let mut reserved = ReservedProcessor::new(name, i32::MAX);
        while !self.eat("}") {
            if self.current().kind == TokenKind::Eof {
                return Err(self.error("Expected \"}\" but found end of file"));
            }
            let text = self.current().text.clone();
            match text.as_str() {
                "option" => {
                    let (name, value) = self.option_statement()?;
                    e.options.insert(name, value);
                }
                "reserved" => self.reserved(&mut reserved, i32::MIN, i32::MAX)?,
                ";" => {
                    self.advance();
                }
                _ => {
                    let documentation = self.documentation();
                    let location = self.location();
                    let name = self.expect_identifier()?.text;
                    self.expect("=")?;
                    let number = self.int32()?;
                    let mut value = EnumValueBuilder::new(name, number, location);
                    value.documentation = documentation;
                    if self.eat("[") {
                        loop {
                            let name = self.option_name()?;
                            self.expect("=")?;
                            let option = self.constant()?;
                            value.options.insert(name, option);
                            if !self.eat(",") {
                                break;
                            }
                        }
                        self.expect("]")?;
                    }
                    self.expect(";")?;
                    e.values.push(value);
                }
            }
        }

        let (numbers, names) = reserved.finish();
        e.reserved_numbers = numbers;
        e.reserved_names = names;
        Ok(e)
    }

    fn extend(&mut self) -> Result<ExtendBuilder, ProtoError> {
        self.expect("extend")?;
        let location = self.location();
        let mut extend = ExtendBuilder::new(self.expect_identifier()?.text, location);
        self.expect("{")?;
        while !self.eat("}") {
            if self.current().kind == TokenKind::Eof {
                return Err(self.error("Expected \"}\" but found end of file"));
            }
            if !self.eat(";") {
                extend.fields.push(self.field(None)?);
            }
        }
        Ok(extend)
    }

    /// `from (to (to | max))?`, both ends inside `min..=max`.
    fn range(&mut self, min: i32, max: i32) -> Result<ReservedRange, ProtoError> {
        let location = self.location();
        let from = self.int32()?;
        let range = if !self.eat("to") {
            ReservedRange::single(from)
        } else if self.eat("max") {
            ReservedRange::open(from)
        } else {
            ReservedRange::closed(from, self.int32()?)
        };
        let (from, to) = range.bounds(max);
        if from < min || to > max || to < from {
            let text = match range.to {
                Some(_) if from == to => from.to_string(),
                Some(_) => format!("{} to {}", from, to),
                None => format!("{} to max", from),
            };
            return Err(syntax_error(
                self.file,
                format!("Invalid range {}, numbers must be between {} and {}", text, min, max),
                location.line,
                location.column,
            ));
        }
        Ok(range)
    }

    fn reserved(&mut self, processor: &mut ReservedProcessor, min: i32, max: i32) -> Result<(), ProtoError> {
        let tok = self.expect("reserved")?;
        let mut source = ReservationSource::new(format!("reserved statement at line {}", tok.line));
        if self.current().kind == TokenKind::String {
            loop {
                source.names.push(self.expect_string()?);
                if !self.eat(",") {
                    break;
                }
            }
        } else {
            loop {
                source.ranges.push(self.range(min, max)?);
                if !self.eat(",") {
                    break;
                }
            }
        }
        self.expect(";")?;
        processor
            .add(&source)
            .map_err(|e| ProtoError::descriptor(self.file, e))
    }

    fn extensions(&mut self, ranges: &mut ReservedNumbers) -> Result<(), ProtoError> {
        self.expect("extensions")?;
        loop {
            let (from, to) = self.range(1, MAX_FIELD_NUMBER)?.bounds(MAX_FIELD_NUMBER);
            ranges.insert_range(from, to);
            if !self.eat(",") {
                break;
            }
        }
        self.expect(";")
            .map(|_| ())
    }
}

fn describe(tok: &Token) -> String {
    if tok.kind == TokenKind::Eof {
        "end of file".to_string()
    } else {
        quote(&tok.text)
    }
}

fn string_body(tok: &Token) -> &str {
    let text = tok.text.as_str();
    text.get(1..text.len().saturating_sub(1)).unwrap_or("")
}

/// Splits comments from code. The contiguous block of comments right before
/// a code token, with no blank line in between, becomes that token's
/// documentation. A comment on the same line as the preceding code is a
/// trailing comment and is dropped.
fn attach_documentation(tokens: &[Token]) -> (Vec<Token>, Vec<Option<Documentation>>) {
    let mut code = Vec::new();
    let mut docs = Vec::new();
    let mut pending: Vec<&Token> = Vec::new();
    let mut last_code_line = 0;

    for tok in tokens {
        if tok.kind == TokenKind::Comment {
            if pending.is_empty() && tok.line == last_code_line {
                continue;
            }
            if pending.last().is_some_and(|prev| tok.line > prev.end_line() + 1) {
                pending.clear();
            }
            pending.push(tok);
            continue;
        }
        let attached = pending
            .last()
            .is_some_and(|last| tok.line <= last.end_line() + 1);
        docs.push(if attached { render_documentation(&pending) } else { None });
        pending.clear();
        last_code_line = tok.end_line();
        code.push(tok.clone());
    }

    if code.last().map_or(true, |t| t.kind != TokenKind::Eof) {
        let (line, column) = code.last().map_or((1, 1), |t| (t.line, t.column));
        code.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            line,
            column,
        });
        docs.push(None);
    }
    (code, docs)
}

fn render_documentation(comments: &[&Token]) -> Option<Documentation> {
    let mut lines: Vec<(usize, String)> = Vec::new();
    for tok in comments {
        let text = tok.text.as_str();
        if let Some(body) = text.strip_prefix("//") {
            let body = body.strip_prefix('/').unwrap_or(body);
            lines.push((tok.line, strip_space(body)));
            continue;
        }
        let body = text.get(2..text.len().saturating_sub(2)).unwrap_or("");
        let body = body.strip_prefix('*').unwrap_or(body);
        for (i, line) in body.split('\n').enumerate() {
            let trimmed = line.trim_start();
            let line = trimmed.strip_prefix('*').unwrap_or(trimmed);
            lines.push((tok.line + i, strip_space(line)));
        }
    }

    let first = lines.iter().position(|(_, l)| !l.is_empty())?;
    let last = lines.iter().rposition(|(_, l)| !l.is_empty())?;
    let kept = &lines[first..=last];
    Some(Documentation {
        text: kept.iter().map(|(_, l)| l.as_str()).collect::<Vec<_>>().join("\n"),
        line: kept[0].0,
    })
}

fn strip_space(line: &str) -> String {
    line.strip_prefix(' ').unwrap_or(line).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize_schema;
    use brine_proto_schema::DescriptorError;

    fn parse(text: &str) -> Result<FileBuilder, ProtoError> {
        let tokens = tokenize_schema("test.proto", text)?;
        parse_schema("test.proto", &tokens)
    }

    #[test]
    fn test_parse_messages_and_enums() {
        let file = parse(
            r#"
            syntax = "proto2";
            package shop.v1;
            import public "common.proto";

            message Order {
              required int64 id = 1;
              repeated Line lines = 2 [packed = false];
              optional State state = 3 [default = OPEN];
              message Line { optional string sku = 1; }
              oneof payment { string card = 4; string voucher = 5; }
              reserved 10 to 12, 20;
              reserved "legacy";
              extensions 100 to max;
            }

            enum State {
              option allow_alias = true;
              OPEN = 0;
              NEGATIVE = -1;
            }
            "#,
        )
        .unwrap();

        assert_eq!(file.package, "shop.v1");
        assert_eq!(file.imports, vec![Import {
            name:     "common.proto".to_string(),
            public:   true,
            weak:     false,
            location: Location::new(4, 13),
        }]);

        let order = &file.messages[0];
        assert_eq!(order.full_name, "shop.v1.Order");
        assert_eq!(order.fields.len(), 3);
        assert_eq!(order.fields[0].label, Label::Required);
        assert_eq!(order.fields[1].options.get("packed"), Some(&OptionValue::Bool(false)));
        assert_eq!(
            order.fields[2].default_value,
            Some(OptionValue::Identifier("OPEN".to_string()))
        );
        assert_eq!(order.messages[0].full_name, "shop.v1.Order.Line");
        assert_eq!(order.oneofs[0].fields[1].full_name, "shop.v1.Order.voucher");
        assert_eq!(order.oneofs[0].fields[1].label, Label::OneOf);
        assert!(order.reserved_numbers.contains(11));
        assert!(order.reserved_names.contains("legacy"));
        assert!(order.extension_ranges.contains(MAX_FIELD_NUMBER));

        let state = &file.enums[0];
        assert!(state.options.is_true("allow_alias"));
        assert_eq!(state.values[1].number, -1);
    }

    #[test]
    fn test_documentation_attachment() {
        let file = parse(
            "/**\n * An order.\n * @TypeId(7)\n */\nmessage Order {\n  // Identifier.\n  int64 id = 1; // trailing\n\n  // detached\n\n  int64 at = 2;\n}\n",
        )
        .unwrap();
        let order = &file.messages[0];
        let doc = order.documentation.as_ref().unwrap();
        assert_eq!(doc.text, "An order.\n@TypeId(7)");
        assert_eq!(doc.line, 2);
        assert_eq!(order.fields[0].documentation.as_ref().unwrap().text, "Identifier.");
        assert!(order.fields[1].documentation.is_none());
    }

    #[test]
    fn test_overlapping_reserved_statements() {
        let err = parse("message M {\n reserved 1 to 5;\n reserved 5;\n}").unwrap_err();
        assert!(matches!(
            err,
            ProtoError::Descriptor {
                source: DescriptorError::ReservedOverlap { number: 5, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_reserved_ranges_stay_in_domain() {
        for source in [
            "message M { reserved 600000000 to max; }",
            "message M { reserved 5 to 600000000; }",
            "message M { reserved -3; }",
            "message M { reserved 0 to 4; }",
            "message M { reserved 9 to 2; }",
            "message M { extensions 0 to 10; }",
        ] {
            assert!(
                matches!(parse(source), Err(ProtoError::Syntax { ref msg, .. }) if msg.starts_with("Invalid range")),
                "{}",
                source
            );
        }

        let file = parse("message M { reserved 536870911 to max; }\nenum E { A = 0; reserved -9 to -2, 2147483000 to max; }")
            .unwrap();
        assert!(file.messages[0].reserved_numbers.contains(MAX_FIELD_NUMBER));
        assert!(!file.messages[0].reserved_numbers.contains(MAX_FIELD_NUMBER - 1));
        assert!(file.enums[0].reserved_numbers.contains(-5));
        assert!(file.enums[0].reserved_numbers.contains(i32::MAX));
    }

    #[test]
    fn test_syntax_errors() {
        let err = parse("message M { int32 = 1; }").unwrap_err();
        assert!(matches!(err, ProtoError::Syntax { line: 1, column: 19, .. }), "{:?}", err);
        assert!(matches!(parse("package a; package b;"), Err(ProtoError::Syntax { .. })));
        assert!(matches!(parse("syntax = \"proto4\";"), Err(ProtoError::Syntax { .. })));
        assert!(matches!(parse("message M {"), Err(ProtoError::Syntax { .. })));
        assert!(matches!(parse("message M { int32 a = 99999999999; }"), Err(ProtoError::Syntax { .. })));
    }
}
