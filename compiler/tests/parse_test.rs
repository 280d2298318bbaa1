use brine_proto_compiler::{
    parse_file,
    reserved::render_declarations,
    tokenizer::{tokenize_schema, TokenKind},
    ProtoError,
};
use brine_proto_schema::{FieldType, Label, OptionValue, ScalarType, Syntax, MAX_FIELD_NUMBER};
use proptest::prelude::*;
use std::collections::BTreeSet;

#[test]
fn test_parse_schema() {
    let input = r#"
    syntax = "proto2";
    package example;

    import public "shapes.proto";

    /** How the corners look. */
    enum Type {
      FLAT = 0;
      ROUND = 1;
      POINTED = 2;
    }

    message Color {
      required int32 red = 1;
      required int32 green = 2;
      required int32 blue = 3;
      optional int32 alpha = 4 [default = 255];
    }

    message Example {
      optional uint32 client_id = 1;
      optional Type type = 2;
      repeated Color colors = 3 [packed = false];
      oneof payload {
        string text = 4;
        bytes blob = 5;
      }
      reserved 10 to 20, 100 to max;
      reserved "legacy";
      extensions 1000 to 1999;
    }
    "#;

    let tokens = tokenize_schema("example.proto", input).expect("tokenize_schema failed");
    assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    let file = parse_file("example.proto", input).expect("parse_file failed");

    assert_eq!(file.syntax, Syntax::Proto2);
    assert_eq!(file.package, "example");
    assert_eq!(file.imports.len(), 1);
    assert!(file.imports[0].public);
    assert_eq!(file.imports[0].name, "shapes.proto");

    // enum Type
    let ty = &file.enums[0];
    assert_eq!(ty.full_name, "example.Type");
    assert_eq!(ty.documentation.as_ref().map(|d| d.text.as_str()), Some("How the corners look."));
    let values: Vec<_> = ty.values.iter().map(|v| (v.name.as_str(), v.number)).collect();
    assert_eq!(values, vec![("FLAT", 0), ("ROUND", 1), ("POINTED", 2)]);

    // message Color
    let color = &file.messages[0];
    assert_eq!(color.fields.len(), 4);
    assert_eq!(color.fields[0].label, Label::Required);
    assert_eq!(color.fields[3].default_value, Some(OptionValue::Int(255)));
    assert_eq!(color.fields[3].resolved_type, Some(FieldType::Scalar(ScalarType::Int32)));

    // message Example
    let example = &file.messages[1];
    assert_eq!(example.full_name, "example.Example");
    assert_eq!(example.fields[1].type_name, "Type");
    assert_eq!(example.fields[1].resolved_type, None);
    assert_eq!(example.fields[2].label, Label::Repeated);
    assert_eq!(example.oneofs[0].fields.len(), 2);
    assert_eq!(example.oneofs[0].fields[1].full_name, "example.Example.blob");
    assert!(example.reserved_numbers.contains(15));
    assert!(example.reserved_numbers.contains(MAX_FIELD_NUMBER));
    assert!(!example.reserved_numbers.contains(99));
    assert!(example.reserved_names.contains("legacy"));
    assert!(example.extension_ranges.contains(1500));
}

#[test]
fn test_parse_errors_carry_positions() {
    match parse_file("bad.proto", "message M {\n  optional int32 = 1;\n}") {
        Err(ProtoError::Syntax { file, line, .. }) => {
            assert_eq!(file, "bad.proto");
            assert_eq!(line, 2);
        }
        other => panic!("expected a syntax error, got {:?}", other),
    }
    assert!(matches!(
        parse_file("bad.proto", "message M { optional int32 x = 1; } `"),
        Err(ProtoError::Lexical { .. })
    ));
}

fn numbers_and_names() -> impl Strategy<Value = (BTreeSet<i32>, BTreeSet<String>)> {
    (
        prop::collection::btree_set(1..400i32, 0..40),
        prop::collection::btree_set("[a-z][a-z0-9_]{0,6}", 0..5),
    )
}

proptest! {
    /// Rendering a reserved set and parsing it back keeps every member.
    #[test]
    fn reserved_declarations_round_trip((numbers, names) in numbers_and_names(), open_tail in any::<bool>()) {
        let mut reserved: brine_proto_schema::ReservedNumbers = numbers.iter().copied().collect();
        if open_tail {
            reserved.insert_range(1000, MAX_FIELD_NUMBER);
        }
        let body = render_declarations(&reserved, &names, MAX_FIELD_NUMBER).join("\n");
        let text = format!("message M {{\n{}\n}}", body);

        let file = parse_file("r.proto", &text).unwrap();
        let parsed = &file.messages[0];
        for n in 0..1100 {
            prop_assert_eq!(parsed.reserved_numbers.contains(n), reserved.contains(n), "number {}", n);
        }
        prop_assert_eq!(parsed.reserved_numbers.contains(MAX_FIELD_NUMBER), open_tail);
        prop_assert_eq!(&parsed.reserved_names, &names);
    }
}
