use brine_proto_compiler::{compile, compile_with_callback, AnnotationError, ProtoError, ResolvedSchema};
use brine_proto_schema::{
    AnnotatedDescriptor, Annotation, AnnotationConfig, AttributeSpec, AttributeType, Configuration,
    DescriptorError, ElementKind, FieldType, FileDescriptor, ProcessedValue, TypeDescriptor, Value,
};
use std::collections::HashSet;
use std::sync::Arc;

fn compile_files(files: &[(&str, &str)]) -> Result<ResolvedSchema, ProtoError> {
    compile(files.iter().copied(), Arc::new(Configuration::default()))
}

#[test]
fn test_cyclic_import_names_both_files() {
    let err = compile_files(&[
        ("f1.proto", "import \"f2.proto\";\nmessage A {}"),
        ("f2.proto", "import \"f1.proto\";\nmessage B {}"),
    ])
    .unwrap_err();
    match err {
        ProtoError::CyclicImport { from, to } => {
            let named: HashSet<_> = [from.as_str(), to.as_str()].into_iter().collect();
            assert_eq!(named, HashSet::from(["f1.proto", "f2.proto"]));
        }
        other => panic!("expected a cyclic import, got {other}"),
    }
}

#[test]
fn test_cyclic_import_is_fatal_with_callback() {
    let mut calls = 0;
    let mut callback = |_: &str, _: Result<&FileDescriptor, &ProtoError>| calls += 1;
    let result = compile_with_callback(
        [
            ("f1.proto", "import \"f2.proto\";"),
            ("f2.proto", "import \"f1.proto\";"),
        ],
        Arc::new(Configuration::default()),
        &mut callback,
    );
    assert!(matches!(result, Err(ProtoError::CyclicImport { .. })));
    assert_eq!(calls, 0);
}

const F3: &str = "package p3;\nmessage M { optional int32 x = 1; }";

#[test]
fn test_public_imports_are_transitive() {
    let schema = compile_files(&[
        ("f1.proto", "import public \"f2.proto\";"),
        ("f2.proto", "import public \"f3.proto\";"),
        ("f3.proto", F3),
        (
            "f4.proto",
            "package p4;\nimport \"f1.proto\";\nmessage User { optional p3.M m = 1; }",
        ),
    ])
    .unwrap();

    let user = schema.find_message("p4.User").unwrap();
    let field = user.field("m").unwrap();
    assert_eq!(field.field_type(), &FieldType::Message("p3.M".to_string()));
    assert!(matches!(schema.field_type(field), Some(TypeDescriptor::Message(m)) if m.file() == "f3.proto"));

    let order: Vec<_> = schema.files().map(|f| f.name().to_string()).collect();
    let position = |name: &str| order.iter().position(|n| n == name).unwrap();
    assert!(position("f3.proto") < position("f2.proto"));
    assert!(position("f1.proto") < position("f4.proto"));
}

#[test]
fn test_package_name_is_still_required() {
    let err = compile_files(&[
        ("f1.proto", "import public \"f3.proto\";"),
        ("f3.proto", F3),
        ("f4.proto", "package p4;\nimport \"f1.proto\";\nmessage User { optional M m = 1; }"),
    ])
    .unwrap_err();
    assert!(matches!(err, ProtoError::FieldTypeNotFound { ref type_name, .. } if type_name == "M"));
}

#[test]
fn test_private_imports_are_not_reexported() {
    let err = compile_files(&[
        ("f1.proto", "import public \"f2.proto\";"),
        ("f2.proto", "import \"f3.proto\";"),
        ("f3.proto", F3),
        ("f4.proto", "import \"f1.proto\";\nmessage User { optional p3.M m = 1; }"),
    ])
    .unwrap_err();
    match err {
        ProtoError::FieldTypeNotFound { file, element, .. } => {
            assert_eq!(file, "f4.proto");
            assert_eq!(element, "User.m");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_reserved_conflicts() {
    let number = compile_files(&[(
        "a.proto",
        "message M {\n  reserved 5;\n  reserved \"x\";\n  optional int32 y = 5;\n}",
    )])
    .unwrap_err();
    assert!(matches!(
        number,
        ProtoError::Descriptor {
            source: DescriptorError::ReservedNumberConflict { number: 5, .. },
            ..
        }
    ));

    let name = compile_files(&[(
        "a.proto",
        "message M {\n  reserved 5;\n  reserved \"x\";\n  optional int32 x = 6;\n}",
    )])
    .unwrap_err();
    assert!(matches!(
        name,
        ProtoError::Descriptor {
            source: DescriptorError::ReservedNameConflict { .. },
            ..
        }
    ));
}

#[test]
fn test_scoped_lookup() {
    let schema = compile_files(&[(
        "shop.proto",
        r#"
        package shop;
        message Order {
          message Line { optional string sku = 1; }
          enum State { OPEN = 0; CLOSED = 1; }
          repeated Line lines = 1;
          optional State state = 2 [default = CLOSED];
          optional .shop.Customer customer = 3;
        }
        message Customer {
          optional Order.Line favourite = 1;
        }
        "#,
    )])
    .unwrap();
    let order = schema.find_message("shop.Order").unwrap();
    assert_eq!(
        order.field("lines").unwrap().field_type(),
        &FieldType::Message("shop.Order.Line".into())
    );
    assert_eq!(
        order.field("state").unwrap().field_type(),
        &FieldType::Enum("shop.Order.State".into())
    );
    assert_eq!(
        order.field("customer").unwrap().field_type(),
        &FieldType::Message("shop.Customer".into())
    );
    let customer = schema.find_message("shop.Customer").unwrap();
    assert_eq!(
        customer.field("favourite").unwrap().field_type(),
        &FieldType::Message("shop.Order.Line".into())
    );
    assert!(schema.find_enum("shop.Order.State").is_some());
}

#[test]
fn test_duplicate_definitions() {
    let across = compile_files(&[
        ("a.proto", "package p;\nmessage M {}"),
        ("b.proto", "package p;\nmessage M {}"),
    ])
    .unwrap_err();
    match across {
        ProtoError::DuplicateDefinition {
            name,
            first_file,
            second_file,
            ..
        } => {
            assert_eq!(name, "p.M");
            assert_eq!(first_file, "a.proto");
            assert_eq!(second_file, "b.proto");
        }
        other => panic!("unexpected error: {other}"),
    }

    let in_file = compile_files(&[("a.proto", "message M {}\nenum M { A = 0; }")]).unwrap_err();
    assert!(matches!(
        in_file,
        ProtoError::Descriptor {
            source: DescriptorError::AlreadyDefined { .. },
            ..
        }
    ));

    let in_message = compile_files(&[("a.proto", "message M { message N {} enum N { A = 0; } }")]).unwrap_err();
    assert!(matches!(
        in_message,
        ProtoError::Descriptor {
            source: DescriptorError::AlreadyDefined { .. },
            ..
        }
    ));
}

#[test]
fn test_qualified_definition_name_is_rejected() {
    for source in ["message a.b.C {}", "message M { optional int32 a.b = 1; }"] {
        let err = compile_files(&[("a.proto", source)]).unwrap_err();
        assert!(
            matches!(
                err,
                ProtoError::Descriptor {
                    source: DescriptorError::QualifiedDefinitionName { .. },
                    ..
                }
            ),
            "{source}: {err}"
        );
    }
}

#[test]
fn test_type_ids() {
    let schema = compile_files(&[(
        "a.proto",
        "package p;\n/** @TypeId(7) */\nmessage A {}\n// @TypeId(8)\nenum E { X = 0; }",
    )])
    .unwrap();
    assert_eq!(schema.find_message("p.A").unwrap().type_id(), Some(7));
    assert_eq!(schema.find_enum("p.E").unwrap().type_id(), Some(8));
    assert_eq!(schema.type_by_id(8).map(TypeDescriptor::full_name), Some("p.E"));

    let duplicate = compile_files(&[
        ("a.proto", "package p;\n/** @TypeId(7) */\nmessage A {}"),
        ("b.proto", "package q;\n/** @TypeId(7) */\nmessage B {}"),
    ])
    .unwrap_err();
    match duplicate {
        ProtoError::DuplicateTypeId { type_id, first, second } => {
            assert_eq!(type_id, 7);
            assert_eq!(first, "p.A");
            assert_eq!(second, "q.B");
        }
        other => panic!("unexpected error: {other}"),
    }

    let negative = compile_files(&[("a.proto", "/** @TypeId(-1) */\nmessage A {}")]).unwrap_err();
    assert!(matches!(negative, ProtoError::InvalidTypeId { .. }));

    let on_field = compile_files(&[("a.proto", "message A {\n  // @TypeId(1)\n  optional int32 x = 1;\n}")])
        .unwrap_err();
    assert!(matches!(on_field, ProtoError::Annotation { ref element, .. } if element == "A.x"));
}

#[test]
fn test_defaults_are_type_checked() {
    let bad = [
        "message M { optional int32 x = 1 [default = \"s\"]; }",
        "message M { optional uint32 x = 1 [default = -1]; }",
        "message M { repeated int32 x = 1 [default = 1]; }",
        "enum E { A = 0; }\nmessage M { optional E e = 1 [default = B]; }",
        "message N {}\nmessage M { optional N n = 1 [default = 1]; }",
    ];
    for text in bad {
        let err = compile_files(&[("a.proto", text)]).unwrap_err();
        assert!(matches!(err, ProtoError::InvalidDefault { .. }), "{text}: {err}");
    }
    assert!(compile_files(&[(
        "a.proto",
        "enum E { A = 0; B = 1; }\nmessage M { optional E e = 1 [default = B]; optional double d = 2 [default = -inf]; }",
    )])
    .is_ok());
}

#[test]
fn test_extensions() {
    let base = "package p;\nmessage Base {\n  optional int32 id = 1;\n  extensions 100 to 199;\n}";
    let schema = compile_files(&[
        ("base.proto", base),
        ("ext.proto", "package q;\nimport \"base.proto\";\nextend p.Base { optional string note = 100; }"),
    ])
    .unwrap();
    let ext = &schema.file("ext.proto").unwrap().extends()[0];
    assert_eq!(ext.extendee(), "p.Base");
    assert_eq!(ext.fields()[0].full_name(), "q.note");

    let outside = compile_files(&[
        ("base.proto", base),
        ("ext.proto", "import \"base.proto\";\nextend p.Base { optional string note = 5; }"),
    ])
    .unwrap_err();
    assert!(matches!(outside, ProtoError::InvalidExtension { .. }));

    let clash = compile_files(&[
        ("base.proto", base),
        ("e1.proto", "import \"base.proto\";\nextend p.Base { optional string a = 150; }"),
        ("e2.proto", "import \"base.proto\";\nextend p.Base { optional string b = 150; }"),
    ])
    .unwrap_err();
    assert!(matches!(clash, ProtoError::InvalidExtension { ref msg, .. } if msg.contains("already used")));
}

#[test]
fn test_import_errors() {
    let missing = compile_files(&[("a.proto", "import \"nope.proto\";")]).unwrap_err();
    assert!(matches!(missing, ProtoError::MissingImport { ref import, .. } if import == "nope.proto"));

    let twice = compile_files(&[
        ("a.proto", "import \"b.proto\";\nimport \"b.proto\";"),
        ("b.proto", ""),
    ])
    .unwrap_err();
    assert!(matches!(twice, ProtoError::DuplicateImport { .. }));
}

#[test]
fn test_callback_collects_file_errors() {
    let mut failures = Vec::new();
    let mut callback = |file: &str, result: Result<&FileDescriptor, &ProtoError>| {
        if let Err(err) = result {
            failures.push((file.to_string(), err.to_string()));
        }
    };
    let schema = compile_with_callback(
        [
            ("broken.proto", "message {"),
            ("user.proto", "import \"broken.proto\";\nmessage U {}"),
            ("fine.proto", "message F { optional int32 x = 1; }"),
        ],
        Arc::new(Configuration::default()),
        &mut callback,
    )
    .unwrap();

    assert_eq!(failures.len(), 2);
    let broken = schema.file("broken.proto").unwrap();
    assert!(broken.is_failed());
    assert!(broken.messages().is_empty());
    let user = schema.file("user.proto").unwrap();
    assert!(user.error().unwrap().to_string().contains("failed to compile"));
    assert!(!schema.file("fine.proto").unwrap().is_failed());
    assert_eq!(schema.failed_files().count(), 2);
    assert!(schema.find_message("F").is_some());
}

#[test]
fn test_annotations_and_metadata() {
    let config = Configuration::builder()
        .annotation(
            AnnotationConfig::new("Index", &[ElementKind::Field])
                .attribute(AttributeSpec::new("name", AttributeType::String))
                .attribute(AttributeSpec::new("unique", AttributeType::Boolean).default_value(Value::bool(false)))
                .metadata_creator(
                    |owner: &dyn AnnotatedDescriptor, annotation: &Annotation| -> Result<ProcessedValue, String> {
                        let name = annotation.get("name").and_then(|v| v.as_str()).unwrap_or_default();
                        Ok(Arc::new(format!("{}:{}", owner.full_name(), name)))
                    },
                ),
        )
        .build()
        .unwrap();
    let schema = compile(
        [(
            "a.proto",
            "package p;\n/**\n * A customer.\n * @Unknown(1)\n */\nmessage C {\n  /** Lookup key. @Index(name = \"by_email\") */\n  optional string email = 1;\n}",
        )],
        Arc::new(config),
    )
    .unwrap();

    let customer = schema.find_message("p.C").unwrap();
    assert!(customer.documentation().unwrap().starts_with("A customer."));
    assert!(customer.annotations().get("Unknown").is_some());
    assert!(customer.processed_annotation("Unknown").unwrap().is_none());

    let email = customer.field("email").unwrap();
    let index = email.annotations().get("Index").unwrap();
    assert_eq!(index.get("unique").and_then(|v| v.as_bool()), Some(false));
    let processed = email.processed_annotation("Index").unwrap().unwrap();
    assert_eq!(processed.downcast_ref::<String>().map(String::as_str), Some("p.C.email:by_email"));
}

fn index_config() -> Arc<Configuration> {
    let config = Configuration::builder()
        .annotation(
            AnnotationConfig::new("Index", &[ElementKind::Field])
                .attribute(AttributeSpec::new("name", AttributeType::String))
                .metadata_creator(
                    |owner: &dyn AnnotatedDescriptor, annotation: &Annotation| -> Result<ProcessedValue, String> {
                        let name = annotation.get("name").and_then(|v| v.as_str()).unwrap_or_default();
                        Ok(Arc::new(format!("{}:{}", owner.full_name(), name)))
                    },
                ),
        )
        .build()
        .unwrap();
    Arc::new(config)
}

#[test]
fn test_resolution_is_idempotent() {
    let files = vec![
        (
            "a.proto",
            "package a;\nimport \"b.proto\";\n/** @TypeId(1) */\nmessage A {\n  /** @Index(name = \"by_b\") */\n  optional b.B b = 1;\n  repeated string s = 2;\n}",
        ),
        ("b.proto", "package b;\nmessage B { enum K { X = 0; } optional K k = 1; }"),
    ];
    let first = compile(files.clone(), index_config()).unwrap();
    let second = compile(files, index_config()).unwrap();

    let summary = |schema: &ResolvedSchema| {
        let mut out: Vec<String> = schema
            .types()
            .map(|t| match t {
                TypeDescriptor::Message(m) => format!(
                    "{} {:?} {:?}",
                    m.full_name(),
                    m.type_id(),
                    m.all_fields()
                        .map(|f| (f.name(), f.number(), f.annotations().names().collect::<Vec<_>>()))
                        .collect::<Vec<_>>()
                ),
                TypeDescriptor::Enum(e) => format!(
                    "{} {:?}",
                    e.full_name(),
                    e.values().iter().map(|v| v.number()).collect::<Vec<_>>()
                ),
            })
            .collect();
        out.sort();
        out
    };
    assert_eq!(summary(&first), summary(&second));
    assert_eq!(summary(&first).len(), 3);

    let processed = |schema: &ResolvedSchema| {
        let field = schema.find_message("a.A").unwrap().field("b").unwrap();
        let value = field.processed_annotation("Index").unwrap().unwrap();
        value.downcast_ref::<String>().cloned()
    };
    assert_eq!(processed(&first), Some("a.A.b:by_b".to_string()));
    assert_eq!(processed(&first), processed(&second));
}

#[test]
fn test_repeatable_annotation_creator_runs_per_entry() {
    let config = Configuration::builder()
        .annotation(
            AnnotationConfig::new("Label", &[ElementKind::Message])
                .attribute(AttributeSpec::new("value", AttributeType::String))
                .repeatable("Labels")
                .metadata_creator(
                    |_: &dyn AnnotatedDescriptor, annotation: &Annotation| -> Result<ProcessedValue, String> {
                        let text = annotation.get("value").and_then(|v| v.as_str()).unwrap_or_default();
                        Ok(Arc::new(text.to_uppercase()))
                    },
                ),
        )
        .build()
        .unwrap();
    let schema = compile(
        [("a.proto", "/**\n * @Label(\"billing\")\n * @Label(\"audit\")\n */\nmessage M {}")],
        Arc::new(config),
    )
    .unwrap();

    let m = schema.find_message("M").unwrap();
    assert!(m.processed_annotation("Label").unwrap().is_none());
    let processed = m.processed_annotation("Labels").unwrap().unwrap();
    let labels: Vec<&str> = processed
        .downcast_ref::<Vec<ProcessedValue>>()
        .unwrap()
        .iter()
        .map(|v| v.downcast_ref::<String>().unwrap().as_str())
        .collect();
    assert_eq!(labels, vec!["BILLING", "AUDIT"]);
}

#[test]
fn test_duplicate_file_name_aborts_batch() {
    let mut calls = 0;
    let mut callback = |_: &str, _: Result<&FileDescriptor, &ProtoError>| calls += 1;
    let result = compile_with_callback(
        [("a.proto", "message A {}"), ("a.proto", "message B {}")],
        Arc::new(Configuration::default()),
        &mut callback,
    );
    assert!(matches!(result, Err(ProtoError::DuplicateFile { ref file }) if file == "a.proto"));
    assert_eq!(calls, 0);
}

#[test]
fn test_legacy_annotations_must_start_a_line() {
    let legacy = Arc::new(Configuration::builder().legacy_annotations(true).build().unwrap());
    let schema = compile(
        [("a.proto", "/**\n * An order.\n * @TypeId(4)\n */\nmessage Order {}")],
        legacy.clone(),
    )
    .unwrap();
    assert_eq!(schema.find_message("Order").unwrap().type_id(), Some(4));

    let inline = "/** An order. @TypeId(4) */\nmessage Order {}";
    match compile([("a.proto", inline)], legacy).unwrap_err() {
        ProtoError::Annotation {
            element,
            source: AnnotationError::Syntax { msg, .. },
            ..
        } => {
            assert_eq!(element, "Order");
            assert_eq!(msg, "annotations must start on an empty line");
        }
        other => panic!("expected an annotation syntax error, got {other}"),
    }

    let schema = compile([("a.proto", inline)], Arc::new(Configuration::default())).unwrap();
    assert_eq!(schema.find_message("Order").unwrap().type_id(), Some(4));
}

#[test]
fn test_resolved_invariants() {
    let schema = compile_files(&[
        (
            "a.proto",
            "package a;\n/** @TypeId(1) */\nmessage A {\n  reserved 3 to 5, 9;\n  reserved \"old\";\n  optional int32 x = 1;\n  oneof pick { string s = 2; int64 n = 6; }\n}",
        ),
        ("b.proto", "package b;\n// @TypeId(2)\nmessage B { optional int32 y = 1; }\n// @TypeId(3)\nenum E { Z = 0; }"),
    ])
    .unwrap();

    let mut ids = HashSet::new();
    for t in schema.types() {
        if let Some(id) = t.type_id() {
            assert!(ids.insert(id), "type id {id} used twice");
        }
        if let TypeDescriptor::Message(m) = t {
            let mut numbers = HashSet::new();
            for field in m.all_fields() {
                assert!(numbers.insert(field.number()));
                assert!(!m.reserved_numbers().contains(field.number()));
                assert!(!m.reserved_names().contains(field.name()));
            }
        }
    }
    assert_eq!(ids.len(), 3);
}
