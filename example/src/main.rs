// example/src/main.rs

use std::sync::Arc;

use brine_proto::schema::{
    AnnotationConfig, AttributeSpec, AttributeType, ConfigurationDef, ElementKind, ProcessedValue,
};
use brine_proto::*;
use serde::Serialize;

const ANNOTATIONS: &str = include_str!("../schema/annotations.json");
const COMMON: &str = include_str!("../schema/common.proto");
const SHOP_V1: &str = include_str!("../schema/shop_v1.proto");
const SHOP_V2: &str = include_str!("../schema/shop_v2.proto");

/// What an `@Index` annotation turns into once processed.
#[derive(Debug, Serialize)]
struct IndexSpec {
    table:  String,
    column: String,
    name:   String,
    unique: bool,
}

fn index_spec(owner: &dyn AnnotatedDescriptor, annotation: &Annotation) -> Result<ProcessedValue, String> {
    let (table, column) = owner
        .full_name()
        .rsplit_once('.')
        .ok_or_else(|| format!("{} is not a field", owner.full_name()))?;
    Ok(Arc::new(IndexSpec {
        table:  table.to_string(),
        column: column.to_string(),
        name:   annotation.get("name").and_then(Value::as_str).unwrap_or(column).to_string(),
        unique: annotation.get("unique").and_then(Value::as_bool).unwrap_or(false),
    }))
}

fn main() -> Result<(), ProtoError> {
    // The JSON file carries the plain annotations, `@Index` comes with a creator
    let def: ConfigurationDef = serde_json::from_str(ANNOTATIONS)?;
    let config = def
        .into_builder()
        .annotation(
            AnnotationConfig::new("Index", &[ElementKind::Field])
                .attribute(AttributeSpec::new("name", AttributeType::String))
                .attribute(AttributeSpec::new("unique", AttributeType::Boolean).default_value(Value::bool(false)))
                .metadata_creator(index_spec),
        )
        .build()?;
    let config = Arc::new(config);

    let v1 = compile([("common.proto", COMMON), ("shop.proto", SHOP_V1)], config.clone())?;
    let order = v1
        .find_message("shop.Order")
        .ok_or_else(|| ProtoError::FieldTypeNotFound {
            file:      "shop.proto".to_string(),
            element:   "example".to_string(),
            type_name: "shop.Order".to_string(),
        })?;

    println!("{} (type id {:?})", order.full_name(), order.type_id());
    println!("  doc: {}", order.documentation().unwrap_or_default());
    if let Some(labels) = order.annotations().get("Labels") {
        println!("  {}", labels);
    }

    for field in order.all_fields() {
        println!("  {} = {} : {}", field.name(), field.number(), field.field_type());
        let processed = field
            .processed_annotation("Index")
            .map_err(|source| ProtoError::Descriptor {
                file: "shop.proto".to_string(),
                source,
            })?;
        if let Some(spec) = processed.as_ref().and_then(|p| p.downcast_ref::<IndexSpec>()) {
            println!("    index: {}", serde_json::to_string(spec)?);
        }
    }

    // Check the next version of the schema against this one
    let v2 = compile([("common.proto", COMMON), ("shop.proto", SHOP_V2)], config)?;
    let violations = CompatibilityChecker::new(true).check_schemas_strings(&v1, &v2);
    println!("\n{} compatibility violation(s):", violations.len());
    for violation in violations {
        println!("  {}", violation);
    }

    Ok(())
}
