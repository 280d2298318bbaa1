use super::{AnnotatedDescriptor, AnnotationSet, Documentation, Location, OptionValue, Options, Syntax};
use crate::{
    annotation::Annotations,
    config::{Configuration, ElementKind},
    error::DescriptorError,
    wire::{make_tag, WireType},
    FIRST_IMPLEMENTATION_RESERVED, LAST_IMPLEMENTATION_RESERVED, MAX_FIELD_NUMBER,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    #[default]
    Optional,
    Required,
    Repeated,
    /// Member of a `oneof`.
    OneOf,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Label::Optional => "optional",
            Label::Required => "required",
            Label::Repeated => "repeated",
            Label::OneOf    => "oneof",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Fixed32,
    Fixed64,
    SFixed32,
    SFixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    pub const ALL: [ScalarType; 15] = [
        ScalarType::Double,
        ScalarType::Float,
        ScalarType::Int32,
        ScalarType::Int64,
        ScalarType::UInt32,
        ScalarType::UInt64,
        ScalarType::SInt32,
        ScalarType::SInt64,
        ScalarType::Fixed32,
        ScalarType::Fixed64,
        ScalarType::SFixed32,
        ScalarType::SFixed64,
        ScalarType::Bool,
        ScalarType::String,
        ScalarType::Bytes,
    ];

    pub fn from_name(name: &str) -> Option<ScalarType> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Double   => "double",
            ScalarType::Float    => "float",
            ScalarType::Int32    => "int32",
            ScalarType::Int64    => "int64",
            ScalarType::UInt32   => "uint32",
            ScalarType::UInt64   => "uint64",
            ScalarType::SInt32   => "sint32",
            ScalarType::SInt64   => "sint64",
            ScalarType::Fixed32  => "fixed32",
            ScalarType::Fixed64  => "fixed64",
            ScalarType::SFixed32 => "sfixed32",
            ScalarType::SFixed64 => "sfixed64",
            ScalarType::Bool     => "bool",
            ScalarType::String   => "string",
            ScalarType::Bytes    => "bytes",
        }
    }

    pub fn wire_type(self) -> WireType {
        match self {
            ScalarType::Double | ScalarType::Fixed64 | ScalarType::SFixed64 => WireType::Fixed64,
            ScalarType::Float | ScalarType::Fixed32 | ScalarType::SFixed32 => WireType::Fixed32,
            ScalarType::String | ScalarType::Bytes => WireType::LengthDelimited,
            _ => WireType::Varint,
        }
    }

    pub fn is_integral(self) -> bool {
        !matches!(
            self,
            ScalarType::Double | ScalarType::Float | ScalarType::Bool | ScalarType::String | ScalarType::Bytes
        )
    }
}

/// The resolved type of a field. Named types are referenced by full name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum FieldType {
    Scalar(ScalarType),
    Message(String),
    Enum(String),
}

impl FieldType {
    /// The scalar keyword or the referenced type's full name.
    pub fn type_name(&self) -> &str {
        match self {
            FieldType::Scalar(s) => s.name(),
            FieldType::Message(name) | FieldType::Enum(name) => name,
        }
    }

    pub fn wire_type(&self) -> WireType {
        match self {
            FieldType::Scalar(s) => s.wire_type(),
            FieldType::Message(_) => WireType::LengthDelimited,
            FieldType::Enum(_) => WireType::Varint,
        }
    }

    /// Repeated values of this type may use the packed encoding.
    pub fn is_packable(&self) -> bool {
        self.wire_type() != WireType::LengthDelimited
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[derive(Debug, Serialize)]
pub struct FieldDescriptor {
    name:            String,
    full_name:       String,
    number:          i32,
    label:           Label,
    field_type:      FieldType,
    declared_type:   String,
    default_value:   Option<OptionValue>,
    options:         Options,
    containing_type: String,
    oneof:           Option<String>,
    #[serde(skip)]
    syntax:          Syntax,
    location:        Location,
    #[serde(flatten)]
    annotations:     AnnotationSet,
}

impl FieldDescriptor {
    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// The type name exactly as written in the source.
    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    pub fn default_value(&self) -> Option<&OptionValue> {
        self.default_value.as_ref()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Full name of the message owning the field, or of the extendee for
    /// extension fields.
    pub fn containing_type(&self) -> &str {
        &self.containing_type
    }

    /// Name of the enclosing `oneof`, if any.
    pub fn oneof(&self) -> Option<&str> {
        self.oneof.as_deref()
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    /// Repeated scalars are packed when `[packed = true]` is given, or by
    /// default in proto3.
    pub fn is_packed(&self) -> bool {
        if !self.is_repeated() || !self.field_type.is_packable() {
            return false;
        }
        match self.options.get("packed") {
            Some(OptionValue::Bool(packed)) => *packed,
            _ => self.syntax == Syntax::Proto3,
        }
    }

    pub fn is_deprecated(&self) -> bool {
        self.options.is_true("deprecated")
    }

    pub fn wire_type(&self) -> WireType {
        if self.is_packed() {
            WireType::LengthDelimited
        } else {
            self.field_type.wire_type()
        }
    }

    pub fn tag(&self) -> u32 {
        make_tag(self.number, self.wire_type())
    }
}

impl AnnotatedDescriptor for FieldDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Field
    }

    fn annotation_set(&self) -> &AnnotationSet {
        &self.annotations
    }
}

/// A field under construction. `resolved_type` is filled in by the parser for
/// scalars and by the resolver for named types.
#[derive(Debug, Clone, Default)]
pub struct FieldBuilder {
    pub name:          String,
    pub full_name:     String,
    pub number:        i32,
    pub label:         Label,
    pub type_name:     String,
    pub resolved_type: Option<FieldType>,
    pub default_value: Option<OptionValue>,
    pub options:       Options,
    pub documentation: Option<Documentation>,
    pub annotations:   Annotations,
    pub location:      Location,
}

impl FieldBuilder {
    pub fn new(
        name: impl Into<String>,
        number: i32,
        label: Label,
        type_name: impl Into<String>,
        location: Location,
    ) -> Self {
        let type_name = type_name.into();
        let resolved_type = ScalarType::from_name(&type_name).map(FieldType::Scalar);
        FieldBuilder {
            name: name.into(),
            number,
            label,
            type_name,
            resolved_type,
            location,
            ..Default::default()
        }
    }

    /// Checks the number against the legal range and the implementation block.
    pub fn validate_number(&self) -> Result<(), DescriptorError> {
        let field = self.qualified_name();
        if !(1..=MAX_FIELD_NUMBER).contains(&self.number) {
            return Err(DescriptorError::FieldNumberOutOfRange {
                field,
                number: self.number,
                max: MAX_FIELD_NUMBER,
            });
        }
        if (FIRST_IMPLEMENTATION_RESERVED..=LAST_IMPLEMENTATION_RESERVED).contains(&self.number) {
            return Err(DescriptorError::ImplementationReservedNumber {
                field,
                number: self.number,
            });
        }
        Ok(())
    }

    /// Checks the proto3 restrictions on labels and defaults.
    pub fn validate_syntax(&self, syntax: Syntax) -> Result<(), DescriptorError> {
        if syntax != Syntax::Proto3 {
            return Ok(());
        }
        if self.label == Label::Required {
            return Err(DescriptorError::Proto3Required {
                field: self.qualified_name(),
            });
        }
        if self.default_value.is_some() {
            return Err(DescriptorError::Proto3Default {
                field: self.qualified_name(),
            });
        }
        Ok(())
    }

    fn qualified_name(&self) -> String {
        if self.full_name.is_empty() {
            self.name.clone()
        } else {
            self.full_name.clone()
        }
    }

    pub fn build(
        self,
        containing_type: &str,
        oneof: Option<&str>,
        syntax: Syntax,
        config: Option<&Arc<Configuration>>,
    ) -> Result<FieldDescriptor, DescriptorError> {
        let field_type = self.resolved_type.ok_or_else(|| DescriptorError::UnresolvedType {
            element: self.full_name.clone(),
        })?;
        Ok(FieldDescriptor {
            name: self.name,
            full_name: self.full_name,
            number: self.number,
            label: self.label,
            field_type,
            declared_type: self.type_name,
            default_value: self.default_value,
            options: self.options,
            containing_type: containing_type.to_string(),
            oneof: oneof.map(str::to_string),
            syntax,
            location: self.location,
            annotations: AnnotationSet::new(
                self.documentation.map(|d| d.text),
                self.annotations,
                config.cloned(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(builder: FieldBuilder, syntax: Syntax) -> FieldDescriptor {
        builder.build("test.M", None, syntax, None).unwrap()
    }

    #[test]
    fn test_scalar_types_resolve_at_construction() {
        let f = FieldBuilder::new("id", 1, Label::Optional, "int64", Location::default());
        assert_eq!(f.resolved_type, Some(FieldType::Scalar(ScalarType::Int64)));
        let f = FieldBuilder::new("m", 2, Label::Optional, "Other", Location::default());
        assert_eq!(f.resolved_type, None);
        assert!(matches!(
            f.build("test.M", None, Syntax::Proto2, None),
            Err(DescriptorError::UnresolvedType { .. })
        ));
    }

    #[test]
    fn test_number_bounds() {
        let ok = FieldBuilder::new("a", MAX_FIELD_NUMBER, Label::Optional, "bool", Location::default());
        assert!(ok.validate_number().is_ok());
        let zero = FieldBuilder::new("a", 0, Label::Optional, "bool", Location::default());
        assert!(matches!(
            zero.validate_number(),
            Err(DescriptorError::FieldNumberOutOfRange { .. })
        ));
        let internal = FieldBuilder::new("a", 19_500, Label::Optional, "bool", Location::default());
        assert!(matches!(
            internal.validate_number(),
            Err(DescriptorError::ImplementationReservedNumber { number: 19_500, .. })
        ));
    }

    #[test]
    fn test_packed_encoding() {
        let mut repeated = FieldBuilder::new("xs", 4, Label::Repeated, "int32", Location::default());
        let proto3 = built(repeated.clone(), Syntax::Proto3);
        assert!(proto3.is_packed());
        assert_eq!(proto3.wire_type(), WireType::LengthDelimited);
        assert_eq!(proto3.tag(), (4 << 3) | 2);

        let proto2 = built(repeated.clone(), Syntax::Proto2);
        assert!(!proto2.is_packed());
        assert_eq!(proto2.tag(), 4 << 3);

        repeated.options.insert("packed", OptionValue::Bool(true));
        assert!(built(repeated, Syntax::Proto2).is_packed());

        let strings = FieldBuilder::new("ss", 5, Label::Repeated, "string", Location::default());
        assert!(!built(strings, Syntax::Proto3).is_packed());
    }

    #[test]
    fn test_proto3_restrictions() {
        let required = FieldBuilder::new("r", 1, Label::Required, "int32", Location::default());
        assert!(required.validate_syntax(Syntax::Proto2).is_ok());
        assert!(matches!(
            required.validate_syntax(Syntax::Proto3),
            Err(DescriptorError::Proto3Required { .. })
        ));
        let mut defaulted = FieldBuilder::new("d", 2, Label::Optional, "int32", Location::default());
        defaulted.default_value = Some(OptionValue::Int(5));
        assert!(matches!(
            defaulted.validate_syntax(Syntax::Proto3),
            Err(DescriptorError::Proto3Default { .. })
        ));
    }
}
