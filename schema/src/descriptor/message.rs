use super::{
    check_simple_name, qualify, AnnotatedDescriptor, AnnotationSet, Documentation, EnumBuilder, EnumDescriptor,
    FieldBuilder, FieldDescriptor, Location, Options, Syntax,
};
use crate::{
    annotation::Annotations,
    config::{Configuration, ElementKind},
    error::DescriptorError,
    reserved::ReservedNumbers,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct MessageDescriptor {
    name:             String,
    full_name:        String,
    file:             String,
    containing_type:  Option<String>,
    fields:           Vec<FieldDescriptor>,
    oneofs:           Vec<OneOfDescriptor>,
    messages:         Vec<Arc<MessageDescriptor>>,
    enums:            Vec<Arc<EnumDescriptor>>,
    extends:          Vec<ExtendDescriptor>,
    reserved_numbers: ReservedNumbers,
    reserved_names:   BTreeSet<String>,
    extension_ranges: ReservedNumbers,
    options:          Options,
    type_id:          Option<i32>,
    location:         Location,
    #[serde(flatten)]
    annotations:      AnnotationSet,
}

impl MessageDescriptor {
    /// Name of the file declaring this message.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Full name of the enclosing message, for nested messages.
    pub fn containing_type(&self) -> Option<&str> {
        self.containing_type.as_deref()
    }

    /// Fields declared directly in the message body, `oneof` members excluded.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Direct fields followed by every `oneof` member.
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .chain(self.oneofs.iter().flat_map(|o| o.fields.iter()))
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.all_fields().find(|f| f.name() == name)
    }

    pub fn field_by_number(&self, number: i32) -> Option<&FieldDescriptor> {
        self.all_fields().find(|f| f.number() == number)
    }

    pub fn oneofs(&self) -> &[OneOfDescriptor] {
        &self.oneofs
    }

    pub fn messages(&self) -> &[Arc<MessageDescriptor>] {
        &self.messages
    }

    pub fn enums(&self) -> &[Arc<EnumDescriptor>] {
        &self.enums
    }

    pub fn extends(&self) -> &[ExtendDescriptor] {
        &self.extends
    }

    pub fn reserved_numbers(&self) -> &ReservedNumbers {
        &self.reserved_numbers
    }

    pub fn reserved_names(&self) -> &BTreeSet<String> {
        &self.reserved_names
    }

    pub fn extension_ranges(&self) -> &ReservedNumbers {
        &self.extension_ranges
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn type_id(&self) -> Option<i32> {
        self.type_id
    }

    pub fn location(&self) -> Location {
        self.location
    }
}

impl AnnotatedDescriptor for MessageDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Message
    }

    fn annotation_set(&self) -> &AnnotationSet {
        &self.annotations
    }
}

#[derive(Debug, Serialize)]
pub struct OneOfDescriptor {
    name:            String,
    full_name:       String,
    containing_type: String,
    fields:          Vec<FieldDescriptor>,
    options:         Options,
}

impl OneOfDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn containing_type(&self) -> &str {
        &self.containing_type
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

/// An `extend` block. `extendee` is the resolved full name of the extended
/// message and `scope` the message or package the block was declared in.
#[derive(Debug, Serialize)]
pub struct ExtendDescriptor {
    extendee: String,
    scope:    String,
    fields:   Vec<FieldDescriptor>,
    location: Location,
}

impl ExtendDescriptor {
    pub fn extendee(&self) -> &str {
        &self.extendee
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn location(&self) -> Location {
        self.location
    }
}

#[derive(Debug, Clone, Default)]
pub struct OneOfBuilder {
    pub name:      String,
    pub full_name: String,
    pub fields:    Vec<FieldBuilder>,
    pub options:   Options,
    pub location:  Location,
}

impl OneOfBuilder {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        OneOfBuilder {
            name: name.into(),
            location,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtendBuilder {
    /// The extendee as written in the source.
    pub extendee:          String,
    pub resolved_extendee: Option<String>,
    pub fields:            Vec<FieldBuilder>,
    pub location:          Location,
}

impl ExtendBuilder {
    pub fn new(extendee: impl Into<String>, location: Location) -> Self {
        ExtendBuilder {
            extendee: extendee.into(),
            location,
            ..Default::default()
        }
    }

    fn assign_full_names(&mut self, scope: &str) {
        for field in &mut self.fields {
            field.full_name = qualify(scope, &field.name);
        }
    }

    fn build(
        self,
        scope: &str,
        syntax: Syntax,
        config: Option<&Arc<Configuration>>,
    ) -> Result<ExtendDescriptor, DescriptorError> {
        let extendee = self.resolved_extendee.ok_or_else(|| DescriptorError::UnresolvedType {
            element: self.extendee.clone(),
        })?;
        let fields = self
            .fields
            .into_iter()
            .map(|f| f.build(&extendee, None, syntax, config))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExtendDescriptor {
            extendee,
            scope: scope.to_string(),
            fields,
            location: self.location,
        })
    }
}

/// Builds `extend` blocks declared at `scope`.
pub(crate) fn build_extends(
    extends: Vec<ExtendBuilder>,
    scope: &str,
    syntax: Syntax,
    config: Option<&Arc<Configuration>>,
) -> Result<Vec<ExtendDescriptor>, DescriptorError> {
    extends
        .into_iter()
        .map(|e| e.build(scope, syntax, config))
        .collect()
}

pub(crate) fn assign_extend_names(extends: &mut [ExtendBuilder], scope: &str) {
    for extend in extends {
        extend.assign_full_names(scope);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    pub name:             String,
    pub full_name:        String,
    pub fields:           Vec<FieldBuilder>,
    pub oneofs:           Vec<OneOfBuilder>,
    pub messages:         Vec<MessageBuilder>,
    pub enums:            Vec<EnumBuilder>,
    pub extends:          Vec<ExtendBuilder>,
    pub reserved_numbers: ReservedNumbers,
    pub reserved_names:   BTreeSet<String>,
    pub extension_ranges: ReservedNumbers,
    pub options:          Options,
    pub type_id:          Option<i32>,
    pub documentation:    Option<Documentation>,
    pub annotations:      Annotations,
    pub location:         Location,
}

impl MessageBuilder {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        MessageBuilder {
            name: name.into(),
            location,
            ..Default::default()
        }
    }

    /// Direct fields followed by every `oneof` member.
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldBuilder> {
        self.fields
            .iter()
            .chain(self.oneofs.iter().flat_map(|o| o.fields.iter()))
    }

    pub fn all_fields_mut(&mut self) -> impl Iterator<Item = &mut FieldBuilder> {
        self.fields
            .iter_mut()
            .chain(self.oneofs.iter_mut().flat_map(|o| o.fields.iter_mut()))
    }

    /// Computes the full names of this message and everything inside it.
    pub fn assign_full_names(&mut self, scope: &str) {
        self.full_name = qualify(scope, &self.name);
        let me = self.full_name.clone();
        for field in &mut self.fields {
            field.full_name = qualify(&me, &field.name);
        }
        for oneof in &mut self.oneofs {
            oneof.full_name = qualify(&me, &oneof.name);
            for field in &mut oneof.fields {
                field.full_name = qualify(&me, &field.name);
            }
        }
        for message in &mut self.messages {
            message.assign_full_names(&me);
        }
        for e in &mut self.enums {
            e.assign_full_names(&me);
        }
        assign_extend_names(&mut self.extends, &me);
    }

    /// Checks the invariants that only depend on this message: names and
    /// numbers are unique, nothing collides with a reservation, and proto3
    /// rules hold. Recurses into nested types.
    pub fn validate(&self, syntax: Syntax) -> Result<(), DescriptorError> {
        check_simple_name(&self.name, self.location)?;

        let scope = &self.full_name;
        let mut names: HashSet<String> = HashSet::new();
        let mut claim = |name: &str, location: Location| -> Result<(), DescriptorError> {
            check_simple_name(name, location)?;
            if names.insert(name.to_string()) {
                Ok(())
            } else {
                Err(DescriptorError::AlreadyDefined {
                    scope: scope.clone(),
                    name: name.to_string(),
                    location,
                })
            }
        };

        let mut numbers: HashMap<i32, &str> = HashMap::new();
        for field in self.all_fields() {
            claim(&field.name, field.location)?;
            field.validate_number()?;
            field.validate_syntax(syntax)?;

            if let Some(first) = numbers.insert(field.number, &field.name) {
                return Err(DescriptorError::DuplicateFieldNumber {
                    scope:  scope.clone(),
                    number: field.number,
                    first:  first.to_string(),
                    second: field.name.clone(),
                });
            }
            if self.reserved_numbers.contains(field.number) {
                return Err(DescriptorError::ReservedNumberConflict {
                    scope:   scope.clone(),
                    element: field.full_name.clone(),
                    number:  field.number,
                });
            }
            if self.reserved_names.contains(&field.name) {
                return Err(DescriptorError::ReservedNameConflict {
                    scope:   scope.clone(),
                    element: field.full_name.clone(),
                });
            }
            if self.extension_ranges.contains(field.number) {
                let (from, to) = self
                    .extension_ranges
                    .ranges()
                    .find(|&(s, e)| s <= field.number && field.number <= e)
                    .unwrap_or((field.number, field.number));
                return Err(DescriptorError::ExtensionRangeOverlap {
                    scope: scope.clone(),
                    from,
                    to,
                    what: format!("field \"{}\"", field.name),
                });
            }
        }

        for oneof in &self.oneofs {
            claim(&oneof.name, oneof.location)?;
        }
        for message in &self.messages {
            claim(&message.name, message.location)?;
        }
        for e in &self.enums {
            claim(&e.name, e.location)?;
        }

        for (from, to) in self.extension_ranges.ranges() {
            if let Some(number) = self.reserved_numbers.first_in_range(from, to) {
                return Err(DescriptorError::ExtensionRangeOverlap {
                    scope: scope.clone(),
                    from,
                    to,
                    what: format!("reserved number {}", number),
                });
            }
        }

        for extend in &self.extends {
            for field in &extend.fields {
                check_simple_name(&field.name, field.location)?;
                field.validate_number()?;
                field.validate_syntax(syntax)?;
            }
        }

        for message in &self.messages {
            message.validate(syntax)?;
        }
        for e in &self.enums {
            e.validate(syntax)?;
        }
        Ok(())
    }

    /// Freezes the message. Every field type must have been resolved.
    pub fn build(
        self,
        file: &str,
        containing_type: Option<&str>,
        syntax: Syntax,
        config: Option<&Arc<Configuration>>,
    ) -> Result<MessageDescriptor, DescriptorError> {
        let full_name = self.full_name;

        let fields = self
            .fields
            .into_iter()
            .map(|f| f.build(&full_name, None, syntax, config))
            .collect::<Result<Vec<_>, _>>()?;

        let oneofs = self
            .oneofs
            .into_iter()
            .map(|o| {
                let fields = o
                    .fields
                    .into_iter()
                    .map(|f| f.build(&full_name, Some(&o.name), syntax, config))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(OneOfDescriptor {
                    name: o.name,
                    full_name: o.full_name,
                    containing_type: full_name.clone(),
                    fields,
                    options: o.options,
                })
            })
            .collect::<Result<Vec<_>, DescriptorError>>()?;

        let messages = self
            .messages
            .into_iter()
            .map(|m| m.build(file, Some(&full_name), syntax, config).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        let enums = self
            .enums
            .into_iter()
            .map(|e| e.build(file, Some(&full_name), config).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        let extends = build_extends(self.extends, &full_name, syntax, config)?;

        Ok(MessageDescriptor {
            name: self.name,
            full_name,
            file: file.to_string(),
            containing_type: containing_type.map(str::to_string),
            fields,
            oneofs,
            messages,
            enums,
            extends,
            reserved_numbers: self.reserved_numbers,
            reserved_names: self.reserved_names,
            extension_ranges: self.extension_ranges,
            options: self.options,
            type_id: self.type_id,
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
    use crate::descriptor::Label;

    fn field(name: &str, number: i32) -> FieldBuilder {
        FieldBuilder::new(name, number, Label::Optional, "int32", Location::default())
    }

    fn message(fields: Vec<FieldBuilder>) -> MessageBuilder {
        let mut m = MessageBuilder::new("M", Location::default());
        m.fields = fields;
        m.assign_full_names("pkg");
        m
    }

    #[test]
    fn test_full_names() {
        let mut outer = message(vec![field("a", 1)]);
        outer.messages.push(MessageBuilder::new("Inner", Location::default()));
        outer.assign_full_names("pkg");
        assert_eq!(outer.full_name, "pkg.M");
        assert_eq!(outer.fields[0].full_name, "pkg.M.a");
        assert_eq!(outer.messages[0].full_name, "pkg.M.Inner");
    }

    #[test]
    fn test_duplicate_number_across_oneof() {
        let mut m = message(vec![field("a", 1)]);
        let mut oneof = OneOfBuilder::new("choice", Location::default());
        let mut b = field("b", 1);
        b.label = Label::OneOf;
        oneof.fields.push(b);
        m.oneofs.push(oneof);
        assert_eq!(
            m.validate(Syntax::Proto2),
            Err(DescriptorError::DuplicateFieldNumber {
                scope:  "pkg.M".to_string(),
                number: 1,
                first:  "a".to_string(),
                second: "b".to_string(),
            })
        );
    }

    #[test]
    fn test_reserved_conflicts() {
        let mut m = message(vec![field("a", 5)]);
        m.reserved_numbers.insert(5);
        assert!(matches!(
            m.validate(Syntax::Proto2),
            Err(DescriptorError::ReservedNumberConflict { number: 5, .. })
        ));

        let mut m = message(vec![field("x", 1)]);
        m.reserved_names.insert("x".to_string());
        assert!(matches!(
            m.validate(Syntax::Proto2),
            Err(DescriptorError::ReservedNameConflict { .. })
        ));
    }

    #[test]
    fn test_name_clash_between_field_and_nested_type() {
        let mut m = message(vec![field("Inner", 1)]);
        m.messages.push(MessageBuilder::new("Inner", Location::new(3, 5)));
        assert!(matches!(
            m.validate(Syntax::Proto2),
            Err(DescriptorError::AlreadyDefined { ref name, .. }) if name == "Inner"
        ));
    }

    #[test]
    fn test_qualified_name_rejected() {
        let m = MessageBuilder::new("a.b.C", Location::new(1, 9));
        assert!(matches!(
            m.validate(Syntax::Proto2),
            Err(DescriptorError::QualifiedDefinitionName { .. })
        ));
    }

    #[test]
    fn test_qualified_member_names_rejected() {
        let m = message(vec![field("a.b", 1)]);
        assert!(matches!(
            m.validate(Syntax::Proto2),
            Err(DescriptorError::QualifiedDefinitionName { ref name, .. }) if name == "a.b"
        ));

        let mut m = message(vec![field("a", 1)]);
        m.oneofs.push(OneOfBuilder::new("x.choice", Location::default()));
        assert!(matches!(
            m.validate(Syntax::Proto2),
            Err(DescriptorError::QualifiedDefinitionName { ref name, .. }) if name == "x.choice"
        ));
    }

    #[test]
    fn test_extension_range_overlap() {
        let mut m = message(vec![field("a", 150)]);
        m.extension_ranges.insert_range(100, 200);
        assert!(matches!(
            m.validate(Syntax::Proto2),
            Err(DescriptorError::ExtensionRangeOverlap { from: 100, to: 200, .. })
        ));
    }

    #[test]
    fn test_build_links_owner() {
        let mut m = message(vec![field("a", 1)]);
        m.messages.push(MessageBuilder::new("Inner", Location::default()));
        m.assign_full_names("pkg");
        let built = m.build("a.proto", None, Syntax::Proto2, None).unwrap();
        assert_eq!(built.file(), "a.proto");
        assert_eq!(built.field("a").unwrap().containing_type(), "pkg.M");
        assert_eq!(built.messages()[0].containing_type(), Some("pkg.M"));
    }
}
