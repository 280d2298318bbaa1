use super::{check_simple_name, qualify, AnnotatedDescriptor, AnnotationSet, Documentation, Location, Options, Syntax};
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
pub struct EnumDescriptor {
    name:             String,
    full_name:        String,
    file:             String,
    containing_type:  Option<String>,
    values:           Vec<EnumValueDescriptor>,
    reserved_numbers: ReservedNumbers,
    reserved_names:   BTreeSet<String>,
    options:          Options,
    type_id:          Option<i32>,
    location:         Location,
    #[serde(flatten)]
    annotations:      AnnotationSet,
}

impl EnumDescriptor {
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn containing_type(&self) -> Option<&str> {
        self.containing_type.as_deref()
    }

    /// Values in declaration order.
    pub fn values(&self) -> &[EnumValueDescriptor] {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&EnumValueDescriptor> {
        self.values.iter().find(|v| v.name == name)
    }

    /// The first value declared with `number`.
    pub fn value_by_number(&self, number: i32) -> Option<&EnumValueDescriptor> {
        self.values.iter().find(|v| v.number == number)
    }

    pub fn reserved_numbers(&self) -> &ReservedNumbers {
        &self.reserved_numbers
    }

    pub fn reserved_names(&self) -> &BTreeSet<String> {
        &self.reserved_names
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn allows_alias(&self) -> bool {
        self.options.is_true("allow_alias")
    }

    pub fn type_id(&self) -> Option<i32> {
        self.type_id
    }

    pub fn location(&self) -> Location {
        self.location
    }
}

impl AnnotatedDescriptor for EnumDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Enum
    }

    fn annotation_set(&self) -> &AnnotationSet {
        &self.annotations
    }
}

#[derive(Debug, Serialize)]
pub struct EnumValueDescriptor {
    name:      String,
    full_name: String,
    number:    i32,
    options:   Options,
    location:  Location,
    #[serde(flatten)]
    annotations: AnnotationSet,
}

impl EnumValueDescriptor {
    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn location(&self) -> Location {
        self.location
    }
}

impl AnnotatedDescriptor for EnumValueDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn kind(&self) -> ElementKind {
        ElementKind::EnumValue
    }

    fn annotation_set(&self) -> &AnnotationSet {
        &self.annotations
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnumValueBuilder {
    pub name:          String,
    pub full_name:     String,
    pub number:        i32,
    pub options:       Options,
    pub documentation: Option<Documentation>,
    pub annotations:   Annotations,
    pub location:      Location,
}

impl EnumValueBuilder {
    pub fn new(name: impl Into<String>, number: i32, location: Location) -> Self {
        EnumValueBuilder {
            name: name.into(),
            number,
            location,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnumBuilder {
    pub name:             String,
    pub full_name:        String,
    pub values:           Vec<EnumValueBuilder>,
    pub reserved_numbers: ReservedNumbers,
    pub reserved_names:   BTreeSet<String>,
    pub options:          Options,
    pub type_id:          Option<i32>,
    pub documentation:    Option<Documentation>,
    pub annotations:      Annotations,
    pub location:         Location,
}

impl EnumBuilder {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        EnumBuilder {
            name: name.into(),
            location,
            ..Default::default()
        }
    }

    /// Enum values are scoped like the enum's siblings, so their full name
    /// uses the enum's parent scope and not the enum itself.
    pub fn assign_full_names(&mut self, scope: &str) {
        self.full_name = qualify(scope, &self.name);
        for value in &mut self.values {
            value.full_name = qualify(scope, &value.name);
        }
    }

    pub fn validate(&self, syntax: Syntax) -> Result<(), DescriptorError> {
        check_simple_name(&self.name, self.location)?;
        let Some(first) = self.values.first() else {
            return Err(DescriptorError::EmptyEnum {
                name: self.full_name.clone(),
            });
        };
        if syntax == Syntax::Proto3 && first.number != 0 {
            return Err(DescriptorError::Proto3FirstEnumValue {
                name: self.full_name.clone(),
            });
        }

        let allow_alias = self.options.is_true("allow_alias");
        let mut names: HashSet<&str> = HashSet::new();
        let mut numbers: HashMap<i32, &str> = HashMap::new();
        for value in &self.values {
            check_simple_name(&value.name, value.location)?;
            if !names.insert(&value.name) {
                return Err(DescriptorError::AlreadyDefined {
                    scope:    self.full_name.clone(),
                    name:     value.name.clone(),
                    location: value.location,
                });
            }
            if let Some(first) = numbers.get(&value.number) {
                if !allow_alias {
                    return Err(DescriptorError::DuplicateEnumValue {
                        scope:  self.full_name.clone(),
                        name:   value.name.clone(),
                        first:  first.to_string(),
                        number: value.number,
                    });
                }
            } else {
                numbers.insert(value.number, &value.name);
            }
            if self.reserved_numbers.contains(value.number) {
                return Err(DescriptorError::ReservedNumberConflict {
                    scope:   self.full_name.clone(),
                    element: value.name.clone(),
                    number:  value.number,
                });
            }
            if self.reserved_names.contains(&value.name) {
                return Err(DescriptorError::ReservedNameConflict {
                    scope:   self.full_name.clone(),
                    element: value.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn build(
        self,
        file: &str,
        containing_type: Option<&str>,
        config: Option<&Arc<Configuration>>,
    ) -> Result<EnumDescriptor, DescriptorError> {
        let values = self
            .values
            .into_iter()
            .map(|v| EnumValueDescriptor {
                name: v.name,
                full_name: v.full_name,
                number: v.number,
                options: v.options,
                location: v.location,
                annotations: AnnotationSet::new(
                    v.documentation.map(|d| d.text),
                    v.annotations,
                    config.cloned(),
                ),
            })
            .collect();

        Ok(EnumDescriptor {
            name: self.name,
            full_name: self.full_name,
            file: file.to_string(),
            containing_type: containing_type.map(str::to_string),
            values,
            reserved_numbers: self.reserved_numbers,
            reserved_names: self.reserved_names,
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
    use crate::descriptor::OptionValue;

    fn colors(numbers: &[(&str, i32)]) -> EnumBuilder {
        let mut e = EnumBuilder::new("Color", Location::default());
        for (name, number) in numbers {
            e.values.push(EnumValueBuilder::new(*name, *number, Location::default()));
        }
        e.assign_full_names("pkg");
        e
    }

    #[test]
    fn test_value_names_use_parent_scope() {
        let e = colors(&[("RED", 0)]);
        assert_eq!(e.full_name, "pkg.Color");
        assert_eq!(e.values[0].full_name, "pkg.RED");
    }

    #[test]
    fn test_qualified_value_name_rejected() {
        let e = colors(&[("RED", 0), ("x.BLUE", 1)]);
        assert!(matches!(
            e.validate(Syntax::Proto2),
            Err(DescriptorError::QualifiedDefinitionName { ref name, .. }) if name == "x.BLUE"
        ));
    }

    #[test]
    fn test_aliases_need_option() {
        let mut e = colors(&[("RED", 1), ("CRIMSON", 1)]);
        assert!(matches!(
            e.validate(Syntax::Proto2),
            Err(DescriptorError::DuplicateEnumValue { number: 1, .. })
        ));
        e.options.insert("allow_alias", OptionValue::Bool(true));
        assert!(e.validate(Syntax::Proto2).is_ok());
    }

    #[test]
    fn test_negative_values_and_reservations() {
        let mut e = colors(&[("NEG", -7), ("POS", 3)]);
        assert!(e.validate(Syntax::Proto2).is_ok());
        e.reserved_numbers.insert_range(i32::MIN, -1);
        assert!(matches!(
            e.validate(Syntax::Proto2),
            Err(DescriptorError::ReservedNumberConflict { number: -7, .. })
        ));
    }

    #[test]
    fn test_proto3_first_value_zero() {
        let e = colors(&[("RED", 1)]);
        assert!(matches!(
            e.validate(Syntax::Proto3),
            Err(DescriptorError::Proto3FirstEnumValue { .. })
        ));
        assert!(matches!(
            colors(&[]).validate(Syntax::Proto2),
            Err(DescriptorError::EmptyEnum { .. })
        ));
    }
}
