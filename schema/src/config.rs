use crate::{
    annotation::{Annotation, Literal, Value, DEFAULT_ATTRIBUTE},
    descriptor::AnnotatedDescriptor,
    error::ConfigError,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// The built-in annotation carrying a message's or enum's numeric type id.
pub const TYPE_ID_ANNOTATION: &str = "TypeId";

/// Syntactic element an annotation may be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Message,
    Enum,
    EnumValue,
    Field,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElementKind::Message   => "message",
            ElementKind::Enum      => "enum",
            ElementKind::EnumValue => "enum value",
            ElementKind::Field     => "field",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Identifier,
    String,
    Character,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Annotation,
}

impl AttributeType {
    /// Converts a parsed value to this type, widening numbers where that is
    /// lossless enough (`int` to `long`, `float`, `double`). Returns `None` on a
    /// type mismatch.
    pub fn coerce(self, value: &Value) -> Option<Value> {
        use AttributeType as T;
        let lit = |l: Literal| Some(Value::Literal(l));
        match (self, value) {
            (T::Identifier, Value::Identifier(_))              => Some(value.clone()),
            (T::String, Value::Literal(Literal::String(_)))    => Some(value.clone()),
            (T::Character, Value::Literal(Literal::Char(_)))   => Some(value.clone()),
            (T::Boolean, Value::Literal(Literal::Bool(_)))     => Some(value.clone()),
            (T::Int, Value::Literal(Literal::Int(_)))          => Some(value.clone()),
            (T::Long, Value::Literal(Literal::Int(n)))         => lit(Literal::Long(*n as i64)),
            (T::Long, Value::Literal(Literal::Long(_)))        => Some(value.clone()),
            (T::Float, Value::Literal(Literal::Int(n)))        => lit(Literal::Float(*n as f32)),
            (T::Float, Value::Literal(Literal::Long(n)))       => lit(Literal::Float(*n as f32)),
            (T::Float, Value::Literal(Literal::Float(_)))      => Some(value.clone()),
            (T::Double, Value::Literal(Literal::Int(n)))       => lit(Literal::Double(*n as f64)),
            (T::Double, Value::Literal(Literal::Long(n)))      => lit(Literal::Double(*n as f64)),
            (T::Double, Value::Literal(Literal::Float(n)))     => lit(Literal::Double(*n as f64)),
            (T::Double, Value::Literal(Literal::Double(_)))    => Some(value.clone()),
            (T::Annotation, Value::Annotation(_))              => Some(value.clone()),
            _ => None,
        }
    }

    /// Only textual and annotation values can be restricted to a fixed set.
    pub fn supports_allowed_values(self) -> bool {
        matches!(
            self,
            AttributeType::Identifier | AttributeType::String | AttributeType::Annotation
        )
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttributeType::Identifier => "identifier",
            AttributeType::String     => "string",
            AttributeType::Character  => "character",
            AttributeType::Boolean    => "boolean",
            AttributeType::Int        => "int",
            AttributeType::Long       => "long",
            AttributeType::Float      => "float",
            AttributeType::Double     => "double",
            AttributeType::Annotation => "annotation",
        })
    }
}

/// Declares one attribute of a configured annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub name:           String,
    pub ty:             AttributeType,
    pub multiple:       bool,
    pub default:        Option<Value>,
    pub allowed_values: Option<BTreeSet<String>>,
}

impl AttributeSpec {
    pub fn new(name: impl Into<String>, ty: AttributeType) -> Self {
        AttributeSpec {
            name: name.into(),
            ty,
            multiple: false,
            default: None,
            allowed_values: None,
        }
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// An attribute without a default must be written out.
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }

    /// Coerces `value` to this attribute's type. A scalar given to a `multiple`
    /// attribute becomes a one-element array.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Array(items) if self.multiple => items
                .iter()
                .map(|v| self.ty.coerce(v))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Value::Array(_) => None,
            single if self.multiple => self.ty.coerce(single).map(|v| Value::Array(vec![v])),
            single => self.ty.coerce(single),
        }
    }

    /// Checks an already coerced value against `allowed_values`.
    pub fn is_allowed(&self, value: &Value) -> bool {
        let Some(allowed) = &self.allowed_values else {
            return true;
        };
        let check = |v: &Value| match v {
            Value::Annotation(a) => allowed.contains(&a.name),
            other => other.as_str().is_some_and(|s| allowed.contains(s)),
        };
        match value {
            Value::Array(items) => items.iter().all(check),
            single => check(single),
        }
    }
}

/// The result of a metadata creator, cached per descriptor and annotation name.
pub type ProcessedValue = Arc<dyn Any + Send + Sync>;

/// Turns an annotation on a descriptor into an application specific value.
pub trait MetadataCreator: Send + Sync {
    fn create(
        &self,
        owner: &dyn AnnotatedDescriptor,
        annotation: &Annotation,
    ) -> Result<ProcessedValue, String>;
}

impl<F> MetadataCreator for F
where
    F: Fn(&dyn AnnotatedDescriptor, &Annotation) -> Result<ProcessedValue, String> + Send + Sync,
{
    fn create(
        &self,
        owner: &dyn AnnotatedDescriptor,
        annotation: &Annotation,
    ) -> Result<ProcessedValue, String> {
        self(owner, annotation)
    }
}

/// Configuration of one annotation name.
#[derive(Clone)]
pub struct AnnotationConfig {
    name:                 String,
    targets:              Vec<ElementKind>,
    attributes:           Vec<AttributeSpec>,
    repeatable_container: Option<String>,
    metadata_creator:     Option<Arc<dyn MetadataCreator>>,
}

impl AnnotationConfig {
    pub fn new(name: impl Into<String>, targets: &[ElementKind]) -> Self {
        AnnotationConfig {
            name: name.into(),
            targets: targets.to_vec(),
            attributes: Vec::new(),
            repeatable_container: None,
            metadata_creator: None,
        }
    }

    pub fn attribute(mut self, spec: AttributeSpec) -> Self {
        self.attributes.push(spec);
        self
    }

    /// Allows the annotation to appear several times on one element. The
    /// occurrences are gathered into a `container` annotation.
    pub fn repeatable(mut self, container: impl Into<String>) -> Self {
        self.repeatable_container = Some(container.into());
        self
    }

    pub fn metadata_creator(mut self, creator: impl MetadataCreator + 'static) -> Self {
        self.metadata_creator = Some(Arc::new(creator));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn targets(&self) -> &[ElementKind] {
        &self.targets
    }

    pub fn allows(&self, kind: ElementKind) -> bool {
        self.targets.contains(&kind)
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn attribute_spec(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn repeatable_container(&self) -> Option<&str> {
        self.repeatable_container.as_deref()
    }

    pub fn creator(&self) -> Option<&Arc<dyn MetadataCreator>> {
        self.metadata_creator.as_ref()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets(self.name.clone()));
        }
        let mut seen = BTreeSet::new();
        for spec in &self.attributes {
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::DuplicateAttribute {
                    annotation: self.name.clone(),
                    attribute:  spec.name.clone(),
                });
            }
            if spec.allowed_values.is_some() && !spec.ty.supports_allowed_values() {
                return Err(ConfigError::AllowedValuesNotSupported {
                    annotation: self.name.clone(),
                    attribute:  spec.name.clone(),
                    ty:         spec.ty,
                });
            }
            if let Some(default) = &spec.default {
                let coerced = spec.coerce(default).ok_or_else(|| ConfigError::InvalidDefault {
                    annotation: self.name.clone(),
                    attribute:  spec.name.clone(),
                    expected:   spec.ty,
                })?;
                if !spec.is_allowed(&coerced) {
                    return Err(ConfigError::DefaultNotAllowed {
                        annotation: self.name.clone(),
                        attribute:  spec.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The synthetic configuration of a repeatable annotation's container.
    /// A metadata creator of the annotation runs once per collected entry.
    fn container_config(&self, container: &str) -> AnnotationConfig {
        let mut config = AnnotationConfig::new(container, &self.targets).attribute(
            AttributeSpec::new(DEFAULT_ATTRIBUTE, AttributeType::Annotation)
                .multiple()
                .allowed_values([self.name.clone()]),
        );
        if let Some(creator) = &self.metadata_creator {
            config.metadata_creator = Some(Arc::new(EachEntry(creator.clone())));
        }
        config
    }
}

/// Applies the creator of a repeatable annotation to every entry of its
/// container. The processed value is a `Vec<ProcessedValue>` in source order.
struct EachEntry(Arc<dyn MetadataCreator>);

impl MetadataCreator for EachEntry {
    fn create(
        &self,
        owner: &dyn AnnotatedDescriptor,
        annotation: &Annotation,
    ) -> Result<ProcessedValue, String> {
        let entries = match annotation.get(DEFAULT_ATTRIBUTE) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        };
        let values = entries
            .iter()
            .filter_map(|item| match item {
                Value::Annotation(entry) => Some(self.0.create(owner, entry)),
                _ => None,
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arc::new(values))
    }
}

impl fmt::Debug for AnnotationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationConfig")
            .field("name", &self.name)
            .field("targets", &self.targets)
            .field("attributes", &self.attributes)
            .field("repeatable_container", &self.repeatable_container)
            .field("metadata_creator", &self.metadata_creator.is_some())
            .finish()
    }
}

/// Log level used when a documentation comment carries an annotation that is
/// not configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

/// Frozen annotation configuration, shared read-only by every resolution
/// that uses it.
#[derive(Debug, Clone)]
pub struct Configuration {
    annotations:                    HashMap<String, Arc<AnnotationConfig>>,
    legacy_annotations:             bool,
    undefined_annotation_log_level: LogLevel,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    pub fn annotation(&self, name: &str) -> Option<&Arc<AnnotationConfig>> {
        self.annotations.get(name)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Arc<AnnotationConfig>> {
        self.annotations.values()
    }

    /// True when `name` may occur several times on one element.
    pub fn is_repeatable(&self, name: &str) -> bool {
        self.annotations
            .get(name)
            .is_some_and(|a| a.repeatable_container.is_some())
    }

    /// When set, annotations must start on an otherwise empty line.
    pub fn legacy_annotations(&self) -> bool {
        self.legacy_annotations
    }

    pub fn undefined_annotation_log_level(&self) -> LogLevel {
        self.undefined_annotation_log_level
    }

    fn builtin_annotations() -> Vec<AnnotationConfig> {
        vec![
            AnnotationConfig::new(TYPE_ID_ANNOTATION, &[ElementKind::Message, ElementKind::Enum])
                .attribute(AttributeSpec::new(DEFAULT_ATTRIBUTE, AttributeType::Int)),
        ]
    }
}

impl Default for Configuration {
    fn default() -> Self {
        let annotations = Self::builtin_annotations()
            .into_iter()
            .map(|a| (a.name.clone(), Arc::new(a)))
            .collect();
        Configuration {
            annotations,
            legacy_annotations: false,
            undefined_annotation_log_level: LogLevel::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    annotations:                    Vec<AnnotationConfig>,
    legacy_annotations:             bool,
    undefined_annotation_log_level: LogLevel,
}

impl ConfigurationBuilder {
    pub fn annotation(mut self, annotation: AnnotationConfig) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn legacy_annotations(mut self, legacy: bool) -> Self {
        self.legacy_annotations = legacy;
        self
    }

    pub fn undefined_annotation_log_level(mut self, level: LogLevel) -> Self {
        self.undefined_annotation_log_level = level;
        self
    }

    /// Validates every annotation and freezes the configuration. The built-in
    /// `@TypeId` is always present and may not be redefined.
    pub fn build(self) -> Result<Configuration, ConfigError> {
        let mut annotations: HashMap<String, Arc<AnnotationConfig>> = HashMap::new();

        let all = Configuration::builtin_annotations().into_iter().chain(self.annotations);
        for annotation in all {
            annotation.validate()?;
            if annotations.contains_key(&annotation.name) {
                return Err(ConfigError::DuplicateAnnotation(annotation.name));
            }
            annotations.insert(annotation.name.clone(), Arc::new(annotation));
        }

        // Containers are registered once every explicit name is known
        let containers: Vec<(String, AnnotationConfig)> = annotations
            .values()
            .filter_map(|a| {
                a.repeatable_container()
                    .map(|c| (a.name.clone(), a.container_config(c)))
            })
            .collect();
        for (owner, container) in containers {
            if annotations.contains_key(&container.name) {
                return Err(ConfigError::ContainerConflict {
                    annotation: owner,
                    container:  container.name,
                });
            }
            annotations.insert(container.name.clone(), Arc::new(container));
        }

        Ok(Configuration {
            annotations,
            legacy_annotations: self.legacy_annotations,
            undefined_annotation_log_level: self.undefined_annotation_log_level,
        })
    }
}

/// Serialisable form of a `Configuration`, without metadata creators.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigurationDef {
    pub legacy_annotations:             bool,
    pub undefined_annotation_log_level: LogLevel,
    pub annotations:                    Vec<AnnotationDef>,
}

#[derive(Debug, Deserialize)]
pub struct AnnotationDef {
    pub name:       String,
    pub targets:    Vec<ElementKind>,
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    #[serde(default)]
    pub repeatable: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttributeDef {
    pub name:           String,
    #[serde(rename = "type")]
    pub ty:             AttributeType,
    #[serde(default)]
    pub multiple:       bool,
    #[serde(default)]
    pub default:        Option<DefaultDef>,
    #[serde(default)]
    pub allowed_values: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DefaultDef {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<DefaultDef>),
}

impl DefaultDef {
    /// Maps a JSON default onto the annotation value shape expected by `ty`.
    fn to_value(&self, ty: AttributeType) -> Value {
        match self {
            DefaultDef::Bool(b) => Value::bool(*b),
            DefaultDef::Int(n) => match i32::try_from(*n) {
                Ok(small) => Value::int(small),
                Err(_) => Value::Literal(Literal::Long(*n)),
            },
            DefaultDef::Float(n) => Value::Literal(Literal::Double(*n)),
            DefaultDef::Text(s) => match ty {
                AttributeType::Identifier => Value::identifier(s.clone()),
                AttributeType::Character if s.chars().count() == 1 => {
                    Value::Literal(Literal::Char(s.chars().next().unwrap_or_default()))
                }
                _ => Value::string(s.clone()),
            },
            DefaultDef::List(items) => Value::Array(items.iter().map(|d| d.to_value(ty)).collect()),
        }
    }
}

impl ConfigurationDef {
    /// Turns the definition into a builder, so callers may still attach
    /// metadata creators before building.
    pub fn into_builder(self) -> ConfigurationBuilder {
        let mut builder = Configuration::builder()
            .legacy_annotations(self.legacy_annotations)
            .undefined_annotation_log_level(self.undefined_annotation_log_level);

        for def in self.annotations {
            let mut annotation = AnnotationConfig::new(def.name, &def.targets);
            for attr in def.attributes {
                let mut spec = AttributeSpec::new(attr.name, attr.ty);
                spec.multiple = attr.multiple;
                spec.default = attr.default.map(|d| {
                    let value = d.to_value(attr.ty);
                    // Doubles narrow to float only for float attributes
                    match (attr.ty, &value) {
                        (AttributeType::Float, Value::Literal(Literal::Double(n))) => {
                            Value::Literal(Literal::Float(*n as f32))
                        }
                        _ => value,
                    }
                });
                spec.allowed_values = attr.allowed_values.map(|v| v.into_iter().collect());
                annotation = annotation.attribute(spec);
            }
            if let Some(container) = def.repeatable {
                annotation = annotation.repeatable(container);
            }
            builder = builder.annotation(annotation);
        }
        builder
    }
}
