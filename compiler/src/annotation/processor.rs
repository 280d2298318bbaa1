use super::{lexer::AnnotationLexer, parser::AnnotationParser};
use crate::error::AnnotationError;
use brine_proto_schema::{
    Annotation, AnnotationConfig, Annotations, Attribute, Configuration, Documentation, ElementKind,
    LogLevel, Value, DEFAULT_ATTRIBUTE,
};
use tracing::{debug, error, info, trace, warn};

/// Applies a `Configuration` to the annotations of documented elements.
pub struct AnnotationProcessor<'a> {
    config: &'a Configuration,
}

impl<'a> AnnotationProcessor<'a> {
    pub fn new(config: &'a Configuration) -> Self {
        AnnotationProcessor { config }
    }

    /// Parses the annotations of `documentation`, honouring the legacy
    /// placement rule and the repeatable annotations of the configuration.
    pub fn parse(&self, documentation: &Documentation) -> Result<Vec<Annotation>, AnnotationError> {
        let first_line = u32::try_from(documentation.line).unwrap_or(u32::MAX);
        let lexer = AnnotationLexer::new(&documentation.text, first_line, self.config.legacy_annotations());
        let is_repeatable = |name: &str| self.config.is_repeatable(name);
        AnnotationParser::new(lexer, &is_repeatable).parse_all()
    }

    /// Parses and validates the annotations of one element.
    pub fn read(
        &self,
        element: &str,
        kind: ElementKind,
        documentation: Option<&Documentation>,
    ) -> Result<Annotations, AnnotationError> {
        match documentation {
            Some(doc) => self.process(element, kind, self.parse(doc)?),
            None => Ok(Annotations::new()),
        }
    }

    /// Validates parsed annotations for an element of kind `kind`: targets,
    /// attribute types, required attributes and allowed values. Defaults are
    /// filled in and repeated annotations are gathered into their container.
    /// Undefined annotations are kept as written.
    pub fn process(
        &self,
        element: &str,
        kind: ElementKind,
        parsed: Vec<Annotation>,
    ) -> Result<Annotations, AnnotationError> {
        let mut out = Annotations::new();
        for annotation in parsed {
            let Some(config) = self.config.annotation(&annotation.name) else {
                log_undefined(self.config.undefined_annotation_log_level(), element, &annotation.name);
                out.insert(annotation);
                continue;
            };
            if !config.allows(kind) {
                return Err(AnnotationError::TargetMismatch {
                    annotation: annotation.name,
                    element: element.to_string(),
                    kind,
                    pos: annotation.pos,
                });
            }

            let validated = self.validate(annotation, config)?;
            match config.repeatable_container() {
                Some(container) => add_to_container(&mut out, container, validated),
                None => out.insert(validated),
            }
        }
        Ok(out)
    }

    fn validate(&self, annotation: Annotation, config: &AnnotationConfig) -> Result<Annotation, AnnotationError> {
        let mut out = Annotation::new(annotation.name, annotation.pos);
        for attribute in annotation.attributes {
            let spec = config
                .attribute_spec(&attribute.name)
                .ok_or_else(|| AnnotationError::UnknownAttribute {
                    annotation: out.name.clone(),
                    attribute:  attribute.name.clone(),
                    pos:        attribute.pos,
                })?;
            let value = self.validate_nested(attribute.value)?;
            let coerced = spec.coerce(&value).ok_or_else(|| AnnotationError::TypeMismatch {
                annotation: out.name.clone(),
                attribute:  attribute.name.clone(),
                expected:   spec.ty,
                found:      value.kind_name().to_string(),
                pos:        attribute.pos,
            })?;
            if !spec.is_allowed(&coerced) {
                return Err(AnnotationError::DisallowedValue {
                    annotation: out.name.clone(),
                    attribute:  attribute.name,
                    value:      coerced.to_string(),
                    pos:        attribute.pos,
                });
            }
            out.attributes.push(Attribute {
                name:  attribute.name,
                pos:   attribute.pos,
                value: coerced,
            });
        }

        for spec in config.attributes() {
            if out.attribute(&spec.name).is_some() {
                continue;
            }
            let Some(default) = &spec.default else {
                return Err(AnnotationError::MissingRequiredAttribute {
                    annotation: out.name.clone(),
                    attribute:  spec.name.clone(),
                    pos:        out.pos,
                });
            };
            let value = spec.coerce(default).unwrap_or_else(|| default.clone());
            let pos = out.pos;
            out.attributes.push(Attribute {
                name: spec.name.clone(),
                pos,
                value,
            });
        }
        Ok(out)
    }

    /// Nested annotations that are configured get the same validation as top
    /// level ones, without the target check.
    fn validate_nested(&self, value: Value) -> Result<Value, AnnotationError> {
        match value {
            Value::Annotation(nested) => match self.config.annotation(&nested.name) {
                Some(config) => Ok(Value::Annotation(Box::new(self.validate(*nested, config)?))),
                None => Ok(Value::Annotation(nested)),
            },
            Value::Array(items) => items
                .into_iter()
                .map(|v| self.validate_nested(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other),
        }
    }
}

fn add_to_container(out: &mut Annotations, container: &str, annotation: Annotation) {
    let pos = annotation.pos;
    let item = Value::Annotation(Box::new(annotation));
    if let Some(existing) = out.get_mut(container) {
        if let Some(Attribute {
            value: Value::Array(items),
            ..
        }) = existing.attributes.iter_mut().find(|a| a.name == DEFAULT_ATTRIBUTE)
        {
            items.push(item);
            return;
        }
        existing.set(DEFAULT_ATTRIBUTE, pos, Value::Array(vec![item]));
        return;
    }
    let mut wrapper = Annotation::new(container, pos);
    wrapper.set(DEFAULT_ATTRIBUTE, pos, Value::Array(vec![item]));
    out.insert(wrapper);
}

fn log_undefined(level: LogLevel, element: &str, name: &str) {
    match level {
        LogLevel::Off => {}
        LogLevel::Error => error!(element, annotation = name, "undefined annotation"),
        LogLevel::Warn => warn!(element, annotation = name, "undefined annotation"),
        LogLevel::Info => info!(element, annotation = name, "undefined annotation"),
        LogLevel::Debug => debug!(element, annotation = name, "undefined annotation"),
        LogLevel::Trace => trace!(element, annotation = name, "undefined annotation"),
    }
}
