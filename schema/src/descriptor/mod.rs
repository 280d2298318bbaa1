//! The descriptor tree.
//!
//! Every entity has a mutable builder, filled in by the parser and the
//! resolver, and an immutable descriptor produced by `build()`. Descriptors
//! own their children through `Arc`; references to other types (a field's
//! message type, an extension's extendee) are kept as fully qualified names and
//! looked up in the resolved schema's type registry.

mod enums;
mod field;
mod file;
mod message;

pub use enums::*;
pub use field::*;
pub use file::*;
pub use message::*;

use crate::{
    annotation::Annotations,
    config::{Configuration, ElementKind, ProcessedValue},
    error::DescriptorError,
};
use parking_lot::Mutex;
use serde::{ser::SerializeStruct, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 1-based position of a definition in its source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    pub line:   usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Location { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Text of the comment block preceding a definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Documentation {
    pub text: String,
    /// Source line of the first line of `text`.
    pub line: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Syntax {
    #[default]
    Proto2,
    Proto3,
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        })
    }
}

/// Constant on the right hand side of an `option`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Identifier(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b)       => write!(f, "{}", b),
            OptionValue::Int(n)        => write!(f, "{}", n),
            OptionValue::Float(n)      => write!(f, "{}", n),
            OptionValue::String(s)     => write!(f, "{:?}", s),
            OptionValue::Identifier(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionEntry {
    pub name:  String,
    pub value: OptionValue,
}

/// Options in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Options(Vec<OptionEntry>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: OptionValue) {
        self.0.push(OptionEntry {
            name: name.into(),
            value,
        });
    }

    /// The last value given for `name`.
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.0.iter().rev().find(|o| o.name == name).map(|o| &o.value)
    }

    pub fn is_true(&self, name: &str) -> bool {
        matches!(self.get(name), Some(OptionValue::Bool(true)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionEntry> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A descriptor that can carry documentation annotations.
pub trait AnnotatedDescriptor: Send + Sync {
    fn name(&self) -> &str;

    fn full_name(&self) -> &str;

    fn kind(&self) -> ElementKind;

    fn annotation_set(&self) -> &AnnotationSet;

    fn documentation(&self) -> Option<&str> {
        self.annotation_set().documentation()
    }

    fn annotations(&self) -> &Annotations {
        self.annotation_set().annotations()
    }

    /// The value produced by the metadata creator configured for `name`,
    /// computed on first access and cached. `None` when the annotation is
    /// absent, undefined, or has no creator.
    fn processed_annotation(&self, name: &str) -> Result<Option<ProcessedValue>, DescriptorError>
    where
        Self: Sized,
    {
        self.annotation_set().processed(self, name)
    }
}

/// Documentation, validated annotations and the lazily filled cache of
/// processed annotation values of one descriptor.
#[derive(Default)]
pub struct AnnotationSet {
    documentation: Option<String>,
    annotations:   Annotations,
    config:        Option<Arc<Configuration>>,
    processed:     Mutex<HashMap<String, ProcessedValue>>,
}

impl AnnotationSet {
    pub fn new(
        documentation: Option<String>,
        annotations: Annotations,
        config: Option<Arc<Configuration>>,
    ) -> Self {
        AnnotationSet {
            documentation,
            annotations,
            config,
            processed: Mutex::new(HashMap::new()),
        }
    }

    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Runs (or reuses) the metadata creator for `name` with `owner` as the
    /// annotated element.
    pub fn processed(
        &self,
        owner: &dyn AnnotatedDescriptor,
        name: &str,
    ) -> Result<Option<ProcessedValue>, DescriptorError> {
        if let Some(value) = self.processed.lock().get(name) {
            return Ok(Some(value.clone()));
        }
        let Some(annotation) = self.annotations.get(name) else {
            return Ok(None);
        };
        let Some(creator) = self
            .config
            .as_ref()
            .and_then(|c| c.annotation(name))
            .and_then(|a| a.creator())
        else {
            return Ok(None);
        };

        // The lock is not held while the creator runs, it may look at other
        // annotations of the same owner.
        let value = creator
            .create(owner, annotation)
            .map_err(|message| DescriptorError::MetadataCreation {
                element:    owner.full_name().to_string(),
                annotation: name.to_string(),
                message,
            })?;
        let mut cache = self.processed.lock();
        Ok(Some(cache.entry(name.to_string()).or_insert(value).clone()))
    }
}

impl fmt::Debug for AnnotationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationSet")
            .field("documentation", &self.documentation)
            .field("annotations", &self.annotations)
            .finish()
    }
}

impl Serialize for AnnotationSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AnnotationSet", 2)?;
        state.serialize_field("documentation", &self.documentation)?;
        state.serialize_field("annotations", &self.annotations)?;
        state.end()
    }
}

/// A named message or enum, as found in the type registry.
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    Message(Arc<MessageDescriptor>),
    Enum(Arc<EnumDescriptor>),
}

impl TypeDescriptor {
    pub fn full_name(&self) -> &str {
        match self {
            TypeDescriptor::Message(m) => m.full_name(),
            TypeDescriptor::Enum(e) => e.full_name(),
        }
    }

    pub fn type_id(&self) -> Option<i32> {
        match self {
            TypeDescriptor::Message(m) => m.type_id(),
            TypeDescriptor::Enum(e) => e.type_id(),
        }
    }

    pub fn file(&self) -> &str {
        match self {
            TypeDescriptor::Message(m) => m.file(),
            TypeDescriptor::Enum(e) => e.file(),
        }
    }
}

/// Definition names are simple; the scope they are declared in qualifies them.
pub(crate) fn check_simple_name(name: &str, location: Location) -> Result<(), DescriptorError> {
    if name.contains('.') {
        return Err(DescriptorError::QualifiedDefinitionName {
            name: name.to_string(),
            location,
        });
    }
    Ok(())
}

/// Joins a scope and a simple name with a dot, skipping an empty scope.
pub fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}
