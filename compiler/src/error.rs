use brine_proto_schema::{AttributeType, ConfigError, DescriptorError, ElementKind, Location, Pos};
use thiserror::Error;

/// Errors raised while reading or validating the annotations of one
/// documentation comment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnnotationError {
    #[error("Lexical error at {pos}: {msg}")]
    Lexical { msg: String, pos: Pos },

    #[error("Syntax error at {pos}: {msg}")]
    Syntax { msg: String, pos: Pos },

    #[error("Annotation @{annotation} at {pos} is not allowed on {kind} \"{element}\"")]
    TargetMismatch {
        annotation: String,
        element:    String,
        kind:       ElementKind,
        pos:        Pos,
    },

    #[error("Annotation @{annotation} at {pos} is missing required attribute \"{attribute}\"")]
    MissingRequiredAttribute {
        annotation: String,
        attribute:  String,
        pos:        Pos,
    },

    #[error("Annotation @{annotation} has no attribute \"{attribute}\" ({pos})")]
    UnknownAttribute {
        annotation: String,
        attribute:  String,
        pos:        Pos,
    },

    #[error("Attribute \"{attribute}\" of @{annotation} at {pos} expects {expected} but found {found}")]
    TypeMismatch {
        annotation: String,
        attribute:  String,
        expected:   AttributeType,
        found:      String,
        pos:        Pos,
    },

    #[error("Value {value} is not allowed for attribute \"{attribute}\" of @{annotation} at {pos}")]
    DisallowedValue {
        annotation: String,
        attribute:  String,
        value:      String,
        pos:        Pos,
    },
}

impl AnnotationError {
    pub fn pos(&self) -> Pos {
        match self {
            AnnotationError::Lexical { pos, .. }
            | AnnotationError::Syntax { pos, .. }
            | AnnotationError::TargetMismatch { pos, .. }
            | AnnotationError::MissingRequiredAttribute { pos, .. }
            | AnnotationError::UnknownAttribute { pos, .. }
            | AnnotationError::TypeMismatch { pos, .. }
            | AnnotationError::DisallowedValue { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("{file}: Lexical error at line {line}, column {column}: {msg}")]
    Lexical {
        file:   String,
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("{file}: Parse error at line {line}, column {column}: {msg}")]
    Syntax {
        file:   String,
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("{file}: Invalid annotation on \"{element}\": {source}")]
    Annotation {
        file:    String,
        element: String,
        source:  AnnotationError,
    },

    #[error("{file}: {source}")]
    Descriptor {
        file:   String,
        source: DescriptorError,
    },

    #[error("File \"{file}\" appears more than once in the batch")]
    DuplicateFile { file: String },

    #[error("{file}: Import \"{import}\" was not found")]
    MissingImport { file: String, import: String },

    #[error("{file}: \"{import}\" is imported more than once")]
    DuplicateImport { file: String, import: String },

    #[error("{file}: Import \"{import}\" failed to compile")]
    FailedImport { file: String, import: String },

    #[error("Cyclic import: \"{from}\" imports \"{to}\" which leads back to \"{from}\"")]
    CyclicImport { from: String, to: String },

    #[error("\"{name}\" is defined in both {first_file} ({first}) and {second_file} ({second})")]
    DuplicateDefinition {
        name:        String,
        first_file:  String,
        first:       Location,
        second_file: String,
        second:      Location,
    },

    #[error("{file}: Type \"{type_name}\" of \"{element}\" is not defined")]
    FieldTypeNotFound {
        file:      String,
        element:   String,
        type_name: String,
    },

    #[error("{file}: Invalid default value for \"{field}\": {msg}")]
    InvalidDefault {
        file:  String,
        field: String,
        msg:   String,
    },

    #[error("{file}: Invalid extension \"{field}\": {msg}")]
    InvalidExtension {
        file:  String,
        field: String,
        msg:   String,
    },

    #[error("{file}: Invalid type id for \"{element}\": {msg}")]
    InvalidTypeId {
        file:    String,
        element: String,
        msg:     String,
    },

    #[error("Type id {type_id} of \"{second}\" is already used by \"{first}\"")]
    DuplicateTypeId {
        type_id: i32,
        first:   String,
        second:  String,
    },

    #[error("Invalid annotation configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtoError {
    /// Errors that involve several files at once. They abort a whole batch even
    /// when a progress callback collects per-file errors.
    pub fn is_cross_file(&self) -> bool {
        matches!(
            self,
            ProtoError::DuplicateFile { .. }
                | ProtoError::CyclicImport { .. }
                | ProtoError::DuplicateDefinition { .. }
                | ProtoError::DuplicateTypeId { .. }
        )
    }

    pub(crate) fn descriptor(file: &str, source: DescriptorError) -> Self {
        ProtoError::Descriptor {
            file: file.to_string(),
            source,
        }
    }
}
