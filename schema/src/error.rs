use crate::config::AttributeType;
use crate::descriptor::Location;
use thiserror::Error;

/// Violations of the invariants a single file can check on its own.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DescriptorError {
    #[error("Definition names should not be qualified: \"{name}\" at {location}")]
    QualifiedDefinitionName { name: String, location: Location },

    #[error("\"{name}\" is already defined in \"{scope}\" at {location}")]
    AlreadyDefined {
        scope:    String,
        name:     String,
        location: Location,
    },

    #[error("Field number {number} is used by both \"{first}\" and \"{second}\" in \"{scope}\"")]
    DuplicateFieldNumber {
        scope:  String,
        number: i32,
        first:  String,
        second: String,
    },

    #[error("Field number {number} of \"{field}\" must be between 1 and {max}")]
    FieldNumberOutOfRange { field: String, number: i32, max: i32 },

    #[error("Field number {number} of \"{field}\" falls in the implementation reserved range 19000 to 19999")]
    ImplementationReservedNumber { field: String, number: i32 },

    #[error("\"{element}\" uses number {number} which is reserved in \"{scope}\"")]
    ReservedNumberConflict {
        scope:   String,
        element: String,
        number:  i32,
    },

    #[error("\"{element}\" uses a name that is reserved in \"{scope}\"")]
    ReservedNameConflict { scope: String, element: String },

    #[error("Reserved range {from} to {to} in \"{scope}\" declared by {source_name} is empty")]
    InvalidReservedRange {
        scope:       String,
        from:        i32,
        to:          i32,
        source_name: String,
    },

    #[error("Reserved number {number} in \"{scope}\" is declared by both {first} and {second}")]
    ReservedOverlap {
        scope:  String,
        number: i32,
        first:  String,
        second: String,
    },

    #[error("Reserved name \"{name}\" in \"{scope}\" is declared by both {first} and {second}")]
    ReservedNameOverlap {
        scope:  String,
        name:   String,
        first:  String,
        second: String,
    },

    #[error("Extension range {from} to {to} of \"{scope}\" overlaps {what}")]
    ExtensionRangeOverlap {
        scope: String,
        from:  i32,
        to:    i32,
        what:  String,
    },

    #[error("Enum value {number} of \"{name}\" is already used by \"{first}\" in \"{scope}\"; set option allow_alias = true to allow aliases")]
    DuplicateEnumValue {
        scope:  String,
        name:   String,
        first:  String,
        number: i32,
    },

    #[error("Enum \"{name}\" must define at least one value")]
    EmptyEnum { name: String },

    #[error("The first value of proto3 enum \"{name}\" must be zero")]
    Proto3FirstEnumValue { name: String },

    #[error("Required fields are not allowed in proto3: \"{field}\"")]
    Proto3Required { field: String },

    #[error("Explicit default values are not allowed in proto3: \"{field}\"")]
    Proto3Default { field: String },

    #[error("The type of \"{element}\" has not been resolved")]
    UnresolvedType { element: String },

    #[error("Failed to create metadata for @{annotation} on \"{element}\": {message}")]
    MetadataCreation {
        element:    String,
        annotation: String,
        message:    String,
    },
}

/// Problems found while freezing an annotation `Configuration`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Annotation names must not be empty")]
    EmptyName,

    #[error("Annotation @{0} is configured twice")]
    DuplicateAnnotation(String),

    #[error("Annotation @{0} has no targets")]
    NoTargets(String),

    #[error("Attribute \"{attribute}\" of @{annotation} is configured twice")]
    DuplicateAttribute { annotation: String, attribute: String },

    #[error("Default value of \"{attribute}\" in @{annotation} is not a valid {expected}")]
    InvalidDefault {
        annotation: String,
        attribute:  String,
        expected:   AttributeType,
    },

    #[error("Attribute \"{attribute}\" of @{annotation} has type {ty} which cannot restrict allowed values")]
    AllowedValuesNotSupported {
        annotation: String,
        attribute:  String,
        ty:         AttributeType,
    },

    #[error("Default value of \"{attribute}\" in @{annotation} is not one of its allowed values")]
    DefaultNotAllowed { annotation: String, attribute: String },

    #[error("Repeatable container @{container} of @{annotation} clashes with another annotation")]
    ContainerConflict { annotation: String, container: String },
}
