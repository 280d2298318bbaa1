//! brine-proto-compiler
//!
//! This crate implements:
//!  1) A tokenizer + parser for `.proto` schema files,
//!  2) The annotation language of documentation comments (lexer, parser and
//!     the configuration driven processor),
//!  3) Multi-file resolution: import order, public import visibility, scoped
//!     type lookup, duplicate definitions, type ids and extensions,
//!  4) A compatibility checker for two versions of a schema,
//!  5) Reserved number/name merging shared by the parser and by callers,
//!  6) Error types (`ProtoError`, `AnnotationError`).

pub mod annotation;
pub mod compat;
pub mod compiler;
pub mod config;
pub mod error;
pub mod parser;
pub mod reserved;
pub mod resolver;
pub mod tokenizer;
pub mod utils;

pub use compat::{CompatibilityChecker, Violation, ViolationKind};
pub use compiler::{compile, compile_with_callback, parse_file, ProgressCallback};
pub use config::{load_configuration, parse_configuration};
pub use error::{AnnotationError, ProtoError};
pub use reserved::{ReservationSource, ReservedProcessor, ReservedRange};
pub use resolver::{ResolutionContext, ResolvedSchema};
