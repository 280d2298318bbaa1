//! The annotation micro-language of documentation comments.
//!
//! ```text
//! /**
//!  * An order line.
//!  * @TypeId(12)
//!  * @Index(name = "by_sku", unique = true)
//!  */
//! ```
//!
//! `lexer` and `parser` are purely syntactic; `processor` checks the parsed
//! annotations against a `Configuration`.

pub mod lexer;
pub mod parser;
pub mod processor;

pub use lexer::AnnotationLexer;
pub use parser::AnnotationParser;
pub use processor::AnnotationProcessor;

use crate::error::AnnotationError;
use brine_proto_schema::Annotation;

/// Parses every annotation of `text` without any configuration: nothing is
/// repeatable and annotations may start anywhere after whitespace.
pub fn parse_annotations(text: &str) -> Result<Vec<Annotation>, AnnotationError> {
    let never = |_: &str| false;
    AnnotationParser::new(AnnotationLexer::new(text, 1, false), &never).parse_all()
}
