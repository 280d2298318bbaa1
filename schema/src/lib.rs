//! Data model for the Brine Proto schema engine.
//!
//! This crate holds the plain data shared by the compiler and the runtime:
//!
//! - the descriptor tree (`FileDescriptor`, `MessageDescriptor`, `EnumDescriptor`,
//!   `FieldDescriptor`, ...) together with the builders that produce it,
//! - `ReservedNumbers`, a sparse set over the whole `i32` domain,
//! - the AST of the annotation micro-language found in documentation comments,
//! - the annotation `Configuration` that gives those annotations a type system.
//!
//! ```
//! use brine_proto_schema::ReservedNumbers;
//!
//! let mut reserved = ReservedNumbers::new();
//! reserved.insert(2);
//! reserved.insert_range(9, 11);
//! assert!(reserved.contains(10));
//! assert_eq!(reserved.to_string(), "2, 9 to 11");
//! ```

pub mod annotation;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod reserved;
pub mod wire;

pub use annotation::*;
pub use config::*;
pub use descriptor::*;
pub use error::*;
pub use reserved::*;
pub use wire::*;

/// Largest field number a message may use.
pub const MAX_FIELD_NUMBER: i32 = 536_870_911;

/// First field number of the block reserved for the implementation.
pub const FIRST_IMPLEMENTATION_RESERVED: i32 = 19_000;

/// Last field number of the block reserved for the implementation.
pub const LAST_IMPLEMENTATION_RESERVED: i32 = 19_999;
