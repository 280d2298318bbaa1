//! brine-proto
//!
//! The user facing crate: compile `.proto` files, inspect the resolved
//! descriptors and their annotations, compare two schema versions.
//!
//! - `compile` / `compile_with_callback` / `compile_paths`
//! - `CompatibilityChecker` (re-exported from compiler)
//! - Descriptor and annotation types (re-exported from schema)
//! - `schema_to_json` for dumping a resolved schema

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use brine_proto_compiler::{
    compile, compile_with_callback, load_configuration, parse_configuration, CompatibilityChecker,
    ProgressCallback, ResolvedSchema, Violation, ViolationKind,
};
pub use brine_proto_compiler::error::{AnnotationError, ProtoError};
pub use brine_proto_schema::{
    AnnotatedDescriptor, Annotation, Configuration, EnumDescriptor, FieldDescriptor, FileDescriptor,
    MessageDescriptor, TypeDescriptor, Value,
};

/// Render a resolved schema as pretty-printed JSON, one entry per file.
pub fn schema_to_json(schema: &ResolvedSchema) -> Result<String, ProtoError> {
    Ok(serde_json::to_string_pretty(schema)?)
}

/// Reads schema files from disk. Each file is named by its path relative to
/// `root`, which is the name other files import it by.
pub fn read_sources(root: &Path, paths: &[PathBuf]) -> Result<Vec<(String, String)>, ProtoError> {
    paths
        .iter()
        .map(|path| {
            let text = fs::read_to_string(path)?;
            Ok((source_name(root, path), text))
        })
        .collect()
}

fn source_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Reads and compiles files from disk in one go.
pub fn compile_paths(root: &Path, paths: &[PathBuf], config: Arc<Configuration>) -> Result<ResolvedSchema, ProtoError> {
    compile(read_sources(root, paths)?, config)
}

pub mod compiler {
    pub use brine_proto_compiler::*;
}

pub mod error {
    pub use brine_proto_compiler::error::{AnnotationError, ProtoError};
}

pub mod schema {
    pub use brine_proto_schema::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_to_json() {
        let schema = compile(
            [("a.proto", "package a;\n/** @TypeId(3) */\nmessage M { optional string s = 1; }")],
            Arc::new(Configuration::default()),
        )
        .unwrap();
        let json = schema_to_json(&schema).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let file = &value["a.proto"];
        assert_eq!(file["package"], "a");
        assert_eq!(file["messages"][0]["full_name"], "a.M");
        assert_eq!(file["messages"][0]["type_id"], 3);
    }

    #[test]
    fn test_source_names_are_relative() {
        let root = Path::new("protos");
        assert_eq!(source_name(root, Path::new("protos/shop/order.proto")), "shop/order.proto");
        assert_eq!(source_name(root, Path::new("other.proto")), "other.proto");
    }
}
