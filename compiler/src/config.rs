//! Loading an annotation `Configuration` from its JSON form.
//!
//! ```json
//! {
//!   "legacy_annotations": false,
//!   "undefined_annotation_log_level": "warn",
//!   "annotations": [
//!     {
//!       "name": "Index",
//!       "targets": ["field"],
//!       "attributes": [
//!         { "name": "name", "type": "string" },
//!         { "name": "unique", "type": "boolean", "default": false }
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::error::ProtoError;
use brine_proto_schema::{Configuration, ConfigurationDef};
use std::{fs, path::Path};
use tracing::debug;

pub fn parse_configuration(json: &str) -> Result<Configuration, ProtoError> {
    let def: ConfigurationDef = serde_json::from_str(json)?;
    debug!(annotations = def.annotations.len(), "loaded annotation configuration");
    Ok(def.into_builder().build()?)
}

pub fn load_configuration(path: impl AsRef<Path>) -> Result<Configuration, ProtoError> {
    let text = fs::read_to_string(path)?;
    parse_configuration(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use brine_proto_schema::{ElementKind, LogLevel, TYPE_ID_ANNOTATION};

    #[test]
    fn test_parse_configuration() {
        let config = parse_configuration(
            r#"{
                "legacy_annotations": true,
                "undefined_annotation_log_level": "debug",
                "annotations": [
                    {
                        "name": "Tag",
                        "targets": ["message", "field"],
                        "attributes": [{ "name": "value", "type": "string", "multiple": true }],
                        "repeatable": "Tags"
                    }
                ]
            }"#,
        )
        .unwrap();
        assert!(config.legacy_annotations());
        assert_eq!(config.undefined_annotation_log_level(), LogLevel::Debug);
        assert!(config.is_repeatable("Tag"));
        assert!(config.annotation("Tag").unwrap().allows(ElementKind::Field));
        assert!(config.annotation(TYPE_ID_ANNOTATION).is_some());
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(parse_configuration("{ \"annotations\": 3 }"), Err(ProtoError::Json(_))));
        assert!(matches!(
            parse_configuration(r#"{ "annotations": [{ "name": "X", "targets": [] }] }"#),
            Err(ProtoError::Config(_))
        ));
    }
}
