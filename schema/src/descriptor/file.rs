use super::{
    check_simple_name,
    message::{assign_extend_names, build_extends},
    AnnotatedDescriptor, EnumBuilder, EnumDescriptor, ExtendBuilder, ExtendDescriptor, Location,
    MessageBuilder, MessageDescriptor, Options, Syntax,
};
use crate::{config::Configuration, error::DescriptorError};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

/// One `import` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Import {
    pub name:     String,
    pub public:   bool,
    pub weak:     bool,
    #[serde(skip)]
    pub location: Location,
}

impl Import {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Import {
            name: name.into(),
            public: false,
            weak: false,
            location,
        }
    }
}

pub type FileError = Arc<dyn Error + Send + Sync>;

#[derive(Debug, Serialize)]
pub struct FileDescriptor {
    name:     String,
    package:  String,
    syntax:   Syntax,
    imports:  Vec<Import>,
    options:  Options,
    messages: Vec<Arc<MessageDescriptor>>,
    enums:    Vec<Arc<EnumDescriptor>>,
    extends:  Vec<ExtendDescriptor>,
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    error:    Option<FileError>,
}

fn serialize_error<S: Serializer>(error: &Option<FileError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_some(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl FileDescriptor {
    /// A stub standing in for a file that failed to parse or resolve.
    pub fn failed(name: impl Into<String>, error: FileError) -> Self {
        FileDescriptor {
            name:     name.into(),
            package:  String::new(),
            syntax:   Syntax::default(),
            imports:  Vec::new(),
            options:  Options::new(),
            messages: Vec::new(),
            enums:    Vec::new(),
            extends:  Vec::new(),
            error:    Some(error),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.imports.iter().map(|i| i.name.as_str())
    }

    pub fn public_dependencies(&self) -> impl Iterator<Item = &str> {
        self.imports.iter().filter(|i| i.public).map(|i| i.name.as_str())
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn messages(&self) -> &[Arc<MessageDescriptor>] {
        &self.messages
    }

    pub fn enums(&self) -> &[Arc<EnumDescriptor>] {
        &self.enums
    }

    pub fn extends(&self) -> &[ExtendDescriptor] {
        &self.extends
    }

    pub fn error(&self) -> Option<&FileError> {
        self.error.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Looks up a message declared in this file by full name, nested ones
    /// included.
    pub fn find_message(&self, full_name: &str) -> Option<&Arc<MessageDescriptor>> {
        fn find<'a>(
            messages: &'a [Arc<MessageDescriptor>],
            full_name: &str,
        ) -> Option<&'a Arc<MessageDescriptor>> {
            messages.iter().find_map(|m| {
                if m.full_name() == full_name {
                    Some(m)
                } else {
                    find(m.messages(), full_name)
                }
            })
        }
        find(&self.messages, full_name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileBuilder {
    pub name:     String,
    pub package:  String,
    pub syntax:   Syntax,
    pub imports:  Vec<Import>,
    pub options:  Options,
    pub messages: Vec<MessageBuilder>,
    pub enums:    Vec<EnumBuilder>,
    pub extends:  Vec<ExtendBuilder>,
}

impl FileBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        FileBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn assign_full_names(&mut self) {
        let package = self.package.clone();
        for message in &mut self.messages {
            message.assign_full_names(&package);
        }
        for e in &mut self.enums {
            e.assign_full_names(&package);
        }
        assign_extend_names(&mut self.extends, &package);
    }

    /// Checks every invariant that does not need other files.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let mut seen: HashMap<&str, Location> = HashMap::new();
        let top_level = self
            .messages
            .iter()
            .map(|m| (m.name.as_str(), m.location))
            .chain(self.enums.iter().map(|e| (e.name.as_str(), e.location)));
        for (name, location) in top_level {
            if seen.insert(name, location).is_some() {
                return Err(DescriptorError::AlreadyDefined {
                    scope: self.name.clone(),
                    name: name.to_string(),
                    location,
                });
            }
        }

        for message in &self.messages {
            message.validate(self.syntax)?;
        }
        for e in &self.enums {
            e.validate(self.syntax)?;
        }
        for extend in &self.extends {
            for field in &extend.fields {
                check_simple_name(&field.name, field.location)?;
                field.validate_number()?;
                field.validate_syntax(self.syntax)?;
            }
        }
        Ok(())
    }

    /// Freezes the file. Every type reference must have been resolved.
    pub fn build(self, config: Option<&Arc<Configuration>>) -> Result<FileDescriptor, DescriptorError> {
        let messages = self
            .messages
            .into_iter()
            .map(|m| m.build(&self.name, None, self.syntax, config).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let enums = self
            .enums
            .into_iter()
            .map(|e| e.build(&self.name, None, config).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let extends = build_extends(self.extends, &self.package, self.syntax, config)?;

        Ok(FileDescriptor {
            name: self.name,
            package: self.package,
            syntax: self.syntax,
            imports: self.imports,
            options: self.options,
            messages,
            enums,
            extends,
            error: None,
        })
    }
}
