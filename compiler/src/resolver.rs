use crate::{annotation::AnnotationProcessor, compiler::ProgressCallback, error::ProtoError};
use brine_proto_schema::{
    qualify, AnnotatedDescriptor, Annotation, Annotations, Configuration, DescriptorError, Documentation,
    ElementKind, EnumBuilder, EnumDescriptor, ExtendBuilder, FieldBuilder, FieldDescriptor, FieldType,
    FileBuilder, FileDescriptor, Label, Location, MessageBuilder, MessageDescriptor, OptionValue,
    ReservedNumbers, ScalarType, TypeDescriptor, TYPE_ID_ANNOTATION,
};
use serde::{ser::SerializeMap, Serialize, Serializer};
use std::collections::{btree_map::Entry, BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
enum DefinitionKind {
    Message {
        extension_ranges: ReservedNumbers,
        numbers:          HashSet<i32>,
    },
    Enum {
        values: Vec<String>,
    },
    /// Enum values live in the scope of their enum's parent.
    EnumValue,
}

#[derive(Debug, Clone)]
struct Definition {
    file:     String,
    location: Location,
    kind:     DefinitionKind,
}

/// The file being resolved: its own definitions and the files whose
/// definitions it can see.
struct FileScope {
    file:    String,
    visible: HashSet<String>,
    local:   HashMap<String, Definition>,
}

/// The result of one resolution batch, in dependency order.
#[derive(Debug, Default)]
pub struct ResolvedSchema {
    files: Vec<Arc<FileDescriptor>>,
    index: HashMap<String, usize>,
    types: HashMap<String, TypeDescriptor>,
}

impl ResolvedSchema {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file(&self, name: &str) -> Option<&Arc<FileDescriptor>> {
        self.index.get(name).map(|&i| &self.files[i])
    }

    /// Files in dependency order. Failed files are stubs.
    pub fn files(&self) -> impl Iterator<Item = &Arc<FileDescriptor>> {
        self.files.iter()
    }

    pub fn failed_files(&self) -> impl Iterator<Item = &Arc<FileDescriptor>> {
        self.files.iter().filter(|f| f.is_failed())
    }

    pub fn find_type(&self, full_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(full_name.strip_prefix('.').unwrap_or(full_name))
    }

    pub fn find_message(&self, full_name: &str) -> Option<&Arc<MessageDescriptor>> {
        match self.find_type(full_name)? {
            TypeDescriptor::Message(m) => Some(m),
            TypeDescriptor::Enum(_) => None,
        }
    }

    pub fn find_enum(&self, full_name: &str) -> Option<&Arc<EnumDescriptor>> {
        match self.find_type(full_name)? {
            TypeDescriptor::Enum(e) => Some(e),
            TypeDescriptor::Message(_) => None,
        }
    }

    /// Every message and enum of every file, nested ones included.
    pub fn types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    pub fn type_by_id(&self, type_id: i32) -> Option<&TypeDescriptor> {
        self.types.values().find(|t| t.type_id() == Some(type_id))
    }

    /// Follows the non-owning reference of a message or enum typed field.
    pub fn field_type(&self, field: &FieldDescriptor) -> Option<&TypeDescriptor> {
        match field.field_type() {
            FieldType::Scalar(_) => None,
            FieldType::Message(name) | FieldType::Enum(name) => self.types.get(name),
        }
    }

    pub fn into_files(self) -> BTreeMap<String, Arc<FileDescriptor>> {
        self.files
            .into_iter()
            .map(|f| (f.name().to_string(), f))
            .collect()
    }

    fn insert(&mut self, file: Arc<FileDescriptor>) {
        for message in file.messages() {
            register_message(&mut self.types, message);
        }
        for e in file.enums() {
            self.types
                .insert(e.full_name().to_string(), TypeDescriptor::Enum(e.clone()));
        }
        self.index.insert(file.name().to_string(), self.files.len());
        self.files.push(file);
    }
}

fn register_message(types: &mut HashMap<String, TypeDescriptor>, message: &Arc<MessageDescriptor>) {
    types.insert(message.full_name().to_string(), TypeDescriptor::Message(message.clone()));
    for nested in message.messages() {
        register_message(types, nested);
    }
    for e in message.enums() {
        types.insert(e.full_name().to_string(), TypeDescriptor::Enum(e.clone()));
    }
}

impl Serialize for ResolvedSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.files.len()))?;
        for file in &self.files {
            map.serialize_entry(file.name(), file.as_ref())?;
        }
        map.end()
    }
}

/// Links the parsed files of one batch into a `ResolvedSchema`.
///
/// Files are handled in import order, each one only after everything it
/// imports. The type universe and the type id registry grow one file at a
/// time and only with files that resolved completely.
pub struct ResolutionContext<'c> {
    config:     Arc<Configuration>,
    callback:   Option<&'c mut dyn ProgressCallback>,
    defs:       HashMap<String, Definition>,
    type_ids:   HashMap<i32, String>,
    extensions: HashMap<(String, i32), String>,
    exported:   HashMap<String, HashSet<String>>,
    failed:     HashSet<String>,
    schema:     ResolvedSchema,
}

impl<'c> ResolutionContext<'c> {
    pub fn new(config: Arc<Configuration>) -> Self {
        ResolutionContext {
            config,
            callback: None,
            defs: HashMap::new(),
            type_ids: HashMap::new(),
            extensions: HashMap::new(),
            exported: HashMap::new(),
            failed: HashSet::new(),
            schema: ResolvedSchema::default(),
        }
    }

    /// Reports every file to `callback` and turns file level errors into
    /// failed stub files instead of aborting the batch.
    pub fn with_callback(mut self, callback: &'c mut dyn ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Resolves every parsed file. The order of `files` does not matter, but
    /// each name may appear only once.
    pub fn resolve(
        mut self,
        files: Vec<(String, Result<FileBuilder, ProtoError>)>,
    ) -> Result<ResolvedSchema, ProtoError> {
        let mut parsed: BTreeMap<String, Result<FileBuilder, ProtoError>> = BTreeMap::new();
        for (name, result) in files {
            match parsed.entry(name) {
                Entry::Occupied(entry) => {
                    return Err(ProtoError::DuplicateFile {
                        file: entry.key().clone(),
                    })
                }
                Entry::Vacant(entry) => {
                    entry.insert(result);
                }
            }
        }
        let graph: BTreeMap<String, Vec<String>> = parsed
            .iter()
            .map(|(name, result)| {
                let imports = match result {
                    Ok(builder) => builder.imports.iter().map(|i| i.name.clone()).collect(),
                    Err(_) => Vec::new(),
                };
                (name.clone(), imports)
            })
            .collect();
        let order = import_order(&graph)?;
        debug!(?order, "resolution order");

        for name in order {
            let Some(result) = parsed.remove(&name) else {
                continue;
            };
            match result.and_then(|builder| self.resolve_file(builder)) {
                Ok(file) => {
                    if let Some(callback) = self.callback.as_mut() {
                        callback.on_file(&name, Ok(file.as_ref()));
                    }
                    self.schema.insert(file);
                }
                Err(err) => self.fail(&name, err)?,
            }
        }

        info!(
            files = self.schema.len(),
            failed = self.failed.len(),
            types = self.schema.types.len(),
            "resolution finished"
        );
        Ok(self.schema)
    }

    fn fail(&mut self, file: &str, err: ProtoError) -> Result<(), ProtoError> {
        if err.is_cross_file() {
            return Err(err);
        }
        let Some(callback) = self.callback.as_mut() else {
            return Err(err);
        };
        warn!(file, error = %err, "file failed");
        callback.on_file(file, Err(&err));
        self.failed.insert(file.to_string());
        self.schema
            .insert(Arc::new(FileDescriptor::failed(file, Arc::new(err))));
        Ok(())
    }

    fn resolve_file(&mut self, mut builder: FileBuilder) -> Result<Arc<FileDescriptor>, ProtoError> {
        let file = builder.name.clone();
        debug!(file = %file, "resolving");
        self.check_imports(&builder)?;
        builder
            .validate()
            .map_err(|source| ProtoError::descriptor(&file, source))?;

        let scope = FileScope {
            file:    file.clone(),
            visible: self.visible_files(&builder),
            local:   self.collect_definitions(&builder)?,
        };
        debug!(file = %file, visible = scope.visible.len(), "visible files");

        let package = builder.package.clone();
        for message in &mut builder.messages {
            self.resolve_message(&scope, message)?;
        }
        for extend in &mut builder.extends {
            self.resolve_extend(&scope, &package, extend)?;
        }
        let extensions = self.check_extensions(&scope, &builder)?;

        let processor = AnnotationProcessor::new(&self.config);
        for message in &mut builder.messages {
            annotate_message(&processor, &file, message)?;
        }
        for e in &mut builder.enums {
            annotate_enum(&processor, &file, e)?;
        }
        for extend in &mut builder.extends {
            annotate_fields(&processor, &file, &mut extend.fields)?;
        }
        let type_ids = self.assign_type_ids(&file, &mut builder)?;

        let exported = self.exports_of(&builder);
        let descriptor = builder
            .build(Some(&self.config))
            .map_err(|source| ProtoError::descriptor(&file, source))?;

        self.defs.extend(scope.local);
        self.type_ids.extend(type_ids);
        self.extensions.extend(extensions);
        self.exported.insert(file, exported);
        Ok(Arc::new(descriptor))
    }

    fn check_imports(&self, builder: &FileBuilder) -> Result<(), ProtoError> {
        let mut seen = HashSet::new();
        for import in &builder.imports {
            let error = if !seen.insert(import.name.as_str()) {
                ProtoError::DuplicateImport {
                    file:   builder.name.clone(),
                    import: import.name.clone(),
                }
            } else if self.failed.contains(&import.name) {
                ProtoError::FailedImport {
                    file:   builder.name.clone(),
                    import: import.name.clone(),
                }
            } else if self.schema.file(&import.name).is_none() {
                ProtoError::MissingImport {
                    file:   builder.name.clone(),
                    import: import.name.clone(),
                }
            } else {
                continue;
            };
            return Err(error);
        }
        Ok(())
    }

    /// The file itself plus everything its imports export.
    fn visible_files(&self, builder: &FileBuilder) -> HashSet<String> {
        let mut visible = HashSet::from([builder.name.clone()]);
        for import in &builder.imports {
            if let Some(exported) = self.exported.get(&import.name) {
                visible.extend(exported.iter().cloned());
            }
        }
        visible
    }

    /// What an importer of this file gets to see: the file and, transitively,
    /// its public imports.
    fn exports_of(&self, builder: &FileBuilder) -> HashSet<String> {
        let mut exported = HashSet::from([builder.name.clone()]);
        for import in builder.imports.iter().filter(|i| i.public) {
            if let Some(theirs) = self.exported.get(&import.name) {
                exported.extend(theirs.iter().cloned());
            }
        }
        exported
    }

    fn collect_definitions(&self, builder: &FileBuilder) -> Result<HashMap<String, Definition>, ProtoError> {
        let mut local = HashMap::new();
        for message in &builder.messages {
            self.define_message(&builder.name, &builder.package, message, &mut local)?;
        }
        for e in &builder.enums {
            self.define_enum(&builder.name, &builder.package, e, &mut local)?;
        }
        Ok(local)
    }

    fn define_message(
        &self,
        file: &str,
        scope: &str,
        message: &MessageBuilder,
        local: &mut HashMap<String, Definition>,
    ) -> Result<(), ProtoError> {
        let kind = DefinitionKind::Message {
            extension_ranges: message.extension_ranges.clone(),
            numbers:          message.all_fields().map(|f| f.number).collect(),
        };
        self.define(file, scope, &message.name, &message.full_name, message.location, kind, local)?;
        for nested in &message.messages {
            self.define_message(file, &message.full_name, nested, local)?;
        }
        for e in &message.enums {
            self.define_enum(file, &message.full_name, e, local)?;
        }
        Ok(())
    }

    fn define_enum(
        &self,
        file: &str,
        scope: &str,
        e: &EnumBuilder,
        local: &mut HashMap<String, Definition>,
    ) -> Result<(), ProtoError> {
        let kind = DefinitionKind::Enum {
            values: e.values.iter().map(|v| v.name.clone()).collect(),
        };
        self.define(file, scope, &e.name, &e.full_name, e.location, kind, local)?;
        for value in &e.values {
            self.define(
                file,
                scope,
                &value.name,
                &value.full_name,
                value.location,
                DefinitionKind::EnumValue,
                local,
            )?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn define(
        &self,
        file: &str,
        scope: &str,
        name: &str,
        full_name: &str,
        location: Location,
        kind: DefinitionKind,
        local: &mut HashMap<String, Definition>,
    ) -> Result<(), ProtoError> {
        if let Some(first) = self.defs.get(full_name) {
            return Err(ProtoError::DuplicateDefinition {
                name:        full_name.to_string(),
                first_file:  first.file.clone(),
                first:       first.location,
                second_file: file.to_string(),
                second:      location,
            });
        }
        if local.contains_key(full_name) {
            return Err(ProtoError::descriptor(
                file,
                DescriptorError::AlreadyDefined {
                    scope: if scope.is_empty() { file.to_string() } else { scope.to_string() },
                    name: name.to_string(),
                    location,
                },
            ));
        }
        local.insert(
            full_name.to_string(),
            Definition {
                file: file.to_string(),
                location,
                kind,
            },
        );
        Ok(())
    }

    /// A definition by full name: this file's own, or one of a visible file.
    fn definition<'s>(&'s self, scope: &'s FileScope, full_name: &str) -> Option<&'s Definition> {
        scope.local.get(full_name).or_else(|| {
            self.defs
                .get(full_name)
                .filter(|d| scope.visible.contains(&d.file))
        })
    }

    /// Looks `name` up from inside `from`. A leading dot makes the name
    /// absolute, otherwise every enclosing scope is tried from the innermost
    /// outwards. Enum values are never types.
    fn lookup<'s>(&'s self, scope: &'s FileScope, name: &str, from: &str) -> Option<(String, &'s Definition)> {
        let is_type = |d: &&Definition| !matches!(d.kind, DefinitionKind::EnumValue);
        if let Some(absolute) = name.strip_prefix('.') {
            return self
                .definition(scope, absolute)
                .filter(is_type)
                .map(|d| (absolute.to_string(), d));
        }
        let mut prefix = Some(from);
        while let Some(p) = prefix {
            let full_name = qualify(p, name);
            if let Some(d) = self.definition(scope, &full_name).filter(is_type) {
                return Some((full_name, d));
            }
            prefix = if p.is_empty() {
                None
            } else {
                Some(p.rsplit_once('.').map_or("", |(parent, _)| parent))
            };
        }
        None
    }

    fn resolve_message(&self, scope: &FileScope, message: &mut MessageBuilder) -> Result<(), ProtoError> {
        let from = message.full_name.clone();
        for field in message.all_fields_mut() {
            self.resolve_field(scope, &from, field)?;
        }
        for extend in &mut message.extends {
            self.resolve_extend(scope, &from, extend)?;
        }
        for nested in &mut message.messages {
            self.resolve_message(scope, nested)?;
        }
        Ok(())
    }

    fn resolve_extend(&self, scope: &FileScope, from: &str, extend: &mut ExtendBuilder) -> Result<(), ProtoError> {
        let (full_name, definition) =
            self.lookup(scope, &extend.extendee, from)
                .ok_or_else(|| ProtoError::FieldTypeNotFound {
                    file:      scope.file.clone(),
                    element:   format!("extend {}", extend.extendee),
                    type_name: extend.extendee.clone(),
                })?;
        if !matches!(definition.kind, DefinitionKind::Message { .. }) {
            return Err(ProtoError::InvalidExtension {
                file:  scope.file.clone(),
                field: full_name,
                msg:   "only messages can be extended".to_string(),
            });
        }
        extend.resolved_extendee = Some(full_name);
        for field in &mut extend.fields {
            self.resolve_field(scope, from, field)?;
        }
        Ok(())
    }

    fn resolve_field(&self, scope: &FileScope, from: &str, field: &mut FieldBuilder) -> Result<(), ProtoError> {
        if field.resolved_type.is_none() {
            let not_found = || ProtoError::FieldTypeNotFound {
                file:      scope.file.clone(),
                element:   field.full_name.clone(),
                type_name: field.type_name.clone(),
            };
            let (full_name, definition) = self.lookup(scope, &field.type_name, from).ok_or_else(not_found)?;
            let resolved = match definition.kind {
                DefinitionKind::Message { .. } => FieldType::Message(full_name),
                DefinitionKind::Enum { .. } => FieldType::Enum(full_name),
                DefinitionKind::EnumValue => return Err(not_found()),
            };
            field.resolved_type = Some(resolved);
        }
        self.check_default(scope, field)
    }

    fn check_default(&self, scope: &FileScope, field: &FieldBuilder) -> Result<(), ProtoError> {
        let Some(default) = &field.default_value else {
            return Ok(());
        };
        let invalid = |msg: String| ProtoError::InvalidDefault {
            file: scope.file.clone(),
            field: field.full_name.clone(),
            msg,
        };
        if field.label == Label::Repeated {
            return Err(invalid("repeated fields cannot have a default".to_string()));
        }
        match (&field.resolved_type, default) {
            (Some(FieldType::Scalar(ty)), value) => check_scalar_default(*ty, value).map_err(invalid),
            (Some(FieldType::Enum(name)), OptionValue::Identifier(value)) => {
                let known = match self.definition(scope, name).map(|d| &d.kind) {
                    Some(DefinitionKind::Enum { values }) => values.iter().any(|v| v == value),
                    _ => false,
                };
                if known {
                    Ok(())
                } else {
                    Err(invalid(format!("{} has no value named {}", name, value)))
                }
            }
            (Some(FieldType::Enum(name)), value) => {
                Err(invalid(format!("{} is not a value of {}", value, name)))
            }
            (Some(FieldType::Message(_)), _) => Err(invalid("message fields cannot have a default".to_string())),
            (None, _) => Ok(()),
        }
    }

    /// Extension numbers must lie in a declared extension range of the
    /// extendee and be free there. Returns the numbers this file claims.
    fn check_extensions(
        &self,
        scope: &FileScope,
        builder: &FileBuilder,
    ) -> Result<Vec<((String, i32), String)>, ProtoError> {
        let mut extends: Vec<&ExtendBuilder> = builder.extends.iter().collect();
        gather_extends(&builder.messages, &mut extends);

        let mut claimed: Vec<((String, i32), String)> = Vec::new();
        for extend in extends {
            let Some(extendee) = &extend.resolved_extendee else {
                continue;
            };
            let Some(DefinitionKind::Message {
                extension_ranges,
                numbers,
            }) = self.definition(scope, extendee).map(|d| &d.kind)
            else {
                continue;
            };
            for field in &extend.fields {
                let invalid = |msg: String| ProtoError::InvalidExtension {
                    file: scope.file.clone(),
                    field: field.full_name.clone(),
                    msg,
                };
                let number = field.number;
                if !extension_ranges.contains(number) {
                    return Err(invalid(format!(
                        "{} does not declare {} as an extension number",
                        extendee, number
                    )));
                }
                if numbers.contains(&number) {
                    return Err(invalid(format!("number {} is already used by a field of {}", number, extendee)));
                }
                let key = (extendee.clone(), number);
                let previous = self
                    .extensions
                    .get(&key)
                    .or_else(|| claimed.iter().find(|(k, _)| *k == key).map(|(_, owner)| owner));
                if let Some(previous) = previous {
                    return Err(invalid(format!(
                        "number {} of {} is already used by extension {}",
                        number, extendee, previous
                    )));
                }
                claimed.push((key, field.full_name.clone()));
            }
        }
        Ok(claimed)
    }

    fn assign_type_ids(&self, file: &str, builder: &mut FileBuilder) -> Result<Vec<(i32, String)>, ProtoError> {
        let mut claimed = Vec::new();
        for message in &mut builder.messages {
            self.message_type_ids(file, message, &mut claimed)?;
        }
        for e in &mut builder.enums {
            e.type_id = self.take_type_id(file, &e.full_name, &e.annotations, &mut claimed)?;
        }
        Ok(claimed)
    }

    fn message_type_ids(
        &self,
        file: &str,
        message: &mut MessageBuilder,
        claimed: &mut Vec<(i32, String)>,
    ) -> Result<(), ProtoError> {
        message.type_id = self.take_type_id(file, &message.full_name, &message.annotations, claimed)?;
        for nested in &mut message.messages {
            self.message_type_ids(file, nested, claimed)?;
        }
        for e in &mut message.enums {
            e.type_id = self.take_type_id(file, &e.full_name, &e.annotations, claimed)?;
        }
        Ok(())
    }

    fn take_type_id(
        &self,
        file: &str,
        element: &str,
        annotations: &Annotations,
        claimed: &mut Vec<(i32, String)>,
    ) -> Result<Option<i32>, ProtoError> {
        let Some(value) = annotations.get(TYPE_ID_ANNOTATION).and_then(Annotation::value) else {
            return Ok(None);
        };
        let invalid = |msg: String| ProtoError::InvalidTypeId {
            file: file.to_string(),
            element: element.to_string(),
            msg,
        };
        let type_id = value
            .as_int()
            .ok_or_else(|| invalid(format!("expected an int but found {}", value.kind_name())))?;
        if type_id < 0 {
            return Err(invalid(format!("{} is negative", type_id)));
        }
        let first = self
            .type_ids
            .get(&type_id)
            .or_else(|| claimed.iter().find(|(id, _)| *id == type_id).map(|(_, owner)| owner));
        if let Some(first) = first {
            return Err(ProtoError::DuplicateTypeId {
                type_id,
                first: first.clone(),
                second: element.to_string(),
            });
        }
        claimed.push((type_id, element.to_string()));
        Ok(Some(type_id))
    }
}

fn gather_extends<'b>(messages: &'b [MessageBuilder], out: &mut Vec<&'b ExtendBuilder>) {
    for message in messages {
        out.extend(message.extends.iter());
        gather_extends(&message.messages, out);
    }
}

fn check_scalar_default(ty: ScalarType, value: &OptionValue) -> Result<(), String> {
    let valid = match (ty, value) {
        (ScalarType::Bool, OptionValue::Bool(_)) => true,
        (ScalarType::String | ScalarType::Bytes, OptionValue::String(_)) => true,
        (ScalarType::Float | ScalarType::Double, OptionValue::Float(_) | OptionValue::Int(_)) => true,
        (ScalarType::Int32 | ScalarType::SInt32 | ScalarType::SFixed32, OptionValue::Int(n)) => {
            i32::try_from(*n).is_ok()
        }
        (ScalarType::UInt32 | ScalarType::Fixed32, OptionValue::Int(n)) => u32::try_from(*n).is_ok(),
        (ScalarType::Int64 | ScalarType::SInt64 | ScalarType::SFixed64, OptionValue::Int(_)) => true,
        (ScalarType::UInt64 | ScalarType::Fixed64, OptionValue::Int(n)) => *n >= 0,
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(format!("{} is not a valid {}", value, ty.name()))
    }
}

fn read_annotations(
    processor: &AnnotationProcessor<'_>,
    file: &str,
    element: &str,
    kind: ElementKind,
    documentation: Option<&Documentation>,
) -> Result<Annotations, ProtoError> {
    processor
        .read(element, kind, documentation)
        .map_err(|source| ProtoError::Annotation {
            file: file.to_string(),
            element: element.to_string(),
            source,
        })
}

fn annotate_message(
    processor: &AnnotationProcessor<'_>,
    file: &str,
    message: &mut MessageBuilder,
) -> Result<(), ProtoError> {
    message.annotations = read_annotations(
        processor,
        file,
        &message.full_name,
        ElementKind::Message,
        message.documentation.as_ref(),
    )?;
    for field in message.all_fields_mut() {
        field.annotations = read_annotations(
            processor,
            file,
            &field.full_name,
            ElementKind::Field,
            field.documentation.as_ref(),
        )?;
    }
    for extend in &mut message.extends {
        annotate_fields(processor, file, &mut extend.fields)?;
    }
    for nested in &mut message.messages {
        annotate_message(processor, file, nested)?;
    }
    for e in &mut message.enums {
        annotate_enum(processor, file, e)?;
    }
    Ok(())
}

fn annotate_fields(
    processor: &AnnotationProcessor<'_>,
    file: &str,
    fields: &mut [FieldBuilder],
) -> Result<(), ProtoError> {
    for field in fields {
        field.annotations = read_annotations(
            processor,
            file,
            &field.full_name,
            ElementKind::Field,
            field.documentation.as_ref(),
        )?;
    }
    Ok(())
}

fn annotate_enum(processor: &AnnotationProcessor<'_>, file: &str, e: &mut EnumBuilder) -> Result<(), ProtoError> {
    e.annotations = read_annotations(processor, file, &e.full_name, ElementKind::Enum, e.documentation.as_ref())?;
    for value in &mut e.values {
        value.annotations = read_annotations(
            processor,
            file,
            &value.full_name,
            ElementKind::EnumValue,
            value.documentation.as_ref(),
        )?;
    }
    Ok(())
}

/// Orders the files so that every file comes after the files it imports.
/// Imports of files outside the batch are left for the per-file checks.
fn import_order(graph: &BTreeMap<String, Vec<String>>) -> Result<Vec<String>, ProtoError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Active,
        Done,
    }

    fn visit(
        name: &str,
        graph: &BTreeMap<String, Vec<String>>,
        marks: &mut HashMap<String, Mark>,
        order: &mut Vec<String>,
    ) -> Result<(), ProtoError> {
        marks.insert(name.to_string(), Mark::Active);
        for dep in graph.get(name).into_iter().flatten() {
            match marks.get(dep.as_str()) {
                Some(Mark::Active) => {
                    return Err(ProtoError::CyclicImport {
                        from: name.to_string(),
                        to:   dep.clone(),
                    })
                }
                Some(Mark::Done) => {}
                None if graph.contains_key(dep) => visit(dep, graph, marks, order)?,
                None => {}
            }
        }
        marks.insert(name.to_string(), Mark::Done);
        order.push(name.to_string());
        Ok(())
    }

    let mut marks = HashMap::new();
    let mut order = Vec::with_capacity(graph.len());
    for name in graph.keys() {
        if !marks.contains_key(name) {
            visit(name, graph, &mut marks, &mut order)?;
        }
    }
    Ok(order)
}
