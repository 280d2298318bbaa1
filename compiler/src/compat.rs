use crate::resolver::ResolvedSchema;
use brine_proto_schema::{
    AnnotatedDescriptor, EnumDescriptor, FileDescriptor, MessageDescriptor, ReservedNumbers, TypeDescriptor,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", rename_all = "kebab-case")]
pub enum ViolationKind {
    NumberChanged { member: String, old: i32, new: i32 },
    TypeChanged { member: String, old: String, new: String },
    RemovedNameNotReserved { member: String },
    RemovedNumberNotReserved { member: String, number: i32 },
    ReservationShrunkNames { names: BTreeSet<String> },
    ReservationShrunkNumbers { numbers: ReservedNumbers },
    TypeIdChanged { old: Option<i32>, new: Option<i32> },
}

/// One incompatibility between two versions of a message or enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub type_name: String,
    #[serde(flatten)]
    pub kind:      ViolationKind,
}

impl Violation {
    pub fn category(&self) -> &'static str {
        match self.kind {
            ViolationKind::NumberChanged { .. } => "number-changed",
            ViolationKind::TypeChanged { .. } => "type-changed",
            ViolationKind::RemovedNameNotReserved { .. } => "removed-name-not-reserved",
            ViolationKind::RemovedNumberNotReserved { .. } => "removed-number-not-reserved",
            ViolationKind::ReservationShrunkNames { .. } => "reservation-shrunk-names",
            ViolationKind::ReservationShrunkNumbers { .. } => "reservation-shrunk-numbers",
            ViolationKind::TypeIdChanged { .. } => "type-id-changed",
        }
    }
}

fn or_null(id: Option<i32>) -> String {
    id.map_or_else(|| "null".to_string(), |id| id.to_string())
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.type_name;
        match &self.kind {
            ViolationKind::NumberChanged { member, old, new } => {
                write!(f, "{}.{}: number changed from {} to {}", t, member, old, new)?
            }
            ViolationKind::TypeChanged { member, old, new } => {
                write!(f, "{}.{}: type changed from {} to {}", t, member, old, new)?
            }
            ViolationKind::RemovedNameNotReserved { member } => {
                write!(f, "{}.{}: removed without reserving its name", t, member)?
            }
            ViolationKind::RemovedNumberNotReserved { member, number } => {
                write!(f, "{}.{}: removed without reserving its number {}", t, member, number)?
            }
            ViolationKind::ReservationShrunkNames { names } => {
                let names: Vec<String> = names.iter().map(|n| format!("{:?}", n)).collect();
                write!(f, "{}: no longer reserves names {}", t, names.join(", "))?
            }
            ViolationKind::ReservationShrunkNumbers { numbers } => {
                write!(f, "{}: no longer reserves numbers {}", t, numbers)?
            }
            ViolationKind::TypeIdChanged { old, new } => write!(
                f,
                "{}: incompatible type id change from {} to {}",
                t,
                or_null(*old),
                or_null(*new)
            )?,
        }
        write!(f, " [{}]", self.category())
    }
}

/// A field or an enum value, reduced to what the rules look at.
struct Member<'a> {
    name:   &'a str,
    number: i32,
    ty:     Option<String>,
}

/// The comparable shape of a message or an enum.
struct Shape<'a> {
    members:          Vec<Member<'a>>,
    reserved_numbers: &'a ReservedNumbers,
    reserved_names:   &'a BTreeSet<String>,
    type_id:          Option<i32>,
}

impl<'a> Shape<'a> {
    fn of_message(message: &'a MessageDescriptor) -> Self {
        Shape {
            members:          message
                .all_fields()
                .map(|f| Member {
                    name:   f.name(),
                    number: f.number(),
                    ty:     Some(f.field_type().to_string()),
                })
                .collect(),
            reserved_numbers: message.reserved_numbers(),
            reserved_names:   message.reserved_names(),
            type_id:          message.type_id(),
        }
    }

    fn of_enum(e: &'a EnumDescriptor) -> Self {
        Shape {
            members:          e
                .values()
                .iter()
                .map(|v| Member {
                    name:   v.name(),
                    number: v.number(),
                    ty:     None,
                })
                .collect(),
            reserved_numbers: e.reserved_numbers(),
            reserved_names:   e.reserved_names(),
            type_id:          e.type_id(),
        }
    }

    fn member(&self, name: &str) -> Option<&Member<'a>> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Compares two versions of the same schema. Additions are always allowed;
/// every violation is reported, the check itself never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompatibilityChecker {
    /// Also apply the rules about names. Without it only changes that break
    /// the binary encoding are reported.
    pub strict: bool,
}

impl CompatibilityChecker {
    pub fn new(strict: bool) -> Self {
        CompatibilityChecker { strict }
    }

    pub fn check_files(&self, old: &FileDescriptor, new: &FileDescriptor) -> Vec<Violation> {
        let mut old_types = BTreeMap::new();
        collect_file_types(old, &mut old_types);
        let mut new_types = BTreeMap::new();
        collect_file_types(new, &mut new_types);
        self.check_types(&old_types, &new_types)
    }

    pub fn check_schemas(&self, old: &ResolvedSchema, new: &ResolvedSchema) -> Vec<Violation> {
        let by_name = |schema: &ResolvedSchema| -> BTreeMap<String, TypeDescriptor> {
            schema
                .types()
                .map(|t| (t.full_name().to_string(), t.clone()))
                .collect()
        };
        self.check_types(&by_name(old), &by_name(new))
    }

    pub fn check_files_strings(&self, old: &FileDescriptor, new: &FileDescriptor) -> Vec<String> {
        self.check_files(old, new).iter().map(Violation::to_string).collect()
    }

    pub fn check_schemas_strings(&self, old: &ResolvedSchema, new: &ResolvedSchema) -> Vec<String> {
        self.check_schemas(old, new).iter().map(Violation::to_string).collect()
    }

    pub fn check_messages(&self, old: &MessageDescriptor, new: &MessageDescriptor) -> Vec<Violation> {
        let mut out = Vec::new();
        self.compare(old.full_name(), &Shape::of_message(old), &Shape::of_message(new), &mut out);
        out
    }

    pub fn check_enums(&self, old: &EnumDescriptor, new: &EnumDescriptor) -> Vec<Violation> {
        let mut out = Vec::new();
        self.compare(old.full_name(), &Shape::of_enum(old), &Shape::of_enum(new), &mut out);
        out
    }

    fn check_types(
        &self,
        old: &BTreeMap<String, TypeDescriptor>,
        new: &BTreeMap<String, TypeDescriptor>,
    ) -> Vec<Violation> {
        let mut out = Vec::new();
        for (name, old_type) in old {
            match (old_type, new.get(name)) {
                (TypeDescriptor::Message(o), Some(TypeDescriptor::Message(n))) => {
                    self.compare(name, &Shape::of_message(o), &Shape::of_message(n), &mut out)
                }
                (TypeDescriptor::Enum(o), Some(TypeDescriptor::Enum(n))) => {
                    self.compare(name, &Shape::of_enum(o), &Shape::of_enum(n), &mut out)
                }
                _ => {}
            }
        }
        out
    }

    fn compare(&self, type_name: &str, old: &Shape<'_>, new: &Shape<'_>, out: &mut Vec<Violation>) {
        let mut push = |kind| {
            out.push(Violation {
                type_name: type_name.to_string(),
                kind,
            })
        };

        for member in &old.members {
            match new.member(member.name) {
                Some(current) => {
                    if current.number != member.number {
                        push(ViolationKind::NumberChanged {
                            member: member.name.to_string(),
                            old:    member.number,
                            new:    current.number,
                        });
                    }
                    if let (Some(old_ty), Some(new_ty)) = (&member.ty, &current.ty) {
                        if old_ty != new_ty {
                            push(ViolationKind::TypeChanged {
                                member: member.name.to_string(),
                                old:    old_ty.clone(),
                                new:    new_ty.clone(),
                            });
                        }
                    }
                }
                None => {
                    if self.strict && !new.reserved_names.contains(member.name) {
                        push(ViolationKind::RemovedNameNotReserved {
                            member: member.name.to_string(),
                        });
                    }
                    if !new.reserved_numbers.contains(member.number) {
                        push(ViolationKind::RemovedNumberNotReserved {
                            member: member.name.to_string(),
                            number: member.number,
                        });
                    }
                }
            }
        }

        if self.strict {
            let names: BTreeSet<String> = old
                .reserved_names
                .difference(new.reserved_names)
                .cloned()
                .collect();
            if !names.is_empty() {
                push(ViolationKind::ReservationShrunkNames { names });
            }
        }
        let numbers = old.reserved_numbers.difference(new.reserved_numbers);
        if !numbers.is_empty() {
            push(ViolationKind::ReservationShrunkNumbers { numbers });
        }
        if old.type_id != new.type_id {
            push(ViolationKind::TypeIdChanged {
                old: old.type_id,
                new: new.type_id,
            });
        }
    }
}

fn collect_file_types(file: &FileDescriptor, out: &mut BTreeMap<String, TypeDescriptor>) {
    fn message(m: &std::sync::Arc<MessageDescriptor>, out: &mut BTreeMap<String, TypeDescriptor>) {
        out.insert(m.full_name().to_string(), TypeDescriptor::Message(m.clone()));
        for nested in m.messages() {
            message(nested, out);
        }
        for e in m.enums() {
            out.insert(e.full_name().to_string(), TypeDescriptor::Enum(e.clone()));
        }
    }
    for m in file.messages() {
        message(m, out);
    }
    for e in file.enums() {
        out.insert(e.full_name().to_string(), TypeDescriptor::Enum(e.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brine_proto_schema::{
        EnumBuilder, EnumValueBuilder, FieldBuilder, FileBuilder, Label, Location, MessageBuilder,
    };

    fn file(build: impl FnOnce(&mut FileBuilder)) -> FileDescriptor {
        let mut f = FileBuilder::new("a.proto");
        f.package = "pkg".to_string();
        build(&mut f);
        f.assign_full_names();
        f.validate().unwrap();
        f.build(None).unwrap()
    }

    fn field(name: &str, number: i32, ty: &str) -> FieldBuilder {
        FieldBuilder::new(name, number, Label::Optional, ty, Location::default())
    }

    fn scenario_d() -> (FileDescriptor, FileDescriptor) {
        let old = file(|f| {
            let mut m = MessageBuilder::new("M", Location::default());
            m.fields.push(field("f1", 1, "int32"));
            m.fields.push(field("f2", 2, "bool"));
            m.reserved_numbers.insert_range(6, 7);
            m.reserved_names.insert("f6".to_string());
            f.messages.push(m);
        });
        let new = file(|f| {
            let mut m = MessageBuilder::new("M", Location::default());
            m.fields.push(field("f1", 8, "int32"));
            f.messages.push(m);
        });
        (old, new)
    }

    #[test]
    fn test_scenario_d_strict() {
        let (old, new) = scenario_d();
        let violations = CompatibilityChecker::new(true).check_files(&old, &new);
        let categories: Vec<_> = violations.iter().map(Violation::category).collect();
        assert_eq!(
            categories,
            vec![
                "number-changed",
                "removed-name-not-reserved",
                "removed-number-not-reserved",
                "reservation-shrunk-names",
                "reservation-shrunk-numbers",
            ]
        );
        assert_eq!(
            violations[2].kind,
            ViolationKind::RemovedNumberNotReserved {
                member: "f2".into(),
                number: 2
            }
        );
        assert_eq!(
            violations[4].to_string(),
            "pkg.M: no longer reserves numbers 6 to 7 [reservation-shrunk-numbers]"
        );
    }

    #[test]
    fn test_lenient_skips_name_rules() {
        let (old, new) = scenario_d();
        let violations = CompatibilityChecker::new(false).check_files_strings(&old, &new);
        assert_eq!(violations.len(), 3);
        assert!(violations[0].starts_with("pkg.M.f1: number changed from 1 to 8"));
    }

    #[test]
    fn test_reserving_removed_field_is_compatible() {
        let old = file(|f| {
            let mut m = MessageBuilder::new("M", Location::default());
            m.fields.push(field("a", 1, "string"));
            f.messages.push(m);
        });
        let new = file(|f| {
            let mut m = MessageBuilder::new("M", Location::default());
            m.reserved_numbers.insert(1);
            m.reserved_names.insert("a".to_string());
            m.fields.push(field("b", 2, "string"));
            f.messages.push(m);
        });
        assert!(CompatibilityChecker::new(true).check_files(&old, &new).is_empty());
    }

    #[test]
    fn test_type_and_type_id_changes() {
        let old = file(|f| {
            let mut m = MessageBuilder::new("M", Location::default());
            m.fields.push(field("a", 1, "int32"));
            m.type_id = Some(3);
            f.messages.push(m);
        });
        let new = file(|f| {
            let mut m = MessageBuilder::new("M", Location::default());
            m.fields.push(field("a", 1, "string"));
            f.messages.push(m);
        });
        let violations = CompatibilityChecker::new(false).check_files(&old, &new);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].category(), "type-changed");
        assert_eq!(
            violations[1].to_string(),
            "pkg.M: incompatible type id change from 3 to null [type-id-changed]"
        );
    }

    #[test]
    fn test_enums_and_nested_types() {
        let enum_with = |values: &[(&str, i32)]| {
            let mut e = EnumBuilder::new("Color", Location::default());
            for (name, number) in values {
                e.values.push(EnumValueBuilder::new(*name, *number, Location::default()));
            }
            e
        };
        let old = file(|f| {
            let mut m = MessageBuilder::new("Outer", Location::default());
            m.enums.push(enum_with(&[("RED", 0), ("BLUE", 1)]));
            f.messages.push(m);
        });
        let new = file(|f| {
            let mut m = MessageBuilder::new("Outer", Location::default());
            m.enums.push(enum_with(&[("RED", 0), ("BLUE", 2), ("GREEN", 3)]));
            f.messages.push(m);
        });
        let violations = CompatibilityChecker::new(true).check_files(&old, &new);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].type_name, "pkg.Outer.Color");
        assert_eq!(
            violations[0].kind,
            ViolationKind::NumberChanged {
                member: "BLUE".into(),
                old:    1,
                new:    2
            }
        );
    }
}
