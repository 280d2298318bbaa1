use serde::Serialize;
use std::fmt;

/// Name of the attribute populated by the shorthand forms `@X(value)`.
pub const DEFAULT_ATTRIBUTE: &str = "value";

/// A line/column pair packed into one ordered integer: the line lives in the
/// high 32 bits and the column in the low 32 bits, so positions compare in
/// source order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Pos(u64);

impl Pos {
    pub const fn new(line: u32, column: u32) -> Self {
        Pos(((line as u64) << 32) | column as u64)
    }

    pub const fn line(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn column(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line(), self.column())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Bool(bool),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Null,
}

/// The value of an annotation attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Literal(Literal),
    /// A possibly dotted identifier such as `INDEXED` or `org.example.Kind`.
    Identifier(String),
    Array(Vec<Value>),
    Annotation(Box<Annotation>),
}

impl Value {
    pub fn bool(value: bool) -> Self {
        Value::Literal(Literal::Bool(value))
    }

    pub fn int(value: i32) -> Self {
        Value::Literal(Literal::Int(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::Literal(Literal::String(value.into()))
    }

    pub fn identifier(value: impl Into<String>) -> Self {
        Value::Identifier(value.into())
    }

    /// A short name of the value's shape, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Literal(Literal::Bool(_)) => "boolean",
            Value::Literal(Literal::Char(_)) => "character",
            Value::Literal(Literal::Int(_)) => "int",
            Value::Literal(Literal::Long(_)) => "long",
            Value::Literal(Literal::Float(_)) => "float",
            Value::Literal(Literal::Double(_)) => "double",
            Value::Literal(Literal::String(_)) => "string",
            Value::Literal(Literal::Null) => "null",
            Value::Identifier(_) => "identifier",
            Value::Array(_) => "array",
            Value::Annotation(_) => "annotation",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Literal(Literal::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Literal(Literal::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Literal(Literal::Int(n)) => Some(*n as i64),
            Value::Literal(Literal::Long(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Literal(Literal::Float(n)) => Some(*n as f64),
            Value::Literal(Literal::Double(n)) => Some(*n),
            _ => None,
        }
    }

    /// The text of a string literal or an identifier.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Literal(Literal::String(s)) | Value::Identifier(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&Annotation> {
        match self {
            Value::Annotation(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(Literal::Bool(b)) => write!(f, "{}", b),
            Value::Literal(Literal::Char(c)) => write!(f, "{:?}", c),
            Value::Literal(Literal::Int(n)) => write!(f, "{}", n),
            Value::Literal(Literal::Long(n)) => write!(f, "{}L", n),
            Value::Literal(Literal::Float(n)) => write!(f, "{}f", n),
            Value::Literal(Literal::Double(n)) => write!(f, "{:?}", n),
            Value::Literal(Literal::String(s)) => write!(f, "{:?}", s),
            Value::Literal(Literal::Null) => f.write_str("null"),
            Value::Identifier(id) => f.write_str(id),
            Value::Array(values) => {
                f.write_str("{")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("}")
            }
            Value::Annotation(a) => write!(f, "{}", a),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name:  String,
    pub pos:   Pos,
    pub value: Value,
}

/// One `@Name(...)` occurrence. Attribute names are unique and kept in
/// source order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub name:       String,
    pub pos:        Pos,
    pub attributes: Vec<Attribute>,
}

impl Annotation {
    pub fn new(name: impl Into<String>, pos: Pos) -> Self {
        Annotation {
            name: name.into(),
            pos,
            attributes: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Value of the attribute named `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attribute(name).map(|a| &a.value)
    }

    /// Value of the default attribute.
    pub fn value(&self) -> Option<&Value> {
        self.get(DEFAULT_ATTRIBUTE)
    }

    /// Sets an attribute, replacing any previous value of the same name.
    pub fn set(&mut self, name: impl Into<String>, pos: Pos, value: Value) {
        let name = name.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { name, pos, value }),
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if self.attributes.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, a) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", a.name, a.value)?;
        }
        f.write_str(")")
    }
}

/// The annotations of one documented element, keyed by name in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Annotations(Vec<Annotation>);

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Annotation> {
        self.0.iter().find(|a| a.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Annotation> {
        self.0.iter_mut().find(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Inserts an annotation, replacing one with the same name in place.
    pub fn insert(&mut self, annotation: Annotation) {
        match self.get_mut(&annotation.name) {
            Some(existing) => *existing = annotation,
            None => self.0.push(annotation),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|a| a.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Annotation> for Annotations {
    fn from_iter<T: IntoIterator<Item = Annotation>>(iter: T) -> Self {
        let mut out = Annotations::new();
        for a in iter {
            out.insert(a);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_orders_by_line_then_column() {
        let a = Pos::new(1, 80);
        let b = Pos::new(2, 1);
        assert!(a < b);
        assert_eq!(b.line(), 2);
        assert_eq!(b.column(), 1);
        assert_eq!(a.to_string(), "line 1, column 80");
    }

    #[test]
    fn test_display_annotation() {
        let mut a = Annotation::new("Foo", Pos::new(1, 1));
        a.set("x", Pos::new(1, 6), Value::int(1));
        a.set(
            "y",
            Pos::new(1, 11),
            Value::Array(vec![Value::bool(true), Value::bool(false)]),
        );
        assert_eq!(a.to_string(), "@Foo(x=1, y={true, false})");
        assert_eq!(a.get("x").and_then(Value::as_int), Some(1));
    }

    #[test]
    fn test_annotations_keep_insertion_order() {
        let set: Annotations = ["B", "A", "C"]
            .into_iter()
            .map(|n| Annotation::new(n, Pos::default()))
            .collect();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["B", "A", "C"]);
    }
}
