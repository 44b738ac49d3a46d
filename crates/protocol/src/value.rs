//! Value and container types.
//!
//! A [`Value`] is a tagged union over the scalar and composite kinds the
//! wire protocol understands. Values are immutable once constructed;
//! arrays own their elements.

use uuid::Uuid;

/// Wire type tags. The high bit marks a homogeneous array of the scalar
/// kind in the low bits.
pub(crate) mod tag {
    pub const CONTAINER: u8 = 0x01;
    pub const BYTE: u8 = 0x02;
    pub const SHORT: u8 = 0x03;
    pub const INTEGER: u8 = 0x04;
    pub const LONG: u8 = 0x05;
    pub const FLAG: u8 = 0x06;
    pub const FLOAT: u8 = 0x07;
    pub const DOUBLE: u8 = 0x08;
    pub const STRING: u8 = 0x09;
    pub const UUID: u8 = 0x0a;
    pub const NULL: u8 = 0x0b;
    pub const BLOB: u8 = 0x0c;

    pub const VECTOR: u8 = 0x80;
}

/// A single datum in an event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean flag
    Flag(bool),

    /// 8-bit signed integer
    Byte(i8),

    /// 16-bit signed integer
    Short(i16),

    /// 32-bit signed integer
    Integer(i32),

    /// 64-bit signed integer
    Long(i64),

    /// 32-bit IEEE float
    Float(f32),

    /// 64-bit IEEE float
    Double(f64),

    /// UTF-8 string
    String(String),

    /// Time-ordered or random UUID
    Uuid(Uuid),

    /// Opaque byte blob
    Blob(Vec<u8>),

    /// Null value
    Null,

    /// Homogeneous array of scalars (no per-element tag on the wire)
    Array(ScalarArray),

    /// Nested container
    Container(Container),

    /// Array of containers
    ContainerArray(Vec<Container>),
}

impl Value {
    /// Wire type tag for this value.
    pub(crate) fn type_tag(&self) -> u8 {
        match self {
            Value::Container(_) => tag::CONTAINER,
            Value::Byte(_) => tag::BYTE,
            Value::Short(_) => tag::SHORT,
            Value::Integer(_) => tag::INTEGER,
            Value::Long(_) => tag::LONG,
            Value::Flag(_) => tag::FLAG,
            Value::Float(_) => tag::FLOAT,
            Value::Double(_) => tag::DOUBLE,
            Value::String(_) => tag::STRING,
            Value::Uuid(_) => tag::UUID,
            Value::Null => tag::NULL,
            Value::Blob(_) => tag::BLOB,
            Value::Array(a) => tag::VECTOR | a.element_tag(),
            Value::ContainerArray(_) => tag::VECTOR | tag::CONTAINER,
        }
    }

    /// Try to get this value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a nested container.
    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Container(c) => Some(c),
            _ => None,
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Homogeneous array of scalar values.
///
/// The element kind is carried by the array's type tag, so element bodies
/// are concatenated on the wire without per-element tags.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarArray {
    Flag(Vec<bool>),
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Integer(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
    Uuid(Vec<Uuid>),
    Blob(Vec<Vec<u8>>),
    /// An array of nulls is just a count; null bodies are empty.
    Null(u32),
}

impl ScalarArray {
    pub(crate) fn element_tag(&self) -> u8 {
        match self {
            ScalarArray::Flag(_) => tag::FLAG,
            ScalarArray::Byte(_) => tag::BYTE,
            ScalarArray::Short(_) => tag::SHORT,
            ScalarArray::Integer(_) => tag::INTEGER,
            ScalarArray::Long(_) => tag::LONG,
            ScalarArray::Float(_) => tag::FLOAT,
            ScalarArray::Double(_) => tag::DOUBLE,
            ScalarArray::String(_) => tag::STRING,
            ScalarArray::Uuid(_) => tag::UUID,
            ScalarArray::Blob(_) => tag::BLOB,
            ScalarArray::Null(_) => tag::NULL,
        }
    }

    /// Number of elements in the array.
    pub fn len(&self) -> usize {
        match self {
            ScalarArray::Flag(v) => v.len(),
            ScalarArray::Byte(v) => v.len(),
            ScalarArray::Short(v) => v.len(),
            ScalarArray::Integer(v) => v.len(),
            ScalarArray::Long(v) => v.len(),
            ScalarArray::Float(v) => v.len(),
            ScalarArray::Double(v) => v.len(),
            ScalarArray::String(v) => v.len(),
            ScalarArray::Uuid(v) => v.len(),
            ScalarArray::Blob(v) => v.len(),
            ScalarArray::Null(n) => *n as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered-insertion mapping from tag name to [`Value`].
///
/// Tag names are unique; inserting an existing name replaces its value in
/// place. Iteration yields tags in insertion (and wire) order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Container {
    tags: Vec<(String, Value)>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag, replacing any existing value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.tags.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.tags.push((name, value)),
        }
    }

    /// Look up a tag by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.tags
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterate tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.tags.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for Container {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut container = Container::new();
        for (name, value) in iter {
            container.insert(name, value);
        }
        container
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_preserves_insertion_order() {
        let mut c = Container::new();
        c.insert("zeta", Value::Integer(1));
        c.insert("alpha", Value::Integer(2));
        c.insert("mid", Value::Integer(3));

        let names: Vec<&str> = c.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn container_insert_replaces_existing_tag() {
        let mut c = Container::new();
        c.insert("host", Value::String("a".to_string()));
        c.insert("host", Value::String("b".to_string()));

        assert_eq!(c.len(), 1);
        assert_eq!(c.get("host"), Some(&Value::String("b".to_string())));
    }

    #[test]
    fn array_tag_carries_element_kind() {
        let v = Value::Array(ScalarArray::Long(vec![1, 2, 3]));
        assert_eq!(v.type_tag(), tag::VECTOR | tag::LONG);
    }
}
