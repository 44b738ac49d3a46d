//! Wire encoder.
//!
//! All fixed-width integers are written big-endian. Strings and blobs are
//! length-prefixed with a 4-byte count; so are arrays and containers.

use bytes::BufMut;
use uuid::Uuid;

use crate::value::{Container, ScalarArray, Value};

/// Append-only encoder over a growable byte buffer.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Consume the encoder, returning the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.put_i8(v);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.put_i16(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.put_f32(v);
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.put_f64(v);
    }

    pub fn write_flag(&mut self, v: bool) {
        self.buf.put_u8(u8::from(v));
    }

    pub fn write_uuid(&mut self, v: &Uuid) {
        self.buf.put_slice(v.as_bytes());
    }

    /// Length-prefixed UTF-8 string.
    pub fn write_string(&mut self, v: &str) {
        self.buf.put_i32(v.len() as i32);
        self.buf.put_slice(v.as_bytes());
    }

    /// Length-prefixed raw bytes.
    pub fn write_blob(&mut self, v: &[u8]) {
        self.buf.put_i32(v.len() as i32);
        self.buf.put_slice(v);
    }

    /// Tagged value: 1-byte type tag followed by the type-specific body.
    pub fn write_value(&mut self, value: &Value) {
        self.write_u8(value.type_tag());
        self.write_value_body(value);
    }

    /// Container body: 4-byte tag count, then (tag name, tagged value) pairs.
    pub fn write_container(&mut self, container: &Container) {
        self.write_i32(container.len() as i32);
        for (name, value) in container.iter() {
            self.write_string(name);
            self.write_value(value);
        }
    }

    fn write_value_body(&mut self, value: &Value) {
        match value {
            Value::Flag(v) => self.write_flag(*v),
            Value::Byte(v) => self.write_i8(*v),
            Value::Short(v) => self.write_i16(*v),
            Value::Integer(v) => self.write_i32(*v),
            Value::Long(v) => self.write_i64(*v),
            Value::Float(v) => self.write_f32(*v),
            Value::Double(v) => self.write_f64(*v),
            Value::String(v) => self.write_string(v),
            Value::Uuid(v) => self.write_uuid(v),
            Value::Blob(v) => self.write_blob(v),
            Value::Null => {}
            Value::Array(array) => self.write_scalar_array(array),
            Value::Container(container) => self.write_container(container),
            Value::ContainerArray(containers) => {
                self.write_i32(containers.len() as i32);
                for container in containers {
                    self.write_container(container);
                }
            }
        }
    }

    /// Array body: 4-byte element count, then concatenated element bodies.
    /// The element kind is carried by the enclosing value's type tag.
    fn write_scalar_array(&mut self, array: &ScalarArray) {
        self.write_i32(array.len() as i32);
        match array {
            ScalarArray::Flag(v) => v.iter().for_each(|e| self.write_flag(*e)),
            ScalarArray::Byte(v) => v.iter().for_each(|e| self.write_i8(*e)),
            ScalarArray::Short(v) => v.iter().for_each(|e| self.write_i16(*e)),
            ScalarArray::Integer(v) => v.iter().for_each(|e| self.write_i32(*e)),
            ScalarArray::Long(v) => v.iter().for_each(|e| self.write_i64(*e)),
            ScalarArray::Float(v) => v.iter().for_each(|e| self.write_f32(*e)),
            ScalarArray::Double(v) => v.iter().for_each(|e| self.write_f64(*e)),
            ScalarArray::String(v) => v.iter().for_each(|e| self.write_string(e)),
            ScalarArray::Uuid(v) => v.iter().for_each(|e| self.write_uuid(e)),
            ScalarArray::Blob(v) => v.iter().for_each(|e| self.write_blob(e)),
            ScalarArray::Null(_) => {}
        }
    }
}
