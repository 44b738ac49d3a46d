//! Wire decoder.
//!
//! [`Decoder`] is a checked cursor over an encoded byte slice. Every value
//! kind supports both `read` and `skip`; `skip` advances the cursor by
//! exactly the encoded size without materializing the value, which is what
//! makes selective container decoding cheap.

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::{DecodeError, Result};
use crate::value::{tag, Container, ScalarArray, Value};

/// Checked cursor over encoded bytes.
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor position in bytes.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to decode.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEof {
                position: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let bytes = self.take(2)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(raw))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_i32()? as u32))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_i64()? as u64))
    }

    pub fn read_flag(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_uuid(&mut self) -> Result<Uuid> {
        let bytes = self.take(16)?;
        let mut raw = [0u8; 16];
        raw.copy_from_slice(bytes);
        Ok(Uuid::from_bytes(raw))
    }

    /// 4-byte count prefix; negative counts are malformed.
    pub fn read_length(&mut self) -> Result<usize> {
        let position = self.pos;
        let length = self.read_i32()?;
        if length < 0 {
            return Err(DecodeError::InvalidLength { position, length });
        }
        Ok(length as usize)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let length = self.read_length()?;
        let position = self.pos;
        let bytes = self.take(length)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| DecodeError::InvalidUtf8 { position })
    }

    pub fn read_blob(&mut self) -> Result<Vec<u8>> {
        let length = self.read_length()?;
        Ok(self.take(length)?.to_vec())
    }

    /// Skip a length-prefixed string or blob without decoding it.
    pub fn skip_string(&mut self) -> Result<usize> {
        let start = self.pos;
        let length = self.read_length()?;
        self.take(length)?;
        Ok(self.pos - start)
    }

    /// Read a tagged value: 1-byte type tag plus type-specific body.
    pub fn read_value(&mut self) -> Result<Value> {
        let type_tag = self.read_u8()?;
        self.read_value_body(type_tag)
    }

    /// Skip a tagged value, returning the number of bytes consumed.
    ///
    /// Consumes exactly as many bytes as [`Decoder::read_value`] would.
    pub fn skip_value(&mut self) -> Result<usize> {
        let start = self.pos;
        let type_tag = self.read_u8()?;
        self.skip_value_body(type_tag)?;
        Ok(self.pos - start)
    }

    fn read_value_body(&mut self, type_tag: u8) -> Result<Value> {
        if type_tag & tag::VECTOR != 0 {
            return self.read_array_body(type_tag & !tag::VECTOR);
        }
        match type_tag {
            tag::FLAG => Ok(Value::Flag(self.read_flag()?)),
            tag::BYTE => Ok(Value::Byte(self.read_i8()?)),
            tag::SHORT => Ok(Value::Short(self.read_i16()?)),
            tag::INTEGER => Ok(Value::Integer(self.read_i32()?)),
            tag::LONG => Ok(Value::Long(self.read_i64()?)),
            tag::FLOAT => Ok(Value::Float(self.read_f32()?)),
            tag::DOUBLE => Ok(Value::Double(self.read_f64()?)),
            tag::STRING => Ok(Value::String(self.read_string()?)),
            tag::UUID => Ok(Value::Uuid(self.read_uuid()?)),
            tag::BLOB => Ok(Value::Blob(self.read_blob()?)),
            tag::NULL => Ok(Value::Null),
            tag::CONTAINER => Ok(Value::Container(
                ContainerReader::read_all_tags().read(self)?,
            )),
            _ => Err(DecodeError::UnknownTag {
                position: self.pos - 1,
                tag: type_tag,
            }),
        }
    }

    fn read_array_body(&mut self, element_tag: u8) -> Result<Value> {
        let count = self.read_length()?;
        if element_tag == tag::CONTAINER {
            let reader = ContainerReader::read_all_tags();
            let mut containers = Vec::with_capacity(count);
            for _ in 0..count {
                containers.push(reader.read(self)?);
            }
            return Ok(Value::ContainerArray(containers));
        }
        let array = match element_tag {
            tag::FLAG => ScalarArray::Flag(self.read_elements(count, Self::read_flag)?),
            tag::BYTE => ScalarArray::Byte(self.read_elements(count, Self::read_i8)?),
            tag::SHORT => ScalarArray::Short(self.read_elements(count, Self::read_i16)?),
            tag::INTEGER => ScalarArray::Integer(self.read_elements(count, Self::read_i32)?),
            tag::LONG => ScalarArray::Long(self.read_elements(count, Self::read_i64)?),
            tag::FLOAT => ScalarArray::Float(self.read_elements(count, Self::read_f32)?),
            tag::DOUBLE => ScalarArray::Double(self.read_elements(count, Self::read_f64)?),
            tag::STRING => ScalarArray::String(self.read_elements(count, Self::read_string)?),
            tag::UUID => ScalarArray::Uuid(self.read_elements(count, Self::read_uuid)?),
            tag::BLOB => ScalarArray::Blob(self.read_elements(count, Self::read_blob)?),
            tag::NULL => ScalarArray::Null(count as u32),
            _ => {
                return Err(DecodeError::UnknownTag {
                    position: self.pos - 5,
                    tag: tag::VECTOR | element_tag,
                })
            }
        };
        Ok(Value::Array(array))
    }

    fn read_elements<T>(
        &mut self,
        count: usize,
        read: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut elements = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            elements.push(read(self)?);
        }
        Ok(elements)
    }

    fn skip_value_body(&mut self, type_tag: u8) -> Result<()> {
        if type_tag & tag::VECTOR != 0 {
            return self.skip_array_body(type_tag & !tag::VECTOR);
        }
        match type_tag {
            tag::NULL => Ok(()),
            tag::STRING | tag::BLOB => self.skip_string().map(|_| ()),
            tag::CONTAINER => ContainerReader::read_all_tags().skip(self).map(|_| ()),
            _ => match scalar_width(type_tag) {
                Some(width) => self.take(width).map(|_| ()),
                None => Err(DecodeError::UnknownTag {
                    position: self.pos - 1,
                    tag: type_tag,
                }),
            },
        }
    }

    fn skip_array_body(&mut self, element_tag: u8) -> Result<()> {
        let count = self.read_length()?;
        match element_tag {
            tag::NULL => Ok(()),
            tag::STRING | tag::BLOB => {
                for _ in 0..count {
                    self.skip_string()?;
                }
                Ok(())
            }
            tag::CONTAINER => {
                let reader = ContainerReader::read_all_tags();
                for _ in 0..count {
                    reader.skip(self)?;
                }
                Ok(())
            }
            _ => match scalar_width(element_tag) {
                Some(width) => self.take(count * width).map(|_| ()),
                None => Err(DecodeError::UnknownTag {
                    position: self.pos - 5,
                    tag: tag::VECTOR | element_tag,
                }),
            },
        }
    }
}

/// Fixed body width for fixed-width scalar kinds.
fn scalar_width(type_tag: u8) -> Option<usize> {
    match type_tag {
        tag::FLAG | tag::BYTE => Some(1),
        tag::SHORT => Some(2),
        tag::INTEGER | tag::FLOAT => Some(4),
        tag::LONG | tag::DOUBLE => Some(8),
        tag::UUID => Some(16),
        _ => None,
    }
}

/// Container reader with optional selective-tag materialization.
///
/// In selective mode only tags whose name is in the configured set are
/// decoded into the resulting [`Container`]; all other tags are skipped
/// without allocation, whatever their content.
#[derive(Debug, Clone, Default)]
pub struct ContainerReader {
    tags: Option<HashSet<String>>,
}

impl ContainerReader {
    /// Materialize every tag.
    pub fn read_all_tags() -> Self {
        Self { tags: None }
    }

    /// Materialize only tags named in `tags`.
    pub fn read_tags(tags: HashSet<String>) -> Self {
        Self { tags: Some(tags) }
    }

    fn wants(&self, name: &str) -> bool {
        match &self.tags {
            Some(tags) => tags.contains(name),
            None => true,
        }
    }

    /// Read a container body: 4-byte tag count, then (name, value) pairs.
    pub fn read(&self, decoder: &mut Decoder<'_>) -> Result<Container> {
        let count = decoder.read_length()?;
        let mut container = Container::new();
        for _ in 0..count {
            let name = decoder.read_string()?;
            if self.wants(&name) {
                let value = decoder.read_value()?;
                container.insert(name, value);
            } else {
                decoder.skip_value()?;
            }
        }
        Ok(container)
    }

    /// Skip a container body, returning the number of bytes consumed.
    pub fn skip(&self, decoder: &mut Decoder<'_>) -> Result<usize> {
        let start = decoder.position();
        let count = decoder.read_length()?;
        for _ in 0..count {
            decoder.skip_string()?;
            decoder.skip_value()?;
        }
        Ok(decoder.position() - start)
    }
}
