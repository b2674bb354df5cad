//! Class file encoding.

use super::{ClassFile, ClassFileError, MAGIC};
use crate::bytecode::Constant;

/// Big-endian byte sink.
#[derive(Debug, Default)]
struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    fn u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    fn bytes(&mut self, value: &[u8]) {
        self.bytes.extend_from_slice(value);
    }

    /// Write a table count or text length that must fit a `u16` field.
    fn count(&mut self, what: &'static str, count: usize) -> Result<(), ClassFileError> {
        let value = u16::try_from(count).map_err(|_| ClassFileError::TooMany { what, count })?;
        self.u16(value);
        Ok(())
    }
}

impl ClassFile {
    /// Encode to the binary class file format.
    ///
    /// Fails when a table count, text length or code length does not fit
    /// its field.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ClassFileError> {
        let mut w = ByteWriter::default();
        w.u32(MAGIC);
        w.u16(self.major);
        w.u16(self.minor);

        w.count("constant", self.constants.len())?;
        for constant in self.constants.constants() {
            w.u8(constant.tag());
            match constant {
                Constant::Utf8(text) => {
                    w.count("utf8 byte", text.len())?;
                    w.bytes(text.as_bytes());
                }
                Constant::Int(v) => w.bytes(&v.to_be_bytes()),
                Constant::Long(v) => w.bytes(&v.to_be_bytes()),
                Constant::Double(v) => w.bytes(&v.to_bits().to_be_bytes()),
                Constant::String(i) | Constant::Class(i) => w.u16(*i),
                Constant::FieldRef {
                    class,
                    name,
                    descriptor,
                }
                | Constant::MethodRef {
                    class,
                    name,
                    descriptor,
                } => {
                    w.u16(*class);
                    w.u16(*name);
                    w.u16(*descriptor);
                }
            }
        }

        w.u16(self.access);
        w.u16(self.this_class);
        w.u16(self.super_class);

        w.count("inner class", self.inner_classes.len())?;
        for inner in &self.inner_classes {
            w.u16(inner.inner_class);
            w.u16(inner.outer_class);
            w.u16(inner.simple_name);
            w.u16(inner.access);
        }

        w.count("field", self.fields.len())?;
        for field in &self.fields {
            w.u16(field.access);
            w.u16(field.name);
            w.u16(field.descriptor);
        }

        w.count("method", self.methods.len())?;
        for method in &self.methods {
            w.u16(method.access);
            w.u16(method.name);
            w.u16(method.descriptor);
            w.u16(method.max_locals);
            let count = method.code.len();
            w.u32(u32::try_from(count).map_err(|_| ClassFileError::TooMany { what: "code byte", count })?);
            w.bytes(&method.code);
        }

        Ok(w.bytes)
    }
}
