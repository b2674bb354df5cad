//! Class file decoding.
//!
//! Decoding checks the byte layout only. Cross references between constants
//! and the bytecode itself are checked by the loader's verifier.

use super::{ClassFile, ClassFileError, FieldInfo, InnerClassInfo, MAGIC, MAJOR_VERSION, MethodInfo};
use crate::bytecode::{Constant, ConstantPool};

/// Big-endian cursor over a byte slice.
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ClassFileError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(ClassFileError::Truncated { offset: self.pos })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ClassFileError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, ClassFileError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, ClassFileError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, ClassFileError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, ClassFileError> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

impl ClassFile {
    /// Decode a class file.
    pub fn parse(bytes: &[u8]) -> Result<ClassFile, ClassFileError> {
        let mut r = ByteReader::new(bytes);

        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }
        let major = r.u16()?;
        let minor = r.u16()?;
        if major != MAJOR_VERSION {
            return Err(ClassFileError::UnsupportedVersion { major, minor });
        }

        let count = r.u16()?;
        if count as usize > ConstantPool::MAX_ENTRIES {
            return Err(ClassFileError::TooMany {
                what: "constant",
                count: count as usize,
            });
        }
        let mut entries = Vec::with_capacity(count as usize);
        for i in 0..count {
            let offset = r.pos;
            let constant = match r.u8()? {
                1 => {
                    let len = r.u16()? as usize;
                    let raw = r.take(len)?;
                    let text = std::str::from_utf8(raw)
                        .map_err(|_| ClassFileError::InvalidUtf8 { index: i + 1 })?;
                    Constant::Utf8(text.to_string())
                }
                2 => Constant::Int(r.i32()?),
                3 => Constant::Long(r.i64()?),
                4 => Constant::Double(f64::from_bits(r.i64()? as u64)),
                5 => Constant::String(r.u16()?),
                6 => Constant::Class(r.u16()?),
                7 => Constant::FieldRef {
                    class: r.u16()?,
                    name: r.u16()?,
                    descriptor: r.u16()?,
                },
                8 => Constant::MethodRef {
                    class: r.u16()?,
                    name: r.u16()?,
                    descriptor: r.u16()?,
                },
                tag => return Err(ClassFileError::UnknownConstantTag { tag, offset }),
            };
            entries.push(constant);
        }

        let access = r.u16()?;
        let this_class = r.u16()?;
        let super_class = r.u16()?;

        let inner_count = r.u16()?;
        let mut inner_classes = Vec::with_capacity(inner_count as usize);
        for _ in 0..inner_count {
            inner_classes.push(InnerClassInfo {
                inner_class: r.u16()?,
                outer_class: r.u16()?,
                simple_name: r.u16()?,
                access: r.u16()?,
            });
        }

        let field_count = r.u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(FieldInfo {
                access: r.u16()?,
                name: r.u16()?,
                descriptor: r.u16()?,
            });
        }

        let method_count = r.u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            let access = r.u16()?;
            let name = r.u16()?;
            let descriptor = r.u16()?;
            let max_locals = r.u16()?;
            let code_len = r.u32()? as usize;
            let code = r.take(code_len)?.to_vec();
            methods.push(MethodInfo {
                access,
                name,
                descriptor,
                max_locals,
                code,
            });
        }

        if r.remaining() > 0 {
            return Err(ClassFileError::TrailingBytes(r.remaining()));
        }

        Ok(ClassFile {
            major,
            minor,
            constants: ConstantPool::from_entries(entries),
            access,
            this_class,
            super_class,
            inner_classes,
            fields,
            methods,
        })
    }
}
