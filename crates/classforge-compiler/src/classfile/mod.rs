//! Binary class file format.
//!
//! ```text
//! u32 magic = 0xC1A5_F0A6
//! u16 major, u16 minor
//! u16 constant_count, entries (u8 tag + payload)
//! u16 access, u16 this_class, u16 super_class
//! u16 inner_count   (inner, outer, simple name, access)
//! u16 field_count   (access, name, descriptor)
//! u16 method_count  (access, name, descriptor, max_locals, u32 code_len, code)
//! ```
//!
//! All integers are big-endian. Constant indices are 1-based.

mod reader;
mod writer;

use thiserror::Error;

use crate::bytecode::ConstantPool;

/// File signature.
pub const MAGIC: u32 = 0xC1A5_F0A6;
/// Format major version written by this crate.
pub const MAJOR_VERSION: u16 = 1;
/// Format minor version written by this crate.
pub const MINOR_VERSION: u16 = 0;

/// A decoded or about-to-be-encoded class file.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub major: u16,
    pub minor: u16,
    pub constants: ConstantPool,
    /// `Modifiers` bits of the class.
    pub access: u16,
    /// Class entry of this class.
    pub this_class: u16,
    /// Class entry of the superclass, 0 for the root class.
    pub super_class: u16,
    /// Nesting records for this class and its direct nested classes.
    pub inner_classes: Vec<InnerClassInfo>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
}

/// One nesting relation: `inner_class` is declared inside `outer_class`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerClassInfo {
    /// Class entry of the nested class.
    pub inner_class: u16,
    /// Class entry of the enclosing class.
    pub outer_class: u16,
    /// Utf8 entry of the nested class simple name.
    pub simple_name: u16,
    /// `Modifiers` bits of the nested class.
    pub access: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub access: u16,
    pub name: u16,
    pub descriptor: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub access: u16,
    pub name: u16,
    pub descriptor: u16,
    /// Local slots needed, including the receiver and parameters.
    pub max_locals: u16,
    pub code: Vec<u8>,
}

impl ClassFile {
    /// Empty class file with a fresh constant pool.
    pub fn new() -> Self {
        Self {
            major: MAJOR_VERSION,
            minor: MINOR_VERSION,
            constants: ConstantPool::new(),
            access: 0,
            this_class: 0,
            super_class: 0,
            inner_classes: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Qualified name of this class.
    pub fn name(&self) -> Option<&str> {
        self.constants.class_name(self.this_class)
    }

    /// Qualified name of the superclass.
    pub fn super_name(&self) -> Option<&str> {
        self.constants.class_name(self.super_class)
    }
}

impl Default for ClassFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassFileError {
    #[error("unexpected end of data at offset {offset}")]
    Truncated { offset: usize },

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("unknown constant tag {tag} at offset {offset}")]
    UnknownConstantTag { tag: u8, offset: usize },

    #[error("constant {index} is not valid UTF-8")]
    InvalidUtf8 { index: u16 },

    #[error("{0} trailing bytes after class data")]
    TrailingBytes(usize),

    #[error("{what} count {count} exceeds the format limit")]
    TooMany { what: &'static str, count: usize },
}
