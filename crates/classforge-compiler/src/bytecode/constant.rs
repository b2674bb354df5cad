//! Constant pool for class files.
//!
//! The constant pool stores the literals, names and member references used by
//! a class. Entries are 1-based; index 0 means "none".

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

/// Entries stored in the constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// UTF-8 text backing names, descriptors and string literals.
    Utf8(String),
    /// 32-bit integer literal.
    Int(i32),
    /// 64-bit integer literal.
    Long(i64),
    /// 64-bit float literal.
    Double(f64),
    /// String literal; index of its Utf8 entry.
    String(u16),
    /// Class reference; index of the Utf8 qualified name.
    Class(u16),
    /// Field reference: Class entry, Utf8 name, Utf8 descriptor.
    FieldRef { class: u16, name: u16, descriptor: u16 },
    /// Method reference: Class entry, Utf8 name, Utf8 descriptor.
    MethodRef { class: u16, name: u16, descriptor: u16 },
}

impl Constant {
    /// Tag byte used in the binary format.
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Utf8(_) => 1,
            Constant::Int(_) => 2,
            Constant::Long(_) => 3,
            Constant::Double(_) => 4,
            Constant::String(_) => 5,
            Constant::Class(_) => 6,
            Constant::FieldRef { .. } => 7,
            Constant::MethodRef { .. } => 8,
        }
    }
}

/// Resolved view of a FieldRef or MethodRef entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub class: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

/// Key for constant deduplication (hashable version of Constant).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Utf8(String),
    Int(i32),
    Long(i64),
    Double(OrderedFloat<f64>),
    String(u16),
    Class(u16),
    FieldRef(u16, u16, u16),
    MethodRef(u16, u16, u16),
}

impl From<&Constant> for ConstantKey {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Utf8(s) => ConstantKey::Utf8(s.clone()),
            Constant::Int(v) => ConstantKey::Int(*v),
            Constant::Long(v) => ConstantKey::Long(*v),
            Constant::Double(v) => ConstantKey::Double(OrderedFloat(*v)),
            Constant::String(i) => ConstantKey::String(*i),
            Constant::Class(i) => ConstantKey::Class(*i),
            Constant::FieldRef {
                class,
                name,
                descriptor,
            } => ConstantKey::FieldRef(*class, *name, *descriptor),
            Constant::MethodRef {
                class,
                name,
                descriptor,
            } => ConstantKey::MethodRef(*class, *name, *descriptor),
        }
    }
}

/// Class-level constant pool with deduplication.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    /// The constants; entry `i` has index `i + 1`.
    constants: Vec<Constant>,
    /// Deduplication index: maps constant to its index.
    index: FxHashMap<ConstantKey, u16>,
    /// Set when an add was refused because the pool is full.
    overflowed: bool,
}

impl ConstantPool {
    /// Largest number of entries a pool can hold.
    pub const MAX_ENTRIES: usize = u16::MAX as usize - 1;

    /// Create a new empty constant pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a pool from decoded entries, keeping their order.
    pub fn from_entries(entries: Vec<Constant>) -> Self {
        let mut pool = Self::new();
        for (i, constant) in entries.iter().enumerate() {
            // first occurrence wins, later duplicates keep their own slot
            pool.index
                .entry(ConstantKey::from(constant))
                .or_insert((i + 1) as u16);
        }
        pool.constants = entries;
        pool
    }

    /// Add or get existing constant, returns its 1-based index.
    ///
    /// Returns 0 and marks the pool overflowed when it is full.
    pub fn add(&mut self, constant: Constant) -> u16 {
        let key = ConstantKey::from(&constant);
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        if self.constants.len() >= Self::MAX_ENTRIES {
            self.overflowed = true;
            return 0;
        }
        self.constants.push(constant);
        let idx = self.constants.len() as u16;
        self.index.insert(key, idx);
        idx
    }

    pub fn add_utf8(&mut self, value: &str) -> u16 {
        self.add(Constant::Utf8(value.to_string()))
    }

    pub fn add_int(&mut self, value: i32) -> u16 {
        self.add(Constant::Int(value))
    }

    pub fn add_long(&mut self, value: i64) -> u16 {
        self.add(Constant::Long(value))
    }

    pub fn add_double(&mut self, value: f64) -> u16 {
        self.add(Constant::Double(value))
    }

    /// Add a string literal (and its Utf8 entry).
    pub fn add_string(&mut self, value: &str) -> u16 {
        let utf8 = self.add_utf8(value);
        self.add(Constant::String(utf8))
    }

    /// Add a class reference by qualified name.
    pub fn add_class(&mut self, name: &str) -> u16 {
        let utf8 = self.add_utf8(name);
        self.add(Constant::Class(utf8))
    }

    pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.add_class(class);
        let name = self.add_utf8(name);
        let descriptor = self.add_utf8(descriptor);
        self.add(Constant::FieldRef {
            class,
            name,
            descriptor,
        })
    }

    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.add_class(class);
        let name = self.add_utf8(name);
        let descriptor = self.add_utf8(descriptor);
        self.add(Constant::MethodRef {
            class,
            name,
            descriptor,
        })
    }

    /// Get constant by 1-based index.
    pub fn get(&self, index: u16) -> Option<&Constant> {
        (index as usize)
            .checked_sub(1)
            .and_then(|i| self.constants.get(i))
    }

    /// Text of a Utf8 entry.
    pub fn utf8(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::Utf8(s) => Some(s),
            _ => None,
        }
    }

    /// Qualified name of a Class entry.
    pub fn class_name(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::Class(name) => self.utf8(*name),
            _ => None,
        }
    }

    /// Text of a String entry.
    pub fn string(&self, index: u16) -> Option<&str> {
        match self.get(index)? {
            Constant::String(utf8) => self.utf8(*utf8),
            _ => None,
        }
    }

    /// Resolve a FieldRef entry.
    pub fn field_ref(&self, index: u16) -> Option<MemberRef<'_>> {
        match self.get(index)? {
            Constant::FieldRef {
                class,
                name,
                descriptor,
            } => self.member_ref(*class, *name, *descriptor),
            _ => None,
        }
    }

    /// Resolve a MethodRef entry.
    pub fn method_ref(&self, index: u16) -> Option<MemberRef<'_>> {
        match self.get(index)? {
            Constant::MethodRef {
                class,
                name,
                descriptor,
            } => self.member_ref(*class, *name, *descriptor),
            _ => None,
        }
    }

    fn member_ref(&self, class: u16, name: u16, descriptor: u16) -> Option<MemberRef<'_>> {
        Some(MemberRef {
            class: self.class_name(class)?,
            name: self.utf8(name)?,
            descriptor: self.utf8(descriptor)?,
        })
    }

    /// Get all constants (for serialization).
    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    /// Number of constants.
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Whether an add was refused because the pool was full.
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }
}
