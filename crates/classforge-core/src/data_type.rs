//! Static types for fields, parameters, locals and return values.

use std::fmt;

use crate::QualifiedName;

/// Names of the host library classes every class space provides.
pub mod known {
    use crate::QualifiedName;

    /// Root of every class hierarchy.
    pub const OBJECT: &str = "lang.Object";
    /// Immutable text.
    pub const STRING: &str = "lang.String";
    /// Mutable text buffer.
    pub const STRING_BUILDER: &str = "lang.StringBuilder";

    /// Qualified name of [`OBJECT`].
    pub fn object() -> QualifiedName {
        QualifiedName::new_unchecked(&["lang"], "Object")
    }

    /// Qualified name of [`STRING`].
    pub fn string() -> QualifiedName {
        QualifiedName::new_unchecked(&["lang"], "String")
    }

    /// Qualified name of [`STRING_BUILDER`].
    pub fn string_builder() -> QualifiedName {
        QualifiedName::new_unchecked(&["lang"], "StringBuilder")
    }
}

/// A static type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// No value (method return only).
    Void,
    /// `true` / `false`.
    Boolean,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 64-bit float.
    Double,
    /// Type of the `null` literal, assignable to every reference type.
    Null,
    /// Reference to an instance of a class.
    Class(QualifiedName),
}

impl DataType {
    /// Reference type of `lang.Object`.
    pub fn object() -> Self {
        DataType::Class(known::object())
    }

    /// Reference type of `lang.String`.
    pub fn string() -> Self {
        DataType::Class(known::string())
    }

    /// Reference type of `lang.StringBuilder`.
    pub fn string_builder() -> Self {
        DataType::Class(known::string_builder())
    }

    /// Reference type of an arbitrary class.
    pub fn class(name: QualifiedName) -> Self {
        DataType::Class(name)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, DataType::Void)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Long | DataType::Double)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            DataType::Boolean | DataType::Int | DataType::Long | DataType::Double
        )
    }

    /// Whether values of this type are references (nullable).
    pub fn is_reference(&self) -> bool {
        matches!(self, DataType::Null | DataType::Class(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, DataType::Class(name) if name.to_string() == known::STRING)
    }

    /// Class name for reference types.
    pub fn class_name(&self) -> Option<&QualifiedName> {
        match self {
            DataType::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Whether a primitive widening conversion exists from `self` to `target`.
    ///
    /// int → long, int → double, long → double.
    pub fn widens_to(&self, target: &DataType) -> bool {
        matches!(
            (self, target),
            (DataType::Int, DataType::Long)
                | (DataType::Int, DataType::Double)
                | (DataType::Long, DataType::Double)
        )
    }

    /// The wider of two numeric types, if both are numeric.
    pub fn numeric_promotion(&self, other: &DataType) -> Option<DataType> {
        if !self.is_numeric() || !other.is_numeric() {
            return None;
        }
        Some(match (self, other) {
            (DataType::Double, _) | (_, DataType::Double) => DataType::Double,
            (DataType::Long, _) | (_, DataType::Long) => DataType::Long,
            _ => DataType::Int,
        })
    }

    /// Field/parameter descriptor.
    pub fn descriptor(&self) -> String {
        match self {
            DataType::Void => "V".to_string(),
            DataType::Boolean => "Z".to_string(),
            DataType::Int => "I".to_string(),
            DataType::Long => "J".to_string(),
            DataType::Double => "D".to_string(),
            DataType::Null => format!("L{};", known::OBJECT),
            DataType::Class(name) => format!("L{name};"),
        }
    }

    /// Parse a single field descriptor.
    pub fn from_descriptor(descriptor: &str) -> Option<DataType> {
        let (ty, rest) = Self::parse_one(descriptor)?;
        rest.is_empty().then_some(ty)
    }

    fn parse_one(s: &str) -> Option<(DataType, &str)> {
        let mut chars = s.chars();
        let ty = match chars.next()? {
            'V' => DataType::Void,
            'Z' => DataType::Boolean,
            'I' => DataType::Int,
            'J' => DataType::Long,
            'D' => DataType::Double,
            'L' => {
                let end = s.find(';')?;
                let name = QualifiedName::parse(&s[1..end]).ok()?;
                return Some((DataType::Class(name), &s[end + 1..]));
            }
            _ => return None,
        };
        Some((ty, chars.as_str()))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Void => write!(f, "void"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Int => write!(f, "int"),
            DataType::Long => write!(f, "long"),
            DataType::Double => write!(f, "double"),
            DataType::Null => write!(f, "null"),
            DataType::Class(name) => write!(f, "{name}"),
        }
    }
}

/// Build a method descriptor such as `(ILlang.String;)V`.
pub fn method_descriptor(params: &[DataType], return_type: &DataType) -> String {
    let mut out = String::from("(");
    for param in params {
        out.push_str(&param.descriptor());
    }
    out.push(')');
    out.push_str(&return_type.descriptor());
    out
}

/// Parse a method descriptor into parameter types and return type.
pub fn parse_method_descriptor(descriptor: &str) -> Option<(Vec<DataType>, DataType)> {
    let mut rest = descriptor.strip_prefix('(')?;
    let mut params = Vec::new();
    while !rest.starts_with(')') {
        let (ty, tail) = DataType::parse_one(rest)?;
        if ty.is_void() {
            return None;
        }
        params.push(ty);
        rest = tail;
    }
    let return_type = DataType::from_descriptor(&rest[1..])?;
    Some((params, return_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors() {
        assert_eq!(DataType::Int.descriptor(), "I");
        assert_eq!(DataType::string_builder().descriptor(), "Llang.StringBuilder;");
        assert_eq!(
            DataType::from_descriptor("Lpkg.Outer$Inner;"),
            Some(DataType::Class(QualifiedName::parse("pkg.Outer$Inner").unwrap()))
        );
        assert_eq!(DataType::from_descriptor("IJ"), None);
        assert_eq!(DataType::from_descriptor("Q"), None);
    }

    #[test]
    fn method_descriptors() {
        let desc = method_descriptor(&[DataType::Int, DataType::string()], &DataType::Void);
        assert_eq!(desc, "(ILlang.String;)V");
        let (params, ret) = parse_method_descriptor(&desc).unwrap();
        assert_eq!(params, vec![DataType::Int, DataType::string()]);
        assert_eq!(ret, DataType::Void);

        assert!(parse_method_descriptor("()").is_none());
        assert!(parse_method_descriptor("(V)I").is_none());
        assert!(parse_method_descriptor("I)V").is_none());
    }

    #[test]
    fn widening_and_promotion() {
        assert!(DataType::Int.widens_to(&DataType::Long));
        assert!(DataType::Long.widens_to(&DataType::Double));
        assert!(!DataType::Double.widens_to(&DataType::Int));
        assert_eq!(
            DataType::Int.numeric_promotion(&DataType::Long),
            Some(DataType::Long)
        );
        assert_eq!(DataType::Int.numeric_promotion(&DataType::Boolean), None);
    }

    #[test]
    fn known_names() {
        assert_eq!(known::object().to_string(), known::OBJECT);
        assert_eq!(known::string_builder().to_string(), known::STRING_BUILDER);
        assert!(DataType::string().is_string());
        assert!(DataType::Null.is_reference());
        assert!(!DataType::Int.is_reference());
    }
}
