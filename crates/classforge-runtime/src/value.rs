//! Runtime values.

use std::fmt;
use std::sync::Arc;

use classforge_core::{DataType, known};

use crate::object::ObjectRef;

/// A value on the operand stack, in a local slot or in a field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    /// Immutable `lang.String` instance.
    Str(Arc<str>),
    /// Instance of any other class.
    Object(ObjectRef),
}

impl Value {
    /// String value from anything string-like.
    pub fn string(text: impl Into<Arc<str>>) -> Self {
        Value::Str(text.into())
    }

    /// Default value of a field or local of type `ty`.
    pub fn default_for(ty: &DataType) -> Self {
        match ty {
            DataType::Boolean => Value::Bool(false),
            DataType::Int => Value::Int(0),
            DataType::Long => Value::Long(0),
            DataType::Double => Value::Double(0.0),
            _ => Value::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Name of the runtime type, used in error messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "boolean".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Long(_) => "long".to_string(),
            Value::Double(_) => "double".to_string(),
            Value::Str(_) => known::STRING.to_string(),
            Value::Object(o) => o.class().name().to_string(),
        }
    }

    /// Qualified name of the runtime class of a reference value.
    pub fn class_name(&self) -> Option<String> {
        match self {
            Value::Str(_) => Some(known::STRING.to_string()),
            Value::Object(o) => Some(o.class().name().to_string()),
            _ => None,
        }
    }

    /// Static type describing this value, `Null` for `null`.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Boolean,
            Value::Int(_) => DataType::Int,
            Value::Long(_) => DataType::Long,
            Value::Double(_) => DataType::Double,
            Value::Str(_) => DataType::string(),
            Value::Object(o) => DataType::Class(o.class().name().clone()),
        }
    }

    /// Equality as the `Eq` instruction sees it: numbers after promotion,
    /// strings by content, other references by identity.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (a, b) => match (a.promoted(), b.promoted()) {
                (Some(Numeric::Int(x)), Some(Numeric::Int(y))) => x == y,
                (Some(Numeric::Long(x)), Some(Numeric::Long(y))) => x == y,
                (Some(x), Some(y)) => x.to_double() == y.to_double(),
                _ => false,
            },
        }
    }

    pub(crate) fn promoted(&self) -> Option<Numeric> {
        match self {
            Value::Int(v) => Some(Numeric::Int(*v)),
            Value::Long(v) => Some(Numeric::Long(*v)),
            Value::Double(v) => Some(Numeric::Double(*v)),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v.into())
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

/// Primitive rendering. Objects render as `Class@hash`; the interpreter
/// calls `toString` instead where an override may exist.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v:?}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Object(o) => write!(f, "{}@{:x}", o.class().name(), o.identity_hash()),
        }
    }
}

/// Two numeric operands after binary promotion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Numeric {
    Int(i32),
    Long(i64),
    Double(f64),
}

impl Numeric {
    pub(crate) fn to_double(self) -> f64 {
        match self {
            Numeric::Int(v) => v as f64,
            Numeric::Long(v) => v as f64,
            Numeric::Double(v) => v,
        }
    }

    fn to_long(self) -> Option<i64> {
        match self {
            Numeric::Int(v) => Some(v as i64),
            Numeric::Long(v) => Some(v),
            Numeric::Double(_) => None,
        }
    }

    /// Promote both operands to their common width.
    pub(crate) fn promote(a: Numeric, b: Numeric) -> (Numeric, Numeric) {
        match (a, b) {
            (Numeric::Double(_), _) | (_, Numeric::Double(_)) => {
                (Numeric::Double(a.to_double()), Numeric::Double(b.to_double()))
            }
            (Numeric::Long(_), _) | (_, Numeric::Long(_)) => match (a.to_long(), b.to_long()) {
                (Some(x), Some(y)) => (Numeric::Long(x), Numeric::Long(y)),
                _ => (a, b),
            },
            _ => (a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_declared_type() {
        assert_eq!(Value::default_for(&DataType::Int), Value::Int(0));
        assert_eq!(Value::default_for(&DataType::Boolean), Value::Bool(false));
        assert_eq!(Value::default_for(&DataType::string()), Value::Null);
    }

    #[test]
    fn loose_equality_promotes_numbers() {
        assert!(Value::Int(3).loose_eq(&Value::Long(3)));
        assert!(Value::Int(1).loose_eq(&Value::Double(1.0)));
        assert!(!Value::Int(1).loose_eq(&Value::Bool(true)));
        assert!(Value::from("a").loose_eq(&Value::string(String::from("a"))));
        assert!(!Value::Null.loose_eq(&Value::from("null")));
    }

    #[test]
    fn display_of_primitives() {
        assert_eq!(Value::Double(1.0).to_string(), "1.0");
        assert_eq!(Value::Long(-7).to_string(), "-7");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::from("x").data_type(), DataType::string());
    }
}
