//! Native implementations of the host library.
//!
//! Bootstrap classes take their signatures from
//! [`classforge_registry::host::host_classes`] and bind each one to its
//! native through the signature's [`TypeHash`], so what the compiler checks
//! against is exactly what the runtime provides.

use std::sync::Arc;

use classforge_core::{DataType, RuntimeError, TypeHash, known};
use rustc_hash::FxHashMap;
use classforge_registry::host::host_classes;

use crate::class::{HostClass, LoadedClass, LoadedMethod, MethodBody};
use crate::object::{NativeData, ObjectRef};
use crate::value::Value;
use crate::vm::Vm;

/// Native method: VM, receiver (`Null` for statics), arguments.
pub type NativeFn = fn(&mut Vm, &Value, &[Value]) -> Result<Value, RuntimeError>;

/// The host classes, superclass first.
pub fn bootstrap_classes() -> Vec<Arc<LoadedClass>> {
    let natives = native_table();
    let mut loaded: Vec<Arc<LoadedClass>> = Vec::new();
    for entry in host_classes() {
        let Some(host) = HostClass::from_name(&entry.name.to_string()) else {
            continue;
        };
        let superclass = entry.superclass.as_ref().and_then(|name| {
            loaded
                .iter()
                .find(|class| class.name() == name)
                .cloned()
        });
        let methods = entry
            .constructors
            .iter()
            .chain(&entry.methods)
            .filter_map(|m| {
                let native = *natives.get(&m.hash)?;
                Some(LoadedMethod {
                    name: m.name.clone(),
                    descriptor: m.descriptor(),
                    params: m.params.clone(),
                    return_type: m.return_type.clone(),
                    access: m.modifiers,
                    body: MethodBody::Native(native),
                })
            })
            .collect();
        loaded.push(Arc::new(LoadedClass::new_host(
            host,
            entry.name,
            entry.modifiers,
            superclass,
            methods,
        )));
    }
    loaded
}

/// Natives keyed by the signature hash the registry assigns each host
/// method, so a signature without an implementation is never bound.
fn native_table() -> FxHashMap<TypeHash, NativeFn> {
    let object = TypeHash::from_name(known::OBJECT);
    let string = TypeHash::from_name(known::STRING);
    let builder = TypeHash::from_name(known::STRING_BUILDER);
    let object_param = DataType::object().descriptor();
    let string_param = DataType::string().descriptor();

    let mut table: FxHashMap<TypeHash, NativeFn> = FxHashMap::default();
    table.insert(TypeHash::from_constructor(object, &[]), object_init);
    table.insert(TypeHash::from_method(object, "toString", &[]), object_to_string);
    table.insert(TypeHash::from_method(object, "hashCode", &[]), object_hash_code);
    table.insert(TypeHash::from_method(object, "equals", &[object_param.as_str()]), object_equals);

    table.insert(TypeHash::from_method(string, "length", &[]), string_length);
    table.insert(TypeHash::from_method(string, "isEmpty", &[]), string_is_empty);
    table.insert(TypeHash::from_method(string, "concat", &[string_param.as_str()]), string_concat);
    table.insert(TypeHash::from_method(string, "toString", &[]), string_to_string);

    table.insert(TypeHash::from_constructor(builder, &[]), object_init);
    table.insert(TypeHash::from_constructor(builder, &[string_param.as_str()]), builder_init_with);
    for param in [
        DataType::string(),
        DataType::Boolean,
        DataType::Int,
        DataType::Long,
        DataType::Double,
        DataType::object(),
    ] {
        table.insert(TypeHash::from_method(builder, "append", &[param.descriptor().as_str()]), builder_append);
    }
    table.insert(TypeHash::from_method(builder, "length", &[]), builder_length);
    table.insert(TypeHash::from_method(builder, "toString", &[]), builder_to_string);
    table
}

// ==========================================================================
// Receivers
// ==========================================================================

fn text<'v>(receiver: &'v Value, member: &str) -> Result<&'v str, RuntimeError> {
    match receiver {
        Value::Str(s) => Ok(s),
        Value::Null => Err(RuntimeError::NullReference {
            member: member.to_string(),
        }),
        other => Err(RuntimeError::TypeMismatch {
            expected: known::STRING.to_string(),
            actual: other.type_name(),
        }),
    }
}

fn builder<'v>(receiver: &'v Value, member: &str) -> Result<&'v ObjectRef, RuntimeError> {
    match receiver {
        Value::Object(o) if o.class().host() == Some(HostClass::StringBuilder) => Ok(o),
        Value::Null => Err(RuntimeError::NullReference {
            member: member.to_string(),
        }),
        other => Err(RuntimeError::TypeMismatch {
            expected: known::STRING_BUILDER.to_string(),
            actual: other.type_name(),
        }),
    }
}

fn with_buffer<T>(object: &ObjectRef, f: impl FnOnce(&mut String) -> T) -> T {
    let mut state = object.state();
    match &mut state.native {
        Some(NativeData::StringBuilder(buffer)) => f(buffer),
        native => {
            let buffer = native.insert(NativeData::StringBuilder(String::new()));
            let NativeData::StringBuilder(buffer) = buffer;
            f(buffer)
        }
    }
}

fn char_count(s: &str) -> Value {
    Value::Int(i32::try_from(s.chars().count()).unwrap_or(i32::MAX))
}

// ==========================================================================
// lang.Object
// ==========================================================================

fn object_init(_vm: &mut Vm, _receiver: &Value, _args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Null)
}

fn object_to_string(_vm: &mut Vm, receiver: &Value, _args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::string(receiver.to_string()))
}

fn object_hash_code(_vm: &mut Vm, receiver: &Value, _args: &[Value]) -> Result<Value, RuntimeError> {
    let hash = match receiver {
        // 31-based polynomial over UTF-16 units
        Value::Str(s) => s
            .encode_utf16()
            .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32)),
        Value::Object(o) => o.identity_hash(),
        Value::Null => {
            return Err(RuntimeError::NullReference {
                member: "hashCode".to_string(),
            });
        }
        _ => 0,
    };
    Ok(Value::Int(hash))
}

fn object_equals(_vm: &mut Vm, receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
    let other = args.first().unwrap_or(&Value::Null);
    Ok(Value::Bool(receiver.loose_eq(other)))
}

// ==========================================================================
// lang.String
// ==========================================================================

fn string_length(_vm: &mut Vm, receiver: &Value, _args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(char_count(text(receiver, "length")?))
}

fn string_is_empty(_vm: &mut Vm, receiver: &Value, _args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(text(receiver, "isEmpty")?.is_empty()))
}

fn string_concat(_vm: &mut Vm, receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
    let head = text(receiver, "concat")?;
    let tail = text(args.first().unwrap_or(&Value::Null), "concat")?;
    Ok(Value::string(format!("{head}{tail}")))
}

fn string_to_string(_vm: &mut Vm, receiver: &Value, _args: &[Value]) -> Result<Value, RuntimeError> {
    text(receiver, "toString")?;
    Ok(receiver.clone())
}

// ==========================================================================
// lang.StringBuilder
// ==========================================================================

fn builder_init_with(_vm: &mut Vm, receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
    let object = builder(receiver, "<init>")?;
    let initial = text(args.first().unwrap_or(&Value::Null), "<init>")?;
    with_buffer(object, |buffer| {
        buffer.clear();
        buffer.push_str(initial);
    });
    Ok(Value::Null)
}

fn builder_append(vm: &mut Vm, receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
    let object = builder(receiver, "append")?;
    // rendered before locking: toString may run arbitrary code
    let rendered = vm.stringify(args.first().unwrap_or(&Value::Null))?;
    with_buffer(object, |buffer| buffer.push_str(&rendered));
    Ok(receiver.clone())
}

fn builder_length(_vm: &mut Vm, receiver: &Value, _args: &[Value]) -> Result<Value, RuntimeError> {
    let object = builder(receiver, "length")?;
    Ok(with_buffer(object, |buffer| char_count(buffer)))
}

fn builder_to_string(_vm: &mut Vm, receiver: &Value, _args: &[Value]) -> Result<Value, RuntimeError> {
    let object = builder(receiver, "toString")?;
    Ok(with_buffer(object, |buffer| Value::string(buffer.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ClassLoader;

    fn vm() -> Vm {
        Vm::new(Arc::new(ClassLoader::new()))
    }

    fn new_builder() -> Value {
        let class = bootstrap_classes()
            .into_iter()
            .find(|c| c.host() == Some(HostClass::StringBuilder))
            .unwrap();
        Value::Object(ObjectRef::alloc(class))
    }

    #[test]
    fn every_host_signature_has_a_native() {
        let classes = bootstrap_classes();
        for entry in host_classes() {
            let loaded = classes.iter().find(|c| c.name() == &entry.name).unwrap();
            let expected = entry.constructors.len() + entry.methods.len();
            assert_eq!(loaded.methods().len(), expected, "{}", entry.name);
        }
        assert!(classes[1].superclass().is_some_and(|s| s.host() == Some(HostClass::Object)));
    }

    #[test]
    fn natives_bind_by_signature_hash() {
        let table = native_table();
        let signatures: Vec<_> = host_classes()
            .into_iter()
            .flat_map(|c| c.constructors.into_iter().chain(c.methods))
            .collect();
        assert_eq!(table.len(), signatures.len());
        assert!(signatures.iter().all(|m| table.contains_key(&m.hash)));
    }

    #[test]
    fn builder_appends_every_value_kind() {
        let mut vm = vm();
        let sb = new_builder();
        for value in [Value::from("a"), Value::Int(1), Value::Long(2), Value::Double(0.5), Value::Bool(true), Value::Null] {
            let returned = builder_append(&mut vm, &sb, &[value]).unwrap();
            assert_eq!(returned, sb);
        }
        assert_eq!(builder_to_string(&mut vm, &sb, &[]).unwrap(), Value::from("a120.5truenull"));
        assert_eq!(builder_length(&mut vm, &sb, &[]).unwrap(), Value::Int(14));
    }

    #[test]
    fn builder_with_initial_text() {
        let mut vm = vm();
        let sb = new_builder();
        builder_init_with(&mut vm, &sb, &[Value::from("seed")]).unwrap();
        assert_eq!(builder_to_string(&mut vm, &sb, &[]).unwrap(), Value::from("seed"));
        assert!(matches!(
            builder_init_with(&mut vm, &sb, &[Value::Null]),
            Err(RuntimeError::NullReference { .. })
        ));
    }

    #[test]
    fn string_natives() {
        let mut vm = vm();
        let s = Value::from("héllo");
        assert_eq!(string_length(&mut vm, &s, &[]).unwrap(), Value::Int(5));
        assert_eq!(string_is_empty(&mut vm, &Value::from(""), &[]).unwrap(), Value::Bool(true));
        assert_eq!(
            string_concat(&mut vm, &Value::from("ab"), &[Value::from("cd")]).unwrap(),
            Value::from("abcd")
        );
        assert_eq!(object_hash_code(&mut vm, &Value::from("ab"), &[]).unwrap(), Value::Int(3105));
        assert_eq!(object_equals(&mut vm, &Value::from("x"), &[Value::from("x")]).unwrap(), Value::Bool(true));
    }
}
