//! Host library class signatures.
//!
//! These mirror the natives the runtime provides for the same classes. A
//! class definition may extend `lang.Object` but no other host class.

use classforge_core::{DataType, Modifiers, known};

use crate::{ClassEntry, MethodEntry};

/// Signatures of every host class, root first.
pub fn host_classes() -> Vec<ClassEntry> {
    vec![object_class(), string_class(), string_builder_class()]
}

fn public() -> Modifiers {
    Modifiers::PUBLIC
}

fn object_class() -> ClassEntry {
    let name = known::object();
    let mut class = ClassEntry::host(name.clone(), public(), None);
    class.constructors.push(MethodEntry::constructor(name.clone(), public(), vec![]));
    class.methods = vec![
        MethodEntry::method(name.clone(), "toString", public(), vec![], DataType::string()),
        MethodEntry::method(name.clone(), "hashCode", public(), vec![], DataType::Int),
        MethodEntry::method(name, "equals", public(), vec![DataType::object()], DataType::Boolean),
    ];
    class
}

fn string_class() -> ClassEntry {
    let name = known::string();
    let mut class = ClassEntry::host(name.clone(), public() | Modifiers::FINAL, Some(known::object()));
    class.methods = vec![
        MethodEntry::method(name.clone(), "length", public(), vec![], DataType::Int),
        MethodEntry::method(name.clone(), "isEmpty", public(), vec![], DataType::Boolean),
        MethodEntry::method(name.clone(), "concat", public(), vec![DataType::string()], DataType::string()),
        MethodEntry::method(name, "toString", public(), vec![], DataType::string()),
    ];
    class
}

fn string_builder_class() -> ClassEntry {
    let name = known::string_builder();
    let mut class =
        ClassEntry::host(name.clone(), public() | Modifiers::FINAL, Some(known::object()));
    class.constructors = vec![
        MethodEntry::constructor(name.clone(), public(), vec![]),
        MethodEntry::constructor(name.clone(), public(), vec![DataType::string()]),
    ];
    for param in [
        DataType::string(),
        DataType::Boolean,
        DataType::Int,
        DataType::Long,
        DataType::Double,
        DataType::object(),
    ] {
        class.methods.push(MethodEntry::method(
            name.clone(),
            "append",
            public(),
            vec![param],
            DataType::string_builder(),
        ));
    }
    class.methods.push(MethodEntry::method(name.clone(), "length", public(), vec![], DataType::Int));
    class
        .methods
        .push(MethodEntry::method(name, "toString", public(), vec![], DataType::string()));
    class
}
