//! Heap objects.
//!
//! Objects are reference counted and shared between frames; their mutable
//! state sits behind a `Mutex` so values can cross threads.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::class::LoadedClass;
use crate::value::Value;

/// State a host class keeps outside the field layout.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeData {
    /// Buffer of a `lang.StringBuilder`.
    StringBuilder(String),
}

/// Mutable part of an object.
#[derive(Debug)]
pub struct ObjectState {
    /// One slot per entry of the class field layout.
    pub fields: Vec<Value>,
    pub native: Option<NativeData>,
}

struct ObjectInner {
    class: Arc<LoadedClass>,
    state: Mutex<ObjectState>,
}

/// Shared handle to an object. Equality is identity.
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectInner>);

impl ObjectRef {
    /// Allocate an instance of `class` with default field values.
    pub fn alloc(class: Arc<LoadedClass>) -> Self {
        let fields = class.layout().iter().map(|slot| Value::default_for(&slot.ty)).collect();
        let native = class.host().and_then(|host| host.native_state());
        Self(Arc::new(ObjectInner {
            class,
            state: Mutex::new(ObjectState { fields, native }),
        }))
    }

    pub fn class(&self) -> &Arc<LoadedClass> {
        &self.0.class
    }

    /// Lock the object state, recovering from poisoning.
    pub fn state(&self) -> MutexGuard<'_, ObjectState> {
        self.0.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get_field(&self, slot: usize) -> Option<Value> {
        self.state().fields.get(slot).cloned()
    }

    /// Store into a field slot; false if the slot does not exist.
    pub fn set_field(&self, slot: usize, value: Value) -> bool {
        match self.state().fields.get_mut(slot) {
            Some(field) => {
                *field = value;
                true
            }
            None => false,
        }
    }

    /// Field value by name, most derived declaration first.
    pub fn field(&self, name: &str) -> Option<Value> {
        let slot = self.class().field_slot_by_name(name)?;
        self.get_field(slot)
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Identity based hash, stable for the object's lifetime.
    pub fn identity_hash(&self) -> i32 {
        let addr = Arc::as_ptr(&self.0) as usize as u64;
        (addr ^ (addr >> 32)) as i32
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({}@{:x})", self.class().name(), self.identity_hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::natives::bootstrap_classes;
    use classforge_core::known;

    fn class(name: &str) -> Arc<LoadedClass> {
        bootstrap_classes()
            .into_iter()
            .find(|c| c.name().to_string() == name)
            .unwrap()
    }

    #[test]
    fn string_builder_gets_native_buffer() {
        let sb = ObjectRef::alloc(class(known::STRING_BUILDER));
        assert_eq!(sb.state().native, Some(NativeData::StringBuilder(String::new())));
        assert!(sb.state().fields.is_empty());
    }

    #[test]
    fn identity_semantics() {
        let a = ObjectRef::alloc(class(known::OBJECT));
        let b = ObjectRef::alloc(class(known::OBJECT));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.identity_hash(), a.clone().identity_hash());
        assert!(a.state().native.is_none());
    }
}
