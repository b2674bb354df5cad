//! SymbolRegistry - class signature storage.
//!
//! # Storage Model
//!
//! - **Classes**: entries stored by `QualifiedName`.
//! - **Members**: owned by their class entry. Lookups walk the superclass
//!   chain; a method redeclared with the same parameter list in a subclass
//!   hides the inherited one.
//!
//! # Thread Safety
//!
//! `SymbolRegistry` is owned by a single compilation unit and is not shared
//! between threads.
//!
//! # Example
//!
//! ```
//! use classforge_core::{DataType, known};
//! use classforge_registry::SymbolRegistry;
//!
//! let registry = SymbolRegistry::with_host_library();
//! assert!(registry.is_assignable(&DataType::string_builder(), &DataType::object()));
//! assert!(registry.find_methods(&known::string(), "length").len() == 1);
//! ```

use rustc_hash::{FxHashMap, FxHashSet};

use classforge_core::{DataType, QualifiedName, RegistrationError};

use crate::overload::{self, OverloadResult};
use crate::{ClassEntry, FieldEntry, InheritanceGraph, MethodEntry, host};

/// Class signatures visible to one compilation run.
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    /// Classes by qualified name (primary storage).
    classes: FxHashMap<QualifiedName, ClassEntry>,

    /// Registration order, for deterministic iteration.
    order: Vec<QualifiedName>,
}

impl SymbolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the host library registered.
    pub fn with_host_library() -> Self {
        let mut registry = Self::new();
        for class in host::host_classes() {
            // host names are distinct, registration cannot collide
            let _ = registry.register_class(class);
        }
        registry
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register a class signature.
    pub fn register_class(&mut self, entry: ClassEntry) -> Result<(), RegistrationError> {
        if self.classes.contains_key(&entry.name) {
            return Err(RegistrationError::DuplicateClass(entry.name.to_string()));
        }
        self.order.push(entry.name.clone());
        self.classes.insert(entry.name.clone(), entry);
        Ok(())
    }

    // ==========================================================================
    // Class Lookup
    // ==========================================================================

    pub fn get_class(&self, name: &QualifiedName) -> Option<&ClassEntry> {
        self.classes.get(name)
    }

    pub fn get_class_mut(&mut self, name: &QualifiedName) -> Option<&mut ClassEntry> {
        self.classes.get_mut(name)
    }

    pub fn contains_class(&self, name: &QualifiedName) -> bool {
        self.classes.contains_key(name)
    }

    /// All classes in registration order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassEntry> {
        self.order.iter().filter_map(|name| self.classes.get(name))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    // ==========================================================================
    // Hierarchy
    // ==========================================================================

    /// The class followed by its registered superclasses, nearest first.
    ///
    /// Stops at the first unregistered superclass or at a repeated class, so a
    /// cyclic hierarchy yields a finite chain.
    pub fn superclass_chain(&self, name: &QualifiedName) -> Vec<&ClassEntry> {
        let mut chain = Vec::new();
        let mut seen = FxHashSet::default();
        let mut current = self.classes.get(name);
        while let Some(entry) = current {
            if !seen.insert(&entry.name) {
                break;
            }
            chain.push(entry);
            current = entry.superclass.as_ref().and_then(|s| self.classes.get(s));
        }
        chain
    }

    /// Number of superclass steps from `sub` up to `sup`.
    pub fn inheritance_distance(&self, sub: &QualifiedName, sup: &QualifiedName) -> Option<u32> {
        self.superclass_chain(sub)
            .iter()
            .position(|entry| &entry.name == sup)
            .map(|steps| steps as u32)
    }

    /// Whether `sub` is `sup` or inherits from it.
    pub fn is_subclass_of(&self, sub: &QualifiedName, sup: &QualifiedName) -> bool {
        self.inheritance_distance(sub, sup).is_some()
    }

    /// Whether a value of type `from` may be stored where `to` is expected.
    pub fn is_assignable(&self, from: &DataType, to: &DataType) -> bool {
        overload::conversion_cost(self, from, to).is_some()
    }

    /// Graph of every registered superclass edge.
    pub fn inheritance_graph(&self) -> InheritanceGraph {
        let mut graph = InheritanceGraph::new();
        for entry in self.classes() {
            if let Some(superclass) = &entry.superclass {
                graph.add_edge(&entry.name, superclass);
            }
        }
        graph
    }

    // ==========================================================================
    // Member Lookup
    // ==========================================================================

    /// Field declared on the class or inherited from a superclass.
    pub fn find_field(&self, class: &QualifiedName, name: &str) -> Option<&FieldEntry> {
        self.superclass_chain(class)
            .into_iter()
            .find_map(|entry| entry.own_field(name))
    }

    /// Every field of the class, inherited ones first.
    pub fn all_fields(&self, class: &QualifiedName) -> Vec<&FieldEntry> {
        let mut chain = self.superclass_chain(class);
        chain.reverse();
        chain.into_iter().flat_map(|entry| entry.fields.iter()).collect()
    }

    /// Methods named `name` visible on the class, including inherited ones
    /// that are not overridden.
    pub fn find_methods(&self, class: &QualifiedName, name: &str) -> Vec<&MethodEntry> {
        let mut found: Vec<&MethodEntry> = Vec::new();
        for entry in self.superclass_chain(class) {
            for method in entry.own_methods(name) {
                if !found.iter().any(|m| m.params == method.params) {
                    found.push(method);
                }
            }
        }
        found
    }

    /// Resolve a method call by argument types.
    pub fn resolve_method(
        &self,
        class: &QualifiedName,
        name: &str,
        args: &[DataType],
    ) -> OverloadResult<'_> {
        overload::select(self, self.find_methods(class, name), args)
    }

    /// Pick the best of an explicit candidate list.
    pub fn select_overload<'r>(
        &'r self,
        candidates: impl IntoIterator<Item = &'r MethodEntry>,
        args: &[DataType],
    ) -> OverloadResult<'r> {
        overload::select(self, candidates, args)
    }

    /// Resolve a constructor call by argument types. Constructors are not inherited.
    pub fn resolve_constructor(&self, class: &QualifiedName, args: &[DataType]) -> OverloadResult<'_> {
        match self.classes.get(class) {
            Some(entry) => overload::select(self, &entry.constructors, args),
            None => OverloadResult::NoMatch,
        }
    }
}
