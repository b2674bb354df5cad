//! Dynamic class loader.
//!
//! A [`ClassLoader`] is one class namespace. Defining a class verifies its
//! structure eagerly and requires its superclass to be defined already, since
//! the field layout is inherited. Every other reference (enclosing class,
//! nested classes, members used by code) is linked lazily by the interpreter.
//!
//! The namespace sits behind an `RwLock`: `define` holds the write lock for
//! the whole check-and-insert, `resolve` takes the read lock.

use std::sync::{Arc, PoisonError, RwLock};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use classforge_compiler::GeneratedArtifact;
use classforge_compiler::classfile::ClassFile;
use classforge_core::{LoadError, QualifiedName};

use crate::class::LoadedClass;
use crate::natives::bootstrap_classes;
use crate::verify::verify;

pub struct ClassLoader {
    classes: RwLock<FxHashMap<String, Arc<LoadedClass>>>,
}

impl ClassLoader {
    /// A loader holding only the host classes.
    pub fn new() -> Self {
        let classes = bootstrap_classes()
            .into_iter()
            .map(|class| (class.name().to_string(), class))
            .collect();
        Self {
            classes: RwLock::new(classes),
        }
    }

    /// Define one generated class.
    pub fn define(&self, artifact: &GeneratedArtifact) -> Result<Arc<LoadedClass>, LoadError> {
        self.define_bytes(&artifact.name.to_string(), &artifact.bytes)
    }

    /// Define raw class file bytes under `name`.
    pub fn define_bytes(&self, name: &str, bytes: &[u8]) -> Result<Arc<LoadedClass>, LoadError> {
        let file = parse(name, bytes)?;
        self.define_parsed(name, file)
    }

    /// Define a batch, superclasses and enclosing classes first.
    ///
    /// Returns the classes in the order they were defined. Classes defined
    /// before a failure stay defined.
    pub fn define_all<'a>(
        &self,
        artifacts: impl IntoIterator<Item = &'a GeneratedArtifact>,
    ) -> Result<Vec<Arc<LoadedClass>>, LoadError> {
        let mut parsed = Vec::new();
        for artifact in artifacts {
            let name = artifact.name.to_string();
            let file = parse(&name, &artifact.bytes)?;
            parsed.push((name, file));
        }

        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..parsed.len()).map(|i| graph.add_node(i)).collect();
        let by_name: FxHashMap<&str, NodeIndex> = parsed
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.as_str(), nodes[i]))
            .collect();
        for (i, (name, file)) in parsed.iter().enumerate() {
            for dependency in dependencies(name, file) {
                if let Some(&node) = by_name.get(dependency.as_str()) {
                    if node != nodes[i] {
                        graph.add_edge(node, nodes[i], ());
                    }
                }
            }
        }

        // on a cycle keep the given order; the missing superclass surfaces
        // as an undefined dependency
        let order: Vec<usize> = match toposort(&graph, None) {
            Ok(sorted) => sorted.into_iter().map(|node| graph[node]).collect(),
            Err(_) => (0..parsed.len()).collect(),
        };

        let mut slots: Vec<Option<(String, ClassFile)>> = parsed.into_iter().map(Some).collect();
        let mut defined = Vec::with_capacity(slots.len());
        for index in order {
            if let Some((name, file)) = slots[index].take() {
                defined.push(self.define_parsed(&name, file)?);
            }
        }
        Ok(defined)
    }

    fn define_parsed(&self, name: &str, file: ClassFile) -> Result<Arc<LoadedClass>, LoadError> {
        let rejected = |reason: String| LoadError::Verification {
            class: name.to_string(),
            reason,
        };

        verify(&file).map_err(|err| rejected(err.to_string()))?;
        if file.name() != Some(name) {
            return Err(rejected(format!(
                "class file declares '{}'",
                file.name().unwrap_or_default()
            )));
        }
        let superclass_name = file
            .super_name()
            .map(str::to_string)
            .ok_or_else(|| rejected("missing superclass".to_string()))?;

        let mut classes = self.classes.write().unwrap_or_else(PoisonError::into_inner);
        if classes.contains_key(name) {
            return Err(LoadError::DuplicateDefinition(name.to_string()));
        }
        let superclass = classes
            .get(&superclass_name)
            .cloned()
            .ok_or_else(|| LoadError::UndefinedDependency {
                class: name.to_string(),
                dependency: superclass_name.clone(),
            })?;
        if superclass.access().is_final() {
            return Err(rejected(format!("cannot extend final class '{superclass_name}'")));
        }

        let class = LoadedClass::from_class_file(file, Some(superclass)).map_err(|err| rejected(err.to_string()))?;
        let class = Arc::new(class);
        classes.insert(name.to_string(), Arc::clone(&class));
        debug!(class = name, superclass = %superclass_name, "defined class");
        Ok(class)
    }

    /// Look up a defined class.
    pub fn resolve(&self, name: &str) -> Option<Arc<LoadedClass>> {
        let classes = self.classes.read().unwrap_or_else(PoisonError::into_inner);
        let found = classes.get(name).cloned();
        if found.is_none() {
            trace!(class = name, "class not found");
        }
        found
    }

    pub fn resolve_qualified(&self, name: &QualifiedName) -> Option<Arc<LoadedClass>> {
        self.resolve(&name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Number of defined classes, host classes included.
    pub fn len(&self) -> usize {
        self.classes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of every defined class, sorted.
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for ClassLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClassLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassLoader").field("classes", &self.class_names()).finish()
    }
}

fn parse(name: &str, bytes: &[u8]) -> Result<ClassFile, LoadError> {
    ClassFile::parse(bytes).map_err(|err| LoadError::Verification {
        class: name.to_string(),
        reason: err.to_string(),
    })
}

/// Superclass and enclosing class named by a class file.
fn dependencies(name: &str, file: &ClassFile) -> Vec<String> {
    let mut dependencies: Vec<String> = file.super_name().map(str::to_string).into_iter().collect();
    for info in &file.inner_classes {
        if file.constants.class_name(info.inner_class) == Some(name) {
            if let Some(outer) = file.constants.class_name(info.outer_class) {
                dependencies.push(outer.to_string());
            }
        }
    }
    dependencies
}

#[cfg(test)]
mod tests {
    use super::*;
    use classforge_compiler::bytecode::OpCode;
    use classforge_compiler::classfile::{InnerClassInfo, MethodInfo};
    use classforge_core::Modifiers;

    fn q(s: &str) -> QualifiedName {
        QualifiedName::parse(s).unwrap()
    }

    fn artifact(name: &str, superclass: &str, outer: Option<&str>) -> GeneratedArtifact {
        let mut file = ClassFile::new();
        file.access = Modifiers::PUBLIC.bits();
        file.this_class = file.constants.add_class(name);
        file.super_class = file.constants.add_class(superclass);
        if let Some(outer) = outer {
            let outer_class = file.constants.add_class(outer);
            let simple_name = file.constants.add_utf8(q(name).simple_name());
            file.inner_classes.push(InnerClassInfo {
                inner_class: file.this_class,
                outer_class,
                simple_name,
                access: Modifiers::PUBLIC.bits(),
            });
        }
        let info = MethodInfo {
            access: Modifiers::PUBLIC.bits(),
            name: file.constants.add_utf8("<init>"),
            descriptor: file.constants.add_utf8("()V"),
            max_locals: 1,
            code: vec![OpCode::ReturnVoid.into()],
        };
        file.methods.push(info);
        GeneratedArtifact::new(q(name), file.to_bytes().unwrap())
    }

    #[test]
    fn loader_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClassLoader>();
        assert_send_sync::<Arc<LoadedClass>>();
    }

    #[test]
    fn bootstrap_classes_are_present() {
        let loader = ClassLoader::new();
        assert_eq!(loader.class_names(), vec!["lang.Object", "lang.String", "lang.StringBuilder"]);
        assert!(loader.resolve("lang.String").unwrap().is_host());
    }

    #[test]
    fn define_and_resolve() {
        let loader = ClassLoader::new();
        let class = loader.define(&artifact("pkg.A", "lang.Object", None)).unwrap();
        assert_eq!(class.name(), &q("pkg.A"));
        assert!(Arc::ptr_eq(&loader.resolve("pkg.A").unwrap(), &class));
        assert!(loader.resolve("pkg.Missing").is_none());
    }

    #[test]
    fn duplicate_definition_keeps_first() {
        let loader = ClassLoader::new();
        let first = loader.define(&artifact("pkg.A", "lang.Object", None)).unwrap();
        let err = loader.define(&artifact("pkg.A", "lang.Object", None)).unwrap_err();
        assert_eq!(err, LoadError::DuplicateDefinition("pkg.A".into()));
        assert!(Arc::ptr_eq(&loader.resolve("pkg.A").unwrap(), &first));

        let err = loader.define(&artifact("lang.String", "lang.Object", None)).unwrap_err();
        assert_eq!(err, LoadError::DuplicateDefinition("lang.String".into()));
    }

    #[test]
    fn superclass_must_be_defined_first() {
        let loader = ClassLoader::new();
        let err = loader.define(&artifact("pkg.B", "pkg.A", None)).unwrap_err();
        assert_eq!(
            err,
            LoadError::UndefinedDependency {
                class: "pkg.B".into(),
                dependency: "pkg.A".into()
            }
        );
        assert!(!loader.contains("pkg.B"));
    }

    #[test]
    fn final_superclass_is_rejected() {
        let loader = ClassLoader::new();
        let err = loader.define(&artifact("pkg.Text", "lang.String", None)).unwrap_err();
        assert!(matches!(err, LoadError::Verification { .. }));
    }

    #[test]
    fn nested_class_may_precede_enclosing_class() {
        let loader = ClassLoader::new();
        let inner = loader
            .define(&artifact("pkg.Outer$Inner", "lang.Object", Some("pkg.Outer")))
            .unwrap();
        assert_eq!(inner.enclosing_class(), Some(&q("pkg.Outer")));
        assert!(!loader.contains("pkg.Outer"));
        loader.define(&artifact("pkg.Outer", "lang.Object", None)).unwrap();
    }

    #[test]
    fn define_all_orders_by_dependency() {
        let loader = ClassLoader::new();
        let batch = [
            artifact("pkg.C", "pkg.B", None),
            artifact("pkg.B", "pkg.A", None),
            artifact("pkg.A$Inner", "lang.Object", Some("pkg.A")),
            artifact("pkg.A", "lang.Object", None),
        ];
        let defined = loader.define_all(&batch).unwrap();
        let names: Vec<String> = defined.iter().map(|c| c.name().to_string()).collect();
        let position = |n: &str| names.iter().position(|x| x == n).unwrap();
        assert!(position("pkg.A") < position("pkg.B"));
        assert!(position("pkg.B") < position("pkg.C"));
        assert!(position("pkg.A") < position("pkg.A$Inner"));
        let c = &defined[position("pkg.C")];
        assert_eq!(c.superclass().unwrap().name(), &q("pkg.B"));
        assert_eq!(c.layout().len(), 0);
    }

    #[test]
    fn malformed_bytes_are_rejected() {
        let loader = ClassLoader::new();
        let mut bytes = artifact("pkg.A", "lang.Object", None).bytes;
        bytes.truncate(10);
        assert!(matches!(
            loader.define_bytes("pkg.A", &bytes),
            Err(LoadError::Verification { class, .. }) if class == "pkg.A"
        ));

        let good = artifact("pkg.A", "lang.Object", None);
        assert!(matches!(
            loader.define_bytes("pkg.Other", &good.bytes),
            Err(LoadError::Verification { .. })
        ));
    }
}
