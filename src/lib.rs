//! classforge
//!
//! Compiles class definitions built in memory, with no source text, to class
//! files and loads them into a runtime.
//!
//! ## Pipeline
//!
//! 1. Build [`ClassDefinition`] trees with `classforge_ast`
//! 2. Add them to a [`CompilationUnit`]; each class is wrapped in a synthetic
//!    [`ModuleContext`]
//! 3. [`CompilationUnit::compile`] runs resolution, type checking, lowering
//!    and class generation
//! 4. [`CompilationUnit::artifacts`] yields one class file per compiled class
//! 5. A [`ClassLoader`] defines them; a [`Vm`] instantiates and invokes them
//!
//! ```
//! use std::sync::Arc;
//! use classforge::{ClassLoader, CompilationUnit, CompilerConfig, Value, Vm};
//! use classforge_ast::ClassDefinition;
//! use classforge_ast::build::*;
//! use classforge_core::{DataType, Modifiers, QualifiedName};
//!
//! let sb = QualifiedName::parse("lang.StringBuilder").unwrap();
//! let mut class = ClassDefinition::named("pkg.Greeter").unwrap();
//! class.add_method(
//!     "greet",
//!     Modifiers::PUBLIC,
//!     DataType::string_builder(),
//!     vec![],
//!     block(vec![
//!         decl(
//!             "sb",
//!             DataType::string_builder(),
//!             call(new_instance(sb, vec![]), "append", vec![lit_str("testString")]),
//!         ),
//!         ret(var("sb")),
//!     ]),
//! );
//!
//! let mut unit = CompilationUnit::new(CompilerConfig::default());
//! unit.add_class(class).unwrap();
//! unit.compile_all().unwrap();
//!
//! let loader = Arc::new(ClassLoader::new());
//! unit.load_into(&loader).unwrap();
//! let mut vm = Vm::new(Arc::clone(&loader));
//! let greeter = loader.resolve("pkg.Greeter").unwrap();
//! let instance = vm.instantiate(&greeter, &[]).unwrap();
//! let builder = vm.invoke(&instance, "greet", &[]).unwrap();
//! assert_eq!(vm.invoke(&builder, "toString", &[]).unwrap(), Value::from("testString"));
//! ```

pub mod artifact;
pub mod config;
pub mod module;
pub mod unit;

pub use artifact::Artifacts;
pub use config::{CompilerConfig, VmConfig};
pub use module::{ContextProvider, ErrorCollector, ModuleContext, SyntheticContextProvider};
pub use unit::{CompilationUnit, Phase};

pub use classforge_ast::ClassDefinition;
pub use classforge_compiler::GeneratedArtifact;
pub use classforge_core::{
    ClassforgeError, CompileError, ConstructionError, DataType, Diagnostic, ErrorCode, LoadError, Modifiers,
    QualifiedName, RuntimeError, Severity,
};
pub use classforge_runtime::{ClassLoader, LoadedClass, ObjectRef, Value, Vm};
