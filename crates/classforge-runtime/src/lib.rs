//! classforge runtime
//!
//! Loads generated class files and executes them.
//!
//! ## Architecture
//!
//! - **Verification**: every class file is checked structurally and its code
//!   is run through a stack-depth dataflow before anything is defined
//! - **Loading**: [`ClassLoader`] keeps one namespace of defined classes,
//!   seeded with the host library, and links superclasses at define time
//! - **Execution**: [`Vm`] interprets method bodies and resolves the classes
//!   they reference on first use
//!
//! ```ignore
//! let loader = Arc::new(ClassLoader::new());
//! loader.define_all(&artifacts)?;
//! let mut vm = Vm::new(Arc::clone(&loader));
//! let class = loader.resolve("pkg.Greeter").unwrap();
//! let greeter = vm.instantiate(&class, &[])?;
//! let text = vm.invoke(&greeter, "greet", &[Value::from("world")])?;
//! ```

pub mod class;
pub mod loader;
pub mod natives;
pub mod object;
pub mod value;
pub mod verify;
pub mod vm;

pub use class::{FieldSlot, HostClass, LoadedClass, LoadedField, LoadedMethod, MethodBody, ResolvedMethod};
pub use loader::ClassLoader;
pub use natives::NativeFn;
pub use object::ObjectRef;
pub use value::Value;
pub use verify::{VerifyError, verify};
pub use vm::{Vm, VmConfig};
