//! Core vocabulary shared by every classforge crate.
//!
//! - [`QualifiedName`]: dotted package path plus `$`-separated nesting
//! - [`DataType`]: the static types a class member can declare
//! - [`Modifiers`]: access and storage flags for classes and members
//! - [`TypeHash`]: deterministic identity for methods and classes
//! - [`Diagnostic`]: semantic diagnostics attributed to a class/member
//! - [`error`]: the error taxonomy for construction, loading and execution

pub mod data_type;
pub mod diagnostics;
pub mod error;
pub mod modifiers;
pub mod qualified_name;
pub mod type_hash;

pub use data_type::{DataType, known, method_descriptor, parse_method_descriptor};
pub use diagnostics::{Diagnostic, ErrorCode, Severity};
pub use error::{
    ClassforgeError, CompileError, ConstructionError, LoadError, RegistrationError, RuntimeError,
};
pub use modifiers::Modifiers;
pub use qualified_name::QualifiedName;
pub use type_hash::TypeHash;
