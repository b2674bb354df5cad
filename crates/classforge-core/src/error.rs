//! Error types for every stage of the pipeline.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ClassforgeError (top-level wrapper)
//! ├── ConstructionError  - malformed class definition input
//! ├── RegistrationError  - symbol registry conflicts
//! ├── CompileError       - aggregated semantic diagnostics of a run
//! ├── LoadError          - loader define/verify/link failures
//! └── RuntimeError       - interpreter failures
//! ```

use thiserror::Error;

use crate::Diagnostic;

// ============================================================================
// Construction Errors
// ============================================================================

/// Malformed input detected before any compilation phase runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    /// A class was given an empty qualified name.
    #[error("class name must not be empty")]
    EmptyName,

    /// A qualified name is syntactically invalid.
    #[error("invalid class name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Two classes with the same qualified name were added to one unit.
    #[error("class '{0}' is already part of this compilation unit")]
    DuplicateClass(String),

    /// A nested class name does not follow `<enclosing>$<simple>`.
    #[error("nested class '{name}' must be named '{expected}'")]
    NestedNameMismatch { name: String, expected: String },

    /// Classes were added after compilation started.
    #[error("cannot add class '{0}': compilation has already started")]
    UnitSealed(String),
}

// ============================================================================
// Registration Errors
// ============================================================================

/// Conflicts while registering symbols.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A class with this name is already registered.
    #[error("duplicate class: {0}")]
    DuplicateClass(String),

    /// A class referenced during registration is missing.
    #[error("class not found: {0}")]
    ClassNotFound(String),
}

// ============================================================================
// Compile Errors
// ============================================================================

/// Failure of a compilation run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Semantic diagnostics collected across all classes of the run.
    #[error("{} semantic error(s) in {} class(es)", .diagnostics.len(), .failed_classes.len())]
    Semantic {
        diagnostics: Vec<Diagnostic>,
        failed_classes: Vec<String>,
    },

    /// The unit has no classes.
    #[error("compilation unit contains no classes")]
    Empty,
}

impl CompileError {
    /// Diagnostics carried by this error, empty for non-semantic failures.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Semantic { diagnostics, .. } => diagnostics,
            CompileError::Empty => &[],
        }
    }
}

// ============================================================================
// Load Errors
// ============================================================================

/// Failures of the dynamic loader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The name is already defined in this loader.
    #[error("class '{0}' is already defined in this loader")]
    DuplicateDefinition(String),

    /// The class file was rejected by the verifier.
    #[error("verification of class '{class}' failed: {reason}")]
    Verification { class: String, reason: String },

    /// A class needed by a definition or a link is not resolvable.
    #[error("class '{class}' depends on undefined class '{dependency}'")]
    UndefinedDependency { class: String, dependency: String },
}

// ============================================================================
// Runtime Errors
// ============================================================================

/// Failures while executing loaded bytecode.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// No method with a compatible signature exists.
    #[error("no method '{method}' on class '{class}' accepts the given arguments")]
    NoSuchMethod { class: String, method: String },

    /// No field with that name exists.
    #[error("no field '{field}' on class '{class}'")]
    NoSuchField { class: String, field: String },

    /// A member was accessed through `null`.
    #[error("null reference while accessing '{member}'")]
    NullReference { member: String },

    /// A value had the wrong runtime type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Integer division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Call depth exceeded the configured limit.
    #[error("stack overflow (depth {0})")]
    StackOverflow(usize),

    /// Attempt to instantiate an abstract class.
    #[error("cannot instantiate abstract class '{0}'")]
    AbstractInstantiation(String),

    /// A non-static inner class was instantiated without an outer instance.
    #[error("class '{0}' requires an enclosing instance")]
    OuterInstanceRequired(String),

    /// A class, field or method reference could not be linked.
    #[error(transparent)]
    Link(#[from] LoadError),

    /// Bytecode that passed verification misbehaved at run time.
    #[error("invalid bytecode in '{method}': {message}")]
    InvalidBytecode { method: String, message: String },
}

// ============================================================================
// Unified Error
// ============================================================================

/// Umbrella error for callers that drive the whole pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassforgeError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ClassforgeError {
    pub fn is_construction(&self) -> bool {
        matches!(self, ClassforgeError::Construction(_))
    }

    pub fn is_compile(&self) -> bool {
        matches!(self, ClassforgeError::Compile(_))
    }

    pub fn is_load(&self) -> bool {
        matches!(self, ClassforgeError::Load(_))
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, ClassforgeError::Runtime(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    #[test]
    fn semantic_error_summary() {
        let err = CompileError::Semantic {
            diagnostics: vec![
                Diagnostic::error(ErrorCode::TypeMismatch, "A", "x"),
                Diagnostic::error(ErrorCode::UnknownType, "A", "y"),
            ],
            failed_classes: vec!["A".into()],
        };
        assert_eq!(err.to_string(), "2 semantic error(s) in 1 class(es)");
        assert_eq!(err.diagnostics().len(), 2);
    }

    #[test]
    fn load_error_converts_to_runtime_link() {
        let load = LoadError::UndefinedDependency {
            class: "A".into(),
            dependency: "B".into(),
        };
        let runtime: RuntimeError = load.clone().into();
        assert_eq!(runtime, RuntimeError::Link(load));
        assert_eq!(
            runtime.to_string(),
            "class 'A' depends on undefined class 'B'"
        );
    }

    #[test]
    fn unified_error_classification() {
        let err: ClassforgeError = LoadError::DuplicateDefinition("A".into()).into();
        assert!(err.is_load());
        assert!(!err.is_runtime());
        let err: ClassforgeError = ConstructionError::EmptyName.into();
        assert!(err.is_construction());
    }
}
