//! Synthetic modules.
//!
//! Every class definition compiled by a [`CompilationUnit`](crate::CompilationUnit)
//! is wrapped in a [`ModuleContext`]: the grouping later phases attach
//! diagnostics and intermediate results to. A module built from a class
//! definition has a name but never any source text.

use classforge_ast::ClassDefinition;
use classforge_compiler::{GeneratedArtifact, LoweredClass};
use classforge_core::{Diagnostic, QualifiedName};

/// Builds the module wrapping a class definition.
pub trait ContextProvider: Send + Sync {
    fn wrap(&self, class: ClassDefinition) -> ModuleContext;
}

/// Default provider: one module per class, named after the class.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticContextProvider;

impl SyntheticContextProvider {
    /// Module name used for a class.
    pub fn module_name(class: &QualifiedName) -> String {
        format!("<synthetic:{class}>")
    }
}

impl ContextProvider for SyntheticContextProvider {
    fn wrap(&self, class: ClassDefinition) -> ModuleContext {
        ModuleContext::new(Self::module_name(&class.name), class)
    }
}

/// Diagnostics collected for one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorCollector {
    diagnostics: Vec<Diagnostic>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Whether any collected diagnostic is an error (warnings do not count).
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }
}

/// One class definition with its diagnostic context and phase results.
#[derive(Debug, Clone)]
pub struct ModuleContext {
    name: String,
    class: ClassDefinition,
    errors: ErrorCollector,
    pub(crate) lowered: Option<LoweredClass>,
    pub(crate) artifact: Option<GeneratedArtifact>,
}

impl ModuleContext {
    pub fn new(name: impl Into<String>, class: ClassDefinition) -> Self {
        Self {
            name: name.into(),
            class,
            errors: ErrorCollector::new(),
            lowered: None,
            artifact: None,
        }
    }

    /// Module identity, used for logging and diagnostics only.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> &ClassDefinition {
        &self.class
    }

    pub fn class_name(&self) -> &QualifiedName {
        &self.class.name
    }

    /// Source text backing the module. Always absent for class definitions.
    pub fn source_text(&self) -> Option<&str> {
        None
    }

    pub fn errors(&self) -> &ErrorCollector {
        &self.errors
    }

    pub(crate) fn errors_mut(&mut self) -> &mut ErrorCollector {
        &mut self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors.has_errors()
    }

    /// Generated class file, once the module has passed code generation.
    pub fn artifact(&self) -> Option<&GeneratedArtifact> {
        self.artifact.as_ref()
    }
}
