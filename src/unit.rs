//! Compilation unit.
//!
//! A [`CompilationUnit`] owns the class definitions compiled together, the
//! symbol registry they are declared in and the configuration of the run.
//! Definitions come in as trees, not text, so the parsing phase is always
//! skipped.
//!
//! # Example
//!
//! ```
//! use classforge::{CompilationUnit, CompilerConfig};
//! use classforge_ast::ClassDefinition;
//! use classforge_ast::build::*;
//! use classforge_core::{DataType, Modifiers};
//!
//! let mut class = ClassDefinition::named("pkg.Answer").unwrap();
//! class.add_method("get", Modifiers::PUBLIC, DataType::Int, vec![], block(vec![ret(lit_int(42))]));
//!
//! let mut unit = CompilationUnit::new(CompilerConfig::default());
//! unit.add_class(class).unwrap();
//! unit.compile_all().unwrap();
//! assert_eq!(unit.artifacts().count(), 1);
//! ```

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, trace, warn};

use classforge_ast::ClassDefinition;
use classforge_compiler::{GenerationPass, LoweringPass, ResolutionPass, TypeCheckPass};
use classforge_core::{CompileError, ConstructionError, Diagnostic, LoadError, known};
use classforge_registry::SymbolRegistry;
use classforge_runtime::{ClassLoader, LoadedClass};

use crate::artifact::Artifacts;
use crate::config::CompilerConfig;
use crate::module::{ContextProvider, ErrorCollector, ModuleContext, SyntheticContextProvider};

/// Compilation phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Registry and module bookkeeping.
    Initialization,
    /// Text acquisition and parsing; skipped for class definitions.
    Parsing,
    /// Declare every class, then resolve superclasses, enclosing classes and
    /// member signatures.
    Resolution,
    /// Check member bodies against declared types, when enabled.
    TypeChecking,
    /// Default constructors, field initializers, implicit returns, folding.
    Lowering,
    /// One class file per class.
    ClassGeneration,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Initialization,
        Phase::Parsing,
        Phase::Resolution,
        Phase::TypeChecking,
        Phase::Lowering,
        Phase::ClassGeneration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::Initialization => "initialization",
            Phase::Parsing => "parsing",
            Phase::Resolution => "resolution",
            Phase::TypeChecking => "type checking",
            Phase::Lowering => "lowering",
            Phase::ClassGeneration => "class generation",
        }
    }
}

/// Classes compiled together, with their registry and configuration.
pub struct CompilationUnit {
    config: CompilerConfig,
    provider: Box<dyn ContextProvider>,
    registry: SymbolRegistry,
    modules: Vec<ModuleContext>,
    /// Qualified name to module index.
    index: FxHashMap<String, usize>,
    /// Diagnostics that name no class of the unit.
    unattributed: ErrorCollector,
    completed: Option<Phase>,
}

impl CompilationUnit {
    pub fn new(config: CompilerConfig) -> Self {
        Self::with_provider(config, SyntheticContextProvider)
    }

    pub fn with_provider(config: CompilerConfig, provider: impl ContextProvider + 'static) -> Self {
        Self {
            config,
            provider: Box::new(provider),
            registry: SymbolRegistry::with_host_library(),
            modules: Vec::new(),
            index: FxHashMap::default(),
            unattributed: ErrorCollector::new(),
            completed: None,
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn registry(&self) -> &SymbolRegistry {
        &self.registry
    }

    pub fn modules(&self) -> &[ModuleContext] {
        &self.modules
    }

    pub fn module(&self, class: &str) -> Option<&ModuleContext> {
        self.index.get(class).map(|&i| &self.modules[i])
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Last phase that ran to completion.
    pub fn completed_phase(&self) -> Option<Phase> {
        self.completed
    }

    /// Add a class definition and every class nested in it.
    ///
    /// Each class is wrapped in its own module. The definition is validated
    /// as a whole; on error nothing is added.
    pub fn add_class(&mut self, class: ClassDefinition) -> Result<(), ConstructionError> {
        if self.completed.is_some() {
            return Err(ConstructionError::UnitSealed(class.name.to_string()));
        }

        let mut flat = Vec::new();
        flatten(class, &mut flat)?;

        let mut seen = FxHashSet::default();
        for class in &flat {
            let name = class.name.to_string();
            if self.index.contains_key(&name)
                || is_host_class(&name)
                || !seen.insert(name.clone())
            {
                return Err(ConstructionError::DuplicateClass(name));
            }
        }

        for class in flat {
            let module = self.provider.wrap(class);
            debug!(module = module.name(), "registered module");
            self.index.insert(module.class_name().to_string(), self.modules.len());
            self.modules.push(module);
        }
        Ok(())
    }

    /// Run every phase.
    pub fn compile_all(&mut self) -> Result<(), CompileError> {
        self.compile(Phase::ClassGeneration)
    }

    /// Run phases up to and including `up_to`, continuing after the last
    /// completed phase.
    ///
    /// Classes with errors drop out of later phases; the others still produce
    /// artifacts unless the configuration is atomic. Any error diagnostic in
    /// the unit makes this return [`CompileError::Semantic`].
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile(&mut self, up_to: Phase) -> Result<(), CompileError> {
        if self.modules.is_empty() {
            return Err(CompileError::Empty);
        }

        info!(
            classes = self.modules.len(),
            up_to = up_to.name(),
            type_checking = self.config.static_type_checking,
            "compiling unit"
        );

        for phase in Phase::ALL {
            if self.completed.is_some_and(|done| phase <= done) || phase > up_to {
                continue;
            }
            self.run_phase(phase);
            self.completed = Some(phase);
        }

        if self.config.atomic && self.has_errors() {
            for module in &mut self.modules {
                module.artifact = None;
            }
        }

        self.result()
    }

    fn run_phase(&mut self, phase: Phase) {
        match phase {
            Phase::Initialization => {
                info!(phase = phase.name(), modules = self.modules.len(), "phase started");
            }
            Phase::Parsing => {
                trace!(phase = phase.name(), "no source text, phase skipped");
            }
            Phase::Resolution => {
                info!(phase = phase.name(), "phase started");
                self.resolve();
            }
            Phase::TypeChecking if self.config.static_type_checking => {
                info!(phase = phase.name(), "phase started");
                self.type_check();
            }
            Phase::TypeChecking => {
                trace!(phase = phase.name(), "type checking disabled, phase skipped");
            }
            Phase::Lowering => {
                info!(phase = phase.name(), "phase started");
                self.lower();
            }
            Phase::ClassGeneration => {
                info!(phase = phase.name(), "phase started");
                self.generate();
            }
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn resolve(&mut self) {
        let classes: Vec<&ClassDefinition> = self.modules.iter().map(ModuleContext::class).collect();
        let diagnostics = ResolutionPass::new(&mut self.registry).run(&classes);
        self.attribute(diagnostics);
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn type_check(&mut self) {
        let pass = TypeCheckPass::new(&self.registry);
        for module in self.modules.iter_mut().filter(|m| !m.has_errors()) {
            let diagnostics = pass.check_class(module.class());
            debug!(module = module.name(), diagnostics = diagnostics.len(), "type checked");
            module.errors_mut().extend(diagnostics);
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn lower(&mut self) {
        let pass = LoweringPass::new(self.config.optimize);
        for module in self.modules.iter_mut().filter(|m| !m.has_errors()) {
            module.lowered = Some(pass.lower_class(module.class()));
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn generate(&mut self) {
        let pass = GenerationPass::new(&self.registry, self.config.codegen_mode());
        for module in self.modules.iter_mut().filter(|m| !m.has_errors()) {
            let Some(lowered) = module.lowered.as_ref() else {
                continue;
            };
            match pass.generate(lowered) {
                Ok(artifact) => {
                    debug!(module = module.name(), bytes = artifact.bytes.len(), "class generated");
                    module.artifact = Some(artifact);
                }
                Err(diagnostics) => module.errors_mut().extend(diagnostics),
            }
        }
    }

    /// Route diagnostics to the modules of the classes they name.
    fn attribute(&mut self, diagnostics: Vec<Diagnostic>) {
        for diagnostic in diagnostics {
            match self.index.get(&diagnostic.class) {
                Some(&i) => self.modules[i].errors_mut().push(diagnostic),
                None => self.unattributed.push(diagnostic),
            }
        }
    }

    fn has_errors(&self) -> bool {
        self.unattributed.has_errors() || self.modules.iter().any(ModuleContext::has_errors)
    }

    /// Every diagnostic of the unit, module by module.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.unattributed
            .diagnostics()
            .iter()
            .chain(self.modules.iter().flat_map(|m| m.errors().diagnostics()))
            .cloned()
            .collect()
    }

    fn result(&self) -> Result<(), CompileError> {
        if !self.has_errors() {
            return Ok(());
        }
        let failed_classes: Vec<String> = self
            .modules
            .iter()
            .filter(|m| m.has_errors())
            .map(|m| m.class_name().to_string())
            .collect();
        let diagnostics = self.diagnostics();
        warn!(
            errors = diagnostics.iter().filter(|d| d.is_error()).count(),
            failed = failed_classes.len(),
            "compilation finished with errors"
        );
        Err(CompileError::Semantic {
            diagnostics,
            failed_classes,
        })
    }

    /// Generated class files, in registration order.
    pub fn artifacts(&self) -> Artifacts<'_> {
        Artifacts::new(&self.modules)
    }

    /// Define every generated class into `loader`.
    pub fn load_into(&self, loader: &ClassLoader) -> Result<Vec<Arc<LoadedClass>>, LoadError> {
        loader.define_all(self.artifacts())
    }
}

impl std::fmt::Debug for CompilationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationUnit")
            .field("config", &self.config)
            .field("modules", &self.modules.len())
            .field("completed", &self.completed)
            .finish()
    }
}

fn is_host_class(name: &str) -> bool {
    [known::OBJECT, known::STRING, known::STRING_BUILDER].contains(&name)
}

/// Move `class` and its nested classes into `out`, outer classes first,
/// checking nested names against their enclosing class.
fn flatten(mut class: ClassDefinition, out: &mut Vec<ClassDefinition>) -> Result<(), ConstructionError> {
    if let Some(enclosing) = &class.enclosing {
        let expected = enclosing.nested(class.name.simple_name())?;
        if class.name != expected {
            return Err(ConstructionError::NestedNameMismatch {
                name: class.name.to_string(),
                expected: expected.to_string(),
            });
        }
    }

    let nested = std::mem::take(&mut class.nested);
    let outer = class.name.clone();
    out.push(class);

    for child in nested {
        if child.enclosing.as_ref() != Some(&outer) {
            let expected = outer.nested(child.name.simple_name())?;
            return Err(ConstructionError::NestedNameMismatch {
                name: child.name.to_string(),
                expected: expected.to_string(),
            });
        }
        flatten(child, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use classforge_ast::build::*;
    use classforge_core::{DataType, ErrorCode, Modifiers, QualifiedName};

    fn q(s: &str) -> QualifiedName {
        QualifiedName::parse(s).unwrap()
    }

    fn answer(name: &str) -> ClassDefinition {
        let mut class = ClassDefinition::new(q(name));
        class.add_method("get", Modifiers::PUBLIC, DataType::Int, vec![], block(vec![ret(lit_int(1))]));
        class
    }

    fn broken(name: &str) -> ClassDefinition {
        let mut class = ClassDefinition::new(q(name));
        class.add_method("get", Modifiers::PUBLIC, DataType::Int, vec![], block(vec![ret(lit_str("no"))]));
        class
    }

    #[test]
    fn nested_classes_get_their_own_modules() {
        let mut outer = ClassDefinition::new(q("pkg.Outer"));
        let mut inner = ClassDefinition::nested_in(&q("pkg.Outer"), "Inner", Modifiers::PUBLIC).unwrap();
        let deep = ClassDefinition::nested_in(&q("pkg.Outer$Inner"), "Deep", Modifiers::PUBLIC).unwrap();
        inner.add_nested(deep).unwrap();
        outer.add_nested(inner).unwrap();

        let mut unit = CompilationUnit::new(CompilerConfig::default());
        unit.add_class(outer).unwrap();
        let names: Vec<String> = unit.modules().iter().map(|m| m.class_name().to_string()).collect();
        assert_eq!(names, ["pkg.Outer", "pkg.Outer$Inner", "pkg.Outer$Inner$Deep"]);
        assert!(unit.module("pkg.Outer").unwrap().class().nested.is_empty());
    }

    #[test]
    fn rejects_duplicates_and_host_names() {
        let mut unit = CompilationUnit::new(CompilerConfig::default());
        unit.add_class(answer("pkg.A")).unwrap();
        assert_eq!(
            unit.add_class(answer("pkg.A")),
            Err(ConstructionError::DuplicateClass("pkg.A".into()))
        );
        assert_eq!(
            unit.add_class(answer("lang.String")),
            Err(ConstructionError::DuplicateClass("lang.String".into()))
        );
        assert_eq!(unit.len(), 1);
    }

    #[test]
    fn rejects_mismatched_nested_name() {
        let mut outer = ClassDefinition::new(q("pkg.Outer"));
        let mut stray = ClassDefinition::new(q("pkg.Other$Inner"));
        stray.enclosing = Some(q("pkg.Outer"));
        outer.nested.push(stray);

        let mut unit = CompilationUnit::new(CompilerConfig::default());
        assert!(matches!(
            unit.add_class(outer),
            Err(ConstructionError::NestedNameMismatch { .. })
        ));
        assert!(unit.is_empty());
    }

    #[test]
    fn empty_unit_fails() {
        let mut unit = CompilationUnit::new(CompilerConfig::default());
        assert_eq!(unit.compile_all(), Err(CompileError::Empty));
    }

    #[test]
    fn resumes_from_last_completed_phase() {
        let mut unit = CompilationUnit::new(CompilerConfig::default());
        unit.add_class(answer("pkg.A")).unwrap();

        unit.compile(Phase::Resolution).unwrap();
        assert_eq!(unit.completed_phase(), Some(Phase::Resolution));
        assert_eq!(unit.artifacts().count(), 0);
        assert!(matches!(unit.add_class(answer("pkg.B")), Err(ConstructionError::UnitSealed(_))));

        unit.compile_all().unwrap();
        assert_eq!(unit.completed_phase(), Some(Phase::ClassGeneration));
        assert_eq!(unit.artifacts().count(), 1);

        // nothing left to run
        unit.compile_all().unwrap();
        assert_eq!(unit.artifacts().count(), 1);
    }

    #[test]
    fn failing_class_does_not_block_siblings() {
        let mut unit = CompilationUnit::new(CompilerConfig::default());
        unit.add_class(answer("pkg.Good")).unwrap();
        unit.add_class(broken("pkg.Bad")).unwrap();

        let Err(CompileError::Semantic { diagnostics, failed_classes }) = unit.compile_all() else {
            panic!("expected semantic errors");
        };
        assert_eq!(failed_classes, ["pkg.Bad"]);
        assert!(diagnostics.iter().any(|d| d.code == ErrorCode::TypeMismatch && d.class == "pkg.Bad"));
        let names: Vec<String> = unit.artifacts().map(|a| a.name.to_string()).collect();
        assert_eq!(names, ["pkg.Good"]);
    }

    #[test]
    fn atomic_run_suppresses_everything() {
        let mut unit = CompilationUnit::new(CompilerConfig::default().with_atomic(true));
        unit.add_class(answer("pkg.Good")).unwrap();
        unit.add_class(broken("pkg.Bad")).unwrap();
        assert!(unit.compile_all().is_err());
        assert_eq!(unit.artifacts().count(), 0);
    }

    #[test]
    fn type_checking_can_be_disabled() {
        let mut unit = CompilationUnit::new(CompilerConfig::default().with_static_type_checking(false));
        unit.add_class(broken("pkg.Bad")).unwrap();
        unit.compile_all().unwrap();
        assert_eq!(unit.artifacts().count(), 1);
    }

    #[test]
    fn resolution_errors_are_attributed_to_their_class() {
        let mut unit = CompilationUnit::new(CompilerConfig::default());
        unit.add_class(ClassDefinition::new(q("pkg.Child")).with_superclass(q("pkg.Missing")))
            .unwrap();
        let err = unit.compile_all().unwrap_err();
        assert!(err.diagnostics().iter().all(|d| d.class == "pkg.Child"));
        assert!(unit.module("pkg.Child").unwrap().has_errors());
    }
}
