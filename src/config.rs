//! Compiler configuration.

pub use classforge_runtime::VmConfig;

use classforge_compiler::CodegenMode;

/// Options shared by every phase of a compilation run.
///
/// ```
/// use classforge::CompilerConfig;
///
/// let config = CompilerConfig::new()
///     .with_static_type_checking(false)
///     .with_atomic(true);
/// assert!(!config.static_type_checking);
/// assert!(config.atomic);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Check member bodies against declared types and emit typed references.
    /// When off, member access is emitted by name and resolved at run time.
    pub static_type_checking: bool,
    /// Suppress every artifact of a run when any class has errors.
    pub atomic: bool,
    /// Fold constant expressions during lowering.
    pub optimize: bool,
    /// Interpreter limits for classes loaded from this run.
    pub vm: VmConfig,
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_static_type_checking(mut self, enabled: bool) -> Self {
        self.static_type_checking = enabled;
        self
    }

    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.vm = self.vm.with_max_call_depth(depth);
        self
    }

    /// How member references are emitted for this configuration.
    pub fn codegen_mode(&self) -> CodegenMode {
        if self.static_type_checking {
            CodegenMode::Static
        } else {
            CodegenMode::Dynamic
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            static_type_checking: true,
            atomic: false,
            optimize: true,
            vm: VmConfig::default(),
        }
    }
}
