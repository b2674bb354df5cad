//! Compiler passes, in the order the driver runs them.
//!
//! - [`resolution`]: declare class signatures, resolve type references
//! - [`type_check`]: check member bodies against declared types (optional)
//! - [`lowering`]: desugar constructors, implicit returns, constant folding
//! - [`generation`]: emit class files

pub mod generation;
pub mod lowering;
pub mod resolution;
pub mod type_check;

pub use generation::GenerationPass;
pub use lowering::{LoweredClass, LoweredMethod, LoweringPass};
pub use resolution::ResolutionPass;
pub use type_check::TypeCheckPass;
