//! classforge compiler
//!
//! Semantic passes and bytecode generation for class definition trees.
//!
//! ## Architecture
//!
//! - **Resolution**: declare every class signature, then resolve superclasses,
//!   enclosing classes, member signatures and type references
//! - **Type checking**: check member bodies against declared types (optional)
//! - **Lowering**: constructors, implicit returns, constant folding
//! - **Generation**: one class file per class
//!
//! The passes are driven by the `classforge` crate's compilation unit; they
//! can also be run directly.
//!
//! ## Modules
//!
//! - [`bytecode`]: opcodes, bytecode chunks and the constant pool
//! - [`classfile`]: binary class file encoding and decoding
//! - [`context`]: per-member compilation context
//! - [`emit`]: bytecode emitter
//! - [`method_compiler`]: statement and expression code generation
//! - [`passes`]: the compiler passes
//! - [`scope`]: local variable scopes
//! - [`typing`]: expression typing

pub mod bytecode;
pub mod classfile;
pub mod context;
pub mod emit;
pub mod method_compiler;
pub mod passes;
pub mod scope;
pub mod typing;

use classforge_core::{Modifiers, QualifiedName};

pub use bytecode::{BytecodeChunk, Constant, ConstantPool, OpCode};
pub use classfile::{ClassFile, ClassFileError};
pub use context::MethodContext;
pub use emit::BytecodeEmitter;
pub use method_compiler::{CodegenMode, MethodCompiler};
pub use passes::{GenerationPass, LoweredClass, LoweringPass, ResolutionPass, TypeCheckPass};
pub use scope::{LocalScope, LocalVar};
pub use typing::ExprTyper;

/// Name of the synthetic field holding an inner instance's outer instance.
pub const OUTER_FIELD: &str = "this$0";

/// Modifiers of the outer-instance field.
pub const OUTER_FIELD_MODIFIERS: Modifiers = Modifiers::PRIVATE
    .union(Modifiers::FINAL)
    .union(Modifiers::SYNTHETIC);

/// Class file bytes for one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub name: QualifiedName,
    pub bytes: Vec<u8>,
}

impl GeneratedArtifact {
    pub fn new(name: QualifiedName, bytes: Vec<u8>) -> Self {
        Self { name, bytes }
    }
}
