//! Bytecode types.
//!
//! - [`OpCode`] - The instruction set of the interpreter
//! - [`BytecodeChunk`] - Compiled bytecode for one method
//! - [`Constant`] and [`ConstantPool`] - Class-level constant storage

mod chunk;
mod constant;
mod opcode;

pub use chunk::{BytecodeChunk, decode_opcodes};
pub use constant::{Constant, ConstantPool, MemberRef};
pub use opcode::OpCode;
