//! Bytecode emitter.
//!
//! [`BytecodeEmitter`] writes one method's instructions into a
//! [`BytecodeChunk`] and interns every operand it references in the class
//! level [`ConstantPool`].
//!
//! ```
//! use classforge_compiler::bytecode::{ConstantPool, OpCode};
//! use classforge_compiler::emit::BytecodeEmitter;
//!
//! let mut constants = ConstantPool::new();
//! let mut emitter = BytecodeEmitter::new(&mut constants);
//! emitter.emit_int(40);
//! emitter.emit_int(2);
//! emitter.emit(OpCode::Add);
//! emitter.emit(OpCode::Return);
//!
//! let chunk = emitter.finish();
//! chunk.assert_opcodes(&[OpCode::Ldc, OpCode::Ldc, OpCode::Add, OpCode::Return]);
//! ```

use classforge_core::DataType;

use crate::bytecode::{BytecodeChunk, ConstantPool, OpCode};

/// Operand of a forward jump, patched once the target is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct JumpLabel(usize);

/// A string constant did not fit the class file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringTooLong(pub usize);

pub struct BytecodeEmitter<'pool> {
    chunk: BytecodeChunk,
    constants: &'pool mut ConstantPool,
}

impl<'pool> BytecodeEmitter<'pool> {
    pub fn new(constants: &'pool mut ConstantPool) -> Self {
        Self {
            chunk: BytecodeChunk::new(),
            constants,
        }
    }

    // ==========================================================================
    // Basic Emission
    // ==========================================================================

    pub fn emit(&mut self, op: OpCode) {
        self.chunk.write_op(op);
    }

    /// Emit opcode with a 16-bit operand.
    pub fn emit_u16(&mut self, op: OpCode, value: u16) {
        self.chunk.write_op(op);
        self.chunk.write_u16(value);
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    /// Push an int, using `PushZero`/`PushOne` where possible.
    pub fn emit_int(&mut self, value: i32) {
        match value {
            0 => self.emit(OpCode::PushZero),
            1 => self.emit(OpCode::PushOne),
            _ => {
                let index = self.constants.add_int(value);
                self.emit_u16(OpCode::Ldc, index);
            }
        }
    }

    pub fn emit_long(&mut self, value: i64) {
        let index = self.constants.add_long(value);
        self.emit_u16(OpCode::Ldc, index);
    }

    pub fn emit_double(&mut self, value: f64) {
        let index = self.constants.add_double(value);
        self.emit_u16(OpCode::Ldc, index);
    }

    /// Push a string constant.
    pub fn emit_string(&mut self, value: &str) -> Result<(), StringTooLong> {
        if value.len() > u16::MAX as usize {
            return Err(StringTooLong(value.len()));
        }
        let index = self.constants.add_string(value);
        self.emit_u16(OpCode::Ldc, index);
        Ok(())
    }

    pub fn emit_null(&mut self) {
        self.emit(OpCode::PushNull);
    }

    pub fn emit_bool(&mut self, value: bool) {
        self.emit(if value {
            OpCode::PushTrue
        } else {
            OpCode::PushFalse
        });
    }

    // ==========================================================================
    // Locals
    // ==========================================================================

    pub fn emit_load(&mut self, slot: u16) {
        self.emit_u16(OpCode::Load, slot);
    }

    pub fn emit_store(&mut self, slot: u16) {
        self.emit_u16(OpCode::Store, slot);
    }

    // ==========================================================================
    // Typed member access
    // ==========================================================================

    pub fn emit_new(&mut self, class: &str) {
        let index = self.constants.add_class(class);
        self.emit_u16(OpCode::New, index);
    }

    /// `GetField` or `PutField` through a FieldRef.
    pub fn emit_field(&mut self, op: OpCode, class: &str, name: &str, ty: &DataType) {
        let index = self.constants.add_field_ref(class, name, &ty.descriptor());
        self.emit_u16(op, index);
    }

    /// One of the typed invoke instructions through a MethodRef.
    pub fn emit_invoke(&mut self, op: OpCode, class: &str, name: &str, descriptor: &str) {
        let index = self.constants.add_method_ref(class, name, descriptor);
        self.emit_u16(op, index);
    }

    // ==========================================================================
    // Dynamic member access
    // ==========================================================================

    pub fn emit_field_dyn(&mut self, op: OpCode, name: &str) {
        let index = self.constants.add_utf8(name);
        self.emit_u16(op, index);
    }

    /// `InvokeDynamic name argc`.
    pub fn emit_invoke_dynamic(&mut self, name: &str, argc: u8) {
        let index = self.constants.add_utf8(name);
        self.emit_u16(OpCode::InvokeDynamic, index);
        self.chunk.write_byte(argc);
    }

    /// `InvokeSpecialDyn class argc`, a constructor selected at run time.
    pub fn emit_invoke_special_dyn(&mut self, class: &str, argc: u8) {
        let index = self.constants.add_class(class);
        self.emit_u16(OpCode::InvokeSpecialDyn, index);
        self.chunk.write_byte(argc);
    }

    /// `InvokeStaticDyn class name argc`.
    pub fn emit_invoke_static_dyn(&mut self, class: &str, name: &str, argc: u8) {
        let class = self.constants.add_class(class);
        let name = self.constants.add_utf8(name);
        self.emit_u16(OpCode::InvokeStaticDyn, class);
        self.chunk.write_u16(name);
        self.chunk.write_byte(argc);
    }

    // ==========================================================================
    // Conversions
    // ==========================================================================

    /// Widen the value on top of the stack from `from` to `to`.
    ///
    /// Emits nothing when no primitive widening applies.
    pub fn emit_widen(&mut self, from: &DataType, to: &DataType) {
        match (from, to) {
            (DataType::Int, DataType::Long) => self.emit(OpCode::I2L),
            (DataType::Int, DataType::Double) => self.emit(OpCode::I2D),
            (DataType::Long, DataType::Double) => self.emit(OpCode::L2D),
            _ => {}
        }
    }

    // ==========================================================================
    // Jumps
    // ==========================================================================

    pub fn emit_jump(&mut self, op: OpCode) -> JumpLabel {
        JumpLabel(self.chunk.emit_jump(op))
    }

    /// Point a forward jump at the current position.
    pub fn patch_jump(&mut self, label: JumpLabel) {
        self.chunk.patch_jump(label.0);
    }

    pub fn emit_loop(&mut self, target: usize) {
        self.chunk.emit_loop(target);
    }

    pub fn current_offset(&self) -> usize {
        self.chunk.current_offset()
    }

    // ==========================================================================
    // Finalization
    // ==========================================================================

    pub fn chunk(&self) -> &BytecodeChunk {
        &self.chunk
    }

    pub fn finish(self) -> BytecodeChunk {
        self.chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_ints_use_dedicated_opcodes() {
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);
        emitter.emit_int(0);
        emitter.emit_int(1);
        emitter.emit_int(2);
        emitter.finish().assert_opcodes(&[OpCode::PushZero, OpCode::PushOne, OpCode::Ldc]);
        assert_eq!(constants.len(), 1);
    }

    #[test]
    fn strings_are_interned() {
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);
        emitter.emit_string("testString").unwrap();
        emitter.emit_string("testString").unwrap();
        let chunk = emitter.finish();
        assert_eq!(chunk.read_u16(1), chunk.read_u16(4));
        assert_eq!(constants.string(chunk.read_u16(1).unwrap()), Some("testString"));
    }

    #[test]
    fn oversized_string_is_refused() {
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);
        let huge = "x".repeat(u16::MAX as usize + 1);
        assert_eq!(emitter.emit_string(&huge), Err(StringTooLong(huge.len())));
        assert!(emitter.chunk().is_empty());
    }

    #[test]
    fn forward_jump_lands_after_body() {
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);
        emitter.emit_bool(true);
        let label = emitter.emit_jump(OpCode::JumpIfFalse);
        emitter.emit(OpCode::PushNull);
        emitter.emit(OpCode::Pop);
        emitter.patch_jump(label);
        let chunk = emitter.finish();
        // operand at 2..4, two single-byte instructions skipped
        assert_eq!(chunk.read_u16(2), Some(2));
    }

    #[test]
    fn widening_opcodes() {
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);
        emitter.emit_widen(&DataType::Int, &DataType::Long);
        emitter.emit_widen(&DataType::Int, &DataType::Double);
        emitter.emit_widen(&DataType::Long, &DataType::Double);
        emitter.emit_widen(&DataType::Int, &DataType::Int);
        emitter.finish().assert_opcodes(&[OpCode::I2L, OpCode::I2D, OpCode::L2D]);
    }

    #[test]
    fn dynamic_invokes_carry_argc() {
        let mut constants = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut constants);
        emitter.emit_invoke_dynamic("append", 1);
        emitter.emit_invoke_static_dyn("pkg.Util", "twice", 2);
        let chunk = emitter.finish();
        chunk.assert_opcodes(&[OpCode::InvokeDynamic, OpCode::InvokeStaticDyn]);
        assert_eq!(chunk.read_byte(3), Some(1));
        assert_eq!(chunk.read_byte(chunk.len() - 1), Some(2));
    }
}
