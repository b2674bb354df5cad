//! Bytecode chunk for compiled methods.

use super::OpCode;

/// A chunk of compiled bytecode for a single method.
///
/// Constants live in the class-level `ConstantPool`, not per method.
#[derive(Debug, Clone, Default)]
pub struct BytecodeChunk {
    /// The bytecode instructions.
    code: Vec<u8>,
    /// Set when a jump distance did not fit its u16 operand.
    overflowed: bool,
}

impl BytecodeChunk {
    /// Create a new empty bytecode chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an opcode.
    pub fn write_op(&mut self, op: OpCode) {
        self.code.push(op.into());
    }

    /// Write a byte operand.
    pub fn write_byte(&mut self, byte: u8) {
        self.code.push(byte);
    }

    /// Write a 16-bit operand (big-endian).
    pub fn write_u16(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    /// Get current code offset (for jump patching).
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Emit a jump instruction and return the operand offset to patch later.
    ///
    /// The jump distance is initialized to 0xFFFF as a placeholder.
    pub fn emit_jump(&mut self, op: OpCode) -> usize {
        self.write_op(op);
        let offset = self.code.len();
        self.write_u16(0xFFFF);
        offset
    }

    /// Patch the jump whose operand is at `offset` to land at the current position.
    pub fn patch_jump(&mut self, offset: usize) {
        let distance = self.code.len() - offset - 2;
        let Ok(distance) = u16::try_from(distance) else {
            self.overflowed = true;
            return;
        };
        self.code[offset..offset + 2].copy_from_slice(&distance.to_be_bytes());
    }

    /// Emit a loop instruction that jumps back to `loop_start`.
    pub fn emit_loop(&mut self, loop_start: usize) {
        self.write_op(OpCode::Loop);

        // +2 for the operand bytes about to be written
        let distance = self.code.len() - loop_start + 2;
        match u16::try_from(distance) {
            Ok(distance) => self.write_u16(distance),
            Err(_) => {
                self.overflowed = true;
                self.write_u16(0);
            }
        }
    }

    /// Whether a jump distance exceeded the operand range.
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Get the bytecode.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Consume the chunk, returning its bytes.
    pub fn into_code(self) -> Vec<u8> {
        self.code
    }

    /// Get the length of the bytecode.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Check if the chunk is empty.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Read a byte at the given offset.
    pub fn read_byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    /// Read a u16 at the given offset (big-endian).
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let bytes = self.code.get(offset..offset + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Read an opcode at the given offset.
    pub fn read_op(&self, offset: usize) -> Option<OpCode> {
        self.code.get(offset).and_then(|&b| OpCode::from_u8(b))
    }

    /// Extract all opcodes from the chunk, skipping operands.
    pub fn opcodes(&self) -> Vec<OpCode> {
        decode_opcodes(&self.code)
    }

    /// Check if this chunk contains exactly the given opcode sequence.
    ///
    /// Panics with a descriptive message if the sequences don't match.
    #[track_caller]
    pub fn assert_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        assert_eq!(
            actual,
            expected,
            "Bytecode mismatch.\nExpected: {:?}\nActual:   {:?}",
            expected.iter().map(|op| op.name()).collect::<Vec<_>>(),
            actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
        );
    }
}

/// Opcodes of a raw code array, skipping operands and undecodable bytes.
pub fn decode_opcodes(code: &[u8]) -> Vec<OpCode> {
    let mut ops = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        match OpCode::from_u8(code[offset]) {
            Some(op) => {
                ops.push(op);
                offset += 1 + op.operand_size();
            }
            None => offset += 1,
        }
    }
    ops
}
