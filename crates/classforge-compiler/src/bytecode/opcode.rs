//! Bytecode operation codes.
//!
//! Each opcode is a single byte, with big-endian operands following inline.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Bytecode operation codes.
///
/// The interpreter is a stack machine. Typed instructions (`GetField`,
/// `Invoke*`) reference the constant pool and push a value only when the
/// descriptor returns one. Dynamic instructions (`*Dyn`, `InvokeDynamic`)
/// resolve members by name at run time and always push exactly one value,
/// `null` for void methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Push constant from pool.
    /// Operand: u16 constant index (Int, Long, Double or String entry)
    Ldc = 0,
    /// Push null reference.
    PushNull,
    /// Push boolean true.
    PushTrue,
    /// Push boolean false.
    PushFalse,
    /// Push int 0.
    PushZero,
    /// Push int 1.
    PushOne,

    // =========================================================================
    // Stack Operations
    // =========================================================================
    /// Pop top of stack.
    Pop,
    /// Duplicate top of stack.
    Dup,
    /// Duplicate top of stack beneath the second value: `a b -> b a b`.
    DupX1,

    // =========================================================================
    // Local Variables
    // =========================================================================
    /// Load local variable.
    /// Operand: u16 slot index
    Load,
    /// Store to local variable.
    /// Operand: u16 slot index
    Store,

    // =========================================================================
    // Object Fields
    // =========================================================================
    /// Pop object, push field value.
    /// Operand: u16 FieldRef index
    GetField,
    /// Pop value and object, store field.
    /// Operand: u16 FieldRef index
    PutField,
    /// Pop object, push field value looked up by name.
    /// Operand: u16 Utf8 index (field name)
    GetFieldDyn,
    /// Pop value and object, store field looked up by name.
    /// Operand: u16 Utf8 index (field name)
    PutFieldDyn,

    // =========================================================================
    // Objects and Calls
    // =========================================================================
    /// Allocate an uninitialized instance.
    /// Operand: u16 Class index
    New,
    /// Virtual call on a receiver.
    /// Operand: u16 MethodRef index
    InvokeVirtual,
    /// Non-virtual call of the exact referenced method (constructors).
    /// Operand: u16 MethodRef index
    InvokeSpecial,
    /// Static call.
    /// Operand: u16 MethodRef index
    InvokeStatic,
    /// Virtual call selected by name and runtime argument types.
    /// Operands: u16 Utf8 index (method name), u8 argument count
    InvokeDynamic,
    /// Constructor of a class selected by runtime argument types. Pushes nothing.
    /// Operands: u16 Class index, u8 argument count
    InvokeSpecialDyn,
    /// Static call selected by name and runtime argument types.
    /// Operands: u16 Class index, u16 Utf8 index (method name), u8 argument count
    InvokeStaticDyn,

    // =========================================================================
    // Arithmetic
    // =========================================================================
    /// Addition; string concatenation when either operand is a string.
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    /// Pop two values, push their string concatenation.
    Concat,

    // =========================================================================
    // Conversions
    // =========================================================================
    /// int → long.
    I2L,
    /// int → double.
    I2D,
    /// long → double.
    L2D,

    // =========================================================================
    // Comparison and Logic
    // =========================================================================
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Not,

    // =========================================================================
    // Control Flow
    // =========================================================================
    /// Unconditional forward jump.
    /// Operand: u16 distance from the end of the instruction
    Jump,
    /// Pop boolean, jump forward if false.
    /// Operand: u16 distance from the end of the instruction
    JumpIfFalse,
    /// Unconditional backward jump.
    /// Operand: u16 distance back from the end of the instruction
    Loop,
    /// Pop and return a value.
    Return,
    /// Return without a value.
    ReturnVoid,
}

impl OpCode {
    /// Decode an opcode byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Number of operand bytes following the opcode.
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::Ldc
            | OpCode::Load
            | OpCode::Store
            | OpCode::GetField
            | OpCode::PutField
            | OpCode::GetFieldDyn
            | OpCode::PutFieldDyn
            | OpCode::New
            | OpCode::InvokeVirtual
            | OpCode::InvokeSpecial
            | OpCode::InvokeStatic
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::Loop => 2,

            OpCode::InvokeDynamic | OpCode::InvokeSpecialDyn => 3,

            OpCode::InvokeStaticDyn => 5,

            _ => 0,
        }
    }

    /// Whether control never falls through to the next instruction.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            OpCode::Jump | OpCode::Loop | OpCode::Return | OpCode::ReturnVoid
        )
    }

    /// Get the opcode name for debugging.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Ldc => "Ldc",
            OpCode::PushNull => "PushNull",
            OpCode::PushTrue => "PushTrue",
            OpCode::PushFalse => "PushFalse",
            OpCode::PushZero => "PushZero",
            OpCode::PushOne => "PushOne",
            OpCode::Pop => "Pop",
            OpCode::Dup => "Dup",
            OpCode::DupX1 => "DupX1",
            OpCode::Load => "Load",
            OpCode::Store => "Store",
            OpCode::GetField => "GetField",
            OpCode::PutField => "PutField",
            OpCode::GetFieldDyn => "GetFieldDyn",
            OpCode::PutFieldDyn => "PutFieldDyn",
            OpCode::New => "New",
            OpCode::InvokeVirtual => "InvokeVirtual",
            OpCode::InvokeSpecial => "InvokeSpecial",
            OpCode::InvokeStatic => "InvokeStatic",
            OpCode::InvokeDynamic => "InvokeDynamic",
            OpCode::InvokeSpecialDyn => "InvokeSpecialDyn",
            OpCode::InvokeStaticDyn => "InvokeStaticDyn",
            OpCode::Add => "Add",
            OpCode::Sub => "Sub",
            OpCode::Mul => "Mul",
            OpCode::Div => "Div",
            OpCode::Rem => "Rem",
            OpCode::Neg => "Neg",
            OpCode::Concat => "Concat",
            OpCode::I2L => "I2L",
            OpCode::I2D => "I2D",
            OpCode::L2D => "L2D",
            OpCode::Eq => "Eq",
            OpCode::Ne => "Ne",
            OpCode::Lt => "Lt",
            OpCode::Le => "Le",
            OpCode::Gt => "Gt",
            OpCode::Ge => "Ge",
            OpCode::Not => "Not",
            OpCode::Jump => "Jump",
            OpCode::JumpIfFalse => "JumpIfFalse",
            OpCode::Loop => "Loop",
            OpCode::Return => "Return",
            OpCode::ReturnVoid => "ReturnVoid",
        }
    }
}
