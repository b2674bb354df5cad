//! Structural verification of class files.
//!
//! Runs once per class at define time, before anything in the class is
//! linked. A verified class has:
//!
//! - well-formed constant pool entries (every index in range, every entry of
//!   the expected kind, every descriptor parseable)
//! - consistent inner-class metadata (`Outer$Inner` naming)
//! - unique fields and methods with valid modifiers
//! - method code that decodes cleanly, keeps jumps on instruction
//!   boundaries and local accesses below `max_locals`, never underflows the
//!   operand stack, merges control flow at equal stack depths and never runs
//!   past the end of the code
//!
//! Member references are not resolved here; the interpreter links them on
//! first use.

use rustc_hash::FxHashSet;
use thiserror::Error;

use classforge_compiler::bytecode::{Constant, OpCode};
use classforge_compiler::classfile::{ClassFile, ClassFileError, MethodInfo};
use classforge_core::{DataType, Modifiers, QualifiedName, parse_method_descriptor};
use classforge_registry::MethodEntry;

/// Upper bound on operand stack depth.
pub const MAX_STACK_DEPTH: usize = u16::MAX as usize;

/// Reasons a class file is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Format(#[from] ClassFileError),

    #[error("constant #{index}: {message}")]
    BadConstant { index: u16, message: String },

    #[error("{0}")]
    BadClass(String),

    #[error("method {method}: {message}")]
    BadMethod { method: String, message: String },

    #[error("method {method} at offset {offset}: {message}")]
    BadCode {
        method: String,
        offset: usize,
        message: String,
    },
}

/// Verify a decoded class file.
pub fn verify(file: &ClassFile) -> Result<(), VerifyError> {
    verify_constants(file)?;
    let name = verify_header(file)?;
    verify_inner_classes(file, &name)?;
    verify_fields(file)?;
    verify_methods(file)
}

fn bad_class(message: impl Into<String>) -> VerifyError {
    VerifyError::BadClass(message.into())
}

// ==========================================================================
// Constant pool
// ==========================================================================

fn verify_constants(file: &ClassFile) -> Result<(), VerifyError> {
    let pool = &file.constants;
    for (i, constant) in pool.constants().iter().enumerate() {
        let index = (i + 1) as u16;
        let bad = |message: &str| VerifyError::BadConstant {
            index,
            message: message.to_string(),
        };
        match constant {
            Constant::Utf8(_) | Constant::Int(_) | Constant::Long(_) | Constant::Double(_) => {}
            Constant::String(utf8) => {
                pool.utf8(*utf8).ok_or_else(|| bad("string does not reference text"))?;
            }
            Constant::Class(utf8) => {
                let name = pool.utf8(*utf8).ok_or_else(|| bad("class does not reference text"))?;
                QualifiedName::parse(name).map_err(|_| bad("invalid class name"))?;
            }
            Constant::FieldRef { class, .. } => {
                let field = pool.field_ref(index).ok_or_else(|| bad("malformed field reference"))?;
                QualifiedName::parse(field.class).map_err(|_| bad("invalid field owner"))?;
                if pool.class_name(*class).is_none() || field.name.is_empty() {
                    return Err(bad("malformed field reference"));
                }
                match DataType::from_descriptor(field.descriptor) {
                    Some(ty) if !ty.is_void() => {}
                    _ => return Err(bad("invalid field descriptor")),
                }
            }
            Constant::MethodRef { .. } => {
                let method = pool.method_ref(index).ok_or_else(|| bad("malformed method reference"))?;
                QualifiedName::parse(method.class).map_err(|_| bad("invalid method owner"))?;
                if method.name.is_empty() {
                    return Err(bad("empty method name"));
                }
                parse_method_descriptor(method.descriptor).ok_or_else(|| bad("invalid method descriptor"))?;
            }
        }
    }
    Ok(())
}

// ==========================================================================
// Class structure
// ==========================================================================

fn verify_header(file: &ClassFile) -> Result<QualifiedName, VerifyError> {
    let name = file.name().ok_or_else(|| bad_class("this_class is not a class reference"))?;
    let name = QualifiedName::parse(name).map_err(|_| bad_class("invalid class name"))?;

    let access = Modifiers::from_bits(file.access).ok_or_else(|| bad_class("unknown access flags"))?;
    if access.is_abstract() && access.is_final() {
        return Err(bad_class("class is both abstract and final"));
    }

    let superclass = file
        .super_name()
        .ok_or_else(|| bad_class("super_class is not a class reference"))?;
    if superclass == name.to_string() {
        return Err(bad_class("class extends itself"));
    }
    Ok(name)
}

fn verify_inner_classes(file: &ClassFile, name: &QualifiedName) -> Result<(), VerifyError> {
    let this = name.to_string();
    let mut seen = FxHashSet::default();
    for info in &file.inner_classes {
        let inner = file.constants.class_name(info.inner_class);
        let outer = file.constants.class_name(info.outer_class);
        let simple = file.constants.utf8(info.simple_name);
        let (Some(inner), Some(outer), Some(simple)) = (inner, outer, simple) else {
            return Err(bad_class("malformed inner class entry"));
        };
        Modifiers::from_bits(info.access).ok_or_else(|| bad_class("unknown inner class access flags"))?;
        if !seen.insert(inner) {
            return Err(bad_class(format!("inner class '{inner}' listed twice")));
        }

        let inner_name = QualifiedName::parse(inner).map_err(|_| bad_class("invalid inner class name"))?;
        let expected_outer = inner_name.enclosing().map(|e| e.to_string());
        if expected_outer.as_deref() != Some(outer) || inner_name.simple_name() != simple {
            return Err(bad_class(format!(
                "inner class '{inner}' is not named '{outer}${simple}'"
            )));
        }
        if inner != this && outer != this {
            return Err(bad_class(format!("inner class entry '{inner}' is unrelated to '{this}'")));
        }
    }
    if name.is_nested() && !seen.contains(this.as_str()) {
        return Err(bad_class(format!("nested class '{this}' has no inner class entry")));
    }
    Ok(())
}

fn verify_fields(file: &ClassFile) -> Result<(), VerifyError> {
    let mut names = FxHashSet::default();
    for info in &file.fields {
        let name = file
            .constants
            .utf8(info.name)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| bad_class("field name is not text"))?;
        match file.constants.utf8(info.descriptor).and_then(DataType::from_descriptor) {
            Some(ty) if !ty.is_void() => {}
            _ => return Err(bad_class(format!("field '{name}' has an invalid descriptor"))),
        }
        Modifiers::from_bits(info.access).ok_or_else(|| bad_class(format!("field '{name}' has unknown flags")))?;
        if !names.insert(name) {
            return Err(bad_class(format!("duplicate field '{name}'")));
        }
    }
    Ok(())
}

fn verify_methods(file: &ClassFile) -> Result<(), VerifyError> {
    let class_access = Modifiers::from_bits_truncate(file.access);
    let mut signatures = FxHashSet::default();
    for info in &file.methods {
        let name = file
            .constants
            .utf8(info.name)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| bad_class("method name is not text"))?;
        let descriptor = file
            .constants
            .utf8(info.descriptor)
            .ok_or_else(|| bad_class(format!("method '{name}' has no descriptor")))?;
        let method = format!("{name}{descriptor}");
        let bad = |message: &str| VerifyError::BadMethod {
            method: method.clone(),
            message: message.to_string(),
        };

        let (params, return_type) = parse_method_descriptor(descriptor).ok_or_else(|| bad("invalid descriptor"))?;
        let access = Modifiers::from_bits(info.access).ok_or_else(|| bad("unknown access flags"))?;
        if !signatures.insert((name, descriptor)) {
            return Err(bad("declared twice"));
        }
        if name == MethodEntry::CONSTRUCTOR_NAME && (access.is_static() || !return_type.is_void()) {
            return Err(bad("constructors must be instance methods returning void"));
        }

        if access.is_abstract() {
            if !class_access.is_abstract() {
                return Err(bad("abstract method in a concrete class"));
            }
            if !info.code.is_empty() {
                return Err(bad("abstract method has code"));
            }
            continue;
        }
        if info.code.is_empty() {
            return Err(bad("method has no code"));
        }

        let receiver = usize::from(!access.is_static());
        if usize::from(info.max_locals) < params.len() + receiver {
            return Err(bad("max_locals is smaller than the parameter count"));
        }

        CodeVerifier {
            file,
            method: &method,
            info,
            returns_value: !return_type.is_void(),
        }
        .verify()?;
    }
    Ok(())
}

// ==========================================================================
// Code
// ==========================================================================

/// Stack effect and control flow of one decoded instruction.
#[derive(Debug, Clone, Copy)]
struct Instruction {
    op: OpCode,
    pops: usize,
    pushes: usize,
    /// Branch target, `None` for straight-line instructions.
    target: Option<usize>,
}

struct CodeVerifier<'a> {
    file: &'a ClassFile,
    method: &'a str,
    info: &'a MethodInfo,
    returns_value: bool,
}

impl CodeVerifier<'_> {
    fn error(&self, offset: usize, message: impl Into<String>) -> VerifyError {
        VerifyError::BadCode {
            method: self.method.to_string(),
            offset,
            message: message.into(),
        }
    }

    fn verify(&self) -> Result<(), VerifyError> {
        let decoded = self.decode()?;
        self.check_targets(&decoded)?;
        self.check_stack(&decoded)
    }

    /// Decode every instruction, indexed by its start offset.
    fn decode(&self) -> Result<Vec<Option<Instruction>>, VerifyError> {
        let code = &self.info.code;
        let mut decoded = vec![None; code.len()];
        let mut offset = 0;
        while offset < code.len() {
            let op = OpCode::from_u8(code[offset])
                .ok_or_else(|| self.error(offset, format!("invalid opcode {:#04x}", code[offset])))?;
            let end = offset + 1 + op.operand_size();
            if end > code.len() {
                return Err(self.error(offset, format!("truncated operands of {}", op.name())));
            }
            decoded[offset] = Some(self.instruction(op, offset, &code[offset + 1..end])?);
            offset = end;
        }
        Ok(decoded)
    }

    fn instruction(&self, op: OpCode, offset: usize, operands: &[u8]) -> Result<Instruction, VerifyError> {
        let pool = &self.file.constants;
        let u16_at = |at: usize| u16::from_be_bytes([operands[at], operands[at + 1]]);
        let next = offset + 1 + operands.len();
        let simple = |pops, pushes| Instruction {
            op,
            pops,
            pushes,
            target: None,
        };

        let instruction = match op {
            OpCode::Ldc => match pool.get(u16_at(0)) {
                Some(Constant::Int(_) | Constant::Long(_) | Constant::Double(_) | Constant::String(_)) => simple(0, 1),
                _ => return Err(self.error(offset, "Ldc operand is not a loadable constant")),
            },
            OpCode::PushNull | OpCode::PushTrue | OpCode::PushFalse | OpCode::PushZero | OpCode::PushOne => {
                simple(0, 1)
            }
            OpCode::Pop => simple(1, 0),
            OpCode::Dup => simple(1, 2),
            OpCode::DupX1 => simple(2, 3),

            OpCode::Load | OpCode::Store => {
                let slot = u16_at(0);
                if slot >= self.info.max_locals {
                    return Err(self.error(offset, format!("local slot {slot} is out of range")));
                }
                if op == OpCode::Load { simple(0, 1) } else { simple(1, 0) }
            }

            OpCode::GetField | OpCode::PutField => {
                pool.field_ref(u16_at(0))
                    .ok_or_else(|| self.error(offset, "operand is not a field reference"))?;
                if op == OpCode::GetField { simple(1, 1) } else { simple(2, 0) }
            }
            OpCode::GetFieldDyn | OpCode::PutFieldDyn => {
                pool.utf8(u16_at(0))
                    .ok_or_else(|| self.error(offset, "operand is not a field name"))?;
                if op == OpCode::GetFieldDyn { simple(1, 1) } else { simple(2, 0) }
            }

            OpCode::New => {
                pool.class_name(u16_at(0))
                    .ok_or_else(|| self.error(offset, "operand is not a class reference"))?;
                simple(0, 1)
            }

            OpCode::InvokeVirtual | OpCode::InvokeSpecial | OpCode::InvokeStatic => {
                let method = pool
                    .method_ref(u16_at(0))
                    .ok_or_else(|| self.error(offset, "operand is not a method reference"))?;
                let (params, return_type) = parse_method_descriptor(method.descriptor)
                    .ok_or_else(|| self.error(offset, "invalid method descriptor"))?;
                let is_constructor = method.name == MethodEntry::CONSTRUCTOR_NAME;
                if (op == OpCode::InvokeSpecial) != is_constructor {
                    return Err(self.error(offset, format!("{} cannot call '{}'", op.name(), method.name)));
                }
                let receiver = usize::from(op != OpCode::InvokeStatic);
                simple(params.len() + receiver, usize::from(!return_type.is_void()))
            }
            OpCode::InvokeDynamic => {
                pool.utf8(u16_at(0))
                    .ok_or_else(|| self.error(offset, "operand is not a method name"))?;
                simple(operands[2] as usize + 1, 1)
            }
            OpCode::InvokeSpecialDyn => {
                pool.class_name(u16_at(0))
                    .ok_or_else(|| self.error(offset, "operand is not a class reference"))?;
                simple(operands[2] as usize + 1, 1)
            }
            OpCode::InvokeStaticDyn => {
                pool.class_name(u16_at(0))
                    .ok_or_else(|| self.error(offset, "operand is not a class reference"))?;
                pool.utf8(u16_at(2))
                    .ok_or_else(|| self.error(offset, "operand is not a method name"))?;
                simple(operands[4] as usize, 1)
            }

            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Rem
            | OpCode::Concat
            | OpCode::Eq
            | OpCode::Ne
            | OpCode::Lt
            | OpCode::Le
            | OpCode::Gt
            | OpCode::Ge => simple(2, 1),
            OpCode::Neg | OpCode::Not | OpCode::I2L | OpCode::I2D | OpCode::L2D => simple(1, 1),

            OpCode::Jump | OpCode::JumpIfFalse => Instruction {
                op,
                pops: usize::from(op == OpCode::JumpIfFalse),
                pushes: 0,
                target: Some(next + u16_at(0) as usize),
            },
            OpCode::Loop => {
                let target = next
                    .checked_sub(u16_at(0) as usize)
                    .ok_or_else(|| self.error(offset, "loop target before the start of the code"))?;
                Instruction {
                    op,
                    pops: 0,
                    pushes: 0,
                    target: Some(target),
                }
            }

            OpCode::Return => {
                if !self.returns_value {
                    return Err(self.error(offset, "Return in a method declared void"));
                }
                simple(1, 0)
            }
            OpCode::ReturnVoid => simple(0, 0),
        };
        Ok(instruction)
    }

    /// Branch targets must start an instruction. A target just past the
    /// end is tolerated here and rejected later if the branch is reachable.
    fn check_targets(&self, decoded: &[Option<Instruction>]) -> Result<(), VerifyError> {
        for (offset, instruction) in decoded.iter().enumerate() {
            let Some(target) = instruction.and_then(|i| i.target) else {
                continue;
            };
            let on_boundary = target == decoded.len() || decoded.get(target).is_some_and(Option::is_some);
            if !on_boundary {
                return Err(self.error(offset, format!("branch target {target} is not an instruction")));
            }
        }
        Ok(())
    }

    /// Operand stack dataflow over reachable instructions.
    fn check_stack(&self, decoded: &[Option<Instruction>]) -> Result<(), VerifyError> {
        let mut depths: Vec<Option<usize>> = vec![None; decoded.len()];
        let mut worklist = vec![(0usize, 0usize)];

        while let Some((offset, depth)) = worklist.pop() {
            if offset >= decoded.len() {
                return Err(self.error(offset, "execution runs past the end of the code"));
            }
            match depths[offset] {
                Some(known) if known == depth => continue,
                Some(known) => {
                    return Err(self.error(
                        offset,
                        format!("stack depth {depth} does not match {known} from another path"),
                    ));
                }
                None => depths[offset] = Some(depth),
            }

            let Some(instruction) = decoded[offset] else {
                return Err(self.error(offset, "jump into the middle of an instruction"));
            };
            if depth < instruction.pops {
                return Err(self.error(offset, format!("stack underflow in {}", instruction.op.name())));
            }
            let after = depth - instruction.pops + instruction.pushes;
            if after > MAX_STACK_DEPTH {
                return Err(self.error(offset, "operand stack too deep"));
            }

            if !instruction.op.is_terminator() {
                worklist.push((offset + 1 + instruction.op.operand_size(), after));
            }
            if let Some(target) = instruction.target {
                worklist.push((target, after));
            }
        }
        Ok(())
    }
}
