//! Method body compilation.
//!
//! [`MethodCompiler`] turns one lowered method into bytecode. In
//! [`CodegenMode::Static`] every member reference is resolved at compile time
//! and emitted as a typed constant pool reference, with explicit widening
//! conversions. In [`CodegenMode::Dynamic`] members are referenced by name and
//! resolved by the interpreter against run-time values; every dynamic
//! instruction leaves exactly one value on the stack.
//!
//! The first error aborts the method and is returned as a diagnostic.

use classforge_ast::{BinaryOp, Block, Expr, Literal, Stmt, UnaryOp};
use classforge_core::{DataType, Diagnostic, ErrorCode, QualifiedName, method_descriptor};
use classforge_registry::{FieldEntry, MethodEntry};

use crate::OUTER_FIELD;
use crate::bytecode::{ConstantPool, OpCode};
use crate::context::{MethodContext, OuterInstance};
use crate::emit::BytecodeEmitter;
use crate::passes::lowering::{ConstructorBody, LoweredMethod, MethodKind};
use crate::scope::{DeclareError, LocalScope};
use crate::typing::{ExprTyper, VarTarget, literal_type};

/// How member references are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenMode {
    /// Typed references resolved against the registry.
    Static,
    /// Name-based references resolved at run time.
    Dynamic,
}

/// Output of compiling one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMethod {
    pub max_locals: u16,
    /// Empty for abstract methods.
    pub code: Vec<u8>,
}

pub struct MethodCompiler<'c, 'a, 'pool> {
    ctx: &'c MethodContext<'a>,
    typer: ExprTyper<'c, 'a>,
    emitter: BytecodeEmitter<'pool>,
    scope: LocalScope,
    mode: CodegenMode,
}

impl<'c, 'a, 'pool> MethodCompiler<'c, 'a, 'pool> {
    /// Compile a lowered method.
    pub fn compile(
        ctx: &'c MethodContext<'a>,
        constants: &'pool mut ConstantPool,
        mode: CodegenMode,
        method: &LoweredMethod,
    ) -> Result<CompiledMethod, Diagnostic> {
        let mut compiler = Self {
            ctx,
            typer: ExprTyper::new(ctx),
            emitter: BytecodeEmitter::new(constants),
            scope: if ctx.is_static {
                LocalScope::new()
            } else {
                LocalScope::for_instance()
            },
            mode,
        };

        for param in &method.params {
            compiler.declare(&param.name, param.ty.clone())?;
        }

        match &method.kind {
            MethodKind::Abstract => {
                return Ok(CompiledMethod {
                    max_locals: compiler.scope.max_locals(),
                    code: Vec::new(),
                });
            }
            MethodKind::Method(body) => compiler.compile_block(body)?,
            MethodKind::Constructor(body) => compiler.compile_constructor(body, method)?,
        }

        if compiler.emitter.chunk().is_overflowed() {
            return Err(ctx.error(ErrorCode::CodegenLimit, "method body exceeds the jump range"));
        }
        Ok(CompiledMethod {
            max_locals: compiler.scope.max_locals(),
            code: compiler.emitter.finish().into_code(),
        })
    }

    fn declare(&mut self, name: &str, ty: DataType) -> Result<u16, Diagnostic> {
        self.scope.declare(name, ty).map_err(|err| match err {
            DeclareError::Duplicate => self.ctx.error(
                ErrorCode::DuplicateVariable,
                format!("variable '{name}' is already declared"),
            ),
            DeclareError::TooManyLocals => self
                .ctx
                .error(ErrorCode::CodegenLimit, "method declares too many local variables"),
        })
    }

    fn limit(&self, what: &str) -> Diagnostic {
        self.ctx.error(ErrorCode::CodegenLimit, format!("{what} exceeds the class file limits"))
    }

    // ==========================================================================
    // Constructors
    // ==========================================================================

    fn compile_constructor(&mut self, ctor: &ConstructorBody, method: &LoweredMethod) -> Result<(), Diagnostic> {
        self.compile_super_call(&ctor.super_args)?;

        // Initializers see the receiver and the outer instance only.
        let mut init_scope = LocalScope::for_instance();
        if let Some(outer) = method.params.first().filter(|p| p.name == OUTER_FIELD) {
            init_scope
                .declare(&outer.name, outer.ty.clone())
                .map_err(|_| self.limit("constructor"))?;
        }
        let full_scope = std::mem::replace(&mut self.scope, init_scope);
        let result = ctor.initializers.iter().try_for_each(|stmt| self.compile_stmt(stmt));
        self.scope = full_scope;
        result?;

        self.compile_block(&ctor.body)
    }

    fn compile_super_call(&mut self, args: &[Expr]) -> Result<(), Diagnostic> {
        let Some(superclass) = self.ctx.class.superclass.clone() else {
            return Err(self.ctx.error(ErrorCode::InvalidSuperclass, "class has no superclass"));
        };
        self.emitter.emit_load(0);
        match self.mode {
            CodegenMode::Static => {
                let arg_types = self.typer.arg_types(args, &self.scope)?;
                let ctor = self.typer.super_constructor(&arg_types)?;
                self.compile_args(args, &ctor.params)?;
                self.emitter.emit_invoke(
                    OpCode::InvokeSpecial,
                    &superclass.to_string(),
                    MethodEntry::CONSTRUCTOR_NAME,
                    &ctor.descriptor(),
                );
            }
            CodegenMode::Dynamic => {
                let argc = self.argc(args.len())?;
                for arg in args {
                    self.compile_dynamic(arg)?;
                }
                self.emitter.emit_invoke_special_dyn(&superclass.to_string(), argc);
                self.emitter.emit(OpCode::Pop);
            }
        }
        Ok(())
    }

    // ==========================================================================
    // Statements
    // ==========================================================================

    fn compile_block(&mut self, block: &Block) -> Result<(), Diagnostic> {
        self.scope.push_scope();
        let result = block.stmts.iter().try_for_each(|stmt| self.compile_stmt(stmt));
        self.scope.pop_scope();
        result
    }

    fn compile_nested(&mut self, stmt: &Stmt) -> Result<(), Diagnostic> {
        self.scope.push_scope();
        let result = self.compile_stmt(stmt);
        self.scope.pop_scope();
        result
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), Diagnostic> {
        match stmt {
            Stmt::Block(block) => self.compile_block(block),

            Stmt::VarDecl(decl) => {
                match &decl.init {
                    Some(init) => self.compile_value(init, &decl.ty)?,
                    None => self.emit_default(&decl.ty),
                }
                let slot = self.declare(&decl.name, decl.ty.clone())?;
                self.emitter.emit_store(slot);
                Ok(())
            }

            Stmt::Expr(expr) => self.compile_discarded(expr),

            Stmt::Return(None) => {
                self.emitter.emit(OpCode::ReturnVoid);
                Ok(())
            }

            Stmt::Return(Some(value)) if self.ctx.return_type.is_void() => {
                // only reachable without type checking
                self.compile_discarded(value)?;
                self.emitter.emit(OpCode::ReturnVoid);
                Ok(())
            }

            Stmt::Return(Some(value)) => {
                let return_type = self.ctx.return_type.clone();
                self.compile_value(value, &return_type)?;
                self.emitter.emit(OpCode::Return);
                Ok(())
            }

            Stmt::If(if_stmt) => {
                self.compile_value(&if_stmt.condition, &DataType::Boolean)?;
                let else_label = self.emitter.emit_jump(OpCode::JumpIfFalse);
                self.compile_nested(&if_stmt.then_branch)?;
                match &if_stmt.else_branch {
                    Some(else_branch) => {
                        let end_label = self.emitter.emit_jump(OpCode::Jump);
                        self.emitter.patch_jump(else_label);
                        self.compile_nested(else_branch)?;
                        self.emitter.patch_jump(end_label);
                    }
                    None => self.emitter.patch_jump(else_label),
                }
                Ok(())
            }

            Stmt::While(while_stmt) => {
                let start = self.emitter.current_offset();
                self.compile_value(&while_stmt.condition, &DataType::Boolean)?;
                let exit = self.emitter.emit_jump(OpCode::JumpIfFalse);
                self.compile_nested(&while_stmt.body)?;
                self.emitter.emit_loop(start);
                self.emitter.patch_jump(exit);
                Ok(())
            }

            Stmt::SuperCall(_) => Err(self.ctx.error(
                ErrorCode::MisplacedSuperCall,
                "superclass constructor call must be the first statement of a constructor",
            )),
        }
    }

    /// Evaluate an expression for its side effects only.
    fn compile_discarded(&mut self, expr: &Expr) -> Result<(), Diagnostic> {
        if let Expr::Assign { target, value } = expr {
            return match self.mode {
                CodegenMode::Static => self.compile_assign(target, value, true).map(|_| ()),
                CodegenMode::Dynamic => self.compile_assign_dynamic(target, value, true),
            };
        }
        match self.mode {
            CodegenMode::Static => {
                if !self.compile_typed(expr)?.is_void() {
                    self.emitter.emit(OpCode::Pop);
                }
            }
            CodegenMode::Dynamic => {
                self.compile_dynamic(expr)?;
                self.emitter.emit(OpCode::Pop);
            }
        }
        Ok(())
    }

    /// Push `expr` as a value of type `expected`, widening in static mode.
    fn compile_value(&mut self, expr: &Expr, expected: &DataType) -> Result<(), Diagnostic> {
        match self.mode {
            CodegenMode::Static => {
                let actual = self.compile_typed(expr)?;
                self.emitter.emit_widen(&actual, expected);
            }
            CodegenMode::Dynamic => self.compile_dynamic(expr)?,
        }
        Ok(())
    }

    fn emit_default(&mut self, ty: &DataType) {
        match ty {
            DataType::Boolean => self.emitter.emit_bool(false),
            DataType::Int => self.emitter.emit_int(0),
            DataType::Long => self.emitter.emit_long(0),
            DataType::Double => self.emitter.emit_double(0.0),
            _ => self.emitter.emit_null(),
        }
    }

    fn emit_literal(&mut self, lit: &Literal) -> Result<(), Diagnostic> {
        match lit {
            Literal::Null => self.emitter.emit_null(),
            Literal::Bool(v) => self.emitter.emit_bool(*v),
            Literal::Int(v) => self.emitter.emit_int(*v),
            Literal::Long(v) => self.emitter.emit_long(*v),
            Literal::Double(v) => self.emitter.emit_double(*v),
            Literal::Str(v) => self
                .emitter
                .emit_string(v)
                .map_err(|too_long| self.limit(&format!("string literal of {} bytes", too_long.0)))?,
        }
        Ok(())
    }

    fn argc(&self, count: usize) -> Result<u8, Diagnostic> {
        u8::try_from(count).map_err(|_| self.limit("argument count"))
    }

    /// `&&` and `||` with short-circuit evaluation. Leaves one boolean.
    fn compile_logical(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<(), Diagnostic> {
        self.compile_value(left, &DataType::Boolean)?;
        let short = self.emitter.emit_jump(OpCode::JumpIfFalse);
        if op == BinaryOp::And {
            self.compile_value(right, &DataType::Boolean)?;
            let end = self.emitter.emit_jump(OpCode::Jump);
            self.emitter.patch_jump(short);
            self.emitter.emit_bool(false);
            self.emitter.patch_jump(end);
        } else {
            self.emitter.emit_bool(true);
            let end = self.emitter.emit_jump(OpCode::Jump);
            self.emitter.patch_jump(short);
            self.compile_value(right, &DataType::Boolean)?;
            self.emitter.patch_jump(end);
        }
        Ok(())
    }

    // ==========================================================================
    // Static mode
    // ==========================================================================

    /// Compile an expression, returning the type it leaves on the stack
    /// (`Void` when it leaves nothing).
    fn compile_typed(&mut self, expr: &Expr) -> Result<DataType, Diagnostic> {
        match expr {
            Expr::Literal(lit) => {
                self.emit_literal(lit)?;
                Ok(literal_type(lit))
            }

            Expr::Variable(name) => match self.typer.variable(name, &self.scope)? {
                VarTarget::Local(var) => {
                    self.emitter.emit_load(var.slot);
                    Ok(var.data_type)
                }
                VarTarget::Field(field) => {
                    self.emitter.emit_load(0);
                    self.emit_field_op(OpCode::GetField, field);
                    Ok(field.ty.clone())
                }
            },

            Expr::This => {
                let ty = self.typer.type_of(expr, &self.scope)?;
                self.emitter.emit_load(0);
                Ok(ty)
            }

            Expr::OuterThis => {
                let ty = self.typer.type_of(expr, &self.scope)?;
                self.emit_own_outer(&ty);
                Ok(ty)
            }

            Expr::Field { target, name } => {
                let target_ty = self.compile_typed(target)?;
                let field = self.typer.field(&target_ty, name)?;
                self.emit_field_op(OpCode::GetField, field);
                Ok(field.ty.clone())
            }

            Expr::Assign { target, value } => self.compile_assign(target, value, false),

            Expr::Call {
                receiver,
                method,
                args,
            } => {
                let receiver_ty = self.typer.type_of(receiver, &self.scope)?;
                let arg_types = self.typer.arg_types(args, &self.scope)?;
                let entry = self.typer.method(&receiver_ty, method, &arg_types)?;

                self.compile_typed(receiver)?;
                if entry.is_static() {
                    // receiver evaluated for side effects only
                    self.emitter.emit(OpCode::Pop);
                    self.compile_args(args, &entry.params)?;
                    self.emit_method_op(OpCode::InvokeStatic, entry);
                } else {
                    self.compile_args(args, &entry.params)?;
                    self.emit_method_op(OpCode::InvokeVirtual, entry);
                }
                Ok(entry.return_type.clone())
            }

            Expr::StaticCall { class, method, args } => {
                let arg_types = self.typer.arg_types(args, &self.scope)?;
                let entry = self.typer.static_method(class, method, &arg_types)?;
                self.compile_args(args, &entry.params)?;
                self.emit_method_op(OpCode::InvokeStatic, entry);
                Ok(entry.return_type.clone())
            }

            Expr::New { class, args } => {
                let arg_types = self.typer.arg_types(args, &self.scope)?;
                let ctor = self.typer.constructor(class, &arg_types)?;
                let target = self.typer.class(class)?;

                self.emitter.emit_new(&class.to_string());
                self.emitter.emit(OpCode::Dup);
                let mut params = ctor.params.clone();
                if target.is_inner() {
                    let source = self.ctx.outer_instance(target)?;
                    let outer = target.enclosing.clone().map(DataType::Class).unwrap_or(DataType::Null);
                    self.emit_outer_instance(source, &outer);
                    params.insert(0, outer);
                }
                self.compile_args(args, &ctor.params)?;
                self.emitter.emit_invoke(
                    OpCode::InvokeSpecial,
                    &class.to_string(),
                    MethodEntry::CONSTRUCTOR_NAME,
                    &method_descriptor(&params, &DataType::Void),
                );
                Ok(DataType::Class(class.clone()))
            }

            Expr::Binary { op, left, right } => {
                if op.is_logical() {
                    self.compile_logical(*op, left, right)?;
                    return Ok(DataType::Boolean);
                }
                let left_ty = self.typer.type_of(left, &self.scope)?;
                let right_ty = self.typer.type_of(right, &self.scope)?;
                let typing = self.typer.binary(*op, &left_ty, &right_ty)?;

                self.compile_typed(left)?;
                if let Some(operand) = &typing.operand {
                    self.emitter.emit_widen(&left_ty, operand);
                }
                self.compile_typed(right)?;
                if let Some(operand) = &typing.operand {
                    self.emitter.emit_widen(&right_ty, operand);
                }
                self.emitter.emit(if typing.concat {
                    OpCode::Concat
                } else {
                    binary_opcode(*op)
                });
                Ok(typing.result)
            }

            Expr::Unary { op, operand } => {
                let operand_ty = self.compile_typed(operand)?;
                let result = self.typer.unary(*op, &operand_ty)?;
                self.emitter.emit(unary_opcode(*op));
                Ok(result)
            }
        }
    }

    fn compile_args(&mut self, args: &[Expr], params: &[DataType]) -> Result<(), Diagnostic> {
        for (arg, param) in args.iter().zip(params) {
            self.compile_value(arg, param)?;
        }
        Ok(())
    }

    /// Typed assignment. Leaves the assigned value unless `discard` is set.
    fn compile_assign(&mut self, target: &Expr, value: &Expr, discard: bool) -> Result<DataType, Diagnostic> {
        let target_ty = self.typer.type_of(target, &self.scope)?;

        match target {
            Expr::Variable(name) => match self.typer.variable(name, &self.scope)? {
                VarTarget::Local(var) => {
                    self.compile_value(value, &var.data_type)?;
                    if !discard {
                        self.emitter.emit(OpCode::Dup);
                    }
                    self.emitter.emit_store(var.slot);
                }
                VarTarget::Field(field) => {
                    self.emitter.emit_load(0);
                    self.store_field(field, value, discard)?;
                }
            },
            Expr::Field { target: object, name } => {
                let object_ty = self.compile_typed(object)?;
                let field = self.typer.field(&object_ty, name)?;
                self.store_field(field, value, discard)?;
            }
            _ => {
                return Err(self.ctx.error(
                    ErrorCode::InvalidAssignmentTarget,
                    "only variables and fields can be assigned",
                ));
            }
        }
        Ok(if discard { DataType::Void } else { target_ty })
    }

    /// With the object on the stack, store `value` into `field`.
    fn store_field(&mut self, field: &FieldEntry, value: &Expr, discard: bool) -> Result<(), Diagnostic> {
        self.compile_value(value, &field.ty)?;
        if !discard {
            self.emitter.emit(OpCode::DupX1);
        }
        self.emit_field_op(OpCode::PutField, field);
        Ok(())
    }

    fn emit_field_op(&mut self, op: OpCode, field: &FieldEntry) {
        self.emitter.emit_field(op, &field.owner.to_string(), &field.name, &field.ty);
    }

    fn emit_method_op(&mut self, op: OpCode, method: &MethodEntry) {
        self.emitter
            .emit_invoke(op, &method.owner.to_string(), &method.name, &method.descriptor());
    }

    /// `this.this$0` of the current class.
    fn emit_own_outer(&mut self, outer: &DataType) {
        self.emitter.emit_load(0);
        self.emitter
            .emit_field(OpCode::GetField, &self.ctx.class.name.to_string(), OUTER_FIELD, outer);
    }

    fn emit_outer_instance(&mut self, source: OuterInstance, outer: &DataType) {
        match source {
            OuterInstance::This => self.emitter.emit_load(0),
            OuterInstance::EnclosingOfThis => {
                let own_outer = self
                    .ctx
                    .class
                    .enclosing
                    .clone()
                    .map(DataType::Class)
                    .unwrap_or_else(|| outer.clone());
                self.emit_own_outer(&own_outer);
            }
        }
    }

    // ==========================================================================
    // Dynamic mode
    // ==========================================================================

    /// Compile an expression by name. Always leaves exactly one value.
    fn compile_dynamic(&mut self, expr: &Expr) -> Result<(), Diagnostic> {
        match expr {
            Expr::Literal(lit) => self.emit_literal(lit)?,

            Expr::Variable(name) => {
                if let Some(var) = self.scope.lookup(name) {
                    let slot = var.slot;
                    self.emitter.emit_load(slot);
                } else {
                    self.require_instance(name)?;
                    self.emitter.emit_load(0);
                    self.emitter.emit_field_dyn(OpCode::GetFieldDyn, name);
                }
            }

            Expr::This => {
                self.require_instance("this")?;
                self.emitter.emit_load(0);
            }

            Expr::OuterThis => {
                self.require_instance("the enclosing instance")?;
                if !self.ctx.class.is_inner() {
                    return Err(self.ctx.error(
                        ErrorCode::NoOuterInstance,
                        format!("'{}' has no enclosing instance", self.ctx.class.name),
                    ));
                }
                self.emitter.emit_load(0);
                self.emitter.emit_field_dyn(OpCode::GetFieldDyn, OUTER_FIELD);
            }

            Expr::Field { target, name } => {
                self.compile_dynamic(target)?;
                self.emitter.emit_field_dyn(OpCode::GetFieldDyn, name);
            }

            Expr::Assign { target, value } => self.compile_assign_dynamic(target, value, false)?,

            Expr::Call {
                receiver,
                method,
                args,
            } => {
                let argc = self.argc(args.len())?;
                self.compile_dynamic(receiver)?;
                for arg in args {
                    self.compile_dynamic(arg)?;
                }
                self.emitter.emit_invoke_dynamic(method, argc);
            }

            Expr::StaticCall { class, method, args } => {
                let argc = self.argc(args.len())?;
                for arg in args {
                    self.compile_dynamic(arg)?;
                }
                self.emitter.emit_invoke_static_dyn(&class.to_string(), method, argc);
            }

            Expr::New { class, args } => self.compile_new_dynamic(class, args)?,

            Expr::Binary { op, left, right } => {
                if op.is_logical() {
                    self.compile_logical(*op, left, right)?;
                } else {
                    self.compile_dynamic(left)?;
                    self.compile_dynamic(right)?;
                    self.emitter.emit(binary_opcode(*op));
                }
            }

            Expr::Unary { op, operand } => {
                self.compile_dynamic(operand)?;
                self.emitter.emit(unary_opcode(*op));
            }
        }
        Ok(())
    }

    fn compile_new_dynamic(&mut self, class: &QualifiedName, args: &[Expr]) -> Result<(), Diagnostic> {
        let target = self.typer.class(class)?;
        let outer = if target.is_inner() {
            Some(self.ctx.outer_instance(target)?)
        } else {
            None
        };
        let argc = self.argc(args.len() + usize::from(outer.is_some()))?;

        self.emitter.emit_new(&class.to_string());
        self.emitter.emit(OpCode::Dup);
        match outer {
            Some(OuterInstance::This) => self.emitter.emit_load(0),
            Some(OuterInstance::EnclosingOfThis) => {
                self.emitter.emit_load(0);
                self.emitter.emit_field_dyn(OpCode::GetFieldDyn, OUTER_FIELD);
            }
            None => {}
        }
        for arg in args {
            self.compile_dynamic(arg)?;
        }
        self.emitter.emit_invoke_special_dyn(&class.to_string(), argc);
        // constructors leave null; keep the new instance
        self.emitter.emit(OpCode::Pop);
        Ok(())
    }

    fn compile_assign_dynamic(&mut self, target: &Expr, value: &Expr, discard: bool) -> Result<(), Diagnostic> {
        match target {
            Expr::Variable(name) => {
                if let Some(var) = self.scope.lookup(name) {
                    let slot = var.slot;
                    self.compile_dynamic(value)?;
                    if !discard {
                        self.emitter.emit(OpCode::Dup);
                    }
                    self.emitter.emit_store(slot);
                    return Ok(());
                }
                self.require_instance(name)?;
                self.emitter.emit_load(0);
                self.store_field_dynamic(name, value, discard)
            }
            Expr::Field { target: object, name } => {
                self.compile_dynamic(object)?;
                self.store_field_dynamic(name, value, discard)
            }
            _ => Err(self.ctx.error(
                ErrorCode::InvalidAssignmentTarget,
                "only variables and fields can be assigned",
            )),
        }
    }

    fn store_field_dynamic(&mut self, name: &str, value: &Expr, discard: bool) -> Result<(), Diagnostic> {
        self.compile_dynamic(value)?;
        if !discard {
            self.emitter.emit(OpCode::DupX1);
        }
        self.emitter.emit_field_dyn(OpCode::PutFieldDyn, name);
        Ok(())
    }

    fn require_instance(&self, what: &str) -> Result<(), Diagnostic> {
        if self.ctx.is_static {
            Err(self.ctx.error(
                ErrorCode::StaticContext,
                format!("'{what}' is not available in a static method"),
            ))
        } else {
            Ok(())
        }
    }
}

fn binary_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Sub,
        BinaryOp::Mul => OpCode::Mul,
        BinaryOp::Div => OpCode::Div,
        BinaryOp::Rem => OpCode::Rem,
        BinaryOp::Eq => OpCode::Eq,
        BinaryOp::Ne => OpCode::Ne,
        BinaryOp::Lt => OpCode::Lt,
        BinaryOp::Le => OpCode::Le,
        BinaryOp::Gt => OpCode::Gt,
        BinaryOp::Ge => OpCode::Ge,
        // short-circuit operators never reach here
        BinaryOp::And | BinaryOp::Or => OpCode::Eq,
    }
}

fn unary_opcode(op: UnaryOp) -> OpCode {
    match op {
        UnaryOp::Neg => OpCode::Neg,
        UnaryOp::Not => OpCode::Not,
    }
}
