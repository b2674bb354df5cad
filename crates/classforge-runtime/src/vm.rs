//! Bytecode interpreter.
//!
//! [`Vm`] executes verified methods on an operand stack. Bytecode-to-bytecode
//! calls push activations onto a heap-allocated frame stack, so call depth is
//! bounded by [`VmConfig::max_call_depth`] rather than the host thread's
//! stack. Class references are linked through the loader on first use and
//! cached per VM. Typed instructions dispatch on exact
//! descriptors; dynamic instructions select among same-named methods by the
//! runtime types of their arguments.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use classforge_compiler::OUTER_FIELD;
use classforge_compiler::bytecode::{Constant, MemberRef, OpCode};
use classforge_core::{DataType, LoadError, RuntimeError, known, parse_method_descriptor};

use crate::class::{LoadedClass, LoadedMethod, MethodBody, ResolvedMethod};
use crate::loader::ClassLoader;
use crate::object::ObjectRef;
use crate::value::{Numeric, Value};

/// Interpreter limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Deepest allowed nesting of method calls.
    pub max_call_depth: usize,
}

impl VmConfig {
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

/// Runs nested inside natives or string conversion, each of which holds host
/// stack for its whole duration.
const MAX_NESTED_RUNS: usize = 16;

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

pub struct Vm {
    loader: Arc<ClassLoader>,
    config: VmConfig,
    depth: usize,
    nested_runs: usize,
    links: FxHashMap<String, Arc<LoadedClass>>,
}

impl Vm {
    pub fn new(loader: Arc<ClassLoader>) -> Self {
        Self::with_config(loader, VmConfig::default())
    }

    pub fn with_config(loader: Arc<ClassLoader>, config: VmConfig) -> Self {
        Self {
            loader,
            config,
            depth: 0,
            nested_runs: 0,
            links: FxHashMap::default(),
        }
    }

    pub fn loader(&self) -> &Arc<ClassLoader> {
        &self.loader
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    // ==========================================================================
    // Public entry points
    // ==========================================================================

    /// Create an instance of a top-level or static nested class.
    pub fn instantiate(&mut self, class: &Arc<LoadedClass>, args: &[Value]) -> Result<Value, RuntimeError> {
        if class.is_inner() {
            return Err(RuntimeError::OuterInstanceRequired(class.name().to_string()));
        }
        self.construct(class, args.to_vec())
    }

    /// Create an instance of a non-static inner class bound to `outer`.
    pub fn instantiate_inner(
        &mut self,
        class: &Arc<LoadedClass>,
        outer: &Value,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        if !class.is_inner() {
            return Err(RuntimeError::TypeMismatch {
                expected: "non-static inner class".to_string(),
                actual: class.name().to_string(),
            });
        }
        if outer.is_null() {
            return Err(RuntimeError::NullReference {
                member: OUTER_FIELD.to_string(),
            });
        }
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(outer.clone());
        full.extend_from_slice(args);
        self.construct(class, full)
    }

    /// Call an instance method by name, selecting the overload from the
    /// runtime argument types.
    pub fn invoke(&mut self, receiver: &Value, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        let (target, receiver) = self.virtual_target(receiver, name, args)?;
        self.call(&target, receiver, args.to_vec())
    }

    /// Call a static method by name.
    pub fn invoke_static(
        &mut self,
        class: &Arc<LoadedClass>,
        name: &str,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        let target = static_target(class, name, args)?;
        self.call(&target, None, args.to_vec())
    }

    /// Text of a value as string concatenation renders it, calling
    /// `toString` on objects.
    pub fn stringify(&mut self, value: &Value) -> Result<String, RuntimeError> {
        let Value::Object(object) = value else {
            return Ok(value.to_string());
        };
        let class = Arc::clone(object.class());
        let descriptor = format!("(){}", DataType::string().descriptor());
        let Some(to_string) = class.find_method("toString", &descriptor) else {
            return Ok(value.to_string());
        };
        match self.call(&to_string, Some(value.clone()), Vec::new())? {
            Value::Str(s) => Ok(s.to_string()),
            other => Ok(other.to_string()),
        }
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    fn construct(&mut self, class: &Arc<LoadedClass>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if class.is_abstract() {
            return Err(RuntimeError::AbstractInstantiation(class.name().to_string()));
        }
        let object = Value::Object(ObjectRef::alloc(Arc::clone(class)));
        let target = select(class.constructors(args.len()), &args)
            .ok_or_else(|| no_such_method(class, "<init>"))?;
        self.call(&target, Some(object.clone()), args)?;
        Ok(object)
    }

    /// Run a method to completion. Arguments are coerced to the parameter
    /// types and the result to the return type; void methods produce `Null`.
    fn call(
        &mut self,
        target: &ResolvedMethod,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match self.prepare(target, receiver, args)? {
            Invocation::Done(value) => Ok(value),
            Invocation::Frame(activation) => self.run(activation),
        }
    }

    /// Check the depth limit and bind arguments. Natives run immediately;
    /// bytecode methods become an activation for the run loop.
    fn prepare(
        &mut self,
        target: &ResolvedMethod,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Invocation, RuntimeError> {
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::StackOverflow(self.config.max_call_depth));
        }
        let method = &target.method;
        if args.len() != method.params.len() {
            return Err(no_such_method(&target.class, &method.name));
        }
        let args = args
            .into_iter()
            .zip(&method.params)
            .map(|(arg, ty)| coerce(arg, ty))
            .collect::<Result<Vec<_>, _>>()?;

        match &method.body {
            MethodBody::Native(native) => {
                self.depth += 1;
                let result = native(self, receiver.as_ref().unwrap_or(&Value::Null), &args);
                self.depth -= 1;
                finish(method, Some(result?)).map(Invocation::Done)
            }
            MethodBody::Bytecode { max_locals, .. } => {
                let max_locals = usize::from(*max_locals);
                let mut locals = Vec::with_capacity(max_locals);
                locals.extend(receiver);
                locals.extend(args);
                locals.resize(locals.len().max(max_locals), Value::Null);
                Ok(Invocation::Frame(Activation {
                    target: target.clone(),
                    ip: 0,
                    stack: Vec::new(),
                    locals,
                    keep_result: true,
                }))
            }
            MethodBody::Abstract => Err(RuntimeError::NoSuchMethod {
                class: target.class.name().to_string(),
                method: method.signature(),
            }),
        }
    }

    /// Start a call from bytecode. A native result lands on the caller's
    /// stack at once; a bytecode callee is handed back to the run loop.
    fn dispatch(
        &mut self,
        frame: &mut Frame<'_>,
        target: &ResolvedMethod,
        receiver: Option<Value>,
        args: Vec<Value>,
        keep_result: bool,
    ) -> Result<Option<Activation>, RuntimeError> {
        match self.prepare(target, receiver, args)? {
            Invocation::Done(value) => {
                if keep_result {
                    frame.push(value);
                }
                Ok(None)
            }
            Invocation::Frame(mut callee) => {
                callee.keep_result = keep_result;
                Ok(Some(callee))
            }
        }
    }

    /// Overload of `name` on the receiver's runtime class. Static targets
    /// take no receiver.
    fn virtual_target(
        &mut self,
        receiver: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<(ResolvedMethod, Option<Value>), RuntimeError> {
        let class = self.runtime_class(receiver, name)?;
        let candidates = class
            .methods_named(name, args.len())
            .into_iter()
            .filter(|m| !m.method.is_constructor())
            .collect();
        let target = select(candidates, args).ok_or_else(|| no_such_method(&class, name))?;
        let receiver = (!target.method.is_static()).then(|| receiver.clone());
        Ok((target, receiver))
    }

    /// Resolve a class name referenced by code, caching the result.
    fn link(&mut self, from: &LoadedClass, name: &str) -> Result<Arc<LoadedClass>, RuntimeError> {
        if let Some(class) = self.links.get(name) {
            return Ok(Arc::clone(class));
        }
        let class = self.loader.resolve(name).ok_or_else(|| LoadError::UndefinedDependency {
            class: from.name().to_string(),
            dependency: name.to_string(),
        })?;
        trace!(from = %from.name(), class = name, "linked class reference");
        self.links.insert(name.to_string(), Arc::clone(&class));
        Ok(class)
    }

    /// Class used for virtual dispatch on `receiver`.
    fn runtime_class(&mut self, receiver: &Value, member: &str) -> Result<Arc<LoadedClass>, RuntimeError> {
        match receiver {
            Value::Object(object) => Ok(Arc::clone(object.class())),
            Value::Str(_) => {
                if let Some(class) = self.links.get(known::STRING) {
                    return Ok(Arc::clone(class));
                }
                let class = self
                    .loader
                    .resolve(known::STRING)
                    .ok_or_else(|| LoadError::UndefinedDependency {
                        class: member.to_string(),
                        dependency: known::STRING.to_string(),
                    })?;
                self.links.insert(known::STRING.to_string(), Arc::clone(&class));
                Ok(class)
            }
            Value::Null => Err(RuntimeError::NullReference {
                member: member.to_string(),
            }),
            other => Err(RuntimeError::TypeMismatch {
                expected: "object".to_string(),
                actual: other.type_name(),
            }),
        }
    }

    // ==========================================================================
    // Execution
    // ==========================================================================

    /// Drive `entry` and every bytecode method it calls until `entry`
    /// returns. Only natives and string conversion start a nested run.
    fn run(&mut self, entry: Activation) -> Result<Value, RuntimeError> {
        if self.nested_runs >= MAX_NESTED_RUNS {
            return Err(RuntimeError::StackOverflow(self.depth));
        }
        let depth = self.depth;
        self.nested_runs += 1;
        let result = self.drive(entry);
        self.nested_runs -= 1;
        self.depth = depth;
        result
    }

    fn drive(&mut self, entry: Activation) -> Result<Value, RuntimeError> {
        let mut current = entry;
        let mut callers: Vec<Activation> = Vec::new();
        self.depth += 1;
        loop {
            match self.resume(&mut current)? {
                Control::Call(callee) => {
                    self.depth += 1;
                    callers.push(std::mem::replace(&mut current, callee));
                }
                Control::Return(result) => {
                    self.depth -= 1;
                    let value = finish(&current.target.method, result)?;
                    let keep_result = current.keep_result;
                    match callers.pop() {
                        Some(caller) => {
                            current = caller;
                            if keep_result {
                                current.stack.push(value);
                            }
                        }
                        None => return Ok(value),
                    }
                }
            }
        }
    }

    /// Continue an activation until it calls another bytecode method or
    /// returns.
    fn resume(&mut self, activation: &mut Activation) -> Result<Control, RuntimeError> {
        let target = activation.target.clone();
        let MethodBody::Bytecode { code, .. } = &target.method.body else {
            return Err(no_such_method(&target.class, &target.method.name));
        };
        let mut frame = Frame {
            class: target.class.as_ref(),
            method: target.method.as_ref(),
            code,
            ip: activation.ip,
            stack: std::mem::take(&mut activation.stack),
            locals: std::mem::take(&mut activation.locals),
        };
        let control = self.interpret(&mut frame);
        activation.ip = frame.ip;
        activation.stack = frame.stack;
        activation.locals = frame.locals;
        control
    }

    fn interpret(&mut self, frame: &mut Frame<'_>) -> Result<Control, RuntimeError> {
        let class = frame.class;
        loop {
            let op = frame.next_op()?;
            match op {
                // Constants
                OpCode::Ldc => {
                    let index = frame.read_u16()?;
                    let value = match class.constants().get(index) {
                        Some(Constant::Int(v)) => Value::Int(*v),
                        Some(Constant::Long(v)) => Value::Long(*v),
                        Some(Constant::Double(v)) => Value::Double(*v),
                        Some(Constant::String(_)) => class
                            .constants()
                            .string(index)
                            .map(Value::from)
                            .ok_or_else(|| frame.invalid("dangling string constant"))?,
                        _ => return Err(frame.invalid("Ldc of a non-loadable constant")),
                    };
                    frame.push(value);
                }
                OpCode::PushNull => frame.push(Value::Null),
                OpCode::PushTrue => frame.push(Value::Bool(true)),
                OpCode::PushFalse => frame.push(Value::Bool(false)),
                OpCode::PushZero => frame.push(Value::Int(0)),
                OpCode::PushOne => frame.push(Value::Int(1)),

                // Stack
                OpCode::Pop => {
                    frame.pop()?;
                }
                OpCode::Dup => {
                    let top = frame.peek()?.clone();
                    frame.push(top);
                }
                OpCode::DupX1 => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    frame.push(b.clone());
                    frame.push(a);
                    frame.push(b);
                }

                // Locals
                OpCode::Load => {
                    let slot = usize::from(frame.read_u16()?);
                    let value = frame
                        .locals
                        .get(slot)
                        .cloned()
                        .ok_or_else(|| frame.invalid("local slot out of range"))?;
                    frame.push(value);
                }
                OpCode::Store => {
                    let slot = usize::from(frame.read_u16()?);
                    let value = frame.pop()?;
                    if slot >= frame.locals.len() {
                        return Err(frame.invalid("local slot out of range"));
                    }
                    frame.locals[slot] = value;
                }

                // Fields
                OpCode::GetField => {
                    let field = frame.field_ref()?;
                    self.link(class, field.class)?;
                    let object = frame.pop()?;
                    let object = object_of(&object, field.name)?;
                    let slot = object
                        .class()
                        .field_slot(field.class, field.name)
                        .ok_or_else(|| no_such_field(object, field.name))?;
                    let value = object.get_field(slot).ok_or_else(|| no_such_field(object, field.name))?;
                    frame.push(value);
                }
                OpCode::PutField => {
                    let field = frame.field_ref()?;
                    self.link(class, field.class)?;
                    let value = frame.pop()?;
                    let object = frame.pop()?;
                    let object = object_of(&object, field.name)?;
                    let slot = object
                        .class()
                        .field_slot(field.class, field.name)
                        .ok_or_else(|| no_such_field(object, field.name))?;
                    store(object, slot, value, field.name)?;
                }
                OpCode::GetFieldDyn => {
                    let name = frame.utf8()?;
                    let object = frame.pop()?;
                    let object = object_of(&object, name)?;
                    let value = object.field(name).ok_or_else(|| no_such_field(object, name))?;
                    frame.push(value);
                }
                OpCode::PutFieldDyn => {
                    let name = frame.utf8()?;
                    let value = frame.pop()?;
                    let object = frame.pop()?;
                    let object = object_of(&object, name)?;
                    let slot = object
                        .class()
                        .field_slot_by_name(name)
                        .ok_or_else(|| no_such_field(object, name))?;
                    store(object, slot, value, name)?;
                }

                // Objects and calls
                OpCode::New => {
                    let name = frame.class_name()?;
                    let target = self.link(class, name)?;
                    if target.is_abstract() {
                        return Err(RuntimeError::AbstractInstantiation(name.to_string()));
                    }
                    frame.push(Value::Object(ObjectRef::alloc(target)));
                }
                OpCode::InvokeVirtual => {
                    let reference = frame.method_ref()?;
                    let (params, return_type) = descriptor_of(frame, &reference)?;
                    self.link(class, reference.class)?;
                    let args = frame.pop_n(params.len())?;
                    let receiver = frame.pop()?;
                    let runtime = self.runtime_class(&receiver, reference.name)?;
                    let target = runtime
                        .find_method(reference.name, reference.descriptor)
                        .ok_or_else(|| no_such_method(&runtime, reference.name))?;
                    let keep = !return_type.is_void();
                    if let Some(callee) = self.dispatch(frame, &target, Some(receiver), args, keep)? {
                        return Ok(Control::Call(callee));
                    }
                }
                OpCode::InvokeSpecial => {
                    let reference = frame.method_ref()?;
                    let (params, return_type) = descriptor_of(frame, &reference)?;
                    let owner = self.link(class, reference.class)?;
                    let method = owner
                        .declared_method(reference.name, reference.descriptor)
                        .cloned()
                        .ok_or_else(|| no_such_method(&owner, reference.name))?;
                    let args = frame.pop_n(params.len())?;
                    let receiver = frame.pop()?;
                    if receiver.is_null() {
                        return Err(RuntimeError::NullReference {
                            member: reference.name.to_string(),
                        });
                    }
                    let target = ResolvedMethod { class: owner, method };
                    let keep = !return_type.is_void();
                    if let Some(callee) = self.dispatch(frame, &target, Some(receiver), args, keep)? {
                        return Ok(Control::Call(callee));
                    }
                }
                OpCode::InvokeStatic => {
                    let reference = frame.method_ref()?;
                    let (params, return_type) = descriptor_of(frame, &reference)?;
                    let owner = self.link(class, reference.class)?;
                    let target = owner
                        .find_method(reference.name, reference.descriptor)
                        .filter(|t| t.method.is_static())
                        .ok_or_else(|| no_such_method(&owner, reference.name))?;
                    let args = frame.pop_n(params.len())?;
                    let keep = !return_type.is_void();
                    if let Some(callee) = self.dispatch(frame, &target, None, args, keep)? {
                        return Ok(Control::Call(callee));
                    }
                }
                OpCode::InvokeDynamic => {
                    let name = frame.utf8()?;
                    let argc = usize::from(frame.read_u8()?);
                    let args = frame.pop_n(argc)?;
                    let receiver = frame.pop()?;
                    let (target, receiver) = self.virtual_target(&receiver, name, &args)?;
                    if let Some(callee) = self.dispatch(frame, &target, receiver, args, true)? {
                        return Ok(Control::Call(callee));
                    }
                }
                OpCode::InvokeSpecialDyn => {
                    let name = frame.class_name()?;
                    let argc = usize::from(frame.read_u8()?);
                    let owner = self.link(class, name)?;
                    let args = frame.pop_n(argc)?;
                    let receiver = frame.pop()?;
                    if receiver.is_null() {
                        return Err(RuntimeError::NullReference {
                            member: format!("{name}.<init>"),
                        });
                    }
                    let target = select(owner.constructors(argc), &args)
                        .ok_or_else(|| no_such_method(&owner, "<init>"))?;
                    frame.push(Value::Null);
                    if let Some(callee) = self.dispatch(frame, &target, Some(receiver), args, false)? {
                        return Ok(Control::Call(callee));
                    }
                }
                OpCode::InvokeStaticDyn => {
                    let name = frame.class_name()?;
                    let method = frame.utf8()?;
                    let argc = usize::from(frame.read_u8()?);
                    let owner = self.link(class, name)?;
                    let args = frame.pop_n(argc)?;
                    let target = static_target(&owner, method, &args)?;
                    if let Some(callee) = self.dispatch(frame, &target, None, args, true)? {
                        return Ok(Control::Call(callee));
                    }
                }

                // Arithmetic
                OpCode::Add => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let result = if matches!(a, Value::Str(_)) || matches!(b, Value::Str(_)) {
                        self.concat(&a, &b)?
                    } else {
                        arithmetic(Arith::Add, a, b)?
                    };
                    frame.push(result);
                }
                OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Rem => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let arith = match op {
                        OpCode::Sub => Arith::Sub,
                        OpCode::Mul => Arith::Mul,
                        OpCode::Div => Arith::Div,
                        _ => Arith::Rem,
                    };
                    frame.push(arithmetic(arith, a, b)?);
                }
                OpCode::Neg => {
                    let value = match frame.pop()? {
                        Value::Int(v) => Value::Int(v.wrapping_neg()),
                        Value::Long(v) => Value::Long(v.wrapping_neg()),
                        Value::Double(v) => Value::Double(-v),
                        other => return Err(mismatch("numeric operand", &other)),
                    };
                    frame.push(value);
                }
                OpCode::Concat => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let result = self.concat(&a, &b)?;
                    frame.push(result);
                }

                // Conversions
                OpCode::I2L | OpCode::I2D | OpCode::L2D => {
                    let value = match (op, frame.pop()?) {
                        (OpCode::I2L, Value::Int(v)) => Value::Long(i64::from(v)),
                        (OpCode::I2D, Value::Int(v)) => Value::Double(f64::from(v)),
                        (OpCode::L2D, Value::Long(v)) => Value::Double(v as f64),
                        (_, other) => return Err(mismatch(op.name(), &other)),
                    };
                    frame.push(value);
                }

                // Comparison and logic
                OpCode::Eq | OpCode::Ne => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let equal = a.loose_eq(&b);
                    frame.push(Value::Bool(if op == OpCode::Eq { equal } else { !equal }));
                }
                OpCode::Lt | OpCode::Le | OpCode::Gt | OpCode::Ge => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    frame.push(Value::Bool(compare(op, &a, &b)?));
                }
                OpCode::Not => {
                    let value = frame.pop()?;
                    let v = value.as_bool().ok_or_else(|| mismatch("boolean", &value))?;
                    frame.push(Value::Bool(!v));
                }

                // Control flow
                OpCode::Jump => {
                    let distance = usize::from(frame.read_u16()?);
                    frame.ip += distance;
                }
                OpCode::JumpIfFalse => {
                    let distance = usize::from(frame.read_u16()?);
                    let condition = frame.pop()?;
                    if !condition.as_bool().ok_or_else(|| mismatch("boolean", &condition))? {
                        frame.ip += distance;
                    }
                }
                OpCode::Loop => {
                    let distance = usize::from(frame.read_u16()?);
                    frame.ip = frame
                        .ip
                        .checked_sub(distance)
                        .ok_or_else(|| frame.invalid("loop before the start of the code"))?;
                }
                OpCode::Return => return frame.pop().map(|value| Control::Return(Some(value))),
                OpCode::ReturnVoid => return Ok(Control::Return(None)),
            }
        }
    }

    fn concat(&mut self, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
        let mut text = self.stringify(a)?;
        text.push_str(&self.stringify(b)?);
        Ok(Value::from(text))
    }
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("config", &self.config)
            .field("depth", &self.depth)
            .field("nested_runs", &self.nested_runs)
            .field("links", &self.links.len())
            .finish()
    }
}

// ==========================================================================
// Frames
// ==========================================================================

/// A suspended bytecode invocation.
struct Activation {
    target: ResolvedMethod,
    ip: usize,
    stack: Vec<Value>,
    locals: Vec<Value>,
    /// Push the return value onto the caller's operand stack.
    keep_result: bool,
}

enum Invocation {
    Done(Value),
    Frame(Activation),
}

enum Control {
    Call(Activation),
    Return(Option<Value>),
}

/// Apply the declared return type to what a method produced.
fn finish(method: &LoadedMethod, result: Option<Value>) -> Result<Value, RuntimeError> {
    match result {
        _ if method.return_type.is_void() => Ok(Value::Null),
        Some(value) => coerce(value, &method.return_type),
        None => Ok(Value::default_for(&method.return_type)),
    }
}

/// Borrowed view of the running activation.
struct Frame<'m> {
    class: &'m LoadedClass,
    method: &'m LoadedMethod,
    code: &'m [u8],
    ip: usize,
    stack: Vec<Value>,
    locals: Vec<Value>,
}

impl<'m> Frame<'m> {
    fn invalid(&self, message: &str) -> RuntimeError {
        RuntimeError::InvalidBytecode {
            method: format!("{}.{}", self.class.name(), self.method.signature()),
            message: format!("{message} at offset {}", self.ip),
        }
    }

    fn next_op(&mut self) -> Result<OpCode, RuntimeError> {
        let byte = self.read_u8()?;
        OpCode::from_u8(byte).ok_or_else(|| self.invalid("unknown opcode"))
    }

    fn read_u8(&mut self) -> Result<u8, RuntimeError> {
        let byte = *self
            .code
            .get(self.ip)
            .ok_or_else(|| self.invalid("execution ran past the end of the code"))?;
        self.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16, RuntimeError> {
        let hi = self.read_u8()?;
        let lo = self.read_u8()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    fn utf8(&mut self) -> Result<&'m str, RuntimeError> {
        let index = self.read_u16()?;
        let class = self.class;
        class.constants().utf8(index).ok_or_else(|| self.invalid("expected a name constant"))
    }

    fn class_name(&mut self) -> Result<&'m str, RuntimeError> {
        let index = self.read_u16()?;
        let class = self.class;
        class
            .constants()
            .class_name(index)
            .ok_or_else(|| self.invalid("expected a class constant"))
    }

    fn field_ref(&mut self) -> Result<MemberRef<'m>, RuntimeError> {
        let index = self.read_u16()?;
        let class = self.class;
        class
            .constants()
            .field_ref(index)
            .ok_or_else(|| self.invalid("expected a field reference"))
    }

    fn method_ref(&mut self) -> Result<MemberRef<'m>, RuntimeError> {
        let index = self.read_u16()?;
        let class = self.class;
        class
            .constants()
            .method_ref(index)
            .ok_or_else(|| self.invalid("expected a method reference"))
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        match self.stack.pop() {
            Some(value) => Ok(value),
            None => Err(self.invalid("operand stack underflow")),
        }
    }

    fn peek(&self) -> Result<&Value, RuntimeError> {
        self.stack.last().ok_or_else(|| self.invalid("operand stack underflow"))
    }

    /// Pop `n` values, returned in push order.
    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, RuntimeError> {
        let Some(start) = self.stack.len().checked_sub(n) else {
            return Err(self.invalid("operand stack underflow"));
        };
        Ok(self.stack.split_off(start))
    }
}

fn descriptor_of(frame: &Frame<'_>, reference: &MemberRef<'_>) -> Result<(Vec<DataType>, DataType), RuntimeError> {
    parse_method_descriptor(reference.descriptor).ok_or_else(|| frame.invalid("malformed method descriptor"))
}

// ==========================================================================
// Values
// ==========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

fn mismatch(expected: &str, actual: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.type_name(),
    }
}

fn arithmetic(op: Arith, a: Value, b: Value) -> Result<Value, RuntimeError> {
    let (Some(x), Some(y)) = (a.promoted(), b.promoted()) else {
        return Err(RuntimeError::TypeMismatch {
            expected: "numeric operands".to_string(),
            actual: format!("{} and {}", a.type_name(), b.type_name()),
        });
    };
    let value = match Numeric::promote(x, y) {
        (Numeric::Int(x), Numeric::Int(y)) => Value::Int(match op {
            Arith::Add => x.wrapping_add(y),
            Arith::Sub => x.wrapping_sub(y),
            Arith::Mul => x.wrapping_mul(y),
            Arith::Div | Arith::Rem if y == 0 => return Err(RuntimeError::DivisionByZero),
            Arith::Div => x.wrapping_div(y),
            Arith::Rem => x.wrapping_rem(y),
        }),
        (Numeric::Long(x), Numeric::Long(y)) => Value::Long(match op {
            Arith::Add => x.wrapping_add(y),
            Arith::Sub => x.wrapping_sub(y),
            Arith::Mul => x.wrapping_mul(y),
            Arith::Div | Arith::Rem if y == 0 => return Err(RuntimeError::DivisionByZero),
            Arith::Div => x.wrapping_div(y),
            Arith::Rem => x.wrapping_rem(y),
        }),
        (x, y) => {
            let (x, y) = (x.to_double(), y.to_double());
            Value::Double(match op {
                Arith::Add => x + y,
                Arith::Sub => x - y,
                Arith::Mul => x * y,
                Arith::Div => x / y,
                Arith::Rem => x % y,
            })
        }
    };
    Ok(value)
}

fn compare(op: OpCode, a: &Value, b: &Value) -> Result<bool, RuntimeError> {
    use std::cmp::Ordering;

    let (Some(x), Some(y)) = (a.promoted(), b.promoted()) else {
        return Err(RuntimeError::TypeMismatch {
            expected: "numeric operands".to_string(),
            actual: format!("{} and {}", a.type_name(), b.type_name()),
        });
    };
    let ordering = match Numeric::promote(x, y) {
        (Numeric::Int(x), Numeric::Int(y)) => Some(x.cmp(&y)),
        (Numeric::Long(x), Numeric::Long(y)) => Some(x.cmp(&y)),
        (x, y) => x.to_double().partial_cmp(&y.to_double()),
    };
    Ok(match op {
        OpCode::Lt => ordering == Some(Ordering::Less),
        OpCode::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        OpCode::Gt => ordering == Some(Ordering::Greater),
        _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    })
}

/// Convert a value to a declared type, widening primitives and checking
/// reference types.
fn coerce(value: Value, ty: &DataType) -> Result<Value, RuntimeError> {
    let converted = match (&value, ty) {
        (_, DataType::Void) => Some(Value::Null),
        (Value::Bool(_), DataType::Boolean)
        | (Value::Int(_), DataType::Int)
        | (Value::Long(_), DataType::Long)
        | (Value::Double(_), DataType::Double) => None,
        (Value::Int(v), DataType::Long) => Some(Value::Long(i64::from(*v))),
        (Value::Int(v), DataType::Double) => Some(Value::Double(f64::from(*v))),
        (Value::Long(v), DataType::Double) => Some(Value::Double(*v as f64)),
        (Value::Null, DataType::Class(_) | DataType::Null) => None,
        _ if reference_cost(&value, ty).is_some() => None,
        _ => return Err(mismatch(&ty.to_string(), &value)),
    };
    Ok(converted.unwrap_or(value))
}

/// Superclass steps from a reference value's class to `ty`.
fn reference_cost(value: &Value, ty: &DataType) -> Option<u32> {
    let DataType::Class(name) = ty else {
        return None;
    };
    let name = name.to_string();
    match value {
        Value::Null => Some(1),
        Value::Str(_) if name == known::STRING => Some(0),
        Value::Str(_) if name == known::OBJECT => Some(1),
        Value::Object(object) => object.class().distance_to(&name),
        _ => None,
    }
}

/// Cost of passing `value` for a parameter of type `ty`, the same scale the
/// compiler uses for overloads.
fn argument_cost(value: &Value, ty: &DataType) -> Option<u32> {
    match (value, ty) {
        (Value::Bool(_), DataType::Boolean)
        | (Value::Int(_), DataType::Int)
        | (Value::Long(_), DataType::Long)
        | (Value::Double(_), DataType::Double) => Some(0),
        (Value::Int(_), DataType::Long) | (Value::Long(_), DataType::Double) => Some(1),
        (Value::Int(_), DataType::Double) => Some(2),
        _ => reference_cost(value, ty),
    }
}

/// Cheapest candidate for the arguments; ties go to the earliest, most
/// derived candidate.
fn select(candidates: Vec<ResolvedMethod>, args: &[Value]) -> Option<ResolvedMethod> {
    candidates
        .into_iter()
        .filter(|c| c.method.params.len() == args.len())
        .filter_map(|c| {
            let cost = args
                .iter()
                .zip(&c.method.params)
                .map(|(arg, ty)| argument_cost(arg, ty))
                .sum::<Option<u32>>()?;
            Some((cost, c))
        })
        .min_by_key(|(cost, _)| *cost)
        .map(|(_, c)| c)
}

fn static_target(class: &Arc<LoadedClass>, name: &str, args: &[Value]) -> Result<ResolvedMethod, RuntimeError> {
    let candidates = class
        .methods_named(name, args.len())
        .into_iter()
        .filter(|m| m.method.is_static())
        .collect();
    select(candidates, args).ok_or_else(|| no_such_method(class, name))
}

fn object_of<'v>(value: &'v Value, member: &str) -> Result<&'v ObjectRef, RuntimeError> {
    match value {
        Value::Object(object) => Ok(object),
        Value::Null => Err(RuntimeError::NullReference {
            member: member.to_string(),
        }),
        other => Err(mismatch("object", other)),
    }
}

fn store(object: &ObjectRef, slot: usize, value: Value, name: &str) -> Result<(), RuntimeError> {
    let ty = object
        .class()
        .layout()
        .get(slot)
        .map(|s| s.ty.clone())
        .ok_or_else(|| no_such_field(object, name))?;
    let value = coerce(value, &ty)?;
    if object.set_field(slot, value) {
        Ok(())
    } else {
        Err(no_such_field(object, name))
    }
}

fn no_such_field(object: &ObjectRef, field: &str) -> RuntimeError {
    RuntimeError::NoSuchField {
        class: object.class().name().to_string(),
        field: field.to_string(),
    }
}

fn no_such_method(class: &LoadedClass, method: &str) -> RuntimeError {
    RuntimeError::NoSuchMethod {
        class: class.name().to_string(),
        method: method.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classforge_ast::build::*;
    use classforge_ast::{BinaryOp, ClassDefinition};
    use classforge_compiler::{CodegenMode, GenerationPass, LoweringPass, ResolutionPass};
    use classforge_core::{Modifiers, QualifiedName};
    use classforge_registry::SymbolRegistry;

    fn q(s: &str) -> QualifiedName {
        QualifiedName::parse(s).unwrap()
    }

    /// Compile and define `classes`, returning a VM over the loader.
    fn load(classes: &[ClassDefinition], mode: CodegenMode) -> Vm {
        let mut registry = SymbolRegistry::with_host_library();
        let refs: Vec<&ClassDefinition> = classes.iter().collect();
        let diagnostics = ResolutionPass::new(&mut registry).run(&refs);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let lowering = LoweringPass::new(true);
        let generation = GenerationPass::new(&registry, mode);
        let artifacts: Vec<_> = classes
            .iter()
            .map(|c| generation.generate(&lowering.lower_class(c)).unwrap())
            .collect();
        let loader = Arc::new(ClassLoader::new());
        loader.define_all(&artifacts).unwrap();
        Vm::new(loader)
    }

    fn class(vm: &Vm, name: &str) -> Arc<LoadedClass> {
        vm.loader().resolve(name).unwrap()
    }

    fn calculator() -> ClassDefinition {
        let mut calc = ClassDefinition::new(q("pkg.Calc"));
        calc.add_field("total", DataType::Long, Modifiers::PRIVATE, Some(lit_int(10)));
        calc.add_method(
            "divide",
            Modifiers::PUBLIC,
            DataType::Int,
            vec![param("a", DataType::Int), param("b", DataType::Int)],
            block(vec![ret(binary(BinaryOp::Div, var("a"), var("b")))]),
        );
        calc.add_method(
            "sumTo",
            Modifiers::PUBLIC | Modifiers::STATIC,
            DataType::Long,
            vec![param("n", DataType::Int)],
            block(vec![
                decl("acc", DataType::Long, lit_long(0)),
                decl("i", DataType::Int, lit_int(1)),
                while_loop(
                    binary(BinaryOp::Le, var("i"), var("n")),
                    block_stmt(vec![
                        expr_stmt(assign(var("acc"), binary(BinaryOp::Add, var("acc"), var("i")))),
                        expr_stmt(assign(var("i"), binary(BinaryOp::Add, var("i"), lit_int(1)))),
                    ]),
                ),
                ret(var("acc")),
            ]),
        );
        calc.add_method(
            "getTotal",
            Modifiers::PUBLIC,
            DataType::Long,
            vec![],
            block(vec![ret(var("total"))]),
        );
        calc.add_method(
            "recurse",
            Modifiers::PUBLIC,
            DataType::Int,
            vec![],
            block(vec![ret(call(this(), "recurse", vec![]))]),
        );
        calc.add_method(
            "deeper",
            Modifiers::PUBLIC,
            DataType::Int,
            vec![param("n", DataType::Int)],
            block(vec![ret(binary(
                BinaryOp::Add,
                call(this(), "deeper", vec![var("n")]),
                lit_int(1),
            ))]),
        );
        calc.add_method(
            "countDown",
            Modifiers::PUBLIC,
            DataType::Long,
            vec![param("n", DataType::Int)],
            block(vec![
                if_else(binary(BinaryOp::Le, var("n"), lit_int(0)), ret(lit_long(0)), None),
                ret(binary(
                    BinaryOp::Add,
                    var("n"),
                    call(this(), "countDown", vec![binary(BinaryOp::Sub, var("n"), lit_int(1))]),
                )),
            ]),
        );
        calc
    }

    #[test]
    fn runs_loops_and_field_initializers() {
        for mode in [CodegenMode::Static, CodegenMode::Dynamic] {
            let mut vm = load(&[calculator()], mode);
            let calc = class(&vm, "pkg.Calc");
            assert_eq!(vm.invoke_static(&calc, "sumTo", &[Value::Int(100)]).unwrap(), Value::Long(5050));

            let instance = vm.instantiate(&calc, &[]).unwrap();
            assert_eq!(vm.invoke(&instance, "getTotal", &[]).unwrap(), Value::Long(10));
            assert_eq!(
                vm.invoke(&instance, "divide", &[Value::Int(7), Value::Int(2)]).unwrap(),
                Value::Int(3)
            );
        }
    }

    #[test]
    fn integer_division_by_zero() {
        let mut vm = load(&[calculator()], CodegenMode::Static);
        let calc = class(&vm, "pkg.Calc");
        let instance = vm.instantiate(&calc, &[]).unwrap();
        assert_eq!(
            vm.invoke(&instance, "divide", &[Value::Int(1), Value::Int(0)]),
            Err(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn call_depth_is_bounded() {
        let mut setup = load(&[calculator()], CodegenMode::Static);
        let calc = class(&setup, "pkg.Calc");
        let loader = Arc::clone(setup.loader());
        let instance = setup.instantiate(&calc, &[]).unwrap();

        let mut vm = Vm::with_config(loader, VmConfig::new().with_max_call_depth(32));
        assert_eq!(
            vm.invoke(&instance, "recurse", &[]),
            Err(RuntimeError::StackOverflow(32))
        );
        // the VM stays usable after unwinding
        assert_eq!(vm.invoke(&instance, "getTotal", &[]).unwrap(), Value::Long(10));
    }

    #[test]
    fn default_depth_limit_is_an_error() {
        for mode in [CodegenMode::Static, CodegenMode::Dynamic] {
            let mut vm = load(&[calculator()], mode);
            let calc = class(&vm, "pkg.Calc");
            let instance = vm.instantiate(&calc, &[]).unwrap();
            assert_eq!(
                vm.invoke(&instance, "deeper", &[Value::Int(1)]),
                Err(RuntimeError::StackOverflow(VmConfig::DEFAULT_MAX_CALL_DEPTH))
            );
            assert_eq!(vm.invoke(&instance, "getTotal", &[]).unwrap(), Value::Long(10));
        }
    }

    #[test]
    fn deep_recursion_stays_off_the_host_stack() {
        for mode in [CodegenMode::Static, CodegenMode::Dynamic] {
            let mut setup = load(&[calculator()], mode);
            let calc = class(&setup, "pkg.Calc");
            let loader = Arc::clone(setup.loader());
            let instance = setup.instantiate(&calc, &[]).unwrap();

            let mut vm = Vm::with_config(loader, VmConfig::new().with_max_call_depth(100_000));
            assert_eq!(
                vm.invoke(&instance, "countDown", &[Value::Int(20_000)]).unwrap(),
                Value::Long(200_010_000)
            );
            assert_eq!(
                vm.invoke(&instance, "deeper", &[Value::Int(1)]),
                Err(RuntimeError::StackOverflow(100_000))
            );
        }
    }

    #[test]
    fn nested_string_conversion_is_bounded() {
        let mut echo = ClassDefinition::new(q("pkg.Echo"));
        echo.add_method(
            "toString",
            Modifiers::PUBLIC,
            DataType::string(),
            vec![],
            block(vec![ret(binary(BinaryOp::Add, lit_str("x"), this()))]),
        );
        let mut vm = load(std::slice::from_ref(&echo), CodegenMode::Static);
        let echo = class(&vm, "pkg.Echo");
        let instance = vm.instantiate(&echo, &[]).unwrap();
        assert!(matches!(vm.stringify(&instance), Err(RuntimeError::StackOverflow(_))));
        assert_eq!(vm.invoke(&Value::from("abc"), "length", &[]).unwrap(), Value::Int(3));
    }

    #[test]
    fn null_receiver_and_unknown_method() {
        let mut vm = load(&[calculator()], CodegenMode::Static);
        assert!(matches!(
            vm.invoke(&Value::Null, "getTotal", &[]),
            Err(RuntimeError::NullReference { .. })
        ));
        let calc = class(&vm, "pkg.Calc");
        let instance = vm.instantiate(&calc, &[]).unwrap();
        assert!(matches!(
            vm.invoke(&instance, "missing", &[]),
            Err(RuntimeError::NoSuchMethod { .. })
        ));
        assert!(matches!(
            vm.invoke(&instance, "divide", &[Value::from("x"), Value::Int(1)]),
            Err(RuntimeError::NoSuchMethod { .. })
        ));
    }

    #[test]
    fn host_methods_through_reflection() {
        let mut vm = Vm::new(Arc::new(ClassLoader::new()));
        let sb_class = vm.loader().resolve(known::STRING_BUILDER).unwrap();
        let sb = vm.instantiate(&sb_class, &[Value::from("a")]).unwrap();
        vm.invoke(&sb, "append", &[Value::Int(1)]).unwrap();
        vm.invoke(&sb, "append", &[Value::Double(2.0)]).unwrap();
        assert_eq!(vm.invoke(&sb, "toString", &[]).unwrap(), Value::from("a12.0"));
        assert_eq!(vm.invoke(&Value::from("abc"), "length", &[]).unwrap(), Value::Int(3));

        let string_class = vm.loader().resolve(known::STRING).unwrap();
        assert!(matches!(
            vm.instantiate(&string_class, &[]),
            Err(RuntimeError::NoSuchMethod { .. })
        ));
    }

    #[test]
    fn dynamic_add_concatenates_strings() {
        let mut class = ClassDefinition::new(q("pkg.Text"));
        class.add_method(
            "label",
            Modifiers::PUBLIC,
            DataType::string(),
            vec![param("n", DataType::Int)],
            block(vec![ret(binary(BinaryOp::Add, lit_str("n="), var("n")))]),
        );
        for mode in [CodegenMode::Static, CodegenMode::Dynamic] {
            let mut vm = load(std::slice::from_ref(&class), mode);
            let text = vm.loader().resolve("pkg.Text").unwrap();
            let instance = vm.instantiate(&text, &[]).unwrap();
            assert_eq!(vm.invoke(&instance, "label", &[Value::Int(4)]).unwrap(), Value::from("n=4"));
        }
    }

    #[test]
    fn abstract_and_inner_instantiation_rules() {
        let mut shape = ClassDefinition::new(q("pkg.Shape")).with_modifiers(Modifiers::PUBLIC | Modifiers::ABSTRACT);
        shape.add_abstract_method("area", Modifiers::PUBLIC, DataType::Double, vec![]);
        let outer = ClassDefinition::new(q("pkg.Outer"));
        let inner = ClassDefinition::nested_in(&q("pkg.Outer"), "Inner", Modifiers::PUBLIC).unwrap();
        let mut vm = load(&[shape, outer, inner], CodegenMode::Static);

        let shape = class(&vm, "pkg.Shape");
        assert_eq!(
            vm.instantiate(&shape, &[]),
            Err(RuntimeError::AbstractInstantiation("pkg.Shape".into()))
        );

        let inner = class(&vm, "pkg.Outer$Inner");
        assert_eq!(
            vm.instantiate(&inner, &[]),
            Err(RuntimeError::OuterInstanceRequired("pkg.Outer$Inner".into()))
        );
        let outer = class(&vm, "pkg.Outer");
        let outer_instance = vm.instantiate(&outer, &[]).unwrap();
        let inner_instance = vm.instantiate_inner(&inner, &outer_instance, &[]).unwrap();
        let bound = inner_instance.as_object().unwrap().field(OUTER_FIELD).unwrap();
        assert_eq!(bound, outer_instance);
        assert!(matches!(
            vm.instantiate_inner(&inner, &Value::from("wrong"), &[]),
            Err(RuntimeError::NoSuchMethod { .. })
        ));
    }

    #[test]
    fn arithmetic_wraps_and_promotes() {
        assert_eq!(
            arithmetic(Arith::Add, Value::Int(i32::MAX), Value::Int(1)).unwrap(),
            Value::Int(i32::MIN)
        );
        assert_eq!(arithmetic(Arith::Mul, Value::Int(3), Value::Long(2)).unwrap(), Value::Long(6));
        assert_eq!(arithmetic(Arith::Div, Value::Int(1), Value::Double(4.0)).unwrap(), Value::Double(0.25));
        assert_eq!(
            arithmetic(Arith::Div, Value::Int(i32::MIN), Value::Int(-1)).unwrap(),
            Value::Int(i32::MIN)
        );
        assert_eq!(
            arithmetic(Arith::Rem, Value::Long(5), Value::Int(0)),
            Err(RuntimeError::DivisionByZero)
        );
        assert!(compare(OpCode::Lt, &Value::Int(1), &Value::Double(1.5)).unwrap());
        assert!(!compare(OpCode::Ge, &Value::Double(f64::NAN), &Value::Int(0)).unwrap());
    }

    #[test]
    fn coercion_widens_and_checks_references() {
        assert_eq!(coerce(Value::Int(2), &DataType::Double).unwrap(), Value::Double(2.0));
        assert_eq!(coerce(Value::from("s"), &DataType::object()).unwrap(), Value::from("s"));
        assert!(coerce(Value::Long(1), &DataType::Int).is_err());
        assert!(coerce(Value::from("s"), &DataType::string_builder()).is_err());
        assert_eq!(coerce(Value::Null, &DataType::string()).unwrap(), Value::Null);
    }
}
