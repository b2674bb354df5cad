//! Expression typing.
//!
//! [`ExprTyper`] computes the static type of an expression against the
//! declared types of the class definition tree and the registry. The type
//! checking pass uses it to report diagnostics; code generation uses it to
//! pick member references and insert widening conversions.

use classforge_ast::{BinaryOp, Expr, Literal, UnaryOp};
use classforge_core::{DataType, Diagnostic, ErrorCode, QualifiedName};
use classforge_registry::{ClassEntry, FieldEntry, MethodEntry, OverloadResult};

use crate::context::MethodContext;
use crate::scope::{LocalScope, LocalVar};

/// What a bare variable name refers to.
#[derive(Debug, Clone)]
pub enum VarTarget<'a> {
    Local(LocalVar),
    /// Field of the current instance, accessed without `this.`.
    Field(&'a FieldEntry),
}

/// Operand and result types of a binary operation.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryTyping {
    /// Type both operands are widened to, for numeric operations.
    pub operand: Option<DataType>,
    pub result: DataType,
    /// String concatenation rather than arithmetic.
    pub concat: bool,
}

pub struct ExprTyper<'c, 'a> {
    ctx: &'c MethodContext<'a>,
}

impl<'c, 'a> ExprTyper<'c, 'a> {
    pub fn new(ctx: &'c MethodContext<'a>) -> Self {
        Self { ctx }
    }

    /// Static type of `expr`.
    pub fn type_of(&self, expr: &Expr, scope: &LocalScope) -> Result<DataType, Diagnostic> {
        match expr {
            Expr::Literal(lit) => Ok(literal_type(lit)),

            Expr::Variable(name) => match self.variable(name, scope)? {
                VarTarget::Local(var) => Ok(var.data_type),
                VarTarget::Field(field) => Ok(field.ty.clone()),
            },

            Expr::This => {
                self.require_instance("this")?;
                Ok(self.ctx.this_type())
            }

            Expr::OuterThis => {
                self.require_instance("the enclosing instance")?;
                match &self.ctx.class.enclosing {
                    Some(outer) if self.ctx.class.is_inner() => Ok(DataType::Class(outer.clone())),
                    _ => Err(self.ctx.error(
                        ErrorCode::NoOuterInstance,
                        format!("'{}' has no enclosing instance", self.ctx.class.name),
                    )),
                }
            }

            Expr::Field { target, name } => {
                let target_ty = self.type_of(target, scope)?;
                Ok(self.field(&target_ty, name)?.ty.clone())
            }

            Expr::Assign { target, value } => {
                let target_ty = self.assign_target_type(target, scope)?;
                let value_ty = self.type_of(value, scope)?;
                self.expect_assignable(&value_ty, &target_ty)?;
                Ok(target_ty)
            }

            Expr::Call {
                receiver,
                method,
                args,
            } => {
                let receiver_ty = self.type_of(receiver, scope)?;
                let arg_types = self.arg_types(args, scope)?;
                Ok(self.method(&receiver_ty, method, &arg_types)?.return_type.clone())
            }

            Expr::StaticCall {
                class,
                method,
                args,
            } => {
                let arg_types = self.arg_types(args, scope)?;
                Ok(self.static_method(class, method, &arg_types)?.return_type.clone())
            }

            Expr::New { class, args } => {
                let arg_types = self.arg_types(args, scope)?;
                self.constructor(class, &arg_types)?;
                Ok(DataType::Class(class.clone()))
            }

            Expr::Binary { op, left, right } => {
                let l = self.type_of(left, scope)?;
                let r = self.type_of(right, scope)?;
                Ok(self.binary(*op, &l, &r)?.result)
            }

            Expr::Unary { op, operand } => {
                let ty = self.type_of(operand, scope)?;
                self.unary(*op, &ty)
            }
        }
    }

    pub fn arg_types(&self, args: &[Expr], scope: &LocalScope) -> Result<Vec<DataType>, Diagnostic> {
        args.iter().map(|arg| self.type_of(arg, scope)).collect()
    }

    /// Resolve a bare name: locals first, then fields of the current class.
    pub fn variable(&self, name: &str, scope: &LocalScope) -> Result<VarTarget<'a>, Diagnostic> {
        if let Some(var) = scope.lookup(name) {
            return Ok(VarTarget::Local(var.clone()));
        }
        match self.ctx.registry.find_field(&self.ctx.class.name, name) {
            Some(field) => {
                self.require_instance(&format!("field '{name}'"))?;
                Ok(VarTarget::Field(field))
            }
            None => Err(self
                .ctx
                .error(ErrorCode::UnknownVariable, format!("unknown variable '{name}'"))),
        }
    }

    fn assign_target_type(&self, target: &Expr, scope: &LocalScope) -> Result<DataType, Diagnostic> {
        match target {
            Expr::Variable(_) | Expr::Field { .. } => self.type_of(target, scope),
            _ => Err(self.ctx.error(
                ErrorCode::InvalidAssignmentTarget,
                "only variables and fields can be assigned",
            )),
        }
    }

    pub fn class(&self, name: &QualifiedName) -> Result<&'a ClassEntry, Diagnostic> {
        self.ctx
            .registry
            .get_class(name)
            .ok_or_else(|| self.ctx.error(ErrorCode::UnknownType, format!("unknown class '{name}'")))
    }

    fn receiver_class(&self, ty: &DataType, member: &str) -> Result<&'a ClassEntry, Diagnostic> {
        match ty {
            DataType::Class(name) => self.class(name),
            other => Err(self.ctx.error(
                ErrorCode::NotAnObject,
                format!("cannot access '{member}' on a value of type '{other}'"),
            )),
        }
    }

    /// Field `name` on a value of type `owner`.
    pub fn field(&self, owner: &DataType, name: &str) -> Result<&'a FieldEntry, Diagnostic> {
        let class = self.receiver_class(owner, name)?;
        self.ctx.registry.find_field(&class.name, name).ok_or_else(|| {
            self.ctx.error(
                ErrorCode::UnknownField,
                format!("class '{}' has no field '{name}'", class.name),
            )
        })
    }

    /// Instance (or static) method called on a receiver of type `receiver`.
    pub fn method(
        &self,
        receiver: &DataType,
        name: &str,
        args: &[DataType],
    ) -> Result<&'a MethodEntry, Diagnostic> {
        let class = self.receiver_class(receiver, name)?;
        let registry = self.ctx.registry;
        let candidates = registry.find_methods(&class.name, name);
        if candidates.is_empty() {
            return Err(self.ctx.error(
                ErrorCode::UnknownMethod,
                format!("class '{}' has no method '{name}'", class.name),
            ));
        }
        self.pick(registry.select_overload(candidates, args), name, args)
    }

    /// Static method of `class`.
    pub fn static_method(
        &self,
        class: &QualifiedName,
        name: &str,
        args: &[DataType],
    ) -> Result<&'a MethodEntry, Diagnostic> {
        let class = self.class(class)?;
        let registry = self.ctx.registry;
        let candidates = registry.find_methods(&class.name, name);
        if candidates.is_empty() {
            return Err(self.ctx.error(
                ErrorCode::UnknownMethod,
                format!("class '{}' has no method '{name}'", class.name),
            ));
        }
        let statics: Vec<&MethodEntry> = candidates.into_iter().filter(|m| m.is_static()).collect();
        if statics.is_empty() {
            return Err(self.ctx.error(
                ErrorCode::StaticContext,
                format!("method '{}.{name}' is not static", class.name),
            ));
        }
        self.pick(registry.select_overload(statics, args), name, args)
    }

    /// Constructor used by `new class(args)`.
    pub fn constructor(&self, class: &QualifiedName, args: &[DataType]) -> Result<&'a MethodEntry, Diagnostic> {
        let entry = self.class(class)?;
        if entry.is_abstract() {
            return Err(self.ctx.error(
                ErrorCode::AbstractInstantiation,
                format!("cannot instantiate abstract class '{class}'"),
            ));
        }
        if entry.is_inner() {
            self.ctx.outer_instance(entry)?;
        }
        self.pick(self.ctx.registry.resolve_constructor(class, args), "<init>", args)
    }

    /// Superclass constructor selected by an explicit `super(...)` call.
    pub fn super_constructor(&self, args: &[DataType]) -> Result<&'a MethodEntry, Diagnostic> {
        let Some(superclass) = self.ctx.class.superclass.as_ref() else {
            return Err(self
                .ctx
                .error(ErrorCode::InvalidSuperclass, "class has no superclass"));
        };
        self.pick(self.ctx.registry.resolve_constructor(superclass, args), "super", args)
    }

    fn pick(
        &self,
        result: OverloadResult<'a>,
        name: &str,
        args: &[DataType],
    ) -> Result<&'a MethodEntry, Diagnostic> {
        match result {
            OverloadResult::Found(method) => Ok(method),
            OverloadResult::NoMatch => Err(self.ctx.error(
                ErrorCode::NoMatchingOverload,
                format!("no overload of '{name}' accepts ({})", join_types(args)),
            )),
            OverloadResult::Ambiguous(candidates) => {
                let names: Vec<String> = candidates.iter().map(|m| m.signature()).collect();
                Err(self.ctx.error(
                    ErrorCode::AmbiguousCall,
                    format!(
                        "call to '{name}' with ({}) is ambiguous between {}",
                        join_types(args),
                        names.join(" and ")
                    ),
                ))
            }
        }
    }

    pub fn binary(&self, op: BinaryOp, l: &DataType, r: &DataType) -> Result<BinaryTyping, Diagnostic> {
        let invalid = || {
            self.ctx.error(
                ErrorCode::InvalidOperand,
                format!("operator '{op}' cannot be applied to '{l}' and '{r}'"),
            )
        };

        if op == BinaryOp::Add && (l.is_string() || r.is_string()) {
            if l.is_void() || r.is_void() {
                return Err(invalid());
            }
            return Ok(BinaryTyping {
                operand: None,
                result: DataType::string(),
                concat: true,
            });
        }

        if op.is_arithmetic() || op.is_ordering() {
            let promoted = l.numeric_promotion(r).ok_or_else(invalid)?;
            let result = if op.is_ordering() {
                DataType::Boolean
            } else {
                promoted.clone()
            };
            return Ok(BinaryTyping {
                operand: Some(promoted),
                result,
                concat: false,
            });
        }

        if op.is_equality() {
            let operand = if let Some(promoted) = l.numeric_promotion(r) {
                Some(promoted)
            } else if (*l == DataType::Boolean && *r == DataType::Boolean)
                || (l.is_reference() && r.is_reference())
            {
                None
            } else {
                return Err(invalid());
            };
            return Ok(BinaryTyping {
                operand,
                result: DataType::Boolean,
                concat: false,
            });
        }

        // logical
        if *l == DataType::Boolean && *r == DataType::Boolean {
            Ok(BinaryTyping {
                operand: None,
                result: DataType::Boolean,
                concat: false,
            })
        } else {
            Err(invalid())
        }
    }

    pub fn unary(&self, op: UnaryOp, ty: &DataType) -> Result<DataType, Diagnostic> {
        let ok = match op {
            UnaryOp::Neg => ty.is_numeric(),
            UnaryOp::Not => *ty == DataType::Boolean,
        };
        if ok {
            Ok(ty.clone())
        } else {
            Err(self.ctx.error(
                ErrorCode::InvalidOperand,
                format!("operator '{op}' cannot be applied to '{ty}'"),
            ))
        }
    }

    /// Require that a value of type `from` can be stored where `to` is expected.
    pub fn expect_assignable(&self, from: &DataType, to: &DataType) -> Result<(), Diagnostic> {
        if self.ctx.registry.is_assignable(from, to) {
            Ok(())
        } else {
            Err(self.ctx.error(
                ErrorCode::TypeMismatch,
                format!("expected '{to}', found '{from}'"),
            ))
        }
    }

    fn require_instance(&self, what: &str) -> Result<(), Diagnostic> {
        if self.ctx.is_static {
            Err(self.ctx.error(
                ErrorCode::StaticContext,
                format!("{what} is not available in a static method"),
            ))
        } else {
            Ok(())
        }
    }
}

pub fn literal_type(lit: &Literal) -> DataType {
    match lit {
        Literal::Null => DataType::Null,
        Literal::Bool(_) => DataType::Boolean,
        Literal::Int(_) => DataType::Int,
        Literal::Long(_) => DataType::Long,
        Literal::Double(_) => DataType::Double,
        Literal::Str(_) => DataType::string(),
    }
}

fn join_types(types: &[DataType]) -> String {
    types.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use classforge_ast::build::*;
    use classforge_core::{Modifiers, known};
    use classforge_registry::SymbolRegistry;

    fn q(s: &str) -> QualifiedName {
        QualifiedName::parse(s).unwrap()
    }

    fn registry() -> SymbolRegistry {
        let mut registry = SymbolRegistry::with_host_library();
        let mut widget = ClassEntry::script(q("p.Widget"), Modifiers::PUBLIC);
        widget.superclass = Some(known::object());
        widget.fields.push(FieldEntry::new(q("p.Widget"), "size", DataType::Int, Modifiers::PRIVATE));
        widget.constructors.push(MethodEntry::constructor(q("p.Widget"), Modifiers::PUBLIC, vec![]));
        widget.methods.push(MethodEntry::method(
            q("p.Widget"),
            "make",
            Modifiers::PUBLIC | Modifiers::STATIC,
            vec![DataType::Long],
            DataType::class(q("p.Widget")),
        ));
        registry.register_class(widget).unwrap();
        registry
    }

    fn with_ctx<R>(is_static: bool, f: impl FnOnce(&ExprTyper<'_, '_>) -> R) -> R {
        let registry = registry();
        let class = registry.get_class(&q("p.Widget")).unwrap();
        let mut ctx = MethodContext::for_constructor(&registry, class);
        ctx.is_static = is_static;
        let typer = ExprTyper::new(&ctx);
        f(&typer)
    }

    #[test]
    fn string_builder_chain_types() {
        with_ctx(false, |typer| {
            let expr = call(
                call(new_instance(known_class::string_builder(), vec![]), "append", vec![lit_str("x")]),
                "toString",
                vec![],
            );
            assert_eq!(typer.type_of(&expr, &LocalScope::new()), Ok(DataType::string()));
        });
    }

    #[test]
    fn implicit_field_and_static_context() {
        with_ctx(false, |typer| {
            assert_eq!(typer.type_of(&var("size"), &LocalScope::new()), Ok(DataType::Int));
        });
        with_ctx(true, |typer| {
            let err = typer.type_of(&var("size"), &LocalScope::new()).unwrap_err();
            assert_eq!(err.code, ErrorCode::StaticContext);
            let err = typer.type_of(&this(), &LocalScope::new()).unwrap_err();
            assert_eq!(err.code, ErrorCode::StaticContext);
        });
    }

    #[test]
    fn numeric_promotion_and_concat() {
        with_ctx(false, |typer| {
            let scope = LocalScope::new();
            let sum = binary(BinaryOp::Add, lit_int(1), lit_long(2));
            assert_eq!(typer.type_of(&sum, &scope), Ok(DataType::Long));
            let text = binary(BinaryOp::Add, lit_str("n="), lit_int(2));
            assert_eq!(typer.type_of(&text, &scope), Ok(DataType::string()));
            let cmp = binary(BinaryOp::Lt, lit_int(1), lit_double(2.0));
            assert_eq!(typer.type_of(&cmp, &scope), Ok(DataType::Boolean));
            let bad = binary(BinaryOp::And, lit_int(1), lit_bool(true));
            assert_eq!(typer.type_of(&bad, &scope).unwrap_err().code, ErrorCode::InvalidOperand);
        });
    }

    #[test]
    fn assignment_rules() {
        with_ctx(false, |typer| {
            let scope = LocalScope::new();
            let ok = assign(field(this(), "size"), lit_int(4));
            assert_eq!(typer.type_of(&ok, &scope), Ok(DataType::Int));
            let narrowing = assign(field(this(), "size"), lit_long(4));
            assert_eq!(typer.type_of(&narrowing, &scope).unwrap_err().code, ErrorCode::TypeMismatch);
            let bad_target = assign(lit_int(1), lit_int(2));
            assert_eq!(
                typer.type_of(&bad_target, &scope).unwrap_err().code,
                ErrorCode::InvalidAssignmentTarget
            );
        });
    }

    #[test]
    fn member_errors() {
        with_ctx(false, |typer| {
            let scope = LocalScope::new();
            let missing = call(this(), "nope", vec![]);
            assert_eq!(typer.type_of(&missing, &scope).unwrap_err().code, ErrorCode::UnknownMethod);
            let on_int = field(lit_int(1), "x");
            assert_eq!(typer.type_of(&on_int, &scope).unwrap_err().code, ErrorCode::NotAnObject);
            let wrong_args = new_instance(known_class::string_builder(), vec![lit_int(1), lit_int(2)]);
            assert_eq!(
                typer.type_of(&wrong_args, &scope).unwrap_err().code,
                ErrorCode::NoMatchingOverload
            );
            let ambiguous = call(new_instance(known_class::string_builder(), vec![]), "append", vec![null()]);
            assert_eq!(typer.type_of(&ambiguous, &scope).unwrap_err().code, ErrorCode::AmbiguousCall);
        });
    }

    #[test]
    fn static_calls_widen_arguments() {
        with_ctx(true, |typer| {
            let make = static_call(q("p.Widget"), "make", vec![lit_int(3)]);
            assert_eq!(
                typer.type_of(&make, &LocalScope::new()),
                Ok(DataType::class(q("p.Widget")))
            );
            let not_static = static_call(known_class::string(), "length", vec![]);
            assert_eq!(
                typer.type_of(&not_static, &LocalScope::new()).unwrap_err().code,
                ErrorCode::StaticContext
            );
        });
    }
}
