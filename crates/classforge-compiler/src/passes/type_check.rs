//! Type Check Pass - verify member bodies against declared types.
//!
//! Runs after resolution, once every class signature is in the registry.
//! Errors are collected per statement so one bad statement does not hide
//! problems later in the same body.

use classforge_ast::{Block, ClassDefinition, Expr, Parameter, Stmt};
use classforge_core::{DataType, Diagnostic, ErrorCode};
use classforge_registry::SymbolRegistry;
use tracing::trace;

use crate::context::MethodContext;
use crate::scope::{DeclareError, LocalScope};
use crate::typing::ExprTyper;

pub struct TypeCheckPass<'a> {
    registry: &'a SymbolRegistry,
}

impl<'a> TypeCheckPass<'a> {
    pub fn new(registry: &'a SymbolRegistry) -> Self {
        Self { registry }
    }

    /// Check every body of `class`, returning the diagnostics found.
    pub fn check_class(&self, class: &ClassDefinition) -> Vec<Diagnostic> {
        let Some(entry) = self.registry.get_class(&class.name) else {
            return Vec::new();
        };
        let mut diagnostics = Vec::new();

        for field in class.fields() {
            let Some(init) = &field.init else { continue };
            let ctx = MethodContext::for_field_init(self.registry, entry, field);
            let mut checker = BodyChecker::new(&ctx, LocalScope::for_instance());
            checker.check_value(init, &field.ty);
            diagnostics.extend(checker.diagnostics);
        }

        for method in class.methods() {
            let Some(body) = &method.body else { continue };
            trace!(class = %class.name, method = %method.name, "checking method");
            let ctx = MethodContext::for_method(self.registry, entry, method);
            let scope = if ctx.is_static {
                LocalScope::new()
            } else {
                LocalScope::for_instance()
            };
            let mut checker = BodyChecker::new(&ctx, scope);
            checker.declare_params(&method.params);
            checker.check_block(body);
            if !method.return_type.is_void() && !body.stmts.iter().any(Stmt::always_returns) {
                checker.diagnostics.push(ctx.error(
                    ErrorCode::MissingReturn,
                    format!("method '{}' must return a value on every path", method.name),
                ));
            }
            diagnostics.extend(checker.diagnostics);
        }

        let constructors: Vec<_> = class.constructors().collect();
        if constructors.is_empty() {
            // the synthesized constructor calls super()
            let ctx = MethodContext::for_constructor(self.registry, entry);
            let mut checker = BodyChecker::new(&ctx, LocalScope::for_instance());
            checker.check_super_call(&[]);
            diagnostics.extend(checker.diagnostics);
        }
        for ctor in constructors {
            let ctx = MethodContext::for_constructor(self.registry, entry);
            let mut checker = BodyChecker::new(&ctx, LocalScope::for_instance());
            checker.declare_params(&ctor.params);
            let rest = match ctor.body.stmts.split_first() {
                Some((Stmt::SuperCall(args), rest)) => {
                    checker.check_super_call(args);
                    rest
                }
                _ => {
                    checker.check_super_call(&[]);
                    ctor.body.stmts.as_slice()
                }
            };
            checker.check_block(&Block::new(rest.to_vec()));
            diagnostics.extend(checker.diagnostics);
        }

        diagnostics
    }
}

struct BodyChecker<'c, 'a> {
    ctx: &'c MethodContext<'a>,
    typer: ExprTyper<'c, 'a>,
    scope: LocalScope,
    diagnostics: Vec<Diagnostic>,
}

impl<'c, 'a> BodyChecker<'c, 'a> {
    fn new(ctx: &'c MethodContext<'a>, scope: LocalScope) -> Self {
        Self {
            ctx,
            typer: ExprTyper::new(ctx),
            scope,
            diagnostics: Vec::new(),
        }
    }

    fn declare_params(&mut self, params: &[Parameter]) {
        for param in params {
            self.declare(&param.name, param.ty.clone());
        }
    }

    fn declare(&mut self, name: &str, ty: DataType) {
        match self.scope.declare(name, ty) {
            Ok(_) => {}
            Err(DeclareError::Duplicate) => self.diagnostics.push(self.ctx.error(
                ErrorCode::DuplicateVariable,
                format!("variable '{name}' is already declared"),
            )),
            Err(DeclareError::TooManyLocals) => self.diagnostics.push(
                self.ctx
                    .error(ErrorCode::CodegenLimit, "method declares too many local variables"),
            ),
        }
    }

    fn check_super_call(&mut self, args: &[Expr]) {
        let result = self
            .typer
            .arg_types(args, &self.scope)
            .and_then(|types| self.typer.super_constructor(&types));
        if let Err(diagnostic) = result {
            self.diagnostics.push(diagnostic);
        }
    }

    fn check_block(&mut self, block: &Block) {
        self.scope.push_scope();
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.scope.pop_scope();
    }

    fn check_nested(&mut self, stmt: &Stmt) {
        self.scope.push_scope();
        self.check_stmt(stmt);
        self.scope.pop_scope();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => self.check_block(block),

            Stmt::VarDecl(decl) => {
                if let Some(init) = &decl.init {
                    self.check_value(init, &decl.ty);
                }
                // declared even when the initializer failed, to avoid cascades
                self.declare(&decl.name, decl.ty.clone());
            }

            Stmt::Expr(expr) => {
                if let Err(diagnostic) = self.typer.type_of(expr, &self.scope) {
                    self.diagnostics.push(diagnostic);
                }
            }

            Stmt::Return(None) => {
                if !self.ctx.return_type.is_void() {
                    self.diagnostics.push(self.ctx.error(
                        ErrorCode::TypeMismatch,
                        format!("missing return value of type '{}'", self.ctx.return_type),
                    ));
                }
            }

            Stmt::Return(Some(value)) => {
                if self.ctx.return_type.is_void() {
                    self.diagnostics.push(
                        self.ctx
                            .error(ErrorCode::TypeMismatch, "a void member cannot return a value"),
                    );
                } else {
                    let expected = self.ctx.return_type.clone();
                    self.check_value(value, &expected);
                }
            }

            Stmt::If(if_stmt) => {
                self.check_condition(&if_stmt.condition);
                self.check_nested(&if_stmt.then_branch);
                if let Some(else_branch) = &if_stmt.else_branch {
                    self.check_nested(else_branch);
                }
            }

            Stmt::While(while_stmt) => {
                self.check_condition(&while_stmt.condition);
                self.check_nested(&while_stmt.body);
            }

            // placement is checked during resolution
            Stmt::SuperCall(_) => {}
        }
    }

    fn check_value(&mut self, expr: &Expr, expected: &DataType) {
        let result = self
            .typer
            .type_of(expr, &self.scope)
            .and_then(|actual| self.typer.expect_assignable(&actual, expected));
        if let Err(diagnostic) = result {
            self.diagnostics.push(diagnostic);
        }
    }

    fn check_condition(&mut self, condition: &Expr) {
        match self.typer.type_of(condition, &self.scope) {
            Ok(DataType::Boolean) => {}
            Ok(other) => self.diagnostics.push(self.ctx.error(
                ErrorCode::TypeMismatch,
                format!("condition must be boolean, found '{other}'"),
            )),
            Err(diagnostic) => self.diagnostics.push(diagnostic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::resolution::ResolutionPass;
    use classforge_ast::BinaryOp;
    use classforge_ast::build::*;
    use classforge_core::{Modifiers, QualifiedName};

    fn q(s: &str) -> QualifiedName {
        QualifiedName::parse(s).unwrap()
    }

    fn check(classes: &[ClassDefinition]) -> Vec<Diagnostic> {
        let mut registry = SymbolRegistry::with_host_library();
        let refs: Vec<&ClassDefinition> = classes.iter().collect();
        let resolution = ResolutionPass::new(&mut registry).run(&refs);
        assert!(resolution.is_empty(), "{resolution:?}");
        let pass = TypeCheckPass::new(&registry);
        classes.iter().flat_map(|c| pass.check_class(c)).collect()
    }

    fn codes(diagnostics: &[Diagnostic]) -> Vec<ErrorCode> {
        diagnostics.iter().map(|d| d.code).collect()
    }

    fn class_with_method(ret_type: DataType, body: Block) -> ClassDefinition {
        let mut class = ClassDefinition::new(q("p.Sample"));
        class.add_method("run", Modifiers::PUBLIC, ret_type, vec![param("n", DataType::Int)], body);
        class
    }

    #[test]
    fn well_typed_method_passes() {
        let class = class_with_method(
            DataType::string(),
            block(vec![
                decl("sb", DataType::string_builder(), new_instance(known_class::string_builder(), vec![])),
                decl("total", DataType::Long, binary(BinaryOp::Mul, var("n"), lit_int(2))),
                if_else(
                    binary(BinaryOp::Gt, var("total"), lit_int(10)),
                    expr_stmt(call(var("sb"), "append", vec![var("total")])),
                    None,
                ),
                ret(call(var("sb"), "toString", vec![])),
            ]),
        );
        assert_eq!(check(&[class]), vec![]);
    }

    #[test]
    fn unknown_method_on_object_is_reported() {
        let class = class_with_method(
            DataType::Void,
            block(vec![
                decl("o", DataType::object(), new_instance(known_class::string_builder(), vec![])),
                expr_stmt(call(var("o"), "append", vec![lit_str("x")])),
            ]),
        );
        let diagnostics = check(&[class]);
        assert_eq!(codes(&diagnostics), vec![ErrorCode::UnknownMethod]);
        assert_eq!(diagnostics[0].class, "p.Sample");
        assert_eq!(diagnostics[0].member.as_deref(), Some("run"));
    }

    #[test]
    fn return_rules() {
        let missing = class_with_method(
            DataType::Int,
            block(vec![if_else(lit_bool(true), ret(lit_int(1)), None)]),
        );
        assert_eq!(codes(&check(&[missing])), vec![ErrorCode::MissingReturn]);

        let wrong = class_with_method(DataType::Int, block(vec![ret(lit_str("no"))]));
        assert_eq!(codes(&check(&[wrong])), vec![ErrorCode::TypeMismatch]);

        let void_value = class_with_method(DataType::Void, block(vec![ret(lit_int(1))]));
        assert_eq!(codes(&check(&[void_value])), vec![ErrorCode::TypeMismatch]);
    }

    #[test]
    fn conditions_must_be_boolean() {
        let class = class_with_method(
            DataType::Void,
            block(vec![while_loop(var("n"), expr_stmt(var("n")))]),
        );
        assert_eq!(codes(&check(&[class])), vec![ErrorCode::TypeMismatch]);
    }

    #[test]
    fn duplicate_locals_and_parameters() {
        let class = class_with_method(
            DataType::Void,
            block(vec![
                decl("n", DataType::Int, lit_int(1)),
                block_stmt(vec![decl("t", DataType::Int, lit_int(1))]),
                block_stmt(vec![decl("t", DataType::Int, lit_int(2))]),
            ]),
        );
        assert_eq!(codes(&check(&[class])), vec![ErrorCode::DuplicateVariable]);
    }

    #[test]
    fn errors_in_later_statements_are_still_found() {
        let class = class_with_method(
            DataType::Void,
            block(vec![
                expr_stmt(var("missing")),
                decl("b", DataType::Boolean, lit_int(3)),
                expr_stmt(binary(BinaryOp::And, var("b"), lit_bool(true))),
            ]),
        );
        assert_eq!(
            codes(&check(&[class])),
            vec![ErrorCode::UnknownVariable, ErrorCode::TypeMismatch]
        );
    }

    #[test]
    fn static_method_cannot_use_this() {
        let mut class = ClassDefinition::new(q("p.Util"));
        class.add_method(
            "make",
            Modifiers::PUBLIC | Modifiers::STATIC,
            DataType::object(),
            vec![],
            block(vec![ret(this())]),
        );
        assert_eq!(codes(&check(&[class])), vec![ErrorCode::StaticContext]);
    }

    #[test]
    fn field_initializer_and_super_constructor() {
        let mut base = ClassDefinition::new(q("p.Base"));
        base.add_constructor(Modifiers::PUBLIC, vec![param("n", DataType::Int)], block(vec![]));
        let mut derived = ClassDefinition::new(q("p.Derived")).with_superclass(q("p.Base"));
        derived.add_field("label", DataType::string(), Modifiers::PRIVATE, Some(lit_int(4)));

        // no Base() to call implicitly, and an int initializer for a String field
        let diagnostics = check(&[base, derived]);
        assert_eq!(
            codes(&diagnostics),
            vec![ErrorCode::TypeMismatch, ErrorCode::NoMatchingOverload]
        );
    }

    #[test]
    fn abstract_class_cannot_be_instantiated() {
        let mut shape = ClassDefinition::new(q("p.Shape")).with_modifiers(Modifiers::PUBLIC | Modifiers::ABSTRACT);
        shape.add_abstract_method("area", Modifiers::PUBLIC, DataType::Double, vec![]);
        let user = class_with_method(
            DataType::Void,
            block(vec![expr_stmt(new_instance(q("p.Shape"), vec![]))]),
        );
        assert_eq!(codes(&check(&[shape, user])), vec![ErrorCode::AbstractInstantiation]);
    }

    #[test]
    fn inner_class_reads_outer_field() {
        let outer_name = q("p.Outer");
        let mut outer = ClassDefinition::new(outer_name.clone());
        outer.add_field("label", DataType::string(), Modifiers::PRIVATE, Some(lit_str("outer")));
        outer.add_method(
            "make",
            Modifiers::PUBLIC,
            DataType::object(),
            vec![],
            block(vec![ret(new_instance(q("p.Outer$Inner"), vec![]))]),
        );
        let mut inner = ClassDefinition::nested_in(&outer_name, "Inner", Modifiers::PUBLIC).unwrap();
        inner.add_method(
            "read",
            Modifiers::PUBLIC,
            DataType::string(),
            vec![],
            block(vec![ret(field(outer_this(), "label"))]),
        );
        assert_eq!(check(&[outer, inner]), vec![]);
    }

    #[test]
    fn static_context_has_no_outer_instance() {
        let outer_name = q("p.Outer");
        let mut outer = ClassDefinition::new(outer_name.clone());
        outer.add_method(
            "make",
            Modifiers::PUBLIC | Modifiers::STATIC,
            DataType::object(),
            vec![],
            block(vec![ret(new_instance(q("p.Outer$Inner"), vec![]))]),
        );
        let inner = ClassDefinition::nested_in(&outer_name, "Inner", Modifiers::PUBLIC).unwrap();
        assert_eq!(codes(&check(&[outer, inner])), vec![ErrorCode::NoOuterInstance]);
    }
}
