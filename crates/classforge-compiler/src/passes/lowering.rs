//! Lowering Pass - desugar a class definition into generation-ready form.
//!
//! - constructors get an explicit prologue: the superclass constructor call,
//!   the outer-instance store for inner classes, then field initializers
//! - a public no-argument constructor is synthesized when none is declared
//! - inner-class constructors take the outer instance as a leading parameter
//! - method bodies that can fall through get a trailing `return`
//! - literal-only subexpressions are folded when optimization is enabled

use classforge_ast::build::{assign, field, this, var};
use classforge_ast::{
    BinaryOp, Block, ClassDefinition, ConstructorMember, Expr, IfStmt, Literal, Parameter, Stmt, UnaryOp, VarDecl,
    WhileStmt,
};
use classforge_core::{DataType, Modifiers, QualifiedName};
use classforge_registry::MethodEntry;

use crate::{OUTER_FIELD, OUTER_FIELD_MODIFIERS};

/// A class ready for bytecode generation.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredClass {
    pub name: QualifiedName,
    pub modifiers: Modifiers,
    pub superclass: QualifiedName,
    pub enclosing: Option<QualifiedName>,
    /// Declared fields, plus the outer-instance field for inner classes.
    pub fields: Vec<LoweredField>,
    pub methods: Vec<LoweredMethod>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoweredField {
    pub name: String,
    pub ty: DataType,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoweredMethod {
    pub name: String,
    pub modifiers: Modifiers,
    /// Parameters as they appear in the descriptor.
    pub params: Vec<Parameter>,
    pub return_type: DataType,
    pub kind: MethodKind,
}

impl LoweredMethod {
    pub fn param_types(&self) -> Vec<DataType> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self.kind, MethodKind::Constructor(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MethodKind {
    Abstract,
    Method(Block),
    Constructor(ConstructorBody),
}

/// A constructor split into the parts compiled in different scopes.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorBody {
    /// Arguments of the superclass constructor call.
    pub super_args: Vec<Expr>,
    /// Outer-instance store and field initializers. These see only the
    /// receiver and the outer-instance parameter, never the declared ones.
    pub initializers: Vec<Stmt>,
    /// Declared body without the leading superclass call.
    pub body: Block,
}

/// Lowers class definitions. Stateless apart from the optimization switch.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoweringPass {
    optimize: bool,
}

impl LoweringPass {
    pub fn new(optimize: bool) -> Self {
        Self { optimize }
    }

    pub fn lower_class(&self, class: &ClassDefinition) -> LoweredClass {
        let outer = class.is_inner().then(|| class.enclosing.clone()).flatten();

        let mut fields: Vec<LoweredField> = class
            .fields()
            .map(|f| LoweredField {
                name: f.name.clone(),
                ty: f.ty.clone(),
                modifiers: f.modifiers,
            })
            .collect();
        if let Some(outer) = &outer {
            fields.push(LoweredField {
                name: OUTER_FIELD.to_string(),
                ty: DataType::Class(outer.clone()),
                modifiers: OUTER_FIELD_MODIFIERS,
            });
        }

        let initializers = self.initializers(class, outer.is_some());

        let mut methods = Vec::new();
        let declared: Vec<&ConstructorMember> = class.constructors().collect();
        if declared.is_empty() {
            let default_ctor = ConstructorMember {
                modifiers: Modifiers::PUBLIC,
                params: Vec::new(),
                body: Block::default(),
            };
            methods.push(self.lower_constructor(&default_ctor, outer.as_ref(), &initializers));
        } else {
            for ctor in declared {
                methods.push(self.lower_constructor(ctor, outer.as_ref(), &initializers));
            }
        }

        for method in class.methods() {
            let kind = match &method.body {
                Some(body) => MethodKind::Method(self.lower_body(body)),
                None => MethodKind::Abstract,
            };
            let mut modifiers = method.modifiers;
            if method.body.is_none() {
                modifiers |= Modifiers::ABSTRACT;
            }
            methods.push(LoweredMethod {
                name: method.name.clone(),
                modifiers,
                params: method.params.clone(),
                return_type: method.return_type.clone(),
                kind,
            });
        }

        LoweredClass {
            name: class.name.clone(),
            modifiers: class.modifiers,
            superclass: class.superclass.clone(),
            enclosing: class.enclosing.clone(),
            fields,
            methods,
        }
    }

    fn initializers(&self, class: &ClassDefinition, inner: bool) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        if inner {
            stmts.push(Stmt::Expr(assign(field(this(), OUTER_FIELD), var(OUTER_FIELD))));
        }
        for f in class.fields() {
            if let Some(init) = &f.init {
                stmts.push(Stmt::Expr(assign(field(this(), &f.name), self.fold(init))));
            }
        }
        stmts
    }

    fn lower_constructor(
        &self,
        ctor: &ConstructorMember,
        outer: Option<&QualifiedName>,
        initializers: &[Stmt],
    ) -> LoweredMethod {
        let mut params = Vec::with_capacity(ctor.params.len() + 1);
        if let Some(outer) = outer {
            params.push(Parameter::new(OUTER_FIELD, DataType::Class(outer.clone())));
        }
        params.extend(ctor.params.iter().cloned());

        let (super_args, rest) = match ctor.body.stmts.split_first() {
            Some((Stmt::SuperCall(args), rest)) => (args.iter().map(|a| self.fold(a)).collect(), rest),
            _ => (Vec::new(), ctor.body.stmts.as_slice()),
        };
        let body = self.lower_body(&Block::new(rest.to_vec()));

        LoweredMethod {
            name: MethodEntry::CONSTRUCTOR_NAME.to_string(),
            modifiers: ctor.modifiers,
            params,
            return_type: DataType::Void,
            kind: MethodKind::Constructor(ConstructorBody {
                super_args,
                initializers: initializers.to_vec(),
                body,
            }),
        }
    }

    /// Fold the body and make the fall-through path return.
    fn lower_body(&self, body: &Block) -> Block {
        let mut stmts: Vec<Stmt> = body.stmts.iter().map(|s| self.fold_stmt(s)).collect();
        if !stmts.iter().any(Stmt::always_returns) {
            stmts.push(Stmt::Return(None));
        }
        Block::new(stmts)
    }

    // ==========================================================================
    // Constant folding
    // ==========================================================================

    fn fold_stmt(&self, stmt: &Stmt) -> Stmt {
        match stmt {
            Stmt::Block(block) => Stmt::Block(Block::new(block.stmts.iter().map(|s| self.fold_stmt(s)).collect())),
            Stmt::VarDecl(decl) => Stmt::VarDecl(VarDecl {
                name: decl.name.clone(),
                ty: decl.ty.clone(),
                init: decl.init.as_ref().map(|e| self.fold(e)),
            }),
            Stmt::Expr(expr) => Stmt::Expr(self.fold(expr)),
            Stmt::Return(value) => Stmt::Return(value.as_ref().map(|e| self.fold(e))),
            Stmt::If(if_stmt) => Stmt::If(IfStmt {
                condition: self.fold(&if_stmt.condition),
                then_branch: Box::new(self.fold_stmt(&if_stmt.then_branch)),
                else_branch: if_stmt.else_branch.as_ref().map(|e| Box::new(self.fold_stmt(e))),
            }),
            Stmt::While(while_stmt) => Stmt::While(WhileStmt {
                condition: self.fold(&while_stmt.condition),
                body: Box::new(self.fold_stmt(&while_stmt.body)),
            }),
            Stmt::SuperCall(args) => Stmt::SuperCall(args.iter().map(|a| self.fold(a)).collect()),
        }
    }

    /// Fold literal-only subexpressions. Identity when optimization is off.
    pub fn fold(&self, expr: &Expr) -> Expr {
        if !self.optimize {
            return expr.clone();
        }
        match expr {
            Expr::Binary { op, left, right } => {
                let left = self.fold(left);
                let right = self.fold(right);
                if let (Some(l), Some(r)) = (left.as_literal(), right.as_literal())
                    && let Some(folded) = fold_binary(*op, l, r)
                {
                    return Expr::Literal(folded);
                }
                Expr::Binary {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            Expr::Unary { op, operand } => {
                let operand = self.fold(operand);
                if let Some(lit) = operand.as_literal()
                    && let Some(folded) = fold_unary(*op, lit)
                {
                    return Expr::Literal(folded);
                }
                Expr::Unary {
                    op: *op,
                    operand: Box::new(operand),
                }
            }
            Expr::Field { target, name } => Expr::Field {
                target: Box::new(self.fold(target)),
                name: name.clone(),
            },
            Expr::Assign { target, value } => Expr::Assign {
                target: Box::new(self.fold(target)),
                value: Box::new(self.fold(value)),
            },
            Expr::Call { receiver, method, args } => Expr::Call {
                receiver: Box::new(self.fold(receiver)),
                method: method.clone(),
                args: args.iter().map(|a| self.fold(a)).collect(),
            },
            Expr::StaticCall { class, method, args } => Expr::StaticCall {
                class: class.clone(),
                method: method.clone(),
                args: args.iter().map(|a| self.fold(a)).collect(),
            },
            Expr::New { class, args } => Expr::New {
                class: class.clone(),
                args: args.iter().map(|a| self.fold(a)).collect(),
            },
            Expr::Literal(_) | Expr::Variable(_) | Expr::This | Expr::OuterThis => expr.clone(),
        }
    }
}

/// Numeric literal widened for folding.
#[derive(Clone, Copy)]
enum Num {
    Int(i32),
    Long(i64),
    Double(f64),
}

fn as_num(lit: &Literal) -> Option<Num> {
    match *lit {
        Literal::Int(v) => Some(Num::Int(v)),
        Literal::Long(v) => Some(Num::Long(v)),
        Literal::Double(v) => Some(Num::Double(v)),
        _ => None,
    }
}

fn promote(l: Num, r: Num) -> (Num, Num) {
    match (l, r) {
        (Num::Double(_), _) | (_, Num::Double(_)) => (Num::Double(to_f64(l)), Num::Double(to_f64(r))),
        (Num::Long(_), _) | (_, Num::Long(_)) => (Num::Long(to_i64(l)), Num::Long(to_i64(r))),
        _ => (l, r),
    }
}

fn to_f64(n: Num) -> f64 {
    match n {
        Num::Int(v) => v as f64,
        Num::Long(v) => v as f64,
        Num::Double(v) => v,
    }
}

fn to_i64(n: Num) -> i64 {
    match n {
        Num::Int(v) => v as i64,
        Num::Long(v) => v,
        Num::Double(v) => v as i64,
    }
}

fn fold_binary(op: BinaryOp, l: &Literal, r: &Literal) -> Option<Literal> {
    use BinaryOp::*;

    match (l, r) {
        (Literal::Str(a), Literal::Str(b)) if op == Add => return Some(Literal::Str(format!("{a}{b}"))),
        (Literal::Bool(a), Literal::Bool(b)) => {
            return match op {
                And => Some(Literal::Bool(*a && *b)),
                Or => Some(Literal::Bool(*a || *b)),
                Eq => Some(Literal::Bool(a == b)),
                Ne => Some(Literal::Bool(a != b)),
                _ => None,
            };
        }
        _ => {}
    }

    let (l, r) = promote(as_num(l)?, as_num(r)?);
    match (l, r) {
        (Num::Int(a), Num::Int(b)) => match op {
            Add => Some(Literal::Int(a.wrapping_add(b))),
            Sub => Some(Literal::Int(a.wrapping_sub(b))),
            Mul => Some(Literal::Int(a.wrapping_mul(b))),
            // division by zero is left for the interpreter to report
            Div if b != 0 => Some(Literal::Int(a.wrapping_div(b))),
            Rem if b != 0 => Some(Literal::Int(a.wrapping_rem(b))),
            _ => compare(op, a.cmp(&b)),
        },
        (Num::Long(a), Num::Long(b)) => match op {
            Add => Some(Literal::Long(a.wrapping_add(b))),
            Sub => Some(Literal::Long(a.wrapping_sub(b))),
            Mul => Some(Literal::Long(a.wrapping_mul(b))),
            Div if b != 0 => Some(Literal::Long(a.wrapping_div(b))),
            Rem if b != 0 => Some(Literal::Long(a.wrapping_rem(b))),
            _ => compare(op, a.cmp(&b)),
        },
        (Num::Double(a), Num::Double(b)) => match op {
            Add => Some(Literal::Double(a + b)),
            Sub => Some(Literal::Double(a - b)),
            Mul => Some(Literal::Double(a * b)),
            Div => Some(Literal::Double(a / b)),
            Rem => Some(Literal::Double(a % b)),
            _ => a.partial_cmp(&b).and_then(|ord| compare(op, ord)),
        },
        _ => None,
    }
}

fn compare(op: BinaryOp, ord: std::cmp::Ordering) -> Option<Literal> {
    use std::cmp::Ordering::*;
    let value = match op {
        BinaryOp::Eq => ord == Equal,
        BinaryOp::Ne => ord != Equal,
        BinaryOp::Lt => ord == Less,
        BinaryOp::Le => ord != Greater,
        BinaryOp::Gt => ord == Greater,
        BinaryOp::Ge => ord != Less,
        _ => return None,
    };
    Some(Literal::Bool(value))
}

fn fold_unary(op: UnaryOp, lit: &Literal) -> Option<Literal> {
    match (op, lit) {
        (UnaryOp::Neg, Literal::Int(v)) => Some(Literal::Int(v.wrapping_neg())),
        (UnaryOp::Neg, Literal::Long(v)) => Some(Literal::Long(v.wrapping_neg())),
        (UnaryOp::Neg, Literal::Double(v)) => Some(Literal::Double(-v)),
        (UnaryOp::Not, Literal::Bool(v)) => Some(Literal::Bool(!v)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classforge_ast::build::*;

    fn q(s: &str) -> QualifiedName {
        QualifiedName::parse(s).unwrap()
    }

    fn constructor_of(class: &LoweredClass) -> &LoweredMethod {
        class.methods.iter().find(|m| m.is_constructor()).unwrap()
    }

    #[test]
    fn default_constructor_is_synthesized() {
        let mut class = ClassDefinition::new(q("p.Plain"));
        class.add_field("size", DataType::Int, Modifiers::PRIVATE, Some(lit_int(3)));

        let lowered = LoweringPass::new(false).lower_class(&class);
        let ctor = constructor_of(&lowered);
        assert!(ctor.params.is_empty());
        assert_eq!(ctor.modifiers, Modifiers::PUBLIC);
        let MethodKind::Constructor(body) = &ctor.kind else {
            panic!("expected a constructor");
        };
        assert!(body.super_args.is_empty());
        assert_eq!(
            body.initializers,
            vec![expr_stmt(assign(field(this(), "size"), lit_int(3)))]
        );
        assert_eq!(body.body.stmts, vec![ret_void()]);
    }

    #[test]
    fn explicit_super_call_is_split_off() {
        let mut class = ClassDefinition::new(q("p.Child")).with_superclass(q("p.Base"));
        class.add_constructor(
            Modifiers::PUBLIC,
            vec![param("n", DataType::Int)],
            block(vec![super_call(vec![var("n")]), expr_stmt(var("n"))]),
        );

        let lowered = LoweringPass::new(false).lower_class(&class);
        let MethodKind::Constructor(body) = &constructor_of(&lowered).kind else {
            panic!("expected a constructor");
        };
        assert_eq!(body.super_args, vec![var("n")]);
        assert_eq!(body.body.stmts, vec![expr_stmt(var("n")), ret_void()]);
    }

    #[test]
    fn inner_class_gets_outer_plumbing() {
        let outer = q("p.Outer");
        let inner = ClassDefinition::nested_in(&outer, "Inner", Modifiers::PUBLIC).unwrap();

        let lowered = LoweringPass::new(false).lower_class(&inner);
        let outer_field = lowered.fields.iter().find(|f| f.name == OUTER_FIELD).unwrap();
        assert_eq!(outer_field.ty, DataType::Class(outer.clone()));
        assert!(outer_field.modifiers.contains(Modifiers::SYNTHETIC));

        let ctor = constructor_of(&lowered);
        assert_eq!(ctor.param_types(), vec![DataType::Class(outer)]);
        let MethodKind::Constructor(body) = &ctor.kind else {
            panic!("expected a constructor");
        };
        assert_eq!(
            body.initializers[0],
            expr_stmt(assign(field(this(), OUTER_FIELD), var(OUTER_FIELD)))
        );
    }

    #[test]
    fn static_nested_class_has_no_outer_field() {
        let outer = q("p.Outer");
        let nested = ClassDefinition::nested_in(&outer, "Helper", Modifiers::PUBLIC | Modifiers::STATIC).unwrap();
        let lowered = LoweringPass::new(false).lower_class(&nested);
        assert!(lowered.fields.is_empty());
        assert!(constructor_of(&lowered).params.is_empty());
    }

    #[test]
    fn abstract_methods_stay_bodiless() {
        let mut class = ClassDefinition::new(q("p.Shape")).with_modifiers(Modifiers::PUBLIC | Modifiers::ABSTRACT);
        class.add_abstract_method("area", Modifiers::PUBLIC, DataType::Double, vec![]);
        let lowered = LoweringPass::new(false).lower_class(&class);
        let area = lowered.methods.iter().find(|m| m.name == "area").unwrap();
        assert_eq!(area.kind, MethodKind::Abstract);
        assert!(area.modifiers.is_abstract());
    }

    #[test]
    fn folding_respects_promotion_and_zero_division() {
        let pass = LoweringPass::new(true);
        assert_eq!(pass.fold(&binary(BinaryOp::Add, lit_int(2), lit_long(3))), lit_long(5));
        assert_eq!(pass.fold(&binary(BinaryOp::Mul, lit_int(i32::MAX), lit_int(2))), lit_int(-2));
        assert_eq!(
            pass.fold(&binary(BinaryOp::Add, lit_str("test"), lit_str("String"))),
            lit_str("testString")
        );
        assert_eq!(pass.fold(&binary(BinaryOp::Lt, lit_int(1), lit_double(1.5))), lit_bool(true));
        assert_eq!(pass.fold(&neg(lit_int(4))), lit_int(-4));
        assert_eq!(pass.fold(&not(lit_bool(false))), lit_bool(true));

        let div = binary(BinaryOp::Div, lit_int(1), lit_int(0));
        assert_eq!(pass.fold(&div), div);
        let mixed = binary(BinaryOp::Add, lit_str("n="), lit_int(1));
        assert_eq!(pass.fold(&mixed), mixed);
    }

    #[test]
    fn folding_is_off_without_optimize() {
        let sum = binary(BinaryOp::Add, lit_int(1), lit_int(2));
        assert_eq!(LoweringPass::new(false).fold(&sum), sum);
    }
}
