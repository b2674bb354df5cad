//! Terse constructors for statement and expression trees.
//!
//! ```
//! use classforge_ast::build::*;
//! use classforge_core::DataType;
//!
//! let body = block(vec![
//!     decl("n", DataType::Int, binary(BinaryOp::Add, lit_int(1), lit_int(2))),
//!     ret(var("n")),
//! ]);
//! assert_eq!(body.stmts.len(), 2);
//! ```

use classforge_core::{DataType, QualifiedName};

pub use crate::expr::{BinaryOp, UnaryOp};
pub use classforge_core::known as known_class;

use crate::class::Parameter;
use crate::expr::{Expr, Literal};
use crate::stmt::{Block, IfStmt, Stmt, VarDecl, WhileStmt};

// ============================================================================
// Statements
// ============================================================================

pub fn block(stmts: Vec<Stmt>) -> Block {
    Block::new(stmts)
}

pub fn block_stmt(stmts: Vec<Stmt>) -> Stmt {
    Stmt::Block(Block::new(stmts))
}

/// Declare a local with an initializer.
pub fn decl(name: &str, ty: DataType, init: Expr) -> Stmt {
    Stmt::VarDecl(VarDecl {
        name: name.to_string(),
        ty,
        init: Some(init),
    })
}

/// Declare a local without an initializer; it holds the type's default value.
pub fn decl_uninit(name: &str, ty: DataType) -> Stmt {
    Stmt::VarDecl(VarDecl {
        name: name.to_string(),
        ty,
        init: None,
    })
}

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(expr)
}

pub fn ret(expr: Expr) -> Stmt {
    Stmt::Return(Some(expr))
}

pub fn ret_void() -> Stmt {
    Stmt::Return(None)
}

pub fn if_else(condition: Expr, then_branch: Stmt, else_branch: Option<Stmt>) -> Stmt {
    Stmt::If(IfStmt {
        condition,
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
    })
}

pub fn while_loop(condition: Expr, body: Stmt) -> Stmt {
    Stmt::While(WhileStmt {
        condition,
        body: Box::new(body),
    })
}

pub fn super_call(args: Vec<Expr>) -> Stmt {
    Stmt::SuperCall(args)
}

pub fn param(name: &str, ty: DataType) -> Parameter {
    Parameter::new(name, ty)
}

// ============================================================================
// Expressions
// ============================================================================

pub fn null() -> Expr {
    Expr::Literal(Literal::Null)
}

pub fn lit_bool(value: bool) -> Expr {
    Expr::Literal(Literal::Bool(value))
}

pub fn lit_int(value: i32) -> Expr {
    Expr::Literal(Literal::Int(value))
}

pub fn lit_long(value: i64) -> Expr {
    Expr::Literal(Literal::Long(value))
}

pub fn lit_double(value: f64) -> Expr {
    Expr::Literal(Literal::Double(value))
}

pub fn lit_str(value: &str) -> Expr {
    Expr::Literal(Literal::Str(value.to_string()))
}

pub fn var(name: &str) -> Expr {
    Expr::Variable(name.to_string())
}

pub fn this() -> Expr {
    Expr::This
}

pub fn outer_this() -> Expr {
    Expr::OuterThis
}

pub fn field(target: Expr, name: &str) -> Expr {
    Expr::Field {
        target: Box::new(target),
        name: name.to_string(),
    }
}

pub fn assign(target: Expr, value: Expr) -> Expr {
    Expr::Assign {
        target: Box::new(target),
        value: Box::new(value),
    }
}

pub fn call(receiver: Expr, method: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        receiver: Box::new(receiver),
        method: method.to_string(),
        args,
    }
}

pub fn static_call(class: QualifiedName, method: &str, args: Vec<Expr>) -> Expr {
    Expr::StaticCall {
        class,
        method: method.to_string(),
        args,
    }
}

pub fn new_instance(class: QualifiedName, args: Vec<Expr>) -> Expr {
    Expr::New { class, args }
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn neg(operand: Expr) -> Expr {
    Expr::Unary {
        op: UnaryOp::Neg,
        operand: Box::new(operand),
    }
}

pub fn not(operand: Expr) -> Expr {
    Expr::Unary {
        op: UnaryOp::Not,
        operand: Box::new(operand),
    }
}
