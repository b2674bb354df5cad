//! Statement nodes.

use classforge_core::DataType;

use crate::expr::Expr;

/// A sequence of statements with its own local scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Nested block.
    Block(Block),
    /// Local variable declaration.
    VarDecl(VarDecl),
    /// Expression evaluated for its side effects.
    Expr(Expr),
    /// Return, with a value for non-void methods.
    Return(Option<Expr>),
    /// Conditional.
    If(IfStmt),
    /// Pre-tested loop.
    While(WhileStmt),
    /// Explicit superclass constructor call; first statement of a constructor only.
    SuperCall(Vec<Expr>),
}

impl Stmt {
    /// Whether control can never fall through this statement.
    ///
    /// Conservative: loops are assumed to possibly exit.
    pub fn always_returns(&self) -> bool {
        match self {
            Stmt::Return(_) => true,
            Stmt::Block(block) => block.stmts.iter().any(Stmt::always_returns),
            Stmt::If(if_stmt) => {
                if_stmt.then_branch.always_returns()
                    && if_stmt
                        .else_branch
                        .as_ref()
                        .is_some_and(|e| e.always_returns())
            }
            _ => false,
        }
    }
}

/// `Type name = init;`
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: DataType,
    pub init: Option<Expr>,
}

/// `if (cond) then else otherwise`
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
}

/// `while (cond) body`
#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
}

#[cfg(test)]
mod tests {
    use crate::build::*;

    #[test]
    fn return_analysis() {
        assert!(ret(lit_int(1)).always_returns());
        assert!(!expr_stmt(lit_int(1)).always_returns());
        assert!(if_else(lit_bool(true), ret(lit_int(1)), Some(ret(lit_int(2)))).always_returns());
        assert!(!if_else(lit_bool(true), ret(lit_int(1)), None).always_returns());
        assert!(!while_loop(lit_bool(true), ret(lit_int(1))).always_returns());
        assert!(
            crate::Stmt::Block(block(vec![expr_stmt(lit_int(0)), ret_void()])).always_returns()
        );
    }
}
