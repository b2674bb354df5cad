//! Class definition trees.
//!
//! Classes compiled by classforge are never parsed from text. Callers build
//! them directly as owned trees:
//!
//! - [`ClassDefinition`]: name, modifiers, superclass, members, nesting
//! - [`Member`]: fields, methods and constructors
//! - [`Stmt`] / [`Expr`]: member bodies
//! - [`build`]: terse constructor functions for statements and expressions
//!
//! # Example
//!
//! ```
//! use classforge_ast::{ClassDefinition, build::*};
//! use classforge_core::{DataType, Modifiers};
//!
//! let mut class = ClassDefinition::named("com.example.TopLevelClass").unwrap();
//! class.add_method(
//!     "test",
//!     Modifiers::PUBLIC,
//!     DataType::string_builder(),
//!     vec![],
//!     block(vec![
//!         decl(
//!             "sb",
//!             DataType::string_builder(),
//!             call(new_instance(known_class::string_builder(), vec![]), "append", vec![lit_str("testString")]),
//!         ),
//!         ret(var("sb")),
//!     ]),
//! );
//! assert_eq!(class.methods().count(), 1);
//! ```

pub mod build;
mod class;
mod expr;
mod stmt;

pub use class::{ClassDefinition, ConstructorMember, FieldMember, Member, MethodMember, Parameter};
pub use expr::{BinaryOp, Expr, Literal, UnaryOp};
pub use stmt::{Block, IfStmt, Stmt, VarDecl, WhileStmt};
