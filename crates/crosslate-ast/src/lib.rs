//! Program graph for the crosslate translation pipeline
//!
//! This crate defines the fully resolved tree the front end hands to the
//! pipeline: compilation units owning arenas of type declarations, plus the
//! statement and expression nodes the passes rewrite. Node categories are
//! closed enums matched exhaustively in every pass, so an unhandled new kind
//! is a build error rather than a silent fall-through.

pub mod decl;
pub mod expr;
pub mod graph;
pub mod span;
pub mod stmt;

pub use decl::{
    Constructor, DeclKind, Field, InitBlock, Member, Method, Nesting, Ownership, Param, TypeDecl,
};
pub use expr::{
    ArrayGet, Assign, Binary, BinaryOp, EnumConstant, Expr, ExprKind, FieldAccess, InstanceOf,
    Invoke, Literal, LocalRef, New, SuperInvoke, Unary, UnaryOp,
};
pub use graph::{CompilationUnit, Program, TypeDeclId};
pub use span::Span;
pub use stmt::{
    Block, BreakStmt, CatchClause, ConstructorCall, ContinueStmt, CtorTarget, DoWhileStmt,
    ForEachStmt, ForStmt, IfStmt, LabeledStmt, LocalClassStmt, LocalVar, Resource, ReturnStmt,
    Stmt, SwitchCase, SwitchStmt, SynchronizedStmt, ThrowStmt, TryResourcesStmt, TryStmt,
    WhileStmt,
};
