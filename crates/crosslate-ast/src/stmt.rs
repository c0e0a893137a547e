//! Statement nodes
//!
//! The statement set covers both the sugar forms consumed by the control-flow
//! rewriter (for-each, try-with-resources, multi-type catch, string/enum
//! switch, labeled break/continue) and the primitive forms it produces
//! (while, try/finally, if, integer switch). Passes match exhaustively; a new
//! kind left unhandled anywhere fails the build.

use crate::expr::Expr;
use crate::graph::TypeDeclId;
use crate::span::Span;
use crosslate_types::{BindingId, TypeRef};

/// A sequence of statements
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Block {
            stmts,
            span: Span::synthetic(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    LocalVar(LocalVar),
    If(IfStmt),
    While(WhileStmt),
    DoWhile(DoWhileStmt),
    For(ForStmt),

    /// Sugar: iteration over an iterable capability
    ForEach(ForEachStmt),

    Switch(SwitchStmt),
    Try(TryStmt),

    /// Sugar: resource-scoped block
    TryWithResources(TryResourcesStmt),

    /// A loop carrying a label targeted by break/continue
    Labeled(LabeledStmt),

    Break(BreakStmt),
    Continue(ContinueStmt),
    Return(ReturnStmt),
    Throw(ThrowStmt),
    Block(Block),

    /// Local class declaration; removed by the extractor
    LocalClass(LocalClassStmt),

    /// `this(...)` or `super(...)` at the head of a constructor body
    ConstructorCall(ConstructorCall),

    /// No target-language mapping; the rewriter rejects it
    Synchronized(SynchronizedStmt),

    Empty(Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(e) => e.span,
            Stmt::LocalVar(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::While(s) => s.span,
            Stmt::DoWhile(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::ForEach(s) => s.span,
            Stmt::Switch(s) => s.span,
            Stmt::Try(s) => s.span,
            Stmt::TryWithResources(s) => s.span,
            Stmt::Labeled(s) => s.span,
            Stmt::Break(s) => s.span,
            Stmt::Continue(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Throw(s) => s.span,
            Stmt::Block(b) => b.span,
            Stmt::LocalClass(s) => s.span,
            Stmt::ConstructorCall(s) => s.span,
            Stmt::Synchronized(s) => s.span,
            Stmt::Empty(span) => *span,
        }
    }
}

/// Local variable declaration
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVar {
    pub name: String,
    pub ty: TypeRef,
    pub init: Option<Expr>,
    pub is_final: bool,
    pub span: Span,
}

impl LocalVar {
    pub fn new(name: impl Into<String>, ty: TypeRef, init: Option<Expr>) -> Self {
        LocalVar {
            name: name.into(),
            ty,
            init,
            is_final: false,
            span: Span::synthetic(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Block,
    pub else_branch: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileStmt {
    pub body: Block,
    pub condition: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Vec<Stmt>,
    pub condition: Option<Expr>,
    pub update: Vec<Expr>,
    pub body: Block,
    pub span: Span,
}

/// `for (T name : iterable) body`
#[derive(Debug, Clone, PartialEq)]
pub struct ForEachStmt {
    pub var_name: String,
    pub var_ty: TypeRef,
    pub iterable: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub discriminant: Expr,
    pub cases: Vec<SwitchCase>,
    pub span: Span,
}

/// One switch arm; fallthrough is implicit in consecutive arms
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for the default arm
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub body: Block,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Block>,
    pub span: Span,
}

/// Catch clause; more than one entry in `types` is the multi-type sugar the
/// rewriter flattens into an instance-of dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: String,
    pub types: Vec<BindingId>,
    pub body: Block,
    pub span: Span,
}

/// One resource acquisition in a resource-scoped block
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub ty: TypeRef,
    pub init: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryResourcesStmt {
    pub resources: Vec<Resource>,
    pub body: Block,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledStmt {
    pub label: String,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakStmt {
    pub label: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinueStmt {
    pub label: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrowStmt {
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalClassStmt {
    pub decl: TypeDeclId,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtorTarget {
    This,
    Super,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorCall {
    pub target: CtorTarget,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynchronizedStmt {
    pub monitor: Expr,
    pub body: Block,
    pub span: Span,
}
