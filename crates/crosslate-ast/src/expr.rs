//! Expression nodes
//!
//! Every expression carries its resolved static type so the autoboxer works
//! from front-end resolution only, never runtime inference. Member accesses
//! and invocations carry the binding of the declaring type, which is how the
//! extractor recognizes implicit enclosing-instance references.

use crate::span::Span;
use crosslate_types::{well_known, BindingId, PrimitiveKind, TypeRef};

/// An expression with its resolved static type
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeRef,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),

    /// Read of a local variable or parameter
    LocalRef(LocalRef),

    /// `this`
    This,

    /// Field read: `object.field`, or an implicit-receiver / static access
    /// when `object` is `None`
    FieldAccess(FieldAccess),

    /// Reference to an enum constant, with its front-end-resolved ordinal
    EnumConstant(EnumConstant),

    /// `target = value`
    Assign(Assign),

    /// Method invocation
    Invoke(Invoke),

    /// Invocation on the superclass implementation
    SuperInvoke(SuperInvoke),

    /// `new Class(args)`
    New(New),

    /// Explicit primitive-to-wrapper conversion (inserted by the autoboxer)
    Box(Box<Expr>),

    /// Explicit wrapper-to-primitive conversion (inserted by the autoboxer)
    Unbox(Box<Expr>),

    Binary(Binary),
    Unary(Unary),

    /// `value instanceof Class`
    InstanceOf(InstanceOf),

    /// Checked cast
    Cast(Box<Expr>),

    /// `array[index]`
    ArrayGet(ArrayGet),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Char(char),
    Int(i64),
    Long(i64),
    Float(f64),
    Double(f64),
    Str(String),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalRef {
    pub name: String,
    /// Front-end fact: the local is never reassigned after initialization.
    /// Capture-by-field-copy is only sound for such locals.
    pub effectively_final: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldAccess {
    /// `None` means implicit `this` (or a static access)
    pub object: Option<Box<Expr>>,
    pub field: String,
    /// Binding of the type declaring the field
    pub owner: BindingId,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumConstant {
    pub enum_ty: BindingId,
    pub name: String,
    pub ordinal: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub target: Box<Expr>,
    pub value: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invoke {
    /// `None` means implicit `this` (or a static call)
    pub receiver: Option<Box<Expr>>,
    pub method: String,
    /// Binding of the type declaring the method
    pub owner: BindingId,
    pub args: Vec<Expr>,
    /// Declared parameter types, resolved by the front end
    pub param_tys: Vec<TypeRef>,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuperInvoke {
    pub method: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct New {
    pub class: BindingId,
    pub args: Vec<Expr>,
    /// Declared constructor parameter types
    pub param_tys: Vec<TypeRef>,
    /// Set when the instantiated class is declared in the same unit, so the
    /// extractor can rewrite this creation site
    pub decl: Option<crate::graph::TypeDeclId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Operators whose operands must be primitive after autoboxing
    pub fn is_arithmetic_or_relational(&self) -> bool {
        !matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    pub op: BinaryOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unary {
    pub op: UnaryOp,
    pub operand: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceOf {
    pub value: Box<Expr>,
    pub tested: BindingId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayGet {
    pub array: Box<Expr>,
    pub index: Box<Expr>,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: TypeRef, span: Span) -> Self {
        Expr { kind, ty, span }
    }

    // Constructors used both by the synthesizing passes and by tests.

    pub fn int(value: i64) -> Self {
        Expr::new(
            ExprKind::Literal(Literal::Int(value)),
            TypeRef::Primitive(PrimitiveKind::Int),
            Span::synthetic(),
        )
    }

    pub fn bool(value: bool) -> Self {
        Expr::new(
            ExprKind::Literal(Literal::Bool(value)),
            TypeRef::Primitive(PrimitiveKind::Boolean),
            Span::synthetic(),
        )
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::new(
            ExprKind::Literal(Literal::Str(value.into())),
            TypeRef::Class(well_known::STRING),
            Span::synthetic(),
        )
    }

    pub fn null() -> Self {
        Expr::new(ExprKind::Literal(Literal::Null), TypeRef::Null, Span::synthetic())
    }

    pub fn this(class: BindingId) -> Self {
        Expr::new(ExprKind::This, TypeRef::Class(class), Span::synthetic())
    }

    pub fn local(name: impl Into<String>, ty: TypeRef) -> Self {
        Expr::new(
            ExprKind::LocalRef(LocalRef {
                name: name.into(),
                effectively_final: true,
            }),
            ty,
            Span::synthetic(),
        )
    }

    pub fn mutable_local(name: impl Into<String>, ty: TypeRef) -> Self {
        Expr::new(
            ExprKind::LocalRef(LocalRef {
                name: name.into(),
                effectively_final: false,
            }),
            ty,
            Span::synthetic(),
        )
    }

    /// Implicit-receiver field read
    pub fn own_field(field: impl Into<String>, owner: BindingId, ty: TypeRef) -> Self {
        Expr::new(
            ExprKind::FieldAccess(FieldAccess {
                object: None,
                field: field.into(),
                owner,
                is_static: false,
            }),
            ty,
            Span::synthetic(),
        )
    }

    /// Field read through an explicit receiver
    pub fn field_of(object: Expr, field: impl Into<String>, owner: BindingId, ty: TypeRef) -> Self {
        Expr::new(
            ExprKind::FieldAccess(FieldAccess {
                object: Some(Box::new(object)),
                field: field.into(),
                owner,
                is_static: false,
            }),
            ty,
            Span::synthetic(),
        )
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        let ty = target.ty.clone();
        let span = target.span.merge(value.span);
        Expr::new(
            ExprKind::Assign(Assign {
                target: Box::new(target),
                value: Box::new(value),
            }),
            ty,
            span,
        )
    }

    /// Zero-argument invocation through an explicit receiver
    pub fn invoke0(receiver: Expr, method: impl Into<String>, owner: BindingId, ty: TypeRef) -> Self {
        Expr::new(
            ExprKind::Invoke(Invoke {
                receiver: Some(Box::new(receiver)),
                method: method.into(),
                owner,
                args: Vec::new(),
                param_tys: Vec::new(),
                is_static: false,
            }),
            ty,
            Span::synthetic(),
        )
    }

    pub fn not(operand: Expr) -> Self {
        Expr::new(
            ExprKind::Unary(Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            }),
            TypeRef::Primitive(PrimitiveKind::Boolean),
            Span::synthetic(),
        )
    }

    pub fn instance_of(value: Expr, tested: BindingId) -> Self {
        let span = value.span;
        Expr::new(
            ExprKind::InstanceOf(InstanceOf {
                value: Box::new(value),
                tested,
            }),
            TypeRef::Primitive(PrimitiveKind::Boolean),
            span,
        )
    }
}
