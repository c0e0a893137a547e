//! Type and member declarations

use crate::expr::Expr;
use crate::graph::TypeDeclId;
use crate::span::Span;
use crate::stmt::Block;
use crosslate_types::{BindingId, TypeId, TypeRef};

/// What kind of declaration a [`TypeDecl`] is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Class,
    Interface,
    Enum,
}

/// Where a declaration sits in the source nesting structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nesting {
    TopLevel,
    /// Member class of `owner`
    Member { owner: TypeDeclId },
    /// Class declared inside a method body of `owner`
    Local { owner: TypeDeclId },
    /// Anonymous class whose creation site lives in `owner`
    Anonymous { owner: TypeDeclId },
}

impl Nesting {
    pub fn owner(&self) -> Option<TypeDeclId> {
        match self {
            Nesting::TopLevel => None,
            Nesting::Member { owner } | Nesting::Local { owner } | Nesting::Anonymous { owner } => {
                Some(*owner)
            }
        }
    }
}

/// A type declaration in the program graph
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub binding: BindingId,
    pub kind: DeclKind,
    pub superclass: Option<BindingId>,
    pub capabilities: Vec<BindingId>,
    pub nesting: Nesting,
    pub members: Vec<Member>,
    /// Constant names in declaration order, for enum declarations
    pub enum_constants: Vec<String>,
    pub is_abstract: bool,
    /// Canonical id, filled in by table registration
    pub ty: Option<TypeId>,
    /// Tombstone set by the dead code eliminator; the arena slot stays so
    /// sibling indices remain valid
    pub stripped: bool,
    pub span: Span,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>, binding: BindingId, kind: DeclKind) -> Self {
        TypeDecl {
            name: name.into(),
            binding,
            kind,
            superclass: None,
            capabilities: Vec::new(),
            nesting: Nesting::TopLevel,
            members: Vec::new(),
            enum_constants: Vec::new(),
            is_abstract: false,
            ty: None,
            stripped: false,
            span: Span::synthetic(),
        }
    }

    /// The registered id for this declaration
    ///
    /// # Panics
    ///
    /// Panics when called before table registration; that ordering is a
    /// pipeline invariant.
    pub fn type_id(&self) -> TypeId {
        self.ty.expect("declaration not registered in the type table")
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.members.iter().filter_map(|m| match m {
            Member::Field(f) => Some(f),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.members.iter().filter_map(|m| match m {
            Member::Method(m) => Some(m),
            _ => None,
        })
    }

    pub fn constructors(&self) -> impl Iterator<Item = &Constructor> {
        self.members.iter().filter_map(|m| match m {
            Member::Constructor(c) => Some(c),
            _ => None,
        })
    }

    pub fn constructors_mut(&mut self) -> impl Iterator<Item = &mut Constructor> {
        self.members.iter_mut().filter_map(|m| match m {
            Member::Constructor(c) => Some(c),
            _ => None,
        })
    }

    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields().find(|f| f.name == name)
    }

    pub fn find_method(&self, name: &str) -> Option<&Method> {
        self.methods().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Field(Field),
    Method(Method),
    Constructor(Constructor),
    InitBlock(InitBlock),
}

impl Member {
    pub fn span(&self) -> Span {
        match self {
            Member::Field(f) => f.span,
            Member::Method(m) => m.span,
            Member::Constructor(c) => c.span,
            Member::InitBlock(b) => b.span,
        }
    }
}

/// Whether a field owns its referent (must release it on teardown) or only
/// observes it. Weak marks come from upstream annotations and are never
/// auto-promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ownership {
    #[default]
    Strong,
    Weak,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    pub ownership: Ownership,
    pub is_static: bool,
    pub is_final: bool,
    pub initializer: Option<Expr>,
    /// Created by a pass rather than declared in the source
    pub synthetic: bool,
    pub span: Span,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Field {
            name: name.into(),
            ty,
            ownership: Ownership::Strong,
            is_static: false,
            is_final: false,
            initializer: None,
            synthetic: false,
            span: Span::synthetic(),
        }
    }

    pub fn weak(mut self) -> Self {
        self.ownership = Ownership::Weak;
        self
    }

    pub fn with_initializer(mut self, init: Expr) -> Self {
        self.initializer = Some(init);
        self
    }

    pub fn static_field(mut self) -> Self {
        self.is_static = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub params: Vec<Param>,
    pub return_ty: TypeRef,
    /// `None` for abstract methods
    pub body: Option<Block>,
    pub is_static: bool,
    pub is_abstract: bool,
    pub synthetic: bool,
    pub span: Span,
}

impl Method {
    pub fn new(name: impl Into<String>, params: Vec<Param>, return_ty: TypeRef, body: Block) -> Self {
        Method {
            name: name.into(),
            params,
            return_ty,
            body: Some(body),
            is_static: false,
            is_abstract: false,
            synthetic: false,
            span: Span::synthetic(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constructor {
    pub params: Vec<Param>,
    pub body: Block,
    pub synthetic: bool,
    pub span: Span,
}

impl Constructor {
    pub fn new(params: Vec<Param>, body: Block) -> Self {
        Constructor {
            params,
            body,
            synthetic: false,
            span: Span::synthetic(),
        }
    }
}

/// Instance or static initializer block
#[derive(Debug, Clone, PartialEq)]
pub struct InitBlock {
    pub is_static: bool,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    pub span: Span,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Param {
            name: name.into(),
            ty,
            span: Span::synthetic(),
        }
    }
}
