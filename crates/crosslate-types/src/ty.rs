//! Core type identities for the translation pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a type registered in the type table
///
/// Ids are never reused or mutated in place; a replacement type gets a fresh
/// id plus a superseded-by link on the old descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Identity of a front-end binding (a declared type as the source resolver
/// saw it)
///
/// The front end hands the pipeline a fully resolved graph; bindings below
/// [`crate::well_known::FIRST_USER`] are reserved for the core types every
/// program can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingId(pub u32);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BindingId({})", self.0)
    }
}

/// Primitive value types of the source language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Char,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    /// Name of the wrapper class that boxes this primitive
    pub fn wrapper_name(&self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Char => "Character",
            PrimitiveKind::Short => "Short",
            PrimitiveKind::Int => "Integer",
            PrimitiveKind::Long => "Long",
            PrimitiveKind::Float => "Float",
            PrimitiveKind::Double => "Double",
        }
    }

    /// Source-level keyword for this primitive
    pub fn keyword(&self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// What sort of declaration a type descriptor stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    /// A wrapper class boxing the given primitive (pre-registered)
    Wrapper(PrimitiveKind),
}

/// Whether a type still needs to be hoisted to top level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionState {
    /// Declared at top level in the source
    #[default]
    TopLevel,
    /// Nested/local/anonymous declaration awaiting extraction
    Pending,
    /// Hoisted to top level by the extractor
    Extracted,
}

/// Descriptor for a registered type
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// Emitted name of the type
    pub name: String,
    pub kind: TypeKind,
    /// Superclass (single inheritance); `None` only for the root class
    pub superclass: Option<TypeId>,
    /// Implemented capabilities (interfaces)
    pub capabilities: Vec<TypeId>,
    pub extraction: ExtractionState,
    /// Set when a replacement type took over this identity
    pub superseded_by: Option<TypeId>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        TypeDescriptor {
            name: name.into(),
            kind,
            superclass: None,
            capabilities: Vec::new(),
            extraction: ExtractionState::TopLevel,
            superseded_by: None,
        }
    }

    pub fn with_superclass(mut self, superclass: TypeId) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn with_extraction(mut self, state: ExtractionState) -> Self {
        self.extraction = state;
        self
    }
}

/// Resolved static type of an expression or declaration position
///
/// Class types are identified by their front-end binding; the type table maps
/// bindings to canonical `TypeId`s once registration has run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    Primitive(PrimitiveKind),
    Class(BindingId),
    Array(Box<TypeRef>),
    /// The null literal's type
    Null,
    Void,
}

impl TypeRef {
    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeRef::Primitive(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, TypeRef::Class(_) | TypeRef::Array(_) | TypeRef::Null)
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            TypeRef::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<BindingId> {
        match self {
            TypeRef::Class(b) => Some(*b),
            _ => None,
        }
    }
}
