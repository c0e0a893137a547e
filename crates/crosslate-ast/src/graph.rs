//! The program graph
//!
//! A program is a forest of compilation units. Each unit owns an arena of
//! type declarations referenced by stable [`TypeDeclId`] indices, never by
//! pointers, so passes can rewrite one declaration without invalidating
//! references held by its siblings. Slots are never removed; the dead code
//! eliminator tombstones them and hoisting moves ids between lists.

use crate::decl::{Nesting, TypeDecl};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a type declaration in its unit's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDeclId(pub u32);

impl TypeDeclId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeDeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDeclId({})", self.0)
    }
}

/// A fully resolved program handed to the pipeline by the front end
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub units: Vec<CompilationUnit>,
}

impl Program {
    pub fn new(units: Vec<CompilationUnit>) -> Self {
        Program { units }
    }
}

/// One source file's declarations
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// Source file name, used in diagnostics
    pub file: String,

    /// Arena of every type declared in this unit, nested or not
    decls: Vec<TypeDecl>,

    /// Ids of the declarations currently at top level
    pub top_level: Vec<TypeDeclId>,
}

impl CompilationUnit {
    pub fn new(file: impl Into<String>) -> Self {
        CompilationUnit {
            file: file.into(),
            decls: Vec::new(),
            top_level: Vec::new(),
        }
    }

    /// Allocate a declaration slot; top-level declarations are also added to
    /// the top-level list
    pub fn alloc(&mut self, decl: TypeDecl) -> TypeDeclId {
        let id = TypeDeclId(self.decls.len() as u32);
        let top = matches!(decl.nesting, Nesting::TopLevel);
        self.decls.push(decl);
        if top {
            self.top_level.push(id);
        }
        id
    }

    pub fn decl(&self, id: TypeDeclId) -> &TypeDecl {
        self.decls
            .get(id.index())
            .expect("TypeDeclId out of range for this unit")
    }

    pub fn decl_mut(&mut self, id: TypeDeclId) -> &mut TypeDecl {
        self.decls
            .get_mut(id.index())
            .expect("TypeDeclId out of range for this unit")
    }

    /// All declaration ids, including tombstoned slots
    pub fn decl_ids(&self) -> impl Iterator<Item = TypeDeclId> {
        (0..self.decls.len() as u32).map(TypeDeclId)
    }

    /// Declaration ids that have not been stripped
    pub fn live_ids(&self) -> Vec<TypeDeclId> {
        self.decl_ids()
            .filter(|id| !self.decl(*id).stripped)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::DeclKind;
    use crosslate_types::BindingId;

    #[test]
    fn test_alloc_assigns_sequential_ids() {
        let mut unit = CompilationUnit::new("Foo.src");
        let a = unit.alloc(TypeDecl::new("A", BindingId(20), DeclKind::Class));
        let b = unit.alloc(TypeDecl::new("B", BindingId(21), DeclKind::Class));
        assert_eq!(a, TypeDeclId(0));
        assert_eq!(b, TypeDeclId(1));
        assert_eq!(unit.top_level, vec![a, b]);
        assert_eq!(unit.decl(a).name, "A");
    }

    #[test]
    fn test_nested_decl_not_top_level() {
        let mut unit = CompilationUnit::new("Foo.src");
        let outer = unit.alloc(TypeDecl::new("Outer", BindingId(20), DeclKind::Class));
        let mut inner = TypeDecl::new("Inner", BindingId(21), DeclKind::Class);
        inner.nesting = Nesting::Member { owner: outer };
        let inner_id = unit.alloc(inner);
        assert_eq!(unit.top_level, vec![outer]);
        assert_eq!(unit.decl(inner_id).nesting.owner(), Some(outer));
    }

    #[test]
    fn test_live_ids_skip_tombstones() {
        let mut unit = CompilationUnit::new("Foo.src");
        let a = unit.alloc(TypeDecl::new("A", BindingId(20), DeclKind::Class));
        let b = unit.alloc(TypeDecl::new("B", BindingId(21), DeclKind::Class));
        unit.decl_mut(a).stripped = true;
        assert_eq!(unit.live_ids(), vec![b]);
        assert_eq!(unit.len(), 2);
    }
}
