//! The symbol/type table
//!
//! Maps every declared and synthesized type to a stable [`TypeId`]. Every pass
//! that creates a new type registers it here so the emitter and later passes
//! observe one consistent naming universe. Registered ids are never reused or
//! mutated in place; a replacement type gets a fresh id plus a superseded-by
//! link.

use crate::error::{TypeError, TypeResult};
use crate::ty::{
    BindingId, ExtractionState, PrimitiveKind, TypeDescriptor, TypeId, TypeKind, TypeRef,
};
use rustc_hash::FxHashMap;

/// Bindings the front end reserves at fixed indices for the core types every
/// program can reference.
pub mod well_known {
    use crate::ty::BindingId;

    pub const OBJECT: BindingId = BindingId(0);
    pub const STRING: BindingId = BindingId(1);
    pub const THROWABLE: BindingId = BindingId(2);
    pub const ITERABLE: BindingId = BindingId(3);
    pub const ITERATOR: BindingId = BindingId(4);
    pub const AUTO_CLOSEABLE: BindingId = BindingId(5);

    /// Wrapper classes occupy 6..14 in `PrimitiveKind::ALL` order.
    pub const FIRST_WRAPPER: u32 = 6;
    /// First binding index available to user declarations.
    pub const FIRST_USER: u32 = 14;
}

/// Symbol/type table for one translation run
#[derive(Debug, Default)]
pub struct TypeTable {
    /// Storage for all descriptors, indexed by TypeId
    types: Vec<TypeDescriptor>,

    /// Source binding identity to canonical id
    by_binding: FxHashMap<BindingId, TypeId>,

    /// Emitted name to id, used to keep synthesized names fresh
    by_name: FxHashMap<String, TypeId>,

    /// Wrapper class lookups in both directions
    wrapper_by_primitive: FxHashMap<PrimitiveKind, TypeId>,
    primitive_by_wrapper: FxHashMap<BindingId, PrimitiveKind>,
}

impl TypeTable {
    /// Create a table with the core classes and the wrapper universe
    /// pre-registered at their well-known bindings.
    pub fn new() -> Self {
        let mut table = TypeTable {
            types: Vec::new(),
            by_binding: FxHashMap::default(),
            by_name: FxHashMap::default(),
            wrapper_by_primitive: FxHashMap::default(),
            primitive_by_wrapper: FxHashMap::default(),
        };

        let object = table.register(
            well_known::OBJECT,
            TypeDescriptor::new("Object", TypeKind::Class),
        );
        for (binding, name, kind) in [
            (well_known::STRING, "String", TypeKind::Class),
            (well_known::THROWABLE, "Throwable", TypeKind::Class),
            (well_known::ITERABLE, "Iterable", TypeKind::Interface),
            (well_known::ITERATOR, "Iterator", TypeKind::Interface),
            (
                well_known::AUTO_CLOSEABLE,
                "AutoCloseable",
                TypeKind::Interface,
            ),
        ] {
            let mut desc = TypeDescriptor::new(name, kind);
            if kind == TypeKind::Class {
                desc.superclass = Some(object);
            }
            table.register(binding, desc);
        }

        for (i, prim) in PrimitiveKind::ALL.iter().enumerate() {
            let binding = BindingId(well_known::FIRST_WRAPPER + i as u32);
            let desc = TypeDescriptor::new(prim.wrapper_name(), TypeKind::Wrapper(*prim))
                .with_superclass(object);
            let id = table.register(binding, desc);
            table.wrapper_by_primitive.insert(*prim, id);
            table.primitive_by_wrapper.insert(binding, *prim);
        }

        table
    }

    /// Register a source binding, returning its canonical id
    ///
    /// Idempotent per binding: re-registering returns the existing id and
    /// leaves the recorded descriptor untouched.
    pub fn register(&mut self, binding: BindingId, descriptor: TypeDescriptor) -> TypeId {
        if let Some(&id) = self.by_binding.get(&binding) {
            return id;
        }
        let id = self.push(descriptor);
        self.by_binding.insert(binding, id);
        id
    }

    /// Mint a fresh type with no source binding
    ///
    /// Always allocates a new id. The name is derived from `name_hint`,
    /// numbered deterministically if the hint is already taken.
    pub fn synthesize(&mut self, name_hint: &str, kind: TypeKind) -> TypeId {
        let name = self.fresh_name(name_hint);
        self.push(TypeDescriptor::new(name, kind).with_extraction(ExtractionState::Extracted))
    }

    /// Resolve an id to its descriptor
    ///
    /// # Panics
    ///
    /// Panics on an id this table never issued; that is a broken pipeline
    /// invariant, not bad input.
    pub fn resolve(&self, id: TypeId) -> &TypeDescriptor {
        self.types
            .get(id.index())
            .expect("TypeId not issued by this table")
    }

    pub fn resolve_mut(&mut self, id: TypeId) -> &mut TypeDescriptor {
        self.types
            .get_mut(id.index())
            .expect("TypeId not issued by this table")
    }

    /// Resolve a front-end binding to its registered id
    pub fn resolve_binding(&self, binding: BindingId) -> TypeResult<TypeId> {
        self.by_binding
            .get(&binding)
            .copied()
            .ok_or(TypeError::UnresolvedBinding { binding })
    }

    /// Look up a type by its emitted name
    pub fn lookup_name(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Link a replacement type to the identity it supersedes
    pub fn supersede(&mut self, old: TypeId, new: TypeId) {
        self.resolve_mut(old).superseded_by = Some(new);
    }

    /// Follow superseded-by links to the current identity
    pub fn current(&self, id: TypeId) -> TypeId {
        let mut id = id;
        while let Some(next) = self.resolve(id).superseded_by {
            id = next;
        }
        id
    }

    /// The wrapper class id boxing the given primitive
    pub fn wrapper_of(&self, prim: PrimitiveKind) -> TypeId {
        self.wrapper_by_primitive[&prim]
    }

    /// The wrapper class binding boxing the given primitive
    pub fn wrapper_binding(&self, prim: PrimitiveKind) -> BindingId {
        let idx = PrimitiveKind::ALL.iter().position(|p| *p == prim).unwrap();
        BindingId(well_known::FIRST_WRAPPER + idx as u32)
    }

    /// The primitive a wrapper class binding boxes, if any
    pub fn primitive_of(&self, binding: BindingId) -> Option<PrimitiveKind> {
        self.primitive_by_wrapper.get(&binding).copied()
    }

    /// The primitive boxed by the class of `ty`, if it is a wrapper type
    pub fn unboxed(&self, ty: &TypeRef) -> Option<PrimitiveKind> {
        ty.as_class().and_then(|b| self.primitive_of(b))
    }

    /// Whether `sub` is `sup` or inherits from it
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        let mut cur = Some(sub);
        while let Some(id) = cur {
            if id == sup {
                return true;
            }
            let desc = self.resolve(id);
            if desc.capabilities.contains(&sup) {
                return true;
            }
            cur = desc.superclass;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn push(&mut self, descriptor: TypeDescriptor) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.by_name.insert(descriptor.name.clone(), id);
        self.types.push(descriptor);
        id
    }

    fn fresh_name(&self, hint: &str) -> String {
        if !self.by_name.contains_key(hint) {
            return hint.to_string();
        }
        let mut counter = 2;
        loop {
            let candidate = format!("{}_{}", hint, counter);
            if !self.by_name.contains_key(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }
}
