//! Deterministic selector assignment
//!
//! The target's dispatch mechanism identifies a callable member by one flat
//! selector, so overloads the source distinguishes by parameter types must be
//! spread onto distinct identifiers. A selector is built from the declared
//! name plus a `With<Shape>` encoding of each parameter; collisions with a
//! reserved target selector or a previously assigned identifier in the same
//! type get a numeric counter suffix. Counters, never hashes: output must be
//! byte-stable across runs.

use crate::error::{TranslateError, TranslateResult};
use crosslate_ast::{Member, Param};
use crosslate_types::{MemberSignature, ParamShape, TypeId, TypeRef, TypeTable};
use rustc_hash::{FxHashMap, FxHashSet};

/// Selectors the target language reserves on its root object; a source
/// member landing on one of these is renamed to avoid unintentional
/// overriding.
const RESERVED_SELECTORS: &[&str] = &[
    "alloc",
    "autorelease",
    "class",
    "copy",
    "dealloc",
    "description",
    "hash",
    "init",
    "isEqual",
    "mutableCopy",
    "new",
    "release",
    "retain",
    "retainCount",
    "self",
    "superclass",
    "zone",
];

/// Append-only map from `(TypeId, member signature)` to emitted selector
#[derive(Debug, Default)]
pub struct NameTable {
    assigned: FxHashMap<(TypeId, MemberSignature), String>,
    used: FxHashMap<TypeId, FxHashSet<String>>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign (or look up) the selector for a member signature within a type
    ///
    /// Once assigned, an identifier is never reassigned to a different
    /// signature within the same type. A collision that survives
    /// disambiguation is a broken invariant, reported as an internal error.
    pub fn assign(&mut self, ty: TypeId, signature: &MemberSignature) -> TranslateResult<String> {
        self.assign_inner(ty, signature, true)
    }

    /// Assign a selector for a member that lands on a reserved target
    /// selector on purpose: constructors mapping into the `init` family and
    /// synthesized teardown overriding `dealloc`.
    pub fn assign_reserved(
        &mut self,
        ty: TypeId,
        signature: &MemberSignature,
    ) -> TranslateResult<String> {
        self.assign_inner(ty, signature, false)
    }

    fn assign_inner(
        &mut self,
        ty: TypeId,
        signature: &MemberSignature,
        avoid_reserved: bool,
    ) -> TranslateResult<String> {
        if let Some(existing) = self.assigned.get(&(ty, signature.clone())) {
            return Ok(existing.clone());
        }

        let base = render_selector(signature);
        let used = self.used.entry(ty).or_default();

        let mut candidate = base.clone();
        let mut counter = 1u32;
        while (avoid_reserved && RESERVED_SELECTORS.binary_search(&candidate.as_str()).is_ok())
            || used.contains(&candidate)
        {
            counter += 1;
            candidate = format!("{}_{}", base, counter);
        }

        if !used.insert(candidate.clone()) {
            return Err(TranslateError::internal(format!(
                "selector `{candidate}` collided after disambiguation in {ty}"
            )));
        }
        self.assigned.insert((ty, signature.clone()), candidate.clone());
        Ok(candidate)
    }

    /// Look up a previously assigned selector
    pub fn selector(&self, ty: TypeId, signature: &MemberSignature) -> Option<&str> {
        self.assigned
            .get(&(ty, signature.clone()))
            .map(String::as_str)
    }

    /// Whether an identifier is already taken within a type
    pub fn is_taken(&self, ty: TypeId, identifier: &str) -> bool {
        self.used
            .get(&ty)
            .map(|set| set.contains(identifier))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

fn render_selector(signature: &MemberSignature) -> String {
    let mut out = signature.name.clone();
    for (i, shape) in signature.params.iter().enumerate() {
        if i == 0 {
            out.push_str("With");
        } else {
            out.push_str("_with");
        }
        out.push_str(&shape.mnemonic());
    }
    out
}

/// Shape of a declared type for selector encoding; class shapes render the
/// emitted name from the type table
pub fn shape_of(ty: &TypeRef, types: &TypeTable) -> TranslateResult<ParamShape> {
    match ty {
        TypeRef::Primitive(p) => Ok(ParamShape::Primitive(*p)),
        TypeRef::Class(binding) => {
            let id = types
                .resolve_binding(*binding)
                .map_err(|e| TranslateError::from_type(e, crosslate_ast::Span::synthetic()))?;
            Ok(ParamShape::Reference(types.resolve(id).name.clone()))
        }
        TypeRef::Array(inner) => Ok(ParamShape::Array(Box::new(shape_of(inner, types)?))),
        TypeRef::Null | TypeRef::Void => Ok(ParamShape::Reference("Object".to_string())),
    }
}

fn shapes_of(params: &[Param], types: &TypeTable) -> TranslateResult<Vec<ParamShape>> {
    params.iter().map(|p| shape_of(&p.ty, types)).collect()
}

/// Naming identity of a member, where the member kind has one (initializer
/// blocks do not)
pub fn member_signature(
    member: &Member,
    types: &TypeTable,
) -> TranslateResult<Option<MemberSignature>> {
    Ok(match member {
        Member::Field(f) => Some(MemberSignature::field(&f.name).with_static(f.is_static)),
        Member::Method(m) => Some(
            MemberSignature::new(&m.name, shapes_of(&m.params, types)?).with_static(m.is_static),
        ),
        Member::Constructor(c) => {
            Some(MemberSignature::new("init", shapes_of(&c.params, types)?))
        }
        Member::InitBlock(_) => None,
    })
}
