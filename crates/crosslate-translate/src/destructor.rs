//! Teardown synthesis and cycle detection
//!
//! Under reference counting every object must release exactly what it owns
//! when it is torn down. For each class this pass computes the release set -
//! the instance fields that hold strong references - and synthesizes a
//! teardown method that releases each of them and then invokes the
//! superclass teardown, so ownership is released leaf-to-root. Weak fields,
//! static fields and primitive fields are never released.
//!
//! After all units are processed a whole-program scan walks the strong-field
//! graph and reports every cycle of strong references as a leak warning;
//! breaking a cycle requires an upstream weak annotation, which this pipeline
//! never invents.

use crate::context::CompilerContext;
use crate::diagnostic::Diagnostic;
use crosslate_ast::{
    Block, CompilationUnit, DeclKind, Expr, ExprKind, Member, Method, Program, Span, Stmt,
    SuperInvoke, TypeDecl,
};
use crosslate_types::{well_known, TypeId, TypeRef};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;

/// Diagnostic code for a detected strong reference cycle
pub const CYCLE_WARNING: &str = "W4001";

const DEALLOC: &str = "dealloc";

pub struct DestructorGenerator<'a> {
    ctx: &'a CompilerContext,
}

impl<'a> DestructorGenerator<'a> {
    pub fn new(ctx: &'a CompilerContext) -> Self {
        DestructorGenerator { ctx }
    }

    pub fn run(&self, unit: &mut CompilationUnit) {
        for id in unit.live_ids() {
            let decl = unit.decl_mut(id);
            if decl.kind == DeclKind::Interface {
                continue;
            }
            self.generate(decl);
        }
    }

    fn generate(&self, decl: &mut TypeDecl) {
        let release_set: Vec<(String, TypeRef)> = decl
            .fields()
            .filter(|f| {
                !f.is_static
                    && f.ownership == crosslate_ast::Ownership::Strong
                    && f.ty.is_reference()
            })
            .map(|f| (f.name.clone(), f.ty.clone()))
            .collect();
        self.ctx.record_release_set(
            decl.type_id(),
            release_set.iter().map(|(name, _)| name.clone()).collect(),
        );

        // A hand-written teardown keeps authority over its own releases.
        if decl.methods().any(|m| m.name == DEALLOC && !m.is_static) {
            return;
        }

        let binding = decl.binding;
        let mut stmts: Vec<Stmt> = release_set
            .into_iter()
            .map(|(name, ty)| {
                Stmt::Expr(Expr::invoke0(
                    Expr::own_field(name, binding, ty),
                    "release",
                    well_known::OBJECT,
                    TypeRef::Void,
                ))
            })
            .collect();
        // Superclass teardown runs last; the object must still be fully
        // formed while its own fields are released.
        stmts.push(Stmt::Expr(Expr::new(
            ExprKind::SuperInvoke(SuperInvoke {
                method: DEALLOC.to_string(),
                args: Vec::new(),
            }),
            TypeRef::Void,
            Span::synthetic(),
        )));

        let mut dealloc = Method::new(DEALLOC, Vec::new(), TypeRef::Void, Block::new(stmts));
        dealloc.synthetic = true;
        decl.members.push(Member::Method(dealloc));
    }
}

/// Walk the strong-field graph across the whole program and report every
/// strong reference cycle once, as a leak warning.
pub fn scan_reference_cycles(program: &Program, ctx: &CompilerContext) {
    let types = ctx.types();

    // Sorted adjacency so traversal order, and therefore warning order, is
    // stable across runs.
    let mut edges: BTreeMap<TypeId, Vec<TypeId>> = BTreeMap::new();
    for unit in &program.units {
        for id in unit.live_ids() {
            let decl = unit.decl(id);
            if decl.kind == DeclKind::Interface {
                continue;
            }
            let Some(ty) = decl.ty else { continue };
            let from = types.current(ty);
            let targets = edges.entry(from).or_default();
            for field in decl.fields() {
                if field.is_static || field.ownership != crosslate_ast::Ownership::Strong {
                    continue;
                }
                if let Some(binding) = field.ty.as_class() {
                    if let Ok(to) = types.resolve_binding(binding) {
                        targets.push(types.current(to));
                    }
                }
            }
            targets.sort();
            targets.dedup();
        }
    }

    let mut finder = CycleFinder {
        edges: &edges,
        done: FxHashSet::default(),
        on_path: FxHashSet::default(),
        path: Vec::new(),
        reported: FxHashSet::default(),
        found: Vec::new(),
    };
    for &node in edges.keys() {
        finder.visit(node);
    }

    for cycle in finder.found {
        let names: Vec<String> = cycle
            .iter()
            .map(|id| types.resolve(*id).name.clone())
            .collect();
        ctx.sink().push(
            Diagnostic::warning(format!(
                "strong reference cycle among {}; these objects can never be torn down",
                names.join(", ")
            ))
            .with_code(CYCLE_WARNING)
            .with_note("mark one reference in the cycle as weak to break it"),
        );
    }
}

struct CycleFinder<'g> {
    edges: &'g BTreeMap<TypeId, Vec<TypeId>>,
    done: FxHashSet<TypeId>,
    on_path: FxHashSet<TypeId>,
    path: Vec<TypeId>,
    /// Canonical keys of cycles already reported, so A-B and B-A are one
    reported: FxHashSet<Vec<TypeId>>,
    found: Vec<Vec<TypeId>>,
}

impl CycleFinder<'_> {
    fn visit(&mut self, node: TypeId) {
        if self.done.contains(&node) {
            return;
        }
        self.on_path.insert(node);
        self.path.push(node);
        if let Some(targets) = self.edges.get(&node) {
            for &next in targets {
                if self.on_path.contains(&next) {
                    let start = self
                        .path
                        .iter()
                        .position(|id| *id == next)
                        .expect("node on path");
                    let cycle: Vec<TypeId> = self.path[start..].to_vec();
                    let mut key = cycle.clone();
                    key.sort();
                    if self.reported.insert(key) {
                        self.found.push(cycle);
                    }
                } else {
                    self.visit(next);
                }
            }
        }
        self.path.pop();
        self.on_path.remove(&node);
        self.done.insert(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use crosslate_ast::Field;
    use crosslate_types::{BindingId, PrimitiveKind, TypeDescriptor, TypeKind};

    fn register(ctx: &CompilerContext, unit: &mut CompilationUnit) {
        let ids: Vec<_> = unit.decl_ids().collect();
        for id in ids {
            let (binding, name) = {
                let d = unit.decl(id);
                (d.binding, d.name.clone())
            };
            let ty = {
                let mut types = ctx.types_mut();
                let object = types.resolve_binding(well_known::OBJECT).unwrap();
                types.register(
                    binding,
                    TypeDescriptor::new(name, TypeKind::Class).with_superclass(object),
                )
            };
            unit.decl_mut(id).ty = Some(ty);
        }
    }

    fn class_with_fields(name: &str, binding: u32, fields: Vec<Field>) -> TypeDecl {
        let mut decl = TypeDecl::new(name, BindingId(binding), DeclKind::Class);
        decl.members = fields.into_iter().map(Member::Field).collect();
        decl
    }

    #[test]
    fn test_release_set_is_exactly_the_owned_references() {
        let other = TypeRef::Class(BindingId(21));
        let fields = vec![
            Field::new("owned", other.clone()),
            Field::new("observed", other.clone()).weak(),
            Field::new("count", TypeRef::Primitive(PrimitiveKind::Int)),
            Field::new("shared", other.clone()).static_field(),
            Field::new("buffer", TypeRef::Array(Box::new(other))),
        ];
        let mut unit = CompilationUnit::new("Node.src");
        let id = unit.alloc(class_with_fields("Node", 20, fields));

        let ctx = CompilerContext::new();
        register(&ctx, &mut unit);
        DestructorGenerator::new(&ctx).run(&mut unit);

        let released = ctx.release_set_of(unit.decl(id).type_id()).unwrap();
        assert_eq!(released, vec!["owned".to_string(), "buffer".to_string()]);

        let decl = unit.decl(id);
        let dealloc = decl.find_method(DEALLOC).unwrap();
        assert!(dealloc.synthetic);
        let body = dealloc.body.as_ref().unwrap();
        assert_eq!(body.stmts.len(), 3);

        let released_field = |stmt: &Stmt| {
            let Stmt::Expr(e) = stmt else {
                panic!("expected release call");
            };
            let ExprKind::Invoke(invoke) = &e.kind else {
                panic!("expected release call");
            };
            assert_eq!(invoke.method, "release");
            let ExprKind::FieldAccess(access) = &invoke.receiver.as_ref().unwrap().kind else {
                panic!("expected own-field receiver");
            };
            access.field.clone()
        };
        assert_eq!(released_field(&body.stmts[0]), "owned");
        assert_eq!(released_field(&body.stmts[1]), "buffer");

        // Superclass teardown runs last.
        assert!(matches!(
            &body.stmts[2],
            Stmt::Expr(e) if matches!(
                &e.kind,
                ExprKind::SuperInvoke(s) if s.method == DEALLOC
            )
        ));
    }

    #[test]
    fn test_hand_written_teardown_is_left_alone() {
        let mut decl = class_with_fields(
            "Node",
            20,
            vec![Field::new("owned", TypeRef::Class(BindingId(21)))],
        );
        decl.members.push(Member::Method(Method::new(
            DEALLOC,
            Vec::new(),
            TypeRef::Void,
            Block::default(),
        )));
        let mut unit = CompilationUnit::new("Node.src");
        let id = unit.alloc(decl);

        let ctx = CompilerContext::new();
        register(&ctx, &mut unit);
        DestructorGenerator::new(&ctx).run(&mut unit);

        let decl = unit.decl(id);
        let deallocs: Vec<&Method> = decl.methods().filter(|m| m.name == DEALLOC).collect();
        assert_eq!(deallocs.len(), 1);
        assert!(deallocs[0].body.as_ref().unwrap().stmts.is_empty());
        // The release set is still recorded for downstream consumers.
        assert_eq!(
            ctx.release_set_of(decl.type_id()).unwrap(),
            vec!["owned".to_string()]
        );
    }

    #[test]
    fn test_mutual_strong_fields_warn_once() {
        let mut unit = CompilationUnit::new("Pair.src");
        unit.alloc(class_with_fields(
            "Left",
            20,
            vec![Field::new("right", TypeRef::Class(BindingId(21)))],
        ));
        unit.alloc(class_with_fields(
            "Right",
            21,
            vec![Field::new("left", TypeRef::Class(BindingId(20)))],
        ));

        let ctx = CompilerContext::new();
        register(&ctx, &mut unit);
        DestructorGenerator::new(&ctx).run(&mut unit);

        let program = Program::new(vec![unit]);
        scan_reference_cycles(&program, &ctx);

        let warnings = ctx.sink().warnings();
        assert_eq!(warnings.len(), 1);
        let warning = &warnings[0];
        assert_eq!(warning.severity, Severity::Warning);
        assert_eq!(warning.code, Some(CYCLE_WARNING));
        assert!(warning.message.contains("Left"));
        assert!(warning.message.contains("Right"));
    }

    #[test]
    fn test_weak_back_reference_breaks_the_cycle() {
        let mut unit = CompilationUnit::new("Pair.src");
        unit.alloc(class_with_fields(
            "Parent",
            20,
            vec![Field::new("child", TypeRef::Class(BindingId(21)))],
        ));
        unit.alloc(class_with_fields(
            "Child",
            21,
            vec![Field::new("parent", TypeRef::Class(BindingId(20))).weak()],
        ));

        let ctx = CompilerContext::new();
        register(&ctx, &mut unit);
        DestructorGenerator::new(&ctx).run(&mut unit);

        let program = Program::new(vec![unit]);
        scan_reference_cycles(&program, &ctx);
        assert!(ctx.sink().warnings().is_empty());
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut unit = CompilationUnit::new("List.src");
        unit.alloc(class_with_fields(
            "Node",
            20,
            vec![Field::new("next", TypeRef::Class(BindingId(20)))],
        ));

        let ctx = CompilerContext::new();
        register(&ctx, &mut unit);
        let program = Program::new(vec![unit]);
        scan_reference_cycles(&program, &ctx);

        let warnings = ctx.sink().warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("Node"));
    }
}
