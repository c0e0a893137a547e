//! Initializer normalization
//!
//! Field initializers and initializer blocks have no direct equivalent on the
//! target side, where every constructor body must be explicit. This pass
//! moves instance initialization, in declaration order, into every
//! constructor that does not delegate to a sibling (the delegation root runs
//! the initializers exactly once), and collects static initialization into a
//! synthesized one-shot class setup method.

use crosslate_ast::{
    Block, CompilationUnit, Constructor, CtorTarget, Expr, ExprKind, FieldAccess, Member, Method,
    Stmt, TypeDecl,
};
use crosslate_types::TypeRef;

/// Name of the synthesized static setup method
const CLASS_SETUP: &str = "initialize";

#[derive(Default)]
pub struct InitNormalizer;

impl InitNormalizer {
    pub fn new() -> Self {
        InitNormalizer
    }

    pub fn run(&self, unit: &mut CompilationUnit) {
        for id in unit.live_ids() {
            normalize_decl(unit.decl_mut(id));
        }
    }
}

fn normalize_decl(decl: &mut TypeDecl) {
    let binding = decl.binding;

    // Drain initializers in declaration order, fields and blocks interleaved.
    let mut instance_init: Vec<Stmt> = Vec::new();
    let mut static_init: Vec<Stmt> = Vec::new();
    for member in &mut decl.members {
        match member {
            Member::Field(field) => {
                if let Some(init) = field.initializer.take() {
                    let span = init.span;
                    let target = Expr::new(
                        ExprKind::FieldAccess(FieldAccess {
                            object: None,
                            field: field.name.clone(),
                            owner: binding,
                            is_static: field.is_static,
                        }),
                        field.ty.clone(),
                        span,
                    );
                    let assign = Stmt::Expr(Expr::assign(target, init));
                    if field.is_static {
                        static_init.push(assign);
                    } else {
                        instance_init.push(assign);
                    }
                }
            }
            Member::InitBlock(block) => {
                let stmts = std::mem::take(&mut block.body.stmts);
                if block.is_static {
                    static_init.extend(stmts);
                } else {
                    instance_init.extend(stmts);
                }
            }
            _ => {}
        }
    }
    decl.members.retain(|m| !matches!(m, Member::InitBlock(_)));

    if !instance_init.is_empty() {
        if !decl.members.iter().any(|m| matches!(m, Member::Constructor(_))) {
            let mut default_ctor = Constructor::new(Vec::new(), Block::default());
            default_ctor.synthetic = true;
            decl.members.push(Member::Constructor(default_ctor));
        }
        for ctor in decl.constructors_mut() {
            splice_into_ctor(ctor, &instance_init);
        }
    }

    if !static_init.is_empty() {
        let existing = decl.members.iter_mut().find_map(|m| match m {
            Member::Method(method)
                if method.is_static && method.name == CLASS_SETUP && method.params.is_empty() =>
            {
                Some(method)
            }
            _ => None,
        });
        match existing {
            Some(method) => {
                let body = method.body.get_or_insert_with(Block::default);
                body.stmts.splice(0..0, static_init);
            }
            None => {
                let mut setup =
                    Method::new(CLASS_SETUP, Vec::new(), TypeRef::Void, Block::new(static_init));
                setup.is_static = true;
                setup.synthetic = true;
                decl.members.push(Member::Method(setup));
            }
        }
    }
}

/// Insert the initializer statements into a non-delegating constructor,
/// after a leading `super` call and after any capture plumbing the extractor
/// placed there. A constructor delegating with `this(...)` is skipped; the
/// initializers run in its delegation root.
fn splice_into_ctor(ctor: &mut Constructor, instance_init: &[Stmt]) {
    if let Some(Stmt::ConstructorCall(call)) = ctor.body.stmts.first() {
        if call.target == CtorTarget::This {
            return;
        }
    }
    let mut at = match ctor.body.stmts.first() {
        Some(Stmt::ConstructorCall(_)) => 1,
        _ => 0,
    };
    while ctor
        .body
        .stmts
        .get(at)
        .is_some_and(is_capture_plumbing)
    {
        at += 1;
    }
    ctor.body.stmts.splice(at..at, instance_init.to_vec());
}

/// A synthesized capture-field assignment at the head of a constructor body
fn is_capture_plumbing(stmt: &Stmt) -> bool {
    let Stmt::Expr(expr) = stmt else {
        return false;
    };
    let ExprKind::Assign(assign) = &expr.kind else {
        return false;
    };
    matches!(
        &assign.target.kind,
        ExprKind::FieldAccess(access)
            if access.object.is_none()
                && (access.field == "outer$" || access.field.starts_with("val$"))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosslate_ast::{ConstructorCall, DeclKind, InitBlock, Param, Span};
    use crosslate_ast::{Field, TypeDecl};
    use crosslate_types::{BindingId, PrimitiveKind};

    const INT: TypeRef = TypeRef::Primitive(PrimitiveKind::Int);

    fn binding() -> BindingId {
        BindingId(20)
    }

    fn field_with_init(name: &str, value: i64) -> Member {
        Member::Field(Field::new(name, INT).with_initializer(Expr::int(value)))
    }

    fn init_block(stmts: Vec<Stmt>, is_static: bool) -> Member {
        Member::InitBlock(InitBlock {
            is_static,
            body: Block::new(stmts),
            span: Span::synthetic(),
        })
    }

    fn assigned_field(stmt: &Stmt) -> &str {
        let Stmt::Expr(expr) = stmt else {
            panic!("expected assignment, got {stmt:?}");
        };
        let ExprKind::Assign(assign) = &expr.kind else {
            panic!("expected assignment, got {expr:?}");
        };
        let ExprKind::FieldAccess(access) = &assign.target.kind else {
            panic!("expected field target");
        };
        &access.field
    }

    #[test]
    fn test_declaration_order_is_preserved() {
        let mut decl = TypeDecl::new("Widget", binding(), DeclKind::Class);
        decl.members.push(field_with_init("a", 1));
        decl.members.push(init_block(
            vec![Stmt::Expr(Expr::assign(
                Expr::own_field("b", binding(), INT),
                Expr::int(2),
            ))],
            false,
        ));
        decl.members.push(field_with_init("c", 3));

        normalize_decl(&mut decl);

        // A default constructor was synthesized to hold the initializers.
        let ctor = decl.constructors().next().unwrap();
        assert!(ctor.synthetic);
        let fields: Vec<&str> = ctor.body.stmts.iter().map(assigned_field).collect();
        assert_eq!(fields, vec!["a", "b", "c"]);

        // Initializers were consumed at their declaration sites.
        assert!(decl.fields().all(|f| f.initializer.is_none()));
        assert!(!decl.members.iter().any(|m| matches!(m, Member::InitBlock(_))));
    }

    #[test]
    fn test_delegating_ctor_is_skipped() {
        let mut decl = TypeDecl::new("Widget", binding(), DeclKind::Class);
        decl.members.push(field_with_init("a", 1));
        let mut delegating = Constructor::new(Vec::new(), Block::default());
        delegating.body.stmts.push(Stmt::ConstructorCall(ConstructorCall {
            target: CtorTarget::This,
            args: vec![Expr::int(0)],
            span: Span::synthetic(),
        }));
        let root = Constructor::new(vec![Param::new("n", INT)], Block::default());
        decl.members.push(Member::Constructor(delegating));
        decl.members.push(Member::Constructor(root));

        normalize_decl(&mut decl);

        let ctors: Vec<&Constructor> = decl.constructors().collect();
        assert_eq!(ctors[0].body.stmts.len(), 1, "delegating ctor untouched");
        assert_eq!(ctors[1].body.stmts.len(), 1, "root runs the initializers");
        assert_eq!(assigned_field(&ctors[1].body.stmts[0]), "a");
    }

    #[test]
    fn test_initializers_land_after_super_and_capture_plumbing() {
        let mut decl = TypeDecl::new("Widget", binding(), DeclKind::Class);
        decl.members.push(field_with_init("a", 1));
        let mut ctor = Constructor::new(Vec::new(), Block::default());
        ctor.body.stmts.push(Stmt::ConstructorCall(ConstructorCall {
            target: CtorTarget::Super,
            args: Vec::new(),
            span: Span::synthetic(),
        }));
        ctor.body.stmts.push(Stmt::Expr(Expr::assign(
            Expr::own_field("val$x", binding(), INT),
            Expr::local("val$x", INT),
        )));
        decl.members.push(Member::Constructor(ctor));

        normalize_decl(&mut decl);

        let ctor = decl.constructors().next().unwrap();
        assert_eq!(ctor.body.stmts.len(), 3);
        assert!(matches!(&ctor.body.stmts[0], Stmt::ConstructorCall(_)));
        assert_eq!(assigned_field(&ctor.body.stmts[1]), "val$x");
        assert_eq!(assigned_field(&ctor.body.stmts[2]), "a");
    }

    #[test]
    fn test_static_initialization_moves_to_class_setup() {
        let mut decl = TypeDecl::new("Widget", binding(), DeclKind::Class);
        decl.members
            .push(Member::Field(Field::new("counter", INT).static_field().with_initializer(Expr::int(0))));
        decl.members.push(init_block(
            vec![Stmt::Expr(Expr::assign(
                Expr::own_field("counter", binding(), INT),
                Expr::int(1),
            ))],
            true,
        ));

        normalize_decl(&mut decl);

        // No instance constructor is synthesized for static-only setup.
        assert_eq!(decl.constructors().count(), 0);
        let setup = decl.find_method(CLASS_SETUP).unwrap();
        assert!(setup.is_static && setup.synthetic);
        let body = setup.body.as_ref().unwrap();
        assert_eq!(body.stmts.len(), 2);
        assert_eq!(assigned_field(&body.stmts[0]), "counter");
    }
}
