//! Boxing/unboxing materialization
//!
//! The source language converts silently between primitives and their wrapper
//! classes; the target has no such conversion, so every coercion must become
//! an explicit node. This pass compares each expression's resolved type with
//! the type its context expects and inserts `Box`/`Unbox` nodes at the
//! mismatches: assignment and initializer values, call and creation
//! arguments, return values, conditions, arithmetic operands, switch
//! discriminants and array indices.
//!
//! The pass is idempotent: an inserted node carries the coerced type, so a
//! second run finds no remaining mismatch.

use crate::context::CompilerContext;
use crosslate_ast::{Block, CompilationUnit, Expr, ExprKind, Member, Stmt, UnaryOp};
use crosslate_types::{PrimitiveKind, TypeRef, TypeTable};

pub struct Autoboxer<'a> {
    ctx: &'a CompilerContext,
}

impl<'a> Autoboxer<'a> {
    pub fn new(ctx: &'a CompilerContext) -> Self {
        Autoboxer { ctx }
    }

    pub fn run(&self, unit: &mut CompilationUnit) {
        let types = self.ctx.types();
        for id in unit.live_ids() {
            for member in &mut unit.decl_mut(id).members {
                match member {
                    Member::Field(field) => {
                        if let Some(init) = &mut field.initializer {
                            let expected = field.ty.clone();
                            let walker = Walker {
                                types: &types,
                                return_ty: TypeRef::Void,
                            };
                            walker.coerce(init, &expected);
                        }
                    }
                    Member::Method(method) => {
                        let walker = Walker {
                            types: &types,
                            return_ty: method.return_ty.clone(),
                        };
                        if let Some(body) = &mut method.body {
                            walker.block(body);
                        }
                    }
                    Member::Constructor(ctor) => {
                        let walker = Walker {
                            types: &types,
                            return_ty: TypeRef::Void,
                        };
                        walker.block(&mut ctor.body);
                    }
                    Member::InitBlock(block) => {
                        let walker = Walker {
                            types: &types,
                            return_ty: TypeRef::Void,
                        };
                        walker.block(&mut block.body);
                    }
                }
            }
        }
    }
}

struct Walker<'t> {
    types: &'t TypeTable,
    /// Expected type of `return` values in the body being walked
    return_ty: TypeRef,
}

const BOOLEAN: TypeRef = TypeRef::Primitive(PrimitiveKind::Boolean);
const INT: TypeRef = TypeRef::Primitive(PrimitiveKind::Int);

impl Walker<'_> {
    /// Visit an expression, then reconcile its type with what the context
    /// expects, wrapping it in a conversion node on mismatch.
    fn coerce(&self, expr: &mut Expr, expected: &TypeRef) {
        self.expr(expr);
        match (expr.ty.as_primitive(), expected) {
            (Some(prim), TypeRef::Class(binding)) => {
                // Box into the matching wrapper, or up to a plain reference
                // context; a cross-primitive mismatch is the front end's to
                // explain, not ours to paper over.
                let fits = match self.types.primitive_of(*binding) {
                    Some(boxed) => boxed == prim,
                    None => true,
                };
                if fits {
                    let wrapper = self.types.wrapper_binding(prim);
                    self.wrap(expr, TypeRef::Class(wrapper), true);
                }
            }
            (None, TypeRef::Primitive(_)) => {
                if let Some(prim) = self.types.unboxed(&expr.ty) {
                    self.wrap(expr, TypeRef::Primitive(prim), false);
                }
            }
            _ => {}
        }
    }

    fn wrap(&self, expr: &mut Expr, ty: TypeRef, boxing: bool) {
        let span = expr.span;
        let inner = std::mem::replace(expr, Expr::null());
        let kind = if boxing {
            ExprKind::Box(Box::new(inner))
        } else {
            ExprKind::Unbox(Box::new(inner))
        };
        *expr = Expr::new(kind, ty, span);
    }

    /// Unbox an operand to its own primitive when it is wrapper-typed
    fn unbox_operand(&self, expr: &mut Expr) {
        if let Some(prim) = self.types.unboxed(&expr.ty) {
            self.coerce(expr, &TypeRef::Primitive(prim));
        } else {
            self.expr(expr);
        }
    }

    fn block(&self, block: &mut Block) {
        for stmt in &mut block.stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Expr(e) => self.expr(e),
            Stmt::LocalVar(v) => {
                let expected = v.ty.clone();
                if let Some(init) = &mut v.init {
                    self.coerce(init, &expected);
                }
            }
            Stmt::If(s) => {
                self.coerce(&mut s.condition, &BOOLEAN);
                self.block(&mut s.then_branch);
                if let Some(e) = &mut s.else_branch {
                    self.block(e);
                }
            }
            Stmt::While(s) => {
                self.coerce(&mut s.condition, &BOOLEAN);
                self.block(&mut s.body);
            }
            Stmt::DoWhile(s) => {
                self.block(&mut s.body);
                self.coerce(&mut s.condition, &BOOLEAN);
            }
            Stmt::For(s) => {
                for init in &mut s.init {
                    self.stmt(init);
                }
                if let Some(cond) = &mut s.condition {
                    self.coerce(cond, &BOOLEAN);
                }
                for update in &mut s.update {
                    self.expr(update);
                }
                self.block(&mut s.body);
            }
            Stmt::ForEach(s) => {
                self.expr(&mut s.iterable);
                self.block(&mut s.body);
            }
            Stmt::Switch(s) => {
                // A wrapper-typed discriminant switches on its primitive.
                self.unbox_operand(&mut s.discriminant);
                for case in &mut s.cases {
                    if let Some(test) = &mut case.test {
                        self.expr(test);
                    }
                    for stmt in &mut case.body {
                        self.stmt(stmt);
                    }
                }
            }
            Stmt::Try(s) => {
                self.block(&mut s.body);
                for catch in &mut s.catches {
                    self.block(&mut catch.body);
                }
                if let Some(f) = &mut s.finally {
                    self.block(f);
                }
            }
            Stmt::TryWithResources(s) => {
                for r in &mut s.resources {
                    self.expr(&mut r.init);
                }
                self.block(&mut s.body);
                for catch in &mut s.catches {
                    self.block(&mut catch.body);
                }
                if let Some(f) = &mut s.finally {
                    self.block(f);
                }
            }
            Stmt::Labeled(s) => self.stmt(&mut s.body),
            Stmt::Block(b) => self.block(b),
            Stmt::Return(r) => {
                let expected = self.return_ty.clone();
                if let Some(value) = &mut r.value {
                    self.coerce(value, &expected);
                }
            }
            Stmt::Throw(t) => self.expr(&mut t.value),
            Stmt::ConstructorCall(c) => {
                for arg in &mut c.args {
                    self.expr(arg);
                }
            }
            Stmt::Synchronized(s) => {
                self.expr(&mut s.monitor);
                self.block(&mut s.body);
            }
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::LocalClass(_) | Stmt::Empty(_) => {}
        }
    }

    fn expr(&self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Assign(a) => {
                self.expr(&mut a.target);
                let expected = a.target.ty.clone();
                self.coerce(&mut a.value, &expected);
            }
            ExprKind::Invoke(invoke) => {
                if let Some(receiver) = &mut invoke.receiver {
                    self.expr(receiver);
                }
                let param_tys = invoke.param_tys.clone();
                for (i, arg) in invoke.args.iter_mut().enumerate() {
                    match param_tys.get(i) {
                        Some(expected) => self.coerce(arg, expected),
                        None => self.expr(arg),
                    }
                }
            }
            ExprKind::New(new) => {
                let param_tys = new.param_tys.clone();
                for (i, arg) in new.args.iter_mut().enumerate() {
                    match param_tys.get(i) {
                        Some(expected) => self.coerce(arg, expected),
                        None => self.expr(arg),
                    }
                }
            }
            ExprKind::SuperInvoke(s) => {
                for arg in &mut s.args {
                    self.expr(arg);
                }
            }
            ExprKind::Binary(b) => {
                use crosslate_ast::BinaryOp;
                if !b.op.is_arithmetic_or_relational() {
                    self.coerce(&mut b.lhs, &BOOLEAN);
                    self.coerce(&mut b.rhs, &BOOLEAN);
                    return;
                }
                self.expr(&mut b.lhs);
                self.expr(&mut b.rhs);
                let identity = matches!(b.op, BinaryOp::Eq | BinaryOp::Ne);
                let lhs_prim = b.lhs.ty.is_primitive();
                let rhs_prim = b.rhs.ty.is_primitive();
                if identity && !lhs_prim && !rhs_prim {
                    // Reference identity between two wrappers stays as-is.
                    return;
                }
                if !lhs_prim {
                    self.unbox_operand(&mut b.lhs);
                }
                if !rhs_prim {
                    self.unbox_operand(&mut b.rhs);
                }
            }
            ExprKind::Unary(u) => match u.op {
                UnaryOp::Not => self.coerce(&mut u.operand, &BOOLEAN),
                UnaryOp::Neg => self.unbox_operand(&mut u.operand),
            },
            ExprKind::InstanceOf(i) => self.expr(&mut i.value),
            ExprKind::Cast(inner) | ExprKind::Box(inner) | ExprKind::Unbox(inner) => {
                self.expr(inner)
            }
            ExprKind::ArrayGet(a) => {
                self.expr(&mut a.array);
                self.coerce(&mut a.index, &INT);
            }
            ExprKind::FieldAccess(access) => {
                if let Some(object) = &mut access.object {
                    self.expr(object);
                }
            }
            ExprKind::Literal(_)
            | ExprKind::LocalRef(_)
            | ExprKind::This
            | ExprKind::EnumConstant(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosslate_ast::{
        Binary, BinaryOp, Block, DeclKind, Invoke, LocalVar, Method, Span, TypeDecl,
    };
    use crosslate_types::{BindingId, PrimitiveKind};

    fn integer_binding(ctx: &CompilerContext) -> BindingId {
        ctx.types().wrapper_binding(PrimitiveKind::Int)
    }

    fn run_on_method(ctx: &CompilerContext, body: Block, return_ty: TypeRef) -> Block {
        let mut unit = crosslate_ast::CompilationUnit::new("Box.src");
        let mut decl = TypeDecl::new("Holder", BindingId(20), DeclKind::Class);
        decl.members.push(Member::Method(Method::new(
            "m",
            Vec::new(),
            return_ty,
            body,
        )));
        let id = unit.alloc(decl);
        Autoboxer::new(ctx).run(&mut unit);
        let Member::Method(method) = &unit.decl(id).members[0] else {
            unreachable!()
        };
        method.body.clone().unwrap()
    }

    #[test]
    fn test_primitive_initializer_of_wrapper_local_is_boxed() {
        let ctx = CompilerContext::new();
        let integer = integer_binding(&ctx);
        let body = Block::new(vec![Stmt::LocalVar(LocalVar::new(
            "n",
            TypeRef::Class(integer),
            Some(Expr::int(3)),
        ))]);

        let body = run_on_method(&ctx, body, TypeRef::Void);
        let Stmt::LocalVar(v) = &body.stmts[0] else {
            unreachable!()
        };
        let init = v.init.as_ref().unwrap();
        assert!(matches!(init.kind, ExprKind::Box(_)));
        assert_eq!(init.ty, TypeRef::Class(integer));
    }

    #[test]
    fn test_wrapper_operand_of_arithmetic_is_unboxed() {
        let ctx = CompilerContext::new();
        let integer = integer_binding(&ctx);
        let sum = Expr::new(
            ExprKind::Binary(Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Expr::local("a", TypeRef::Class(integer))),
                rhs: Box::new(Expr::int(1)),
            }),
            TypeRef::Primitive(PrimitiveKind::Int),
            Span::synthetic(),
        );
        let body = run_on_method(
            &ctx,
            Block::new(vec![Stmt::Expr(sum)]),
            TypeRef::Void,
        );

        let Stmt::Expr(Expr {
            kind: ExprKind::Binary(b),
            ..
        }) = &body.stmts[0]
        else {
            unreachable!()
        };
        assert!(matches!(b.lhs.kind, ExprKind::Unbox(_)));
        assert_eq!(b.lhs.ty, TypeRef::Primitive(PrimitiveKind::Int));
        assert!(matches!(b.rhs.kind, ExprKind::Literal(_)));
    }

    #[test]
    fn test_identity_comparison_of_two_wrappers_is_untouched() {
        let ctx = CompilerContext::new();
        let integer = integer_binding(&ctx);
        let cmp = Expr::new(
            ExprKind::Binary(Binary {
                op: BinaryOp::Eq,
                lhs: Box::new(Expr::local("a", TypeRef::Class(integer))),
                rhs: Box::new(Expr::local("b", TypeRef::Class(integer))),
            }),
            TypeRef::Primitive(PrimitiveKind::Boolean),
            Span::synthetic(),
        );
        let body = run_on_method(&ctx, Block::new(vec![Stmt::Expr(cmp)]), TypeRef::Void);

        let Stmt::Expr(Expr {
            kind: ExprKind::Binary(b),
            ..
        }) = &body.stmts[0]
        else {
            unreachable!()
        };
        assert!(matches!(b.lhs.kind, ExprKind::LocalRef(_)));
        assert!(matches!(b.rhs.kind, ExprKind::LocalRef(_)));
    }

    #[test]
    fn test_return_value_is_boxed_to_wrapper_return_type() {
        let ctx = CompilerContext::new();
        let integer = integer_binding(&ctx);
        let body = Block::new(vec![Stmt::Return(crosslate_ast::ReturnStmt {
            value: Some(Expr::int(7)),
            span: Span::synthetic(),
        })]);
        let body = run_on_method(&ctx, body, TypeRef::Class(integer));

        let Stmt::Return(r) = &body.stmts[0] else {
            unreachable!()
        };
        assert!(matches!(r.value.as_ref().unwrap().kind, ExprKind::Box(_)));
    }

    #[test]
    fn test_call_arguments_follow_declared_parameter_types() {
        let ctx = CompilerContext::new();
        let integer = integer_binding(&ctx);
        let call = Expr::new(
            ExprKind::Invoke(Invoke {
                receiver: Some(Box::new(Expr::local("list", TypeRef::Class(BindingId(21))))),
                method: "add".to_string(),
                owner: BindingId(21),
                args: vec![Expr::int(4)],
                param_tys: vec![TypeRef::Class(crosslate_types::well_known::OBJECT)],
                is_static: false,
            }),
            TypeRef::Void,
            Span::synthetic(),
        );
        let body = run_on_method(&ctx, Block::new(vec![Stmt::Expr(call)]), TypeRef::Void);

        let Stmt::Expr(Expr {
            kind: ExprKind::Invoke(invoke),
            ..
        }) = &body.stmts[0]
        else {
            unreachable!()
        };
        // Boxed up to the plain reference parameter, typed at the wrapper.
        assert!(matches!(invoke.args[0].kind, ExprKind::Box(_)));
        assert_eq!(invoke.args[0].ty, TypeRef::Class(integer));
    }

    #[test]
    fn test_pass_is_idempotent() {
        let ctx = CompilerContext::new();
        let integer = integer_binding(&ctx);
        let body = Block::new(vec![Stmt::LocalVar(LocalVar::new(
            "n",
            TypeRef::Class(integer),
            Some(Expr::int(3)),
        ))]);

        let once = run_on_method(&ctx, body.clone(), TypeRef::Void);
        let twice = run_on_method(&ctx, once.clone(), TypeRef::Void);
        assert_eq!(once, twice);
    }
}
