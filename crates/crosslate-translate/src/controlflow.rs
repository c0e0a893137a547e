//! Control-flow lowering
//!
//! Rewrites the source-side sugar forms into the core statement set the
//! emitter understands:
//!
//! - for-each loops become explicit iterator protocol calls
//! - resource-scoped blocks become nested try/finally with reverse-order
//!   close calls, so the close of a later resource cannot mask the close of
//!   an earlier one
//! - multi-type catch clauses become a single root-type catch dispatching on
//!   instance-of, rethrowing what none of the listed types match
//! - string and enum switches become integer switches, preserving case
//!   fallthrough
//! - labeled break/continue is lowered to boolean jump flags checked after
//!   each intermediate breakable construct
//!
//! Statements with no target-language mapping (`synchronized`, a label on a
//! non-loop) are rejected here with a construct error rather than being
//! silently dropped.

use crate::error::{TranslateError, TranslateResult};
use crosslate_ast::{
    Block, BreakStmt, CatchClause, CompilationUnit, ContinueStmt, Expr, ExprKind, IfStmt,
    LocalVar, Member, Span, Stmt, SwitchStmt, ThrowStmt, TryStmt, WhileStmt,
};
use crosslate_types::{well_known, PrimitiveKind, TypeRef};
use rustc_hash::FxHashSet;

const BOOLEAN: TypeRef = TypeRef::Primitive(PrimitiveKind::Boolean);
const INT: TypeRef = TypeRef::Primitive(PrimitiveKind::Int);

#[derive(Default)]
pub struct ControlFlowRewriter;

impl ControlFlowRewriter {
    pub fn new() -> Self {
        ControlFlowRewriter
    }

    pub fn run(&self, unit: &mut CompilationUnit) -> TranslateResult<()> {
        for id in unit.live_ids() {
            for member in &mut unit.decl_mut(id).members {
                let (params, body) = match member {
                    Member::Method(m) => (m.params.as_slice(), m.body.as_mut()),
                    Member::Constructor(c) => (c.params.as_slice(), Some(&mut c.body)),
                    Member::InitBlock(b) => (&[][..], Some(&mut b.body)),
                    Member::Field(_) => continue,
                };
                let Some(body) = body else { continue };
                let mut rewriter = BodyRewriter::new(params.iter().map(|p| p.name.clone()));
                collect_names(body, &mut rewriter.used);
                rewriter.block(body)?;
            }
        }
        Ok(())
    }
}

/// Per-body rewriter; tracks every name in scope so synthesized temporaries
/// never collide with source locals.
struct BodyRewriter {
    used: FxHashSet<String>,
}

impl BodyRewriter {
    fn new(params: impl Iterator<Item = String>) -> Self {
        BodyRewriter {
            used: params.collect(),
        }
    }

    fn fresh(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }
        let mut counter = 2;
        loop {
            let candidate = format!("{base}_{counter}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }

    fn block(&mut self, block: &mut Block) -> TranslateResult<()> {
        let old = std::mem::take(&mut block.stmts);
        let mut out = Vec::with_capacity(old.len());
        for stmt in old {
            out.extend(self.stmt(stmt)?);
        }
        block.stmts = out;
        Ok(())
    }

    /// Rewrite one statement, bottom-up, into its replacement sequence
    fn stmt(&mut self, stmt: Stmt) -> TranslateResult<Vec<Stmt>> {
        match stmt {
            Stmt::ForEach(mut s) => {
                self.block(&mut s.body)?;
                Ok(vec![self.lower_for_each(s)])
            }
            Stmt::TryWithResources(mut s) => {
                self.block(&mut s.body)?;
                for catch in &mut s.catches {
                    self.block(&mut catch.body)?;
                }
                if let Some(f) = &mut s.finally {
                    self.block(f)?;
                }
                let catches = rewrite_catches(std::mem::take(&mut s.catches));
                Ok(vec![lower_resources(s, catches)])
            }
            Stmt::Try(mut s) => {
                self.block(&mut s.body)?;
                for catch in &mut s.catches {
                    self.block(&mut catch.body)?;
                }
                if let Some(f) = &mut s.finally {
                    self.block(f)?;
                }
                s.catches = rewrite_catches(std::mem::take(&mut s.catches));
                Ok(vec![Stmt::Try(s)])
            }
            Stmt::Switch(mut s) => {
                for case in &mut s.cases {
                    let old = std::mem::take(&mut case.body);
                    let mut out = Vec::with_capacity(old.len());
                    for stmt in old {
                        out.extend(self.stmt(stmt)?);
                    }
                    case.body = out;
                }
                self.lower_switch(s)
            }
            Stmt::Labeled(mut s) => {
                let mut inner = self.stmt(*s.body)?;
                // A lowered sugar form (for-each) wraps its loop in a block
                // of setup temporaries; the label belongs to the loop itself.
                let unsupported = TranslateError::UnsupportedConstruct {
                    construct: "label on a non-loop statement",
                    span: s.span,
                };
                let (mut prefix, target) = match inner.pop() {
                    Some(Stmt::Block(mut b))
                        if inner.is_empty()
                            && matches!(
                                b.stmts.last(),
                                Some(Stmt::While(_) | Stmt::DoWhile(_) | Stmt::For(_))
                            ) =>
                    {
                        let target = b.stmts.pop().expect("loop checked above");
                        (b.stmts, target)
                    }
                    Some(target) if inner.is_empty() => (Vec::new(), target),
                    _ => return Err(unsupported),
                };
                s.body = Box::new(target);
                let lowered = self.lower_labeled(s)?;
                if prefix.is_empty() {
                    Ok(lowered)
                } else {
                    prefix.extend(lowered);
                    Ok(vec![Stmt::Block(Block::new(prefix))])
                }
            }
            Stmt::Synchronized(s) => Err(TranslateError::UnsupportedConstruct {
                construct: "synchronized statement",
                span: s.span,
            }),
            Stmt::If(mut s) => {
                self.block(&mut s.then_branch)?;
                if let Some(e) = &mut s.else_branch {
                    self.block(e)?;
                }
                Ok(vec![Stmt::If(s)])
            }
            Stmt::While(mut s) => {
                self.block(&mut s.body)?;
                Ok(vec![Stmt::While(s)])
            }
            Stmt::DoWhile(mut s) => {
                self.block(&mut s.body)?;
                Ok(vec![Stmt::DoWhile(s)])
            }
            Stmt::For(mut s) => {
                let old_init = std::mem::take(&mut s.init);
                let mut init = Vec::with_capacity(old_init.len());
                for stmt in old_init {
                    init.extend(self.stmt(stmt)?);
                }
                s.init = init;
                self.block(&mut s.body)?;
                Ok(vec![Stmt::For(s)])
            }
            Stmt::Block(mut b) => {
                self.block(&mut b)?;
                Ok(vec![Stmt::Block(b)])
            }
            other => Ok(vec![other]),
        }
    }

    /// `for (T x : e) body` becomes the explicit iterator protocol.
    fn lower_for_each(&mut self, s: crosslate_ast::ForEachStmt) -> Stmt {
        let span = s.span;
        let it_name = self.fresh("iterator");
        let it_ty = TypeRef::Class(well_known::ITERATOR);

        let acquire = Stmt::LocalVar(LocalVar::new(
            it_name.clone(),
            it_ty.clone(),
            Some(Expr::invoke0(
                s.iterable,
                "iterator",
                well_known::ITERABLE,
                it_ty.clone(),
            )),
        ));

        let has_next = Expr::invoke0(
            Expr::local(it_name.clone(), it_ty.clone()),
            "hasNext",
            well_known::ITERATOR,
            BOOLEAN,
        );
        let next = Expr::invoke0(
            Expr::local(it_name, it_ty),
            "next",
            well_known::ITERATOR,
            TypeRef::Class(well_known::OBJECT),
        );
        let element = Stmt::LocalVar(LocalVar::new(
            s.var_name,
            s.var_ty.clone(),
            Some(Expr::new(
                ExprKind::Cast(Box::new(next)),
                s.var_ty,
                Span::synthetic(),
            )),
        ));

        let mut body = vec![element];
        body.extend(s.body.stmts);
        Stmt::Block(Block {
            stmts: vec![
                acquire,
                Stmt::While(WhileStmt {
                    condition: has_next,
                    body: Block::new(body),
                    span,
                }),
            ],
            span,
        })
    }

    fn lower_switch(&mut self, s: SwitchStmt) -> TranslateResult<Vec<Stmt>> {
        let is_enum = s
            .cases
            .iter()
            .any(|c| matches!(c.test.as_ref().map(|t| &t.kind), Some(ExprKind::EnumConstant(_))));
        match &s.discriminant.ty {
            TypeRef::Class(binding) if *binding == well_known::STRING => {
                Ok(self.lower_string_switch(s))
            }
            TypeRef::Class(_) if is_enum => Ok(vec![lower_enum_switch(s)]),
            TypeRef::Class(_) => Err(TranslateError::UnsupportedConstruct {
                construct: "switch on a reference discriminant",
                span: s.span,
            }),
            _ => Ok(vec![Stmt::Switch(s)]),
        }
    }

    /// A string switch evaluates the discriminant once, maps it to a case
    /// index with an equals chain, then switches on the index. Fallthrough
    /// between the original arms is untouched.
    fn lower_string_switch(&mut self, mut s: SwitchStmt) -> Vec<Stmt> {
        let span = s.span;
        let subject = self.fresh("switchExpr");
        let index = self.fresh("switchIndex");
        let string_ty = TypeRef::Class(well_known::STRING);

        let mut stmts = vec![
            Stmt::LocalVar(LocalVar::new(
                subject.clone(),
                string_ty.clone(),
                Some(s.discriminant),
            )),
            Stmt::LocalVar(LocalVar::new(index.clone(), INT, Some(Expr::int(-1)))),
        ];

        // Nested else-ifs, built innermost-first.
        let mut chain: Option<Stmt> = None;
        let mut arm = 0i64;
        let mut arm_indices = Vec::with_capacity(s.cases.len());
        for case in &s.cases {
            if case.test.is_none() {
                arm_indices.push(None);
                continue;
            }
            arm_indices.push(Some(arm));
            arm += 1;
        }
        for (case, idx) in s.cases.iter_mut().zip(&arm_indices).rev() {
            let (Some(test), Some(idx)) = (case.test.take(), idx) else {
                continue;
            };
            let matches = Expr::new(
                ExprKind::Invoke(crosslate_ast::Invoke {
                    receiver: Some(Box::new(Expr::local(subject.clone(), string_ty.clone()))),
                    method: "equals".to_string(),
                    owner: well_known::STRING,
                    args: vec![test],
                    param_tys: vec![TypeRef::Class(well_known::OBJECT)],
                    is_static: false,
                }),
                BOOLEAN,
                Span::synthetic(),
            );
            let select = Stmt::Expr(Expr::assign(
                Expr::local(index.clone(), INT),
                Expr::int(*idx),
            ));
            let else_branch = chain.take().map(|next| Block::new(vec![next]));
            chain = Some(Stmt::If(IfStmt {
                condition: matches,
                then_branch: Block::new(vec![select]),
                else_branch,
                span: Span::synthetic(),
            }));
        }
        stmts.extend(chain);

        for (case, idx) in s.cases.iter_mut().zip(&arm_indices) {
            if let Some(idx) = idx {
                case.test = Some(Expr::int(*idx));
            }
        }
        s.discriminant = Expr::local(index, INT);
        stmts.push(Stmt::Switch(s));
        vec![Stmt::Block(Block { stmts, span })]
    }

    /// Lower `label: loop { ... }`; jumps targeting the label from nested
    /// breakable constructs are carried outward on boolean flags.
    fn lower_labeled(&mut self, s: crosslate_ast::LabeledStmt) -> TranslateResult<Vec<Stmt>> {
        let label = s.label;
        let span = s.span;
        let mut body = *s.body;
        if !matches!(body, Stmt::While(_) | Stmt::DoWhile(_) | Stmt::For(_)) {
            return Err(TranslateError::UnsupportedConstruct {
                construct: "label on a non-loop statement",
                span,
            });
        }

        let mut deep = DeepJumps::default();
        scan_loop_body(&body, &label, &mut deep);
        let flags = JumpFlags {
            brk: deep.brk.then(|| self.fresh(&format!("break_{label}"))),
            cont: deep.cont.then(|| self.fresh(&format!("continue_{label}"))),
        };

        lower_loop_body(&mut body, &label, &flags);

        let mut out = Vec::new();
        for flag in [&flags.brk, &flags.cont].into_iter().flatten() {
            out.push(Stmt::LocalVar(LocalVar::new(
                flag.clone(),
                BOOLEAN,
                Some(Expr::bool(false)),
            )));
        }
        out.push(body);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Resource-scoped blocks

/// Nested try/finally, one layer per resource, innermost holding the body so
/// resources close in reverse acquisition order.
fn lower_resources(s: crosslate_ast::TryResourcesStmt, catches: Vec<CatchClause>) -> Stmt {
    let span = s.span;
    let mut inner = s.body;
    for resource in s.resources.into_iter().rev() {
        let close = Stmt::Expr(Expr::invoke0(
            Expr::local(resource.name.clone(), resource.ty.clone()),
            "close",
            well_known::AUTO_CLOSEABLE,
            TypeRef::Void,
        ));
        let guarded = Stmt::Try(TryStmt {
            body: inner,
            catches: Vec::new(),
            finally: Some(Block::new(vec![close])),
            span: resource.span,
        });
        inner = Block {
            stmts: vec![
                Stmt::LocalVar(LocalVar::new(resource.name, resource.ty, Some(resource.init))),
                guarded,
            ],
            span: resource.span,
        };
    }

    if catches.is_empty() && s.finally.is_none() {
        Stmt::Block(inner)
    } else {
        Stmt::Try(TryStmt {
            body: inner,
            catches,
            finally: s.finally,
            span,
        })
    }
}

// ---------------------------------------------------------------------------
// Multi-type catch clauses

fn rewrite_catches(catches: Vec<CatchClause>) -> Vec<CatchClause> {
    catches
        .into_iter()
        .map(|catch| {
            if catch.types.len() <= 1 {
                return catch;
            }
            let thrown = Expr::local(catch.param.clone(), TypeRef::Class(well_known::THROWABLE));
            let mut tests = catch
                .types
                .iter()
                .map(|binding| Expr::instance_of(thrown.clone(), *binding));
            let first = tests.next().expect("at least two listed types");
            let condition = tests.fold(first, |acc, test| {
                Expr::new(
                    ExprKind::Binary(crosslate_ast::Binary {
                        op: crosslate_ast::BinaryOp::Or,
                        lhs: Box::new(acc),
                        rhs: Box::new(test),
                    }),
                    BOOLEAN,
                    Span::synthetic(),
                )
            });
            let rethrow = Stmt::Throw(ThrowStmt {
                value: thrown,
                span: Span::synthetic(),
            });
            let dispatch = Stmt::If(IfStmt {
                condition,
                then_branch: catch.body,
                else_branch: Some(Block::new(vec![rethrow])),
                span: catch.span,
            });
            CatchClause {
                param: catch.param,
                types: vec![well_known::THROWABLE],
                body: Block::new(vec![dispatch]),
                span: catch.span,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Enum switches

/// An enum switch becomes an integer switch on the discriminant's ordinal.
fn lower_enum_switch(mut s: SwitchStmt) -> Stmt {
    let enum_binding = s
        .discriminant
        .ty
        .as_class()
        .expect("enum discriminant is class-typed");
    s.discriminant = Expr::invoke0(s.discriminant, "ordinal", enum_binding, INT);
    for case in &mut s.cases {
        if let Some(test) = &mut case.test {
            if let ExprKind::EnumConstant(constant) = &test.kind {
                *test = Expr::int(constant.ordinal as i64);
            }
        }
    }
    Stmt::Switch(s)
}

// ---------------------------------------------------------------------------
// Labeled jumps

#[derive(Default)]
struct DeepJumps {
    brk: bool,
    cont: bool,
}

struct JumpFlags {
    brk: Option<String>,
    cont: Option<String>,
}

fn loop_body_mut(stmt: &mut Stmt) -> &mut Block {
    match stmt {
        Stmt::While(s) => &mut s.body,
        Stmt::DoWhile(s) => &mut s.body,
        Stmt::For(s) => &mut s.body,
        _ => unreachable!("labeled statement is a loop"),
    }
}

fn loop_body(stmt: &Stmt) -> &Block {
    match stmt {
        Stmt::While(s) => &s.body,
        Stmt::DoWhile(s) => &s.body,
        Stmt::For(s) => &s.body,
        _ => unreachable!("labeled statement is a loop"),
    }
}

fn scan_loop_body(stmt: &Stmt, label: &str, deep: &mut DeepJumps) {
    scan_stmts(&loop_body(stmt).stmts, label, 0, deep);
}

fn scan_stmts(stmts: &[Stmt], label: &str, depth: usize, deep: &mut DeepJumps) {
    for stmt in stmts {
        match stmt {
            Stmt::Break(BreakStmt {
                label: Some(l), ..
            }) if l == label => {
                if depth > 0 {
                    deep.brk = true;
                }
            }
            Stmt::Continue(ContinueStmt {
                label: Some(l), ..
            }) if l == label => {
                if depth > 0 {
                    deep.cont = true;
                }
            }
            Stmt::While(s) => scan_stmts(&s.body.stmts, label, depth + 1, deep),
            Stmt::DoWhile(s) => scan_stmts(&s.body.stmts, label, depth + 1, deep),
            Stmt::For(s) => scan_stmts(&s.body.stmts, label, depth + 1, deep),
            Stmt::Switch(s) => {
                for case in &s.cases {
                    scan_stmts(&case.body, label, depth + 1, deep);
                }
            }
            Stmt::If(s) => {
                scan_stmts(&s.then_branch.stmts, label, depth, deep);
                if let Some(e) = &s.else_branch {
                    scan_stmts(&e.stmts, label, depth, deep);
                }
            }
            Stmt::Try(s) => {
                scan_stmts(&s.body.stmts, label, depth, deep);
                for catch in &s.catches {
                    scan_stmts(&catch.body.stmts, label, depth, deep);
                }
                if let Some(f) = &s.finally {
                    scan_stmts(&f.stmts, label, depth, deep);
                }
            }
            Stmt::Block(b) => scan_stmts(&b.stmts, label, depth, deep),
            _ => {}
        }
    }
}

fn lower_loop_body(stmt: &mut Stmt, label: &str, flags: &JumpFlags) {
    let body = loop_body_mut(stmt);
    let stmts = std::mem::take(&mut body.stmts);
    let (stmts, _) = lower_jump_stmts(stmts, label, 0, flags);
    body.stmts = stmts;
}

/// Rewrite labeled jumps at the given breakable-construct depth. Returns the
/// rewritten statements and whether any targeted jump occurred inside them,
/// which tells the caller to plant a propagation guard after the construct.
fn lower_jump_stmts(
    stmts: Vec<Stmt>,
    label: &str,
    depth: usize,
    flags: &JumpFlags,
) -> (Vec<Stmt>, bool) {
    let mut out = Vec::with_capacity(stmts.len());
    let mut jumped = false;
    for stmt in stmts {
        match stmt {
            Stmt::Break(BreakStmt {
                label: Some(ref l),
                span,
            }) if l == label => {
                jumped = true;
                if depth == 0 {
                    out.push(Stmt::Break(BreakStmt { label: None, span }));
                } else {
                    let flag = flags.brk.as_ref().expect("deep break implies a flag");
                    out.push(set_flag(flag));
                    out.push(Stmt::Break(BreakStmt { label: None, span }));
                }
            }
            Stmt::Continue(ContinueStmt {
                label: Some(ref l),
                span,
            }) if l == label => {
                jumped = true;
                if depth == 0 {
                    out.push(Stmt::Continue(ContinueStmt { label: None, span }));
                } else {
                    let flag = flags.cont.as_ref().expect("deep continue implies a flag");
                    out.push(set_flag(flag));
                    // Leaving the inner construct; the guards walk the flag
                    // out to the labeled loop.
                    out.push(Stmt::Break(BreakStmt { label: None, span }));
                }
            }
            Stmt::While(mut s) => {
                let (stmts, inner_jumped) =
                    lower_jump_stmts(std::mem::take(&mut s.body.stmts), label, depth + 1, flags);
                s.body.stmts = stmts;
                out.push(Stmt::While(s));
                if inner_jumped {
                    jumped = true;
                    push_guards(&mut out, depth, flags);
                }
            }
            Stmt::DoWhile(mut s) => {
                let (stmts, inner_jumped) =
                    lower_jump_stmts(std::mem::take(&mut s.body.stmts), label, depth + 1, flags);
                s.body.stmts = stmts;
                out.push(Stmt::DoWhile(s));
                if inner_jumped {
                    jumped = true;
                    push_guards(&mut out, depth, flags);
                }
            }
            Stmt::For(mut s) => {
                let (stmts, inner_jumped) =
                    lower_jump_stmts(std::mem::take(&mut s.body.stmts), label, depth + 1, flags);
                s.body.stmts = stmts;
                out.push(Stmt::For(s));
                if inner_jumped {
                    jumped = true;
                    push_guards(&mut out, depth, flags);
                }
            }
            Stmt::Switch(mut s) => {
                let mut inner_jumped = false;
                for case in &mut s.cases {
                    let (stmts, j) =
                        lower_jump_stmts(std::mem::take(&mut case.body), label, depth + 1, flags);
                    case.body = stmts;
                    inner_jumped |= j;
                }
                out.push(Stmt::Switch(s));
                if inner_jumped {
                    jumped = true;
                    push_guards(&mut out, depth, flags);
                }
            }
            Stmt::If(mut s) => {
                let (stmts, j1) =
                    lower_jump_stmts(std::mem::take(&mut s.then_branch.stmts), label, depth, flags);
                s.then_branch.stmts = stmts;
                let mut j2 = false;
                if let Some(e) = &mut s.else_branch {
                    let (stmts, j) =
                        lower_jump_stmts(std::mem::take(&mut e.stmts), label, depth, flags);
                    e.stmts = stmts;
                    j2 = j;
                }
                jumped |= j1 | j2;
                out.push(Stmt::If(s));
            }
            Stmt::Try(mut s) => {
                let (stmts, j1) =
                    lower_jump_stmts(std::mem::take(&mut s.body.stmts), label, depth, flags);
                s.body.stmts = stmts;
                let mut j = j1;
                for catch in &mut s.catches {
                    let (stmts, jc) =
                        lower_jump_stmts(std::mem::take(&mut catch.body.stmts), label, depth, flags);
                    catch.body.stmts = stmts;
                    j |= jc;
                }
                if let Some(f) = &mut s.finally {
                    let (stmts, jf) =
                        lower_jump_stmts(std::mem::take(&mut f.stmts), label, depth, flags);
                    f.stmts = stmts;
                    j |= jf;
                }
                jumped |= j;
                out.push(Stmt::Try(s));
            }
            Stmt::Block(mut b) => {
                let (stmts, j) = lower_jump_stmts(std::mem::take(&mut b.stmts), label, depth, flags);
                b.stmts = stmts;
                jumped |= j;
                out.push(Stmt::Block(b));
            }
            other => out.push(other),
        }
    }
    (out, jumped)
}

fn set_flag(flag: &str) -> Stmt {
    Stmt::Expr(Expr::assign(
        Expr::local(flag.to_string(), BOOLEAN),
        Expr::bool(true),
    ))
}

/// Propagation guards planted after a breakable construct a labeled jump
/// escaped from. At intermediate depths both flags keep breaking outward; at
/// the labeled loop's own level the break flag exits and the continue flag
/// resets and continues.
fn push_guards(out: &mut Vec<Stmt>, depth: usize, flags: &JumpFlags) {
    let guard = |condition: Expr, body: Vec<Stmt>| {
        Stmt::If(IfStmt {
            condition,
            then_branch: Block::new(body),
            else_branch: None,
            span: Span::synthetic(),
        })
    };
    let plain_break = || {
        Stmt::Break(BreakStmt {
            label: None,
            span: Span::synthetic(),
        })
    };
    if let Some(brk) = &flags.brk {
        out.push(guard(
            Expr::local(brk.clone(), BOOLEAN),
            vec![plain_break()],
        ));
    }
    if let Some(cont) = &flags.cont {
        let body = if depth == 0 {
            vec![
                Stmt::Expr(Expr::assign(
                    Expr::local(cont.clone(), BOOLEAN),
                    Expr::bool(false),
                )),
                Stmt::Continue(ContinueStmt {
                    label: None,
                    span: Span::synthetic(),
                }),
            ]
        } else {
            vec![plain_break()]
        };
        out.push(guard(Expr::local(cont.clone(), BOOLEAN), body));
    }
}

// ---------------------------------------------------------------------------
// Name collection

fn collect_names(block: &Block, used: &mut FxHashSet<String>) {
    for stmt in &block.stmts {
        collect_stmt_names(stmt, used);
    }
}

fn collect_stmt_names(stmt: &Stmt, used: &mut FxHashSet<String>) {
    match stmt {
        Stmt::LocalVar(v) => {
            used.insert(v.name.clone());
        }
        Stmt::If(s) => {
            collect_names(&s.then_branch, used);
            if let Some(e) = &s.else_branch {
                collect_names(e, used);
            }
        }
        Stmt::While(s) => collect_names(&s.body, used),
        Stmt::DoWhile(s) => collect_names(&s.body, used),
        Stmt::For(s) => {
            for init in &s.init {
                collect_stmt_names(init, used);
            }
            collect_names(&s.body, used);
        }
        Stmt::ForEach(s) => {
            used.insert(s.var_name.clone());
            collect_names(&s.body, used);
        }
        Stmt::Switch(s) => {
            for case in &s.cases {
                for stmt in &case.body {
                    collect_stmt_names(stmt, used);
                }
            }
        }
        Stmt::Try(s) => {
            collect_names(&s.body, used);
            for catch in &s.catches {
                used.insert(catch.param.clone());
                collect_names(&catch.body, used);
            }
            if let Some(f) = &s.finally {
                collect_names(f, used);
            }
        }
        Stmt::TryWithResources(s) => {
            for r in &s.resources {
                used.insert(r.name.clone());
            }
            collect_names(&s.body, used);
            for catch in &s.catches {
                used.insert(catch.param.clone());
                collect_names(&catch.body, used);
            }
            if let Some(f) = &s.finally {
                collect_names(f, used);
            }
        }
        Stmt::Labeled(s) => collect_stmt_names(&s.body, used),
        Stmt::Block(b) => collect_names(b, used),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosslate_ast::{
        CompilationUnit, DeclKind, EnumConstant, ForEachStmt, LabeledStmt, Method, Resource,
        SwitchCase, SynchronizedStmt, TryResourcesStmt, TypeDecl,
    };
    use crosslate_types::BindingId;

    fn run_body(body: Block) -> TranslateResult<Block> {
        let mut unit = CompilationUnit::new("Flow.src");
        let mut decl = TypeDecl::new("Flow", BindingId(20), DeclKind::Class);
        decl.members.push(Member::Method(Method::new(
            "m",
            Vec::new(),
            TypeRef::Void,
            body,
        )));
        let id = unit.alloc(decl);
        ControlFlowRewriter::new().run(&mut unit)?;
        let Member::Method(method) = &unit.decl(id).members[0] else {
            unreachable!()
        };
        Ok(method.body.clone().unwrap())
    }

    fn marker(n: i64) -> Stmt {
        Stmt::Expr(Expr::int(n))
    }

    #[test]
    fn test_for_each_becomes_iterator_protocol() {
        let body = Block::new(vec![Stmt::ForEach(ForEachStmt {
            var_name: "item".to_string(),
            var_ty: TypeRef::Class(well_known::OBJECT),
            iterable: Expr::local("items", TypeRef::Class(well_known::ITERABLE)),
            body: Block::new(vec![marker(1)]),
            span: Span::synthetic(),
        })]);

        let body = run_body(body).unwrap();
        let Stmt::Block(outer) = &body.stmts[0] else {
            panic!("expected setup block");
        };

        let Stmt::LocalVar(it) = &outer.stmts[0] else {
            panic!("expected iterator acquisition");
        };
        assert_eq!(it.name, "iterator");
        assert_eq!(it.ty, TypeRef::Class(well_known::ITERATOR));
        assert!(matches!(
            &it.init.as_ref().unwrap().kind,
            ExprKind::Invoke(i) if i.method == "iterator" && i.owner == well_known::ITERABLE
        ));

        let Stmt::While(w) = &outer.stmts[1] else {
            panic!("expected driving loop");
        };
        assert!(matches!(
            &w.condition.kind,
            ExprKind::Invoke(i) if i.method == "hasNext"
        ));
        let Stmt::LocalVar(element) = &w.body.stmts[0] else {
            panic!("expected element binding");
        };
        assert_eq!(element.name, "item");
        assert!(matches!(
            &element.init.as_ref().unwrap().kind,
            ExprKind::Cast(inner)
                if matches!(&inner.kind, ExprKind::Invoke(i) if i.method == "next")
        ));
        assert_eq!(w.body.stmts[1], marker(1));
    }

    #[test]
    fn test_iterator_temp_avoids_source_locals() {
        let body = Block::new(vec![
            Stmt::LocalVar(LocalVar::new(
                "iterator",
                TypeRef::Class(well_known::OBJECT),
                None,
            )),
            Stmt::ForEach(ForEachStmt {
                var_name: "item".to_string(),
                var_ty: TypeRef::Class(well_known::OBJECT),
                iterable: Expr::local("items", TypeRef::Class(well_known::ITERABLE)),
                body: Block::default(),
                span: Span::synthetic(),
            }),
        ]);

        let body = run_body(body).unwrap();
        let Stmt::Block(outer) = &body.stmts[1] else {
            panic!("expected setup block");
        };
        let Stmt::LocalVar(it) = &outer.stmts[0] else {
            panic!("expected iterator acquisition");
        };
        assert_eq!(it.name, "iterator_2");
    }

    #[test]
    fn test_resources_close_in_reverse_order() {
        let resource = |name: &str| Resource {
            name: name.to_string(),
            ty: TypeRef::Class(well_known::AUTO_CLOSEABLE),
            init: Expr::null(),
            span: Span::synthetic(),
        };
        let body = Block::new(vec![Stmt::TryWithResources(TryResourcesStmt {
            resources: vec![resource("first"), resource("second")],
            body: Block::new(vec![marker(1)]),
            catches: Vec::new(),
            finally: None,
            span: Span::synthetic(),
        })]);

        let body = run_body(body).unwrap();
        let Stmt::Block(outer) = &body.stmts[0] else {
            panic!("expected scope block");
        };
        let Stmt::LocalVar(first) = &outer.stmts[0] else {
            panic!("expected first acquisition");
        };
        assert_eq!(first.name, "first");

        let Stmt::Try(outer_try) = &outer.stmts[1] else {
            panic!("expected outer guard");
        };
        let close_of = |block: &Block| {
            let [Stmt::Expr(call)] = block.stmts.as_slice() else {
                panic!("expected one close call");
            };
            let ExprKind::Invoke(invoke) = &call.kind else {
                panic!("expected close invoke");
            };
            assert_eq!(invoke.method, "close");
            let ExprKind::LocalRef(l) = &invoke.receiver.as_ref().unwrap().kind else {
                panic!("expected local receiver");
            };
            l.name.clone()
        };
        // Outer finally releases the first-acquired resource, so the inner,
        // later-acquired one has already closed by then.
        assert_eq!(close_of(outer_try.finally.as_ref().unwrap()), "first");

        let Stmt::LocalVar(second) = &outer_try.body.stmts[0] else {
            panic!("expected second acquisition");
        };
        assert_eq!(second.name, "second");
        let Stmt::Try(inner_try) = &outer_try.body.stmts[1] else {
            panic!("expected inner guard");
        };
        assert_eq!(close_of(inner_try.finally.as_ref().unwrap()), "second");
        assert_eq!(inner_try.body.stmts[0], marker(1));
    }

    #[test]
    fn test_multi_type_catch_dispatches_on_instance_of() {
        let t1 = BindingId(30);
        let t2 = BindingId(31);
        let body = Block::new(vec![Stmt::Try(TryStmt {
            body: Block::new(vec![marker(1)]),
            catches: vec![CatchClause {
                param: "e".to_string(),
                types: vec![t1, t2],
                body: Block::new(vec![marker(2)]),
                span: Span::synthetic(),
            }],
            finally: None,
            span: Span::synthetic(),
        })]);

        let body = run_body(body).unwrap();
        let Stmt::Try(t) = &body.stmts[0] else {
            panic!("expected try");
        };
        let catch = &t.catches[0];
        assert_eq!(catch.types, vec![well_known::THROWABLE]);

        let Stmt::If(dispatch) = &catch.body.stmts[0] else {
            panic!("expected dispatch");
        };
        let ExprKind::Binary(or) = &dispatch.condition.kind else {
            panic!("expected or-chain");
        };
        assert!(matches!(
            &or.lhs.kind,
            ExprKind::InstanceOf(i) if i.tested == t1
        ));
        assert!(matches!(
            &or.rhs.kind,
            ExprKind::InstanceOf(i) if i.tested == t2
        ));
        assert_eq!(dispatch.then_branch.stmts[0], marker(2));
        let rethrow = &dispatch.else_branch.as_ref().unwrap().stmts[0];
        assert!(matches!(rethrow, Stmt::Throw(t) if matches!(
            &t.value.kind,
            ExprKind::LocalRef(l) if l.name == "e"
        )));
    }

    #[test]
    fn test_string_switch_maps_to_index_switch() {
        let case = |test: Option<Expr>, n: i64| SwitchCase {
            test,
            body: vec![marker(n)],
            span: Span::synthetic(),
        };
        let body = Block::new(vec![Stmt::Switch(SwitchStmt {
            discriminant: Expr::local("s", TypeRef::Class(well_known::STRING)),
            cases: vec![
                case(Some(Expr::string("alpha")), 1),
                case(None, 2),
                case(Some(Expr::string("beta")), 3),
            ],
            span: Span::synthetic(),
        })]);

        let body = run_body(body).unwrap();
        let Stmt::Block(outer) = &body.stmts[0] else {
            panic!("expected expansion block");
        };
        let Stmt::LocalVar(subject) = &outer.stmts[0] else {
            panic!("expected subject binding");
        };
        assert_eq!(subject.name, "switchExpr");
        let Stmt::LocalVar(index) = &outer.stmts[1] else {
            panic!("expected index binding");
        };
        assert_eq!(index.name, "switchIndex");

        // equals("alpha") selects 0, else equals("beta") selects 1.
        let Stmt::If(first) = &outer.stmts[2] else {
            panic!("expected equals chain");
        };
        assert!(matches!(
            &first.condition.kind,
            ExprKind::Invoke(i) if i.method == "equals" && i.owner == well_known::STRING
        ));
        let chained = &first.else_branch.as_ref().unwrap().stmts[0];
        assert!(matches!(chained, Stmt::If(_)));

        let Stmt::Switch(switch) = &outer.stmts[3] else {
            panic!("expected index switch");
        };
        assert!(matches!(
            &switch.discriminant.kind,
            ExprKind::LocalRef(l) if l.name == "switchIndex"
        ));
        let tests: Vec<Option<i64>> = switch
            .cases
            .iter()
            .map(|c| {
                c.test.as_ref().map(|t| match &t.kind {
                    ExprKind::Literal(crosslate_ast::Literal::Int(n)) => *n,
                    other => panic!("expected int test, got {other:?}"),
                })
            })
            .collect();
        // Default stays in position; fallthrough structure is untouched.
        assert_eq!(tests, vec![Some(0), None, Some(1)]);
        assert_eq!(switch.cases[0].body[0], marker(1));
        assert_eq!(switch.cases[2].body[0], marker(3));
    }

    #[test]
    fn test_enum_switch_switches_on_ordinal() {
        let enum_binding = BindingId(40);
        let constant = |name: &str, ordinal: u32| {
            Expr::new(
                ExprKind::EnumConstant(EnumConstant {
                    enum_ty: enum_binding,
                    name: name.to_string(),
                    ordinal,
                }),
                TypeRef::Class(enum_binding),
                Span::synthetic(),
            )
        };
        let body = Block::new(vec![Stmt::Switch(SwitchStmt {
            discriminant: Expr::local("color", TypeRef::Class(enum_binding)),
            cases: vec![
                SwitchCase {
                    test: Some(constant("RED", 0)),
                    body: vec![marker(1)],
                    span: Span::synthetic(),
                },
                SwitchCase {
                    test: Some(constant("BLUE", 2)),
                    body: vec![marker(2)],
                    span: Span::synthetic(),
                },
            ],
            span: Span::synthetic(),
        })]);

        let body = run_body(body).unwrap();
        let Stmt::Switch(switch) = &body.stmts[0] else {
            panic!("expected switch");
        };
        assert!(matches!(
            &switch.discriminant.kind,
            ExprKind::Invoke(i) if i.method == "ordinal" && i.owner == enum_binding
        ));
        assert!(matches!(
            &switch.cases[0].test.as_ref().unwrap().kind,
            ExprKind::Literal(crosslate_ast::Literal::Int(0))
        ));
        assert!(matches!(
            &switch.cases[1].test.as_ref().unwrap().kind,
            ExprKind::Literal(crosslate_ast::Literal::Int(2))
        ));
    }

    #[test]
    fn test_switch_on_plain_reference_is_rejected() {
        let body = Block::new(vec![Stmt::Switch(SwitchStmt {
            discriminant: Expr::local("o", TypeRef::Class(well_known::OBJECT)),
            cases: Vec::new(),
            span: Span::new(10, 20),
        })]);
        let err = run_body(body).unwrap_err();
        assert!(matches!(
            err,
            TranslateError::UnsupportedConstruct {
                construct: "switch on a reference discriminant",
                ..
            }
        ));
    }

    #[test]
    fn test_deep_labeled_break_is_carried_on_a_flag() {
        let inner = Stmt::While(WhileStmt {
            condition: Expr::local("d", BOOLEAN),
            body: Block::new(vec![Stmt::Break(BreakStmt {
                label: Some("outer".to_string()),
                span: Span::synthetic(),
            })]),
            span: Span::synthetic(),
        });
        let body = Block::new(vec![Stmt::Labeled(LabeledStmt {
            label: "outer".to_string(),
            body: Box::new(Stmt::While(WhileStmt {
                condition: Expr::local("c", BOOLEAN),
                body: Block::new(vec![inner, marker(9)]),
                span: Span::synthetic(),
            })),
            span: Span::synthetic(),
        })]);

        let body = run_body(body).unwrap();
        let Stmt::LocalVar(flag) = &body.stmts[0] else {
            panic!("expected jump flag");
        };
        assert_eq!(flag.name, "break_outer");
        assert_eq!(flag.ty, BOOLEAN);

        let Stmt::While(outer) = &body.stmts[1] else {
            panic!("expected unlabeled loop");
        };
        let Stmt::While(inner) = &outer.body.stmts[0] else {
            panic!("expected inner loop");
        };
        // Deep jump sets the flag and breaks the inner loop.
        assert!(matches!(
            &inner.body.stmts[0],
            Stmt::Expr(e) if matches!(e.kind, ExprKind::Assign(_))
        ));
        assert!(matches!(
            &inner.body.stmts[1],
            Stmt::Break(BreakStmt { label: None, .. })
        ));
        // The guard right after the inner loop carries the break outward,
        // ahead of the trailing statement.
        let Stmt::If(guard) = &outer.body.stmts[1] else {
            panic!("expected propagation guard");
        };
        assert!(matches!(
            &guard.condition.kind,
            ExprKind::LocalRef(l) if l.name == "break_outer"
        ));
        assert!(matches!(
            &guard.then_branch.stmts[0],
            Stmt::Break(BreakStmt { label: None, .. })
        ));
        assert_eq!(outer.body.stmts[2], marker(9));
    }

    #[test]
    fn test_shallow_labeled_jumps_need_no_flags() {
        let body = Block::new(vec![Stmt::Labeled(LabeledStmt {
            label: "outer".to_string(),
            body: Box::new(Stmt::While(WhileStmt {
                condition: Expr::local("c", BOOLEAN),
                body: Block::new(vec![Stmt::If(IfStmt {
                    condition: Expr::local("x", BOOLEAN),
                    then_branch: Block::new(vec![Stmt::Continue(ContinueStmt {
                        label: Some("outer".to_string()),
                        span: Span::synthetic(),
                    })]),
                    else_branch: None,
                    span: Span::synthetic(),
                })]),
                span: Span::synthetic(),
            })),
            span: Span::synthetic(),
        })]);

        let body = run_body(body).unwrap();
        assert_eq!(body.stmts.len(), 1, "no flag declarations");
        let Stmt::While(w) = &body.stmts[0] else {
            panic!("expected unlabeled loop");
        };
        let Stmt::If(guard) = &w.body.stmts[0] else {
            panic!("expected original if");
        };
        assert!(matches!(
            &guard.then_branch.stmts[0],
            Stmt::Continue(ContinueStmt { label: None, .. })
        ));
    }

    #[test]
    fn test_synchronized_is_rejected() {
        let body = Block::new(vec![Stmt::Synchronized(SynchronizedStmt {
            monitor: Expr::local("lock", TypeRef::Class(well_known::OBJECT)),
            body: Block::default(),
            span: Span::new(5, 30),
        })]);
        let err = run_body(body).unwrap_err();
        assert!(matches!(
            err,
            TranslateError::UnsupportedConstruct {
                construct: "synchronized statement",
                span,
            } if span == Span::new(5, 30)
        ));
    }
}
