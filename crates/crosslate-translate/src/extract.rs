//! Inner/anonymous class extraction
//!
//! Hoists every nested, local, and anonymous type declaration to top level.
//! The hoisted class gets a synthesized field and constructor parameter for
//! the implicit enclosing instance (when referenced) and for each captured
//! local, in first-use order; references inside the body are rewritten to
//! field reads and creation sites are rewritten to thread the captured
//! values. A member owned by a more distant enclosing type is reached by
//! chaining the enclosing-instance fields level by level. Extraction runs
//! innermost-first so inner captures are already field accesses by the time
//! the enclosing declaration is processed.
//!
//! Captured locals must be effectively final: by-value capture fields cannot
//! reproduce the sharing semantics of a mutable captured local.

use crate::context::{CaptureEntry, CaptureRecord, CapturedEntity, CompilerContext};
use crate::error::{TranslateError, TranslateResult};
use crosslate_ast::{
    Block, CompilationUnit, Constructor, CtorTarget, DeclKind, Expr, ExprKind, Field, Member,
    Nesting, Param, Span, Stmt, TypeDeclId,
};
use crosslate_types::{BindingId, ExtractionState, TypeKind, TypeRef};
use rustc_hash::{FxHashMap, FxHashSet};

/// Name of the synthesized enclosing-instance field and parameter
const OUTER_FIELD: &str = "outer$";

fn capture_field_name(local: &str) -> String {
    format!("val${local}")
}

pub struct InnerClassExtractor<'a> {
    ctx: &'a CompilerContext,
}

impl<'a> InnerClassExtractor<'a> {
    pub fn new(ctx: &'a CompilerContext) -> Self {
        InnerClassExtractor { ctx }
    }

    /// Hoist every nested declaration in the unit
    pub fn run(&self, unit: &mut CompilationUnit) -> TranslateResult<()> {
        let mut nested: Vec<(TypeDeclId, usize)> = unit
            .live_ids()
            .into_iter()
            .filter(|id| unit.decl(*id).nesting.owner().is_some())
            .map(|id| (id, nesting_depth(unit, id)))
            .collect();
        // Innermost first; ties broken by declaration order for determinism.
        nested.sort_by(|a, b| b.1.cmp(&a.1).then(a.0 .0.cmp(&b.0 .0)));

        let mut anon_counters: FxHashMap<TypeDeclId, u32> = FxHashMap::default();
        // Levels an inner extraction hopped past when chaining enclosing
        // instances; they must capture their own outer even if their members
        // never touch it. Filled innermost-first, so always before use.
        let mut forced_outer: FxHashSet<TypeDeclId> = FxHashSet::default();
        for (id, _) in nested {
            self.extract_one(unit, id, &mut anon_counters, &mut forced_outer)?;
        }

        debug_assert!(
            unit.live_ids()
                .iter()
                .all(|id| unit.decl(*id).nesting == Nesting::TopLevel),
            "declaration still nested after extraction"
        );
        Ok(())
    }

    fn extract_one(
        &self,
        unit: &mut CompilationUnit,
        id: TypeDeclId,
        anon_counters: &mut FxHashMap<TypeDeclId, u32>,
        forced_outer: &mut FxHashSet<TypeDeclId>,
    ) -> TranslateResult<()> {
        let decl = unit.decl(id);
        let owner_id = decl.nesting.owner().expect("nested declaration has an owner");
        let self_binding = decl.binding;
        let owner_binding = unit.decl(owner_id).binding;
        let owner_name = unit.decl(owner_id).name.clone();

        // Enclosing instances from the immediate owner outward; an implicit
        // member access may belong to any level of this chain.
        let mut enclosing: Vec<(TypeDeclId, BindingId)> = Vec::new();
        let mut walk = Some(owner_id);
        while let Some(o) = walk {
            enclosing.push((o, unit.decl(o).binding));
            walk = unit.decl(o).nesting.owner();
        }
        let nested_name = decl.name.clone();
        let is_anonymous = matches!(decl.nesting, Nesting::Anonymous { .. });
        let decl_kind = decl.kind;

        // Collect what the body reaches for in enclosing scopes.
        let mut members = std::mem::take(&mut unit.decl_mut(id).members);
        let mut collector = CaptureCollector {
            extractor: self,
            self_binding,
            scopes: Vec::new(),
            locals: Vec::new(),
            uses_outer: false,
        };
        for member in &members {
            collector.collect_member(member)?;
        }
        let locals = collector.locals;
        let uses_outer = collector.uses_outer || forced_outer.contains(&id);

        // Synthesize the capture state.
        let mut entries = Vec::new();
        let mut synthesized_fields = Vec::new();
        if uses_outer {
            entries.push(CaptureEntry {
                entity: CapturedEntity::OuterInstance,
                field: OUTER_FIELD.to_string(),
                param_index: 0,
            });
            let mut field = Field::new(OUTER_FIELD, TypeRef::Class(owner_binding));
            field.is_final = true;
            field.synthetic = true;
            synthesized_fields.push(field);
        }
        for (i, (name, ty)) in locals.iter().enumerate() {
            let field_name = capture_field_name(name);
            entries.push(CaptureEntry {
                entity: CapturedEntity::Local {
                    name: name.clone(),
                    ty: ty.clone(),
                },
                field: field_name.clone(),
                param_index: if uses_outer { i + 1 } else { i },
            });
            let mut field = Field::new(field_name, ty.clone());
            field.is_final = true;
            field.synthetic = true;
            synthesized_fields.push(field);
        }

        // Rewrite captured references to field reads.
        let captured_names: FxHashSet<String> =
            locals.iter().map(|(name, _)| name.clone()).collect();
        let mut rewriter = CaptureRewriter {
            extractor: self,
            self_binding,
            enclosing: &enclosing,
            forced_outer,
            captured: &captured_names,
            scopes: Vec::new(),
        };
        for member in &mut members {
            rewriter.rewrite_member(member)?;
        }

        // Thread the captures through every constructor.
        let synth_params: Vec<Param> = entries
            .iter()
            .map(|entry| match &entry.entity {
                CapturedEntity::OuterInstance => {
                    Param::new(OUTER_FIELD, TypeRef::Class(owner_binding))
                }
                CapturedEntity::Local { name, ty } => {
                    Param::new(capture_field_name(name), ty.clone())
                }
            })
            .collect();
        if !members.iter().any(|m| matches!(m, Member::Constructor(_))) {
            let mut default_ctor = Constructor::new(Vec::new(), Block::default());
            default_ctor.synthetic = true;
            members.push(Member::Constructor(default_ctor));
        }
        for member in &mut members {
            if let Member::Constructor(ctor) = member {
                self.thread_captures(ctor, &synth_params, self_binding);
            }
        }
        for field in synthesized_fields.into_iter().rev() {
            members.insert(0, Member::Field(field));
        }
        unit.decl_mut(id).members = members;

        // New top-level identity; the old id stays behind a superseded link.
        let old_ty = unit.decl(id).type_id();
        let new_name = if is_anonymous {
            let counter = anon_counters.entry(owner_id).or_insert(0);
            *counter += 1;
            format!("{owner_name}_${counter}")
        } else {
            format!("{owner_name}_{nested_name}")
        };
        let kind = match decl_kind {
            DeclKind::Class => TypeKind::Class,
            DeclKind::Interface => TypeKind::Interface,
            DeclKind::Enum => TypeKind::Enum,
        };
        let registered_name;
        {
            let mut types = self.ctx.types_mut();
            let new_ty = types.synthesize(&new_name, kind);
            let old_desc = types.resolve(old_ty).clone();
            let new_desc = types.resolve_mut(new_ty);
            new_desc.superclass = old_desc.superclass;
            new_desc.capabilities = old_desc.capabilities;
            new_desc.extraction = ExtractionState::Extracted;
            registered_name = new_desc.name.clone();
            types.supersede(old_ty, new_ty);
            self.ctx
                .record_capture(new_ty, CaptureRecord { entries: entries.clone() });
            let decl = unit.decl_mut(id);
            decl.ty = Some(new_ty);
        }
        {
            let decl = unit.decl_mut(id);
            decl.name = registered_name;
            decl.nesting = Nesting::TopLevel;
        }
        unit.top_level.push(id);

        // Rewrite creation sites and drop the local declaration statements.
        let capture_args: Vec<Expr> = entries
            .iter()
            .map(|entry| match &entry.entity {
                CapturedEntity::OuterInstance => Expr::this(owner_binding),
                CapturedEntity::Local { name, ty } => Expr::local(name.clone(), ty.clone()),
            })
            .collect();
        let capture_tys: Vec<TypeRef> = capture_args.iter().map(|a| a.ty.clone()).collect();
        let all_ids: Vec<TypeDeclId> = unit.decl_ids().collect();
        for other in all_ids {
            let mut members = std::mem::take(&mut unit.decl_mut(other).members);
            for member in &mut members {
                rewrite_creation_sites(member, id, &capture_args, &capture_tys);
            }
            unit.decl_mut(other).members = members;
        }

        Ok(())
    }

    /// Prepend capture parameters and either forward them through a `this`
    /// delegation or assign the backing fields (after a leading `super` call).
    fn thread_captures(&self, ctor: &mut Constructor, synth_params: &[Param], self_binding: BindingId) {
        let mut params = synth_params.to_vec();
        params.append(&mut ctor.params);
        ctor.params = params;

        if let Some(Stmt::ConstructorCall(call)) = ctor.body.stmts.first_mut() {
            if call.target == CtorTarget::This {
                let mut forwarded: Vec<Expr> = synth_params
                    .iter()
                    .map(|p| Expr::local(p.name.clone(), p.ty.clone()))
                    .collect();
                forwarded.append(&mut call.args);
                call.args = forwarded;
                return;
            }
        }

        let assigns: Vec<Stmt> = synth_params
            .iter()
            .map(|p| {
                Stmt::Expr(Expr::assign(
                    Expr::own_field(p.name.clone(), self_binding, p.ty.clone()),
                    Expr::local(p.name.clone(), p.ty.clone()),
                ))
            })
            .collect();
        let at = match ctor.body.stmts.first() {
            Some(Stmt::ConstructorCall(_)) => 1,
            _ => 0,
        };
        ctor.body.stmts.splice(at..at, assigns);
    }

    /// Whether a member owned by `owner` is reachable through the nested
    /// class's own inheritance chain (as opposed to the enclosing instance).
    fn is_own_member(
        &self,
        self_binding: BindingId,
        owner: BindingId,
        span: Span,
    ) -> TranslateResult<bool> {
        if owner == self_binding {
            return Ok(true);
        }
        let types = self.ctx.types();
        let self_ty = types
            .resolve_binding(self_binding)
            .map_err(|e| TranslateError::from_type(e, span))?;
        let owner_ty = types
            .resolve_binding(owner)
            .map_err(|e| TranslateError::from_type(e, span))?;
        Ok(types.is_subtype(self_ty, owner_ty))
    }
}

fn nesting_depth(unit: &CompilationUnit, id: TypeDeclId) -> usize {
    let mut depth = 0;
    let mut owner = unit.decl(id).nesting.owner();
    while let Some(o) = owner {
        depth += 1;
        owner = unit.decl(o).nesting.owner();
    }
    depth
}

// ---------------------------------------------------------------------------
// Free-variable collection

struct CaptureCollector<'e, 'a> {
    extractor: &'e InnerClassExtractor<'a>,
    self_binding: BindingId,
    scopes: Vec<FxHashSet<String>>,
    /// Captured locals in first-use order
    locals: Vec<(String, TypeRef)>,
    uses_outer: bool,
}

impl CaptureCollector<'_, '_> {
    fn collect_member(&mut self, member: &Member) -> TranslateResult<()> {
        match member {
            Member::Field(f) => {
                if let Some(init) = &f.initializer {
                    self.scopes.push(FxHashSet::default());
                    self.expr(init)?;
                    self.scopes.pop();
                }
            }
            Member::Method(m) => {
                if let Some(body) = &m.body {
                    self.scopes
                        .push(m.params.iter().map(|p| p.name.clone()).collect());
                    self.block(body)?;
                    self.scopes.pop();
                }
            }
            Member::Constructor(c) => {
                self.scopes
                    .push(c.params.iter().map(|p| p.name.clone()).collect());
                self.block(&c.body)?;
                self.scopes.pop();
            }
            Member::InitBlock(b) => {
                self.scopes.push(FxHashSet::default());
                self.block(&b.body)?;
                self.scopes.pop();
            }
        }
        Ok(())
    }

    fn in_scope(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains(name))
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn block(&mut self, block: &Block) -> TranslateResult<()> {
        self.scopes.push(FxHashSet::default());
        for stmt in &block.stmts {
            self.stmt(stmt)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> TranslateResult<()> {
        match stmt {
            Stmt::Expr(e) | Stmt::Throw(crosslate_ast::ThrowStmt { value: e, .. }) => self.expr(e),
            Stmt::LocalVar(v) => {
                if let Some(init) = &v.init {
                    self.expr(init)?;
                }
                self.declare(&v.name);
                Ok(())
            }
            Stmt::If(s) => {
                self.expr(&s.condition)?;
                self.block(&s.then_branch)?;
                if let Some(e) = &s.else_branch {
                    self.block(e)?;
                }
                Ok(())
            }
            Stmt::While(s) => {
                self.expr(&s.condition)?;
                self.block(&s.body)
            }
            Stmt::DoWhile(s) => {
                self.block(&s.body)?;
                self.expr(&s.condition)
            }
            Stmt::For(s) => {
                self.scopes.push(FxHashSet::default());
                for init in &s.init {
                    self.stmt(init)?;
                }
                if let Some(cond) = &s.condition {
                    self.expr(cond)?;
                }
                for update in &s.update {
                    self.expr(update)?;
                }
                self.block(&s.body)?;
                self.scopes.pop();
                Ok(())
            }
            Stmt::ForEach(s) => {
                self.expr(&s.iterable)?;
                self.scopes.push(FxHashSet::default());
                self.declare(&s.var_name);
                self.block(&s.body)?;
                self.scopes.pop();
                Ok(())
            }
            Stmt::Switch(s) => {
                self.expr(&s.discriminant)?;
                for case in &s.cases {
                    if let Some(test) = &case.test {
                        self.expr(test)?;
                    }
                    self.scopes.push(FxHashSet::default());
                    for stmt in &case.body {
                        self.stmt(stmt)?;
                    }
                    self.scopes.pop();
                }
                Ok(())
            }
            Stmt::Try(s) => {
                self.block(&s.body)?;
                for catch in &s.catches {
                    self.scopes.push(FxHashSet::default());
                    self.declare(&catch.param);
                    self.block(&catch.body)?;
                    self.scopes.pop();
                }
                if let Some(f) = &s.finally {
                    self.block(f)?;
                }
                Ok(())
            }
            Stmt::TryWithResources(s) => {
                self.scopes.push(FxHashSet::default());
                for r in &s.resources {
                    self.expr(&r.init)?;
                    self.declare(&r.name);
                }
                self.block(&s.body)?;
                for catch in &s.catches {
                    self.scopes.push(FxHashSet::default());
                    self.declare(&catch.param);
                    self.block(&catch.body)?;
                    self.scopes.pop();
                }
                if let Some(f) = &s.finally {
                    self.block(f)?;
                }
                self.scopes.pop();
                Ok(())
            }
            Stmt::Labeled(s) => self.stmt(&s.body),
            Stmt::Block(b) => self.block(b),
            Stmt::Return(r) => {
                if let Some(v) = &r.value {
                    self.expr(v)?;
                }
                Ok(())
            }
            Stmt::ConstructorCall(c) => {
                for arg in &c.args {
                    self.expr(arg)?;
                }
                Ok(())
            }
            Stmt::Synchronized(s) => {
                self.expr(&s.monitor)?;
                self.block(&s.body)
            }
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::LocalClass(_) | Stmt::Empty(_) => Ok(()),
        }
    }

    fn expr(&mut self, expr: &Expr) -> TranslateResult<()> {
        match &expr.kind {
            ExprKind::LocalRef(local) => {
                if !self.in_scope(&local.name)
                    && !self.locals.iter().any(|(n, _)| n == &local.name)
                {
                    if !local.effectively_final {
                        return Err(TranslateError::NonEffectivelyFinalCapture {
                            name: local.name.clone(),
                            span: expr.span,
                        });
                    }
                    self.locals.push((local.name.clone(), expr.ty.clone()));
                }
                Ok(())
            }
            ExprKind::FieldAccess(access) => {
                if let Some(object) = &access.object {
                    self.expr(object)?;
                } else if !access.is_static
                    && !self
                        .extractor
                        .is_own_member(self.self_binding, access.owner, expr.span)?
                {
                    self.uses_outer = true;
                }
                Ok(())
            }
            ExprKind::Invoke(invoke) => {
                if let Some(receiver) = &invoke.receiver {
                    self.expr(receiver)?;
                } else if !invoke.is_static
                    && !self
                        .extractor
                        .is_own_member(self.self_binding, invoke.owner, expr.span)?
                {
                    self.uses_outer = true;
                }
                for arg in &invoke.args {
                    self.expr(arg)?;
                }
                Ok(())
            }
            ExprKind::SuperInvoke(s) => {
                for arg in &s.args {
                    self.expr(arg)?;
                }
                Ok(())
            }
            ExprKind::Assign(a) => {
                self.expr(&a.target)?;
                self.expr(&a.value)
            }
            ExprKind::New(n) => {
                for arg in &n.args {
                    self.expr(arg)?;
                }
                Ok(())
            }
            ExprKind::Box(inner) | ExprKind::Unbox(inner) | ExprKind::Cast(inner) => {
                self.expr(inner)
            }
            ExprKind::Binary(b) => {
                self.expr(&b.lhs)?;
                self.expr(&b.rhs)
            }
            ExprKind::Unary(u) => self.expr(&u.operand),
            ExprKind::InstanceOf(i) => self.expr(&i.value),
            ExprKind::ArrayGet(a) => {
                self.expr(&a.array)?;
                self.expr(&a.index)
            }
            ExprKind::Literal(_) | ExprKind::This | ExprKind::EnumConstant(_) => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Reference rewriting inside the hoisted body

struct CaptureRewriter<'e, 'a, 'n> {
    extractor: &'e InnerClassExtractor<'a>,
    self_binding: BindingId,
    /// Enclosing declarations from the immediate owner outward
    enclosing: &'n [(TypeDeclId, BindingId)],
    /// Levels hopped past while chaining enclosing reads; read back when
    /// those levels are extracted themselves
    forced_outer: &'n mut FxHashSet<TypeDeclId>,
    captured: &'n FxHashSet<String>,
    scopes: Vec<FxHashSet<String>>,
}

impl CaptureRewriter<'_, '_, '_> {
    fn rewrite_member(&mut self, member: &mut Member) -> TranslateResult<()> {
        match member {
            Member::Field(f) => {
                if let Some(init) = &mut f.initializer {
                    self.scopes.push(FxHashSet::default());
                    self.expr(init)?;
                    self.scopes.pop();
                }
            }
            Member::Method(m) => {
                let params: FxHashSet<String> =
                    m.params.iter().map(|p| p.name.clone()).collect();
                if let Some(body) = &mut m.body {
                    self.scopes.push(params);
                    self.block(body)?;
                    self.scopes.pop();
                }
            }
            Member::Constructor(c) => {
                self.scopes
                    .push(c.params.iter().map(|p| p.name.clone()).collect());
                self.block(&mut c.body)?;
                self.scopes.pop();
            }
            Member::InitBlock(b) => {
                self.scopes.push(FxHashSet::default());
                self.block(&mut b.body)?;
                self.scopes.pop();
            }
        }
        Ok(())
    }

    fn in_scope(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains(name))
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    /// Receiver for a member owned by an enclosing type: the chain of
    /// enclosing-instance reads ending at the declaring level. Every level
    /// hopped past must carry an `outer$` field of its own, so those levels
    /// are marked before their extraction runs.
    fn enclosing_read(&mut self, owner: BindingId, span: Span) -> TranslateResult<Expr> {
        let hops = self.hops_to(owner, span)?;
        let mut read = Expr::own_field(
            OUTER_FIELD,
            self.self_binding,
            TypeRef::Class(self.enclosing[0].1),
        );
        for level in 1..=hops {
            self.forced_outer.insert(self.enclosing[level - 1].0);
            read = Expr::field_of(
                read,
                OUTER_FIELD,
                self.enclosing[level - 1].1,
                TypeRef::Class(self.enclosing[level].1),
            );
        }
        Ok(read)
    }

    fn hops_to(&self, owner: BindingId, span: Span) -> TranslateResult<usize> {
        for (level, (_, binding)) in self.enclosing.iter().enumerate() {
            if self.extractor.is_own_member(*binding, owner, span)? {
                return Ok(level);
            }
        }
        Err(TranslateError::internal(format!(
            "member owner {owner:?} missing from the enclosing chain"
        )))
    }

    fn block(&mut self, block: &mut Block) -> TranslateResult<()> {
        self.scopes.push(FxHashSet::default());
        for stmt in &mut block.stmts {
            self.stmt(stmt)?;
        }
        self.scopes.pop();
        Ok(())
    }

    fn stmt(&mut self, stmt: &mut Stmt) -> TranslateResult<()> {
        match stmt {
            Stmt::Expr(e) => self.expr(e),
            Stmt::Throw(t) => self.expr(&mut t.value),
            Stmt::LocalVar(v) => {
                if let Some(init) = &mut v.init {
                    self.expr(init)?;
                }
                let name = v.name.clone();
                self.declare(&name);
                Ok(())
            }
            Stmt::If(s) => {
                self.expr(&mut s.condition)?;
                self.block(&mut s.then_branch)?;
                if let Some(e) = &mut s.else_branch {
                    self.block(e)?;
                }
                Ok(())
            }
            Stmt::While(s) => {
                self.expr(&mut s.condition)?;
                self.block(&mut s.body)
            }
            Stmt::DoWhile(s) => {
                self.block(&mut s.body)?;
                self.expr(&mut s.condition)
            }
            Stmt::For(s) => {
                self.scopes.push(FxHashSet::default());
                for init in &mut s.init {
                    self.stmt(init)?;
                }
                if let Some(cond) = &mut s.condition {
                    self.expr(cond)?;
                }
                for update in &mut s.update {
                    self.expr(update)?;
                }
                self.block(&mut s.body)?;
                self.scopes.pop();
                Ok(())
            }
            Stmt::ForEach(s) => {
                self.expr(&mut s.iterable)?;
                self.scopes.push(FxHashSet::default());
                let name = s.var_name.clone();
                self.declare(&name);
                self.block(&mut s.body)?;
                self.scopes.pop();
                Ok(())
            }
            Stmt::Switch(s) => {
                self.expr(&mut s.discriminant)?;
                for case in &mut s.cases {
                    if let Some(test) = &mut case.test {
                        self.expr(test)?;
                    }
                    self.scopes.push(FxHashSet::default());
                    for stmt in &mut case.body {
                        self.stmt(stmt)?;
                    }
                    self.scopes.pop();
                }
                Ok(())
            }
            Stmt::Try(s) => {
                self.block(&mut s.body)?;
                for catch in &mut s.catches {
                    self.scopes.push(FxHashSet::default());
                    let name = catch.param.clone();
                    self.declare(&name);
                    self.block(&mut catch.body)?;
                    self.scopes.pop();
                }
                if let Some(f) = &mut s.finally {
                    self.block(f)?;
                }
                Ok(())
            }
            Stmt::TryWithResources(s) => {
                self.scopes.push(FxHashSet::default());
                for r in &mut s.resources {
                    self.expr(&mut r.init)?;
                    let name = r.name.clone();
                    self.declare(&name);
                }
                self.block(&mut s.body)?;
                for catch in &mut s.catches {
                    self.scopes.push(FxHashSet::default());
                    let name = catch.param.clone();
                    self.declare(&name);
                    self.block(&mut catch.body)?;
                    self.scopes.pop();
                }
                if let Some(f) = &mut s.finally {
                    self.block(f)?;
                }
                self.scopes.pop();
                Ok(())
            }
            Stmt::Labeled(s) => self.stmt(&mut s.body),
            Stmt::Block(b) => self.block(b),
            Stmt::Return(r) => {
                if let Some(v) = &mut r.value {
                    self.expr(v)?;
                }
                Ok(())
            }
            Stmt::ConstructorCall(c) => {
                for arg in &mut c.args {
                    self.expr(arg)?;
                }
                Ok(())
            }
            Stmt::Synchronized(s) => {
                self.expr(&mut s.monitor)?;
                self.block(&mut s.body)
            }
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::LocalClass(_) | Stmt::Empty(_) => Ok(()),
        }
    }

    fn expr(&mut self, expr: &mut Expr) -> TranslateResult<()> {
        match &mut expr.kind {
            ExprKind::LocalRef(local) => {
                if self.captured.contains(&local.name) && !self.in_scope(&local.name) {
                    let field = capture_field_name(&local.name);
                    expr.kind = ExprKind::FieldAccess(crosslate_ast::FieldAccess {
                        object: None,
                        field,
                        owner: self.self_binding,
                        is_static: false,
                    });
                }
                Ok(())
            }
            ExprKind::FieldAccess(access) => {
                if let Some(object) = &mut access.object {
                    self.expr(object)?;
                } else if !access.is_static
                    && !self
                        .extractor
                        .is_own_member(self.self_binding, access.owner, expr.span)?
                {
                    let read = self.enclosing_read(access.owner, expr.span)?;
                    access.object = Some(Box::new(read));
                }
                Ok(())
            }
            ExprKind::Invoke(invoke) => {
                if let Some(receiver) = &mut invoke.receiver {
                    self.expr(receiver)?;
                } else if !invoke.is_static
                    && !self
                        .extractor
                        .is_own_member(self.self_binding, invoke.owner, expr.span)?
                {
                    let read = self.enclosing_read(invoke.owner, expr.span)?;
                    invoke.receiver = Some(Box::new(read));
                }
                for arg in &mut invoke.args {
                    self.expr(arg)?;
                }
                Ok(())
            }
            ExprKind::SuperInvoke(s) => {
                for arg in &mut s.args {
                    self.expr(arg)?;
                }
                Ok(())
            }
            ExprKind::Assign(a) => {
                self.expr(&mut a.target)?;
                self.expr(&mut a.value)
            }
            ExprKind::New(n) => {
                for arg in &mut n.args {
                    self.expr(arg)?;
                }
                Ok(())
            }
            ExprKind::Box(inner) | ExprKind::Unbox(inner) | ExprKind::Cast(inner) => {
                self.expr(inner)
            }
            ExprKind::Binary(b) => {
                self.expr(&mut b.lhs)?;
                self.expr(&mut b.rhs)
            }
            ExprKind::Unary(u) => self.expr(&mut u.operand),
            ExprKind::InstanceOf(i) => self.expr(&mut i.value),
            ExprKind::ArrayGet(a) => {
                self.expr(&mut a.array)?;
                self.expr(&mut a.index)
            }
            ExprKind::Literal(_) | ExprKind::This | ExprKind::EnumConstant(_) => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Creation-site rewriting

fn rewrite_creation_sites(
    member: &mut Member,
    target: TypeDeclId,
    capture_args: &[Expr],
    capture_tys: &[TypeRef],
) {
    match member {
        Member::Field(f) => {
            if let Some(init) = &mut f.initializer {
                creation_expr(init, target, capture_args, capture_tys);
            }
        }
        Member::Method(m) => {
            if let Some(body) = &mut m.body {
                creation_block(body, target, capture_args, capture_tys);
            }
        }
        Member::Constructor(c) => creation_block(&mut c.body, target, capture_args, capture_tys),
        Member::InitBlock(b) => creation_block(&mut b.body, target, capture_args, capture_tys),
    }
}

fn creation_block(block: &mut Block, target: TypeDeclId, args: &[Expr], tys: &[TypeRef]) {
    block.stmts.retain(|stmt| {
        !matches!(stmt, Stmt::LocalClass(lc) if lc.decl == target)
    });
    for stmt in &mut block.stmts {
        creation_stmt(stmt, target, args, tys);
    }
}

fn creation_stmt(stmt: &mut Stmt, target: TypeDeclId, args: &[Expr], tys: &[TypeRef]) {
    match stmt {
        Stmt::Expr(e) => creation_expr(e, target, args, tys),
        Stmt::Throw(t) => creation_expr(&mut t.value, target, args, tys),
        Stmt::LocalVar(v) => {
            if let Some(init) = &mut v.init {
                creation_expr(init, target, args, tys);
            }
        }
        Stmt::If(s) => {
            creation_expr(&mut s.condition, target, args, tys);
            creation_block(&mut s.then_branch, target, args, tys);
            if let Some(e) = &mut s.else_branch {
                creation_block(e, target, args, tys);
            }
        }
        Stmt::While(s) => {
            creation_expr(&mut s.condition, target, args, tys);
            creation_block(&mut s.body, target, args, tys);
        }
        Stmt::DoWhile(s) => {
            creation_block(&mut s.body, target, args, tys);
            creation_expr(&mut s.condition, target, args, tys);
        }
        Stmt::For(s) => {
            for init in &mut s.init {
                creation_stmt(init, target, args, tys);
            }
            if let Some(cond) = &mut s.condition {
                creation_expr(cond, target, args, tys);
            }
            for update in &mut s.update {
                creation_expr(update, target, args, tys);
            }
            creation_block(&mut s.body, target, args, tys);
        }
        Stmt::ForEach(s) => {
            creation_expr(&mut s.iterable, target, args, tys);
            creation_block(&mut s.body, target, args, tys);
        }
        Stmt::Switch(s) => {
            creation_expr(&mut s.discriminant, target, args, tys);
            for case in &mut s.cases {
                if let Some(test) = &mut case.test {
                    creation_expr(test, target, args, tys);
                }
                for stmt in &mut case.body {
                    creation_stmt(stmt, target, args, tys);
                }
            }
        }
        Stmt::Try(s) => {
            creation_block(&mut s.body, target, args, tys);
            for catch in &mut s.catches {
                creation_block(&mut catch.body, target, args, tys);
            }
            if let Some(f) = &mut s.finally {
                creation_block(f, target, args, tys);
            }
        }
        Stmt::TryWithResources(s) => {
            for r in &mut s.resources {
                creation_expr(&mut r.init, target, args, tys);
            }
            creation_block(&mut s.body, target, args, tys);
            for catch in &mut s.catches {
                creation_block(&mut catch.body, target, args, tys);
            }
            if let Some(f) = &mut s.finally {
                creation_block(f, target, args, tys);
            }
        }
        Stmt::Labeled(s) => creation_stmt(&mut s.body, target, args, tys),
        Stmt::Block(b) => creation_block(b, target, args, tys),
        Stmt::Return(r) => {
            if let Some(v) = &mut r.value {
                creation_expr(v, target, args, tys);
            }
        }
        Stmt::ConstructorCall(c) => {
            for arg in &mut c.args {
                creation_expr(arg, target, args, tys);
            }
        }
        Stmt::Synchronized(s) => {
            creation_expr(&mut s.monitor, target, args, tys);
            creation_block(&mut s.body, target, args, tys);
        }
        Stmt::Break(_) | Stmt::Continue(_) | Stmt::LocalClass(_) | Stmt::Empty(_) => {}
    }
}

fn creation_expr(expr: &mut Expr, target: TypeDeclId, capture_args: &[Expr], capture_tys: &[TypeRef]) {
    // Children first, so nested creations inside arguments are covered.
    match &mut expr.kind {
        ExprKind::New(n) => {
            for arg in &mut n.args {
                creation_expr(arg, target, capture_args, capture_tys);
            }
            if n.decl == Some(target) {
                let mut args = capture_args.to_vec();
                args.append(&mut n.args);
                n.args = args;
                let mut tys = capture_tys.to_vec();
                tys.append(&mut n.param_tys);
                n.param_tys = tys;
            }
        }
        ExprKind::FieldAccess(access) => {
            if let Some(object) = &mut access.object {
                creation_expr(object, target, capture_args, capture_tys);
            }
        }
        ExprKind::Invoke(invoke) => {
            if let Some(receiver) = &mut invoke.receiver {
                creation_expr(receiver, target, capture_args, capture_tys);
            }
            for arg in &mut invoke.args {
                creation_expr(arg, target, capture_args, capture_tys);
            }
        }
        ExprKind::SuperInvoke(s) => {
            for arg in &mut s.args {
                creation_expr(arg, target, capture_args, capture_tys);
            }
        }
        ExprKind::Assign(a) => {
            creation_expr(&mut a.target, target, capture_args, capture_tys);
            creation_expr(&mut a.value, target, capture_args, capture_tys);
        }
        ExprKind::Box(inner) | ExprKind::Unbox(inner) | ExprKind::Cast(inner) => {
            creation_expr(inner, target, capture_args, capture_tys);
        }
        ExprKind::Binary(b) => {
            creation_expr(&mut b.lhs, target, capture_args, capture_tys);
            creation_expr(&mut b.rhs, target, capture_args, capture_tys);
        }
        ExprKind::Unary(u) => creation_expr(&mut u.operand, target, capture_args, capture_tys),
        ExprKind::InstanceOf(i) => creation_expr(&mut i.value, target, capture_args, capture_tys),
        ExprKind::ArrayGet(a) => {
            creation_expr(&mut a.array, target, capture_args, capture_tys);
            creation_expr(&mut a.index, target, capture_args, capture_tys);
        }
        ExprKind::Literal(_)
        | ExprKind::LocalRef(_)
        | ExprKind::This
        | ExprKind::EnumConstant(_) => {}
    }
}
