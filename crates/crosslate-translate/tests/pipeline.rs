//! End-to-end pipeline runs over small programs

use crosslate_ast::{
    Block, CompilationUnit, DeclKind, Expr, ExprKind, Field, ForEachStmt, Invoke, LocalVar,
    Member, Method, Nesting, New, Param, Program, Span, Stmt, TypeDecl, TypeDeclId,
};
use crosslate_translate::destructor::CYCLE_WARNING;
use crosslate_translate::name_table::member_signature;
use crosslate_translate::{DeadCodeMap, Pipeline, PipelineOptions, UnitState};
use crosslate_types::{well_known, BindingId, PrimitiveKind, TypeRef};

const INT: TypeRef = TypeRef::Primitive(PrimitiveKind::Int);

fn user_binding(offset: u32) -> BindingId {
    BindingId(well_known::FIRST_USER + offset)
}

/// A class with a field initializer, a for-each method, and an anonymous
/// inner class capturing a local plus the enclosing instance.
fn task_unit() -> (CompilationUnit, TypeDeclId, TypeDeclId) {
    let task_binding = user_binding(0);
    let runner_binding = user_binding(1);
    let mut unit = CompilationUnit::new("Task.src");

    let mut task = TypeDecl::new("Task", task_binding, DeclKind::Class);
    task.members.push(Member::Field(
        Field::new("name", TypeRef::Class(well_known::STRING))
            .with_initializer(Expr::string("untitled")),
    ));
    let task_id = unit.alloc(task);

    let mut runner = TypeDecl::new("", runner_binding, DeclKind::Class);
    runner.nesting = Nesting::Anonymous { owner: task_id };
    runner.members.push(Member::Method(Method::new(
        "run",
        Vec::new(),
        TypeRef::Void,
        Block::new(vec![Stmt::Expr(Expr::new(
            ExprKind::Invoke(Invoke {
                receiver: None,
                method: "ping".to_string(),
                owner: task_binding,
                args: vec![Expr::local("x", INT)],
                param_tys: vec![INT],
                is_static: false,
            }),
            TypeRef::Void,
            Span::synthetic(),
        ))]),
    )));
    let runner_id = unit.alloc(runner);

    let task = unit.decl_mut(task_id);
    task.members.push(Member::Method(Method::new(
        "ping",
        vec![Param::new("n", INT)],
        TypeRef::Void,
        Block::default(),
    )));
    task.members.push(Member::Method(Method::new(
        "go",
        Vec::new(),
        TypeRef::Void,
        Block::new(vec![
            Stmt::LocalVar(LocalVar::new("x", INT, Some(Expr::int(5)))),
            Stmt::LocalVar(LocalVar::new(
                "r",
                TypeRef::Class(runner_binding),
                Some(Expr::new(
                    ExprKind::New(New {
                        class: runner_binding,
                        args: Vec::new(),
                        param_tys: Vec::new(),
                        decl: Some(runner_id),
                    }),
                    TypeRef::Class(runner_binding),
                    Span::synthetic(),
                )),
            )),
        ]),
    )));
    task.members.push(Member::Method(Method::new(
        "each",
        vec![Param::new("items", TypeRef::Class(well_known::ITERABLE))],
        TypeRef::Void,
        Block::new(vec![Stmt::ForEach(ForEachStmt {
            var_name: "item".to_string(),
            var_ty: TypeRef::Class(well_known::OBJECT),
            iterable: Expr::local("items", TypeRef::Class(well_known::ITERABLE)),
            body: Block::default(),
            span: Span::synthetic(),
        })]),
    )));

    (unit, task_id, runner_id)
}

#[test]
fn test_full_run_rewrites_every_sugar_form() {
    let (unit, task_id, runner_id) = task_unit();
    let translation = Pipeline::new(PipelineOptions::new())
        .run(Program::new(vec![unit]))
        .unwrap();
    assert!(translation.succeeded());
    assert_eq!(translation.reports[0].state, UnitState::ReadyForEmit);

    let unit = &translation.program.units[0];

    // The anonymous class was hoisted flat with its captures.
    let runner = unit.decl(runner_id);
    assert_eq!(runner.nesting, Nesting::TopLevel);
    assert_eq!(runner.name, "Task_$1");
    let record = translation.context.capture_of(runner.type_id()).unwrap();
    assert!(record.captures_outer());
    assert_eq!(record.entries.len(), 2);

    // The hoisted class owns its enclosing instance and releases it on
    // teardown; the captured int is not released.
    assert_eq!(
        translation.context.release_set_of(runner.type_id()).unwrap(),
        vec!["outer$".to_string()]
    );

    let task = unit.decl(task_id);

    // The field initializer moved into a synthesized constructor.
    assert!(task.fields().all(|f| f.initializer.is_none()));
    let ctor = task.constructors().next().unwrap();
    assert!(ctor.synthetic);
    assert!(matches!(
        &ctor.body.stmts[0],
        Stmt::Expr(e) if matches!(&e.kind, ExprKind::Assign(_))
    ));

    // The for-each became the iterator protocol.
    let each = task.find_method("each").unwrap();
    let body = each.body.as_ref().unwrap();
    let Stmt::Block(lowered) = &body.stmts[0] else {
        panic!("expected lowered for-each, got {:?}", body.stmts[0]);
    };
    assert!(matches!(&lowered.stmts[0], Stmt::LocalVar(v) if v.name == "iterator"));
    assert!(matches!(&lowered.stmts[1], Stmt::While(_)));

    // Teardown was synthesized for the owned field.
    let dealloc = task.find_method("dealloc").unwrap();
    assert!(dealloc.synthetic);
    assert_eq!(
        translation.context.release_set_of(task.type_id()).unwrap(),
        vec!["name".to_string()]
    );

    // Selector assignment landed the constructor on its reserved name and
    // spread the parameterized method.
    let types = translation.context.types();
    let names = translation.context.names();
    let ctor_sig = member_signature(&Member::Constructor(ctor.clone()), &types)
        .unwrap()
        .unwrap();
    assert_eq!(names.selector(task.type_id(), &ctor_sig), Some("init"));
    let each_sig = member_signature(&Member::Method(each.clone()), &types)
        .unwrap()
        .unwrap();
    assert_eq!(
        names.selector(task.type_id(), &each_sig),
        Some("eachWithIterable")
    );
}

#[test]
fn test_strong_cycle_across_units_is_reported_once() {
    let mut left_unit = CompilationUnit::new("Left.src");
    let mut left = TypeDecl::new("Left", user_binding(0), DeclKind::Class);
    left.members.push(Member::Field(Field::new(
        "right",
        TypeRef::Class(user_binding(1)),
    )));
    left_unit.alloc(left);

    let mut right_unit = CompilationUnit::new("Right.src");
    let mut right = TypeDecl::new("Right", user_binding(1), DeclKind::Class);
    right.members.push(Member::Field(Field::new(
        "left",
        TypeRef::Class(user_binding(0)),
    )));
    right_unit.alloc(right);

    let translation = Pipeline::new(PipelineOptions::new())
        .run(Program::new(vec![left_unit, right_unit]))
        .unwrap();
    assert!(translation.succeeded());

    let warnings = translation.context.sink().warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, Some(CYCLE_WARNING));
    assert!(warnings[0].message.contains("Left"));
    assert!(warnings[0].message.contains("Right"));
}

#[test]
fn test_dead_code_map_strips_before_other_passes() {
    let mut unit = CompilationUnit::new("Mixed.src");
    let mut legacy = TypeDecl::new("LegacyAdapter", user_binding(0), DeclKind::Class);
    legacy.members.push(Member::Field(Field::new(
        "peer",
        TypeRef::Class(user_binding(1)),
    )));
    let legacy_id = unit.alloc(legacy);
    let mut keep = TypeDecl::new("Keep", user_binding(1), DeclKind::Class);
    // Mutual references; with the legacy side stripped there is no cycle
    // left to warn about.
    keep.members.push(Member::Field(Field::new(
        "peer",
        TypeRef::Class(user_binding(0)),
    )));
    let keep_id = unit.alloc(keep);

    let options = PipelineOptions {
        dead_code: DeadCodeMap::parse("Legacy*").unwrap(),
        ..PipelineOptions::new()
    };
    let translation = Pipeline::new(options)
        .run(Program::new(vec![unit]))
        .unwrap();
    assert!(translation.succeeded());

    let unit = &translation.program.units[0];
    assert!(unit.decl(legacy_id).stripped);
    assert_eq!(unit.live_ids(), vec![keep_id]);

    // No teardown or warnings for the stripped side.
    assert!(translation
        .context
        .release_set_of(unit.decl(legacy_id).type_id())
        .is_none());
    assert!(translation.context.sink().warnings().is_empty());
}

#[test]
fn test_reports_keep_unit_order() {
    let units: Vec<CompilationUnit> = (0..8)
        .map(|i| {
            let mut unit = CompilationUnit::new(format!("U{i}.src"));
            unit.alloc(TypeDecl::new(
                format!("C{i}"),
                user_binding(i),
                DeclKind::Class,
            ));
            unit
        })
        .collect();

    let translation = Pipeline::new(PipelineOptions::new())
        .run(Program::new(units))
        .unwrap();
    assert!(translation.succeeded());
    for (i, report) in translation.reports.iter().enumerate() {
        assert_eq!(report.file, format!("U{i}.src"));
        assert_eq!(report.state, UnitState::ReadyForEmit);
    }
}
