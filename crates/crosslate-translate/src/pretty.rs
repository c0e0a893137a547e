//! Pretty-printing for the rewritten program
//!
//! Produces a human-readable dump for debugging pass output. Class bindings
//! render through the type table so superseded identities show their current
//! emitted name; output is deterministic for a given program and table.

use crosslate_ast::{
    Binary, BinaryOp, Block, CompilationUnit, CtorTarget, DeclKind, Expr, ExprKind, Literal,
    Member, Ownership, Param, Program, Stmt, TypeDecl, UnaryOp,
};
use crosslate_types::{BindingId, TypeRef, TypeTable};
use std::fmt::Write;

pub fn pretty_program(program: &Program, types: &TypeTable) -> String {
    let mut out = String::new();
    for unit in &program.units {
        out.push_str(&pretty_unit(unit, types));
    }
    out
}

pub fn pretty_unit(unit: &CompilationUnit, types: &TypeTable) -> String {
    let mut p = Printer {
        types,
        out: String::new(),
        indent: 0,
    };
    writeln!(p.out, "unit {}", unit.file).unwrap();
    for id in unit.live_ids() {
        p.indent = 1;
        p.decl(unit.decl(id));
    }
    p.out
}

struct Printer<'a> {
    types: &'a TypeTable,
    out: String,
    indent: usize,
}

impl Printer<'_> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn class_name(&self, binding: BindingId) -> String {
        match self.types.resolve_binding(binding) {
            Ok(id) => self.types.resolve(self.types.current(id)).name.clone(),
            Err(_) => format!("class#{}", binding.0),
        }
    }

    fn ty(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Primitive(p) => p.keyword().to_string(),
            TypeRef::Class(binding) => self.class_name(*binding),
            TypeRef::Array(inner) => format!("{}[]", self.ty(inner)),
            TypeRef::Null => "null".to_string(),
            TypeRef::Void => "void".to_string(),
        }
    }

    fn decl(&mut self, decl: &TypeDecl) {
        let keyword = match decl.kind {
            DeclKind::Class => "class",
            DeclKind::Interface => "interface",
            DeclKind::Enum => "enum",
        };
        let mut header = format!("{} {}", keyword, decl.name);
        if let Some(superclass) = decl.superclass {
            write!(header, " : {}", self.class_name(superclass)).unwrap();
        }
        if !decl.capabilities.is_empty() {
            let caps: Vec<String> = decl
                .capabilities
                .iter()
                .map(|b| self.class_name(*b))
                .collect();
            write!(header, " <{}>", caps.join(", ")).unwrap();
        }
        header.push_str(" {");
        self.line(&header);
        self.indent += 1;
        for constant in &decl.enum_constants {
            self.line(&format!("constant {constant}"));
        }
        for member in &decl.members {
            self.member(member);
        }
        self.indent -= 1;
        self.line("}");
    }

    fn member(&mut self, member: &Member) {
        match member {
            Member::Field(f) => {
                let mut line = String::new();
                if f.is_static {
                    line.push_str("static ");
                }
                write!(line, "field {}: {}", f.name, self.ty(&f.ty)).unwrap();
                if f.ownership == Ownership::Weak {
                    line.push_str(" [weak]");
                }
                if let Some(init) = &f.initializer {
                    write!(line, " = {}", self.expr(init)).unwrap();
                }
                self.line(&line);
            }
            Member::Method(m) => {
                let mut line = String::new();
                if m.is_static {
                    line.push_str("static ");
                }
                if m.synthetic {
                    line.push_str("synthetic ");
                }
                write!(
                    line,
                    "method {}({}) -> {}",
                    m.name,
                    self.params(&m.params),
                    self.ty(&m.return_ty)
                )
                .unwrap();
                match &m.body {
                    Some(body) => {
                        line.push_str(" {");
                        self.line(&line);
                        self.block_inner(body);
                        self.line("}");
                    }
                    None => self.line(&line),
                }
            }
            Member::Constructor(c) => {
                let mut line = String::new();
                if c.synthetic {
                    line.push_str("synthetic ");
                }
                write!(line, "ctor({}) {{", self.params(&c.params)).unwrap();
                self.line(&line);
                self.block_inner(&c.body);
                self.line("}");
            }
            Member::InitBlock(b) => {
                self.line(if b.is_static { "static init {" } else { "init {" });
                self.block_inner(&b.body);
                self.line("}");
            }
        }
    }

    fn params(&self, params: &[Param]) -> String {
        let rendered: Vec<String> = params
            .iter()
            .map(|p| format!("{}: {}", p.name, self.ty(&p.ty)))
            .collect();
        rendered.join(", ")
    }

    fn block_inner(&mut self, block: &Block) {
        self.indent += 1;
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
        self.indent -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => {
                let text = self.expr(e);
                self.line(&text);
            }
            Stmt::LocalVar(v) => {
                let mut line = format!("let {}: {}", v.name, self.ty(&v.ty));
                if let Some(init) = &v.init {
                    write!(line, " = {}", self.expr(init)).unwrap();
                }
                self.line(&line);
            }
            Stmt::If(s) => {
                let header = format!("if {} {{", self.expr(&s.condition));
                self.line(&header);
                self.block_inner(&s.then_branch);
                if let Some(else_branch) = &s.else_branch {
                    self.line("} else {");
                    self.block_inner(else_branch);
                }
                self.line("}");
            }
            Stmt::While(s) => {
                let header = format!("while {} {{", self.expr(&s.condition));
                self.line(&header);
                self.block_inner(&s.body);
                self.line("}");
            }
            Stmt::DoWhile(s) => {
                self.line("do {");
                self.block_inner(&s.body);
                let footer = format!("}} while {}", self.expr(&s.condition));
                self.line(&footer);
            }
            Stmt::For(s) => {
                self.line("for {");
                self.indent += 1;
                for init in &s.init {
                    self.stmt(init);
                }
                if let Some(condition) = &s.condition {
                    let text = format!("cond: {}", self.expr(condition));
                    self.line(&text);
                }
                for update in &s.update {
                    let text = format!("update: {}", self.expr(update));
                    self.line(&text);
                }
                self.indent -= 1;
                self.line("} body {");
                self.block_inner(&s.body);
                self.line("}");
            }
            Stmt::ForEach(s) => {
                let header = format!(
                    "for-each {}: {} in {} {{",
                    s.var_name,
                    self.ty(&s.var_ty),
                    self.expr(&s.iterable)
                );
                self.line(&header);
                self.block_inner(&s.body);
                self.line("}");
            }
            Stmt::Switch(s) => {
                let header = format!("switch {} {{", self.expr(&s.discriminant));
                self.line(&header);
                self.indent += 1;
                for case in &s.cases {
                    match &case.test {
                        Some(test) => {
                            let text = format!("case {}:", self.expr(test));
                            self.line(&text);
                        }
                        None => self.line("default:"),
                    }
                    self.indent += 1;
                    for stmt in &case.body {
                        self.stmt(stmt);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.line("}");
            }
            Stmt::Try(s) => {
                self.line("try {");
                self.block_inner(&s.body);
                for catch in &s.catches {
                    let tys: Vec<String> =
                        catch.types.iter().map(|b| self.class_name(*b)).collect();
                    let header = format!("}} catch {}: {} {{", catch.param, tys.join(" | "));
                    self.line(&header);
                    self.block_inner(&catch.body);
                }
                if let Some(finally) = &s.finally {
                    self.line("} finally {");
                    self.block_inner(finally);
                }
                self.line("}");
            }
            Stmt::TryWithResources(s) => {
                self.line("try-with-resources {");
                self.indent += 1;
                for resource in &s.resources {
                    let text = format!(
                        "resource {}: {} = {}",
                        resource.name,
                        self.ty(&resource.ty),
                        self.expr(&resource.init)
                    );
                    self.line(&text);
                }
                self.indent -= 1;
                self.line("} body {");
                self.block_inner(&s.body);
                self.line("}");
            }
            Stmt::Labeled(s) => {
                let header = format!("label {}:", s.label);
                self.line(&header);
                self.stmt(&s.body);
            }
            Stmt::Break(s) => match &s.label {
                Some(label) => self.line(&format!("break {label}")),
                None => self.line("break"),
            },
            Stmt::Continue(s) => match &s.label {
                Some(label) => self.line(&format!("continue {label}")),
                None => self.line("continue"),
            },
            Stmt::Return(s) => match &s.value {
                Some(value) => {
                    let text = format!("return {}", self.expr(value));
                    self.line(&text);
                }
                None => self.line("return"),
            },
            Stmt::Throw(s) => {
                let text = format!("throw {}", self.expr(&s.value));
                self.line(&text);
            }
            Stmt::Block(b) => {
                self.line("{");
                self.block_inner(b);
                self.line("}");
            }
            Stmt::LocalClass(s) => {
                self.line(&format!("local-class {}", s.decl));
            }
            Stmt::ConstructorCall(c) => {
                let target = match c.target {
                    CtorTarget::This => "this",
                    CtorTarget::Super => "super",
                };
                let text = format!("{}({})", target, self.args(&c.args));
                self.line(&text);
            }
            Stmt::Synchronized(s) => {
                let header = format!("synchronized {} {{", self.expr(&s.monitor));
                self.line(&header);
                self.block_inner(&s.body);
                self.line("}");
            }
            Stmt::Empty(_) => self.line(";"),
        }
    }

    fn args(&self, args: &[Expr]) -> String {
        let rendered: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
        rendered.join(", ")
    }

    fn expr(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal(lit) => match lit {
                Literal::Bool(v) => v.to_string(),
                Literal::Char(c) => format!("'{c}'"),
                Literal::Int(v) => v.to_string(),
                Literal::Long(v) => format!("{v}L"),
                Literal::Float(v) => format!("{v}f"),
                Literal::Double(v) => v.to_string(),
                Literal::Str(s) => format!("{s:?}"),
                Literal::Null => "null".to_string(),
            },
            ExprKind::LocalRef(l) => l.name.clone(),
            ExprKind::This => "this".to_string(),
            ExprKind::FieldAccess(access) => match &access.object {
                Some(object) => format!("{}.{}", self.expr(object), access.field),
                None if access.is_static => {
                    format!("{}.{}", self.class_name(access.owner), access.field)
                }
                None => format!("this.{}", access.field),
            },
            ExprKind::EnumConstant(c) => {
                format!("{}.{}", self.class_name(c.enum_ty), c.name)
            }
            ExprKind::Assign(a) => {
                format!("{} = {}", self.expr(&a.target), self.expr(&a.value))
            }
            ExprKind::Invoke(invoke) => {
                let receiver = match &invoke.receiver {
                    Some(r) => self.expr(r),
                    None if invoke.is_static => self.class_name(invoke.owner),
                    None => "this".to_string(),
                };
                format!("{}.{}({})", receiver, invoke.method, self.args(&invoke.args))
            }
            ExprKind::SuperInvoke(s) => {
                format!("super.{}({})", s.method, self.args(&s.args))
            }
            ExprKind::New(n) => {
                format!("new {}({})", self.class_name(n.class), self.args(&n.args))
            }
            ExprKind::Box(inner) => format!("box({})", self.expr(inner)),
            ExprKind::Unbox(inner) => format!("unbox({})", self.expr(inner)),
            ExprKind::Binary(b) => self.binary(b),
            ExprKind::Unary(u) => {
                let op = match u.op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                };
                format!("{}{}", op, self.expr(&u.operand))
            }
            ExprKind::InstanceOf(i) => {
                format!(
                    "{} instanceof {}",
                    self.expr(&i.value),
                    self.class_name(i.tested)
                )
            }
            ExprKind::Cast(inner) => {
                format!("({}) {}", self.ty(&expr.ty), self.expr(inner))
            }
            ExprKind::ArrayGet(a) => {
                format!("{}[{}]", self.expr(&a.array), self.expr(&a.index))
            }
        }
    }

    fn binary(&self, binary: &Binary) -> String {
        let op = match binary.op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        format!(
            "({} {} {})",
            self.expr(&binary.lhs),
            op,
            self.expr(&binary.rhs)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosslate_ast::{Field, Method, ReturnStmt, Span};
    use crosslate_types::{well_known, PrimitiveKind, TypeDescriptor, TypeKind};

    #[test]
    fn test_dump_shows_class_structure() {
        let mut types = TypeTable::new();
        types.register(
            BindingId(20),
            TypeDescriptor::new("Greeter", TypeKind::Class),
        );

        let mut unit = CompilationUnit::new("Greeter.src");
        let mut decl = TypeDecl::new("Greeter", BindingId(20), DeclKind::Class);
        decl.members
            .push(Member::Field(Field::new("greeting", TypeRef::Class(well_known::STRING))));
        decl.members.push(Member::Method(Method::new(
            "count",
            Vec::new(),
            TypeRef::Primitive(PrimitiveKind::Int),
            Block::new(vec![Stmt::Return(ReturnStmt {
                value: Some(Expr::int(1)),
                span: Span::synthetic(),
            })]),
        )));
        unit.alloc(decl);

        let dump = pretty_unit(&unit, &types);
        assert!(dump.contains("unit Greeter.src"));
        assert!(dump.contains("class Greeter {"));
        assert!(dump.contains("field greeting: String"));
        assert!(dump.contains("method count() -> int {"));
        assert!(dump.contains("return 1"));
    }

    #[test]
    fn test_superseded_binding_renders_current_name() {
        let mut types = TypeTable::new();
        let old = types.register(
            BindingId(20),
            TypeDescriptor::new("Outer_$1", TypeKind::Class),
        );
        let new = types.synthesize("Outer_$1", TypeKind::Class);
        types.supersede(old, new);

        let mut unit = CompilationUnit::new("Outer.src");
        let mut decl = TypeDecl::new("User", BindingId(21), DeclKind::Class);
        decl.members
            .push(Member::Field(Field::new("helper", TypeRef::Class(BindingId(20)))));
        unit.alloc(decl);

        let dump = pretty_unit(&unit, &types);
        assert!(dump.contains(&format!(
            "field helper: {}",
            types.resolve(new).name
        )));
    }

    #[test]
    fn test_output_is_stable() {
        let types = TypeTable::new();
        let mut unit = CompilationUnit::new("A.src");
        unit.alloc(TypeDecl::new(
            "A",
            BindingId(20),
            DeclKind::Class,
        ));
        assert_eq!(pretty_unit(&unit, &types), pretty_unit(&unit, &types));
    }
}
