//! The translation pipeline
//!
//! Registration runs first and sequentially: every unit's declarations enter
//! the type table before any unit is processed, so cross-unit references
//! resolve no matter the processing order. The per-unit passes then fan out
//! in parallel; the shared tables are append-only under their locks and two
//! units never rewrite the same declaration. A unit that fails mid-pipeline
//! is marked failed and left where it stopped; its siblings are unaffected.
//! Only a broken compiler invariant aborts the whole run.

use crate::autobox::Autoboxer;
use crate::context::CompilerContext;
use crate::controlflow::ControlFlowRewriter;
use crate::deadcode::{DeadCodeEliminator, DeadCodeMap};
use crate::destructor::{scan_reference_cycles, DestructorGenerator};
use crate::error::{PipelineError, TranslateError, TranslateResult};
use crate::extract::InnerClassExtractor;
use crate::init_norm::InitNormalizer;
use crate::name_table::member_signature;
use crosslate_ast::{CompilationUnit, DeclKind, Member, Nesting, Program};
use crosslate_types::{ExtractionState, TypeDescriptor, TypeKind};
use rayon::prelude::*;

/// Run configuration
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Strip directives applied before any other pass
    pub dead_code: DeadCodeMap,
    /// Process units on the rayon pool; off, units run in order, which is
    /// occasionally useful when bisecting a miscompile
    pub parallel: bool,
}

impl PipelineOptions {
    pub fn new() -> Self {
        PipelineOptions {
            dead_code: DeadCodeMap::empty(),
            parallel: true,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// How far through the pipeline one unit got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Loaded,
    TablesBuilt,
    DeadCodeStripped,
    Extracted,
    Normalized,
    Autoboxed,
    Rewritten,
    DestructorsGenerated,
    ReadyForEmit,
    Failed,
}

/// Outcome for one unit
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub file: String,
    pub state: UnitState,
    pub error: Option<TranslateError>,
}

/// Result of a whole run: the rewritten program plus the tables the emitter
/// reads from
pub struct Translation {
    pub program: Program,
    pub context: CompilerContext,
    pub reports: Vec<UnitReport>,
}

impl Translation {
    /// Whether every unit made it all the way through
    pub fn succeeded(&self) -> bool {
        self.reports.iter().all(|r| r.state == UnitState::ReadyForEmit)
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitReport> {
        self.reports.iter().filter(|r| r.state == UnitState::Failed)
    }
}

pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Pipeline { options }
    }

    pub fn run(&self, mut program: Program) -> Result<Translation, PipelineError> {
        let ctx = CompilerContext::new();
        let mut reports: Vec<UnitReport> = program
            .units
            .iter()
            .map(|unit| UnitReport {
                file: unit.file.clone(),
                state: UnitState::Loaded,
                error: None,
            })
            .collect();

        // Registration barrier. Two phases: every declaration gets its id,
        // then inheritance links resolve, so a superclass declared in a
        // later unit is already present when the link is made.
        for unit in program.units.iter_mut() {
            register_unit(unit, &ctx);
        }
        for (unit, report) in program.units.iter().zip(&mut reports) {
            match link_unit(unit, &ctx) {
                Ok(()) => report.state = UnitState::TablesBuilt,
                Err(e) => {
                    report.state = UnitState::Failed;
                    report.error = Some(e);
                }
            }
        }

        let process = |(unit, report): (&mut CompilationUnit, &mut UnitReport)| {
            if report.state != UnitState::TablesBuilt {
                return;
            }
            if let Err(e) = process_unit(unit, &ctx, &self.options.dead_code, report) {
                report.state = UnitState::Failed;
                report.error = Some(e);
            }
        };
        if self.options.parallel {
            program
                .units
                .par_iter_mut()
                .zip(reports.par_iter_mut())
                .for_each(process);
        } else {
            program
                .units
                .iter_mut()
                .zip(reports.iter_mut())
                .for_each(process);
        }

        // Ownership cycles only show up with every unit's fields in view.
        scan_reference_cycles(&program, &ctx);

        for report in &reports {
            if let Some(error) = &report.error {
                if error.is_internal() {
                    return Err(PipelineError::Internal {
                        file: report.file.clone(),
                        message: error.to_string(),
                    });
                }
            }
        }

        Ok(Translation {
            program,
            context: ctx,
            reports,
        })
    }
}

fn declared_kind(kind: DeclKind) -> TypeKind {
    match kind {
        DeclKind::Class => TypeKind::Class,
        DeclKind::Interface => TypeKind::Interface,
        DeclKind::Enum => TypeKind::Enum,
    }
}

/// Phase one: every declaration gets a table id under its binding.
fn register_unit(unit: &mut CompilationUnit, ctx: &CompilerContext) {
    let ids = unit.live_ids();
    let mut types = ctx.types_mut();
    for &id in &ids {
        let (binding, descriptor) = {
            let decl = unit.decl(id);
            let extraction = if decl.nesting == Nesting::TopLevel {
                ExtractionState::TopLevel
            } else {
                ExtractionState::Pending
            };
            (
                decl.binding,
                TypeDescriptor::new(decl.name.clone(), declared_kind(decl.kind))
                    .with_extraction(extraction),
            )
        };
        let ty = types.register(binding, descriptor);
        unit.decl_mut(id).ty = Some(ty);
    }
}

/// Phase two: inheritance links, once every binding in the program is known.
fn link_unit(unit: &CompilationUnit, ctx: &CompilerContext) -> TranslateResult<()> {
    let mut types = ctx.types_mut();
    let object = types
        .resolve_binding(crosslate_types::well_known::OBJECT)
        .map_err(|e| TranslateError::from_type(e, crosslate_ast::Span::synthetic()))?;
    for id in unit.live_ids() {
        let decl = unit.decl(id);
        let ty = decl.type_id();
        let superclass = match decl.superclass {
            Some(binding) => Some(
                types
                    .resolve_binding(binding)
                    .map_err(|e| TranslateError::from_type(e, decl.span))?,
            ),
            // Single-rooted: a class without an explicit superclass extends
            // the root; interfaces extend nothing.
            None if decl.kind != DeclKind::Interface => Some(object),
            None => None,
        };
        let capabilities = decl
            .capabilities
            .iter()
            .map(|binding| {
                types
                    .resolve_binding(*binding)
                    .map_err(|e| TranslateError::from_type(e, decl.span))
            })
            .collect::<TranslateResult<Vec<_>>>()?;
        let descriptor = types.resolve_mut(ty);
        descriptor.superclass = superclass;
        descriptor.capabilities = capabilities;
    }
    Ok(())
}

fn process_unit(
    unit: &mut CompilationUnit,
    ctx: &CompilerContext,
    dead_code: &DeadCodeMap,
    report: &mut UnitReport,
) -> TranslateResult<()> {
    {
        let types = ctx.types();
        DeadCodeEliminator::new(dead_code).run(unit, &types)?;
    }
    report.state = UnitState::DeadCodeStripped;

    InnerClassExtractor::new(ctx).run(unit)?;
    report.state = UnitState::Extracted;

    InitNormalizer::new().run(unit);
    report.state = UnitState::Normalized;

    Autoboxer::new(ctx).run(unit);
    report.state = UnitState::Autoboxed;

    ControlFlowRewriter::new().run(unit)?;
    report.state = UnitState::Rewritten;

    DestructorGenerator::new(ctx).run(unit);
    report.state = UnitState::DestructorsGenerated;

    assign_selectors(unit, ctx)?;
    report.state = UnitState::ReadyForEmit;
    Ok(())
}

/// Final per-unit step: every surviving member gets its emitted selector.
/// Constructors and synthesized teardown land on their reserved selectors on
/// purpose; everything else is steered clear of them.
fn assign_selectors(unit: &CompilationUnit, ctx: &CompilerContext) -> TranslateResult<()> {
    let types = ctx.types();
    let mut names = ctx.names();
    for id in unit.live_ids() {
        let decl = unit.decl(id);
        let ty = types.current(decl.type_id());
        for member in &decl.members {
            let Some(signature) = member_signature(member, &types)? else {
                continue;
            };
            let deliberate = match member {
                Member::Constructor(_) => true,
                Member::Method(m) => m.synthetic && m.name == "dealloc",
                _ => false,
            };
            if deliberate {
                names.assign_reserved(ty, &signature)?;
            } else {
                names.assign(ty, &signature)?;
            }
        }
    }
    Ok(())
}
