//! Per-run compiler context
//!
//! One `CompilerContext` is created per translation run and passed by
//! reference through every pass; there is no process-wide state. During the
//! parallel per-unit phase the only shared mutable structures are the tables
//! held here, all append-only under their locks.

use crate::diagnostic::DiagnosticSink;
use crate::name_table::NameTable;
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use crosslate_types::{TypeId, TypeRef, TypeTable};

/// What a hoisted class captured from its enclosing scopes
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedEntity {
    /// The implicit enclosing instance
    OuterInstance,
    /// A local variable of the enclosing method
    Local { name: String, ty: TypeRef },
}

/// Ordered capture list for one hoisted class
///
/// Order is deterministic (enclosing instance first, then locals in first-use
/// order), so the synthesized constructor is stable across runs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaptureRecord {
    pub entries: Vec<CaptureEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEntry {
    pub entity: CapturedEntity,
    /// Name of the synthesized backing field
    pub field: String,
    /// Index of the synthesized constructor parameter
    pub param_index: usize,
}

impl CaptureRecord {
    pub fn captures_outer(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.entity == CapturedEntity::OuterInstance)
    }
}

/// Shared state for one translation run
#[derive(Debug)]
pub struct CompilerContext {
    types: RwLock<TypeTable>,
    names: Mutex<NameTable>,
    captures: Mutex<FxHashMap<TypeId, CaptureRecord>>,
    release_sets: Mutex<FxHashMap<TypeId, Vec<String>>>,
    sink: DiagnosticSink,
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilerContext {
    pub fn new() -> Self {
        CompilerContext {
            types: RwLock::new(TypeTable::new()),
            names: Mutex::new(NameTable::new()),
            captures: Mutex::new(FxHashMap::default()),
            release_sets: Mutex::new(FxHashMap::default()),
            sink: DiagnosticSink::new(),
        }
    }

    pub fn types(&self) -> RwLockReadGuard<'_, TypeTable> {
        self.types.read()
    }

    pub fn types_mut(&self) -> RwLockWriteGuard<'_, TypeTable> {
        self.types.write()
    }

    pub fn names(&self) -> MutexGuard<'_, NameTable> {
        self.names.lock()
    }

    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    pub fn record_capture(&self, ty: TypeId, record: CaptureRecord) {
        self.captures.lock().insert(ty, record);
    }

    pub fn capture_of(&self, ty: TypeId) -> Option<CaptureRecord> {
        self.captures.lock().get(&ty).cloned()
    }

    pub fn record_release_set(&self, ty: TypeId, fields: Vec<String>) {
        self.release_sets.lock().insert(ty, fields);
    }

    pub fn release_set_of(&self, ty: TypeId) -> Option<Vec<String>> {
        self.release_sets.lock().get(&ty).cloned()
    }
}
