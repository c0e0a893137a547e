//! Rewrite passes turning a resolved source tree into emitter-ready form
//!
//! The front end hands this crate a fully resolved program graph; the
//! pipeline rewrites it until every construct has a direct mapping in the
//! reference-counted, message-dispatch target:
//! - dead code elimination from an external usage report
//! - inner class extraction with capture-by-field-copy
//! - initializer normalization into constructors
//! - autoboxing made explicit
//! - control-flow sugar lowered to primitive forms
//! - selector assignment free of target-reserved names
//! - teardown synthesis and strong-cycle detection
//!
//! Passes run per compilation unit on the rayon pool after a sequential
//! registration barrier; the shared type and name tables are append-only.

pub mod autobox;
pub mod context;
pub mod controlflow;
pub mod deadcode;
pub mod destructor;
pub mod diagnostic;
pub mod error;
pub mod extract;
pub mod init_norm;
pub mod name_table;
pub mod pipeline;
pub mod pretty;

pub use context::{CaptureEntry, CaptureRecord, CapturedEntity, CompilerContext};
pub use deadcode::DeadCodeMap;
pub use diagnostic::{Diagnostic, DiagnosticSink, Severity};
pub use error::{PipelineError, TranslateError, TranslateResult};
pub use name_table::NameTable;
pub use pipeline::{Pipeline, PipelineOptions, Translation, UnitReport, UnitState};
pub use pretty::{pretty_program, pretty_unit};
