//! Diagnostic collection and rendering
//!
//! Warnings and per-unit failures are collected during the run and surfaced
//! together at the end, rendered with source context through
//! codespan-reporting when the source text has been registered.

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, Severity as CsSeverity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use crosslate_ast::Span;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use termcolor::{ColorChoice, StandardStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One collected diagnostic
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable code, e.g. "W4001"
    pub code: Option<&'static str>,
    pub message: String,
    pub file: Option<String>,
    pub span: Option<Span>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            file: None,
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Self::error("")
        }
        .with_message(message)
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Thread-safe collector shared by all passes in a run
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    entries: Mutex<Vec<Diagnostic>>,
    files: Mutex<SourceRegistry>,
}

#[derive(Debug)]
struct SourceRegistry {
    files: SimpleFiles<String, String>,
    ids: FxHashMap<String, usize>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        SourceRegistry {
            files: SimpleFiles::new(),
            ids: FxHashMap::default(),
        }
    }
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        self.entries.lock().push(diagnostic);
    }

    /// Register a unit's source text so its diagnostics render with context
    pub fn add_source(&self, file: impl Into<String>, text: impl Into<String>) {
        let mut registry = self.files.lock();
        let file = file.into();
        let id = registry.files.add(file.clone(), text.into());
        registry.ids.insert(file, id);
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .cloned()
            .collect()
    }

    pub fn has_warnings(&self) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|d| d.severity == Severity::Warning)
    }

    /// Render every collected diagnostic to stderr
    pub fn emit_to_stderr(&self) {
        let mut writer = StandardStream::stderr(ColorChoice::Auto);
        let config = term::Config::default();
        let registry = self.files.lock();
        for diagnostic in self.entries.lock().iter() {
            let severity = match diagnostic.severity {
                Severity::Error => CsSeverity::Error,
                Severity::Warning => CsSeverity::Warning,
            };
            let mut cs = CsDiagnostic::new(severity).with_message(diagnostic.message.clone());
            if let Some(code) = diagnostic.code {
                cs = cs.with_code(code);
            }
            cs = cs.with_notes(diagnostic.notes.clone());
            if let (Some(file), Some(span)) = (&diagnostic.file, diagnostic.span) {
                if let Some(&file_id) = registry.ids.get(file) {
                    cs = cs.with_labels(vec![Label::primary(
                        file_id,
                        span.start as usize..span.end as usize,
                    )]);
                }
            }
            let _ = term::emit(&mut writer, &config, &registry.files, &cs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_collects_in_order() {
        let sink = DiagnosticSink::new();
        sink.push(Diagnostic::warning("first").with_code("W4001"));
        sink.push(Diagnostic::error("second"));
        let all = sink.diagnostics();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].message, "first");
        assert_eq!(all[0].severity, Severity::Warning);
        assert_eq!(all[1].severity, Severity::Error);
    }

    #[test]
    fn test_warning_filter() {
        let sink = DiagnosticSink::new();
        assert!(!sink.has_warnings());
        sink.push(Diagnostic::error("boom"));
        assert!(!sink.has_warnings());
        sink.push(Diagnostic::warning("careful").in_file("Foo.src").at(Span::new(1, 5)));
        assert!(sink.has_warnings());
        assert_eq!(sink.warnings().len(), 1);
    }
}
