//! Translation errors
//!
//! Three severities, matching how failures are scoped:
//! - [`TranslateError`] is fatal for one compilation unit; sibling units keep
//!   going.
//! - [`PipelineError`] is fatal for the whole run (bad configuration, or an
//!   internal invariant violation promoted out of a unit).
//! - Non-fatal diagnostics (reference-cycle warnings) flow through the
//!   diagnostic sink instead.

use crosslate_ast::Span;
use crosslate_types::{BindingId, TypeError};
use thiserror::Error;

pub type TranslateResult<T> = Result<T, TranslateError>;

/// Fatal for the enclosing compilation unit only
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranslateError {
    /// A pass queried a binding the front end left unresolved
    #[error("unresolved binding {binding} at {span}")]
    UnresolvedBinding { binding: BindingId, span: Span },

    /// A hoisted class captures a local that is reassigned after
    /// initialization; capture-by-field-copy cannot preserve its sharing
    /// semantics
    #[error("captured local `{name}` is not effectively final at {span}")]
    NonEffectivelyFinalCapture { name: String, span: Span },

    /// A construct with no known rewrite rule reached the control-flow
    /// rewriter
    #[error("no rewrite rule for {construct} at {span}")]
    UnsupportedConstruct {
        construct: &'static str,
        span: Span,
    },

    /// Broken compiler invariant; the pipeline promotes this to a run-fatal
    /// error
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl TranslateError {
    pub fn from_type(err: TypeError, span: Span) -> Self {
        match err {
            TypeError::UnresolvedBinding { binding } => {
                TranslateError::UnresolvedBinding { binding, span }
            }
            TypeError::UnknownType { name } => TranslateError::Internal {
                message: format!("unknown type name `{name}` past front-end resolution"),
            },
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        TranslateError::Internal {
            message: message.into(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, TranslateError::Internal { .. })
    }
}

/// Fatal for the whole run
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// A dead-code map entry does not parse; rejected before the pipeline
    /// starts
    #[error("malformed dead code map pattern `{pattern}`: {reason}")]
    BadDeadCodeMap { pattern: String, reason: String },

    /// An internal invariant broke inside some unit
    #[error("compiler invariant violated in {file}: {message}")]
    Internal { file: String, message: String },
}
