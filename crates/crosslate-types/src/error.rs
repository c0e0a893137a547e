//! Type table errors

use crate::ty::BindingId;
use thiserror::Error;

pub type TypeResult<T> = Result<T, TypeError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    /// A pass queried a binding the front end left unresolved. Fatal for the
    /// enclosing compilation unit only.
    #[error("unresolved binding: {binding}")]
    UnresolvedBinding { binding: BindingId },

    #[error("unknown type name: {name}")]
    UnknownType { name: String },
}
