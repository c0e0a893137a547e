//! Type identities and the shared symbol/type table for crosslate.
//!
//! Every declared or synthesized type in a translation run is given a stable
//! `TypeId` through the [`TypeTable`]. The table is built once per run, is
//! append-only, and is the single naming universe that the rewrite passes and
//! the emitter observe.

pub mod error;
pub mod signature;
pub mod table;
pub mod ty;

pub use error::{TypeError, TypeResult};
pub use signature::{MemberSignature, ParamShape};
pub use table::{well_known, TypeTable};
pub use ty::{
    BindingId, ExtractionState, PrimitiveKind, TypeDescriptor, TypeId, TypeKind, TypeRef,
};
