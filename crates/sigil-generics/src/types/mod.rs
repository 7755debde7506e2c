// types/mod.rs
//
// Interned type representation shared by signatures, conformances and
// substitution:
// - TypeId: u32 handle to an interned type (Copy, trivial Eq/Hash)
// - TypeArena: per-context storage with automatic deduplication
// - Ty: the structural type representation using TypeId for child types

mod arena;
mod display;
mod properties;
mod query;
mod transform;
pub mod ty;
pub mod type_id;

#[cfg(test)]
mod tests;

pub use arena::*;
pub use display::{RequirementDisplay, TypeDisplay};
pub use properties::TypeProperties;
pub use transform::transform_type;
pub use ty::*;
pub use type_id::*;
