//! Substitution: replacing the type parameters of a generic signature.
//!
//! - `SubstitutionMap`: a uniqued assignment of replacement types and
//!   conformances to a signature's parameters and conformance requirements
//! - `InFlightSubstitution`: the state threaded through one substitution
//!   walk, including the stack of pack expansions being expanded
//! - `SubstSource`: where replacements come from (a map, or callbacks)

mod in_flight;
mod map;
mod options;
mod override_subs;
mod walk;


pub use in_flight::{ActivePackExpansion, FnSource, InFlightSubstitution, SubstSource, lookup_in_context};
pub use map::{DumpStyle, SubstMapId, SubstitutionMap};
pub use options::SubstOptions;

pub(crate) use map::SubstMapTable;
