//! Generic signatures, requirement minimization, conformances and
//! substitution for a Swift-like type system, including variadic generics
//! (parameter packs and pack expansions).
//!
//! Everything lives in a [`GenericContext`]: types, signatures, conformances
//! and substitution maps are handles into tables it owns, uniqued by content.

pub mod config;
pub mod conformance;
pub mod context;
pub mod decls;
pub mod errors;
pub mod existential;
mod machine;
pub mod requirement;
pub mod signature;
pub mod subst;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{ContextBuilder, ContextConfig, MachineLimits};
pub use conformance::{
    ConcreteConformance, ConcreteConformanceKind, ConformingDecl, PackConformance,
    ProtocolConformanceRef,
};
pub use context::GenericContext;
pub use decls::{
    AssociatedTypeDecl, DeclRegistry, ForeignTypeDecl, KnownProtocolKind, NominalDecl, NominalKind,
    ProtocolDecl, ValueDecl,
};
pub use errors::RequirementError;
pub use existential::{ExistentialLayout, ExistentialLayoutKind};
pub use requirement::{
    InverseRequirement, InvertibleProtocolKind, InvertibleProtocolSet, LayoutConstraint, Requirement,
    RequirementKind, WrittenRequirement,
};
pub use signature::{
    BuiltSignature, CanGenericSignature, ConformancePath, GenericSignature, GenericSignatureErrors,
    LocalRequirements, RequirementsWithInverses, SignatureId, SignatureRequest,
    build_generic_signature,
};
pub use subst::{
    ActivePackExpansion, DumpStyle, FnSource, InFlightSubstitution, SubstMapId, SubstOptions,
    SubstSource, SubstitutionMap, lookup_in_context,
};
pub use types::{ArchetypeKind, GenericParamKey, Ty, TypeArena, TypeId, TypeIdVec, TypeProperties};
