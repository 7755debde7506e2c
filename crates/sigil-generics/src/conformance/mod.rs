//! Protocol conformances.
//!
//! `ProtocolConformanceRef` is the value passed around by substitution: it
//! is either invalid (the missing-conformance sentinel), abstract (a type
//! parameter or archetype known to conform through some signature),
//! concrete (a declared, specialized or builtin conformance) or a pack of
//! per-element conformances. Concrete and pack conformances are uniqued in
//! the context's `ConformanceTables`, so handle equality is content equality.

mod concrete;
mod lookup;
mod pack;

#[cfg(test)]
mod tests;

pub use concrete::{ConcreteConformance, ConcreteConformanceKind, ConformingDecl};
pub use pack::PackConformance;

use std::fmt;

use sigil_identity::{AssocTypeId, ProtocolId};

use crate::context::GenericContext;
use crate::signature::GenericSignature;
use crate::subst::InFlightSubstitution;
use crate::types::{ArchetypeKind, Ty, TypeId};

pub(crate) use concrete::{ConcreteTable, nominal_args};
pub(crate) use pack::PackTable;

/// Conformance tables owned by the context.
#[derive(Debug, Default)]
pub(crate) struct ConformanceTables {
    pub(crate) concrete: ConcreteTable,
    pub(crate) packs: PackTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolConformanceRef {
    /// The type does not conform, or the conformance could not be found.
    #[default]
    Invalid,
    /// `ty: protocol` holds by a signature's requirements; `ty` is a type
    /// parameter or an archetype.
    Abstract { ty: TypeId, protocol: ProtocolId },
    Concrete(ConcreteConformance),
    Pack(PackConformance),
}

impl ProtocolConformanceRef {
    pub fn for_abstract(ty: TypeId, protocol: ProtocolId) -> Self {
        ProtocolConformanceRef::Abstract { ty, protocol }
    }

    #[inline]
    pub fn is_invalid(self) -> bool {
        matches!(self, ProtocolConformanceRef::Invalid)
    }

    #[inline]
    pub fn is_abstract(self) -> bool {
        matches!(self, ProtocolConformanceRef::Abstract { .. })
    }

    pub fn concrete(self) -> Option<ConcreteConformance> {
        match self {
            ProtocolConformanceRef::Concrete(conformance) => Some(conformance),
            _ => None,
        }
    }

    pub fn pack(self) -> Option<PackConformance> {
        match self {
            ProtocolConformanceRef::Pack(conformance) => Some(conformance),
            _ => None,
        }
    }

    pub fn protocol(self, ctx: &GenericContext) -> Option<ProtocolId> {
        match self {
            ProtocolConformanceRef::Invalid => None,
            ProtocolConformanceRef::Abstract { protocol, .. } => Some(protocol),
            ProtocolConformanceRef::Concrete(conformance) => Some(conformance.protocol(ctx)),
            ProtocolConformanceRef::Pack(conformance) => Some(conformance.protocol(ctx)),
        }
    }

    /// The type that conforms; the error type for invalid conformances.
    pub fn conforming_type(self, ctx: &GenericContext) -> TypeId {
        match self {
            ProtocolConformanceRef::Invalid => TypeId::ERROR,
            ProtocolConformanceRef::Abstract { ty, .. } => ty,
            ProtocolConformanceRef::Concrete(conformance) => conformance.conforming_type(ctx),
            ProtocolConformanceRef::Pack(conformance) => conformance.conforming_type(ctx),
        }
    }

    /// The type witnessing `assoc`. Error type when there is none.
    pub fn type_witness(self, ctx: &mut GenericContext, assoc: AssocTypeId) -> TypeId {
        match self {
            ProtocolConformanceRef::Invalid => TypeId::ERROR,
            ProtocolConformanceRef::Abstract { ty, .. } => abstract_member(ctx, ty, assoc),
            ProtocolConformanceRef::Concrete(conformance) => conformance.type_witness(ctx, assoc),
            ProtocolConformanceRef::Pack(conformance) => conformance.type_witness(ctx, assoc),
        }
    }

    /// Conformance of `subject` (written over the protocol's `Self`) to
    /// `protocol`, as required by this conformance's protocol.
    pub fn associated_conformance(
        self,
        ctx: &mut GenericContext,
        subject: TypeId,
        protocol: ProtocolId,
    ) -> ProtocolConformanceRef {
        match self {
            ProtocolConformanceRef::Invalid => ProtocolConformanceRef::Invalid,
            ProtocolConformanceRef::Abstract { ty, .. } => {
                let member = resolve_in_environment(ctx, ty, subject);
                if member.is_error() {
                    return ProtocolConformanceRef::Invalid;
                }
                ctx.lookup_conformance(member, protocol)
            }
            ProtocolConformanceRef::Concrete(conformance) => {
                conformance.associated_conformance(ctx, subject, protocol)
            }
            ProtocolConformanceRef::Pack(conformance) => {
                conformance.associated_conformance(ctx, subject, protocol)
            }
        }
    }

    /// Substitute the conforming type and everything derived from it.
    pub fn subst(self, ctx: &mut GenericContext, ifs: &mut InFlightSubstitution<'_>) -> ProtocolConformanceRef {
        match self {
            ProtocolConformanceRef::Invalid => self,
            ProtocolConformanceRef::Abstract { ty, protocol } => {
                ifs.lookup_conformance(ctx, ty, protocol, 0)
            }
            ProtocolConformanceRef::Concrete(conformance) => conformance.subst(ctx, ifs),
            ProtocolConformanceRef::Pack(conformance) => conformance.subst(ctx, ifs),
        }
    }

    pub fn is_canonical(self, ctx: &GenericContext) -> bool {
        match self {
            ProtocolConformanceRef::Invalid => true,
            ProtocolConformanceRef::Abstract { ty, .. } => ctx.types.is_canonical(ty),
            ProtocolConformanceRef::Concrete(conformance) => conformance.is_canonical(ctx),
            ProtocolConformanceRef::Pack(conformance) => conformance.is_canonical(ctx),
        }
    }

    pub fn canonical(self, ctx: &mut GenericContext) -> ProtocolConformanceRef {
        match self {
            ProtocolConformanceRef::Invalid => self,
            ProtocolConformanceRef::Abstract { ty, protocol } => ProtocolConformanceRef::Abstract {
                ty: ctx.types.canonical_type(ty),
                protocol,
            },
            ProtocolConformanceRef::Concrete(conformance) => {
                ProtocolConformanceRef::Concrete(conformance.canonical(ctx))
            }
            ProtocolConformanceRef::Pack(conformance) => {
                ProtocolConformanceRef::Pack(conformance.canonical(ctx))
            }
        }
    }

    pub fn display(self, ctx: &GenericContext) -> ConformanceDisplay<'_> {
        ConformanceDisplay {
            ctx,
            conformance: self,
        }
    }
}

/// `ty.assoc` for an abstract conforming type.
fn abstract_member(ctx: &mut GenericContext, ty: TypeId, assoc: AssocTypeId) -> TypeId {
    if ctx.types.is_type_parameter(ty) {
        return ctx.types.dependent_member(ty, assoc);
    }
    let Some((signature, interface, kind)) = ctx.types.archetype_parts(ty) else {
        return TypeId::ERROR;
    };
    let member = ctx.types.dependent_member(interface, assoc);
    archetype_for(ctx, signature, member, kind)
}

/// Write `subject` (over `Self`) relative to the abstract type `ty`.
fn resolve_in_environment(ctx: &mut GenericContext, ty: TypeId, subject: TypeId) -> TypeId {
    if ctx.types.is_type_parameter(ty) {
        return ctx.types.substitute_self(subject, ty);
    }
    let Some((signature, interface, kind)) = ctx.types.archetype_parts(ty) else {
        return TypeId::ERROR;
    };
    let member = ctx.types.substitute_self(subject, interface);
    archetype_for(ctx, signature, member, kind)
}

/// The archetype (or concrete type) for `interface` in the environment of
/// `signature`.
fn archetype_for(
    ctx: &mut GenericContext,
    signature: crate::signature::SignatureId,
    interface: TypeId,
    kind: ArchetypeKind,
) -> TypeId {
    let sig = GenericSignature::from_id(signature);
    let reduced = sig.reduced_type(ctx, interface);
    if ctx.types.is_type_parameter(reduced) {
        return ctx.types.archetype(signature, reduced, kind);
    }
    sig.map_type_into_context(ctx, reduced)
}

pub struct ConformanceDisplay<'a> {
    ctx: &'a GenericContext,
    conformance: ProtocolConformanceRef,
}

impl fmt::Display for ConformanceDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctx = self.ctx;
        let protocol_name = |protocol: ProtocolId| ctx.interner.resolve(ctx.decls.protocol(protocol).name);
        match self.conformance {
            ProtocolConformanceRef::Invalid => f.write_str("invalid"),
            ProtocolConformanceRef::Abstract { ty, protocol } => {
                write!(f, "abstract {}: {}", ctx.display_type(ty), protocol_name(protocol))
            }
            ProtocolConformanceRef::Concrete(conformance) => {
                let prefix = match conformance.kind(ctx) {
                    ConcreteConformanceKind::Normal => "normal",
                    ConcreteConformanceKind::Specialized => "specialized",
                    ConcreteConformanceKind::Builtin => "builtin",
                };
                write!(
                    f,
                    "{prefix} {}: {}",
                    ctx.display_type(conformance.conforming_type(ctx)),
                    protocol_name(conformance.protocol(ctx))
                )
            }
            ProtocolConformanceRef::Pack(conformance) => {
                write!(
                    f,
                    "pack {}: {} [",
                    ctx.display_type(conformance.conforming_type(ctx)),
                    protocol_name(conformance.protocol(ctx))
                )?;
                for (i, element) in conformance.elements(ctx).iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", element.display(ctx))?;
                }
                f.write_str("]")
            }
        }
    }
}

impl Ty {
    /// True for the node kinds a conformance can be abstract over.
    pub(crate) fn is_abstract_conformer(&self) -> bool {
        matches!(
            self,
            Ty::GenericParam { .. } | Ty::DependentMember { .. } | Ty::Archetype { .. }
        )
    }
}
