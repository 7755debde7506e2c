// conformance/concrete.rs
//
// Declared, specialized and builtin conformances of concrete types.

use rustc_hash::FxHashMap;
use sigil_identity::{AssocTypeId, ForeignTypeId, NominalId, ProtocolId};

use super::ProtocolConformanceRef;
use crate::context::GenericContext;
use crate::signature::GenericSignature;
use crate::subst::{InFlightSubstitution, SubstOptions, SubstitutionMap};
use crate::types::{Ty, TypeId, TypeIdVec};

/// The declaration a normal conformance is written on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConformingDecl {
    Nominal(NominalId),
    Foreign(ForeignTypeId),
}

impl From<NominalId> for ConformingDecl {
    fn from(id: NominalId) -> Self {
        ConformingDecl::Nominal(id)
    }
}

impl From<ForeignTypeId> for ConformingDecl {
    fn from(id: ForeignTypeId) -> Self {
        ConformingDecl::Foreign(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConcreteConformanceKind {
    /// Declared on a nominal or foreign type, over its own signature.
    Normal,
    /// A generic normal conformance with its parameters substituted.
    Specialized,
    /// Structural and self-conformances the core synthesizes.
    Builtin,
}

/// Handle to a uniqued concrete conformance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConcreteConformance(u32);

#[derive(Debug, Clone)]
enum ConcreteData {
    Normal {
        decl: ConformingDecl,
        protocol: ProtocolId,
        ty: TypeId,
        signature: GenericSignature,
        witnesses: Vec<(AssocTypeId, TypeId)>,
    },
    Specialized {
        generic: ConcreteConformance,
        map: SubstitutionMap,
        ty: TypeId,
        protocol: ProtocolId,
    },
    Builtin {
        ty: TypeId,
        protocol: ProtocolId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ConcreteKey {
    Normal(ConformingDecl, ProtocolId),
    Specialized(ConcreteConformance, SubstitutionMap),
    Builtin(TypeId, ProtocolId),
}

#[derive(Debug, Default)]
pub(crate) struct ConcreteTable {
    data: Vec<ConcreteData>,
    lookup: FxHashMap<ConcreteKey, ConcreteConformance>,
}

impl ConcreteTable {
    fn intern(&mut self, key: ConcreteKey, make: impl FnOnce() -> ConcreteData) -> ConcreteConformance {
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }
        let id = ConcreteConformance(self.data.len() as u32);
        self.data.push(make());
        self.lookup.insert(key, id);
        id
    }

    fn get(&self, id: ConcreteConformance) -> &ConcreteData {
        &self.data[id.0 as usize]
    }

    pub(crate) fn normal(&self, decl: ConformingDecl, protocol: ProtocolId) -> Option<ConcreteConformance> {
        self.lookup.get(&ConcreteKey::Normal(decl, protocol)).copied()
    }
}

impl GenericContext {
    /// Declare `decl: protocol` with the given type witnesses, written over
    /// the declaration's own signature. Conformances to inherited protocols
    /// are declared along with it unless they already exist.
    ///
    /// Redeclaring an existing conformance returns the existing one.
    pub fn declare_conformance(
        &mut self,
        decl: impl Into<ConformingDecl>,
        protocol: ProtocolId,
        witnesses: &[(AssocTypeId, TypeId)],
    ) -> ConcreteConformance {
        let decl = decl.into();
        let (ty, signature) = match decl {
            ConformingDecl::Nominal(nominal) => (
                self.declared_interface_type(nominal),
                self.decls.nominal(nominal).signature,
            ),
            ConformingDecl::Foreign(foreign) => (self.types.foreign(foreign), GenericSignature::NULL),
        };
        for inherited in self.decls.inherited_protocols(protocol) {
            if self.conformances.concrete.normal(decl, inherited).is_none() {
                self.declare_conformance(decl, inherited, witnesses);
            }
        }
        let witnesses: Vec<(AssocTypeId, TypeId)> = witnesses
            .iter()
            .copied()
            .filter(|&(assoc, _)| {
                let owner = self.decls.assoc_type(assoc).protocol;
                owner == protocol || self.decls.inherits_from(protocol, owner)
            })
            .collect();
        let conformance = self
            .conformances
            .concrete
            .intern(ConcreteKey::Normal(decl, protocol), || ConcreteData::Normal {
                decl,
                protocol,
                ty,
                signature,
                witnesses,
            });
        tracing::trace!(
            ty = %self.display_type(ty),
            protocol = self.interner.resolve(self.decls.protocol(protocol).name),
            "declared conformance"
        );
        conformance
    }
}

impl ConcreteConformance {
    /// Structural or self-conformance of `ty`.
    pub fn builtin(ctx: &mut GenericContext, ty: TypeId, protocol: ProtocolId) -> ConcreteConformance {
        ctx.conformances
            .concrete
            .intern(ConcreteKey::Builtin(ty, protocol), || ConcreteData::Builtin { ty, protocol })
    }

    /// `generic` with its signature's parameters replaced through `map`.
    /// Returns `generic` itself when it has no signature or `map` is its
    /// identity.
    pub fn specialize(
        ctx: &mut GenericContext,
        generic: ConcreteConformance,
        map: SubstitutionMap,
    ) -> ConcreteConformance {
        let (generic, map) = match *ctx.conformances.concrete.get(generic) {
            ConcreteData::Specialized {
                generic: inner,
                map: inner_map,
                ..
            } => (inner, inner_map.subst(ctx, map, SubstOptions::empty())),
            ConcreteData::Normal { .. } => (generic, map),
            ConcreteData::Builtin { .. } => return generic,
        };
        let ConcreteData::Normal {
            ty: interface,
            protocol,
            signature,
            ..
        } = *ctx.conformances.concrete.get(generic)
        else {
            return generic;
        };
        if map.is_empty() || signature.is_null() || map.is_identity(ctx) {
            return generic;
        }
        let ty = ctx.subst_type(interface, map, SubstOptions::empty());
        ctx.conformances
            .concrete
            .intern(ConcreteKey::Specialized(generic, map), || ConcreteData::Specialized {
                generic,
                map,
                ty,
                protocol,
            })
    }

    pub fn kind(self, ctx: &GenericContext) -> ConcreteConformanceKind {
        match ctx.conformances.concrete.get(self) {
            ConcreteData::Normal { .. } => ConcreteConformanceKind::Normal,
            ConcreteData::Specialized { .. } => ConcreteConformanceKind::Specialized,
            ConcreteData::Builtin { .. } => ConcreteConformanceKind::Builtin,
        }
    }

    pub fn protocol(self, ctx: &GenericContext) -> ProtocolId {
        match *ctx.conformances.concrete.get(self) {
            ConcreteData::Normal { protocol, .. }
            | ConcreteData::Specialized { protocol, .. }
            | ConcreteData::Builtin { protocol, .. } => protocol,
        }
    }

    pub fn conforming_type(self, ctx: &GenericContext) -> TypeId {
        match *ctx.conformances.concrete.get(self) {
            ConcreteData::Normal { ty, .. }
            | ConcreteData::Specialized { ty, .. }
            | ConcreteData::Builtin { ty, .. } => ty,
        }
    }

    /// The unspecialized conformance this one was specialized from.
    pub fn generic_conformance(self, ctx: &GenericContext) -> ConcreteConformance {
        match *ctx.conformances.concrete.get(self) {
            ConcreteData::Specialized { generic, .. } => generic,
            _ => self,
        }
    }

    /// The substitutions applied by a specialized conformance.
    pub fn substitution_map(self, ctx: &GenericContext) -> SubstitutionMap {
        match *ctx.conformances.concrete.get(self) {
            ConcreteData::Specialized { map, .. } => map,
            _ => SubstitutionMap::EMPTY,
        }
    }

    pub fn type_witness(self, ctx: &mut GenericContext, assoc: AssocTypeId) -> TypeId {
        match ctx.conformances.concrete.get(self).clone() {
            ConcreteData::Normal { witnesses, .. } => {
                let name = ctx.decls.assoc_type(assoc).name;
                witnesses
                    .iter()
                    .find(|&&(a, _)| a == assoc)
                    .or_else(|| {
                        witnesses
                            .iter()
                            .find(|&&(a, _)| ctx.decls.assoc_type(a).name == name)
                    })
                    .map_or(TypeId::ERROR, |&(_, witness)| witness)
            }
            ConcreteData::Specialized { generic, map, .. } => {
                let witness = generic.type_witness(ctx, assoc);
                ctx.subst_type(witness, map, SubstOptions::empty())
            }
            ConcreteData::Builtin { .. } => TypeId::ERROR,
        }
    }

    /// Conformance of `subject` (over `Self`) to `protocol`.
    pub fn associated_conformance(
        self,
        ctx: &mut GenericContext,
        subject: TypeId,
        protocol: ProtocolId,
    ) -> ProtocolConformanceRef {
        match ctx.conformances.concrete.get(self).clone() {
            ConcreteData::Normal { decl, .. } => {
                if is_protocol_self(ctx, subject)
                    && let Some(inherited) = ctx.conformances.concrete.normal(decl, protocol)
                {
                    return ProtocolConformanceRef::Concrete(inherited);
                }
                let member = self.subject_type(ctx, subject);
                if member.is_error() {
                    return ProtocolConformanceRef::Invalid;
                }
                ctx.lookup_conformance(member, protocol)
            }
            ConcreteData::Specialized { generic, map, .. } => {
                let conformance = generic.associated_conformance(ctx, subject, protocol);
                let mut source = map;
                let mut ifs = InFlightSubstitution::new(ctx, &mut source, SubstOptions::empty());
                conformance.subst(ctx, &mut ifs)
            }
            ConcreteData::Builtin { ty, .. } => {
                if is_protocol_self(ctx, subject) {
                    ctx.lookup_conformance(ty, protocol)
                } else {
                    ProtocolConformanceRef::Invalid
                }
            }
        }
    }

    /// `subject` (over `Self`) evaluated against this conformance.
    fn subject_type(self, ctx: &mut GenericContext, subject: TypeId) -> TypeId {
        match *ctx.types.get(subject) {
            Ty::GenericParam { depth: 0, index: 0, .. } => self.conforming_type(ctx),
            Ty::DependentMember { base, assoc } => {
                if is_protocol_self(ctx, base) {
                    return self.type_witness(ctx, assoc);
                }
                let base_ty = self.subject_type(ctx, base);
                if base_ty.is_error() {
                    return base_ty;
                }
                let owner = ctx.decls.assoc_type(assoc).protocol;
                ctx.lookup_conformance(base_ty, owner).type_witness(ctx, assoc)
            }
            Ty::Sugar { underlying, .. } => self.subject_type(ctx, underlying),
            _ => TypeId::ERROR,
        }
    }

    pub fn subst(self, ctx: &mut GenericContext, ifs: &mut InFlightSubstitution<'_>) -> ProtocolConformanceRef {
        match *ctx.conformances.concrete.get(self) {
            ConcreteData::Normal { signature, .. } => {
                if signature.is_null() {
                    return ProtocolConformanceRef::Concrete(self);
                }
                let map = signature.identity_substitution_map(ctx).subst_in_flight(ctx, ifs);
                ProtocolConformanceRef::Concrete(ConcreteConformance::specialize(ctx, self, map))
            }
            ConcreteData::Specialized { generic, map, .. } => {
                let map = map.subst_in_flight(ctx, ifs);
                ProtocolConformanceRef::Concrete(ConcreteConformance::specialize(ctx, generic, map))
            }
            ConcreteData::Builtin { ty, protocol } => {
                let ty = ifs.subst_type(ctx, ty);
                ctx.lookup_conformance(ty, protocol)
            }
        }
    }

    pub fn is_canonical(self, ctx: &GenericContext) -> bool {
        match *ctx.conformances.concrete.get(self) {
            ConcreteData::Normal { .. } => true,
            ConcreteData::Specialized { map, .. } => map.is_canonical(ctx),
            ConcreteData::Builtin { ty, .. } => ctx.types.is_canonical(ty),
        }
    }

    pub fn canonical(self, ctx: &mut GenericContext) -> ConcreteConformance {
        match *ctx.conformances.concrete.get(self) {
            ConcreteData::Normal { .. } => self,
            ConcreteData::Specialized { generic, map, .. } => {
                let map = map.canonical(ctx);
                ConcreteConformance::specialize(ctx, generic, map)
            }
            ConcreteData::Builtin { ty, protocol } => {
                let ty = ctx.types.canonical_type(ty);
                ConcreteConformance::builtin(ctx, ty, protocol)
            }
        }
    }
}

fn is_protocol_self(ctx: &GenericContext, ty: TypeId) -> bool {
    matches!(
        ctx.types.get(ctx.types.look_through_sugar(ty)),
        Ty::GenericParam { depth: 0, index: 0, .. }
    )
}

/// Argument list of a nominal type, flattened in parameter order.
pub(crate) fn nominal_args(ctx: &GenericContext, ty: TypeId) -> Option<(NominalId, TypeIdVec)> {
    match ctx.types.get(ctx.types.look_through_sugar(ty)) {
        Ty::Nominal { decl, args } => Some((*decl, args.clone())),
        _ => None,
    }
}
